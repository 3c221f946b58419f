#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Catalog Harmonize
//!
//! Product photo harmonization for e-commerce catalogs. Every product image is
//! categorized by shape and keywords, rescaled by per-category rules, cut out
//! from its background, and composited with a soft contact shadow onto a
//! uniform canvas.
//!
//! ## Features
//!
//! - **Deterministic layout**: categorization, scaling and shadow geometry are
//!   pure functions of the image size, product text and canvas
//! - **Background removal fallback chain**: external segmentation, alpha trim,
//!   threshold border trim, original image
//! - **Batch orchestration**: bounded chunked concurrency with per-product
//!   status records so interrupted runs resume where they stopped
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_harmonize::{process_image, HarmonizeConfig, ProductContext};
//!
//! # async fn example(photo: Vec<u8>) -> anyhow::Result<()> {
//! let config = HarmonizeConfig::builder()
//!     .canvas_size(2000, 2500)
//!     .build()?;
//! let context = ProductContext::new("Ceramic Vase", "Home Decor");
//!
//! let result = process_image(&photo, &context, &config, None).await?;
//! println!(
//!     "{} -> {}x{}",
//!     result.scaling_info.category, result.scaling_info.scaled.width, result.scaling_info.scaled.height
//! );
//! std::fs::write("vase.webp", &result.buffer)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch usage
//!
//! ```rust,no_run
//! use catalog_harmonize::{
//!     BatchOptions, BatchOrchestrator, DirectoryRepository, HarmonizationPipeline,
//!     HarmonizeConfig, JsonFileStatusStore,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pipeline = Arc::new(HarmonizationPipeline::new(HarmonizeConfig::from_env()?, None)?);
//! let repository = Arc::new(DirectoryRepository::new("catalog", "harmonized")?);
//! let store = Arc::new(JsonFileStatusStore::new("status.json"));
//!
//! let summary = BatchOrchestrator::new(pipeline, repository, store)
//!     .run(BatchOptions::default())
//!     .await?;
//! println!("{} succeeded, {} failed", summary.batch.succeeded, summary.batch.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and progress bar
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI

pub mod background;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use std::sync::Arc;

// Public API exports
pub use background::{BackgroundRemover, RemovalStrategy};
pub use batch::{
    BatchOptions, BatchOrchestrator, BatchResult, DirectoryRepository, InMemoryStatusStore,
    JsonFileStatusStore, ProductOutcome, ProductRepository, ProductSummary, RunSummary,
    StatusStatistics, StatusStore, StatusTracker,
};
pub use compositor::Compositor;
pub use config::{BackgroundColor, CanvasConfig, HarmonizeConfig, OutputFormat, TrimOptions};
pub use error::{HarmonizeError, Result};
pub use layout::{categorize, LayoutEngine};
pub use pipeline::HarmonizationPipeline;
pub use segmentation::{CommandSegmenter, GuardedSegmenter, SegmentationCapability};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{
    Categorization, Category, Dimensions, HarmonizedImage, ProcessedImage, ProcessingRecord,
    ProcessingStatus, Product, ProductContext, ProductImage, ScaledDimensions, ScalingInfo,
    ShadowSpec,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Scaling decision for an image whose category is already known
///
/// # Examples
///
/// ```rust
/// use catalog_harmonize::{compute_scaling, Category, Dimensions};
///
/// let info = compute_scaling(1640, 656, Category::Wide, Dimensions::new(2000, 2500)).unwrap();
/// assert_eq!((info.scaled.width, info.scaled.height), (1640, 656));
/// ```
pub fn compute_scaling(
    width: u32,
    height: u32,
    category: Category,
    canvas: Dimensions,
) -> Result<ScalingInfo> {
    let categorization = Categorization {
        category,
        reason: format!("Category {} supplied by caller", category),
    };
    layout::scaling_info(Dimensions::new(width, height), categorization, canvas)
}

/// Harmonize one encoded image with a one-off pipeline
///
/// Batches should build a [`HarmonizationPipeline`] once and share it.
pub async fn process_image(
    buffer: &[u8],
    context: &ProductContext,
    config: &HarmonizeConfig,
    segmentation: Option<Arc<dyn SegmentationCapability>>,
) -> Result<HarmonizedImage> {
    let pipeline = HarmonizationPipeline::new(config.clone(), segmentation)?;
    pipeline.process_image(buffer, context).await
}

/// Harmonize every listed product that still needs it
///
/// Product failures are recorded in the store and reported in the result;
/// they never abort the batch.
pub async fn process_batch(
    products: Vec<Product>,
    config: &HarmonizeConfig,
    repository: Arc<dyn ProductRepository>,
    store: Arc<dyn StatusStore>,
    segmentation: Option<Arc<dyn SegmentationCapability>>,
) -> Result<BatchResult> {
    let pipeline = Arc::new(HarmonizationPipeline::new(config.clone(), segmentation)?);
    Ok(BatchOrchestrator::new(pipeline, repository, store)
        .process_batch(products)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_scaling_uses_given_category() {
        let canvas = Dimensions::new(2000, 2500);
        let info = compute_scaling(886, 2125, Category::TallThin, canvas).unwrap();
        assert_eq!(info.category, Category::TallThin);
        assert!(info.reason.contains("tall_thin"));
        assert_eq!(info.scaled.height, 2125);

        assert!(matches!(
            compute_scaling(0, 10, Category::Default, canvas),
            Err(HarmonizeError::InvalidDimensions { .. })
        ));
    }
}
