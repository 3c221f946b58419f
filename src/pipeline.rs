//! Full harmonization pipeline for one image

use crate::{
    background::BackgroundRemover,
    compositor::Compositor,
    config::HarmonizeConfig,
    error::{HarmonizeError, Result},
    layout::LayoutEngine,
    segmentation::SegmentationCapability,
    services::{ImageIOService, ProcessingStage, ProgressTracker},
    types::{Dimensions, HarmonizedImage, ProcessingTimings, ProductContext},
};
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Decode, categorize, remove background and composite, strictly in that order
///
/// One pipeline is shared by every task of a batch; it holds no per-image state.
#[derive(Debug)]
pub struct HarmonizationPipeline {
    config: HarmonizeConfig,
    layout: LayoutEngine,
    remover: BackgroundRemover,
    compositor: Compositor,
}

impl HarmonizationPipeline {
    /// Pipeline with the standard fallback chain around an optional capability
    ///
    /// # Errors
    /// - `Configuration` when the config does not validate
    pub fn new(
        config: HarmonizeConfig,
        capability: Option<Arc<dyn SegmentationCapability>>,
    ) -> Result<Self> {
        let remover = BackgroundRemover::from_config(&config, capability);
        Self::with_remover(config, remover)
    }

    /// Pipeline with a custom background remover
    pub fn with_remover(config: HarmonizeConfig, remover: BackgroundRemover) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            layout: LayoutEngine::new(Dimensions::new(config.canvas.width, config.canvas.height)),
            compositor: Compositor::new(&config),
            remover,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HarmonizeConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &LayoutEngine {
        &self.layout
    }

    /// Harmonize one encoded source image
    ///
    /// # Errors
    /// - `Image` / `InvalidDimensions` for undecodable or zero-size input
    /// - Encoder failures
    ///
    /// Background removal failures never surface here.
    pub async fn process_image(
        &self,
        bytes: &[u8],
        context: &ProductContext,
    ) -> Result<HarmonizedImage> {
        self.process_image_with_progress(bytes, context, None).await
    }

    /// [`process_image`](Self::process_image), reporting the removal and
    /// compositing stages to `progress`
    #[instrument(skip(self, bytes, progress), fields(title = %context.title, input_bytes = bytes.len()))]
    pub async fn process_image_with_progress(
        &self,
        bytes: &[u8],
        context: &ProductContext,
        progress: Option<&ProgressTracker>,
    ) -> Result<HarmonizedImage> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let decode_start = Instant::now();
        let owned = bytes.to_vec();
        let source = tokio::task::spawn_blocking(move || ImageIOService::decode(&owned))
            .await
            .map_err(|e| HarmonizeError::internal(format!("Decode task failed: {}", e)))??;
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        let scaling_info = self.layout.plan(source.dimensions, context)?;
        let shadow = self.layout.shadow(&scaling_info);
        debug!(
            category = %scaling_info.category,
            reason = %scaling_info.reason,
            original = %scaling_info.original,
            scaled = %format!("{}x{}", scaling_info.scaled.width, scaling_info.scaled.height),
            capped = scaling_info.scaled.capped_at_max,
            "Computed layout"
        );

        if let Some(progress) = progress {
            progress.report_stage(ProcessingStage::BackgroundRemoval);
        }
        let removal_start = Instant::now();
        let removal = self.remover.remove_image(&source.image, bytes).await;
        timings.background_removal_ms = removal_start.elapsed().as_millis() as u64;
        drop(source);

        if let Some(progress) = progress {
            progress.report_stage(ProcessingStage::Compositing);
        }
        let compositing_start = Instant::now();
        let compositor = self.compositor.clone();
        let info = scaling_info.clone();
        let foreground = removal.image;
        let buffer = tokio::task::spawn_blocking(move || compositor.compose(&foreground, &info, &shadow))
            .await
            .map_err(|e| HarmonizeError::internal(format!("Compositing task failed: {}", e)))??;
        timings.compositing_ms = compositing_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        info!(
            category = %scaling_info.category,
            strategy = removal.strategy,
            output_bytes = buffer.len(),
            total_ms = timings.total_ms,
            "Image harmonized"
        );

        Ok(HarmonizedImage {
            buffer,
            scaling_info,
            shadow,
            removal_strategy: removal.strategy.to_string(),
            timings,
        })
    }
}
