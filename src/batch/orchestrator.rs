//! Chunked batch processing over a product catalog

use crate::{
    batch::{
        repository::ProductRepository,
        status::{StatusStatistics, StatusStore, StatusTracker},
    },
    error::{HarmonizeError, Result},
    pipeline::HarmonizationPipeline,
    services::{
        progress::{BatchProcessingStats, ProcessingStage, ProgressTracker},
        OutputFormatHandler,
    },
    types::{ProcessedImage, Product, ProductImage},
};
use chrono::Utc;
use futures::future::join_all;
use instant::Instant;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Run options that do not belong in the pipeline config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Only consider the first N listed products
    pub limit: Option<usize>,
}

/// What happened to one product that completed
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub processed_images: Vec<ProcessedImage>,
    pub images_total: usize,
    pub images_failed: usize,
}

#[derive(Debug)]
pub struct ProductOutcome {
    pub product_id: String,
    pub title: String,
    pub result: Result<ProductSummary>,
}

impl ProductOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-product outcomes in selection order plus aggregate counts
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<ProductOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    /// Products left out because they were already completed or skipped
    pub excluded: usize,
    pub elapsed: Duration,
}

impl BatchResult {
    #[must_use]
    pub fn selected(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProductOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

/// Result of a full catalog run
#[derive(Debug)]
pub struct RunSummary {
    pub listed: usize,
    pub batch: BatchResult,
    pub statistics: StatusStatistics,
}

/// Drives the pipeline over many products with bounded fan-out
pub struct BatchOrchestrator {
    pipeline: Arc<HarmonizationPipeline>,
    repository: Arc<dyn ProductRepository>,
    status: StatusTracker,
    progress: ProgressTracker,
}

impl BatchOrchestrator {
    pub fn new(
        pipeline: Arc<HarmonizationPipeline>,
        repository: Arc<dyn ProductRepository>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        Self {
            pipeline,
            repository,
            status: StatusTracker::new(store),
            progress: ProgressTracker::no_op(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    #[must_use]
    pub fn pipeline(&self) -> &HarmonizationPipeline {
        &self.pipeline
    }

    /// List the catalog, process what needs processing, then recount statuses
    ///
    /// # Errors
    /// - Repository listing failures; per-product failures are reported in the result
    #[instrument(skip(self))]
    pub async fn run(&self, options: BatchOptions) -> Result<RunSummary> {
        self.progress.report_stage(ProcessingStage::BatchInitialization);

        let mut products = self.repository.list_all().await?;
        if let Some(limit) = options.limit {
            info!(limit, "Limiting run");
            products.truncate(limit);
        }
        info!(products = products.len(), "Listed catalog");

        let batch = self.process_batch(products.clone()).await;
        let statistics = self.status.statistics(&products).await;

        Ok(RunSummary {
            listed: products.len(),
            batch,
            statistics,
        })
    }

    /// Products whose status is neither completed nor skipped, in input order
    pub async fn select_candidates(&self, products: Vec<Product>) -> (Vec<Product>, usize) {
        self.progress.report_stage(ProcessingStage::CandidateSelection);

        let mut selected = Vec::with_capacity(products.len());
        let mut excluded = 0;
        for product in products {
            if self.status.needs_processing(&product.id).await {
                selected.push(product);
            } else {
                excluded += 1;
            }
        }
        (selected, excluded)
    }

    /// Process every product that needs it, `max_concurrent` at a time
    ///
    /// A chunk fully settles before the next one starts, with the configured
    /// delay between chunks. Product failures are recorded and counted, never
    /// propagated.
    #[instrument(skip_all, fields(products = products.len()))]
    pub async fn process_batch(&self, products: Vec<Product>) -> BatchResult {
        let start = Instant::now();
        self.progress.restart();
        let (candidates, excluded) = self.select_candidates(products).await;

        let mut result = BatchResult {
            excluded,
            ..BatchResult::default()
        };

        if candidates.is_empty() {
            info!(excluded, "All products are already harmonized");
            self.progress.report_stage(ProcessingStage::Completed);
            result.elapsed = start.elapsed();
            return result;
        }

        let chunk_size = self.pipeline.config().max_concurrent.max(1);
        let chunk_delay = self.pipeline.config().chunk_delay();
        let total = candidates.len();
        info!(
            selected = total,
            excluded,
            max_concurrent = chunk_size,
            "Processing products"
        );

        let chunk_count = total.div_ceil(chunk_size);
        for (index, chunk) in candidates.chunks(chunk_size).enumerate() {
            let settled = join_all(chunk.iter().map(|product| async move {
                ProductOutcome {
                    product_id: product.id.clone(),
                    title: product.title.clone(),
                    result: self.process_product(product).await,
                }
            }))
            .await;

            for outcome in settled {
                match &outcome.result {
                    Ok(_) => result.succeeded += 1,
                    Err(e) => {
                        result.failed += 1;
                        self.progress
                            .report_error(ProcessingStage::ProductProcessing, &e.to_string());
                    },
                }
                self.progress.report_settled(BatchProcessingStats {
                    products_settled: result.succeeded + result.failed,
                    products_total: total,
                    products_failed: result.failed,
                    current_product: outcome.title.clone(),
                    ..BatchProcessingStats::default()
                });
                result.outcomes.push(outcome);
            }

            info!(
                settled = result.succeeded + result.failed,
                total,
                succeeded = result.succeeded,
                failed = result.failed,
                "Chunk settled"
            );

            if index + 1 < chunk_count && !chunk_delay.is_zero() {
                tokio::time::sleep(chunk_delay).await;
            }
        }

        self.progress.report_stage(ProcessingStage::BatchFinalization);
        result.elapsed = start.elapsed();
        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Batch complete"
        );
        self.progress.report_stage(ProcessingStage::Completed);
        result
    }

    /// Harmonize all images of one product and record the outcome
    ///
    /// Image-level failures are logged and skipped; the product still
    /// completes with whatever images succeeded.
    ///
    /// # Errors
    /// - `ProductProcessing` wrapping the first product-level failure, after
    ///   the product has been marked failed
    #[instrument(skip_all, fields(product_id = %product.id, title = %product.title))]
    pub async fn process_product(&self, product: &Product) -> Result<ProductSummary> {
        match self.harmonize_product(product).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(error = %e, "Product failed");
                if let Err(store_error) = self
                    .status
                    .mark_failed(&product.id, &product.title, &e.to_string())
                    .await
                {
                    warn!(error = %store_error, "Could not record failure");
                }
                Err(HarmonizeError::product_processing(product.id.clone(), e))
            },
        }
    }

    async fn harmonize_product(&self, product: &Product) -> Result<ProductSummary> {
        self.status
            .mark_in_progress(&product.id, &product.title)
            .await?;
        self.progress.report_stage_with_description(
            ProcessingStage::ProductProcessing,
            format!("Processing {}", product.title),
        );

        if product.images.is_empty() {
            info!("Product has no images");
            self.status
                .mark_completed_without_images(&product.id, &product.title)
                .await?;
            return Ok(ProductSummary {
                processed_images: Vec::new(),
                images_total: 0,
                images_failed: 0,
            });
        }

        let mut processed_images = Vec::with_capacity(product.images.len());
        let mut images_failed = 0;
        for (index, image) in product.images.iter().enumerate() {
            match self.harmonize_image(product, image, index + 1).await {
                Ok(processed) => processed_images.push(processed),
                Err(e) if e.is_image_level() => {
                    images_failed += 1;
                    warn!(image_id = %image.id, error = %e, "Image failed, continuing with the rest");
                },
                Err(e) => {
                    images_failed += 1;
                    error!(image_id = %image.id, error = %e, "Unexpected image failure, continuing with the rest");
                },
            }
        }

        self.progress.report_stage(ProcessingStage::StatusUpdate);
        self.status
            .mark_completed(&product.id, &product.title, processed_images.clone())
            .await?;

        Ok(ProductSummary {
            images_total: product.images.len(),
            images_failed,
            processed_images,
        })
    }

    async fn harmonize_image(
        &self,
        product: &Product,
        image: &ProductImage,
        position: usize,
    ) -> Result<ProcessedImage> {
        self.progress.report_stage(ProcessingStage::ImageDownload);
        let bytes = self.repository.download_image(&image.url).await?;

        let harmonized = self
            .pipeline
            .process_image_with_progress(&bytes, &product.context(), Some(&self.progress))
            .await?;
        self.progress.report_completion(harmonized.timings.clone());

        let uploaded_id = if self.pipeline.config().dry_run {
            info!(image_id = %image.id, "Dry run, skipping upload");
            None
        } else {
            self.progress.report_stage(ProcessingStage::Upload);
            let filename = format!(
                "{}-harmonized-{}.{}",
                product.slug(),
                position,
                OutputFormatHandler::get_extension(self.pipeline.config().output_format)
            );
            let uploaded = self
                .repository
                .upload_image(&product.id, harmonized.buffer, &filename)
                .await?;
            self.repository.delete_image(&product.id, &image.id).await?;
            Some(uploaded)
        };

        Ok(ProcessedImage {
            original_id: image.id.clone(),
            category: harmonized.scaling_info.category,
            dimensions: harmonized.scaling_info.scaled,
            processed_at: Utc::now(),
            uploaded_id,
        })
    }
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
