//! Progress reporting service
//!
//! Batch runs report through a trait object so the CLI can render a progress
//! bar while library users stay silent or log.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::{Arc, Mutex, PoisonError};

/// Progress stages of a harmonization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Listing products from the repository
    BatchInitialization,
    /// Reading status records to pick products that need work
    CandidateSelection,
    /// Running one product through the pipeline
    ProductProcessing,
    /// Fetching a source image
    ImageDownload,
    /// Running the background removal chain
    BackgroundRemoval,
    /// Building and encoding the canvas
    Compositing,
    /// Replacing the product image in the repository
    Upload,
    /// Writing the product's status record
    StatusUpdate,
    /// Summarizing the run
    BatchFinalization,
    /// Run completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::BatchInitialization => "Listing products",
            ProcessingStage::CandidateSelection => "Selecting products to process",
            ProcessingStage::ProductProcessing => "Processing product",
            ProcessingStage::ImageDownload => "Downloading image",
            ProcessingStage::BackgroundRemoval => "Removing background",
            ProcessingStage::Compositing => "Compositing canvas",
            ProcessingStage::Upload => "Uploading harmonized image",
            ProcessingStage::StatusUpdate => "Recording status",
            ProcessingStage::BatchFinalization => "Finalizing batch",
            ProcessingStage::Completed => "Batch completed",
        }
    }

    /// Typical progress percentage for this stage at batch level
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::BatchInitialization => 2,
            ProcessingStage::CandidateSelection => 5,
            ProcessingStage::ProductProcessing => 50, // Variable based on products
            ProcessingStage::ImageDownload => 10,
            ProcessingStage::BackgroundRemoval => 60,
            ProcessingStage::Compositing => 85,
            ProcessingStage::Upload => 95,
            ProcessingStage::StatusUpdate => 98,
            ProcessingStage::BatchFinalization => 99,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the run started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self::with_description(stage, stage.description().to_string(), start_time)
    }

    #[must_use]
    pub fn with_description(stage: ProcessingStage, description: String, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
            description,
        }
    }
}

/// Running totals of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProcessingStats {
    /// Products settled so far (succeeded or failed)
    pub products_settled: usize,
    /// Products selected for this run
    pub products_total: usize,
    /// Products that ended in `failed`
    pub products_failed: usize,
    /// Title of the product that just settled
    pub current_product: String,
    /// Products per second
    pub processing_rate: f64,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,
}

impl BatchProcessingStats {
    /// Derive rate and ETA from the elapsed time
    #[must_use]
    pub fn with_rate(mut self, elapsed_secs: f64) -> Self {
        if elapsed_secs > 0.0 && self.products_settled > 0 {
            self.processing_rate = self.products_settled as f64 / elapsed_secs;
            let remaining = self.products_total.saturating_sub(self.products_settled);
            self.eta_seconds = Some((remaining as f64 / self.processing_rate).round() as u64);
        }
        self
    }

    /// Percentage of selected products that have settled
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.products_total == 0 {
            return 100;
        }
        ((self.products_settled * 100) / self.products_total).min(100) as u8
    }
}

/// Batch-level update emitted after every settled product
#[derive(Debug, Clone)]
pub struct BatchProgressUpdate {
    pub total_progress: ProgressUpdate,
    pub stats: BatchProcessingStats,
}

/// Trait for reporting progress during a harmonization run
pub trait ProgressReporter: Send + Sync {
    /// Report a stage transition
    fn report_progress(&self, update: ProgressUpdate);

    /// Report one harmonized image with its timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report an error that did not stop the run
    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// Report batch totals after a product settled
    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        drop(update);
    }
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        if self.verbose {
            log::info!(
                "Image harmonized in {}ms (decode {}ms, background {}ms, compositing {}ms)",
                timings.total_ms,
                timings.decode_ms,
                timings.background_removal_ms,
                timings.compositing_ms
            );
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        let stats = update.stats;
        log::info!(
            "[{}/{}] {} settled ({} failed){}",
            stats.products_settled,
            stats.products_total,
            stats.current_product,
            stats.products_failed,
            stats
                .eta_seconds
                .map(|eta| format!(", ~{}s remaining", eta))
                .unwrap_or_default()
        );
    }
}

/// Tracks run start time and forwards stage updates to a shared reporter
///
/// Clones share the start time, so a restart is seen by every clone.
#[derive(Clone)]
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Arc<Mutex<Instant>>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Start timing a new run
    pub fn restart(&self) {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn started_at(&self) -> Instant {
        *self.start_time.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracker with a no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Arc::new(ConsoleProgressReporter::new(verbose)))
    }

    pub fn report_stage(&self, stage: ProcessingStage) {
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.started_at()));
    }

    pub fn report_stage_with_description(&self, stage: ProcessingStage, description: String) {
        self.reporter
            .report_progress(ProgressUpdate::with_description(stage, description, self.started_at()));
    }

    pub fn report_completion(&self, timings: ProcessingTimings) {
        self.reporter.report_completion(timings);
    }

    pub fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.reporter.report_error(stage, error);
    }

    /// Emit batch totals with rate and ETA derived from the elapsed time
    pub fn report_settled(&self, stats: BatchProcessingStats) {
        let elapsed = self.started_at().elapsed();
        let stats = stats.with_rate(elapsed.as_secs_f64());
        let total_progress = ProgressUpdate {
            stage: ProcessingStage::ProductProcessing,
            progress: stats.percentage(),
            description: format!("Processed {}", stats.current_product),
            elapsed_ms: elapsed.as_millis() as u64,
        };
        self.reporter.report_batch_progress(BatchProgressUpdate {
            total_progress,
            stats,
        });
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at().elapsed().as_millis() as u64
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("elapsed_ms", &self.elapsed_ms())
            .finish_non_exhaustive()
    }
}
