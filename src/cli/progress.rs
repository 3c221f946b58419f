//! Progress bar reporter for interactive runs

use crate::{
    services::{BatchProgressUpdate, ProcessingStage, ProgressReporter, ProgressUpdate},
    types::ProcessingTimings,
};
use indicatif::{ProgressBar, ProgressStyle};

/// Renders batch progress as a single bar; per-stage updates are ignored
pub struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for IndicatifProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if update.stage == ProcessingStage::Completed {
            self.bar.finish_with_message("done");
        }
    }

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .suspend(|| eprintln!("✗ {}: {}", stage.description(), error));
    }

    fn report_batch_progress(&self, update: BatchProgressUpdate) {
        let stats = update.stats;
        self.bar.set_length(stats.products_total as u64);
        self.bar.set_position(stats.products_settled as u64);

        let eta = stats
            .eta_seconds
            .map(|secs| format!(", ETA {}s", secs))
            .unwrap_or_default();
        self.bar.set_message(format!(
            "{} ({} failed{})",
            stats.current_product, stats.products_failed, eta
        ));
    }
}

impl Drop for IndicatifProgressReporter {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}
