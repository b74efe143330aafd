//! Terminal progress bar for the `compose` command

use crate::{
    services::{ProcessingStage, ProgressReporter, ProgressUpdate},
    types::ProcessingTimings,
};
use indicatif::{ProgressBar, ProgressStyle};

/// Shows pipeline stages as a percentage bar on stderr
pub(crate) struct IndicatifProgressReporter {
    bar: ProgressBar,
}

impl IndicatifProgressReporter {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.bar.set_position(u64::from(update.progress));
        self.bar.set_message(update.description);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        self.bar
            .finish_with_message(format!("✅ Done in {}ms", timings.total_ms));
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.bar
            .abandon_with_message(format!("❌ {} failed: {}", stage.description(), error));
    }
}
