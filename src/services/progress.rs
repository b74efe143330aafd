//! Progress reporting service
//!
//! Keeps stage reporting out of the pipeline so the CLI, the web server and
//! tests can each observe it their own way.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Mutex;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Reading and validating the upload
    ImageLoading,
    /// Running the segmentation model
    BackgroundRemoval,
    /// Drawing the text layer and flattening
    Compositing,
    /// Encoding the PNG download
    Encoding,
    Completed,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::BackgroundRemoval => "Removing background",
            ProcessingStage::Compositing => "Adding text behind subject",
            ProcessingStage::Encoding => "Encoding PNG",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Typical progress when the stage starts
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::ImageLoading => 5,
            ProcessingStage::BackgroundRemoval => 15,
            ProcessingStage::Compositing => 85,
            ProcessingStage::Encoding => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for observing pipeline progress
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: ProcessingTimings);

    /// Report the stage that stopped the pipeline
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Logs progress through the `log` facade
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
        log::info!("✅ Text behind image completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 Detailed timings:");
            log::info!("    • Model load: {}ms", timings.model_load_ms);
            log::info!("    • Image decode: {}ms", timings.image_decode_ms);
            log::info!("    • Preprocessing: {}ms", timings.preprocessing_ms);
            log::info!("    • Inference: {}ms", timings.inference_ms);
            log::info!("    • Postprocessing: {}ms", timings.postprocessing_ms);
            log::info!("    • Compositing: {}ms", timings.compositing_ms);
            if let Some(encode) = timings.image_encode_ms {
                log::info!("    • Encoding: {}ms", encode);
            }
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// One observed progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress(ProcessingStage),
    Completed,
    Failed(ProcessingStage, String),
}

/// Keeps every event in memory, for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingProgressReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Stages reported through `report_progress`, in order
    #[must_use]
    pub fn stages(&self) -> Vec<ProcessingStage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.push(ProgressEvent::Progress(update.stage));
    }

    fn report_completion(&self, _timings: ProcessingTimings) {
        self.push(ProgressEvent::Completed);
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        self.push(ProgressEvent::Failed(stage, error.to_string()));
    }
}
