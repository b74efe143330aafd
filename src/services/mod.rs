//! Frontend-facing services: progress reporting and image I/O

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressEvent, ProgressUpdate, RecordingProgressReporter,
};
