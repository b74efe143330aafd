//! Shared helpers for preprocessing, validation and model arguments

pub mod models;
pub mod preprocessing;
pub mod validation;

pub use models::ModelSpecParser;
pub use preprocessing::{ImagePreprocessor, Letterbox, PreprocessingOptions};
pub use validation::ConfigValidator;
