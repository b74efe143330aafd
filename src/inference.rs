//! Inference backend abstraction

use crate::error::Result;
use crate::models::{ModelInfo, PreprocessingConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// A segmentation model that turns an NCHW image tensor into a `[1, 1, H, W]`
/// foreground probability map
///
/// `infer` takes `&self` so one initialized backend can serve concurrent
/// requests behind an `Arc`.
pub trait InferenceBackend: Send + Sync {
    /// Load the model; returns the load time the first time it runs
    ///
    /// # Errors
    /// - Model file unreadable or not a valid ONNX graph
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures or unexpected output shape
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Produced output shape (NCHW)
    fn output_shape(&self) -> (usize, usize, usize, usize);

    fn preprocessing_config(&self) -> PreprocessingConfig;

    /// # Errors
    /// - Model metadata unavailable
    fn model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}
