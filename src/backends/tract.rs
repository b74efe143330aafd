//! Tract backend for segmentation models
//!
//! Runs ONNX graphs with Tract, a pure Rust inference engine, so the binary
//! has no native runtime to ship.

use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use tract_onnx::prelude::*;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
}

impl TractBackend {
    #[must_use]
    pub fn new(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
        }
    }

    fn load_model(&mut self) -> Result<Duration> {
        let load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;
        let model_info = self.model_manager.get_info()?;

        log::info!("🚀 Initializing Tract Backend");
        log::info!("🧠 Model: {} ({})", model_info.name, model_info.precision);
        #[allow(clippy::cast_precision_loss)]
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let (_, channels, height, width) = model_info.input_shape;
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| TextBehindError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, channels, height, width]).into())
            .map_err(|e| TextBehindError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| TextBehindError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| TextBehindError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        let elapsed = load_start.elapsed();
        log::info!("✅ Tract backend initialized in {}ms", elapsed.as_millis());
        Ok(elapsed)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TextBehindError::inference("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let outputs = model
            .run(tvec![Tensor::from(input.clone()).into()])
            .map_err(|e| TextBehindError::inference(format!("Tract inference failed: {e}")))?;

        // ISNet-style graphs emit the fused mask first
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| TextBehindError::inference("Model produced no output tensor"))?
            .into_arc_tensor();
        let view = output.to_array_view::<f32>().map_err(|e| {
            TextBehindError::inference(format!("Failed to read output tensor: {e}"))
        })?;

        let shape = match *view.shape() {
            [n, c, h, w] => (n, c, h, w),
            [n, h, w] => (n, 1, h, w),
            ref other => {
                return Err(TextBehindError::inference(format!(
                    "Expected 3D or 4D output tensor, got shape {:?}",
                    other
                )))
            },
        };
        let mask = Array4::from_shape_vec(shape, view.iter().copied().collect()).map_err(|e| {
            TextBehindError::inference(format!("Failed to reshape output tensor: {e}"))
        })?;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            mask.shape()
        );
        Ok(mask)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.model_manager.get_preprocessing_config().target_size;
        (1, 3, height as usize, width as usize)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.model_manager.get_preprocessing_config().target_size;
        (1, 1, height as usize, width as usize)
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.model_manager.get_preprocessing_config()
    }

    fn model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}
