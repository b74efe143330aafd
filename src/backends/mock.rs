//! Deterministic backend for tests, benchmarks and offline demos
//!
//! Produces a fixed mask shape in model space instead of running a network.

use crate::error::{Result, TextBehindError};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, PreprocessingConfig};
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};

use instant::Duration;

/// Mask produced by [`MockBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMask {
    /// Centered ellipse covering the middle of the frame
    #[default]
    Ellipse,
    /// Everything is foreground
    Full,
    /// Everything is background
    Empty,
    /// Foreground where the input is darker than the white padding
    NonWhite,
}

#[derive(Debug)]
pub struct MockBackend {
    mask: MockMask,
    preprocessing: PreprocessingConfig,
    initialized: bool,
    fail_initialize: bool,
    fail_inference: bool,
    inference_calls: AtomicUsize,
}

impl MockBackend {
    /// Default mock: 64x64 input, ellipse mask
    #[must_use]
    pub fn new() -> Self {
        Self {
            mask: MockMask::default(),
            preprocessing: PreprocessingConfig {
                target_size: [64, 64],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
            initialized: false,
            fail_initialize: false,
            fail_inference: false,
            inference_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: MockMask) -> Self {
        self.mask = mask;
        self
    }

    #[must_use]
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.preprocessing.target_size = [size, size];
        self
    }

    #[must_use]
    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    #[must_use]
    pub fn failing_inference(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// Number of `infer` calls so far
    #[must_use]
    pub fn inference_calls(&self) -> usize {
        self.inference_calls.load(Ordering::SeqCst)
    }

    fn foreground(&self, input: &Array4<f32>, y: usize, x: usize, height: usize, width: usize) -> f32 {
        match self.mask {
            MockMask::Full => 1.0,
            MockMask::Empty => 0.0,
            MockMask::Ellipse => {
                let dx = (x as f32 + 0.5) / width as f32 - 0.5;
                let dy = (y as f32 + 0.5) / height as f32 - 0.5;
                if (dx / 0.35).powi(2) + (dy / 0.45).powi(2) <= 1.0 {
                    1.0
                } else {
                    0.0
                }
            },
            MockMask::NonWhite => {
                let [mean, _, _] = self.preprocessing.normalization_mean;
                let [std, _, _] = self.preprocessing.normalization_std;
                let white = (1.0 - mean) / std;
                let darker = (0..3).any(|c| {
                    input
                        .get([0, c, y, x])
                        .is_some_and(|value| *value < white - 0.05)
                });
                if darker {
                    1.0
                } else {
                    0.0
                }
            },
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.fail_initialize {
            return Err(TextBehindError::model("Mock model failed to load"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.inference_calls.fetch_add(1, Ordering::SeqCst);
        if !self.initialized {
            return Err(TextBehindError::inference("Mock backend not initialized"));
        }
        if self.fail_inference {
            return Err(TextBehindError::inference("Mock inference failure"));
        }

        let (_, _, height, width) = self.output_shape();
        if input.shape() != [1, 3, height, width] {
            return Err(TextBehindError::inference(format!(
                "Expected input [1, 3, {}, {}], got {:?}",
                height,
                width,
                input.shape()
            )));
        }

        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            self.foreground(input, y, x, height, width)
        }))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.preprocessing.target_size;
        (1, 3, height as usize, width as usize)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.preprocessing.target_size;
        (1, 1, height as usize, width as usize)
    }

    fn preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing
    }

    fn model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: format!("mock-{:?}", self.mask).to_lowercase(),
            precision: "fp32".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized(backend: MockBackend) -> MockBackend {
        let mut backend = backend;
        backend.initialize().unwrap();
        backend
    }

    #[test]
    fn test_requires_initialization() {
        let backend = MockBackend::new();
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 64, 64))).is_err());
        assert_eq!(backend.inference_calls(), 1);
    }

    #[test]
    fn test_initialize_reports_load_time_once() {
        let mut backend = MockBackend::new();
        assert!(backend.initialize().unwrap().is_some());
        assert!(backend.initialize().unwrap().is_none());
    }

    #[test]
    fn test_ellipse_mask() {
        let backend = initialized(MockBackend::new().with_input_size(32));
        let output = backend.infer(&Array4::zeros((1, 3, 32, 32))).unwrap();
        assert_eq!(output.shape(), &[1, 1, 32, 32]);
        assert_eq!(output[[0, 0, 16, 16]], 1.0);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
        assert_eq!(output[[0, 0, 16, 1]], 0.0);
    }

    #[test]
    fn test_non_white_mask_follows_input() {
        let backend = initialized(MockBackend::new().with_mask(MockMask::NonWhite).with_input_size(4));
        // White after normalization is (1.0 - 0.5) / 1.0
        let mut input = Array4::from_elem((1, 3, 4, 4), 0.5_f32);
        input[[0, 0, 1, 2]] = -0.5;

        let output = backend.infer(&input).unwrap();
        assert_eq!(output[[0, 0, 1, 2]], 1.0);
        assert_eq!(output[[0, 0, 0, 0]], 0.0);
    }

    #[test]
    fn test_failure_flags() {
        let mut backend = MockBackend::new().failing_initialize();
        assert!(matches!(backend.initialize(), Err(TextBehindError::Model(_))));

        let backend = initialized(MockBackend::new().failing_inference());
        let err = backend.infer(&Array4::zeros((1, 3, 64, 64))).unwrap_err();
        assert!(err.to_string().contains("Mock inference failure"));
    }

    #[test]
    fn test_rejects_wrong_input_shape() {
        let backend = initialized(MockBackend::new());
        assert!(backend.infer(&Array4::zeros((1, 3, 10, 10))).is_err());
    }
}
