//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns one initialized inference backend and
//! turns upload bytes into an RGBA image whose alpha channel is the predicted
//! foreground mask. It is shared by the library pipeline, the CLI and the web
//! server through the [`BackgroundRemover`] trait.

use crate::{
    backends::MockBackend,
    cache::ModelCache,
    error::{Result, TextBehindError},
    inference::InferenceBackend,
    models::{ModelInfo, ModelManager, ModelSpec},
    services::ImageIOService,
    types::{ProcessingTimings, RemovalResult, SegmentationMask},
    utils::{ConfigValidator, ImagePreprocessor},
};
use image::DynamicImage;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, instrument, span, Level};

/// Turns encoded image bytes into a background-removed RGBA image
///
/// Every failure, whether the bytes do not decode or the model fails, is
/// reported as [`TextBehindError::BackgroundRemoval`].
pub trait BackgroundRemover: Send + Sync {
    /// # Errors
    /// Returns `BackgroundRemoval` carrying the underlying message.
    fn remove_background(&self, image_bytes: &[u8]) -> Result<RemovalResult>;
}

/// Inference backend selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust ONNX inference)
    #[default]
    Tract,
    /// Deterministic ellipse mask, no model files needed
    Mock,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendType::Tract => "tract",
            BackendType::Mock => "mock",
        })
    }
}

impl FromStr for BackendType {
    type Err = TextBehindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(BackendType::Tract),
            "mock" => Ok(BackendType::Mock),
            other => Err(TextBehindError::invalid_config(format!(
                "Unknown backend '{}'. Available backends: tract, mock",
                other
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend for `config`
    ///
    /// # Errors
    /// - Backend not compiled in
    /// - Model resolution failures
    fn create_backend(&self, config: &ProcessorConfig) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Creates the backends compiled into this build
pub struct DefaultBackendFactory;

impl DefaultBackendFactory {
    /// Resolve the configured model against the configured cache
    ///
    /// # Errors
    /// See [`ModelManager::from_spec_with_cache`].
    pub fn model_manager(config: &ProcessorConfig) -> Result<ModelManager> {
        let cache = match &config.cache_dir {
            Some(dir) => ModelCache::with_custom_cache_dir(dir)?,
            None => ModelCache::new()?,
        };
        ModelManager::from_spec_with_cache(&config.model_spec, &cache)
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(&self, config: &ProcessorConfig) -> Result<Box<dyn InferenceBackend>> {
        match config.backend_type {
            #[cfg(feature = "tract")]
            BackendType::Tract => {
                let manager = Self::model_manager(config)?;
                Ok(Box::new(crate::backends::TractBackend::new(manager)))
            },
            #[cfg(not(feature = "tract"))]
            BackendType::Tract => Err(TextBehindError::invalid_config(
                "Tract backend not compiled in. Enable the 'tract' feature.",
            )),
            BackendType::Mock => Ok(Box::new(MockBackend::new())),
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        if cfg!(feature = "tract") {
            backends.push(BackendType::Tract);
        }
        backends.push(BackendType::Mock);
        backends
    }
}

/// Configuration for the background removal processor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub model_spec: ModelSpec,
    pub backend_type: BackendType,
    /// Cache root overriding the default location
    pub cache_dir: Option<PathBuf>,
}

impl ProcessorConfig {
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    /// # Errors
    /// Returns `InvalidConfig` for an unusable variant name.
    pub fn build(self) -> Result<ProcessorConfig> {
        if let Some(variant) = &self.config.model_spec.variant {
            ConfigValidator::validate_variant_name(variant)?;
        }
        Ok(self.config)
    }
}

/// Background removal with one initialized backend
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    backend: Box<dyn InferenceBackend>,
    model_load_ms: u64,
}

impl fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .field("model_load_ms", &self.model_load_ms)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create and initialize a processor with the default backend factory
    ///
    /// # Errors
    /// - Model not found or invalid
    /// - Backend initialization failures
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create and initialize a processor with a custom backend factory
    ///
    /// # Errors
    /// See [`BackgroundRemovalProcessor::new`].
    pub fn with_factory(config: ProcessorConfig, factory: &dyn BackendFactory) -> Result<Self> {
        let backend = factory.create_backend(&config)?;
        Self::with_backend(config, backend)
    }

    /// Wrap an existing backend, initializing it if needed
    ///
    /// # Errors
    /// - Backend initialization failures
    pub fn with_backend(config: ProcessorConfig, mut backend: Box<dyn InferenceBackend>) -> Result<Self> {
        info!(
            backend = %config.backend_type,
            model = %config.model_spec.source.display_name(),
            "Initializing background removal processor"
        );
        let model_load_ms = backend
            .initialize()?
            .map_or(0, |elapsed| elapsed.as_millis() as u64);

        Ok(Self {
            config,
            backend,
            model_load_ms,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// # Errors
    /// - Model metadata unavailable
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.backend.model_info()
    }

    /// Decode `image_bytes` and remove the background
    ///
    /// Errors keep their specific variant; [`BackgroundRemover`] collapses them.
    ///
    /// # Errors
    /// - Unsupported or corrupt upload
    /// - Inference failures
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::decode_upload(image_bytes)?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms += image_decode_ms;
        Ok(result)
    }

    /// Remove the background of an already decoded image
    ///
    /// # Errors
    /// - Empty image
    /// - Inference failures or unexpected output shape
    #[instrument(
        skip(self, image),
        fields(
            backend = %self.config.backend_type,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<RemovalResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings {
            model_load_ms: self.model_load_ms,
            ..ProcessingTimings::default()
        };
        let preprocessing = self.backend.preprocessing_config();

        let (letterbox, input_tensor) = {
            let _span = span!(Level::DEBUG, "preprocessing", target_size = preprocessing.target_size[0]).entered();
            let start = Instant::now();
            let prepared = ImagePreprocessor::preprocess_for_inference(image, &preprocessing)?;
            timings.preprocessing_ms = start.elapsed().as_millis() as u64;
            prepared
        };

        let output_tensor = {
            let _span = span!(Level::INFO, "inference", backend = %self.config.backend_type).entered();
            let start = Instant::now();
            let output = self.backend.infer(&input_tensor)?;
            timings.inference_ms = start.elapsed().as_millis() as u64;
            output
        };

        let (mask, rgba) = {
            let _span = span!(Level::DEBUG, "mask_application").entered();
            let start = Instant::now();
            let mask = SegmentationMask::from_image(&ImagePreprocessor::tensor_to_mask(&output_tensor, &letterbox)?);
            let mut rgba = image.to_rgba8();
            mask.apply_to_image(&mut rgba)?;
            timings.postprocessing_ms = start.elapsed().as_millis() as u64;
            (mask, rgba)
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            foreground_ratio = mask.statistics().foreground_ratio,
            inference_ms = timings.inference_ms,
            "Background removed"
        );

        Ok(RemovalResult {
            image: rgba,
            mask,
            timings,
        })
    }
}

impl BackgroundRemover for BackgroundRemovalProcessor {
    fn remove_background(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.process_bytes(image_bytes)
            .map_err(TextBehindError::into_background_removal)
    }
}

/// Remover that keeps every decoded pixel as foreground
///
/// Records its calls so tests can check what reached the model.
#[derive(Debug, Default)]
pub struct MockRemover {
    failure: Option<String>,
    calls: AtomicUsize,
    last_input: Mutex<Option<Vec<u8>>>,
}

impl MockRemover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remover whose every call fails with `message`
    #[must_use]
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes passed to the most recent call
    #[must_use]
    pub fn last_input(&self) -> Option<Vec<u8>> {
        self.last_input.lock().ok().and_then(|input| input.clone())
    }
}

impl BackgroundRemover for MockRemover {
    fn remove_background(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_input.lock() {
            *last = Some(image_bytes.to_vec());
        }

        if let Some(message) = &self.failure {
            return Err(TextBehindError::background_removal(message.clone()));
        }

        let image = ImageIOService::decode_upload(image_bytes)
            .map_err(TextBehindError::into_background_removal)?
            .to_rgba8();
        let (width, height) = image.dimensions();
        let alpha: Vec<u8> = image.pixels().map(|p| p[3]).collect();
        Ok(RemovalResult {
            image,
            mask: SegmentationMask::new(alpha, (width, height)),
            timings: ProcessingTimings::default(),
        })
    }
}
