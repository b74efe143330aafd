//! Segmentation model resolution and metadata

use crate::cache::ModelCache;
use crate::error::{Result, TextBehindError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// External model from a filesystem path (a `.onnx` file or a model folder)
    External(PathBuf),
    /// Downloaded model from cache by model ID
    Downloaded(String),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Downloaded(model_id) => format!("cached:{}", model_id),
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Downloaded(ModelCache::get_default_model_id()),
            variant: None,
        }
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Tensor preparation parameters for a model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input size `[width, height]`
    pub target_size: [u32; 2],
    /// Per-channel mean in the 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    /// `ISNet` defaults: 1024x1024, mean 128/255, std 256/255
    fn default() -> Self {
        Self {
            target_size: [1024, 1024],
            normalization_mean: [128.0 / 255.0; 3],
            normalization_std: [256.0 / 255.0; 3],
        }
    }
}

/// `size` entry of a `HuggingFace` `preprocessor_config.json`
#[derive(Debug, Deserialize)]
struct HuggingFaceSize {
    width: u32,
    height: u32,
}

/// The subset of `preprocessor_config.json` used for tensor preparation
#[derive(Debug, Deserialize)]
struct HuggingFacePreprocessor {
    size: Option<HuggingFaceSize>,
    image_mean: Option<Vec<f32>>,
    image_std: Option<Vec<f32>>,
}

impl HuggingFacePreprocessor {
    /// Convert 0-255 range statistics into a `PreprocessingConfig`
    fn into_config(self) -> Result<PreprocessingConfig> {
        let defaults = PreprocessingConfig::default();

        let target_size = match self.size {
            Some(size) if size.width == 0 || size.height == 0 => {
                return Err(TextBehindError::model(
                    "preprocessor_config.json: size must be positive",
                ))
            },
            Some(size) => [size.width, size.height],
            None => defaults.target_size,
        };

        Ok(PreprocessingConfig {
            target_size,
            normalization_mean: Self::channels(self.image_mean.as_deref(), "image_mean")?
                .unwrap_or(defaults.normalization_mean),
            normalization_std: Self::channels(self.image_std.as_deref(), "image_std")?
                .unwrap_or(defaults.normalization_std),
        })
    }

    fn channels(values: Option<&[f32]>, field: &str) -> Result<Option<[f32; 3]>> {
        let Some(values) = values else {
            return Ok(None);
        };
        match values {
            [r, g, b, ..] => {
                let channels = [r / 255.0, g / 255.0, b / 255.0];
                if field == "image_std" && channels.iter().any(|std| *std <= 0.0) {
                    return Err(TextBehindError::model(
                        "preprocessor_config.json: image_std must be positive",
                    ));
                }
                Ok(Some(channels))
            },
            _ => Err(TextBehindError::model(format!(
                "preprocessor_config.json: {} must have at least 3 values",
                field
            ))),
        }
    }
}

/// Resolves a `ModelSpec` into a concrete ONNX file and its preprocessing
#[derive(Debug, Clone)]
pub struct ModelManager {
    name: String,
    variant: String,
    model_file: PathBuf,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Create a model manager from a model specification
    ///
    /// # Errors
    /// - Downloaded model not present in the cache
    /// - External path does not exist or contains no ONNX file
    /// - Requested variant not available
    /// - Malformed `preprocessor_config.json`
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        match &spec.source {
            ModelSource::Downloaded(_) => {
                let cache = ModelCache::new()?;
                Self::from_spec_with_cache(spec, &cache)
            },
            ModelSource::External(path) => Self::with_external_model(path, spec.variant.as_deref()),
        }
    }

    /// Create a model manager resolving downloaded models against `cache`
    ///
    /// # Errors
    /// See [`ModelManager::from_spec`].
    pub fn from_spec_with_cache(spec: &ModelSpec, cache: &ModelCache) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => Self::with_external_model(path, spec.variant.as_deref()),
            ModelSource::Downloaded(model_id) => {
                if !cache.is_model_cached(model_id) {
                    let available: Vec<String> = cache
                        .scan_cached_models()?
                        .into_iter()
                        .map(|m| m.model_id)
                        .collect();
                    return Err(TextBehindError::model(format!(
                        "Model '{}' not found in cache. Available models: {:?}",
                        model_id, available
                    )));
                }
                let model_dir = cache.get_model_path(model_id);
                Self::from_directory(model_id.clone(), &model_dir, spec.variant.as_deref())
            },
        }
    }

    /// Create a model manager for a model file or folder on disk
    ///
    /// # Errors
    /// See [`ModelManager::from_spec`].
    pub fn with_external_model<P: AsRef<Path>>(path: P, variant: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TextBehindError::model(format!(
                "Model path does not exist: {}",
                path.display()
            )));
        }

        let name = path
            .file_stem()
            .map_or_else(|| "external".to_string(), |s| s.to_string_lossy().to_string());

        if path.is_file() {
            let is_onnx = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
            if !is_onnx {
                return Err(TextBehindError::model(format!(
                    "Expected an .onnx model file, got {}",
                    path.display()
                )));
            }
            let preprocessing = path
                .parent()
                .map(Self::load_preprocessing)
                .transpose()?
                .unwrap_or_default();
            return Ok(Self {
                name,
                variant: variant.unwrap_or("fp32").to_string(),
                model_file: path.to_path_buf(),
                preprocessing,
            });
        }

        Self::from_directory(name, path, variant)
    }

    fn from_directory(name: String, model_dir: &Path, variant: Option<&str>) -> Result<Self> {
        let variants = Self::scan_variants(model_dir);
        if variants.is_empty() {
            return Err(TextBehindError::model(format!(
                "No ONNX model files found in {}",
                model_dir.display()
            )));
        }

        let (variant, model_file) = match variant {
            Some(requested) => variants
                .iter()
                .find(|(v, _)| v == requested)
                .cloned()
                .ok_or_else(|| {
                    TextBehindError::model(format!(
                        "Variant '{}' not available. Available variants: {:?}",
                        requested,
                        variants.iter().map(|(v, _)| v.as_str()).collect::<Vec<_>>()
                    ))
                })?,
            // Tract runs fp32 graphs natively
            None => variants
                .iter()
                .find(|(v, _)| v == "fp32")
                .or_else(|| variants.first())
                .cloned()
                .ok_or_else(|| TextBehindError::internal("variant list unexpectedly empty"))?,
        };

        Ok(Self {
            name,
            variant,
            model_file,
            preprocessing: Self::load_preprocessing(model_dir)?,
        })
    }

    /// List `(variant, file)` pairs in `dir/onnx` and `dir`, sorted by variant
    #[must_use]
    pub fn scan_variants(model_dir: &Path) -> Vec<(String, PathBuf)> {
        let mut variants = Vec::new();
        for dir in [model_dir.join("onnx"), model_dir.to_path_buf()] {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
                    continue;
                };
                let Some(stem) = file_name
                    .strip_suffix(".onnx")
                    .or_else(|| file_name.strip_suffix(".ONNX"))
                else {
                    continue;
                };
                let variant = match stem {
                    "model" => "fp32".to_string(),
                    other => other.strip_prefix("model_").unwrap_or(other).to_string(),
                };
                if !variants.iter().any(|(v, _)| *v == variant) {
                    variants.push((variant, path));
                }
            }
        }
        variants.sort_by(|a, b| a.0.cmp(&b.0));
        variants
    }

    /// Read `preprocessor_config.json` from `model_dir`, defaulting when absent
    fn load_preprocessing(model_dir: &Path) -> Result<PreprocessingConfig> {
        let config_path = model_dir.join("preprocessor_config.json");
        if !config_path.exists() {
            log::debug!(
                "No preprocessor_config.json in {}, using defaults",
                model_dir.display()
            );
            return Ok(PreprocessingConfig::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            TextBehindError::file_io_error("read preprocessor_config.json", &config_path, &e)
        })?;
        let parsed: HuggingFacePreprocessor = serde_json::from_str(&content).map_err(|e| {
            TextBehindError::model(format!("Failed to parse preprocessor_config.json: {}", e))
        })?;
        parsed.into_config()
    }

    /// Load model data
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_file)
            .map_err(|e| TextBehindError::file_io_error("read model file", &self.model_file, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata unavailable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let metadata = fs::metadata(&self.model_file).map_err(|e| {
            TextBehindError::file_io_error("inspect model file", &self.model_file, &e)
        })?;
        let [width, height] = self.preprocessing.target_size;
        Ok(ModelInfo {
            name: self.name.clone(),
            precision: self.variant.clone(),
            size_bytes: usize::try_from(metadata.len()).unwrap_or(usize::MAX),
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing
    }

    #[must_use]
    pub fn get_model_path(&self) -> &Path {
        &self.model_file
    }

    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }
}
