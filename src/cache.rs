//! On-disk cache of downloaded segmentation models
//!
//! Models live in `<cache>/models/<model-id>/` using the `HuggingFace` layout
//! (`config.json`, `preprocessor_config.json`, `onnx/model*.onnx`). The cache
//! root follows the platform cache directory unless
//! `IMGLY_TEXT_BEHIND_CACHE_DIR` overrides it.

use crate::error::{Result, TextBehindError};
use crate::models::ModelManager;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "IMGLY_TEXT_BEHIND_CACHE_DIR";

const DEFAULT_MODEL_URL: &str = "https://huggingface.co/imgly/isnet-general-onnx";
const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Summary of one cached model for `list-models`
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    pub model_id: String,
    pub path: PathBuf,
    pub has_preprocessor: bool,
    /// ONNX variants found under `onnx/` (fp16, fp32, ...)
    pub variants: Vec<String>,
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the cache at the default location, creating it when missing
    ///
    /// # Errors
    /// - No platform cache directory and no override set
    /// - Cache directory cannot be created
    pub fn new() -> Result<Self> {
        Self::at(Self::resolve_models_dir()?)
    }

    /// Open a cache rooted at `cache_dir` (models go into `cache_dir/models`)
    ///
    /// # Errors
    /// - Cache directory cannot be created
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        Self::at(cache_dir.join("models"))
    }

    fn at(models_dir: PathBuf) -> Result<Self> {
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).map_err(|e| {
                TextBehindError::file_io_error("create cache directory", &models_dir, &e)
            })?;
        }
        Ok(Self {
            cache_dir: models_dir,
        })
    }

    fn resolve_models_dir() -> Result<PathBuf> {
        if let Some(root) = std::env::var_os(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(root).join("models"));
        }

        dirs::cache_dir()
            .map(|dir| dir.join("imgly-text-behind").join("models"))
            .ok_or_else(|| {
                TextBehindError::invalid_config(format!(
                    "Failed to determine cache directory. Set {} to choose one.",
                    CACHE_DIR_ENV
                ))
            })
    }

    /// Derive a filesystem-safe model ID from a download URL
    ///
    /// ```
    /// use imgly_text_behind::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(id, "imgly--isnet-general-onnx");
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(repo) = url.strip_prefix(HUGGINGFACE_PREFIX) {
            return repo.trim_end_matches('/').replace('/', "--");
        }

        let digest = format!("url-{:x}", Sha256::digest(url.as_bytes()));
        digest.chars().take(16).collect()
    }

    #[must_use]
    pub fn get_default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    #[must_use]
    pub fn get_default_model_url() -> &'static str {
        DEFAULT_MODEL_URL
    }

    /// Whether `model_id` is present and complete
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        Self::is_complete(&self.get_model_path(model_id))
    }

    /// Directory of a model, which may not exist yet
    #[must_use]
    pub fn get_model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    #[must_use]
    pub fn get_current_cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn is_complete(model_dir: &Path) -> bool {
        model_dir.join("preprocessor_config.json").is_file()
            && !ModelManager::scan_variants(&model_dir.join("onnx")).is_empty()
    }

    /// List complete models, sorted by ID
    ///
    /// # Errors
    /// - Cache directory unreadable
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();
        for model_dir in self.model_dirs()? {
            if !Self::is_complete(&model_dir) {
                log::debug!("Skipping incomplete model directory: {}", model_dir.display());
                continue;
            }
            let Some(model_id) = model_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            models.push(CachedModelInfo {
                model_id: model_id.to_string(),
                variants: ModelManager::scan_variants(&model_dir)
                    .into_iter()
                    .map(|(variant, _)| variant)
                    .collect(),
                has_preprocessor: model_dir.join("preprocessor_config.json").exists(),
                size_bytes: directory_size(&model_dir),
                path: model_dir,
            });
        }

        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    fn model_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            TextBehindError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| TextBehindError::file_io_error("read cache entry", &self.cache_dir, &e))?
                .path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }

    /// Remove every model directory, returning the removed IDs
    ///
    /// # Errors
    /// - A model directory cannot be removed
    pub fn clear_all_models(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for model_dir in self.model_dirs()? {
            let model_id = model_dir
                .file_name()
                .map_or_else(|| "unknown".to_string(), |n| n.to_string_lossy().to_string());
            log::info!("🗑️ Removing cached model: {}", model_id);
            fs::remove_dir_all(&model_dir).map_err(|e| {
                TextBehindError::file_io_error("remove cached model", &model_dir, &e)
            })?;
            removed.push(model_id);
        }
        removed.sort();
        Ok(removed)
    }

    /// Remove one model; `false` when it was not cached
    ///
    /// # Errors
    /// - The model directory cannot be removed
    pub fn clear_specific_model(&self, model_id: &str) -> Result<bool> {
        let model_dir = self.get_model_path(model_id);
        if !model_dir.exists() {
            return Ok(false);
        }

        log::info!("🗑️ Removing cached model: {}", model_id);
        fs::remove_dir_all(&model_dir)
            .map_err(|e| TextBehindError::file_io_error("remove cached model", &model_dir, &e))?;
        Ok(true)
    }
}

fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let label = UNITS.get(unit).copied().unwrap_or("B");
    if unit == 0 {
        format!("{} {}", bytes, label)
    } else {
        format!("{:.1} {}", size, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_model(cache: &ModelCache, model_id: &str, onnx_files: &[&str]) -> PathBuf {
        let dir = cache.get_model_path(model_id);
        fs::create_dir_all(dir.join("onnx")).unwrap();
        fs::write(dir.join("config.json"), "{}").unwrap();
        fs::write(dir.join("preprocessor_config.json"), "{}").unwrap();
        for file in onnx_files {
            fs::write(dir.join("onnx").join(file), vec![0_u8; 10]).unwrap();
        }
        dir
    }

    #[test]
    fn test_url_to_model_id() {
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx"),
            "imgly--isnet-general-onnx"
        );
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx/"),
            "imgly--isnet-general-onnx"
        );

        let hashed = ModelCache::url_to_model_id("https://example.com/model.zip");
        assert!(hashed.starts_with("url-"));
        assert_eq!(hashed.len(), 16);
        assert_eq!(hashed, ModelCache::url_to_model_id("https://example.com/model.zip"));
    }

    #[test]
    fn test_default_model() {
        assert_eq!(ModelCache::get_default_model_id(), "imgly--isnet-general-onnx");
        assert!(ModelCache::get_default_model_url().starts_with(HUGGINGFACE_PREFIX));
    }

    #[test]
    fn test_custom_cache_dir() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(&temp.path().join("custom")).unwrap();
        assert_eq!(cache.get_current_cache_dir(), temp.path().join("custom").join("models"));
        assert!(cache.get_current_cache_dir().exists());
    }

    #[test]
    fn test_scan_skips_incomplete_models() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        create_model(&cache, "zeta--model", &["model.onnx", "model_fp16.onnx"]);
        create_model(&cache, "alpha--model", &["model_fp16.onnx"]);
        // Interrupted download: no onnx files
        create_model(&cache, "broken--model", &[]);

        let models = cache.scan_cached_models().unwrap();
        let ids: Vec<&str> = models.iter().map(|m| m.model_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha--model", "zeta--model"]);

        let zeta = models.iter().find(|m| m.model_id == "zeta--model").unwrap();
        assert_eq!(zeta.variants, vec!["fp16", "fp32"]);
        assert!(zeta.has_preprocessor);
        assert!(zeta.size_bytes >= 20);

        assert!(cache.is_model_cached("alpha--model"));
        assert!(!cache.is_model_cached("broken--model"));
        assert!(!cache.is_model_cached("missing--model"));
    }

    #[test]
    fn test_clear_models() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        create_model(&cache, "one", &["model.onnx"]);
        create_model(&cache, "two", &["model.onnx"]);
        create_model(&cache, "three", &["model.onnx"]);

        assert!(cache.clear_specific_model("two").unwrap());
        assert!(!cache.clear_specific_model("two").unwrap());

        let removed = cache.clear_all_models().unwrap();
        assert_eq!(removed, vec!["one", "three"]);
        assert!(cache.scan_cached_models().unwrap().is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(176 * 1024 * 1024), "176.0 MB");
    }
}
