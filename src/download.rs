//! Fetching segmentation models from `HuggingFace` repositories
//!
//! Files are streamed into a hidden staging directory inside the cache and
//! moved into place only after every required file arrived, so an interrupted
//! download never looks like a cached model.

use crate::cache::ModelCache;
use crate::error::{Result, TextBehindError};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Files every model repository must provide
const REQUIRED_FILES: &[&str] = &["config.json", "preprocessor_config.json"];

/// ONNX graphs to try; at least one has to exist
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Progress bar that compiles away without the `cli` feature
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn create(show_progress: bool) -> Self {
        #[cfg(feature = "cli")]
        {
            if show_progress {
                let bar = ProgressBar::new(0);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                ) {
                    bar.set_style(style.progress_chars("#>-"));
                }
                return Self::Indicatif(bar);
            }
        }
        let _ = show_progress;
        Self::NoOp
    }

    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(bar) => bar.set_message(msg),
            Self::NoOp => {},
        }
    }

    pub fn update(&self, downloaded: u64, total: Option<u64>) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(bar) => {
                if let Some(total) = total {
                    bar.set_length(total);
                }
                bar.set_position(downloaded);
            },
            Self::NoOp => {},
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(bar) => bar.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader writing into `cache`
    ///
    /// # Errors
    /// - HTTP client construction fails
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| TextBehindError::network_error("Failed to create HTTP client", e))?;
        Ok(Self { client, cache })
    }

    /// Create a downloader for the default cache location
    ///
    /// # Errors
    /// - Cache directory unavailable
    /// - HTTP client construction fails
    pub fn with_default_cache() -> Result<Self> {
        Self::new(ModelCache::new()?)
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Download a model repository into the cache and return its model ID
    ///
    /// Already cached models are not downloaded again.
    ///
    /// # Errors
    /// - URL is not a `HuggingFace` repository
    /// - A required file cannot be fetched, or no ONNX variant exists
    /// - Filesystem errors while staging or moving files
    pub async fn download_model(&self, url: &str, show_progress: bool) -> Result<String> {
        validate_model_url(url)?;
        let model_id = ModelCache::url_to_model_id(url);

        if self.cache.is_model_cached(&model_id) {
            log::info!("✅ Model already cached: {}", model_id);
            return Ok(model_id);
        }

        log::info!("📥 Downloading model {} from {}", model_id, url);
        let staging_dir = self.create_staging_dir(&model_id)?;
        let final_dir = self.cache.get_model_path(&model_id);
        let progress = ProgressIndicator::create(show_progress);

        let outcome = match self.download_model_files(url, &staging_dir, &progress).await {
            Ok(()) => Self::promote(&staging_dir, &final_dir),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                progress.finish_with_message(format!("✅ Downloaded {}", model_id));
                log::info!("✅ Model cached at {}", final_dir.display());
                Ok(model_id)
            },
            Err(e) => {
                if staging_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&staging_dir) {
                        log::warn!("Failed to remove staging directory: {}", cleanup);
                    }
                }
                progress.finish_with_message("❌ Download failed".to_string());
                Err(e)
            },
        }
    }

    fn create_staging_dir(&self, model_id: &str) -> Result<PathBuf> {
        let staging_dir = self
            .cache
            .get_current_cache_dir()
            .join(format!(".partial-{}", model_id));

        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir).map_err(|e| {
                TextBehindError::file_io_error("remove stale staging directory", &staging_dir, &e)
            })?;
        }
        fs::create_dir_all(&staging_dir).map_err(|e| {
            TextBehindError::file_io_error("create staging directory", &staging_dir, &e)
        })?;
        Ok(staging_dir)
    }

    fn promote(staging_dir: &Path, final_dir: &Path) -> Result<()> {
        if final_dir.exists() {
            fs::remove_dir_all(final_dir).map_err(|e| {
                TextBehindError::file_io_error("replace incomplete model", final_dir, &e)
            })?;
        }
        fs::rename(staging_dir, final_dir)
            .map_err(|e| TextBehindError::file_io_error("move model into cache", final_dir, &e))
    }

    async fn download_model_files(
        &self,
        base_url: &str,
        target_dir: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        let raw_base = format!("{}/resolve/main/", base_url.trim_end_matches('/'));

        for file_name in REQUIRED_FILES {
            progress.set_message(format!("Downloading {}", file_name));
            self.download_file(&format!("{}{}", raw_base, file_name), &target_dir.join(file_name), progress)
                .await?;
        }

        let mut variants = 0;
        for (file_path, variant) in ONNX_FILES {
            progress.set_message(format!("Downloading {} model", variant));
            match self
                .download_file(&format!("{}{}", raw_base, file_path), &target_dir.join(file_path), progress)
                .await
            {
                Ok(()) => {
                    variants += 1;
                    log::info!("Downloaded {} variant", variant);
                },
                Err(e) => log::warn!("Skipping {} variant: {}", variant, e),
            }
        }

        if variants == 0 {
            return Err(TextBehindError::network_error(
                "Failed to download model",
                "repository has no onnx/model.onnx or onnx/model_fp16.onnx",
            ));
        }
        Ok(())
    }

    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TextBehindError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TextBehindError::network_error(format!("Failed to fetch {}", url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TextBehindError::network_error(
                format!("Failed to fetch {}", url),
                format!("HTTP {}", status),
            ));
        }

        let total = response.content_length();
        let mut reader = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| TextBehindError::file_io_error("create file", local_path, &e))?;

        let mut downloaded = 0_u64;
        let mut buffer = vec![0_u8; 64 * 1024];
        loop {
            let read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| TextBehindError::network_error("Failed to read download stream", e))?;
            if read == 0 {
                break;
            }
            let chunk = buffer.get(..read).unwrap_or_default();
            file.write_all(chunk)
                .await
                .map_err(|e| TextBehindError::file_io_error("write file", local_path, &e))?;
            downloaded += read as u64;
            progress.update(downloaded, total);
        }

        file.flush()
            .await
            .map_err(|e| TextBehindError::file_io_error("flush file", local_path, &e))?;
        log::debug!("Wrote {} bytes to {}", downloaded, local_path.display());
        Ok(())
    }
}

/// Compare a file's SHA-256 digest against `expected_hash` (lowercase hex)
///
/// Returns `true` when no hash is given.
///
/// # Errors
/// - File unreadable
pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
    let Some(expected) = expected_hash else {
        return Ok(true);
    };

    let contents = fs::read(file_path)
        .map_err(|e| TextBehindError::file_io_error("read file for verification", file_path, &e))?;
    let actual = format!("{:x}", Sha256::digest(&contents));

    if actual.eq_ignore_ascii_case(expected) {
        Ok(true)
    } else {
        log::warn!(
            "Checksum mismatch for {}: expected {}, got {}",
            file_path.display(),
            expected,
            actual
        );
        Ok(false)
    }
}

/// Accept only `https://huggingface.co/<owner>/<repo>` URLs
///
/// # Errors
/// Returns `InvalidConfig` for anything else.
pub fn validate_model_url(url: &str) -> Result<()> {
    parse_huggingface_url(url).map(|_| ())
}

/// Split a `HuggingFace` URL into `(owner, repository)`
///
/// # Errors
/// Returns `InvalidConfig` for empty, foreign or incomplete URLs.
pub fn parse_huggingface_url(url: &str) -> Result<(String, String)> {
    if url.is_empty() {
        return Err(TextBehindError::invalid_config("Model URL cannot be empty"));
    }

    let repo_path = url.strip_prefix(HUGGINGFACE_PREFIX).ok_or_else(|| {
        TextBehindError::invalid_config(format!(
            "Unsupported URL: {}. Only HuggingFace repositories (https://huggingface.co/owner/repo) are supported",
            url
        ))
    })?;

    let mut parts = repo_path.trim_end_matches('/').split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        },
        _ => Err(TextBehindError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {}. Expected https://huggingface.co/owner/repo",
            url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_model_url() {
        assert!(validate_model_url("https://huggingface.co/imgly/isnet-general-onnx").is_ok());
        assert!(validate_model_url("").is_err());
        assert!(validate_model_url("https://example.com/imgly/isnet").is_err());
        assert!(validate_model_url("https://huggingface.co/imgly").is_err());
        assert!(validate_model_url("https://huggingface.co/imgly/").is_err());
    }

    #[test]
    fn test_parse_huggingface_url() {
        let (owner, repo) =
            parse_huggingface_url("https://huggingface.co/imgly/isnet-general-onnx/").unwrap();
        assert_eq!(owner, "imgly");
        assert_eq!(repo, "isnet-general-onnx");
    }

    #[test]
    fn test_staging_dir_is_replaced() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        let downloader = ModelDownloader::new(cache).unwrap();

        let staging = downloader.create_staging_dir("imgly--test").unwrap();
        fs::write(staging.join("stale.bin"), b"old").unwrap();

        let staging = downloader.create_staging_dir("imgly--test").unwrap();
        assert!(staging.exists());
        assert!(!staging.join("stale.bin").exists());
        // Hidden staging dirs never count as cached models
        assert!(downloader.cache().scan_cached_models().unwrap().is_empty());
    }

    #[test]
    fn test_promote_moves_model_into_place() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        let downloader = ModelDownloader::new(cache.clone()).unwrap();

        let staging = downloader.create_staging_dir("imgly--test").unwrap();
        fs::create_dir_all(staging.join("onnx")).unwrap();
        fs::write(staging.join("preprocessor_config.json"), "{}").unwrap();
        fs::write(staging.join("onnx/model.onnx"), b"graph").unwrap();

        ModelDownloader::promote(&staging, &cache.get_model_path("imgly--test")).unwrap();
        assert!(!staging.exists());
        assert!(cache.is_model_cached("imgly--test"));
    }

    #[tokio::test]
    async fn test_download_rejects_foreign_urls() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp.path()).unwrap();
        let downloader = ModelDownloader::new(cache).unwrap();

        let err = downloader
            .download_model("https://example.com/model", false)
            .await
            .unwrap_err();
        assert!(matches!(err, TextBehindError::InvalidConfig(_)));
    }

    #[test]
    fn test_verify_file_integrity() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        fs::write(&path, b"hello").unwrap();

        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert!(verify_file_integrity(&path, Some(expected)).unwrap());
        assert!(verify_file_integrity(&path, Some(&expected.to_uppercase())).unwrap());
        assert!(!verify_file_integrity(&path, Some("deadbeef")).unwrap());
        assert!(verify_file_integrity(&path, None).unwrap());
        assert!(verify_file_integrity(&temp.path().join("missing"), Some(expected)).is_err());
    }

    #[test]
    fn test_noop_progress_indicator() {
        let progress = ProgressIndicator::create(false);
        assert!(matches!(progress, ProgressIndicator::NoOp));
        progress.set_message("hi".to_string());
        progress.update(1, Some(2));
        progress.finish_with_message("done".to_string());
    }
}
