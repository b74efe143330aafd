//! Image I/O operations service
//!
//! Reading uploads (files, stdin or any async reader), decoding them with a
//! format check, and writing PNG results.

use crate::{
    error::{Result, TextBehindError},
    types::encode_png,
    utils::ConfigValidator,
};
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read an upload from disk, checking that it is JPEG or PNG
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - `UnsupportedFormat` for other formats
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_text_behind::services::ImageIOService;
    ///
    /// let bytes = ImageIOService::read_upload("photo.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn read_upload<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| TextBehindError::file_io_error("read image file", path, &e))?;
        ConfigValidator::validate_upload_format(&bytes)?;
        Ok(bytes)
    }

    /// Read an upload from an async reader such as stdin
    ///
    /// # Errors
    /// - Reader fails
    /// - `UnsupportedFormat` for formats other than JPEG or PNG
    pub async fn read_upload_from<R: AsyncRead + Unpin>(mut reader: R) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        ConfigValidator::validate_upload_format(&bytes)?;
        Ok(bytes)
    }

    /// Decode upload bytes after the format check
    ///
    /// # Errors
    /// - `UnsupportedFormat` or `InvalidConfig` from the format check
    /// - `Image` when the data is truncated or corrupt
    pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage> {
        let format = ConfigValidator::validate_upload_format(bytes)?;
        let image = image::load_from_memory_with_format(bytes, format)?;
        ConfigValidator::validate_image_dimensions(image.width(), image.height())?;
        Ok(image)
    }

    /// Encode as PNG and write to `path`, creating parent directories
    ///
    /// # Errors
    /// - Encoding fails
    /// - The file or its directory cannot be written
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TextBehindError::file_io_error("create output directory", parent, &e))?;
        }
        let bytes = encode_png(image)?;
        std::fs::write(path, &bytes)
            .map_err(|e| TextBehindError::file_io_error("write output image", path, &e))?;
        Ok(bytes.len() as u64)
    }

    /// Write already encoded bytes to an async writer such as stdout
    ///
    /// # Errors
    /// - Writer fails
    pub async fn write_to<W: AsyncWrite + Unpin>(bytes: &[u8], mut writer: W) -> Result<u64> {
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(bytes.len() as u64)
    }
}
