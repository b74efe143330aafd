//! Input validation shared by the library, CLI and web handlers

use crate::config::{DEFAULT_FONT_SIZE, MAX_FONT_SIZE, MIN_FONT_SIZE};
use crate::error::{Result, TextBehindError};
use image::ImageFormat;

/// Validator for user-supplied parameters
pub struct ConfigValidator;

impl ConfigValidator {
    /// Font size must stay within the slider range
    ///
    /// # Errors
    /// Returns `InvalidConfig` outside 10..=200.
    pub fn validate_font_size(size: u32) -> Result<u32> {
        if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            return Err(TextBehindError::config_value_error(
                "font size",
                size,
                &format!("{}-{}", MIN_FONT_SIZE, MAX_FONT_SIZE),
                Some(DEFAULT_FONT_SIZE),
            ));
        }
        Ok(size)
    }

    /// Sniff the upload and accept only the formats the uploader offers
    ///
    /// # Errors
    /// - `UnsupportedFormat` for anything other than JPEG or PNG (plus WebP
    ///   when built with `webp-support`)
    /// - `InvalidConfig` for an empty upload
    pub fn validate_upload_format(bytes: &[u8]) -> Result<ImageFormat> {
        if bytes.is_empty() {
            return Err(TextBehindError::invalid_config("Uploaded file is empty"));
        }

        let format = image::guess_format(bytes).map_err(|_| {
            TextBehindError::unsupported_format("unrecognized image data (expected JPEG or PNG)")
        })?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png => Ok(format),
            #[cfg(feature = "webp-support")]
            ImageFormat::WebP => Ok(format),
            other => Err(TextBehindError::unsupported_format(format!(
                "{:?} uploads are not accepted (expected JPEG or PNG)",
                other
            ))),
        }
    }

    /// Reject decoded images with a zero dimension
    ///
    /// # Errors
    /// Returns `InvalidConfig` for empty images.
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(TextBehindError::invalid_config(format!(
                "Image dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(())
    }

    /// Variant names are used as file name fragments
    ///
    /// # Errors
    /// Returns `InvalidConfig` for empty names or names with path characters.
    pub fn validate_variant_name(variant: &str) -> Result<()> {
        if variant.is_empty()
            || !variant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(TextBehindError::invalid_config(format!(
                "Invalid model variant '{}'",
                variant
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_font_size_bounds() {
        assert_eq!(ConfigValidator::validate_font_size(10).unwrap(), 10);
        assert_eq!(ConfigValidator::validate_font_size(200).unwrap(), 200);
        let err = ConfigValidator::validate_font_size(5).unwrap_err();
        assert!(err.to_string().contains("10-200"));
        assert!(ConfigValidator::validate_font_size(201).is_err());
    }

    #[test]
    fn test_upload_formats() {
        assert_eq!(
            ConfigValidator::validate_upload_format(&encoded(ImageFormat::Png)).unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            ConfigValidator::validate_upload_format(&encoded(ImageFormat::Jpeg)).unwrap(),
            ImageFormat::Jpeg
        );

        let gif_header = b"GIF89a\x01\x00\x01\x00";
        let err = ConfigValidator::validate_upload_format(gif_header).unwrap_err();
        assert!(matches!(err, TextBehindError::UnsupportedFormat(_)));

        assert!(ConfigValidator::validate_upload_format(b"hello world").is_err());
        assert!(ConfigValidator::validate_upload_format(&[]).is_err());
    }

    #[test]
    fn test_variant_names() {
        assert!(ConfigValidator::validate_variant_name("fp16").is_ok());
        assert!(ConfigValidator::validate_variant_name("q4_f16").is_ok());
        assert!(ConfigValidator::validate_variant_name("../x").is_err());
        assert!(ConfigValidator::validate_variant_name("").is_err());
    }

    #[test]
    fn test_image_dimensions() {
        assert!(ConfigValidator::validate_image_dimensions(1, 1).is_ok());
        assert!(ConfigValidator::validate_image_dimensions(0, 5).is_err());
    }
}
