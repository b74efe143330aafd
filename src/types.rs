//! Result and metadata types shared by the pipeline stages

use crate::error::{Result, TextBehindError};
use chrono::{DateTime, Utc};
use image::{GrayImage, ImageBuffer, ImageFormat, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Grayscale foreground mask on the source pixel grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationMask {
    /// Mask data as grayscale values (0-255), row-major
    pub data: Vec<u8>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl SegmentationMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// # Errors
    /// Returns `Internal` when the data length does not match the dimensions.
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::<Luma<u8>, _>::from_raw(width, height, self.data.clone())
            .ok_or_else(|| TextBehindError::internal("Mask data does not match its dimensions"))
    }

    /// Use the mask as the alpha channel of `image`
    ///
    /// Fully transparent pixels are cleared to `(0, 0, 0, 0)`.
    ///
    /// # Errors
    /// Returns `Internal` when the sizes differ.
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<()> {
        if image.dimensions() != self.dimensions {
            return Err(TextBehindError::internal(format!(
                "Mask is {:?} but image is {:?}",
                self.dimensions,
                image.dimensions()
            )));
        }

        for (pixel, &alpha) in image.pixels_mut().zip(&self.data) {
            if alpha == 0 {
                pixel.0 = [0, 0, 0, 0];
            } else {
                pixel.0[3] = alpha;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&value| value > 127).count();
        MaskStatistics {
            total_pixels,
            foreground_pixels,
            foreground_ratio: if total_pixels == 0 {
                0.0
            } else {
                foreground_pixels as f32 / total_pixels as f32
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    /// Pixels with mask value above 127
    pub foreground_pixels: usize,
    pub foreground_ratio: f32,
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: u64,
    pub image_decode_ms: u64,
    /// Resize, pad and normalize into the input tensor
    pub preprocessing_ms: u64,
    pub inference_ms: u64,
    /// Mask mapping and alpha application
    pub postprocessing_ms: u64,
    /// Font resolution, drawing and layer compositing
    pub compositing_ms: u64,
    pub image_encode_ms: Option<u64>,
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn measured_ms(&self) -> u64 {
        self.model_load_ms
            + self.image_decode_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.postprocessing_ms
            + self.compositing_ms
            + self.image_encode_ms.unwrap_or(0)
    }

    /// Share of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }

    /// Time not attributed to any stage
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        self.total_ms.saturating_sub(self.measured_ms())
    }

    /// Fold the stage timings of `other` into `self`, leaving `total_ms` alone
    pub fn absorb(&mut self, other: &ProcessingTimings) {
        self.model_load_ms += other.model_load_ms;
        self.image_decode_ms += other.image_decode_ms;
        self.preprocessing_ms += other.preprocessing_ms;
        self.inference_ms += other.inference_ms;
        self.postprocessing_ms += other.postprocessing_ms;
        self.compositing_ms += other.compositing_ms;
        if let Some(encode) = other.image_encode_ms {
            self.image_encode_ms = Some(self.image_encode_ms.unwrap_or(0) + encode);
        }
    }
}

/// Output of background removal with its mask and timings
#[derive(Debug, Clone)]
pub struct RemovalResult {
    /// Upload with the mask applied as alpha
    pub image: RgbaImage,
    pub mask: SegmentationMask,
    pub timings: ProcessingTimings,
}

impl RemovalResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// # Errors
    /// Returns `Image` if PNG encoding fails.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }
}

/// Where the text landed on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPlacement {
    /// Left edge; negative when the text is wider than the image
    pub x: i64,
    /// Top edge, `height / 15`
    pub y: i64,
    /// Measured advance width in pixels
    pub width: u32,
    /// Measured line height in pixels
    pub height: u32,
}

/// How a composite was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeMetadata {
    pub dimensions: (u32, u32),
    pub placement: TextPlacement,
    /// Font that was actually drawn
    pub font_name: String,
    /// Requested font could not be loaded and the built-in bitmap font was used
    pub font_fallback: bool,
    pub timings: ProcessingTimings,
    pub processed_at: DateTime<Utc>,
}

/// A flattened text-behind-subject image
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: RgbaImage,
    pub metadata: CompositeMetadata,
}

impl CompositeResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// PNG bytes offered for download
    ///
    /// # Errors
    /// Returns `Image` if PNG encoding fails.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// # Errors
    /// - PNG encoding fails
    /// - The file cannot be written
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_png_bytes()?;
        std::fs::write(path, bytes).map_err(|e| TextBehindError::file_io_error("write image", path, &e))
    }
}

/// Encode an RGBA image as PNG
///
/// # Errors
/// Returns `Image` if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_mask_application_clears_background() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let mask = SegmentationMask::new(vec![0, 128], (2, 1));
        mask.apply_to_image(&mut image).unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let mut image = RgbaImage::new(3, 3);
        let mask = SegmentationMask::new(vec![255; 4], (2, 2));
        assert!(mask.apply_to_image(&mut image).is_err());

        let broken = SegmentationMask::new(vec![255; 3], (2, 2));
        assert!(broken.to_image().is_err());
    }

    #[test]
    fn test_mask_statistics() {
        let mask = SegmentationMask::new(vec![0, 255, 200, 100], (2, 2));
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_timings() {
        let mut timings = ProcessingTimings {
            inference_ms: 50,
            compositing_ms: 10,
            total_ms: 100,
            ..ProcessingTimings::default()
        };
        assert!((timings.inference_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(timings.other_overhead_ms(), 40);

        timings.absorb(&ProcessingTimings {
            inference_ms: 5,
            image_encode_ms: Some(3),
            total_ms: 999,
            ..ProcessingTimings::default()
        });
        assert_eq!(timings.inference_ms, 55);
        assert_eq!(timings.image_encode_ms, Some(3));
        assert_eq!(timings.total_ms, 100);
    }

    #[test]
    fn test_encode_png_signature() {
        let bytes = encode_png(&RgbaImage::new(3, 2)).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }
}
