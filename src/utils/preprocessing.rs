//! Image to tensor preparation and the inverse mask mapping
//!
//! The model sees a square, letterboxed copy of the upload. [`Letterbox`]
//! records how the upload was scaled and centered so the predicted mask can be
//! mapped back onto the original pixel grid.

use crate::{
    error::{Result, TextBehindError},
    models::PreprocessingConfig,
};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use ndarray::Array4;

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
        }
    }
}

/// Placement of the resized upload inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub source_width: u32,
    pub source_height: u32,
    pub target_size: u32,
    pub scale: f32,
    pub resized_width: u32,
    pub resized_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    /// Compute the aspect-preserving fit of `width` x `height` into `target_size`
    ///
    /// # Errors
    /// Returns `InvalidConfig` for empty images or a zero target size.
    pub fn fit(width: u32, height: u32, target_size: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TextBehindError::invalid_config(format!(
                "Image has empty dimensions {}x{}",
                width, height
            )));
        }
        if target_size == 0 {
            return Err(TextBehindError::invalid_config("Model input size must be positive"));
        }

        let target = target_size as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            source_width: width,
            source_height: height,
            target_size,
            scale,
            resized_width,
            resized_height,
            offset_x: (target_size - resized_width) / 2,
            offset_y: (target_size - resized_height) / 2,
        })
    }

    /// Model-space coordinates for a source pixel center
    #[must_use]
    pub fn to_model_space(&self, x: u32, y: u32) -> (u32, u32) {
        let last = self.target_size - 1;
        let mx = ((x as f32 + 0.5) * self.scale) as u32 + self.offset_x;
        let my = ((y as f32 + 0.5) * self.scale) as u32 + self.offset_y;
        (mx.min(last), my.min(last))
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess image for model inference
    ///
    /// Converts to RGB, resizes preserving aspect ratio, centers the result on a
    /// padded square canvas and normalizes into an NCHW tensor.
    ///
    /// # Errors
    /// - Empty image or zero target size
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Letterbox, Array4<f32>)> {
        let target_size = preprocessing_config.target_size[0];
        let rgb_image = image.to_rgb8();
        let (orig_width, orig_height) = rgb_image.dimensions();
        let letterbox = Letterbox::fit(orig_width, orig_height, target_size)?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.resized_width,
            letterbox.resized_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas: RgbImage = ImageBuffer::from_pixel(
            target_size,
            target_size,
            image::Rgb([padding[0], padding[1], padding[2]]),
        );
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config);
        Ok((letterbox, tensor))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
            let value = canvas.get_pixel(x as u32, y as u32)[c];
            (f32::from(value) / 255.0 - mean[c]) / std[c]
        })
    }

    /// Tensor only, with default white padding
    ///
    /// # Errors
    /// See [`ImagePreprocessor::preprocess_image`].
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Letterbox, Array4<f32>)> {
        Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())
    }

    /// Map a `[1, 1, H, W]` model output back onto the source grid as a grayscale mask
    ///
    /// Values are clamped to 0-1 before scaling to 0-255.
    ///
    /// # Errors
    /// - Output tensor does not match the letterbox size
    pub fn tensor_to_mask(tensor: &Array4<f32>, letterbox: &Letterbox) -> Result<GrayImage> {
        let shape = tensor.shape();
        let size = letterbox.target_size as usize;
        if shape.len() != 4 || shape.get(2) != Some(&size) || shape.get(3) != Some(&size) {
            return Err(TextBehindError::inference(format!(
                "Unexpected output shape {:?}, expected [1, 1, {}, {}]",
                shape, size, size
            )));
        }

        Ok(ImageBuffer::from_fn(
            letterbox.source_width,
            letterbox.source_height,
            |x, y| {
                let (mx, my) = letterbox.to_model_space(x, y);
                let value = tensor
                    .get([0, 0, my as usize, mx as usize])
                    .copied()
                    .unwrap_or(0.0);
                Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_test_preprocessing_config(size: u32) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [size, size],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }

    fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([255, 0, 0])))
    }

    #[test]
    fn test_letterbox_landscape() {
        let letterbox = Letterbox::fit(200, 100, 64).unwrap();
        assert_eq!(letterbox.resized_width, 64);
        assert_eq!(letterbox.resized_height, 32);
        assert_eq!(letterbox.offset_x, 0);
        assert_eq!(letterbox.offset_y, 16);
    }

    #[test]
    fn test_letterbox_rejects_empty_image() {
        assert!(Letterbox::fit(0, 10, 64).is_err());
        assert!(Letterbox::fit(10, 10, 0).is_err());
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = create_test_image(100, 50);
        let config = create_test_preprocessing_config(32);

        let (letterbox, tensor) = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(letterbox.offset_y, 8);

        // White padding row at the top: (1.0 - 0.5) / 1.0
        assert!((tensor[[0, 1, 0, 0]] - 0.5).abs() < 1e-6);
        // Red subject in the middle: green channel is (0.0 - 0.5) / 1.0
        assert!((tensor[[0, 1, 16, 16]] + 0.5).abs() < 1e-6);
        assert!((tensor[[0, 0, 16, 16]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_custom_padding_color() {
        let image = create_test_image(10, 40);
        let config = create_test_preprocessing_config(16);
        let options = PreprocessingOptions {
            padding_color: [0, 0, 0],
        };

        let (_, tensor) = ImagePreprocessor::preprocess_image(&image, &config, &options).unwrap();
        assert!((tensor[[0, 0, 8, 0]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_to_mask_maps_back_to_source() {
        let letterbox = Letterbox::fit(40, 20, 8).unwrap();
        // Left half foreground in model space
        let tensor = Array4::from_shape_fn((1, 1, 8, 8), |(_, _, _, x)| if x < 4 { 1.0 } else { 0.0 });

        let mask = ImagePreprocessor::tensor_to_mask(&tensor, &letterbox).unwrap();
        assert_eq!(mask.dimensions(), (40, 20));
        assert_eq!(mask.get_pixel(0, 10)[0], 255);
        assert_eq!(mask.get_pixel(39, 10)[0], 0);
    }

    #[test]
    fn test_tensor_to_mask_clamps_values() {
        let letterbox = Letterbox::fit(4, 4, 4).unwrap();
        let tensor = Array4::from_elem((1, 1, 4, 4), 3.5_f32);
        let mask = ImagePreprocessor::tensor_to_mask(&tensor, &letterbox).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 255));

        let wrong = Array4::from_elem((1, 1, 5, 5), 1.0_f32);
        assert!(ImagePreprocessor::tensor_to_mask(&wrong, &letterbox).is_err());
    }
}
