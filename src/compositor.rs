//! Text-behind-subject compositing
//!
//! Layers, bottom to top:
//!
//! 1. an opaque black canvas,
//! 2. a transparent layer carrying the text,
//! 3. the background-removed foreground.
//!
//! The foreground's own alpha lets the black canvas and the text show through
//! wherever the background was removed.

use crate::color::RgbaColor;
use crate::config::{TextStyle, MAX_RENDER_FONT_SIZE};
use crate::error::{Result, TextBehindError};
use crate::fonts::FontResolver;
use crate::types::{CompositeMetadata, CompositeResult, ProcessingTimings, TextPlacement};
use chrono::Utc;
use image::{imageops, DynamicImage, RgbaImage};
use instant::Instant;
use tracing::instrument;

/// Divisor placing the text's top edge at `height / 15`
pub const TEXT_TOP_DIVISOR: u32 = 15;

/// Top-left corner for a block of text `text_width` pixels wide
///
/// Horizontally centered with the division rounding toward zero, so the x
/// coordinate is negative when the text is wider than the image.
#[must_use]
pub fn text_position(image_width: u32, image_height: u32, text_width: u32) -> (i64, i64) {
    let x = (i64::from(image_width) - i64::from(text_width)) / 2;
    let y = i64::from(image_height / TEXT_TOP_DIVISOR);
    (x, y)
}

/// Draws text behind the subject of a background-removed image
#[derive(Debug, Clone, Default)]
pub struct TextCompositor {
    fonts: FontResolver,
}

impl TextCompositor {
    #[must_use]
    pub fn new(fonts: FontResolver) -> Self {
        Self { fonts }
    }

    #[must_use]
    pub fn fonts(&self) -> &FontResolver {
        &self.fonts
    }

    /// Composite `text` behind `foreground`, converting it to RGBA first
    ///
    /// # Errors
    /// Returns `Compositing` for an empty image or an unrenderable size.
    pub fn compose(
        &self,
        foreground: &DynamicImage,
        text: &str,
        style: &TextStyle,
    ) -> Result<CompositeResult> {
        self.compose_rgba(&foreground.to_rgba8(), text, style)
    }

    /// Composite `text` behind an RGBA foreground
    ///
    /// A font that cannot be loaded is replaced by the built-in bitmap font;
    /// `metadata.font_fallback` records the substitution.
    ///
    /// # Errors
    /// Returns `Compositing` for an empty image or a style whose size is zero
    /// or above [`MAX_RENDER_FONT_SIZE`].
    #[instrument(skip(self, foreground, text), fields(width = foreground.width(), height = foreground.height(), font = %style.font, size = style.size))]
    pub fn compose_rgba(
        &self,
        foreground: &RgbaImage,
        text: &str,
        style: &TextStyle,
    ) -> Result<CompositeResult> {
        let start = Instant::now();
        let (width, height) = foreground.dimensions();
        if width == 0 || height == 0 {
            return Err(TextBehindError::compositing(format!(
                "Cannot draw on an empty {}x{} image",
                width, height
            )));
        }
        // Glyphs are rasterized whole even when off-canvas
        if style.size == 0 || style.size > MAX_RENDER_FONT_SIZE {
            return Err(TextBehindError::compositing(format!(
                "Font size {} cannot be rendered (valid range: 1-{})",
                style.size, MAX_RENDER_FONT_SIZE
            )));
        }

        let mut canvas = RgbaImage::from_pixel(width, height, RgbaColor::BLACK.to_pixel());
        // Text color at zero alpha so antialiased edges keep the text color
        let mut text_layer = RgbaImage::from_pixel(width, height, style.color.transparent().to_pixel());

        let font = self.fonts.resolve(&style.font, style.size);
        let (text_width, text_height) = font.measure(text);
        let (x, y) = text_position(width, height, text_width);
        font.draw(&mut text_layer, style.color.to_pixel(), x, y, text);

        imageops::overlay(&mut canvas, &text_layer, 0, 0);
        imageops::overlay(&mut canvas, foreground, 0, 0);

        let compositing_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(x, y, text_width, fallback = font.is_fallback(), compositing_ms, "Composited text layer");

        Ok(CompositeResult {
            image: canvas,
            metadata: CompositeMetadata {
                dimensions: (width, height),
                placement: TextPlacement {
                    x,
                    y,
                    width: text_width,
                    height: text_height,
                },
                font_name: font.name().to_string(),
                font_fallback: font.is_fallback(),
                timings: ProcessingTimings {
                    compositing_ms,
                    total_ms: compositing_ms,
                    ..ProcessingTimings::default()
                },
                processed_at: Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FontConfig;
    use image::Rgba;
    use tempfile::TempDir;

    fn compositor_without_fonts(temp: &TempDir) -> TextCompositor {
        TextCompositor::new(FontResolver::new(
            FontConfig::default()
                .with_search_dir(temp.path())
                .without_system_fonts(),
        ))
    }

    fn style(size: u32, color: RgbaColor) -> TextStyle {
        TextStyle::new("arial.ttf", size, color).unwrap()
    }

    #[test]
    fn test_text_position() {
        assert_eq!(text_position(200, 200, 16), (92, 13));
        assert_eq!(text_position(201, 14, 16), (92, 0));
        // Wider than the image: rounds toward zero, not down
        assert_eq!(text_position(10, 30, 15), (-2, 2));
        assert_eq!(text_position(0, 0, 0), (0, 0));
    }

    #[test]
    fn test_transparent_foreground_shows_black_and_text() {
        let temp = TempDir::new().unwrap();
        let compositor = compositor_without_fonts(&temp);
        let foreground = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 0]));

        let result = compositor
            .compose_rgba(&foreground, "HI", &style(50, RgbaColor::opaque(0, 255, 0)))
            .unwrap();

        assert!(result.metadata.font_fallback);
        assert_eq!(result.metadata.placement, TextPlacement { x: 24, y: 4, width: 16, height: 8 });
        assert_eq!(result.image.get_pixel(0, 63), &Rgba([0, 0, 0, 255]));

        let green = result
            .image
            .pixels()
            .filter(|p| **p == Rgba([0, 255, 0, 255]))
            .count();
        assert!(green > 0);
        // Text stays within its measured box
        for (px, py, pixel) in result.image.enumerate_pixels() {
            if pixel[1] == 255 {
                assert!((24..40).contains(&px) && (4..12).contains(&py));
            }
        }
    }

    #[test]
    fn test_opaque_foreground_hides_text() {
        let temp = TempDir::new().unwrap();
        let compositor = compositor_without_fonts(&temp);
        let foreground = RgbaImage::from_pixel(32, 32, Rgba([255, 0, 0, 255]));

        let result = compositor
            .compose_rgba(&foreground, "TEXT", &style(100, RgbaColor::WHITE))
            .unwrap();
        assert!(result.image.pixels().all(|p| *p == Rgba([255, 0, 0, 255])));
    }

    #[test]
    fn test_empty_text_and_rgb_input() {
        let temp = TempDir::new().unwrap();
        let compositor = compositor_without_fonts(&temp);
        let foreground = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(7, 5, image::Rgb([1, 2, 3])));

        let result = compositor.compose(&foreground, "", &style(10, RgbaColor::WHITE)).unwrap();
        assert_eq!(result.dimensions(), (7, 5));
        assert_eq!(result.metadata.placement.x, 3);
        assert!(result.image.pixels().all(|p| *p == Rgba([1, 2, 3, 255])));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let temp = TempDir::new().unwrap();
        let compositor = compositor_without_fonts(&temp);
        let err = compositor
            .compose_rgba(&RgbaImage::new(0, 10), "HI", &style(10, RgbaColor::WHITE))
            .unwrap_err();
        assert!(err.to_string().starts_with("Error adding text"));
    }

    #[test]
    fn test_oversized_font_is_rejected_without_drawing() {
        let compositor = TextCompositor::default();
        let foreground = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 0]));

        for size in [0, MAX_RENDER_FONT_SIZE + 1, u32::MAX] {
            // Public fields bypass the constructor's check
            let style = TextStyle {
                font: "DejaVuSans.ttf".to_string(),
                size,
                color: RgbaColor::WHITE,
            };
            let err = compositor.compose_rgba(&foreground, "H", &style).unwrap_err();
            assert!(matches!(err, TextBehindError::Compositing(_)), "size {}", size);
            assert!(err.to_string().starts_with("Error adding text: Font size"));
        }
    }

    #[test]
    fn test_half_transparent_foreground_blends() {
        let temp = TempDir::new().unwrap();
        let compositor = compositor_without_fonts(&temp);
        let foreground = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 128]));

        let result = compositor.compose_rgba(&foreground, "", &style(10, RgbaColor::WHITE)).unwrap();
        let pixel = result.image.get_pixel(0, 0);
        assert_eq!(pixel[3], 255);
        assert!((127..=129).contains(&pixel[0]));
    }
}
