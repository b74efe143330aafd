//! Properties of the text compositor that hold for any input

use image::{Rgba, RgbaImage};
use imgly_text_behind::{
    color::RgbaColor,
    compositor::{text_position, TextCompositor},
    config::{FontConfig, TextStyle},
    error::Result,
    fonts::{FontResolver, FALLBACK_GLYPH_SIZE},
    types::CompositeResult,
};
use tempfile::TempDir;

/// Compositor that can only ever use the built-in font
fn fallback_compositor(fonts: &TempDir) -> TextCompositor {
    TextCompositor::new(FontResolver::new(
        FontConfig::default()
            .with_search_dir(fonts.path())
            .without_system_fonts(),
    ))
}

fn checkerboard(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

#[test]
fn test_output_dimensions_match_input() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("arial.ttf", 100, RgbaColor::WHITE)?;

    for (width, height) in [(1, 1), (3, 200), (200, 3), (64, 48), (333, 121)] {
        for text in ["", "A", "Your Text Here", "a much longer line than the image is wide"] {
            let result = compositor.compose_rgba(&checkerboard(width, height), text, &style)?;
            assert_eq!(result.dimensions(), (width, height), "text {:?}", text);
            assert_eq!(result.metadata.dimensions, (width, height));
        }
    }
    Ok(())
}

#[test]
fn test_compositing_is_deterministic() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("georgia.ttf", 60, RgbaColor::from_hex("#33CC99")?)?;
    let foreground = checkerboard(90, 70);

    let first = compositor.compose_rgba(&foreground, "SAME", &style)?.to_png_bytes()?;
    let second = compositor.compose_rgba(&foreground, "SAME", &style)?.to_png_bytes()?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_missing_font_falls_back() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("definitely-not-installed.ttf", 150, RgbaColor::WHITE)?;

    let result = compositor.compose_rgba(&RgbaImage::new(50, 50), "HI", &style)?;

    assert!(result.metadata.font_fallback);
    assert_eq!(result.metadata.font_name, "builtin-8x8");
    // The fallback ignores the requested size
    assert_eq!(result.metadata.placement.height, FALLBACK_GLYPH_SIZE);
    assert_eq!(result.metadata.placement.width, 2 * FALLBACK_GLYPH_SIZE);
    Ok(())
}

#[test]
fn test_unreadable_font_file_falls_back() -> Result<()> {
    let fonts = TempDir::new()?;
    std::fs::write(fonts.path().join("arial.ttf"), b"not a font at all")?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("arial.ttf", 40, RgbaColor::WHITE)?;

    let result = compositor.compose_rgba(&RgbaImage::new(30, 30), "X", &style)?;
    assert!(result.metadata.font_fallback);
    Ok(())
}

#[test]
fn test_horizontal_centering_rounds_toward_zero() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("arial.ttf", 10, RgbaColor::WHITE)?;

    // "HELLO" is 40px wide in the fallback font
    let cases = [(101, 30), (100, 30), (41, 0), (20, -10), (1, -19)];
    for (width, expected_x) in cases {
        let result = compositor.compose_rgba(&RgbaImage::new(width, 15), "HELLO", &style)?;
        assert_eq!(result.metadata.placement.x, expected_x, "width {}", width);
        assert_eq!(text_position(width, 15, 40).0, expected_x);
    }
    Ok(())
}

#[test]
fn test_vertical_position_ignores_font_size() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);

    for height in [1, 14, 15, 29, 30, 200, 1000] {
        let small = TextStyle::new("arial.ttf", 10, RgbaColor::WHITE)?;
        let large = TextStyle::new("arial.ttf", 200, RgbaColor::WHITE)?;
        let a = compositor.compose_rgba(&RgbaImage::new(40, height), "T", &small)?;
        let b = compositor.compose_rgba(&RgbaImage::new(40, height), "T", &large)?;

        assert_eq!(a.metadata.placement.y, i64::from(height / 15));
        assert_eq!(a.metadata.placement.y, b.metadata.placement.y);
    }
    Ok(())
}

#[test]
fn test_foreground_stays_on_top() -> Result<()> {
    let fonts = TempDir::new()?;
    let compositor = fallback_compositor(&fonts);
    let style = TextStyle::new("arial.ttf", 50, RgbaColor::from_hex("#00FF00")?)?;

    // Opaque left half, transparent right half
    let foreground = RgbaImage::from_fn(64, 64, |x, _| {
        if x < 32 {
            Rgba([10, 20, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    let result = compositor.compose_rgba(&foreground, "WIDE TEXT", &style)?;

    for (x, y, pixel) in result.image.enumerate_pixels() {
        assert_eq!(pixel[3], 255, "canvas is opaque at {},{}", x, y);
        if x < 32 {
            assert_eq!(*pixel, Rgba([10, 20, 30, 255]));
        } else {
            assert!(*pixel == Rgba([0, 0, 0, 255]) || *pixel == Rgba([0, 255, 0, 255]));
        }
    }
    assert!(result
        .image
        .enumerate_pixels()
        .any(|(x, _, p)| x >= 32 && *p == Rgba([0, 255, 0, 255])));
    Ok(())
}

#[test]
fn test_system_font_when_installed() -> Result<()> {
    let resolver = FontResolver::default();
    let Some(path) = ["DejaVuSans.ttf", "arial.ttf", "LiberationSans-Regular.ttf"]
        .iter()
        .find_map(|name| resolver.locate(name))
    else {
        // No scalable font on this host
        return Ok(());
    };

    let identifier = path.to_string_lossy().to_string();
    let compositor = TextCompositor::new(resolver);
    let canvas = RgbaImage::new(400, 300);
    let small_style = TextStyle::new(identifier.clone(), 20, RgbaColor::WHITE)?;
    let large_style = TextStyle::new(identifier, 80, RgbaColor::WHITE)?;
    let small = compositor.compose_rgba(&canvas, "Hello", &small_style)?;
    let large = compositor.compose_rgba(&canvas, "Hello", &large_style)?;

    assert!(!small.metadata.font_fallback);
    assert!(large.metadata.placement.width > small.metadata.placement.width);
    assert_eq!(small.metadata.placement.y, 20);
    Ok(())
}

/// Compositor and path for DejaVu Sans, the font most Linux hosts ship
fn dejavu_compositor() -> Option<(TextCompositor, String)> {
    let resolver = FontResolver::default();
    let Some(path) = resolver.locate("DejaVuSans.ttf") else {
        eprintln!("DejaVuSans.ttf not installed, skipping scalable font checks");
        return None;
    };
    Some((TextCompositor::new(resolver), path.to_string_lossy().to_string()))
}

/// Bounding box `(min_x, min_y, max_x, max_y)` of every non-black pixel
fn ink_box(result: &CompositeResult) -> Option<(u32, u32, u32, u32)> {
    result
        .image
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 0 || p[1] > 0 || p[2] > 0)
        .fold(None, |acc, (x, y, _)| match acc {
            None => Some((x, y, x, y)),
            Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
        })
}

#[test]
fn test_scalable_text_is_centered() -> Result<()> {
    let Some((compositor, font)) = dejavu_compositor() else {
        return Ok(());
    };
    let style = TextStyle::new(font, 50, RgbaColor::WHITE)?;
    let result = compositor.compose_rgba(&RgbaImage::new(200, 200), "HI", &style)?;

    let placement = result.metadata.placement;
    assert!(!result.metadata.font_fallback);
    assert_eq!(result.metadata.font_name, "DejaVuSans.ttf");
    assert_eq!(placement.x, (200 - i64::from(placement.width)) / 2);
    assert_eq!(placement.y, 13);

    let (min_x, min_y, max_x, _) = ink_box(&result).expect("text was drawn");
    assert!(i64::from(min_x) >= placement.x);
    assert!(i64::from(max_x) < placement.x + i64::from(placement.width));
    assert!(i64::from(min_y) >= placement.y);
    // Ink centre within a few pixels of the canvas centre
    let centre = (min_x + max_x) / 2;
    assert!((96..=104).contains(&centre), "ink spans {}..{}", min_x, max_x);
    Ok(())
}

#[test]
fn test_scalable_lines_are_stacked() -> Result<()> {
    let Some((compositor, font)) = dejavu_compositor() else {
        return Ok(());
    };
    let style = TextStyle::new(font, 40, RgbaColor::WHITE)?;
    let canvas = RgbaImage::new(300, 300);
    let single = compositor.compose_rgba(&canvas, "HI", &style)?;
    let double = compositor.compose_rgba(&canvas, "HI\nHI", &style)?;

    let advance = compositor.fonts().resolve(&style.font, style.size).line_advance();
    assert_eq!(double.metadata.placement.width, single.metadata.placement.width);
    assert_eq!(
        double.metadata.placement.height,
        advance + single.metadata.placement.height
    );

    let (_, single_top, _, single_bottom) = ink_box(&single).expect("text was drawn");
    let (_, double_top, _, double_bottom) = ink_box(&double).expect("text was drawn");
    assert_eq!(double_top, single_top);
    assert_eq!(double_bottom, single_bottom + advance);
    Ok(())
}
