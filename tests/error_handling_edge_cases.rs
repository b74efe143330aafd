//! Error handling and boundary conditions across the public API

use image::{Rgba, RgbaImage};
use imgly_text_behind::{
    color::RgbaColor,
    config::{ComposeRequest, FontChoice, TextStyle},
    error::{Result, TextBehindError},
    models::{ModelManager, ModelSpec},
    types::encode_png,
    utils::ConfigValidator,
    BackgroundRemover, MockRemover, TextCompositor,
};
use tempfile::TempDir;

#[test]
fn test_font_size_bounds() {
    for size in [10, 11, 100, 199, 200] {
        assert!(ConfigValidator::validate_font_size(size).is_ok(), "size {}", size);
        assert!(ComposeRequest::builder().font_size(size).build().is_ok());
    }

    for size in [0, 9, 201, u32::MAX] {
        let err = ComposeRequest::builder()
            .font_size(size)
            .build()
            .expect_err("size outside the slider range");
        assert!(matches!(err, TextBehindError::InvalidConfig(_)), "size {}", size);
    }

    let err = ConfigValidator::validate_font_size(5).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid configuration: Invalid font size: 5 (valid range: 10-200). Recommended: 100"
    );
}

#[test]
fn test_font_color_parsing() {
    assert_eq!(RgbaColor::from_hex("#FFFFFF").unwrap(), RgbaColor::WHITE);
    assert_eq!(RgbaColor::from_hex("#ff8000").unwrap(), RgbaColor::opaque(255, 128, 0));
    assert_eq!(RgbaColor::from_hex("#ff8000").unwrap().to_hex(), "#FF8000");
    assert_eq!(RgbaColor::from_hex("FFFFFF").unwrap(), RgbaColor::WHITE);

    for bad in ["", "#", "#FFF", "#GGGGGG", "#FFFFFFF", "white", "#12345"] {
        let err = RgbaColor::from_hex(bad).expect_err(bad);
        assert!(matches!(err, TextBehindError::InvalidConfig(_)), "{:?}", bad);
    }
}

#[test]
fn test_font_choice_names() {
    assert_eq!("arial".parse::<FontChoice>().unwrap(), FontChoice::Arial);
    assert_eq!("times.ttf".parse::<FontChoice>().unwrap(), FontChoice::Times);
    assert_eq!(FontChoice::Georgia.to_string(), "georgia.ttf");
    assert!("comic-sans".parse::<FontChoice>().is_err());
}

#[test]
fn test_upload_format_checks() -> Result<()> {
    let png = encode_png(&RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])))?;
    assert_eq!(
        ConfigValidator::validate_upload_format(&png)?,
        image::ImageFormat::Png
    );

    let empty = ConfigValidator::validate_upload_format(&[]).unwrap_err();
    assert!(matches!(empty, TextBehindError::InvalidConfig(_)));

    let gif = ConfigValidator::validate_upload_format(b"GIF89a\x01\x00\x01\x00").unwrap_err();
    assert!(matches!(gif, TextBehindError::UnsupportedFormat(_)));
    assert!(gif.to_string().contains("expected JPEG or PNG"));

    let garbage = ConfigValidator::validate_upload_format(b"plain text, not an image").unwrap_err();
    assert!(matches!(garbage, TextBehindError::UnsupportedFormat(_)));
    Ok(())
}

#[test]
fn test_corrupt_upload_becomes_removal_error() -> Result<()> {
    let png = encode_png(&RgbaImage::from_fn(64, 64, |x, y| {
        Rgba([(x * 31 % 256) as u8, (y * 17 % 256) as u8, ((x ^ y) % 256) as u8, 255])
    }))?;
    let remover = MockRemover::new();

    let err = remover
        .remove_background(&png[..png.len() / 2])
        .expect_err("truncated PNG");
    assert!(matches!(err, TextBehindError::BackgroundRemoval(_)));
    assert!(err.to_string().starts_with("Error removing background: "));
    Ok(())
}

#[test]
fn test_missing_external_model() -> Result<()> {
    let temp = TempDir::new()?;

    let missing = ModelManager::with_external_model(temp.path().join("nope.onnx"), None)
        .expect_err("path does not exist");
    assert!(matches!(missing, TextBehindError::Model(_)));

    let not_onnx = temp.path().join("model.txt");
    std::fs::write(&not_onnx, "weights")?;
    assert!(matches!(
        ModelManager::with_external_model(&not_onnx, None),
        Err(TextBehindError::Model(_))
    ));
    Ok(())
}

#[test]
fn test_invalid_variant_rejected() {
    let spec = ModelSpec {
        variant: Some("../fp32".to_string()),
        ..ModelSpec::default()
    };
    let result = imgly_text_behind::ProcessorConfig::builder().model_spec(spec).build();
    assert!(matches!(result, Err(TextBehindError::InvalidConfig(_))));
}

#[test]
fn test_empty_image_cannot_be_composited() -> Result<()> {
    let style = TextStyle::new("arial.ttf", 50, RgbaColor::WHITE)?;
    let compositor = TextCompositor::default();

    for (width, height) in [(0, 0), (0, 10), (10, 0)] {
        let err = compositor
            .compose_rgba(&RgbaImage::new(width, height), "HI", &style)
            .expect_err("empty image");
        assert!(matches!(err, TextBehindError::Compositing(_)));
        assert!(err.to_string().starts_with("Error adding text: "));
    }
    Ok(())
}

#[test]
fn test_zero_font_size_style_rejected() {
    assert!(matches!(
        TextStyle::new("arial.ttf", 0, RgbaColor::WHITE),
        Err(TextBehindError::InvalidConfig(_))
    ));
}

#[test]
fn test_error_collapsing_and_classification() {
    let removal = TextBehindError::inference("tensor shape mismatch").into_background_removal();
    assert_eq!(
        removal.to_string(),
        "Error removing background: Inference error: tensor shape mismatch"
    );
    // Already collapsed errors are not wrapped twice
    assert_eq!(removal.to_string(), removal.into_background_removal().to_string());

    let compositing = TextBehindError::font("missing glyph table").into_compositing();
    assert_eq!(compositing.to_string(), "Error adding text: Font error: missing glyph table");

    assert!(TextBehindError::invalid_config("x").is_client_error());
    assert!(TextBehindError::unsupported_format("x").is_client_error());
    assert!(!TextBehindError::background_removal("x").is_client_error());
    assert!(!TextBehindError::compositing("x").is_client_error());
    assert!(!TextBehindError::internal("x").is_client_error());
}
