#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Text Behind Image
//!
//! Places a line of text behind the subject of a photo: a segmentation model
//! removes the background, the text is drawn on a layer over a black canvas,
//! and the cut-out subject is composited back on top.
//!
//! ## Features
//!
//! - **Background removal**: `ISNet` ONNX models run with the pure Rust Tract backend
//! - **Model management**: automatic downloading and caching of models from `HuggingFace`
//! - **Text compositing**: host TrueType fonts via `ab_glyph`, with a built-in
//!   bitmap font when the requested font is missing
//! - **CLI**: `imgly-text-behind compose photo.jpg --text HELLO` (feature `cli`)
//! - **Web page**: single-page upload form served with `axum` (feature `web`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_text_behind::{
//!     BackgroundRemovalProcessor, ComposeRequest, FontChoice, ProcessorConfig, TextBehindPipeline,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let processor = BackgroundRemovalProcessor::new(ProcessorConfig::default())?;
//! let pipeline = TextBehindPipeline::new(Arc::new(processor));
//!
//! let request = ComposeRequest::builder()
//!     .text("HELLO")
//!     .font(FontChoice::Georgia)
//!     .font_size(120)
//!     .font_color("#FFCC00")
//!     .build()?;
//!
//! let upload = std::fs::read("photo.jpg")?;
//! let outcome = pipeline.run(&upload, &request)?;
//! std::fs::write(outcome.file_name(), &outcome.png_bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Compositing only
//!
//! The compositor works on any RGBA image, so a foreground produced elsewhere
//! can be used directly:
//!
//! ```rust
//! use imgly_text_behind::{RgbaColor, TextCompositor, TextStyle};
//! use image::{Rgba, RgbaImage};
//!
//! let foreground = RgbaImage::from_pixel(120, 90, Rgba([0, 0, 0, 0]));
//! let style = TextStyle::new("arial.ttf", 40, RgbaColor::WHITE)?;
//! let result = TextCompositor::default().compose_rgba(&foreground, "HI", &style)?;
//!
//! assert_eq!(result.dimensions(), (120, 90));
//! assert_eq!(result.metadata.placement.y, 6);
//! # Ok::<(), imgly_text_behind::TextBehindError>(())
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust ONNX inference
//! - `cli` (default): command-line interface and progress bars
//! - `web` (default): HTTP server with the single-page interface
//! - `tracing-json`: JSON log output
//! - `webp-support`: accept WebP uploads

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod download;
pub mod error;
pub mod fonts;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;
#[cfg(feature = "web")]
pub mod web;

// Public API exports
pub use backends::*;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use color::RgbaColor;
pub use compositor::{text_position, TextCompositor};
pub use config::{ComposeRequest, ComposeRequestBuilder, FontChoice, FontConfig, ServerConfig, TextStyle};
pub use download::{parse_huggingface_url, validate_model_url, verify_file_integrity, ModelDownloader};
pub use error::{Result, TextBehindError};
pub use fonts::{FontResolver, ResolvedFont};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelManager, ModelSource, ModelSpec, PreprocessingConfig};
pub use pipeline::{PipelineOutcome, TextBehindPipeline};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, BackgroundRemover, DefaultBackendFactory,
    MockRemover, ProcessorConfig, ProcessorConfigBuilder,
};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressUpdate, RecordingProgressReporter,
};
pub use types::{CompositeMetadata, CompositeResult, ProcessingTimings, RemovalResult, SegmentationMask, TextPlacement};
pub use utils::{ConfigValidator, ImagePreprocessor, Letterbox, ModelSpecParser, PreprocessingOptions};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Composite `text` behind the subject of an already background-removed image
///
/// Fonts are looked up through `IMGLY_TEXT_BEHIND_FONT_DIRS` and the platform
/// font directories.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_text_behind::{add_text_behind, RgbaColor, TextStyle};
///
/// # fn example() -> anyhow::Result<()> {
/// let foreground = image::open("subject.png")?;
/// let style = TextStyle::new("times.ttf", 80, RgbaColor::from_hex("#FF0000")?)?;
/// let result = add_text_behind(&foreground, "SUMMER", &style)?;
/// result.save_png("text_behind_image.png")?;
/// # Ok(())
/// # }
/// ```
pub fn add_text_behind(foreground: &image::DynamicImage, text: &str, style: &TextStyle) -> Result<CompositeResult> {
    TextCompositor::new(FontResolver::from_env())
        .compose(foreground, text, style)
        .map_err(TextBehindError::into_compositing)
}

/// Read an upload from any async reader and run the full pipeline on it
///
/// The pipeline blocks on the model call; run this from a blocking context
/// or accept that it occupies the current task while inference runs.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_text_behind::{
///     text_behind_from_reader, BackgroundRemovalProcessor, ComposeRequest, ProcessorConfig,
///     TextBehindPipeline,
/// };
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let processor = BackgroundRemovalProcessor::new(ProcessorConfig::default())?;
/// let pipeline = TextBehindPipeline::new(Arc::new(processor));
/// let file = File::open("photo.png").await?;
/// let outcome = text_behind_from_reader(file, &pipeline, &ComposeRequest::default()).await?;
/// tokio::fs::write("text_behind_image.png", &outcome.png_bytes).await?;
/// # Ok(())
/// # }
/// ```
pub async fn text_behind_from_reader<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    pipeline: &TextBehindPipeline,
    request: &ComposeRequest,
) -> Result<PipelineOutcome> {
    let bytes = ImageIOService::read_upload_from(reader).await?;
    pipeline.run(&bytes, request)
}
