//! Upload to download orchestration
//!
//! [`TextBehindPipeline`] sequences the two fallible transformations and PNG
//! encoding. It stops at the first failed stage and reports that stage to
//! its [`ProgressReporter`].

use crate::{
    compositor::TextCompositor,
    config::{ComposeRequest, DOWNLOAD_FILE_NAME},
    error::{Result, TextBehindError},
    fonts::FontResolver,
    processor::BackgroundRemover,
    services::{NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate},
    types::{encode_png, CompositeResult, ProcessingTimings, RemovalResult},
    utils::ConfigValidator,
};
use image::{ImageReader, RgbaImage};
use instant::Instant;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Size of the uploaded image
    pub original_dimensions: (u32, u32),
    /// Upload with its background removed
    pub background_removed: RgbaImage,
    pub composite: CompositeResult,
    /// Encoded download, see [`PipelineOutcome::file_name`]
    pub png_bytes: Vec<u8>,
    /// Stage timings across the whole run
    pub timings: ProcessingTimings,
}

impl PipelineOutcome {
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        DOWNLOAD_FILE_NAME
    }
}

/// Background removal followed by text compositing
#[derive(Clone)]
pub struct TextBehindPipeline {
    remover: Arc<dyn BackgroundRemover>,
    compositor: TextCompositor,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for TextBehindPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBehindPipeline")
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}

impl TextBehindPipeline {
    /// Pipeline with fonts found through the environment and no progress output
    #[must_use]
    pub fn new(remover: Arc<dyn BackgroundRemover>) -> Self {
        Self {
            remover,
            compositor: TextCompositor::new(FontResolver::from_env()),
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    #[must_use]
    pub fn with_compositor(mut self, compositor: TextCompositor) -> Self {
        self.compositor = compositor;
        self
    }

    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn compositor(&self) -> &TextCompositor {
        &self.compositor
    }

    /// First stage on its own
    ///
    /// # Errors
    /// Returns `BackgroundRemoval` for undecodable bytes or a model failure.
    pub fn remove_background(&self, image_bytes: &[u8]) -> Result<RemovalResult> {
        self.remover
            .remove_background(image_bytes)
            .map_err(TextBehindError::into_background_removal)
    }

    /// Second stage on its own, for a foreground that already has its alpha
    ///
    /// # Errors
    /// Returns `Compositing` when the text cannot be drawn.
    pub fn compose(&self, foreground: &RgbaImage, request: &ComposeRequest) -> Result<CompositeResult> {
        self.compositor
            .compose_rgba(foreground, &request.text, &request.style)
            .map_err(TextBehindError::into_compositing)
    }

    /// Run every stage on one upload
    ///
    /// # Errors
    /// - `UnsupportedFormat` or `Image` when the upload cannot be read
    /// - `BackgroundRemoval` when the model fails
    /// - `Compositing` when the text cannot be drawn
    /// - `Image` when PNG encoding fails
    #[instrument(skip(self, image_bytes, request), fields(bytes = image_bytes.len(), text_len = request.text.len()))]
    pub fn run(&self, image_bytes: &[u8], request: &ComposeRequest) -> Result<PipelineOutcome> {
        let start = Instant::now();

        self.enter(ProcessingStage::ImageLoading, start);
        let original_dimensions = self.stage(ProcessingStage::ImageLoading, Self::probe_dimensions(image_bytes))?;

        self.enter(ProcessingStage::BackgroundRemoval, start);
        let removal = self.stage(ProcessingStage::BackgroundRemoval, self.remove_background(image_bytes))?;

        self.enter(ProcessingStage::Compositing, start);
        let composite = self.stage(ProcessingStage::Compositing, self.compose(&removal.image, request))?;

        self.enter(ProcessingStage::Encoding, start);
        let encode_start = Instant::now();
        let png_bytes = self.stage(ProcessingStage::Encoding, encode_png(&composite.image))?;

        let mut timings = removal.timings.clone();
        timings.absorb(&composite.metadata.timings);
        timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        timings.total_ms = start.elapsed().as_millis() as u64;

        self.enter(ProcessingStage::Completed, start);
        self.reporter.report_completion(timings.clone());
        info!(
            width = original_dimensions.0,
            height = original_dimensions.1,
            font_fallback = composite.metadata.font_fallback,
            total_ms = timings.total_ms,
            "Text behind image completed"
        );

        Ok(PipelineOutcome {
            original_dimensions,
            background_removed: removal.image,
            composite,
            png_bytes,
            timings,
        })
    }

    fn probe_dimensions(image_bytes: &[u8]) -> Result<(u32, u32)> {
        let format = ConfigValidator::validate_upload_format(image_bytes)?;
        Ok(ImageReader::with_format(Cursor::new(image_bytes), format).into_dimensions()?)
    }

    fn enter(&self, stage: ProcessingStage, start: Instant) {
        self.reporter.report_progress(ProgressUpdate::new(stage, start));
    }

    fn stage<T>(&self, stage: ProcessingStage, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            self.reporter.report_error(stage, &e.to_string());
            e
        })
    }
}
