//! Route handlers
//!
//! Every image route reads a multipart form, runs its stage on the blocking
//! pool and answers with a PNG.

use super::{error::HttpError, page::INDEX_HTML, AppState};
use crate::{
    config::{ComposeRequest, FontChoice, DOWNLOAD_FILE_NAME, DOWNLOAD_MIME_TYPE},
    error::{Result, TextBehindError},
    services::ImageIOService,
    tracing_config::spans,
    types::encode_png,
    utils::ConfigValidator,
};
use axum::{
    extract::{Multipart, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Header set when the requested font was replaced by the built-in bitmap font
pub const FONT_FALLBACK_HEADER: &str = "x-font-fallback";

/// Fields of the upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub image: Option<Vec<u8>>,
    pub text: Option<String>,
    pub font: Option<String>,
    pub font_size: Option<String>,
    pub font_color: Option<String>,
}

impl UploadForm {
    /// Collect the known fields, ignoring any others
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a malformed multipart body.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| TextBehindError::invalid_config(format!("Malformed form data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let read_error = |e: axum::extract::multipart::MultipartError| {
                TextBehindError::invalid_config(format!("Could not read field '{}': {}", name, e))
            };
            match name.as_str() {
                "image" => form.image = Some(field.bytes().await.map_err(read_error)?.to_vec()),
                "text" => form.text = Some(field.text().await.map_err(read_error)?),
                "font" => form.font = Some(field.text().await.map_err(read_error)?),
                "font_size" => form.font_size = Some(field.text().await.map_err(read_error)?),
                "font_color" => form.font_color = Some(field.text().await.map_err(read_error)?),
                _ => {},
            }
        }
        Ok(form)
    }

    /// # Errors
    /// Returns `InvalidConfig` when no image was uploaded.
    pub fn take_image(&mut self) -> Result<Vec<u8>> {
        self.image
            .take()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| TextBehindError::invalid_config("Missing 'image' field"))
    }

    /// Style fields with the page defaults filled in
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unknown font, a size outside 10..=200 or
    /// a malformed color.
    pub fn compose_request(&self) -> Result<ComposeRequest> {
        let mut builder = ComposeRequest::builder();
        if let Some(text) = &self.text {
            builder = builder.text(text.clone());
        }
        if let Some(font) = &self.font {
            builder = builder.font(font.parse::<FontChoice>()?);
        }
        if let Some(size) = &self.font_size {
            let size = size
                .trim()
                .parse::<u32>()
                .map_err(|_| TextBehindError::invalid_config(format!("Font size '{}' is not a number", size)))?;
            builder = builder.font_size(size);
        }
        if let Some(color) = &self.font_color {
            builder = builder.font_color(color.clone());
        }
        builder.build()
    }
}

/// PNG body with optional download disposition
#[derive(Debug)]
pub struct PngResponse {
    pub bytes: Vec<u8>,
    pub attachment: bool,
    pub font_fallback: Option<bool>,
}

impl IntoResponse for PngResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DOWNLOAD_MIME_TYPE));
        if self.attachment {
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME)) {
                headers.insert(CONTENT_DISPOSITION, value);
            }
        }
        if let Some(fallback) = self.font_fallback {
            headers.insert(
                FONT_FALLBACK_HEADER,
                HeaderValue::from_static(if fallback { "true" } else { "false" }),
            );
        }
        (headers, self.bytes).into_response()
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| TextBehindError::internal(format!("Worker task failed: {}", e)))?
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/remove-background`: `image` field in, transparent PNG out
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<PngResponse, HttpError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let image = form.take_image()?;
    ConfigValidator::validate_upload_format(&image)?;

    let pipeline = state.pipeline.clone();
    let bytes = run_blocking(move || {
        let _span = spans::request("/api/remove-background", image.len()).entered();
        let removal = pipeline.remove_background(&image)?;
        encode_png(&removal.image)
    })
    .await?;

    Ok(PngResponse {
        bytes,
        attachment: false,
        font_fallback: None,
    })
}

/// `POST /api/compose`: a background-removed `image` plus style fields in,
/// downloadable composite out
pub async fn compose(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<PngResponse, HttpError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let request = form.compose_request()?;
    let image = form.take_image()?;

    let pipeline = state.pipeline.clone();
    let (bytes, font_fallback) = run_blocking(move || {
        let _span = spans::request("/api/compose", image.len()).entered();
        let foreground = ImageIOService::decode_upload(&image)?.to_rgba8();
        let composite = pipeline.compose(&foreground, &request)?;
        Ok((composite.to_png_bytes()?, composite.metadata.font_fallback))
    })
    .await?;

    Ok(PngResponse {
        bytes,
        attachment: true,
        font_fallback: Some(font_fallback),
    })
}

/// `POST /api/text-behind`: both stages in one request
pub async fn text_behind(
    State(state): State<AppState>,
    multipart: Multipart,
) -> std::result::Result<PngResponse, HttpError> {
    let mut form = UploadForm::from_multipart(multipart).await?;
    let request = form.compose_request()?;
    let image = form.take_image()?;

    let pipeline = state.pipeline.clone();
    let outcome = run_blocking(move || {
        let _span = spans::request("/api/text-behind", image.len()).entered();
        pipeline.run(&image, &request)
    })
    .await?;

    Ok(PngResponse {
        font_fallback: Some(outcome.composite.metadata.font_fallback),
        bytes: outcome.png_bytes,
        attachment: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_defaults() {
        let request = UploadForm::default().compose_request().unwrap();
        assert_eq!(request, ComposeRequest::default());
    }

    #[test]
    fn test_form_fields() {
        let form = UploadForm {
            text: Some("HELLO".to_string()),
            font: Some("georgia.ttf".to_string()),
            font_size: Some(" 42 ".to_string()),
            font_color: Some("#FF0000".to_string()),
            ..UploadForm::default()
        };
        let request = form.compose_request().unwrap();
        assert_eq!(request.text, "HELLO");
        assert_eq!(request.style.font, "georgia.ttf");
        assert_eq!(request.style.size, 42);
        assert_eq!(request.style.color.to_hex(), "#FF0000");
    }

    #[test]
    fn test_form_rejects_bad_fields() {
        let bad_size = UploadForm {
            font_size: Some("huge".to_string()),
            ..UploadForm::default()
        };
        assert!(matches!(bad_size.compose_request(), Err(TextBehindError::InvalidConfig(_))));

        let out_of_range = UploadForm {
            font_size: Some("500".to_string()),
            ..UploadForm::default()
        };
        assert!(out_of_range.compose_request().is_err());

        let mut empty = UploadForm {
            image: Some(Vec::new()),
            ..UploadForm::default()
        };
        assert!(empty.take_image().is_err());
    }

    #[test]
    fn test_png_response_headers() {
        let response = PngResponse {
            bytes: vec![1, 2, 3],
            attachment: true,
            font_fallback: Some(true),
        }
        .into_response();

        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "image/png");
        assert_eq!(
            headers[CONTENT_DISPOSITION],
            "attachment; filename=\"text_behind_image.png\""
        );
        assert_eq!(headers[FONT_FALLBACK_HEADER], "true");
    }
}
