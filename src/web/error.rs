use crate::error::TextBehindError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

/// Maps a pipeline error onto an HTTP status and a JSON `{"error": ..}` body
#[derive(Debug)]
pub struct HttpError(pub TextBehindError);

impl HttpError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TextBehindError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TextBehindError::InvalidConfig(_) | TextBehindError::Image(_) => StatusCode::BAD_REQUEST,
            TextBehindError::BackgroundRemoval(_) | TextBehindError::Compositing(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown on the page
    #[must_use]
    pub fn message(&self) -> String {
        match &self.0 {
            TextBehindError::BackgroundRemoval(_) | TextBehindError::Compositing(_) => self.0.to_string(),
            other => format!("An error occurred: {}", other),
        }
    }
}

impl From<TextBehindError> for HttpError {
    fn from(error: TextBehindError) -> Self {
        Self(error)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            debug!("Client error response generated: {}", self.0);
        } else {
            error!("Server error response generated: {}", self.0);
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
