//! Error types for text-behind-image operations

use thiserror::Error;

/// Result type alias for text-behind-image operations
pub type Result<T> = std::result::Result<T, TextBehindError>;

/// Error types for every stage of the text-behind-image pipeline
#[derive(Error, Debug)]
pub enum TextBehindError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Background removal failed (decode or model failure)
    #[error("Error removing background: {0}")]
    BackgroundRemoval(String),

    /// Font or drawing failure while compositing text
    #[error("Error adding text: {0}")]
    Compositing(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported upload format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Font loading errors
    #[error("Font error: {0}")]
    Font(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TextBehindError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new font error
    pub fn font<S: Into<String>>(msg: S) -> Self {
        Self::Font(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a background removal failure
    pub fn background_removal<S: Into<String>>(msg: S) -> Self {
        Self::BackgroundRemoval(msg.into())
    }

    /// Create a compositing failure
    pub fn compositing<S: Into<String>>(msg: S) -> Self {
        Self::Compositing(msg.into())
    }

    /// Create a network error with the underlying cause
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Collapse any error raised while removing a background into the single
    /// user-facing background removal outcome
    #[must_use]
    pub fn into_background_removal(self) -> Self {
        match self {
            Self::BackgroundRemoval(_) => self,
            other => Self::BackgroundRemoval(other.to_string()),
        }
    }

    /// Collapse any error raised while drawing text into the compositing outcome
    #[must_use]
    pub fn into_compositing(self) -> Self {
        match self {
            Self::Compositing(_) => self,
            other => Self::Compositing(other.to_string()),
        }
    }

    /// Whether the error was caused by the request rather than the host
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::UnsupportedFormat(_) | Self::Image(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = TextBehindError::invalid_config("test config error");
        assert!(matches!(err, TextBehindError::InvalidConfig(_)));

        let err = TextBehindError::unsupported_format("GIF");
        assert!(matches!(err, TextBehindError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_error_display_matches_user_messages() {
        let err = TextBehindError::background_removal("model exploded");
        assert_eq!(err.to_string(), "Error removing background: model exploded");

        let err = TextBehindError::compositing("glyph failure");
        assert_eq!(err.to_string(), "Error adding text: glyph failure");
    }

    #[test]
    fn test_collapse_into_background_removal() {
        let err = TextBehindError::inference("tensor shape mismatch").into_background_removal();
        match err {
            TextBehindError::BackgroundRemoval(msg) => {
                assert!(msg.contains("tensor shape mismatch"));
            },
            other => panic!("unexpected variant: {other:?}"),
        }

        // Already collapsed errors are not wrapped twice
        let err = TextBehindError::background_removal("bad bytes").into_background_removal();
        assert_eq!(err.to_string(), "Error removing background: bad bytes");
    }

    #[test]
    fn test_collapse_into_compositing() {
        let err = TextBehindError::font("broken table").into_compositing();
        assert!(matches!(err, TextBehindError::Compositing(_)));
        assert!(err.to_string().contains("broken table"));
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = TextBehindError::file_io_error("read font", Path::new("/fonts/arial.ttf"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read font"));
        assert!(error_string.contains("/fonts/arial.ttf"));

        let err = TextBehindError::config_value_error("font size", 300, "10-200", Some(100));
        let error_string = err.to_string();
        assert!(error_string.contains("font size"));
        assert!(error_string.contains("300"));
        assert!(error_string.contains("10-200"));
        assert!(error_string.contains("Recommended: 100"));

        let err = TextBehindError::network_error("Failed to download", "timeout");
        assert_eq!(err.to_string(), "Network error: Failed to download: timeout");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(TextBehindError::invalid_config("x").is_client_error());
        assert!(TextBehindError::unsupported_format("gif").is_client_error());
        assert!(!TextBehindError::background_removal("x").is_client_error());
        assert!(!TextBehindError::internal("x").is_client_error());
    }
}
