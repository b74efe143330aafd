//! Tracing configuration for the CLI and the web server
//!
//! Applications configure the subscriber here; library code only emits
//! events and spans. Output goes to stderr so stdout stays free for image
//! bytes.

use tracing::Subscriber;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors and emojis (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging for log collectors
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set custom environment filter
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Set session ID for request correlation
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Level for this crate's own events
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Filter directives; dependencies stay at `warn` unless overridden
    #[must_use]
    pub fn filter_directives(&self) -> String {
        match &self.env_filter {
            Some(directives) => directives.clone(),
            None => {
                let level = self.verbosity_to_filter();
                format!("warn,imgly_text_behind={level},tower_http={level}")
            },
        }
    }

    fn format_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.verbosity > 1);

        match self.format {
            TracingFormat::Console => layer.with_ansi(true).compact().boxed(),
            TracingFormat::Compact => layer.with_ansi(false).without_time().compact().boxed(),
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => layer
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let filter = EnvFilter::try_new(self.filter_directives())?;
        Registry::default()
            .with(filter)
            .with(self.format_layer())
            .try_init()?;

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "🚀 Text behind image session started");
        }
        Ok(())
    }
}

/// Initialize tracing with CLI-friendly defaults; returns the new session id
///
/// `RUST_LOG` wins over the verbosity count when set.
///
/// # Errors
/// See [`TracingConfig::init`].
pub fn init_cli_tracing(verbosity: u8, json: bool) -> anyhow::Result<String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_session_id(session_id.clone());

    if let Ok(directives) = std::env::var(EnvFilter::DEFAULT_ENV) {
        config = config.with_env_filter(directives);
    }

    if json {
        #[cfg(feature = "tracing-json")]
        {
            config = config.with_format(TracingFormat::Json);
        }
        #[cfg(not(feature = "tracing-json"))]
        anyhow::bail!("JSON logging requires the 'tracing-json' feature");
    }

    config.init()?;
    Ok(session_id)
}

/// Span helpers for the CLI and HTTP surfaces
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one command invocation
    pub fn session(session_id: &str, command: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            session_id = %session_id,
            command = %command
        )
    }

    /// Span covering one HTTP request handled on the blocking pool
    pub fn request(route: &str, upload_bytes: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            route = %route,
            upload_bytes = upload_bytes
        )
    }

    /// Span for model download operations
    pub fn download(url: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "download",
            url = %url,
            destination = %destination.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("imgly_text_behind=debug")
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("imgly_text_behind=debug"));
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
        assert_eq!(config.filter_directives(), "imgly_text_behind=debug");
    }

    #[test]
    fn test_default_directives_scope_to_crate() {
        let directives = TracingConfig::new().with_verbosity(1).filter_directives();
        assert_eq!(directives, "warn,imgly_text_behind=debug,tower_http=debug");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
