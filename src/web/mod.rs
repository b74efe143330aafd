//! Single-page HTTP interface
//!
//! `GET /` serves the page; the page calls the JSON-free image routes below.
//! Image work runs on tokio's blocking pool against one shared pipeline.

pub mod error;
pub mod handlers;
mod page;

pub use error::HttpError;
pub use handlers::FONT_FALLBACK_HEADER;

use crate::{config::ServerConfig, pipeline::TextBehindPipeline};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// State shared by every request; the pipeline is read-only after start-up
#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Arc<TextBehindPipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(pipeline: TextBehindPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the router with the upload limit applied to every route
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/remove-background", post(handlers::remove_background))
        .route("/api/compose", post(handlers::compose))
        .route("/api/text-behind", post(handlers::text_behind))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM
///
/// # Errors
/// - The address cannot be bound
/// - The server fails while running
pub async fn serve(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let app = router(state, config.max_upload_bytes);
    let listener = TcpListener::bind(config.bind).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown completed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown...");
        },
        () = terminate => {
            info!("Received terminate signal, starting graceful shutdown...");
        },
    }
}
