//! HTTP API server.
//!
//! This module exposes the tool dispatcher over HTTP for external control of
//! the fan. Built on Axum; all routes live under `/api/v1`.

pub mod v1;

pub use v1::{AppState, ToolCallResponse};

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{error::Result, tracing::prelude::*, transport::Transport};

/// Build the complete router.
pub fn router<T: Transport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .nest("/api/v1", v1::routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on `listener` until `running` is cancelled.
pub async fn serve<T: Transport + 'static>(
    listener: TcpListener,
    state: AppState<T>,
    running: CancellationToken,
) -> Result<()> {
    info!(listen = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { running.cancelled().await })
        .await?;

    debug!("API server stopped");
    Ok(())
}
