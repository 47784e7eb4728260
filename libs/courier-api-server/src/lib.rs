mod http;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use courier_api::Subscription;
use courier_engine::{ProcessingCounters, RecentRecordCache};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bind api :{port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("axum serve: {0}")]
    Serve(std::io::Error),
}

/// Everything the HTTP handlers read from.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RecentRecordCache>,
    pub counters: Arc<ProcessingCounters>,
    pub routes: Arc<Vec<Subscription>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/dashboard/api/messages",
            get(http::list_messages).delete(http::clear_messages),
        )
        .route("/dashboard/api/messages/topic/{topic}", get(http::list_by_topic))
        .route("/dashboard/api/stats", get(http::stats))
        .route("/dashboard/api/counters", get(http::counters))
        .route("/dashboard/api/routes", get(http::routes))
        .route("/test/add-sample-messages", post(http::add_sample_messages))
        .with_state(state)
}

/// Dashboard HTTP API server. Returns once `shutdown` is cancelled.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), ApiError> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| ApiError::Bind { port, source })?;

    tracing::info!(port, "dashboard api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ApiError::Serve)?;

    Ok(())
}

