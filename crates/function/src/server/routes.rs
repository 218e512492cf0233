use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::AppState;
use crate::function::request::RunFunctionRequest;
use crate::{metrics, Error};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn export_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!("Error gathering metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn run_function(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunFunctionRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    // Fires when the handler finishes or the client goes away and axum
    // drops this future; either way the timer below exits.
    let _guard = cancel.clone().drop_guard();

    let timeout = state.request_timeout;
    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout_seconds = timeout.as_secs(), "RunFunction timed out, cancelling");
                timer.cancel();
            }
        }
    });

    match state.transformer.run_function(&req, &cancel).await {
        Ok(rsp) => Json(rsp).into_response(),
        Err(Error::Cancelled) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "request cancelled" })),
        )
            .into_response(),
        Err(e) => {
            error!("Error running function: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
