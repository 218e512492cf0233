mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::Config, metrics, Result, StatusTransformer};

pub struct AppState {
    pub(crate) transformer: Arc<StatusTransformer>,
    pub(crate) request_timeout: Duration,
}

pub struct Server {
    transformer: Arc<StatusTransformer>,
    request_timeout: Duration,
}

impl Server {
    pub fn new(config: &Config, transformer: Arc<StatusTransformer>) -> Self {
        Self {
            transformer,
            request_timeout: config.server.request_timeout(),
        }
    }

    pub fn build_router(self) -> Router {
        metrics::register_metrics();

        let state = Arc::new(AppState {
            transformer: self.transformer,
            request_timeout: self.request_timeout,
        });

        Router::new()
            .route("/health", get(routes::health))
            .route("/v1/run", post(routes::run_function))
            .route("/metrics", get(routes::export_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
