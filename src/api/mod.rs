//! HTTP API server
//!
//! Exposes a liveness endpoint and the telephony call WebSocket. Each
//! call connection gets its own engine; the codec and model handles are
//! shared by reference.

pub mod call;
pub mod health;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audio::{AmplitudeConfig, VadConfig};
use crate::codec::SpeechCodec;
use crate::engine::TurnConfig;
use crate::events::EventBus;
use crate::generator::SpeechModel;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub codec: Arc<dyn SpeechCodec>,
    pub model: Arc<dyn SpeechModel>,
    pub events: EventBus,
    pub turn: TurnConfig,
    pub vad: VadConfig,
    pub amplitude: AmplitudeConfig,
    /// Priming context injected into each call's first turn
    pub context: Option<String>,
}

/// The HTTP API server
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a server for the given port
    #[must_use]
    pub fn new(port: u16, state: ApiState) -> Self {
        Self {
            port,
            state: Arc::new(state),
        }
    }

    /// Build the router
    #[must_use]
    pub fn router(state: Arc<ApiState>) -> Router {
        Router::new()
            .merge(health::router())
            .merge(call::router(state))
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
    }

    /// Spawn the server task; bind or serve failures are logged, not fatal
    /// to the daemon
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let addr = format!("0.0.0.0:{}", self.port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(%addr, error = %e, "api server bind failed");
                    return;
                }
            };

            tracing::info!(%addr, "api server listening");
            if let Err(e) = axum::serve(listener, Self::router(self.state)).await {
                tracing::error!(error = %e, "api server error");
            }
        })
    }
}
