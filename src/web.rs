//! Axum-based HTTP API for Helios
//!
//! Read-only status plus a mode switch. Handlers never touch controller
//! state directly: status comes from the driver's snapshot channel and the
//! mode switch is forwarded as a [`DriverCommand`].

use crate::config::ControlsConfig;
use crate::driver::{DriverCommand, DriverSnapshot};
use crate::error::{HeliosError, Result};
use crate::logging::{StructuredLogger, get_logger};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub commands_tx: mpsc::UnboundedSender<DriverCommand>,
    pub snapshot_rx: watch::Receiver<Arc<DriverSnapshot>>,
    pub controls: Arc<ControlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeBody {
    /// `true` enables PV-only charging
    pub auto: bool,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn status(State(state): State<AppState>) -> Json<DriverSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot.as_ref().clone())
}

pub async fn set_mode(State(state): State<AppState>, Json(body): Json<ModeBody>) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();
    let command = DriverCommand::SetAutoMode {
        enabled: body.auto,
        reply: Some(reply_tx),
    };
    if state.commands_tx.send(command).is_err() {
        return driver_unavailable();
    }

    match reply_rx.await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "auto": body.auto})),
        )
            .into_response(),
        Ok(Err(e)) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        )
            .into_response(),
        Err(_) => driver_unavailable(),
    }
}

fn driver_unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({"ok": false, "error": "driver not running"})),
    )
        .into_response()
}

pub async fn get_config(State(state): State<AppState>) -> Json<ControlsConfig> {
    Json(state.controls.as_ref().clone())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/mode", post(set_mode))
        .route("/api/config", get(get_config))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// HTTP server wrapper
pub struct WebServer {
    state: AppState,
    logger: StructuredLogger,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            logger: get_logger("web"),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind and serve until the task is dropped
    pub async fn start(&self, host: &str, port: u16) -> Result<()> {
        let ip: IpAddr = host
            .parse()
            .map_err(|e| HeliosError::web(format!("Invalid bind address {}: {}", host, e)))?;
        let addr = SocketAddr::new(ip, port);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| HeliosError::web(format!("Failed to bind {}: {}", addr, e)))?;
        self.logger
            .info(&format!("HTTP API listening on http://{}", addr));

        axum::serve(listener, self.router())
            .await
            .map_err(|e| HeliosError::web(format!("Server error: {}", e)))
    }
}
