//! Health check handlers

use axum::{extract::State, Json};
use citenet_common::ProviderKind;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub provider: ProviderKind,
    pub sessions: usize,
    pub persistence: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: citenet_common::VERSION.to_string(),
    })
}

/// Readiness probe
///
/// The gateway has no hard dependencies once started: providers are
/// called per request and persistence failures are only logged.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let persistence = &state.config.persistence;
    Json(ReadyResponse {
        status: "ready".to_string(),
        provider: state.config.provider.kind,
        sessions: state.explorer.list().await.len(),
        persistence: persistence
            .enabled
            .then(|| format!("{:?}", persistence.backend).to_lowercase()),
    })
}
