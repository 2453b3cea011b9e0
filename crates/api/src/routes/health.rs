//! Health and Metrics Routes

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: ComponentHealth,
    pub reading_count: Option<i64>,
}

/// Individual component health
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
}

/// Health check handler. Always 200; a dead database reports "degraded".
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (database, reading_count) = match state.repository.count().await {
        Ok(count) => ("ok", Some(count)),
        Err(e) => {
            warn!("Health check could not reach the database: {}", e);
            ("unavailable", None)
        }
    };

    Json(HealthResponse {
        status: if reading_count.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database: ComponentHealth {
            status: database.to_string(),
        },
        reading_count,
    })
}

/// Prometheus exposition, when a recorder is installed
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => ApiError::NotFound.into_response(),
    }
}
