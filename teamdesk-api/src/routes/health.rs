/// Health check endpoint
///
/// Provides a simple health check endpoint that verifies:
/// - The server is running
/// - Database connectivity
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 1, "total_connections": 2 }
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use teamdesk_shared::db::pool::{get_pool_stats, health_check as ping, PoolStats};
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    pub pool: PoolStats,
}

/// Health check handler
///
/// Always answers 200; a database outage shows up as `degraded`.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match ping(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check could not reach the database");
            false
        }
    };

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        pool: get_pool_stats(&state.db),
    })
}
