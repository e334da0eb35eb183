use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::constants::{SYSTEM_NAME, SYSTEM_VERSION};
use crate::server::State;

#[derive(Debug, Serialize)]
pub(crate) struct BannerResponse {
    system: &'static str,
    status: &'static str,
    version: &'static str,
    mode: &'static str,
}

/// Handler for `GET /`
pub(crate) async fn root() -> Json<BannerResponse> {
    Json(BannerResponse {
        system: SYSTEM_NAME,
        status: "Online",
        version: SYSTEM_VERSION,
        mode: "Smart Automation",
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: DateTime<Utc>,
}

/// Handler for `GET /health`
pub(crate) async fn health(state: Extension<Arc<State>>) -> Json<HealthResponse> {
    let (status, database) = match state.db.ping().await {
        Ok(()) => ("ok", "healthy"),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            ("degraded", "unhealthy")
        }
    };

    Json(HealthResponse {
        status,
        database,
        timestamp: Utc::now(),
    })
}
