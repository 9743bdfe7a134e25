//! Health endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use superfocus_core::FocusError;
use tracing::warn;

use crate::api::AppState;

/// Response body for `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` when required configuration is missing.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// `configured` or `missing` per external service.
    pub services: BTreeMap<String, String>,
    /// Required environment variables that are unset.
    pub missing: Vec<String>,
}

/// Response body for `GET /api/health/supabase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyHealth {
    /// `ok` or `error`.
    pub status: String,
    /// Dependency name.
    pub service: String,
    /// Round-trip time, when the dependency answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Why the check failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /api/health`
///
/// Never touches external services. Answers 503 while any required
/// variable is missing so load balancers keep the instance out.
pub async fn handle_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let missing: Vec<String> = state
        .environment
        .missing_required()
        .into_iter()
        .map(str::to_string)
        .collect();
    let services = state
        .environment
        .services()
        .into_iter()
        .map(|s| {
            let label = if s.configured { "configured" } else { "missing" };
            (s.name.to_string(), label.to_string())
        })
        .collect();

    let (status, label) = if missing.is_empty() {
        (StatusCode::OK, "ok")
    } else {
        warn!(missing = ?missing, "Health check degraded");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: label.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
        services,
        missing,
    };
    (status, Json(body))
}

/// `GET /api/health/supabase`
pub async fn handle_supabase_health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<DependencyHealth>) {
    let probe = &state.services.database;
    let started = Instant::now();
    let result = probe.ping().await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(DependencyHealth {
                status: "ok".to_string(),
                service: probe.name().to_string(),
                latency_ms: Some(latency_ms),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(service = probe.name(), error = %e, "Dependency health check failed");
            let reason = match e {
                FocusError::ServiceNotConfigured { .. } => "not configured",
                _ => "unreachable",
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DependencyHealth {
                    status: "error".to_string(),
                    service: probe.name().to_string(),
                    latency_ms: None,
                    error: Some(reason.to_string()),
                }),
            )
        }
    }
}
