//! Introspection handlers.
//!
//! These endpoints read the registry directly and never touch the
//! proxy path. Field names follow the wire contract consumed by
//! operator tooling (camelCase).

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use relay_registry::{HealthState, InstanceRecord, epoch_millis};

use crate::GatewayState;

/// Aggregate summary returned by `GET /health`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub status: &'static str,
    pub active_instances: usize,
    pub total_instances: usize,
}

/// Per-instance detail in the `GET /status` report.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDetail {
    pub id: String,
    pub health: HealthState,
    pub port: u16,
    /// Milliseconds since the current process launch.
    pub uptime: u64,
    pub restart_count: u32,
    pub last_probe_at: Option<u64>,
}

impl From<&InstanceRecord> for InstanceDetail {
    fn from(record: &InstanceRecord) -> Self {
        Self {
            id: record.id.clone(),
            health: record.health,
            port: record.port,
            uptime: epoch_millis().saturating_sub(record.started_at),
            restart_count: record.restart_count,
            last_probe_at: record.last_probe_at,
        }
    }
}

/// Full report returned by `GET /status`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: &'static str,
    pub active_instances: usize,
    pub total_instances: usize,
    pub instances: Vec<InstanceDetail>,
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    let (active, total) = state.registry.counts();
    let healthy = active > 0;
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthSummary {
            status: if healthy { "healthy" } else { "unhealthy" },
            active_instances: active,
            total_instances: total,
        }),
    )
}

/// GET /status
pub async fn status(State(state): State<GatewayState>) -> Json<StatusReport> {
    let instances = state.registry.list();
    let active = instances
        .iter()
        .filter(|r| r.health == HealthState::Healthy)
        .count();
    Json(StatusReport {
        status: if active > 0 { "healthy" } else { "unhealthy" },
        active_instances: active,
        total_instances: instances.len(),
        instances: instances.iter().map(InstanceDetail::from).collect(),
    })
}
