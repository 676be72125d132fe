//! Transparent reverse proxy with fast failure detection.

use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use relay_registry::{HealthState, Registry};

use crate::{GatewayState, INSTANCE_HEADER};

/// Per-instance entry in the no-healthy-instances diagnostic body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceListing {
    id: String,
    health: HealthState,
    port: u16,
    restart_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoHealthyBody {
    error: &'static str,
    instances: Vec<InstanceListing>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BadGatewayBody {
    error: &'static str,
    instance: String,
}

/// Fallback handler: forward the request to the next healthy worker.
///
/// Method, headers, and body pass through unchanged; the selected
/// instance is named in the `x-relay-instance` response header. A
/// transport failure marks the instance unhealthy immediately and the
/// caller gets a 502 — the gateway never retries another instance
/// itself.
pub async fn forward(State(state): State<GatewayState>, req: Request) -> Response {
    let healthy = state.registry.healthy();
    let Some(instance) = state.cursor.select(&healthy) else {
        return no_healthy_response(&state.registry);
    };

    let (mut parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("http://127.0.0.1:{}{}", instance.port, path_and_query);
    parts.uri = match target.parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            warn!(instance = %instance.id, error = %e, "failed to build upstream uri");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let instance_header =
        HeaderValue::from_str(&instance.id).unwrap_or_else(|_| HeaderValue::from_static("unknown"));
    parts.headers.insert(INSTANCE_HEADER, instance_header.clone());

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => {
            let mut response = upstream.map(Body::new);
            response.headers_mut().insert(INSTANCE_HEADER, instance_header);
            response
        }
        Err(e) => {
            warn!(
                instance = %instance.id,
                error = %e,
                "proxy request failed, marking instance unhealthy"
            );
            if let Err(e) = state
                .registry
                .set_health(&instance.id, HealthState::Unhealthy)
            {
                warn!(instance = %instance.id, error = %e, "failed to mark instance unhealthy");
            }
            (
                StatusCode::BAD_GATEWAY,
                Json(BadGatewayBody {
                    error: "Bad Gateway",
                    instance: instance.id,
                }),
            )
                .into_response()
        }
    }
}

/// 503 with a diagnostic listing of every registered instance, so an
/// operator can see why nothing is routable.
fn no_healthy_response(registry: &Registry) -> Response {
    let records = registry.list();
    let instances = records
        .iter()
        .map(|r| InstanceListing {
            id: r.id.clone(),
            health: r.health,
            port: r.port,
            restart_count: r.restart_count,
        })
        .collect();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(NoHealthyBody {
            error: "No healthy instances available",
            instances,
        }),
    )
        .into_response()
}
