//! relay-gateway — the single public HTTP entry point.
//!
//! Serves two introspection endpoints directly and proxies everything
//! else to a currently-healthy worker chosen by round robin:
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Aggregate health summary |
//! | GET | `/status` | Per-instance detail |
//! | * | anything else | Proxied to a healthy worker |
//!
//! A transport-level proxy failure immediately marks the selected
//! instance unhealthy (fast-fail) and answers 502; the caller retries.
//! With no healthy instance at all, every proxied request answers 503
//! with a per-instance diagnostic listing.

pub mod balancer;
pub mod handlers;
pub mod proxy;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use relay_registry::Registry;

use crate::balancer::RoundRobinCursor;

/// Response header naming the worker instance that served a request.
pub const INSTANCE_HEADER: &str = "x-relay-instance";

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Registry,
    pub cursor: Arc<RoundRobinCursor>,
    pub client: Client<HttpConnector, axum::body::Body>,
}

impl GatewayState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            cursor: Arc::new(RoundRobinCursor::new()),
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

/// Build the front-door router: introspection routes plus the proxy
/// fallback for everything else.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .fallback(proxy::forward)
        .with_state(state)
}
