//! Domain types for the relay instance registry.
//!
//! An instance is one supervised worker process: its immutable launch
//! spec plus mutable lifecycle/health bookkeeping. All types serialize
//! to JSON for the gateway's introspection endpoints.

use serde::{Deserialize, Serialize};

/// Unique identifier for a supervised instance (e.g. `router-0`).
pub type InstanceId = String;

/// Health state as determined by liveness probes and proxy fast-fail.
///
/// Starts `Unknown`, becomes `Healthy` only after a successful probe,
/// and is the sole input to routing eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

/// Lifecycle status of a supervised worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Process spawned, readiness not yet established.
    Launching,
    /// Process is up.
    Running,
    /// Process exited abnormally; a relaunch is scheduled.
    Restarting,
    /// Process exited cleanly, failed to spawn, or was shut down.
    Stopped,
}

/// An on-chain provider entry with its routing priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub address: String,
    pub priority: u32,
}

/// Immutable parameter set used to start (and restart) one worker.
///
/// Captures the full command-line contract of the worker executable so
/// a crashed instance can be relaunched with identical arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    /// On-chain providers, each with a priority.
    pub providers: Vec<ProviderSpec>,
    /// Direct endpoint URLs.
    pub endpoints: Vec<String>,
    /// Credential for on-chain providers; `None` in direct-endpoint mode.
    pub key: Option<String>,
    /// Private port this worker listens on.
    pub port: u16,
    /// Host the worker binds to.
    pub host: String,
    pub default_provider_priority: u32,
    pub default_endpoint_priority: u32,
    pub rpc_endpoint: Option<String>,
    pub ledger_contract: Option<String>,
    pub inference_contract: Option<String>,
    pub gas_price: Option<String>,
}

/// Registry entry for one supervised worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    /// Immutable (re)start contract for this instance.
    pub spec: LaunchSpec,
    /// Probe/proxy target port (mirrors `spec.port`).
    pub port: u16,
    pub status: InstanceStatus,
    pub health: HealthState,
    /// Number of relaunches for this id. Never decreases.
    pub restart_count: u32,
    /// Unix millis of the current process launch; reset on restart.
    pub started_at: u64,
    /// Unix millis of the most recent probe attempt, success or failure.
    pub last_probe_at: Option<u64>,
}

impl InstanceRecord {
    /// Create a fresh record for a newly launched instance.
    pub fn new(id: InstanceId, spec: LaunchSpec, started_at: u64) -> Self {
        let port = spec.port;
        Self {
            id,
            spec,
            port,
            status: InstanceStatus::Launching,
            health: HealthState::Unknown,
            restart_count: 0,
            started_at,
            last_probe_at: None,
        }
    }
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
