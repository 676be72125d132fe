//! relay-health — liveness probing for supervised workers.
//!
//! Two responsibilities:
//!
//! - **Readiness gate**: after a worker launches, poll its status path
//!   every second until the first success or a 60s ceiling. Timeout is
//!   not fatal — the worker stays registered as unhealthy and steady
//!   polling picks it up later.
//! - **Steady-state monitor**: every 30s, one probe per registered
//!   instance with a 5s per-probe timeout. Success is HTTP status only;
//!   a single failed probe flips the instance to unhealthy. Only state
//!   transitions are logged.

pub mod monitor;
pub mod probe;

pub use monitor::{HealthMonitor, MonitorConfig};
pub use probe::{ProbeOutcome, http_probe};
