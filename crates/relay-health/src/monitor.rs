//! Health monitor — readiness gate and steady-state polling loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use relay_registry::{HealthState, InstanceStatus, Registry, epoch_millis};

use crate::probe::{ProbeOutcome, http_probe};

/// Monitor timing and probe target configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Well-known status path on each worker's own port.
    pub probe_path: String,
    /// Steady-state polling interval.
    pub interval: Duration,
    /// Per-probe timeout.
    pub timeout: Duration,
    /// Poll interval while waiting for a fresh worker to become ready.
    pub ready_poll: Duration,
    /// Overall readiness ceiling per instance.
    pub ready_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            probe_path: "/v1/providers/status".to_string(),
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            ready_poll: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(60),
        }
    }
}

/// Probes every registered instance and keeps its health state current.
#[derive(Clone)]
pub struct HealthMonitor {
    registry: Registry,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(registry: Registry, config: MonitorConfig) -> Self {
        Self { registry, config }
    }

    /// Background polling loop. Runs until the shutdown flag flips;
    /// an in-flight sweep is allowed to complete.
    ///
    /// Two cadences: the steady-state sweep at `interval`, and a fast
    /// readiness tick at `ready_poll` that gates instances still
    /// waiting for their first successful probe — a relaunched worker
    /// rejoins rotation within seconds instead of waiting out a full
    /// sweep interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            path = %self.config.probe_path,
            "health monitor started"
        );
        let mut sweep =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        let mut gate = tokio::time::interval_at(
            Instant::now() + self.config.ready_poll,
            self.config.ready_poll,
        );
        loop {
            tokio::select! {
                _ = sweep.tick() => {
                    self.sweep().await;
                }
                _ = gate.tick() => {
                    self.gate_pending().await;
                }
                _ = shutdown.changed() => {
                    debug!("health monitor stopping");
                    break;
                }
            }
        }
    }

    /// One polling cycle: probe every registered instance. Probes run
    /// concurrently and commit independently, in completion order.
    pub async fn sweep(&self) {
        let mut probes = JoinSet::new();
        for instance in self.registry.list() {
            let path = self.config.probe_path.clone();
            let timeout = self.config.timeout;
            probes.spawn(async move {
                let address = format!("127.0.0.1:{}", instance.port);
                let outcome = http_probe(&address, &path, timeout).await;
                (instance.id, outcome)
            });
        }
        while let Some(result) = probes.join_next().await {
            if let Ok((id, outcome)) = result {
                self.commit(&id, outcome);
            }
        }
    }

    /// Readiness gate for instances in `Unknown` health — fresh or
    /// relaunched workers whose first probe hasn't succeeded yet. One
    /// probe per pending instance; success promotes it to
    /// `Healthy`/`Running` immediately, and an instance past the
    /// readiness ceiling since its last (re)start is marked unhealthy
    /// and left to the steady-state sweep.
    pub async fn gate_pending(&self) {
        let now = epoch_millis();
        let ceiling = self.config.ready_timeout.as_millis() as u64;

        let mut probes = JoinSet::new();
        for instance in self.registry.list() {
            if instance.health != HealthState::Unknown {
                continue;
            }
            if now.saturating_sub(instance.started_at) > ceiling {
                error!(
                    instance = %instance.id,
                    timeout_secs = self.config.ready_timeout.as_secs(),
                    "timed out waiting for worker to become ready"
                );
                if let Err(e) = self
                    .registry
                    .set_health(&instance.id, HealthState::Unhealthy)
                {
                    error!(instance = %instance.id, error = %e, "failed to mark instance unhealthy");
                }
                continue;
            }
            let path = self.config.probe_path.clone();
            let timeout = self.config.timeout;
            probes.spawn(async move {
                let address = format!("127.0.0.1:{}", instance.port);
                let outcome = http_probe(&address, &path, timeout).await;
                (instance.id, outcome)
            });
        }
        while let Some(result) = probes.join_next().await {
            let Ok((id, outcome)) = result else { continue };
            if outcome != ProbeOutcome::Healthy {
                // Still within the readiness window; try again next tick.
                continue;
            }
            if let Err(e) = self
                .registry
                .mark_probe(&id, HealthState::Healthy, epoch_millis())
            {
                error!(instance = %id, error = %e, "failed to record readiness");
                continue;
            }
            let _ = self.registry.set_status(&id, InstanceStatus::Running);
            info!(instance = %id, "worker ready");
        }
    }

    /// Block until the worker's first successful probe, or give up
    /// after the readiness ceiling. A timed-out worker stays registered
    /// as unhealthy; startup proceeds regardless.
    pub async fn wait_ready(&self, id: &str, port: u16) -> bool {
        let address = format!("127.0.0.1:{port}");
        let deadline = Instant::now() + self.config.ready_timeout;

        while Instant::now() < deadline {
            let outcome = http_probe(&address, &self.config.probe_path, self.config.timeout).await;
            if outcome == ProbeOutcome::Healthy {
                if let Err(e) = self
                    .registry
                    .mark_probe(id, HealthState::Healthy, epoch_millis())
                {
                    error!(instance = %id, error = %e, "failed to record readiness");
                }
                let _ = self.registry.set_status(id, InstanceStatus::Running);
                info!(instance = %id, "worker ready");
                return true;
            }
            tokio::time::sleep(self.config.ready_poll).await;
        }

        error!(
            instance = %id,
            timeout_secs = self.config.ready_timeout.as_secs(),
            "timed out waiting for worker to become ready"
        );
        if let Err(e) = self.registry.set_health(id, HealthState::Unhealthy) {
            error!(instance = %id, error = %e, "failed to mark instance unhealthy");
        }
        false
    }

    /// Record a probe result; log only transitions to avoid flooding.
    fn commit(&self, id: &str, outcome: ProbeOutcome) {
        let health = match outcome {
            ProbeOutcome::Healthy => HealthState::Healthy,
            ProbeOutcome::Unhealthy | ProbeOutcome::Failed => HealthState::Unhealthy,
        };
        match self.registry.mark_probe(id, health, epoch_millis()) {
            Ok(previous) => {
                if previous != health {
                    match health {
                        HealthState::Healthy => info!(instance = %id, "instance recovered"),
                        _ => warn!(instance = %id, "instance became unhealthy"),
                    }
                }
            }
            Err(e) => error!(instance = %id, error = %e, "failed to update health state"),
        }
    }
}
