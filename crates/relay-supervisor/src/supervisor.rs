//! The process supervisor.
//!
//! One `Supervisor` owns every worker process: it spawns them, holds
//! their pids, and runs the lifecycle event loop that decides restarts.
//! The registry only ever sees metadata — process handles never leave
//! this module.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use relay_registry::{HealthState, InstanceId, InstanceRecord, InstanceStatus, LaunchSpec, Registry, RegistryResult, epoch_millis};

use crate::command::worker_args;

/// Supervisor tuning knobs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable name or path.
    pub worker_bin: String,
    /// Fixed delay before relaunching a crashed worker.
    pub restart_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_bin: "0g-compute-cli".to_string(),
            restart_delay: Duration::from_secs(5),
        }
    }
}

/// Discrete lifecycle events consumed by the supervisor's event loop.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// A worker process exited with the given code (`None` = killed by signal).
    Exited { id: InstanceId, code: Option<i32> },
    /// A scheduled restart delay has elapsed.
    RestartDue { id: InstanceId },
}

/// Launches, observes, restarts, and tears down worker processes.
#[derive(Clone)]
pub struct Supervisor {
    registry: Registry,
    config: Arc<SupervisorConfig>,
    /// Live worker pids. Wait tasks remove entries as processes exit,
    /// so membership doubles as "still alive" during teardown.
    children: Arc<Mutex<HashMap<InstanceId, u32>>>,
    shutdown: watch::Receiver<bool>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl Supervisor {
    /// Create a supervisor and the event receiver for its `run` loop.
    pub fn new(
        registry: Registry,
        config: SupervisorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                config: Arc::new(config),
                children: Arc::new(Mutex::new(HashMap::new())),
                shutdown,
                events,
            },
            events_rx,
        )
    }

    /// Launch a worker: register it (health `Unknown`) and spawn the
    /// process. A spawn failure marks the instance unhealthy and is not
    /// fatal to the supervisor — other instances keep running.
    pub async fn launch(&self, id: InstanceId, spec: LaunchSpec) -> RegistryResult<()> {
        if self.registry.get(&id).is_none() {
            self.registry
                .insert(InstanceRecord::new(id.clone(), spec.clone(), epoch_millis()))?;
        }
        self.spawn_worker(&id, &spec);
        Ok(())
    }

    /// Number of currently-live worker processes.
    pub fn live_count(&self) -> usize {
        self.children.lock().expect("children lock").len()
    }

    /// The lifecycle event loop. Runs until shutdown; every restart
    /// decision happens here.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.handle(event);
                }
                _ = shutdown.changed() => {
                    debug!("supervisor event loop stopping");
                    break;
                }
            }
        }
    }

    /// Tear down every live worker: SIGTERM each, wait out the grace
    /// period, then SIGKILL whatever is still alive.
    pub async fn terminate_all(&self, grace: Duration) {
        let targets: Vec<(InstanceId, u32)> = {
            let children = self.children.lock().expect("children lock");
            children.iter().map(|(id, pid)| (id.clone(), *pid)).collect()
        };
        if targets.is_empty() {
            return;
        }

        for (id, pid) in &targets {
            info!(instance = %id, pid = *pid, "sending SIGTERM");
            unsafe {
                libc::kill(*pid as libc::pid_t, libc::SIGTERM);
            }
        }

        tokio::time::sleep(grace).await;

        let survivors: Vec<(InstanceId, u32)> = {
            let children = self.children.lock().expect("children lock");
            children.iter().map(|(id, pid)| (id.clone(), *pid)).collect()
        };
        for (id, pid) in survivors {
            warn!(instance = %id, pid, "still alive after grace period, sending SIGKILL");
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }

    fn handle(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Exited { id, code } => {
                info!(instance = %id, code = ?code, "worker exited");
                if let Err(e) = self.registry.set_health(&id, HealthState::Unhealthy) {
                    error!(instance = %id, error = %e, "failed to update health after exit");
                }
                if *self.shutdown.borrow() || code == Some(0) {
                    let _ = self.registry.set_status(&id, InstanceStatus::Stopped);
                    return;
                }

                let _ = self.registry.set_status(&id, InstanceStatus::Restarting);
                let delay = self.config.restart_delay;
                info!(instance = %id, delay_ms = delay.as_millis() as u64, "scheduling restart");
                let events = self.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(LifecycleEvent::RestartDue { id });
                });
            }
            LifecycleEvent::RestartDue { id } => {
                // The flag may have flipped while the timer was pending.
                if *self.shutdown.borrow() {
                    let _ = self.registry.set_status(&id, InstanceStatus::Stopped);
                    return;
                }
                let Some(record) = self.registry.get(&id) else {
                    return;
                };
                match self.registry.record_restart(&id) {
                    Ok(count) => info!(instance = %id, restarts = count, "restarting worker"),
                    Err(e) => {
                        error!(instance = %id, error = %e, "failed to record restart");
                        return;
                    }
                }
                self.spawn_worker(&id, &record.spec);
            }
        }
    }

    fn spawn_worker(&self, id: &InstanceId, spec: &LaunchSpec) {
        let args = worker_args(spec);
        debug!(instance = %id, bin = %self.config.worker_bin, args = ?args, "spawning worker");

        let mut cmd = Command::new(&self.config.worker_bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(instance = %id, bin = %self.config.worker_bin, error = %e, "failed to start worker");
                let _ = self.registry.set_health(id, HealthState::Unhealthy);
                let _ = self.registry.set_status(id, InstanceStatus::Stopped);
                return;
            }
        };

        if let Some(pid) = child.id() {
            self.children
                .lock()
                .expect("children lock")
                .insert(id.clone(), pid);
        }
        let _ = self.registry.set_status(id, InstanceStatus::Running);
        info!(instance = %id, port = spec.port, "worker started");

        if let Some(stdout) = child.stdout.take() {
            stream_output(id.clone(), stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            stream_output(id.clone(), stderr, true);
        }

        let children = self.children.clone();
        let events = self.events.clone();
        let id = id.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(instance = %id, error = %e, "failed to wait on worker");
                    None
                }
            };
            children.lock().expect("children lock").remove(&id);
            let _ = events.send(LifecycleEvent::Exited { id, code });
        });
    }
}

/// Forward a worker's output stream to tracing, tagged with its id.
fn stream_output<R>(id: InstanceId, reader: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(instance = %id, "{line}");
            } else {
                info!(instance = %id, "{line}");
            }
        }
    });
}
