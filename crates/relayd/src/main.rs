//! relayd — high-availability relay daemon.
//!
//! Single binary that assembles all subsystems:
//! - Instance registry (shared state)
//! - Supervisor (worker launch + restart)
//! - Health monitor (periodic HTTP probes)
//! - Gateway (round-robin reverse proxy + status API)
//!
//! # Usage
//!
//! ```text
//! PROVIDERS="0xaaa,10" KEYS="key0,key1" relayd run --port 3000
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use relay_gateway::{GatewayState, build_router};
use relay_health::{HealthMonitor, MonitorConfig};
use relay_registry::Registry;
use relay_supervisor::{Supervisor, SupervisorConfig};

mod config;

use config::Config;

/// Delay between consecutive worker launches.
const LAUNCH_STAGGER: Duration = Duration::from_secs(2);

/// How long workers get to exit after SIGTERM before SIGKILL.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "relayd", about = "High-availability relay daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Launch the worker pool and serve the front door.
    Run {
        /// Front-door port (overrides PORT).
        #[arg(long)]
        port: Option<u16>,

        /// Front-door host (overrides HOST).
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relayd=debug,relay=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { port, host } => {
            let mut config = Config::from_env().context("invalid configuration")?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            // Overrides can break invariants the env values satisfied.
            config.validate().context("invalid configuration")?;
            run(config).await
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        port = config.port,
        host = %config.host,
        instances = config.instance_count(),
        providers = config.providers.len(),
        endpoints = config.endpoints.len(),
        "relay daemon starting"
    );

    let registry = Registry::new();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Supervisor + worker pool ───────────────────────────────

    let supervisor_config = SupervisorConfig {
        worker_bin: config.worker_bin.clone(),
        ..SupervisorConfig::default()
    };
    let (supervisor, events) =
        Supervisor::new(registry.clone(), supervisor_config, shutdown_rx.clone());

    let supervisor_handle = tokio::spawn(supervisor.clone().run(events));

    let specs = config.launch_specs();
    let last = specs.len() - 1;
    for (i, (id, spec)) in specs.into_iter().enumerate() {
        supervisor.launch(id, spec).await?;
        if i < last {
            tokio::time::sleep(LAUNCH_STAGGER).await;
        }
    }

    // ── Readiness gates ────────────────────────────────────────

    let monitor = HealthMonitor::new(registry.clone(), MonitorConfig::default());

    let mut readiness = JoinSet::new();
    for record in registry.list() {
        let monitor = monitor.clone();
        readiness.spawn(async move { monitor.wait_ready(&record.id, record.port).await });
    }
    let mut ready = 0usize;
    while let Some(result) = readiness.join_next().await {
        if matches!(result, Ok(true)) {
            ready += 1;
        }
    }
    if ready == 0 {
        error!("no workers became ready; serving anyway, probes will keep trying");
    } else {
        info!(ready, total = registry.len(), "worker pool ready");
    }

    // ── Health monitor loop ────────────────────────────────────

    let monitor_shutdown = shutdown_rx.clone();
    let monitor_handle = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run(monitor_shutdown).await }
    });

    // ── Front door ─────────────────────────────────────────────

    let state = GatewayState::new(registry.clone());
    let router = build_router(state);

    let ip: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "front door starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server =
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal(shutdown_tx));

    server.await?;

    // ── Teardown ───────────────────────────────────────────────

    supervisor.terminate_all(SHUTDOWN_GRACE).await;

    let _ = monitor_handle.await;
    let _ = supervisor_handle.await;

    info!("relay daemon stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and flips the shutdown flag.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
