//! relay-supervisor — process lifecycle management for router workers.
//!
//! Launches worker processes from a `LaunchSpec`, streams their output
//! into tracing, observes exits, and relaunches crashed workers at a
//! fixed delay. Teardown escalates from SIGTERM to SIGKILL after a
//! grace period.
//!
//! # Architecture
//!
//! ```text
//! Supervisor
//!   ├── launch() — register + spawn, stdout/stderr → tracing
//!   ├── wait task per worker → LifecycleEvent::Exited
//!   ├── run() — event loop: Exited → (timer) → RestartDue → respawn
//!   └── terminate_all() — SIGTERM each pid, grace, SIGKILL survivors
//! ```
//!
//! Worker lifecycle is driven by discrete events on an mpsc channel
//! rather than nested exit callbacks: a single loop owns every restart
//! decision and checks the shutdown flag both when scheduling a restart
//! and when it fires.
//!
//! The restart policy is deliberately unbounded: a crashing worker is
//! retried forever at the fixed delay, with no backoff and no ceiling.

pub mod command;
pub mod supervisor;

pub use command::worker_args;
pub use supervisor::{LifecycleEvent, Supervisor, SupervisorConfig};
