//! relay-registry — in-memory instance registry for the relay supervisor.
//!
//! Holds one `InstanceRecord` per supervised worker: its immutable launch
//! spec, lifecycle status, health state, and probe/restart bookkeeping.
//! The registry itself has no behavior; the supervisor, health monitor,
//! and gateway consult and mutate it.
//!
//! # Architecture
//!
//! ```text
//! Registry (Arc<RwLock<Vec<InstanceRecord>>>)
//!   ├── Supervisor: insert, set_status, record_restart
//!   ├── HealthMonitor: mark_probe, set_health
//!   └── Gateway: healthy(), counts(), set_health (fast-fail)
//! ```
//!
//! Records are kept in registration order so round-robin selection over
//! the healthy subset is stable. Instances are never removed while the
//! system runs; the registry dies with the process.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use registry::Registry;
pub use types::*;
