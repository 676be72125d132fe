//! The in-memory instance registry.
//!
//! `Registry` is `Clone` + `Send` + `Sync` (backed by `Arc<RwLock>`)
//! and is shared across the supervisor, health monitor, and gateway.
//! Records stay in registration order so the healthy-instance list is
//! stable for round-robin selection.

use std::sync::{Arc, RwLock};

use crate::error::{RegistryError, RegistryResult};
use crate::types::{HealthState, InstanceId, InstanceRecord, InstanceStatus, epoch_millis};

/// Shared in-memory store of instance records.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<Vec<InstanceRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new instance. Ids and ports must be unique for the
    /// lifetime of the registry.
    pub fn insert(&self, record: InstanceRecord) -> RegistryResult<()> {
        let mut records = self.inner.write().expect("registry lock");
        for existing in records.iter() {
            if existing.id == record.id {
                return Err(RegistryError::DuplicateId(record.id));
            }
            if existing.port == record.port {
                return Err(RegistryError::DuplicatePort(
                    existing.id.clone(),
                    record.port,
                ));
            }
        }
        records.push(record);
        Ok(())
    }

    /// Look up a single instance by id.
    pub fn get(&self, id: &str) -> Option<InstanceRecord> {
        let records = self.inner.read().expect("registry lock");
        records.iter().find(|r| r.id == id).cloned()
    }

    /// All instances, in registration order.
    pub fn list(&self) -> Vec<InstanceRecord> {
        self.inner.read().expect("registry lock").clone()
    }

    /// Currently-healthy instances, in registration order.
    pub fn healthy(&self) -> Vec<InstanceRecord> {
        let records = self.inner.read().expect("registry lock");
        records
            .iter()
            .filter(|r| r.health == HealthState::Healthy)
            .cloned()
            .collect()
    }

    /// (healthy, total) instance counts.
    pub fn counts(&self) -> (usize, usize) {
        let records = self.inner.read().expect("registry lock");
        let healthy = records
            .iter()
            .filter(|r| r.health == HealthState::Healthy)
            .count();
        (healthy, records.len())
    }

    /// Set an instance's health state, returning the previous state.
    pub fn set_health(&self, id: &str, health: HealthState) -> RegistryResult<HealthState> {
        let mut records = self.inner.write().expect("registry lock");
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let previous = record.health;
        record.health = health;
        Ok(previous)
    }

    /// Record a probe attempt: update health and `last_probe_at`,
    /// returning the previous health state.
    pub fn mark_probe(
        &self,
        id: &str,
        health: HealthState,
        at_millis: u64,
    ) -> RegistryResult<HealthState> {
        let mut records = self.inner.write().expect("registry lock");
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let previous = record.health;
        record.health = health;
        record.last_probe_at = Some(at_millis);
        Ok(previous)
    }

    /// Set an instance's lifecycle status.
    pub fn set_status(&self, id: &str, status: InstanceStatus) -> RegistryResult<()> {
        let mut records = self.inner.write().expect("registry lock");
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        record.status = status;
        Ok(())
    }

    /// Record a relaunch: bump the restart counter, reset `started_at`,
    /// and put the instance back into `Launching`/`Unknown`.
    /// Returns the new restart count.
    pub fn record_restart(&self, id: &str) -> RegistryResult<u32> {
        let mut records = self.inner.write().expect("registry lock");
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        record.restart_count += 1;
        record.started_at = epoch_millis();
        record.status = InstanceStatus::Launching;
        record.health = HealthState::Unknown;
        Ok(record.restart_count)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LaunchSpec;

    fn test_record(id: &str, port: u16) -> InstanceRecord {
        let spec = LaunchSpec {
            providers: vec![],
            endpoints: vec!["http://example.test".to_string()],
            key: None,
            port,
            host: "0.0.0.0".to_string(),
            default_provider_priority: 100,
            default_endpoint_priority: 50,
            rpc_endpoint: None,
            ledger_contract: None,
            inference_contract: None,
            gas_price: None,
        };
        InstanceRecord::new(id.to_string(), spec, 1000)
    }

    #[test]
    fn insert_and_get() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();

        let rec = registry.get("router-0").unwrap();
        assert_eq!(rec.port, 3100);
        assert!(registry.get("router-1").is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();

        let result = registry.insert(test_record("router-0", 3101));
        assert!(matches!(result, Err(RegistryError::DuplicateId(_))));
    }

    #[test]
    fn duplicate_port_rejected() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();

        let result = registry.insert(test_record("router-1", 3100));
        assert!(matches!(result, Err(RegistryError::DuplicatePort(_, 3100))));
    }

    #[test]
    fn healthy_preserves_registration_order() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();
        registry.insert(test_record("router-1", 3101)).unwrap();
        registry.insert(test_record("router-2", 3102)).unwrap();

        registry.set_health("router-2", HealthState::Healthy).unwrap();
        registry.set_health("router-0", HealthState::Healthy).unwrap();

        let healthy = registry.healthy();
        let ids: Vec<&str> = healthy.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["router-0", "router-2"]);
    }

    #[test]
    fn set_health_returns_previous_state() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();

        let prev = registry.set_health("router-0", HealthState::Healthy).unwrap();
        assert_eq!(prev, HealthState::Unknown);

        let prev = registry
            .set_health("router-0", HealthState::Unhealthy)
            .unwrap();
        assert_eq!(prev, HealthState::Healthy);
    }

    #[test]
    fn set_health_unknown_instance_fails() {
        let registry = Registry::new();
        let result = registry.set_health("router-9", HealthState::Healthy);
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn mark_probe_records_timestamp() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();

        registry
            .mark_probe("router-0", HealthState::Healthy, 5000)
            .unwrap();

        let rec = registry.get("router-0").unwrap();
        assert_eq!(rec.health, HealthState::Healthy);
        assert_eq!(rec.last_probe_at, Some(5000));
    }

    #[test]
    fn record_restart_increments_and_resets() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();
        registry.set_health("router-0", HealthState::Healthy).unwrap();
        registry
            .set_status("router-0", InstanceStatus::Running)
            .unwrap();

        let count = registry.record_restart("router-0").unwrap();
        assert_eq!(count, 1);

        let rec = registry.get("router-0").unwrap();
        assert_eq!(rec.health, HealthState::Unknown);
        assert_eq!(rec.status, InstanceStatus::Launching);
        assert!(rec.started_at > 1000);

        // Counter never decreases.
        assert_eq!(registry.record_restart("router-0").unwrap(), 2);
    }

    #[test]
    fn counts_reflect_health() {
        let registry = Registry::new();
        registry.insert(test_record("router-0", 3100)).unwrap();
        registry.insert(test_record("router-1", 3101)).unwrap();

        assert_eq!(registry.counts(), (0, 2));
        registry.set_health("router-0", HealthState::Healthy).unwrap();
        assert_eq!(registry.counts(), (1, 2));
    }
}
