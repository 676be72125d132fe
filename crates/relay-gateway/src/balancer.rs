//! Round-robin selection over the healthy-instance list.

use std::sync::Mutex;

use relay_registry::{InstanceId, InstanceRecord};

/// Cursor-based round robin.
///
/// Remembers the id of the last selected instance. Each call locates
/// that id in the current healthy list with an explicit `position`
/// lookup — an `Option`, so "not found" and index zero are never
/// conflated — and advances one slot, wrapping to the first entry when
/// the cursor is unset or has dropped out of the healthy set.
pub struct RoundRobinCursor {
    last: Mutex<Option<InstanceId>>,
}

impl RoundRobinCursor {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    /// Select the next healthy instance and advance the cursor.
    ///
    /// Returns `None` only when `healthy` is empty. Over repeated calls
    /// with a stable healthy set, every instance is visited before any
    /// repeats.
    pub fn select(&self, healthy: &[InstanceRecord]) -> Option<InstanceRecord> {
        if healthy.is_empty() {
            return None;
        }

        let mut last = self.last.lock().expect("cursor lock");
        let previous = last
            .as_deref()
            .and_then(|prev| healthy.iter().position(|r| r.id == prev));
        let index = match previous {
            Some(pos) => (pos + 1) % healthy.len(),
            None => 0,
        };

        let chosen = healthy[index].clone();
        *last = Some(chosen.id.clone());
        Some(chosen)
    }

    /// Id of the most recent selection, if any.
    pub fn current(&self) -> Option<InstanceId> {
        self.last.lock().expect("cursor lock").clone()
    }
}

impl Default for RoundRobinCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_registry::{InstanceRecord, LaunchSpec};

    fn record(id: &str, port: u16) -> InstanceRecord {
        let spec = LaunchSpec {
            providers: vec![],
            endpoints: vec!["http://example.test".to_string()],
            key: None,
            port,
            host: "127.0.0.1".to_string(),
            default_provider_priority: 100,
            default_endpoint_priority: 50,
            rpc_endpoint: None,
            ledger_contract: None,
            inference_contract: None,
            gas_price: None,
        };
        InstanceRecord::new(id.to_string(), spec, 1000)
    }

    fn ids(cursor: &RoundRobinCursor, pool: &[InstanceRecord], n: usize) -> Vec<String> {
        (0..n)
            .map(|_| cursor.select(pool).unwrap().id)
            .collect()
    }

    #[test]
    fn empty_pool_returns_none() {
        let cursor = RoundRobinCursor::new();
        assert!(cursor.select(&[]).is_none());
        assert!(cursor.current().is_none());
    }

    #[test]
    fn cycles_through_all_instances_before_repeating() {
        let cursor = RoundRobinCursor::new();
        let pool = vec![record("a", 1), record("b", 2), record("c", 3)];

        assert_eq!(ids(&cursor, &pool, 6), vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn single_instance_is_always_selected() {
        let cursor = RoundRobinCursor::new();
        let pool = vec![record("a", 1)];

        for _ in 0..5 {
            assert_eq!(cursor.select(&pool).unwrap().id, "a");
        }
    }

    #[test]
    fn cursor_drop_out_wraps_to_first() {
        let cursor = RoundRobinCursor::new();
        let full = vec![record("a", 1), record("b", 2), record("c", 3)];

        cursor.select(&full); // a
        cursor.select(&full); // b — cursor now on b

        // b becomes unhealthy: it is absent from the filtered list, so
        // selection wraps to the first healthy instance and never
        // returns b.
        let without_b = vec![record("a", 1), record("c", 3)];
        assert_eq!(cursor.select(&without_b).unwrap().id, "a");
        assert_eq!(cursor.select(&without_b).unwrap().id, "c");
        assert_eq!(cursor.select(&without_b).unwrap().id, "a");
    }

    #[test]
    fn recovered_instance_rejoins_rotation_in_order() {
        let cursor = RoundRobinCursor::new();
        let full = vec![record("a", 1), record("b", 2), record("c", 3)];
        let without_b = vec![record("a", 1), record("c", 3)];

        cursor.select(&full); // a
        // b fails; rotation continues over a and c only.
        assert_eq!(cursor.select(&without_b).unwrap().id, "c");
        assert_eq!(cursor.select(&without_b).unwrap().id, "a");

        // b recovers: next selection after a is b, at its slot.
        assert_eq!(cursor.select(&full).unwrap().id, "b");
        assert_eq!(cursor.select(&full).unwrap().id, "c");
    }

    #[test]
    fn fairness_over_window_of_pool_size() {
        let cursor = RoundRobinCursor::new();
        let pool = vec![record("a", 1), record("b", 2), record("c", 3)];

        let selections = ids(&cursor, &pool, 9);
        for window in selections.chunks(3) {
            let mut sorted = window.to_vec();
            sorted.sort();
            assert_eq!(sorted, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn wraps_from_last_to_first() {
        let cursor = RoundRobinCursor::new();
        let pool = vec![record("a", 1), record("b", 2)];

        cursor.select(&pool); // a
        cursor.select(&pool); // b
        assert_eq!(cursor.select(&pool).unwrap().id, "a");
    }
}
