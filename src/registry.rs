//! Per-service instance registry (§4.7, §10.5).
//!
//! The source keeps this as a sorted singly-linked list under a single
//! fibril mutex. A concurrent map (e.g. `dashmap`, as other crates in
//! this family reach for) would drop the "sorted scan" property and is
//! not needed here: registrations are rare compared to lookups, so a
//! plain `Mutex<Vec<_>>` kept sorted by `service_id` is both simpler and
//! observably identical to the source.

use std::sync::Mutex;

use crate::error::{Result, RpcError};
use crate::node::ServiceId;

struct Entry<T> {
    service_id: ServiceId,
    data: T,
}

/// Mutex-protected, `service_id`-ordered instance registry.
pub struct Registry<T> {
    entries: Mutex<Vec<Entry<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    /// Inserts `data` under `service_id`, keeping the list sorted.
    /// `EEXIST` if `service_id` is already registered.
    pub fn create(&self, service_id: ServiceId, data: T) -> Result<()> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        match entries.binary_search_by_key(&service_id, |e| e.service_id) {
            Ok(_) => Err(RpcError::AlreadyExists),
            Err(pos) => {
                entries.insert(pos, Entry { service_id, data });
                Ok(())
            }
        }
    }

    /// Removes and returns the entry for `service_id`. `ENOENT` if absent.
    pub fn destroy(&self, service_id: ServiceId) -> Result<T> {
        let mut entries = self.entries.lock().expect("registry mutex poisoned");
        match entries.binary_search_by_key(&service_id, |e| e.service_id) {
            Ok(pos) => Ok(entries.remove(pos).data),
            Err(_) => Err(RpcError::NoEntry),
        }
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Registry<T> {
    /// Returns a clone of the data registered under `service_id`.
    /// `ENOENT` if absent.
    pub fn get(&self, service_id: ServiceId) -> Result<T> {
        let entries = self.entries.lock().expect("registry mutex poisoned");
        entries
            .binary_search_by_key(&service_id, |e| e.service_id)
            .ok()
            .map(|pos| entries[pos].data.clone())
            .ok_or(RpcError::NoEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_destroy_round_trip() {
        let reg: Registry<&'static str> = Registry::new();
        reg.create(3, "three").unwrap();
        assert_eq!(reg.get(3).unwrap(), "three");
        assert_eq!(reg.destroy(3).unwrap(), "three");
        assert_eq!(reg.get(3), Err(RpcError::NoEntry));
    }

    #[test]
    fn create_rejects_duplicate() {
        let reg: Registry<u32> = Registry::new();
        reg.create(1, 10).unwrap();
        assert_eq!(reg.create(1, 20), Err(RpcError::AlreadyExists));
    }

    #[test]
    fn destroy_missing_is_no_entry() {
        let reg: Registry<u32> = Registry::new();
        assert_eq!(reg.destroy(99), Err(RpcError::NoEntry));
    }

    #[test]
    fn entries_stay_sorted_regardless_of_insertion_order() {
        let reg: Registry<u32> = Registry::new();
        for sid in [5, 1, 9, 3, 7] {
            reg.create(sid, sid as u32 * 10).unwrap();
        }
        let entries = reg.entries.lock().unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.service_id).collect();
        assert_eq!(ids, vec![1, 3, 5, 7, 9]);
    }
}
