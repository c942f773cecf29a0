//! In-memory shipment telemetry store.
//!
//! Stands in for the warehouse/carrier system the orchestrator's
//! `query_shipment` tool polls.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: String,
    pub status: String,
    pub location: String,
    pub notes: String,
    pub timestamp: String,
}

impl ShipmentRecord {
    fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "Unknown".to_string(),
            location: "Unknown".to_string(),
            notes: "not available".to_string(),
            timestamp: now_iso8601(),
        }
    }

    fn debug(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "Debug".to_string(),
            location: "LocalHost".to_string(),
            notes: "Debug".to_string(),
            timestamp: now_iso8601(),
        }
    }
}

pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Tracked shipments plus the debug auto-create toggle.
pub struct ShipmentStore {
    records: RwLock<HashMap<String, ShipmentRecord>>,
    auto_add: AtomicBool,
}

impl ShipmentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            auto_add: AtomicBool::new(false),
        }
    }

    pub fn auto_add_enabled(&self) -> bool {
        self.auto_add.load(Ordering::SeqCst)
    }

    pub fn toggle_auto_add(&self) -> bool {
        let prev = self.auto_add.fetch_xor(true, Ordering::SeqCst);
        !prev
    }

    pub fn add(&self, id: String, status: String, location: String, notes: String) {
        let record = ShipmentRecord {
            id: id.clone(),
            status,
            location,
            notes,
            timestamp: now_iso8601(),
        };
        self.records.write().unwrap().insert(id, record);
    }

    /// Looks up `id`, auto-creating a debug record when the auto-add flag is
    /// set and the id is unknown, else returning a synthetic "Unknown" record.
    pub fn lookup(&self, id: &str) -> ShipmentRecord {
        if let Some(record) = self.records.read().unwrap().get(id) {
            return record.clone();
        }
        if self.auto_add_enabled() {
            let record = ShipmentRecord::debug(id);
            self.records
                .write()
                .unwrap()
                .insert(id.to_string(), record.clone());
            record
        } else {
            ShipmentRecord::unknown(id)
        }
    }

    pub fn query_many(&self, ids: &[String]) -> Vec<ShipmentRecord> {
        ids.iter().map(|id| self.lookup(id)).collect()
    }

    pub fn all(&self) -> Vec<ShipmentRecord> {
        let mut records: Vec<ShipmentRecord> = self.records.read().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_without_auto_add_is_unknown_status() {
        let store = ShipmentStore::new();
        let record = store.lookup("ship-1");
        assert_eq!(record.status, "Unknown");
        assert_eq!(record.location, "Unknown");
        assert_eq!(record.notes, "not available");
    }

    #[test]
    fn unknown_id_with_auto_add_creates_debug_record() {
        let store = ShipmentStore::new();
        store.toggle_auto_add();
        let record = store.lookup("ship-2");
        assert_eq!(record.status, "Debug");
        assert_eq!(record.location, "LocalHost");
        assert_eq!(record.notes, "Debug");
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn added_record_is_returned_verbatim() {
        let store = ShipmentStore::new();
        store.add(
            "ship-3".to_string(),
            "In-Transit".to_string(),
            "Warehouse A".to_string(),
            "on schedule".to_string(),
        );
        let record = store.lookup("ship-3");
        assert_eq!(record.status, "In-Transit");
        assert_eq!(record.location, "Warehouse A");
    }

    #[test]
    fn toggle_auto_add_flips_each_call() {
        let store = ShipmentStore::new();
        assert!(!store.auto_add_enabled());
        assert!(store.toggle_auto_add());
        assert!(store.auto_add_enabled());
        assert!(!store.toggle_auto_add());
    }

    #[test]
    fn query_many_preserves_requested_order() {
        let store = ShipmentStore::new();
        store.add("a".to_string(), "s".to_string(), "l".to_string(), "n".to_string());
        let records = store.query_many(&["a".to_string(), "b".to_string()]);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].id, "b");
        assert_eq!(records[1].status, "Unknown");
    }
}
