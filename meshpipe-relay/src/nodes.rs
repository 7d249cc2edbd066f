//! Node directory and display name resolution
//!
//! Keeps what the mesh reports about each node: long/short names from
//! nodeinfo broadcasts and the last observed position. Display names resolve
//! in priority order: config override table, device long name, device short
//! name, hex id fallback. The override table always wins.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::NodeId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<i32>,
}

#[derive(Debug, Clone, Default)]
struct NodeEntry {
    long_name: Option<String>,
    short_name: Option<String>,
    last_position: Option<KnownPosition>,
}

pub struct NodeDirectory {
    overrides: HashMap<NodeId, String>,
    entries: Mutex<HashMap<NodeId, NodeEntry>>,
}

impl NodeDirectory {
    pub fn new(overrides: HashMap<NodeId, String>) -> Self {
        Self {
            overrides,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures the node exists in the directory (any traffic counts as a sighting)
    pub fn record_seen(&self, node: NodeId) {
        self.entries.lock().entry(node).or_default();
    }

    /// Stores device-reported names; absent fields leave the previous value
    pub fn record_names(&self, node: NodeId, long_name: Option<String>, short_name: Option<String>) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(node).or_default();
        if long_name.is_some() {
            entry.long_name = long_name;
        }
        if short_name.is_some() {
            entry.short_name = short_name;
        }
    }

    pub fn record_position(&self, node: NodeId, latitude: f64, longitude: f64, altitude: Option<i32>) {
        let mut entries = self.entries.lock();
        entries.entry(node).or_default().last_position = Some(KnownPosition {
            latitude,
            longitude,
            altitude,
        });
    }

    pub fn last_position(&self, node: NodeId) -> Option<KnownPosition> {
        self.entries.lock().get(&node).and_then(|e| e.last_position)
    }

    pub fn display_name(&self, node: NodeId) -> String {
        if let Some(name) = self.overrides.get(&node) {
            return name.clone();
        }
        let entries = self.entries.lock();
        if let Some(entry) = entries.get(&node) {
            if let Some(long) = &entry.long_name {
                return long.clone();
            }
            if let Some(short) = &entry.short_name {
                return short.clone();
            }
        }
        format!("0x{node:08x}")
    }

    pub fn known_nodes(&self) -> Vec<NodeId> {
        self.entries.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
