//! Telemetry cache
//!
//! Latest device metrics per node, overwritten on every telemetry event and
//! kept for the process lifetime. Only used to annotate outgoing records and
//! console output, so stale data is acceptable until the node reports again.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::models::{DeviceMetrics, NodeId};

#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub metrics: DeviceMetrics,
    pub observed_at: DateTime<Local>,
}

#[derive(Default)]
pub struct TelemetryCache {
    entries: Mutex<HashMap<NodeId, TelemetrySnapshot>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the node's snapshot, stamped at call time (latest wins)
    pub fn record(&self, node: NodeId, metrics: DeviceMetrics) {
        self.entries.lock().insert(
            node,
            TelemetrySnapshot {
                metrics,
                observed_at: Local::now(),
            },
        );
    }

    pub fn snapshot(&self, node: NodeId) -> Option<TelemetrySnapshot> {
        self.entries.lock().get(&node).cloned()
    }

    /// Battery annotation: "3.97V (82%)", voltage-only, percent-only, or None
    pub fn battery_description(&self, node: NodeId) -> Option<String> {
        let entries = self.entries.lock();
        let metrics = &entries.get(&node)?.metrics;
        match (metrics.voltage, metrics.battery_level) {
            (Some(v), Some(pct)) => Some(format!("{v:.2}V ({pct}%)")),
            (Some(v), None) => Some(format!("{v:.2}V")),
            (None, Some(pct)) => Some(format!("{pct}%")),
            (None, None) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
