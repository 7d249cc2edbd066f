//! Duplicate suppression for inbound events
//!
//! Messages: a digest over (node, text, coarse timestamp) goes into a bounded
//! cache with FIFO eviction in insertion order. Keys are only inserted on
//! first sight; a repeat hit leaves the cache untouched so the capacity
//! accounting stays exact. Eviction is count-based only, there is no time
//! horizon.
//!
//! Positions: one fingerprint per node at 6-decimal precision. Only
//! consecutive identical positions are suppressed; a position that changes
//! and then reverts is reported again.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::NodeId;

type DedupKey = [u8; 32];

/// (lat, lon) in micro-degrees plus altitude in meters, so equality is exact
type PositionFingerprint = (i64, i64, Option<i64>);

struct MessageCache {
    seen: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
    capacity: usize,
}

pub struct DedupEngine {
    messages: Mutex<MessageCache>,
    positions: Mutex<HashMap<NodeId, PositionFingerprint>>,
}

impl DedupEngine {
    pub fn new(message_capacity: usize) -> Self {
        Self {
            messages: Mutex::new(MessageCache {
                seen: HashSet::new(),
                order: VecDeque::new(),
                capacity: message_capacity.max(1),
            }),
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the message was already seen. The coarse timestamp is
    /// part of the key: the same text retransmitted in a different second is
    /// treated as a new message.
    pub fn observe_message(&self, node: NodeId, text: &str, coarse_ts: i64) -> bool {
        let key = message_key(node, text, coarse_ts);
        let mut cache = self.messages.lock();
        if cache.seen.contains(&key) {
            return true;
        }
        cache.seen.insert(key);
        cache.order.push_back(key);
        while cache.order.len() > cache.capacity {
            if let Some(oldest) = cache.order.pop_front() {
                cache.seen.remove(&oldest);
            }
        }
        false
    }

    /// Returns true when the node's position matches its previous report.
    /// Any change overwrites the stored fingerprint.
    pub fn observe_position(&self, node: NodeId, latitude: f64, longitude: f64, altitude: Option<i32>) -> bool {
        let fingerprint = position_fingerprint(latitude, longitude, altitude);
        let mut positions = self.positions.lock();
        match positions.get(&node) {
            Some(previous) if *previous == fingerprint => true,
            _ => {
                positions.insert(node, fingerprint);
                false
            }
        }
    }

    pub fn message_cache_len(&self) -> usize {
        self.messages.lock().order.len()
    }
}

fn message_key(node: NodeId, text: &str, coarse_ts: i64) -> DedupKey {
    let mut hasher = Sha256::new();
    hasher.update(node.to_be_bytes());
    hasher.update(text.as_bytes());
    hasher.update(coarse_ts.to_be_bytes());
    hasher.finalize().into()
}

fn position_fingerprint(latitude: f64, longitude: f64, altitude: Option<i32>) -> PositionFingerprint {
    (
        (latitude * 1e6).round() as i64,
        (longitude * 1e6).round() as i64,
        altitude.map(i64::from),
    )
}
