//! The relay pipeline
//!
//! One object owns every piece of state the relay keeps: the node directory,
//! the telemetry cache, the dedup engine, the record counter and the uplink
//! queue handle. It is built once at startup and shared with the radio task;
//! the uplink sender only ever sees the queue. Handlers never perform network
//! I/O, so the event path cannot stall on the cloud.

use std::collections::HashMap;
use tracing::debug;

use crate::console;
use crate::dedup::DedupEngine;
use crate::models::{DeviceMetrics, NodeId, RawEvent};
use crate::nodes::NodeDirectory;
use crate::normalize::{usable_coords, RecordFactory};
use crate::telemetry::TelemetryCache;
use crate::uplink::UplinkQueue;

pub struct RelayPipeline {
    directory: NodeDirectory,
    telemetry: TelemetryCache,
    dedup: DedupEngine,
    factory: RecordFactory,
    uplink: UplinkQueue,
}

impl RelayPipeline {
    pub fn new(
        overrides: HashMap<NodeId, String>,
        message_dedup_capacity: usize,
        uplink: UplinkQueue,
    ) -> Self {
        Self {
            directory: NodeDirectory::new(overrides),
            telemetry: TelemetryCache::new(),
            dedup: DedupEngine::new(message_dedup_capacity),
            factory: RecordFactory::new(),
            uplink,
        }
    }

    /// Entry point for the radio task, once per decoded event
    pub fn handle_event(&self, event: RawEvent) {
        match event {
            RawEvent::Message { node, text, rx_time, rssi, snr } => {
                self.handle_message(node, text, rx_time, rssi, snr);
            }
            RawEvent::Position { node, latitude, longitude, altitude, rx_time, rssi, snr } => {
                self.handle_position(node, latitude, longitude, altitude, rx_time, rssi, snr);
            }
            RawEvent::Telemetry { node, metrics } => self.handle_telemetry(node, metrics),
        }
    }

    fn handle_message(
        &self,
        node: NodeId,
        text: String,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    ) {
        self.directory.record_seen(node);
        let coarse_ts = rx_time.unwrap_or_else(|| chrono::Utc::now().timestamp());
        if self.dedup.observe_message(node, &text, coarse_ts) {
            debug!("suppressed duplicate message from 0x{node:08x}");
            return;
        }
        let record = self
            .factory
            .message(&self.directory, &self.telemetry, node, &text, rx_time, rssi, snr);
        console::print_record(&record);
        self.uplink.enqueue(record);
    }

    fn handle_position(
        &self,
        node: NodeId,
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<i32>,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    ) {
        self.directory.record_seen(node);
        // a report without usable coordinates is not an error, just noise
        let Some((lat, lon)) = usable_coords(latitude, longitude) else {
            return;
        };
        self.directory.record_position(node, lat, lon, altitude);
        if self.dedup.observe_position(node, lat, lon, altitude) {
            debug!("suppressed repeated position from 0x{node:08x}");
            return;
        }
        let record = self.factory.position(
            &self.directory,
            &self.telemetry,
            node,
            lat,
            lon,
            altitude,
            rx_time,
            rssi,
            snr,
        );
        console::print_record(&record);
        self.uplink.enqueue(record);
    }

    fn handle_telemetry(&self, node: NodeId, metrics: DeviceMetrics) {
        self.directory.record_seen(node);
        self.telemetry.record(node, metrics.clone());
        // cache update always happens; only metric-bearing reports are relayed
        if !metrics.has_any() {
            return;
        }
        let record = self.factory.telemetry(&self.directory, node, &metrics);
        console::print_record(&record);
        self.uplink.enqueue(record);
    }

    pub fn handle_nodeinfo(&self, node: NodeId, long_name: Option<String>, short_name: Option<String>) {
        self.directory.record_names(node, long_name, short_name);
    }

    pub fn known_nodes(&self) -> Vec<NodeId> {
        self.directory.known_nodes()
    }

    pub fn display_name(&self, node: NodeId) -> String {
        self.directory.display_name(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;

    fn pipeline() -> RelayPipeline {
        let mut overrides = HashMap::new();
        overrides.insert(0x9e7595c4, "Raphael".to_string());
        RelayPipeline::new(overrides, 1000, UplinkQueue::new())
    }

    fn message(node: NodeId, text: &str, rx_time: i64) -> RawEvent {
        RawEvent::Message {
            node,
            text: text.into(),
            rx_time: Some(rx_time),
            rssi: Some(-80),
            snr: Some(6.25),
        }
    }

    fn position(node: NodeId, lat: f64, lon: f64) -> RawEvent {
        RawEvent::Position {
            node,
            latitude: Some(lat),
            longitude: Some(lon),
            altitude: Some(12),
            rx_time: Some(1_722_770_000),
            rssi: None,
            snr: None,
        }
    }

    #[test]
    fn test_duplicate_message_enqueued_once() {
        let p = pipeline();
        p.handle_event(message(1, "hello", 1000));
        p.handle_event(message(1, "hello", 1000));
        assert_eq!(p.uplink.len(), 1);
    }

    #[test]
    fn test_position_suppression_sequence() {
        let p = pipeline();
        p.handle_event(position(1, 37.7749, -122.4194));
        p.handle_event(position(1, 37.7749, -122.4194));
        p.handle_event(position(1, 37.7750, -122.4194));
        p.handle_event(position(1, 37.7749, -122.4194));
        // consecutive-only suppression: 4 reports, 3 delivered
        assert_eq!(p.uplink.len(), 3);
    }

    #[test]
    fn test_position_without_coords_discarded() {
        let p = pipeline();
        p.handle_event(RawEvent::Position {
            node: 1,
            latitude: None,
            longitude: Some(10.0),
            altitude: None,
            rx_time: None,
            rssi: None,
            snr: None,
        });
        p.handle_event(position(1, 0.0, 0.0));
        assert_eq!(p.uplink.len(), 0);
    }

    #[test]
    fn test_message_enriched_from_prior_traffic() {
        let p = pipeline();
        p.handle_event(RawEvent::Telemetry {
            node: 0x9e7595c4,
            metrics: DeviceMetrics {
                voltage: Some(3.97),
                battery_level: Some(82),
                ..Default::default()
            },
        });
        p.handle_event(position(0x9e7595c4, 37.7749, -122.4194));
        p.handle_event(message(0x9e7595c4, "checking in", 2000));

        let records = p.uplink.drain();
        assert_eq!(records.len(), 3);
        let msg = records.last().unwrap();
        assert_eq!(msg.kind, RecordKind::Message);
        assert_eq!(msg.from, "Raphael");
        assert_eq!(msg.battery.as_deref(), Some("3.97V (82%)"));
        assert_eq!(msg.location.as_deref(), Some("37.774900, -122.419400"));
        assert!(msg.map_link.is_some());
    }

    #[test]
    fn test_telemetry_without_metrics_cached_but_not_relayed() {
        let p = pipeline();
        p.handle_event(RawEvent::Telemetry {
            node: 7,
            metrics: DeviceMetrics::default(),
        });
        assert_eq!(p.uplink.len(), 0);
        assert!(p.telemetry.snapshot(7).is_some());
    }

    #[test]
    fn test_telemetry_not_deduplicated() {
        let p = pipeline();
        let metrics = DeviceMetrics {
            battery_level: Some(82),
            ..Default::default()
        };
        p.handle_event(RawEvent::Telemetry { node: 7, metrics: metrics.clone() });
        p.handle_event(RawEvent::Telemetry { node: 7, metrics });
        assert_eq!(p.uplink.len(), 2);
    }

    #[test]
    fn test_ids_unique_across_kinds() {
        let p = pipeline();
        p.handle_event(message(1, "a", 1));
        p.handle_event(position(1, 10.0, 20.0));
        let records = p.uplink.drain();
        assert_eq!(records.len(), 2);
        assert!(records[0].id.starts_with("msg_0_"));
        assert!(records[1].id.starts_with("pos_1_"));
    }

    #[test]
    fn test_local_only_pipeline_accepts_events() {
        let mut overrides = HashMap::new();
        overrides.insert(1, "Solo".to_string());
        let p = RelayPipeline::new(overrides, 10, UplinkQueue::disabled());
        p.handle_event(message(1, "no cloud", 1));
        assert_eq!(p.uplink.len(), 0);
        assert_eq!(p.known_nodes(), vec![1]);
    }

    #[test]
    fn test_every_event_counts_as_sighting() {
        let p = pipeline();
        p.handle_event(message(1, "a", 1));
        p.handle_event(position(2, 10.0, 20.0));
        p.handle_event(RawEvent::Telemetry { node: 3, metrics: DeviceMetrics::default() });
        p.handle_nodeinfo(4, Some("Base".into()), None);
        let mut nodes = p.known_nodes();
        nodes.sort_unstable();
        assert_eq!(nodes, vec![1, 2, 3, 4]);
    }
}
