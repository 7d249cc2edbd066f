//! Event normalization and enrichment
//!
//! Builds the canonical outbound record for each accepted event: resolved
//! display name, battery annotation from the telemetry cache, formatted
//! coordinates and map link, and a process-local id from one shared counter.

use chrono::{DateTime, Local, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{DeviceMetrics, NodeId, NormalizedRecord, RecordKind};
use crate::nodes::NodeDirectory;
use crate::telemetry::TelemetryCache;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct RecordFactory {
    /// One sequence across all record kinds, so ids stay unique process-wide
    counter: AtomicU64,
}

impl RecordFactory {
    pub fn new() -> Self {
        Self { counter: AtomicU64::new(0) }
    }

    fn next_id(&self, kind: RecordKind) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", kind.id_prefix(), seq, Utc::now().timestamp())
    }

    pub fn message(
        &self,
        directory: &NodeDirectory,
        telemetry: &TelemetryCache,
        node: NodeId,
        text: &str,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    ) -> NormalizedRecord {
        // messages carry the sender's last known position, when there is one
        let position = directory.last_position(node);
        let coords = position.and_then(|p| usable_coords(Some(p.latitude), Some(p.longitude)));
        NormalizedRecord {
            id: self.next_id(RecordKind::Message),
            kind: RecordKind::Message,
            timestamp: format_timestamp(rx_time),
            from: directory.display_name(node),
            message: Some(text.to_string()),
            location: coords.map(|(lat, lon)| format_coordinates(lat, lon)),
            altitude: position.and_then(|p| format_altitude(p.altitude)),
            rssi,
            snr,
            battery: telemetry.battery_description(node),
            map_link: coords.map(|(lat, lon)| maps_link(lat, lon)),
            voltage: None,
            channel_util: None,
            air_util: None,
            uptime_hours: None,
        }
    }

    pub fn position(
        &self,
        directory: &NodeDirectory,
        telemetry: &TelemetryCache,
        node: NodeId,
        latitude: f64,
        longitude: f64,
        altitude: Option<i32>,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    ) -> NormalizedRecord {
        NormalizedRecord {
            id: self.next_id(RecordKind::Position),
            kind: RecordKind::Position,
            timestamp: format_timestamp(rx_time),
            from: directory.display_name(node),
            message: None,
            location: Some(format_coordinates(latitude, longitude)),
            altitude: format_altitude(altitude),
            rssi,
            snr,
            battery: telemetry.battery_description(node),
            map_link: Some(maps_link(latitude, longitude)),
            voltage: None,
            channel_util: None,
            air_util: None,
            uptime_hours: None,
        }
    }

    pub fn telemetry(&self, directory: &NodeDirectory, node: NodeId, metrics: &DeviceMetrics) -> NormalizedRecord {
        NormalizedRecord {
            id: self.next_id(RecordKind::Telemetry),
            kind: RecordKind::Telemetry,
            timestamp: format_timestamp(None),
            from: directory.display_name(node),
            message: None,
            location: None,
            altitude: None,
            rssi: None,
            snr: None,
            battery: metrics.battery_level.map(|pct| format!("{pct}%")),
            map_link: None,
            voltage: metrics.voltage.map(|v| format!("{v}V")),
            channel_util: metrics.channel_utilization,
            air_util: metrics.air_util_tx,
            uptime_hours: metrics.uptime_seconds.map(|s| s as f64 / 3600.0),
        }
    }
}

impl Default for RecordFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Both coordinates present and non-zero, else the pair is unusable
pub fn usable_coords(latitude: Option<f64>, longitude: Option<f64>) -> Option<(f64, f64)> {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
        _ => None,
    }
}

fn format_coordinates(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6}, {longitude:.6}")
}

fn maps_link(latitude: f64, longitude: f64) -> String {
    format!("https://maps.google.com/?q={latitude},{longitude}")
}

fn format_altitude(altitude: Option<i32>) -> Option<String> {
    altitude.filter(|alt| *alt != 0).map(|alt| format!("{alt}m"))
}

/// Receive time when the event carries one, else ingest time, as local "%Y-%m-%d %H:%M:%S"
fn format_timestamp(rx_time: Option<i64>) -> String {
    let stamp: DateTime<Local> = rx_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parts(id: &str) -> Vec<String> {
        id.split('_').map(str::to_string).collect()
    }

    #[test]
    fn test_id_sequence_shared_across_kinds() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());
        let telemetry = TelemetryCache::new();

        let msg = factory.message(&directory, &telemetry, 1, "hi", None, None, None);
        let pos = factory.position(&directory, &telemetry, 1, 1.0, 2.0, None, None, None, None);
        let tel = factory.telemetry(&directory, 1, &DeviceMetrics::default());

        let msg_parts = parts(&msg.id);
        let pos_parts = parts(&pos.id);
        let tel_parts = parts(&tel.id);
        assert_eq!(msg_parts[0], "msg");
        assert_eq!(pos_parts[0], "pos");
        assert_eq!(tel_parts[0], "telem");
        assert_eq!(msg_parts[1], "0");
        assert_eq!(pos_parts[1], "1");
        assert_eq!(tel_parts[1], "2");
        // trailing component is epoch seconds
        assert!(msg_parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn test_position_record_formatting() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());
        let telemetry = TelemetryCache::new();

        let rec = factory.position(
            &directory,
            &telemetry,
            42,
            37.7749,
            -122.4194,
            Some(12),
            Some(1_722_770_000),
            Some(-80),
            Some(6.25),
        );
        assert_eq!(rec.location.as_deref(), Some("37.774900, -122.419400"));
        assert_eq!(rec.altitude.as_deref(), Some("12m"));
        assert_eq!(rec.map_link.as_deref(), Some("https://maps.google.com/?q=37.7749,-122.4194"));
        assert_eq!(rec.rssi, Some(-80));
        assert_eq!(rec.snr, Some(6.25));
    }

    #[test]
    fn test_message_without_known_position() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());
        let telemetry = TelemetryCache::new();

        let rec = factory.message(&directory, &telemetry, 42, "where am I", None, None, None);
        assert!(rec.location.is_none());
        assert!(rec.map_link.is_none());
        assert!(rec.altitude.is_none());
        assert!(rec.battery.is_none());
    }

    #[test]
    fn test_message_picks_up_directory_position_and_battery() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());
        let telemetry = TelemetryCache::new();

        directory.record_position(42, 37.7749, -122.4194, Some(30));
        telemetry.record(
            42,
            DeviceMetrics {
                voltage: Some(3.97),
                battery_level: Some(82),
                ..Default::default()
            },
        );

        let rec = factory.message(&directory, &telemetry, 42, "checking in", None, None, None);
        assert_eq!(rec.location.as_deref(), Some("37.774900, -122.419400"));
        assert_eq!(rec.altitude.as_deref(), Some("30m"));
        assert_eq!(rec.battery.as_deref(), Some("3.97V (82%)"));
    }

    #[test]
    fn test_zero_coords_are_unusable() {
        assert!(usable_coords(Some(0.0), Some(10.0)).is_none());
        assert!(usable_coords(Some(10.0), Some(0.0)).is_none());
        assert!(usable_coords(None, Some(10.0)).is_none());
        assert_eq!(usable_coords(Some(1.5), Some(-2.5)), Some((1.5, -2.5)));
    }

    #[test]
    fn test_telemetry_record_fields() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());

        let metrics = DeviceMetrics {
            battery_level: Some(82),
            voltage: Some(3.97),
            channel_utilization: Some(5.2),
            air_util_tx: Some(1.4),
            uptime_seconds: Some(7200),
        };
        let rec = factory.telemetry(&directory, 42, &metrics);
        assert_eq!(rec.battery.as_deref(), Some("82%"));
        assert_eq!(rec.voltage.as_deref(), Some("3.97V"));
        assert_eq!(rec.channel_util, Some(5.2));
        assert_eq!(rec.uptime_hours, Some(2.0));
    }

    #[test]
    fn test_record_serializes_camel_case_without_null_noise() {
        let factory = RecordFactory::new();
        let directory = NodeDirectory::new(HashMap::new());
        let telemetry = TelemetryCache::new();

        let rec = factory.position(&directory, &telemetry, 42, 1.0, 2.0, None, None, None, None);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "position");
        assert!(json.get("mapLink").is_some());
        // absent optionals are omitted entirely, not serialized as null
        assert!(json.get("message").is_none());
        assert!(json.get("battery").is_none());
        assert!(json.get("channelUtil").is_none());
    }
}
