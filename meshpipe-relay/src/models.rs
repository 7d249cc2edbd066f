use serde::{Deserialize, Serialize};

/// Numeric identifier of a device on the mesh, stable for the device lifetime
pub type NodeId = u32;

/// Decoded event handed over by the radio layer; never mutated downstream
#[derive(Debug, Clone)]
pub enum RawEvent {
    Message {
        node: NodeId,
        text: String,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    },
    Position {
        node: NodeId,
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<i32>,
        rx_time: Option<i64>,
        rssi: Option<i32>,
        snr: Option<f32>,
    },
    Telemetry { node: NodeId, metrics: DeviceMetrics },
}

/// Device metrics as reported by a telemetry event (every field optional on the wire)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceMetrics {
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
    pub channel_utilization: Option<f32>,
    pub air_util_tx: Option<f32>,
    pub uptime_seconds: Option<u64>,
}

impl DeviceMetrics {
    /// True when at least one metric was reported
    pub fn has_any(&self) -> bool {
        self.battery_level.is_some()
            || self.voltage.is_some()
            || self.channel_utilization.is_some()
            || self.air_util_tx.is_some()
            || self.uptime_seconds.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Message,
    Position,
    Telemetry,
}

impl RecordKind {
    pub fn id_prefix(self) -> &'static str {
        match self {
            RecordKind::Message => "msg",
            RecordKind::Position => "pos",
            RecordKind::Telemetry => "telem",
        }
    }
}

/// Canonical outbound record, serialized camelCase for the aggregation server.
/// Optional fields stay typed here; display sentinels only appear at the
/// console boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub timestamp: String,
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// "lat, lon" at 6-decimal precision, only when both coordinates are usable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_util: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_util: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_hours: Option<f64>,
}
