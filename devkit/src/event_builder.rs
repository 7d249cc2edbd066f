/*!
Canned mesh gateway payloads for tests.

Builds the JSON envelopes the gateway bridge publishes, one helper per event
class, with deterministic timestamps so dedup-sensitive tests stay stable.
*/

use serde_json::{json, Value};

/// Builds gateway envelopes the way the MQTT bridge publishes them
pub struct MeshEventBuilder;

impl MeshEventBuilder {
    /// Text message envelope with fixed receive time and radio stats
    pub fn text(from: u32, text: &str) -> Value {
        Self::text_at(from, text, 1_722_770_000)
    }

    pub fn text_at(from: u32, text: &str, timestamp: i64) -> Value {
        json!({
            "from": from,
            "type": "text",
            "timestamp": timestamp,
            "rssi": -80,
            "snr": 6.25,
            "payload": { "text": text }
        })
    }

    /// Position envelope; coordinates go out 1e7-scaled like the real bridge
    pub fn position(from: u32, latitude: f64, longitude: f64, altitude: i32) -> Value {
        json!({
            "from": from,
            "type": "position",
            "timestamp": 1_722_770_000,
            "rssi": -92,
            "snr": 4.5,
            "payload": {
                "latitude_i": (latitude * 1e7).round() as i64,
                "longitude_i": (longitude * 1e7).round() as i64,
                "altitude": altitude
            }
        })
    }

    pub fn telemetry(from: u32, battery_level: u32, voltage: f32) -> Value {
        json!({
            "from": from,
            "type": "telemetry",
            "payload": {
                "battery_level": battery_level,
                "voltage": voltage,
                "channel_utilization": 5.2,
                "air_util_tx": 1.4,
                "uptime_seconds": 7200
            }
        })
    }

    pub fn nodeinfo(from: u32, longname: &str, shortname: &str) -> Value {
        json!({
            "from": from,
            "type": "nodeinfo",
            "payload": {
                "id": format!("!{from:08x}"),
                "longname": longname,
                "shortname": shortname
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_envelope_shape() {
        let envelope = MeshEventBuilder::text(0x9e7595c4, "hello mesh");
        assert_eq!(envelope["from"], 0x9e7595c4u32);
        assert_eq!(envelope["type"], "text");
        assert_eq!(envelope["payload"]["text"], "hello mesh");
    }

    #[test]
    fn test_position_scaling() {
        let envelope = MeshEventBuilder::position(42, 37.7749, -122.4194, 12);
        assert_eq!(envelope["payload"]["latitude_i"], 377_749_000i64);
        assert_eq!(envelope["payload"]["longitude_i"], -1_224_194_000i64);
    }

    #[test]
    fn test_same_input_is_byte_identical() {
        let a = MeshEventBuilder::text(1, "repeat").to_string();
        let b = MeshEventBuilder::text(1, "repeat").to_string();
        assert_eq!(a, b);
    }
}
