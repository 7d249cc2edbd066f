//! Mesh gateway glue
//!
//! Everything transport-specific lives here: the MQTT client against the
//! mesh gateway bridge, JSON envelope decoding into raw events, the periodic
//! telemetry request, and the node discovery watch. The pipeline itself never
//! sees MQTT.

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MqttConf;
use crate::console;
use crate::models::{DeviceMetrics, NodeId, RawEvent};
use crate::pipeline::RelayPipeline;

/// One decoded gateway publish
#[derive(Debug)]
pub enum GatewayEvent {
    Raw(RawEvent),
    NodeInfo {
        node: NodeId,
        long_name: Option<String>,
        short_name: Option<String>,
    },
}

/// Envelope shape the gateway bridge publishes on <prefix>/.../json/...
#[derive(Debug, Deserialize)]
struct Envelope {
    from: NodeId,
    #[serde(rename = "type")]
    kind: String,
    timestamp: Option<i64>,
    rssi: Option<i32>,
    snr: Option<f32>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TextPayload {
    text: String,
}

/// latitude_i/longitude_i come scaled by 1e7
#[derive(Debug, Deserialize)]
struct PositionPayload {
    latitude_i: Option<i64>,
    longitude_i: Option<i64>,
    altitude: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct NodeInfoPayload {
    longname: Option<String>,
    shortname: Option<String>,
}

pub fn decode_publish(payload: &[u8]) -> Option<GatewayEvent> {
    let envelope: Envelope = match serde_json::from_slice(payload) {
        Ok(env) => env,
        Err(e) => {
            debug!("ignoring undecodable gateway payload: {e}");
            return None;
        }
    };

    match envelope.kind.as_str() {
        "text" => {
            let text: TextPayload = serde_json::from_value(envelope.payload).ok()?;
            Some(GatewayEvent::Raw(RawEvent::Message {
                node: envelope.from,
                text: text.text,
                rx_time: envelope.timestamp,
                rssi: envelope.rssi,
                snr: envelope.snr,
            }))
        }
        "position" => {
            let pos: PositionPayload = serde_json::from_value(envelope.payload).ok()?;
            Some(GatewayEvent::Raw(RawEvent::Position {
                node: envelope.from,
                latitude: pos.latitude_i.map(|v| v as f64 / 1e7),
                longitude: pos.longitude_i.map(|v| v as f64 / 1e7),
                altitude: pos.altitude,
                rx_time: envelope.timestamp,
                rssi: envelope.rssi,
                snr: envelope.snr,
            }))
        }
        "telemetry" => {
            let metrics: DeviceMetrics = serde_json::from_value(envelope.payload).ok()?;
            // environment-only telemetry carries nothing we relay
            if !metrics.has_any() {
                debug!("ignoring telemetry without device metrics from 0x{:08x}", envelope.from);
                return None;
            }
            Some(GatewayEvent::Raw(RawEvent::Telemetry {
                node: envelope.from,
                metrics,
            }))
        }
        "nodeinfo" => {
            let info: NodeInfoPayload = serde_json::from_value(envelope.payload).ok()?;
            Some(GatewayEvent::NodeInfo {
                node: envelope.from,
                long_name: info.longname,
                short_name: info.shortname,
            })
        }
        other => {
            debug!("ignoring gateway event type '{other}'");
            None
        }
    }
}

pub fn create_client(conf: &MqttConf) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new("meshpipe-relay", &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(15));
    AsyncClient::new(opts, 10)
}

/// Subscribes to the gateway topics and feeds decoded events to the pipeline
pub fn spawn_gateway_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topic_prefix: String,
    pipeline: Arc<RelayPipeline>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let filter = format!("{topic_prefix}/#");
        if let Err(e) = client.subscribe(&filter, QoS::AtLeastOnce).await {
            error!("gateway subscribe failed: {e:?}");
            return;
        }
        info!("listening for mesh events on {filter}");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    match decode_publish(&publish.payload) {
                        Some(GatewayEvent::Raw(event)) => pipeline.handle_event(event),
                        Some(GatewayEvent::NodeInfo { node, long_name, short_name }) => {
                            pipeline.handle_nodeinfo(node, long_name, short_name);
                        }
                        None => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("gateway connection error: {e:?}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

/// Asks the mesh for fresh telemetry on startup and then on a fixed cadence
pub fn spawn_telemetry_requester(
    client: AsyncClient,
    topic_prefix: String,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let topic = format!("{topic_prefix}/json/mqtt");
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let request = serde_json::json!({ "type": "telemetry_request", "want_response": true });
            match client.publish(&topic, QoS::AtLeastOnce, false, request.to_string()).await {
                Ok(_) => info!("📡 requested telemetry from all nodes"),
                Err(e) => warn!("✗ failed to request telemetry: {e:?}"),
            }
        }
    })
}

/// Periodically reports nodes newly heard on the mesh and the running total
pub fn spawn_node_watch(pipeline: Arc<RelayPipeline>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut known: HashSet<NodeId> = pipeline.known_nodes().into_iter().collect();
        let mut tick = tokio::time::interval(every);
        tick.tick().await; // the startup state is the baseline, not a report
        loop {
            tick.tick().await;
            let current: HashSet<NodeId> = pipeline.known_nodes().into_iter().collect();
            let mut fresh: Vec<NodeId> = current.difference(&known).copied().collect();
            fresh.sort_unstable();
            if !fresh.is_empty() {
                let named: Vec<(NodeId, String)> = fresh
                    .into_iter()
                    .map(|node| (node, pipeline.display_name(node)))
                    .collect();
                console::print_new_nodes(&named);
            }
            known = current;
            if !known.is_empty() {
                console::print_mesh_total(known.len());
            }
        }
    })
}
