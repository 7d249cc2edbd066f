//! Meshpipe relay daemon
//!
//! Bootstraps the whole relay: configuration, the mesh gateway listener, the
//! batched cloud uplink, the periodic telemetry request and node discovery
//! loops, and a ctrl-c shutdown that flushes whatever is still queued.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use meshpipe_relay::pipeline::RelayPipeline;
use meshpipe_relay::sink::SinkClient;
use meshpipe_relay::uplink::{self, UplinkQueue, UplinkTuning};
use meshpipe_relay::{config, console, radio};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = config::load_config().await;
    let overrides = cfg.node_overrides();
    console::print_startup(&overrides);
    console::print_mode(cfg.server_url.as_deref());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // cloud mode only exists when a server is configured
    let (uplink_queue, sender_handle) = match &cfg.server_url {
        Some(url) => {
            let queue = UplinkQueue::new();
            let handle = uplink::spawn_uplink_sender(
                queue.clone(),
                SinkClient::new(url.clone()),
                UplinkTuning::from(&cfg.batch),
                shutdown_rx.clone(),
            );
            (queue, Some(handle))
        }
        None => (UplinkQueue::disabled(), None),
    };

    let pipeline = Arc::new(RelayPipeline::new(
        overrides,
        cfg.dedup.message_capacity,
        uplink_queue,
    ));

    let (client, eventloop) = radio::create_client(&cfg.mqtt);
    radio::spawn_gateway_listener(
        client.clone(),
        eventloop,
        cfg.mqtt.topic_prefix.clone(),
        pipeline.clone(),
    );
    radio::spawn_telemetry_requester(
        client,
        cfg.mqtt.topic_prefix.clone(),
        cfg.radio.telemetry_interval(),
    );
    radio::spawn_node_watch(pipeline.clone(), cfg.radio.node_check_interval());

    info!("meshpipe relay up, listening for mesh traffic");
    tokio::signal::ctrl_c().await?;

    info!("shutting down...");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sender_handle {
        // give the last batch a chance, but never hang the shutdown
        if tokio::time::timeout(Duration::from_secs(15), handle).await.is_err() {
            warn!("uplink sender did not finish in time, abandoning the last batch");
        }
    }
    Ok(())
}
