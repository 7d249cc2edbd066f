//! Relay configuration
//!
//! Loaded from a YAML file (path in MESHPIPE_CONFIG, default relay.yaml) with
//! sensible defaults for every section. The SERVER_URL environment variable
//! overrides the file and switches cloud mode on; without a server URL the
//! relay runs local-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

use crate::models::NodeId;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Aggregation server base URL; None = local-only mode
    pub server_url: Option<String>,
    /// Display name overrides, keyed by node id ("0x9e7595c4" or decimal)
    pub nodes: HashMap<String, String>,
    pub mqtt: MqttConf,
    pub batch: BatchConf,
    pub dedup: DedupConf,
    pub radio: RadioConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub topic_prefix: String,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            topic_prefix: "msh".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConf {
    pub size: usize,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for BatchConf {
    fn default() -> Self {
        Self {
            size: 5,
            timeout_secs: 3,
            poll_interval_secs: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DedupConf {
    pub message_capacity: usize,
}

impl Default for DedupConf {
    fn default() -> Self {
        Self { message_capacity: 1000 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RadioConf {
    pub telemetry_interval_secs: u64,
    pub node_check_interval_secs: u64,
}

impl Default for RadioConf {
    fn default() -> Self {
        Self {
            telemetry_interval_secs: 30,
            node_check_interval_secs: 60,
        }
    }
}

impl RadioConf {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry_interval_secs)
    }

    pub fn node_check_interval(&self) -> Duration {
        Duration::from_secs(self.node_check_interval_secs)
    }
}

impl RelayConfig {
    /// Parses the override table into node ids; invalid keys are skipped with a warning
    pub fn node_overrides(&self) -> HashMap<NodeId, String> {
        let mut out = HashMap::new();
        for (key, name) in &self.nodes {
            let parsed = match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
                Some(hex) => NodeId::from_str_radix(hex, 16),
                None => key.parse(),
            };
            match parsed {
                Ok(id) => {
                    out.insert(id, name.clone());
                }
                Err(_) => warn!("ignoring invalid node id '{key}' in config"),
            }
        }
        out
    }
}

pub async fn load_config() -> RelayConfig {
    let path = std::env::var("MESHPIPE_CONFIG").unwrap_or_else(|_| "relay.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            RelayConfig::default()
        } else {
            serde_yaml::from_str(&txt).unwrap_or_else(|e| {
                warn!("invalid config {path}: {e}, falling back to defaults");
                RelayConfig::default()
            })
        }
    } else {
        info!("no {path}, using default config");
        RelayConfig::default()
    };

    // SERVER_URL wins over the file, same switch the deployment scripts use
    if let Ok(url) = std::env::var("SERVER_URL") {
        if !url.trim().is_empty() {
            cfg.server_url = Some(url);
        }
    }
    cfg
}
