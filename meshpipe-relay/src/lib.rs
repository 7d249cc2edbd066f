//! Meshpipe relay library
//!
//! Ingests mesh radio events (text, positions, telemetry), suppresses
//! duplicates, enriches records with node names and battery state, and
//! forwards them to an aggregation server in small batches. The binaries
//! wire these modules together; everything is transport-agnostic except
//! `radio` (MQTT gateway glue) and `sink` (HTTP client).

pub mod config;
pub mod console;
pub mod dedup;
pub mod models;
pub mod nodes;
pub mod normalize;
pub mod pipeline;
pub mod radio;
pub mod sink;
pub mod telemetry;
pub mod uplink;
