//! Operator console output
//!
//! The relay's human-readable feed: one framed block per event, a startup
//! banner with the name override table, and periodic mesh membership reports.
//! This is product output on stdout; diagnostics go through tracing instead.

use std::collections::HashMap;

use crate::models::{NodeId, NormalizedRecord, RecordKind};

const RULE: &str = "============================================================";

pub fn print_startup(overrides: &HashMap<NodeId, String>) {
    println!("\n{RULE}");
    println!("NODE MAPPING LOADED:");
    let mut ids: Vec<&NodeId> = overrides.keys().collect();
    ids.sort();
    for id in ids {
        println!("  0x{id:08x} -> {}", overrides[id]);
    }
    println!("{RULE}\n");
}

pub fn print_mode(server_url: Option<&str>) {
    match server_url {
        Some(url) => println!("☁️  Cloud mode enabled - will forward to {url}"),
        None => println!("🏠 Local mode - no cloud forwarding"),
    }
}

pub fn print_record(record: &NormalizedRecord) {
    match record.kind {
        RecordKind::Message => print_message(record),
        RecordKind::Position => print_position(record),
        RecordKind::Telemetry => print_telemetry(record),
    }
}

fn print_message(record: &NormalizedRecord) {
    println!("\n{RULE}");
    println!("📨 MESSAGE [{}]", record.timestamp);
    println!("From: {}", record.from);
    if let Some(text) = &record.message {
        println!("{text}");
    }
    println!(
        "RSSI: {} dBm | SNR: {} dB | Battery: {}",
        or_na_num(record.rssi),
        or_na_num(record.snr),
        or_na(record.battery.as_deref()),
    );
    if let Some(link) = &record.map_link {
        println!("Map: {link}");
    }
    println!("{RULE}\n");
}

fn print_position(record: &NormalizedRecord) {
    println!("\n{RULE}");
    println!("📍 POSITION UPDATE [{}]", record.timestamp);
    println!("From: {}", record.from);
    println!(
        "Location: {} | Altitude: {}",
        or_na(record.location.as_deref()),
        or_na(record.altitude.as_deref()),
    );
    println!(
        "RSSI: {} dBm | SNR: {} dB | Battery: {}",
        or_na_num(record.rssi),
        or_na_num(record.snr),
        or_na(record.battery.as_deref()),
    );
    if let Some(link) = &record.map_link {
        println!("Map: {link}");
    }
    println!("{RULE}\n");
}

fn print_telemetry(record: &NormalizedRecord) {
    // unknown nodes (hex fallback names) stay off the console feed
    if !is_known_name(&record.from) {
        return;
    }
    println!("\n{RULE}");
    println!("📊 TELEMETRY [{}]", record.timestamp);
    println!("From: {}", record.from);
    println!(
        "Battery: {} | Voltage: {}",
        or_na(record.battery.as_deref()),
        or_na(record.voltage.as_deref()),
    );
    println!(
        "Channel Util: {}% | Air Util TX: {}%",
        or_na_num(record.channel_util),
        or_na_num(record.air_util),
    );
    if let Some(hours) = record.uptime_hours {
        println!("Uptime: {hours:.1} hours");
    }
    println!("{RULE}\n");
}

pub fn print_new_nodes(nodes: &[(NodeId, String)]) {
    println!("\n🆕 Detected {} new node(s)!", nodes.len());
    for (id, name) in nodes {
        println!("   - {name} (0x{id:08x})");
    }
}

pub fn print_mesh_total(count: usize) {
    println!("📊 Total nodes in mesh: {count}");
}

fn is_known_name(name: &str) -> bool {
    !name.starts_with("0x")
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn or_na_num<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into())
}
