use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pairlink_link::Packet;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    id: i64,
    #[serde(rename = "type")]
    packet_type: &'a str,
    body: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_received: Option<u64>,
}

impl<'a> PacketOutput<'a> {
    fn new(packet: &'a Packet, payload_received: Option<u64>) -> Self {
        Self {
            id: packet.id,
            packet_type: &packet.packet_type,
            body: &packet.body,
            payload_size: packet.payload_size,
            payload_channel: payload_channel(packet),
            payload_received,
        }
    }
}

/// Print one packet. `payload_received` is the number of payload bytes the
/// receiver drained, when a payload was attached.
pub fn print_packet(packet: &Packet, payload_received: Option<u64>, format: OutputFormat) {
    println!("{}", render_packet(packet, payload_received, format));
}

fn render_packet(packet: &Packet, payload_received: Option<u64>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput::new(packet, payload_received);
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "TYPE", "BODY", "PAYLOAD"])
                .add_row(vec![
                    packet.id.to_string(),
                    packet.packet_type.clone(),
                    body_preview(&packet.body),
                    payload_summary(packet, payload_received),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => format!(
            "type={} id={} body={} payload={}",
            packet.packet_type,
            packet.id,
            body_preview(&packet.body),
            payload_summary(packet, payload_received)
        ),
    }
}

fn payload_channel(packet: &Packet) -> Option<String> {
    packet
        .transfer_channel()
        .and_then(|resolved| resolved.ok())
        .map(|channel| channel.to_string())
}

fn body_preview(body: &Map<String, Value>) -> String {
    serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string())
}

fn payload_summary(packet: &Packet, payload_received: Option<u64>) -> String {
    if !packet.has_payload_transfer_info() {
        return "-".to_string();
    }
    let declared = match packet.payload_size_hint() {
        Some(size) => format!("{size} bytes"),
        None => "unknown size".to_string(),
    };
    match payload_received {
        Some(received) => format!("{declared}, {received} received"),
        None => declared,
    }
}
