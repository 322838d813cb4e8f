use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ftlnet_peer::Statistics;
use ftlnet_proto::{channel_name, codec_name, ChannelId, CodecId, Value};
use ftlnet_stream::{StreamEvent, StreamStatistics};
use serde::Serialize;

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
struct PeerOutput<'a> {
    event: &'a str,
    addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_id: Option<&'a str>,
    timestamp: String,
}

/// Listener and peer lifecycle lines of `serve`.
pub fn print_peer_event(event: &str, addr: SocketAddr, peer_id: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PeerOutput {
                event,
                addr: addr.to_string(),
                peer_id,
                timestamp: now_unix_seconds(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = table(vec!["EVENT", "ADDR", "PEER"]);
            table.add_row(vec![
                event.to_string(),
                addr.to_string(),
                peer_id.unwrap_or("-").to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match peer_id {
            Some(peer_id) => println!("{event} addr={addr} peer={peer_id}"),
            None => println!("{event} addr={addr}"),
        },
    }
}

#[derive(Serialize)]
struct CallOutput<'a> {
    procedure: &'a str,
    peer_id: &'a str,
    result: serde_json::Value,
}

pub fn print_call_result(procedure: &str, peer_id: &str, result: &Value, format: OutputFormat) {
    let result = value_to_json(result);
    match format {
        OutputFormat::Json => {
            let out = CallOutput {
                procedure,
                peer_id,
                result,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = table(vec!["PROCEDURE", "PEER", "RESULT"]);
            table.add_row(vec![procedure.to_string(), peer_id.to_string(), result.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{procedure} -> {result}");
        }
    }
}

#[derive(Serialize, Default)]
struct EventOutput {
    uri: String,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    frameset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
}

fn describe(uri: &str, event: &StreamEvent) -> EventOutput {
    let mut out = EventOutput {
        uri: uri.to_string(),
        event: event.kind(),
        ..EventOutput::default()
    };
    match event {
        StreamEvent::Raw { packet, data } | StreamEvent::Packet { packet, data } => {
            out.frameset = Some(packet.frameset);
            out.frame = Some(packet.frame);
            out.channel = Some(channel_label(packet.channel));
            out.timestamp = Some(packet.timestamp);
            out.codec = Some(codec_label(data.codec));
            out.size = Some(data.payload.len());
        }
        StreamEvent::Request { packet } => {
            out.frameset = Some(packet.frameset);
            out.frame = Some(packet.frame);
            out.channel = Some(channel_label(packet.channel));
            out.timestamp = Some(packet.timestamp);
        }
        StreamEvent::FramesetData { channel, value } | StreamEvent::Data { channel, value } => {
            out.channel = Some(channel_label(*channel));
            out.value = Some(value_to_json(value));
        }
        StreamEvent::FrameStart { timestamp } | StreamEvent::FrameEnd { timestamp } => {
            out.timestamp = Some(*timestamp);
        }
        StreamEvent::Video {
            channel,
            timestamp,
            codec,
            payload,
            ..
        } => {
            out.channel = Some(channel_label(*channel));
            out.timestamp = Some(*timestamp);
            out.codec = Some(codec_label(*codec));
            out.size = Some(payload.len());
        }
        StreamEvent::Control { command } => {
            out.value = Some(value_to_json(command));
        }
        StreamEvent::Ready | StreamEvent::Stop => {}
    }
    out
}

pub fn print_event(uri: &str, event: &StreamEvent, format: OutputFormat) {
    let out = describe(uri, event);
    match format {
        OutputFormat::Json => println!("{}", to_json(&out)),
        OutputFormat::Table => {
            let mut table = table(vec!["EVENT", "CHANNEL", "TIMESTAMP", "DETAIL"]);
            table.add_row(vec![
                out.event.to_string(),
                out.channel.clone().unwrap_or_else(|| "-".to_string()),
                out.timestamp.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
                detail(&out),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = out.event.to_string();
            if let Some(channel) = &out.channel {
                line.push_str(&format!(" channel={channel}"));
            }
            if let Some(timestamp) = out.timestamp {
                line.push_str(&format!(" ts={timestamp}"));
            }
            let detail = detail(&out);
            if detail != "-" {
                line.push(' ');
                line.push_str(&detail);
            }
            println!("{line}");
        }
    }
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    uri: &'a str,
    event: &'static str,
    stream: &'a StreamStatistics,
    connection: &'a Statistics,
}

pub fn print_statistics(
    uri: &str,
    stream: &StreamStatistics,
    connection: &Statistics,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                uri,
                event: "statistics",
                stream,
                connection,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = table(vec!["LATENCY MS", "FPS", "RX B/MS", "TX B/MS", "TX RATIO"]);
            table.add_row(vec![
                format!("{:.1}", stream.latency_ms),
                format!("{:.1}", stream.fps),
                format!("{:.1}", connection.rx_rate),
                format!("{:.1}", connection.tx_rate),
                format!("{:.2}", connection.tx_ratio),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "statistics latency={:.1}ms fps={:.1} rx={:.1}B/ms tx={:.1}B/ms",
                stream.latency_ms, stream.fps, connection.rx_rate, connection.tx_rate
            );
        }
    }
}

/// Render a wire value through serde; binary becomes an array of bytes.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn channel_label(channel: ChannelId) -> String {
    match channel_name(channel) {
        Some(name) => name.to_string(),
        None => channel.to_string(),
    }
}

fn codec_label(codec: CodecId) -> &'static str {
    codec_name(codec).unwrap_or("unknown")
}

fn detail(out: &EventOutput) -> String {
    if let Some(value) = &out.value {
        return value.to_string();
    }
    match (out.codec, out.size) {
        (Some(codec), Some(size)) => format!("codec={codec} size={size}"),
        (None, Some(size)) => format!("size={size}"),
        _ => "-".to_string(),
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
