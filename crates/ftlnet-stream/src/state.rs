//! Demultiplexing state for one stream URI.
//!
//! Everything here is synchronous and lock-free; the multiplexer wraps it
//! in a mutex and publishes the events it produces.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use bytes::Bytes;
use ftlnet_proto::channel::{self, CONTROL, END_FRAME};
use ftlnet_proto::{decode, ChannelId, DataPacket, StreamPacket, Value, FRAME_ALL};
use serde::Serialize;
use tracing::warn;

use crate::event::StreamEvent;

/// Latency and frame rate over the last statistics window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StreamStatistics {
    /// Mean end-to-end latency in milliseconds.
    pub latency_ms: f64,
    /// End-of-frameset markers per second.
    pub fps: f64,
}

#[derive(Debug)]
pub(crate) struct LatencyWindow {
    count: u32,
    sum_ms: f64,
    since: Instant,
    last: StreamStatistics,
}

impl LatencyWindow {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            count: 0,
            sum_ms: 0.0,
            since: now,
            last: StreamStatistics::default(),
        }
    }

    fn record(&mut self, latency_ms: f64) {
        self.sum_ms += latency_ms;
        self.count += 1;
    }

    /// Recompute once enough samples accumulated; otherwise return the
    /// previous values unchanged.
    pub(crate) fn refresh(&mut self, now: Instant, min_samples: u32) -> StreamStatistics {
        if self.count >= min_samples.max(1) {
            let seconds = now.saturating_duration_since(self.since).as_secs_f64();
            self.last = StreamStatistics {
                latency_ms: self.sum_ms / f64::from(self.count),
                fps: if seconds > 0.0 {
                    f64::from(self.count) / seconds
                } else {
                    0.0
                },
            };
            self.since = now;
            self.sum_ms = 0.0;
            self.count = 0;
        }
        self.last
    }
}

#[derive(Debug)]
pub(crate) struct MuxState {
    pub(crate) active: bool,
    pub(crate) paused: bool,
    pub(crate) found: bool,
    frameset: u32,
    frame: u8,
    enabled: BTreeSet<ChannelId>,
    discovered_frames: BTreeSet<(u32, u8)>,
    discovered_channels: BTreeSet<ChannelId>,
    data: HashMap<ChannelId, Value>,
    frameset_data: HashMap<ChannelId, Value>,
    last_timestamp: Option<i64>,
    latency_reference: Option<Instant>,
    pub(crate) latency: LatencyWindow,
}

impl MuxState {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            active: true,
            paused: false,
            found: false,
            frameset: 0,
            frame: 0,
            enabled: BTreeSet::new(),
            discovered_frames: BTreeSet::new(),
            discovered_channels: BTreeSet::new(),
            data: HashMap::new(),
            frameset_data: HashMap::new(),
            last_timestamp: None,
            latency_reference: None,
            latency: LatencyWindow::new(now),
        }
    }

    pub(crate) fn active_frame(&self) -> (u32, u8) {
        (self.frameset, self.frame)
    }

    pub(crate) fn enabled_channels(&self) -> Vec<ChannelId> {
        self.enabled.iter().copied().collect()
    }

    pub(crate) fn discovered_frames(&self) -> Vec<(u32, u8)> {
        self.discovered_frames.iter().copied().collect()
    }

    pub(crate) fn discovered_channels(&self) -> Vec<ChannelId> {
        self.discovered_channels.iter().copied().collect()
    }

    pub(crate) fn data(&self, channel: ChannelId) -> Option<Value> {
        self.data.get(&channel).cloned()
    }

    pub(crate) fn frameset_data(&self, channel: ChannelId) -> Option<Value> {
        self.frameset_data.get(&channel).cloned()
    }

    /// Select the active frame. Per-frame caches are cleared only when the
    /// selection actually changes.
    pub(crate) fn enable_frame(&mut self, frameset: u32, frame: u8) {
        if self.frameset != frameset || self.frame != frame {
            self.enabled.clear();
            self.data.clear();
            self.discovered_channels.clear();
        }
        self.frameset = frameset;
        self.frame = frame;
    }

    pub(crate) fn enable_video(&mut self, frameset: u32, frame: u8, channel: ChannelId) {
        self.enable_frame(frameset, frame);
        self.enabled.insert(channel);
    }

    pub(crate) fn disable_video(&mut self, frameset: u32, frame: u8, channel: ChannelId) {
        if self.active_frame() == (frameset, frame) {
            self.enabled.remove(&channel);
        }
    }

    /// Route one inbound packet, appending the resulting events.
    pub(crate) fn ingest(
        &mut self,
        uri: &str,
        latency_ms: f64,
        peer_latency_ms: f64,
        now: Instant,
        packet: StreamPacket,
        data: DataPacket,
        events: &mut Vec<StreamEvent>,
    ) {
        if !self.active || self.paused {
            return;
        }

        let channel = packet.channel;
        self.discovered_frames.insert((packet.frameset, packet.frame));
        events.push(StreamEvent::Raw {
            packet,
            data: data.clone(),
        });

        if packet.is_request() {
            events.push(StreamEvent::Request { packet });
            return;
        }

        if packet.frameset != self.frameset {
            return;
        }

        if packet.frame == FRAME_ALL && channel::is_metadata(channel) && !data.payload.is_empty() {
            if let Some(value) = decode_payload(uri, channel, &data.payload) {
                self.frameset_data.insert(channel, value.clone());
                events.push(StreamEvent::FramesetData { channel, value });
            }
        }

        if packet.frame != self.frame {
            return;
        }

        if channel == channel::COLOUR {
            self.latency_reference = Some(now);
        }

        if self.last_timestamp != Some(packet.timestamp) {
            if let Some(previous) = self.last_timestamp {
                events.push(StreamEvent::FrameEnd {
                    timestamp: previous,
                });
            }
            self.last_timestamp = Some(packet.timestamp);
            events.push(StreamEvent::FrameStart {
                timestamp: packet.timestamp,
            });
        }

        if channel::is_data(channel) {
            let decoded = if channel::is_metadata(channel) && !data.payload.is_empty() {
                decode_payload(uri, channel, &data.payload)
            } else {
                None
            };
            events.push(StreamEvent::Packet { packet, data });

            if let Some(value) = decoded {
                self.data.insert(channel, value.clone());
                if channel == CONTROL {
                    let command = match &value {
                        Value::Array(items) => items.first().cloned().unwrap_or(Value::Nil),
                        other => other.clone(),
                    };
                    events.push(StreamEvent::Data { channel, value });
                    events.push(StreamEvent::Control { command });
                } else {
                    events.push(StreamEvent::Data { channel, value });
                }
            }
        } else {
            self.discovered_channels.insert(channel);
            if self.enabled.contains(&channel) {
                let video = StreamEvent::Video {
                    channel,
                    timestamp: packet.timestamp,
                    codec: data.codec,
                    frame_count: data.frame_count,
                    payload: data.payload.clone(),
                };
                events.push(StreamEvent::Packet { packet, data });
                events.push(video);
            }
        }

        if channel == END_FRAME {
            let processing_ms = self
                .latency_reference
                .map(|reference| now.saturating_duration_since(reference).as_secs_f64() * 1000.0)
                .unwrap_or(0.0);
            self.latency
                .record(latency_ms + peer_latency_ms + processing_ms);
        }
    }
}

fn decode_payload(uri: &str, channel: ChannelId, payload: &Bytes) -> Option<Value> {
    match decode(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(uri, channel, error = %err, len = payload.len(), "dropping undecodable payload");
            None
        }
    }
}
