//! Serves a synthetic stream on one side of an in-memory socket pair and
//! follows it with a multiplexer on the other.
//!
//! Run with:
//!   cargo run --example stream-probe --features stream

use std::time::Duration;

use ftlnet::peer::{Connection, DISABLE_STREAM, ENABLE_STREAM};
use ftlnet::proto::channel::{COLOUR, END_FRAME, POSE};
use ftlnet::proto::{codecs, encode, DataPacket, StreamPacket, Value};
use ftlnet::stream::{StreamEvent, StreamMux};
use ftlnet::transport::Socket;

const URI: &str = "ftl://example/camera";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = Socket::pair();
    let node = Connection::new(left, true);
    let viewer = Connection::new(right, false);
    viewer.wait_connected().await?;

    node.bind(ENABLE_STREAM, |_| Ok(Value::Boolean(true)));
    node.bind(DISABLE_STREAM, |_| Ok(Value::Nil));

    let mux = StreamMux::new(viewer.clone(), URI);
    let mut events = mux.subscribe();
    mux.enable_video(0, 0, COLOUR);
    mux.start();
    mux.wait_ready().await?;

    for timestamp in 0..3 {
        let video = DataPacket {
            codec: codecs::H264,
            reserved: 0,
            frame_count: 1,
            bitrate: 255,
            flags: 0,
            payload: vec![0u8; 64].into(),
        };
        let pose = DataPacket::msgpack(encode(&Value::Array(vec![Value::F64(timestamp as f64)]))?);
        for (channel, data) in [(COLOUR, video), (POSE, pose), (END_FRAME, DataPacket::request())] {
            let packet = StreamPacket::new(timestamp, 0, 0, channel, 0);
            node.send(URI, vec![Value::from(2), packet.to_value(), data.to_value()])?;
        }
    }

    let deadline = tokio::time::sleep(Duration::from_millis(200));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event? {
                StreamEvent::Raw { .. } | StreamEvent::Packet { .. } => {}
                event => println!("{event:?}"),
            },
        }
    }

    println!("discovered frames: {:?}", mux.discovered_frames());
    mux.destroy();
    viewer.close().await;
    Ok(())
}
