use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use ftlnet_peer::{Connection, HandlerError, PeerError, DISABLE_STREAM, ENABLE_STREAM};
use ftlnet_proto::channel::CALIBRATION;
use ftlnet_proto::packet::{FLAG_KEYFRAME, FLAG_REQUEST};
use ftlnet_proto::{encode, ChannelId, DataPacket, StreamPacket, Value, FRAME_ALL};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::event::StreamEvent;
use crate::state::{MuxState, StreamStatistics};

// Timestamp carried by locally generated request and value packets.
const LOCAL_TIMESTAMP: i64 = 1;

struct Tasks {
    start: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

struct MuxInner {
    uri: String,
    connection: Connection,
    config: StreamConfig,
    events: broadcast::Sender<StreamEvent>,
    state: Mutex<MuxState>,
    tasks: Mutex<Tasks>,
}

/// Demultiplexes the packets of one stream URI on a [`Connection`].
///
/// The multiplexer binds the URI as a procedure on the connection; every
/// inbound `(latency, StreamPacket, DataPacket)` for it is routed by
/// frameset, frame and channel and published as [`StreamEvent`]s.
pub struct StreamMux {
    inner: Arc<MuxInner>,
}

impl StreamMux {
    /// Bind `uri` on the connection. Must be called from within a tokio
    /// runtime.
    pub fn new(connection: Connection, uri: impl Into<String>) -> Self {
        Self::with_config(connection, uri, StreamConfig::default())
    }

    pub fn with_config(connection: Connection, uri: impl Into<String>, config: StreamConfig) -> Self {
        let uri = uri.into();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let inner = Arc::new(MuxInner {
            uri: uri.clone(),
            connection: connection.clone(),
            config,
            events,
            state: Mutex::new(MuxState::new(Instant::now())),
            tasks: Mutex::new(Tasks {
                start: None,
                watcher: None,
            }),
        });

        if connection.is_bound(&uri) {
            warn!(uri = %uri, "replacing existing binding for stream uri");
        }
        let weak = Arc::downgrade(&inner);
        connection.bind(uri.clone(), move |args| match weak.upgrade() {
            Some(inner) => inner.on_packet(args),
            None => Err(HandlerError::new("stream released")),
        });

        let weak = Arc::downgrade(&inner);
        let watched = connection.clone();
        let watcher = tokio::spawn(async move {
            watched.closed().await;
            if let Some(inner) = weak.upgrade() {
                debug!(uri = %inner.uri, "connection closed, stopping stream");
                inner.state.lock().found = false;
                inner.stop();
            }
        });
        inner.tasks.lock().watcher = Some(watcher);

        debug!(uri = %uri, "stream bound");
        Self { inner }
    }

    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Subscribe to events. Subscribers that fall behind by more than the
    /// configured capacity observe a lag error and skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    /// Ask the remote to enable the stream, retrying until it accepts or the
    /// multiplexer stops. Once accepted, heartbeat requests keep enabled
    /// channels flowing.
    pub fn start(&self) {
        let found = {
            let mut state = self.inner.state.lock();
            state.active = true;
            state.found
        };
        if found {
            self.inner.emit(StreamEvent::Ready);
        }

        let task = tokio::spawn(run(Arc::downgrade(&self.inner), found));
        if let Some(previous) = self.inner.tasks.lock().start.replace(task) {
            previous.abort();
        }
    }

    /// Stop processing. Only a stream the remote accepted is disabled
    /// remotely and unbound. Always emits [`StreamEvent::Stop`].
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stop and release the multiplexer. Subscribers observe the end of the
    /// event stream once every handle is gone.
    pub fn destroy(self) {
        self.inner.stop();
    }

    /// Resolve once the remote accepted the stream.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut events = self.subscribe();
        {
            let state = self.inner.state.lock();
            if state.found {
                return Ok(());
            }
            if !state.active {
                return Err(StreamError::Stopped);
            }
        }
        loop {
            match events.recv().await {
                Ok(StreamEvent::Ready) => return Ok(()),
                Ok(StreamEvent::Stop) | Err(broadcast::error::RecvError::Closed) => {
                    return Err(StreamError::Stopped)
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
    }

    /// Select the active frameset and frame.
    pub fn enable_frame(&self, frameset: u32, frame: u8) {
        self.inner.state.lock().enable_frame(frameset, frame);
    }

    /// Select a frame and start delivering one of its video channels.
    pub fn enable_video(&self, frameset: u32, frame: u8, channel: ChannelId) {
        self.inner
            .state
            .lock()
            .enable_video(frameset, frame, channel);
    }

    pub fn disable_video(&self, frameset: u32, frame: u8, channel: ChannelId) {
        self.inner
            .state
            .lock()
            .disable_video(frameset, frame, channel);
    }

    pub fn set_paused(&self, paused: bool) {
        self.inner.state.lock().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// True once the remote accepted the stream.
    pub fn is_found(&self) -> bool {
        self.inner.state.lock().found
    }

    pub fn active_frame(&self) -> (u32, u8) {
        self.inner.state.lock().active_frame()
    }

    pub fn enabled_channels(&self) -> Vec<ChannelId> {
        self.inner.state.lock().enabled_channels()
    }

    /// Every `(frameset, frame)` seen in traffic.
    pub fn discovered_frames(&self) -> Vec<(u32, u8)> {
        self.inner.state.lock().discovered_frames()
    }

    /// Channels seen on the active frame.
    pub fn discovered_channels(&self) -> Vec<ChannelId> {
        self.inner.state.lock().discovered_channels()
    }

    /// Last decoded value of a metadata channel on the active frame.
    pub fn data(&self, channel: ChannelId) -> Option<Value> {
        self.inner.state.lock().data(channel)
    }

    /// Last decoded frameset-level value of a metadata channel.
    pub fn frameset_data(&self, channel: ChannelId) -> Option<Value> {
        self.inner.state.lock().frameset_data(channel)
    }

    /// `(width, height)` from the active frame's calibration.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        let calibration = self.data(CALIBRATION)?;
        let intrinsics = calibration.as_array()?.first()?.as_array()?;
        let width = intrinsics.get(4).and_then(dimension)?;
        let height = intrinsics.get(5).and_then(dimension)?;
        Some((width, height))
    }

    /// Latency and fps, recomputed once enough end-of-frameset samples
    /// accumulated.
    pub fn statistics(&self) -> StreamStatistics {
        let min_samples = self.inner.config.stats_min_samples;
        self.inner
            .state
            .lock()
            .latency
            .refresh(Instant::now(), min_samples)
    }

    /// Send one packet pair to the remote for this URI.
    pub fn post(&self, packet: StreamPacket, data: DataPacket) -> Result<()> {
        self.inner.post(packet, data)
    }

    /// Send a value on a channel of the active frame.
    pub fn set(&self, channel: ChannelId, value: &Value) -> Result<()> {
        let (frameset, frame) = self.active_frame();
        let payload = encode(value)?;
        self.post(
            StreamPacket::new(LOCAL_TIMESTAMP, frameset, frame, channel, 0),
            DataPacket::msgpack(payload),
        )
    }

    /// Ask for a fresh keyframe on every enabled channel.
    pub fn keyframe(&self) -> Result<()> {
        self.inner.request_enabled(FLAG_REQUEST | FLAG_KEYFRAME)
    }
}

impl Drop for StreamMux {
    fn drop(&mut self) {
        if self.inner.state.lock().active {
            self.inner.stop();
        }
        let mut tasks = self.inner.tasks.lock();
        if let Some(watcher) = tasks.watcher.take() {
            watcher.abort();
        }
    }
}

impl fmt::Debug for StreamMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("StreamMux")
            .field("uri", &self.inner.uri)
            .field("active", &state.active)
            .field("found", &state.found)
            .field("frame", &state.active_frame())
            .finish()
    }
}

impl MuxInner {
    fn emit(&self, event: StreamEvent) {
        let _ = self.events.send(event);
    }

    fn on_packet(&self, args: Vec<Value>) -> std::result::Result<Value, HandlerError> {
        let [latency, packet, data] = args.as_slice() else {
            warn!(uri = %self.uri, count = args.len(), "stream packet with wrong argument count");
            return Err(HandlerError::new(format!(
                "expected 3 arguments, got {}",
                args.len()
            )));
        };
        let latency = number(latency).unwrap_or(0.0);
        let packet = StreamPacket::from_value(packet)?;
        let data = DataPacket::from_value(data)?;
        trace!(
            uri = %self.uri,
            frameset = packet.frameset,
            frame = packet.frame,
            channel = packet.channel,
            "stream packet"
        );

        let peer_latency = self.connection.latency_ms();
        let mut events = Vec::new();
        self.state.lock().ingest(
            &self.uri,
            latency,
            peer_latency,
            Instant::now(),
            packet,
            data,
            &mut events,
        );
        for event in events {
            self.emit(event);
        }
        Ok(Value::Nil)
    }

    fn post(&self, packet: StreamPacket, data: DataPacket) -> Result<()> {
        self.connection.send(
            &self.uri,
            vec![Value::from(0), packet.to_value(), data.to_value()],
        )?;
        Ok(())
    }

    /// Post a zero-payload request for every enabled channel.
    fn request_enabled(&self, flags: u8) -> Result<()> {
        let (frameset, channels) = {
            let state = self.state.lock();
            (state.active_frame().0, state.enabled_channels())
        };
        for channel in channels {
            self.post(
                StreamPacket::new(LOCAL_TIMESTAMP, frameset, FRAME_ALL, channel, flags),
                DataPacket::request(),
            )?;
        }
        Ok(())
    }

    fn stop(&self) {
        let found = {
            let mut state = self.state.lock();
            state.active = false;
            state.found
        };
        if let Some(task) = self.tasks.lock().start.take() {
            task.abort();
        }

        if found {
            let connection = self.connection.clone();
            let uri = self.uri.clone();
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(err) = connection.rpc(DISABLE_STREAM, vec![Value::from(uri.as_str())]).await {
                        debug!(uri = %uri, error = %err, "disable_stream failed");
                    }
                });
            }
            self.connection.unbind(&self.uri);
            self.state.lock().found = false;
        }

        info!(uri = %self.uri, "stream stopped");
        self.emit(StreamEvent::Stop);
    }
}

/// Enable loop followed by the heartbeat loop. Holds only a weak reference
/// across awaits so a dropped multiplexer ends the task.
async fn run(mux: Weak<MuxInner>, already_found: bool) {
    let Some((connection, uri, config)) = mux
        .upgrade()
        .map(|inner| (inner.connection.clone(), inner.uri.clone(), inner.config.clone()))
    else {
        return;
    };

    if !already_found {
        loop {
            let accepted = match connection
                .rpc(ENABLE_STREAM, vec![Value::from(uri.as_str()), Value::Boolean(true)])
                .await
            {
                Ok(result) => is_truthy(&result),
                Err(PeerError::Disconnected) => return,
                Err(err) => {
                    debug!(uri = %uri, error = %err, "enable_stream failed");
                    false
                }
            };

            let Some(inner) = mux.upgrade() else {
                return;
            };
            if accepted {
                let still_active = {
                    let mut state = inner.state.lock();
                    if state.active {
                        state.found = true;
                    }
                    state.active
                };
                if !still_active {
                    return;
                }
                info!(uri = %uri, "stream connected");
                inner.emit(StreamEvent::Ready);
                break;
            }

            warn!(uri = %uri, "stream not found, retrying");
            if !inner.state.lock().active {
                return;
            }
            drop(inner);
            tokio::time::sleep(config.retry_interval).await;
        }
    }

    let period = config.heartbeat_interval.max(std::time::Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        heartbeat.tick().await;
        let Some(inner) = mux.upgrade() else {
            return;
        };
        let live = {
            let state = inner.state.lock();
            state.active && state.found
        };
        if !live {
            return;
        }
        if let Err(err) = inner.request_enabled(FLAG_REQUEST) {
            debug!(uri = %uri, error = %err, "heartbeat failed");
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,
        Value::Boolean(flag) => *flag,
        Value::Integer(n) => n.as_i64() != Some(0),
        Value::F32(n) => *n != 0.0,
        Value::F64(n) => *n != 0.0,
        Value::String(text) => !text.as_bytes().is_empty(),
        _ => true,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => n.as_f64(),
        Value::F32(n) => Some(f64::from(*n)),
        Value::F64(n) => Some(*n),
        _ => None,
    }
}

fn dimension(value: &Value) -> Option<u32> {
    match value {
        Value::Integer(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::F32(n) if *n >= 0.0 => Some(*n as u32),
        Value::F64(n) if *n >= 0.0 => Some(*n as u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ftlnet_peer::{ConnectionConfig, ConnectionRegistry, PeerId, RegistryConfig};
    use ftlnet_proto::channel::{COLOUR, END_FRAME, POSE};
    use ftlnet_proto::codecs;
    use ftlnet_transport::Socket;
    use tokio::sync::mpsc;

    use super::*;

    const URI: &str = "ftl://ftlab.utu.fi/test";
    const WAIT: Duration = Duration::from_secs(5);

    async fn within<F: Future>(future: F) -> F::Output {
        tokio::time::timeout(WAIT, future)
            .await
            .expect("operation should finish in time")
    }

    fn fast() -> StreamConfig {
        StreamConfig::default()
            .with_retry_interval(Duration::from_millis(10))
            .with_heartbeat_interval(Duration::from_millis(10))
    }

    /// Returns (remote, local); the multiplexer goes on `local`.
    async fn connected_pair() -> (Connection, Connection) {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let config = || {
            ConnectionConfig::default()
                .with_local_id(PeerId::random())
                .with_registry(registry.clone())
        };
        let (left, right) = Socket::pair();
        let remote = Connection::with_config(left, true, config());
        let local = Connection::with_config(right, false, config());
        within(remote.wait_connected()).await.unwrap();
        within(local.wait_connected()).await.unwrap();
        (remote, local)
    }

    fn accept_streams(remote: &Connection) {
        remote.bind(ENABLE_STREAM, |_| Ok(Value::Boolean(true)));
        remote.bind(DISABLE_STREAM, |_| Ok(Value::Nil));
    }

    fn packet_args(packet: StreamPacket, data: DataPacket) -> Vec<Value> {
        vec![Value::from(0), packet.to_value(), data.to_value()]
    }

    async fn next_event(
        events: &mut broadcast::Receiver<StreamEvent>,
        kind: &str,
    ) -> StreamEvent {
        within(async {
            loop {
                let event = events.recv().await.unwrap();
                if event.kind() == kind {
                    return event;
                }
            }
        })
        .await
    }

    fn capture_posts(remote: &Connection) -> mpsc::UnboundedReceiver<(StreamPacket, DataPacket)> {
        let (tx, rx) = mpsc::unbounded_channel();
        remote.bind(URI, move |args| {
            let packet = StreamPacket::from_value(&args[1])?;
            let data = DataPacket::from_value(&args[2])?;
            let _ = tx.send((packet, data));
            Ok(Value::Nil)
        });
        rx
    }

    #[tokio::test]
    async fn start_retries_until_remote_accepts() {
        let (remote, local) = connected_pair().await;
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        remote.bind(ENABLE_STREAM, move |args| {
            assert_eq!(args, vec![Value::from(URI), Value::Boolean(true)]);
            Ok(Value::Boolean(counter.fetch_add(1, Ordering::SeqCst) >= 2))
        });

        let mux = StreamMux::with_config(local, URI, fast());
        let mut events = mux.subscribe();
        mux.start();

        next_event(&mut events, "ready").await;
        assert!(mux.is_found());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        within(mux.wait_ready()).await.unwrap();
    }

    #[tokio::test]
    async fn heartbeat_requests_enabled_channels() {
        let (remote, local) = connected_pair().await;
        accept_streams(&remote);
        let mut posts = capture_posts(&remote);

        let mux = StreamMux::with_config(local, URI, fast());
        mux.enable_video(3, 0, COLOUR);
        mux.start();
        within(mux.wait_ready()).await.unwrap();

        let (packet, data) = within(posts.recv()).await.unwrap();
        assert_eq!(packet.frameset, 3);
        assert_eq!(packet.frame, FRAME_ALL);
        assert_eq!(packet.channel, COLOUR);
        assert_eq!(packet.flags, FLAG_REQUEST);
        assert_eq!(data, DataPacket::request());

        mux.keyframe().unwrap();
        let keyframe = within(async {
            loop {
                let (packet, _) = posts.recv().await.unwrap();
                if packet.flags != FLAG_REQUEST {
                    return packet;
                }
            }
        })
        .await;
        assert_eq!(keyframe.flags, 5);
    }

    #[tokio::test]
    async fn inbound_packets_are_routed() {
        let (remote, local) = connected_pair().await;
        let mux = StreamMux::new(local, URI);
        let mut events = mux.subscribe();
        mux.enable_frame(0, 1);

        let video = DataPacket {
            codec: codecs::H264,
            reserved: 0,
            frame_count: 1,
            bitrate: 255,
            flags: 0,
            payload: bytes::Bytes::from_static(b"nal"),
        };
        remote
            .send(URI, packet_args(StreamPacket::new(10, 0, 1, COLOUR, 0), video.clone()))
            .unwrap();
        remote
            .send(
                URI,
                packet_args(
                    StreamPacket::new(10, 0, 1, POSE, 0),
                    DataPacket::msgpack(encode(&Value::from("pose")).unwrap()),
                ),
            )
            .unwrap();

        match next_event(&mut events, "data").await {
            StreamEvent::Data { channel, value } => {
                assert_eq!(channel, POSE);
                assert_eq!(value, Value::from("pose"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(mux.discovered_channels(), vec![COLOUR]);
        assert_eq!(mux.data(POSE), Some(Value::from("pose")));

        mux.enable_video(0, 1, COLOUR);
        remote
            .send(URI, packet_args(StreamPacket::new(11, 0, 1, COLOUR, 0), video))
            .unwrap();
        match next_event(&mut events, "video").await {
            StreamEvent::Video { channel, payload, .. } => {
                assert_eq!(channel, COLOUR);
                assert_eq!(payload.as_ref(), b"nal");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_posts_msgpack_value_on_active_frame() {
        let (remote, local) = connected_pair().await;
        let mut posts = capture_posts(&remote);
        let mux = StreamMux::new(local, URI);
        mux.enable_frame(2, 4);

        mux.set(POSE, &Value::Array(vec![Value::from(1.5)])).unwrap();
        let (packet, data) = within(posts.recv()).await.unwrap();
        assert_eq!((packet.frameset, packet.frame, packet.channel), (2, 4, POSE));
        assert_eq!(data.codec, codecs::MSGPACK);
        assert_eq!(
            ftlnet_proto::decode(&data.payload).unwrap(),
            Value::Array(vec![Value::from(1.5)])
        );
    }

    #[tokio::test]
    async fn stop_disables_and_unbinds_found_stream() {
        let (remote, local) = connected_pair().await;
        remote.bind(ENABLE_STREAM, |_| Ok(Value::Boolean(true)));
        let (disabled_tx, mut disabled_rx) = mpsc::unbounded_channel();
        remote.bind(DISABLE_STREAM, move |args| {
            let _ = disabled_tx.send(args);
            Ok(Value::Nil)
        });

        let mux = StreamMux::with_config(local.clone(), URI, fast());
        let mut events = mux.subscribe();
        mux.start();
        within(mux.wait_ready()).await.unwrap();
        assert!(local.is_bound(URI));

        mux.stop();
        next_event(&mut events, "stop").await;
        assert!(!mux.is_active());
        assert!(!mux.is_found());
        assert!(!local.is_bound(URI));
        assert_eq!(
            within(disabled_rx.recv()).await.unwrap(),
            vec![Value::from(URI)]
        );
        assert!(matches!(mux.wait_ready().await, Err(StreamError::Stopped)));
    }

    #[tokio::test]
    async fn stop_before_found_keeps_binding() {
        let (remote, local) = connected_pair().await;
        remote.bind(ENABLE_STREAM, |_| Ok(Value::Boolean(false)));

        let mux = StreamMux::with_config(local.clone(), URI, fast());
        let mut events = mux.subscribe();
        mux.start();
        tokio::time::sleep(Duration::from_millis(30)).await;
        mux.stop();

        next_event(&mut events, "stop").await;
        assert!(!mux.is_found());
        assert!(local.is_bound(URI));
    }

    #[tokio::test]
    async fn disconnect_stops_stream() {
        let (remote, local) = connected_pair().await;
        accept_streams(&remote);
        let mux = StreamMux::with_config(local, URI, fast());
        let mut events = mux.subscribe();
        mux.start();
        within(mux.wait_ready()).await.unwrap();

        remote.close().await;
        next_event(&mut events, "stop").await;
        assert!(!mux.is_active());
        assert!(!mux.is_found());
    }

    #[tokio::test]
    async fn destroy_ends_event_stream() {
        let (_remote, local) = connected_pair().await;
        let mux = StreamMux::new(local, URI);
        let mut events = mux.subscribe();

        mux.destroy();
        assert_eq!(within(events.recv()).await.unwrap(), StreamEvent::Stop);
        assert!(matches!(
            within(events.recv()).await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn statistics_after_enough_end_of_frameset_markers() {
        let (remote, local) = connected_pair().await;
        let mux = StreamMux::with_config(local, URI, StreamConfig::default().with_stats_min_samples(3));
        let mut events = mux.subscribe();

        for ts in 0..3 {
            remote
                .send(
                    URI,
                    vec![
                        Value::from(4),
                        StreamPacket::new(ts, 0, 0, END_FRAME, 0).to_value(),
                        DataPacket::msgpack(bytes::Bytes::new()).to_value(),
                    ],
                )
                .unwrap();
        }
        for _ in 0..3 {
            next_event(&mut events, "packet").await;
        }

        let stats = mux.statistics();
        assert!(stats.latency_ms >= 4.0);
        assert!(stats.fps > 0.0);
    }

    #[tokio::test]
    async fn frame_size_from_calibration() {
        let (remote, local) = connected_pair().await;
        let mux = StreamMux::new(local, URI);
        let mut events = mux.subscribe();
        assert_eq!(mux.frame_size(), None);

        let intrinsics = Value::Array(vec![
            Value::F64(700.0),
            Value::F64(700.0),
            Value::F64(-640.0),
            Value::F64(-360.0),
            Value::from(1280),
            Value::from(720),
        ]);
        let calibration = Value::Array(vec![intrinsics, Value::from(0)]);
        remote
            .send(
                URI,
                packet_args(
                    StreamPacket::new(1, 0, 0, CALIBRATION, 0),
                    DataPacket::msgpack(encode(&calibration).unwrap()),
                ),
            )
            .unwrap();
        next_event(&mut events, "data").await;

        assert_eq!(mux.frame_size(), Some((1280, 720)));
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&Value::Boolean(true)));
        assert!(is_truthy(&Value::from(1)));
        assert!(is_truthy(&Value::from("ok")));
        assert!(!is_truthy(&Value::Nil));
        assert!(!is_truthy(&Value::Boolean(false)));
        assert!(!is_truthy(&Value::from(0)));
        assert!(!is_truthy(&Value::from("")));
    }
}
