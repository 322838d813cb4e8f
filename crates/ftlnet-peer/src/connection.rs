use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use ftlnet_proto::{decode_message, encode_message, from_value, to_value, Value, WireMessage};
use ftlnet_transport::{Socket, SocketEvent, SocketReader, SocketWriter};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info, trace, warn};

use crate::error::{PeerError, Result};
use crate::handler::{
    AsyncHandler, Binding, HandlerError, HandlerResult, Handlers, ProxyHandler, Responder, Route,
    SyncHandler,
};
use crate::handshake::{Handshake, HandshakeConfig, PeerId};
use crate::procedures::{is_reserved, HANDSHAKE, PING};
use crate::registry::ConnectionRegistry;
use crate::stats::{Counters, Statistics, StatsWindow};

const EVENT_CAPACITY: usize = 16;

/// Error string answered when a bound procedure panics.
pub(crate) const HANDLER_PANICKED: &str = "handler panicked";

/// Lifecycle of a connection. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Published once per transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Handshake completed and the connection is registered.
    Connected(PeerId),
    /// The connection was torn down.
    Disconnected,
}

/// Configuration for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub handshake: HandshakeConfig,
    /// Registry the connection joins once handshaken.
    pub registry: ConnectionRegistry,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::default(),
            registry: ConnectionRegistry::global().clone(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }

    pub fn with_local_id(mut self, id: PeerId) -> Self {
        self.handshake.local_id = id;
        self
    }

    pub fn with_registry(mut self, registry: ConnectionRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Sending side shared by the connection and proxy responders.
#[derive(Clone)]
pub(crate) struct Outbound {
    writer: SocketWriter,
    counters: Arc<Counters>,
}

impl Outbound {
    pub(crate) fn send(&self, message: &WireMessage) -> Result<()> {
        let payload = encode_message(message)?;
        let len = payload.len() as u64;
        self.counters.add_tx_requested(len);
        let counters = Arc::clone(&self.counters);
        self.writer.send(
            payload,
            Some(Box::new(move |sent| counters.add_tx_bytes(sent as u64))),
        )?;
        Ok(())
    }
}

type Pending = oneshot::Sender<Result<Value>>;

struct Shared {
    peer_id: Option<PeerId>,
    handlers: Handlers,
    pending: HashMap<u64, Pending>,
    stats: StatsWindow,
    latency_ms: f64,
}

struct Inner {
    is_server: bool,
    config: ConnectionConfig,
    outbound: Outbound,
    counters: Arc<Counters>,
    next_call_id: AtomicU64,
    closing: AtomicBool,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    shared: Mutex<Shared>,
}

/// One RPC peer over one socket.
///
/// Cloning is cheap and every clone refers to the same connection. All
/// inbound traffic is processed in arrival order on a single reader task.
/// Synchronous handlers run inline on that task, so they must not block.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wrap a socket using the default configuration.
    ///
    /// The server side announces its identity immediately; the client side
    /// answers once the server's handshake arrives. Must be called from
    /// within a tokio runtime.
    pub fn new(socket: Socket, is_server: bool) -> Self {
        Self::with_config(socket, is_server, ConnectionConfig::default())
    }

    pub fn with_config(socket: Socket, is_server: bool, config: ConnectionConfig) -> Self {
        let (writer, reader) = socket.split();
        let counters = Arc::new(Counters::default());
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let connection = Self {
            inner: Arc::new(Inner {
                is_server,
                config,
                outbound: Outbound {
                    writer,
                    counters: Arc::clone(&counters),
                },
                counters,
                next_call_id: AtomicU64::new(0),
                closing: AtomicBool::new(false),
                state,
                events,
                shared: Mutex::new(Shared {
                    peer_id: None,
                    handlers: Handlers::default(),
                    pending: HashMap::new(),
                    stats: StatsWindow::new(Instant::now()),
                    latency_ms: 0.0,
                }),
            }),
        };

        connection.bind_builtin();
        tokio::spawn(read_loop(Arc::downgrade(&connection.inner), reader));
        if is_server {
            connection.send_handshake();
        }
        connection
    }

    fn bind_builtin(&self) {
        let weak = Arc::downgrade(&self.inner);
        let handshake: SyncHandler = Arc::new(move |args| match weak.upgrade() {
            Some(inner) => Connection { inner }.on_handshake(&args),
            None => Err(HandlerError::new("connection dropped")),
        });
        let ping: SyncHandler = Arc::new(|_| Ok(Value::from(now_millis())));

        let mut shared = self.inner.shared.lock();
        shared.handlers.bind(HANDSHAKE.to_string(), Binding::Sync(handshake));
        shared.handlers.bind(PING.to_string(), Binding::Sync(ping));
    }

    // ---- identity and state ----

    /// Remote identity, known once handshaken.
    pub fn id(&self) -> Option<PeerId> {
        self.inner.shared.lock().peer_id
    }

    /// Remote identity as lower-case hex.
    pub fn id_string(&self) -> Option<String> {
        self.id().map(|id| id.to_hex())
    }

    /// Identity this side announces.
    pub fn local_id(&self) -> PeerId {
        self.inner.config.handshake.local_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_server(&self) -> bool {
        self.inner.is_server
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Last rolled statistics window.
    pub fn statistics(&self) -> Statistics {
        self.inner.shared.lock().stats.last()
    }

    /// One-way latency estimate from the last [`ping`](Self::ping).
    pub fn latency_ms(&self) -> f64 {
        self.inner.shared.lock().latency_ms
    }

    /// Connect and disconnect events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// True when both handles refer to the same connection.
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Resolve once the handshake completed.
    pub async fn wait_connected(&self) -> Result<PeerId> {
        let mut state = self.inner.state.subscribe();
        let reached = *state
            .wait_for(|s| *s != ConnectionState::Connecting)
            .await
            .map_err(|_| PeerError::Disconnected)?;
        match (reached, self.id()) {
            (ConnectionState::Connected, Some(id)) => Ok(id),
            _ => Err(PeerError::Disconnected),
        }
    }

    /// Resolve once the connection is torn down.
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await;
    }

    // ---- handler registry ----

    /// Bind a procedure. A later bind to the same name replaces this one.
    pub fn bind<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert_binding(name.into(), Binding::Sync(Arc::new(handler)));
    }

    /// Bind a procedure whose result is produced asynchronously.
    pub fn bind_async<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: AsyncHandler = Arc::new(move |args| f(args).boxed());
        self.insert_binding(name.into(), Binding::Async(handler));
    }

    /// Bind a procedure with typed arguments and result.
    ///
    /// The positional arguments are deserialized as one tuple, so a single
    /// argument is taken as `(T,)`.
    pub fn bind_typed<A, R, F>(&self, name: impl Into<String>, f: F)
    where
        A: DeserializeOwned,
        R: Serialize,
        F: Fn(A) -> std::result::Result<R, HandlerError> + Send + Sync + 'static,
    {
        self.bind(name, move |args| {
            let args: A = from_value(Value::Array(args))?;
            Ok(to_value(f(args)?)?)
        });
    }

    fn insert_binding(&self, name: String, binding: Binding) {
        if is_reserved(&name) {
            warn!(procedure = %name, "overriding a built-in procedure");
        }
        let replaced = self.inner.shared.lock().handlers.bind(name.clone(), binding);
        if replaced {
            debug!(procedure = %name, "replaced existing binding");
        }
    }

    pub fn unbind(&self, name: &str) -> bool {
        self.inner.shared.lock().handlers.unbind(name)
    }

    /// True if the name is bound or proxied.
    pub fn is_bound(&self, name: &str) -> bool {
        self.inner.shared.lock().handlers.is_bound(name)
    }

    /// Forward calls to `name` to a handler that answers through the
    /// injected [`Responder`], possibly much later.
    pub fn proxy<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Responder, Vec<Value>) + Send + Sync + 'static,
    {
        let handler: ProxyHandler = Arc::new(handler);
        let name = name.into();
        if self.inner.shared.lock().handlers.proxy(name.clone(), handler) {
            debug!(procedure = %name, "replaced existing proxy");
        }
    }

    // ---- outbound ----

    /// Call a remote procedure.
    ///
    /// There is no built-in timeout: the future stays pending until the
    /// response arrives or the connection closes.
    pub async fn rpc(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let (_, response) = self.start_call(name, args)?;
        response.await.unwrap_or(Err(PeerError::Disconnected))
    }

    /// [`rpc`](Self::rpc) with a caller-imposed deadline.
    pub async fn rpc_timeout(
        &self,
        name: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let (id, response) = self.start_call(name, args)?;
        match tokio::time::timeout(timeout, response).await {
            Ok(outcome) => outcome.unwrap_or(Err(PeerError::Disconnected)),
            Err(_) => {
                self.inner.shared.lock().pending.remove(&id);
                Err(PeerError::Timeout(timeout))
            }
        }
    }

    /// [`rpc`](Self::rpc) with serde arguments and result. A tuple argument
    /// is spread positionally.
    pub async fn rpc_typed<A, R>(&self, name: &str, args: A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args = match to_value(args)? {
            Value::Array(items) => items,
            Value::Nil => Vec::new(),
            other => vec![other],
        };
        let result = self.rpc(name, args).await?;
        Ok(from_value(result)?)
    }

    fn start_call(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<(u64, oneshot::Receiver<Result<Value>>)> {
        let id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut shared = self.inner.shared.lock();
            if self.state() == ConnectionState::Disconnected {
                return Err(PeerError::Disconnected);
            }
            shared.pending.insert(id, tx);
        }

        trace!(call_id = id, procedure = name, "sending call");
        let message = WireMessage::Call {
            id,
            name: name.to_string(),
            args,
        };
        if let Err(err) = self.inner.outbound.send(&message) {
            self.inner.shared.lock().pending.remove(&id);
            self.on_send_error(&err);
            return Err(err);
        }
        Ok((id, rx))
    }

    /// Send a notification. No response is expected.
    pub fn send(&self, name: &str, args: Vec<Value>) -> Result<()> {
        trace!(procedure = name, "sending notification");
        let message = WireMessage::Notification {
            name: name.to_string(),
            args,
        };
        self.inner
            .outbound
            .send(&message)
            .inspect_err(|err| self.on_send_error(err))
    }

    /// Measure round-trip time and update the latency estimate.
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.rpc(PING, Vec::new()).await?;
        let rtt = started.elapsed();
        self.inner.shared.lock().latency_ms = rtt.as_secs_f64() * 1000.0 / 2.0;
        Ok(rtt)
    }

    /// Close the socket and wait for teardown. Closing twice is a no-op.
    pub async fn close(&self) {
        if self.state() == ConnectionState::Disconnected {
            return;
        }
        let mut state = self.inner.state.subscribe();
        self.request_close();
        let _ = state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await;
    }

    fn request_close(&self) {
        if !self.inner.closing.swap(true, Ordering::AcqRel) {
            debug!(peer = ?self.id(), "closing connection");
        }
        self.inner.outbound.writer.close();
    }

    fn on_send_error(&self, err: &PeerError) {
        warn!(peer = ?self.id(), error = %err, "send failed");
        if matches!(err, PeerError::Transport(_)) {
            self.request_close();
        }
    }

    fn send_handshake(&self) {
        let args = Handshake::local(&self.inner.config.handshake).to_args();
        if let Err(err) = self.send(HANDSHAKE, args) {
            warn!(error = %err, "failed to send handshake");
        }
    }

    pub(crate) fn roll_statistics(&self, now: Instant, min_window: Duration) -> Option<Statistics> {
        let mut shared = self.inner.shared.lock();
        shared.stats.roll(&self.inner.counters, now, min_window)
    }

    // ---- inbound ----

    fn on_handshake(&self, args: &[Value]) -> HandlerResult {
        let config = &self.inner.config.handshake;
        let handshake = match Handshake::from_args(args).and_then(|h| h.validate(config).map(|()| h))
        {
            Ok(handshake) => handshake,
            Err(err) => {
                warn!(error = %err, "rejecting handshake");
                self.request_close();
                return Err(err.into());
            }
        };

        if self.state() != ConnectionState::Connecting {
            debug!(peer = %handshake.id, "ignoring repeated handshake");
            return Ok(Value::Nil);
        }

        // The reply is queued before `Connected` becomes observable.
        if !self.inner.is_server {
            self.send_handshake();
        }
        self.inner.shared.lock().peer_id = Some(handshake.id);
        self.inner.state.send_replace(ConnectionState::Connected);
        self.inner.config.registry.insert(self.clone());

        info!(
            peer = %handshake.id,
            version = handshake.version,
            server = self.inner.is_server,
            "peer connected"
        );
        let _ = self
            .inner
            .events
            .send(ConnectionEvent::Connected(handshake.id));
        Ok(Value::Nil)
    }

    fn handle_message(&self, payload: Bytes) {
        self.inner.counters.add_rx_bytes(payload.len() as u64);
        if self.inner.closing.load(Ordering::Acquire) {
            return;
        }

        let connecting = self.state() == ConnectionState::Connecting;
        let message = match decode_message(&payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, len = payload.len(), "dropping undecodable message");
                if connecting {
                    self.request_close();
                }
                return;
            }
        };

        if connecting && message.procedure() != Some(HANDSHAKE) {
            warn!(procedure = ?message.procedure(), "message before handshake, closing");
            self.request_close();
            return;
        }

        match message {
            WireMessage::Notification { name, args } => self.dispatch_notification(name, args),
            WireMessage::Call { id, name, args } => self.dispatch_call(id, name, args),
            WireMessage::Response { id, error, result } => {
                self.dispatch_response(id, error, result)
            }
        }
    }

    fn dispatch_notification(&self, name: String, args: Vec<Value>) {
        let binding = self.inner.shared.lock().handlers.binding(&name);
        match binding {
            Some(Binding::Sync(handler)) => {
                if let Err(err) = run_sync(&name, &handler, args) {
                    debug!(procedure = %name, error = %err, "notification handler failed");
                }
            }
            Some(Binding::Async(handler)) => {
                let pending = run_async(&name, &handler, args);
                tokio::spawn(async move {
                    if let Err(err) = pending.await {
                        debug!(procedure = %name, error = %err, "notification handler failed");
                    }
                });
            }
            None => warn!(procedure = %name, "missing handler for notification"),
        }
    }

    fn dispatch_call(&self, id: u64, name: String, args: Vec<Value>) {
        let route = self.inner.shared.lock().handlers.route(&name);
        match route {
            Route::Local(Binding::Sync(handler)) => {
                let result = run_sync(&name, &handler, args);
                self.respond(id, &name, result);
            }
            Route::Local(Binding::Async(handler)) => {
                let pending = run_async(&name, &handler, args);
                let connection = self.clone();
                tokio::spawn(async move {
                    let result = pending.await;
                    connection.respond(id, &name, result);
                });
            }
            Route::Proxy(handler) => {
                trace!(call_id = id, procedure = %name, "proxying call");
                let responder = Responder::new(id, self.inner.outbound.clone());
                if panic::catch_unwind(AssertUnwindSafe(|| handler(responder, args))).is_err() {
                    self.respond(id, &name, panicked(&name));
                }
            }
            Route::Missing => warn!(call_id = id, procedure = %name, "missing handler for call"),
        }
    }

    fn respond(&self, id: u64, name: &str, result: HandlerResult) {
        let message = match result {
            Ok(value) => WireMessage::ok(id, value),
            Err(err) => {
                debug!(call_id = id, procedure = name, error = %err, "handler failed");
                WireMessage::err(id, err.message())
            }
        };
        if let Err(err) = self.inner.outbound.send(&message) {
            self.on_send_error(&err);
        }
    }

    fn dispatch_response(&self, id: u64, error: Option<String>, result: Value) {
        let pending = self.inner.shared.lock().pending.remove(&id);
        match pending {
            Some(tx) => {
                let outcome = match error {
                    Some(message) => Err(PeerError::Remote(message)),
                    None => Ok(result),
                };
                let _ = tx.send(outcome);
            }
            None => warn!(call_id = id, "response for unknown call"),
        }
    }

    fn teardown(&self) {
        let previous = self.inner.state.send_replace(ConnectionState::Disconnected);
        if previous == ConnectionState::Disconnected {
            return;
        }
        self.inner.closing.store(true, Ordering::Release);

        let (pending, peer) = {
            let mut shared = self.inner.shared.lock();
            (std::mem::take(&mut shared.pending), shared.peer_id)
        };
        if !pending.is_empty() {
            debug!(count = pending.len(), "rejecting pending calls");
        }
        // Dropped senders resolve their callers with `Disconnected`.
        drop(pending);

        self.inner.config.registry.remove(self);
        info!(peer = ?peer, "peer disconnected");
        let _ = self.inner.events.send(ConnectionEvent::Disconnected);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.id())
            .field("state", &self.state())
            .field("server", &self.inner.is_server)
            .finish()
    }
}

async fn read_loop(inner: Weak<Inner>, mut reader: SocketReader) {
    while let Some(event) = reader.next_event().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let connection = Connection { inner };
        match event {
            SocketEvent::Message(payload) => connection.handle_message(payload),
            SocketEvent::Closed => {
                connection.teardown();
                return;
            }
            SocketEvent::Error(err) => {
                warn!(peer = ?connection.id(), error = %err, "socket error");
                connection.inner.outbound.writer.close();
                connection.teardown();
                return;
            }
        }
    }
    // Reader ended without a close event.
    if let Some(inner) = inner.upgrade() {
        Connection { inner }.teardown();
    }
}

/// Run a synchronous handler, turning a panic into an error response.
fn run_sync(name: &str, handler: &SyncHandler, args: Vec<Value>) -> HandlerResult {
    panic::catch_unwind(AssertUnwindSafe(|| handler(args))).unwrap_or_else(|_| panicked(name))
}

/// Start an asynchronous handler. A panic while building or polling the
/// future resolves to an error response.
fn run_async(
    name: &str,
    handler: &AsyncHandler,
    args: Vec<Value>,
) -> BoxFuture<'static, HandlerResult> {
    let name = name.to_string();
    match panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
        Ok(pending) => AssertUnwindSafe(pending)
            .catch_unwind()
            .map(move |outcome| outcome.unwrap_or_else(|_| panicked(&name)))
            .boxed(),
        Err(_) => future::ready(panicked(&name)).boxed(),
    }
}

fn panicked(name: &str) -> HandlerResult {
    error!(procedure = %name, "handler panicked");
    Err(HandlerError::new(HANDLER_PANICKED))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use ftlnet_proto::encode;
    use tokio::sync::mpsc;

    use super::*;
    use crate::handshake::HANDSHAKE_MAGIC;
    use crate::registry::RegistryConfig;

    const WAIT: Duration = Duration::from_secs(5);

    async fn within<F: Future>(future: F) -> F::Output {
        tokio::time::timeout(WAIT, future)
            .await
            .expect("operation should finish in time")
    }

    fn config(registry: &ConnectionRegistry) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_local_id(PeerId::random())
            .with_registry(registry.clone())
    }

    async fn connected_pair() -> (Connection, Connection, ConnectionRegistry) {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (left, right) = Socket::pair();
        let server = Connection::with_config(left, true, config(&registry));
        let client = Connection::with_config(right, false, config(&registry));
        within(server.wait_connected()).await.unwrap();
        within(client.wait_connected()).await.unwrap();
        (server, client, registry)
    }

    #[tokio::test]
    async fn handshake_exchanges_identities_once() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (left, right) = Socket::pair();
        let server = Connection::with_config(left, true, config(&registry));
        let client = Connection::with_config(right, false, config(&registry));
        let mut server_events = server.subscribe();
        let mut client_events = client.subscribe();

        let server_sees = within(server.wait_connected()).await.unwrap();
        let client_sees = within(client.wait_connected()).await.unwrap();

        assert_eq!(server_sees, client.local_id());
        assert_eq!(client_sees, server.local_id());
        assert_eq!(server.id(), Some(client.local_id()));
        assert_eq!(client.id_string(), Some(server.local_id().to_hex()));
        assert!(server.is_connected() && client.is_connected());
        assert!(server.is_server() && !client.is_server());

        assert_eq!(
            server_events.try_recv().unwrap(),
            ConnectionEvent::Connected(client.local_id())
        );
        assert_eq!(
            client_events.try_recv().unwrap(),
            ConnectionEvent::Connected(server.local_id())
        );
        assert!(server_events.try_recv().is_err());
        assert!(client_events.try_recv().is_err());

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&client.local_id().to_hex()).is_some());
    }

    #[tokio::test]
    async fn call_resolves_with_handler_result() {
        let (server, client, _registry) = connected_pair().await;
        server.bind_typed("f", |(x,): (i64,)| Ok(x * 2));

        let result = within(client.rpc("f", vec![Value::from(5)])).await.unwrap();
        assert_eq!(result.as_i64(), Some(10));

        let typed: i64 = within(client.rpc_typed("f", (21,))).await.unwrap();
        assert_eq!(typed, 42);
    }

    #[tokio::test]
    async fn notification_gets_no_response() {
        let (server, client, _registry) = connected_pair().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let counter = Arc::clone(&calls);
        server.bind("f", move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = seen_tx.send(args);
            Ok(Value::from(1))
        });

        let (server_tx_before, _, _) = server.inner.counters.peek();
        client.send("f", vec![Value::from(50)]).unwrap();

        let args = within(seen_rx.recv()).await.unwrap();
        assert_eq!(args, vec![Value::from(50)]);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (server_tx_after, _, _) = server.inner.counters.peek();
        assert_eq!(server_tx_after, server_tx_before);
    }

    #[tokio::test]
    async fn unknown_procedure_is_not_fatal() {
        let (server, client, _registry) = connected_pair().await;

        let err = client
            .rpc_timeout("nope", Vec::new(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
        assert!(client.inner.shared.lock().pending.is_empty());
        assert!(server.is_connected() && client.is_connected());

        server.bind("after", |_| Ok(Value::from("still here")));
        let result = within(client.rpc("after", Vec::new())).await.unwrap();
        assert_eq!(result.as_str(), Some("still here"));
    }

    #[tokio::test]
    async fn proxy_responds_through_injected_responder() {
        let (server, client, _registry) = connected_pair().await;
        server.proxy("relay", |responder, args| {
            let value = args.into_iter().next().unwrap_or(Value::Nil);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                responder.ok(value).unwrap();
            });
        });
        assert!(server.is_bound("relay"));

        let result = within(client.rpc("relay", vec![Value::from("V")])).await.unwrap();
        assert_eq!(result.as_str(), Some("V"));
    }

    #[tokio::test]
    async fn proxy_relays_to_third_party() {
        let (front, client, _registry) = connected_pair().await;
        let (backend, relay, _backend_registry) = connected_pair().await;
        backend.bind_typed("sum", |(a, b): (i64, i64)| Ok(a + b));

        front.proxy("sum", move |responder, args| {
            let relay = relay.clone();
            tokio::spawn(async move {
                let outcome = relay
                    .rpc("sum", args)
                    .await
                    .map_err(|err| HandlerError::new(err.to_string()));
                let _ = responder.respond(outcome);
            });
        });

        let result: i64 = within(client.rpc_typed("sum", (2, 3))).await.unwrap();
        assert_eq!(result, 5);
    }

    #[tokio::test]
    async fn handler_error_reaches_caller_only() {
        let (server, client, _registry) = connected_pair().await;
        server.bind("fail", |_| Err(HandlerError::new("boom")));

        let err = within(client.rpc("fail", Vec::new())).await.unwrap_err();
        assert!(matches!(err, PeerError::Remote(ref msg) if msg == "boom"));
        assert!(server.is_connected() && client.is_connected());
    }

    #[tokio::test]
    async fn async_handlers_may_complete_out_of_order() {
        let (server, client, _registry) = connected_pair().await;
        server.bind_async("slow", |_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Value::from("slow"))
        });
        server.bind("fast", |_| Ok(Value::from("fast")));

        let slow = tokio::spawn({
            let client = client.clone();
            async move { client.rpc("slow", Vec::new()).await }
        });
        tokio::task::yield_now().await;
        let fast = within(client.rpc("fast", Vec::new())).await.unwrap();
        assert_eq!(fast.as_str(), Some("fast"));
        assert!(!slow.is_finished());

        let slow = within(slow).await.unwrap().unwrap();
        assert_eq!(slow.as_str(), Some("slow"));
    }

    #[tokio::test]
    async fn bad_magic_closes_connection() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (left, right) = Socket::pair();
        let mut wrong = config(&registry);
        wrong.handshake.magic = HANDSHAKE_MAGIC ^ 1;
        let server = Connection::with_config(left, true, wrong);
        let client = Connection::with_config(right, false, config(&registry));

        assert!(matches!(
            within(client.wait_connected()).await,
            Err(PeerError::Disconnected)
        ));
        within(server.closed()).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.id().is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn traffic_before_handshake_closes_connection() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let (left, right) = Socket::pair();
        let server = Connection::with_config(left, true, config(&registry));
        let (raw, _raw_reader) = right.split();

        let payload = encode_message(&WireMessage::Notification {
            name: "f".to_string(),
            args: Vec::new(),
        })
        .unwrap();
        raw.send(payload, None).unwrap();

        within(server.closed()).await;
        assert!(server.id().is_none());
    }

    #[tokio::test]
    async fn garbage_after_handshake_is_dropped() {
        let (server, client, _registry) = connected_pair().await;
        server
            .inner
            .outbound
            .writer
            .send(encode(&Value::from("not a message")).unwrap(), None)
            .unwrap();

        server.bind("ok", |_| Ok(Value::Boolean(true)));
        let result = within(client.rpc("ok", Vec::new())).await.unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[tokio::test]
    async fn close_rejects_pending_and_is_idempotent() {
        let (server, client, registry) = connected_pair().await;
        let mut events = server.subscribe();

        let hanging = tokio::spawn({
            let client = client.clone();
            async move { client.rpc("unbound", Vec::new()).await }
        });
        tokio::task::yield_now().await;

        within(client.close()).await;
        within(client.close()).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let outcome = within(hanging).await.unwrap();
        assert!(matches!(outcome, Err(PeerError::Disconnected)));

        within(server.closed()).await;
        assert_eq!(within(events.recv()).await.unwrap(), ConnectionEvent::Disconnected);
        assert!(registry.is_empty());
        assert!(matches!(
            client.rpc("f", Vec::new()).await,
            Err(PeerError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn send_statistics_balance_after_roll() {
        let (server, client, _registry) = connected_pair().await;
        server.bind("echo", |args| Ok(Value::Array(args)));
        within(client.rpc("echo", vec![Value::Binary(vec![0; 512])]))
            .await
            .unwrap();

        let stats = client
            .roll_statistics(Instant::now() + Duration::from_secs(1), Duration::ZERO)
            .unwrap();
        assert!(stats.tx_bytes > 512);
        assert_eq!(stats.tx_ratio, 1.0);
        assert!(stats.rx_bytes > 512);
        assert_eq!(client.statistics(), stats);
    }

    #[tokio::test]
    async fn ping_updates_latency() {
        let (_server, client, _registry) = connected_pair().await;
        let rtt = within(client.ping()).await.unwrap();
        let latency = client.latency_ms();
        assert!(latency >= 0.0);
        assert!(latency <= rtt.as_secs_f64() * 1000.0);
        assert!(client.is_bound(PING) && client.is_bound(HANDSHAKE));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn call_right_after_connect_reaches_connected_server() {
        for _ in 0..200 {
            let registry = ConnectionRegistry::new(RegistryConfig::default());
            let (left, right) = Socket::pair();
            let server = Connection::with_config(left, true, config(&registry));
            server.bind("f", |_| Ok(Value::from(1)));
            let client = Connection::with_config(right, false, config(&registry));

            within(client.wait_connected()).await.unwrap();
            let result = within(client.rpc_timeout("f", Vec::new(), Duration::from_secs(2)))
                .await
                .unwrap();
            assert_eq!(result, Value::from(1));
            assert!(server.is_connected());

            client.close().await;
            within(server.closed()).await;
        }
    }

    #[tokio::test]
    async fn panicking_handlers_answer_with_error() {
        let (server, client, registry) = connected_pair().await;
        server.bind("boom", |_| panic!("sync handler bug"));
        server.bind_async("boom_later", |args| async move {
            if args.is_empty() {
                panic!("async handler bug");
            }
            Ok(Value::Nil)
        });
        server.bind("ok", |_| Ok(Value::from("still here")));

        let err = within(client.rpc("boom", Vec::new())).await.unwrap_err();
        assert!(matches!(err, PeerError::Remote(ref msg) if msg == HANDLER_PANICKED));
        let err = within(client.rpc("boom_later", Vec::new())).await.unwrap_err();
        assert!(matches!(err, PeerError::Remote(ref msg) if msg == HANDLER_PANICKED));
        client.send("boom", Vec::new()).unwrap();
        client.send("boom_later", Vec::new()).unwrap();

        let result = within(client.rpc("ok", Vec::new())).await.unwrap();
        assert_eq!(result, Value::from("still here"));
        assert!(server.is_connected() && client.is_connected());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn panicking_proxy_answers_with_error() {
        let (server, client, _registry) = connected_pair().await;
        server.proxy("relay", |_responder, _args| panic!("proxy bug"));

        let err = within(client.rpc("relay", Vec::new())).await.unwrap_err();
        assert!(matches!(err, PeerError::Remote(ref msg) if msg == HANDLER_PANICKED));
        assert!(server.is_connected());
    }

    #[tokio::test]
    async fn built_in_ping_can_be_overridden() {
        let (server, client, _registry) = connected_pair().await;
        assert!(is_reserved(PING));
        server.bind(PING, |_| Ok(Value::from(7)));

        let answer = within(client.rpc(PING, Vec::new())).await.unwrap();
        assert_eq!(answer, Value::from(7));
    }
}
