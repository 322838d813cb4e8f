use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use ftlnet_proto::{Value, WireMessage};
use tracing::debug;

use crate::connection::Outbound;
use crate::error::Result;

/// Failure of a bound procedure. Sent to the caller as the response error
/// string and never raised locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<E: std::error::Error> From<E> for HandlerError {
    fn from(err: E) -> Self {
        Self(err.to_string())
    }
}

pub type HandlerResult = std::result::Result<Value, HandlerError>;

pub type SyncHandler = Arc<dyn Fn(Vec<Value>) -> HandlerResult + Send + Sync>;
pub type AsyncHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type ProxyHandler = Arc<dyn Fn(Responder, Vec<Value>) + Send + Sync>;

/// A locally implemented procedure.
#[derive(Clone)]
pub(crate) enum Binding {
    /// Runs inline on the connection's reader task.
    Sync(SyncHandler),
    /// Runs on its own task; the response is sent when it completes.
    Async(AsyncHandler),
}

/// Where an inbound procedure name goes.
pub(crate) enum Route {
    Local(Binding),
    Proxy(ProxyHandler),
    Missing,
}

/// Procedure name tables. Bindings take precedence over proxies.
#[derive(Default)]
pub(crate) struct Handlers {
    bindings: HashMap<String, Binding>,
    proxies: HashMap<String, ProxyHandler>,
}

impl Handlers {
    /// Returns true when an earlier binding was replaced.
    pub(crate) fn bind(&mut self, name: String, binding: Binding) -> bool {
        self.bindings.insert(name, binding).is_some()
    }

    pub(crate) fn unbind(&mut self, name: &str) -> bool {
        self.bindings.remove(name).is_some()
    }

    pub(crate) fn proxy(&mut self, name: String, handler: ProxyHandler) -> bool {
        self.proxies.insert(name, handler).is_some()
    }

    pub(crate) fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name) || self.proxies.contains_key(name)
    }

    pub(crate) fn route(&self, name: &str) -> Route {
        if let Some(binding) = self.bindings.get(name) {
            return Route::Local(binding.clone());
        }
        match self.proxies.get(name) {
            Some(proxy) => Route::Proxy(proxy.clone()),
            None => Route::Missing,
        }
    }

    /// Bindings only; proxies never receive notifications.
    pub(crate) fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).cloned()
    }
}

/// Completes one proxied call. Handed to the proxy handler as its first
/// argument; consuming it sends exactly one response.
pub struct Responder {
    call_id: u64,
    outbound: Outbound,
}

impl Responder {
    pub(crate) fn new(call_id: u64, outbound: Outbound) -> Self {
        Self { call_id, outbound }
    }

    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    pub fn respond(self, result: HandlerResult) -> Result<()> {
        let message = match result {
            Ok(value) => WireMessage::ok(self.call_id, value),
            Err(err) => WireMessage::err(self.call_id, err.0),
        };
        debug!(call_id = self.call_id, "sending proxied response");
        self.outbound.send(&message)
    }

    pub fn ok(self, value: Value) -> Result<()> {
        self.respond(Ok(value))
    }

    pub fn err(self, message: impl Into<String>) -> Result<()> {
        self.respond(Err(HandlerError::new(message)))
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("call_id", &self.call_id)
            .finish()
    }
}
