use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::connection::Connection;

/// Timing for the shared statistics refresh.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How often every registered connection rolls its statistics.
    pub stats_interval: Duration,
    /// Windows shorter than this are folded into the next roll.
    pub min_stats_window: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            min_stats_window: Duration::from_millis(100),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<String, Connection>,
    ticker: Option<JoinHandle<()>>,
}

struct RegistryInner {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
}

/// Handshaken connections keyed by peer id hex.
///
/// One background ticker refreshes statistics while the registry is
/// non-empty. It starts on the first insert and is cancelled when the last
/// connection leaves.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                config,
                state: Mutex::new(RegistryState::default()),
            }),
        }
    }

    /// The process-wide registry used by default.
    pub fn global() -> &'static ConnectionRegistry {
        static GLOBAL: OnceLock<ConnectionRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| ConnectionRegistry::new(RegistryConfig::default()))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    pub fn get(&self, id: &str) -> Option<Connection> {
        self.inner.state.lock().connections.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().connections.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.state.lock().connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// True while the statistics ticker is running.
    pub fn is_ticking(&self) -> bool {
        self.inner.state.lock().ticker.is_some()
    }

    /// Roll statistics on every registered connection now.
    pub fn refresh_statistics(&self) {
        let connections: Vec<Connection> =
            self.inner.state.lock().connections.values().cloned().collect();
        let now = Instant::now();
        for connection in connections {
            if let Some(stats) = connection.roll_statistics(now, self.inner.config.min_stats_window) {
                trace!(peer = ?connection.id(), rx_rate = stats.rx_rate, tx_rate = stats.tx_rate, "rolled statistics");
            }
        }
    }

    /// Must be called from within a tokio runtime.
    pub(crate) fn insert(&self, connection: Connection) {
        let Some(id) = connection.id_string() else {
            return;
        };

        let replaced = {
            let mut state = self.inner.state.lock();
            let replaced = state.connections.insert(id.clone(), connection);
            if state.ticker.is_none() {
                state.ticker = Some(self.spawn_ticker());
                debug!("statistics ticker started");
            }
            replaced
        };

        if replaced.is_some() {
            warn!(peer = %id, "replaced registered connection with the same peer id");
        }
    }

    pub(crate) fn remove(&self, connection: &Connection) {
        let Some(id) = connection.id_string() else {
            return;
        };

        let removed = {
            let mut state = self.inner.state.lock();
            let removed = match state.connections.get(&id) {
                Some(existing) if existing.ptr_eq(connection) => state.connections.remove(&id),
                _ => None,
            };
            if state.connections.is_empty() {
                if let Some(ticker) = state.ticker.take() {
                    ticker.abort();
                    debug!("statistics ticker stopped");
                }
            }
            removed
        };
        drop(removed);
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let registry = Arc::downgrade(&self.inner);
        let period = self.inner.config.stats_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = registry.upgrade() else {
                    return;
                };
                ConnectionRegistry { inner }.refresh_statistics();
            }
        })
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &state.connections.len())
            .field("ticking", &state.ticker.is_some())
            .field("config", &self.inner.config)
            .finish()
    }
}
