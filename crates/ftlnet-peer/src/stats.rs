use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Per-window byte counters, shared with transport send callbacks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    tx_requested: AtomicU64,
    tx_bytes: AtomicU64,
    rx_bytes: AtomicU64,
}

impl Counters {
    pub(crate) fn add_tx_requested(&self, len: u64) {
        self.tx_requested.fetch_add(len, Ordering::Relaxed);
    }

    pub(crate) fn add_tx_bytes(&self, len: u64) {
        self.tx_bytes.fetch_add(len, Ordering::Relaxed);
    }

    pub(crate) fn add_rx_bytes(&self, len: u64) {
        self.rx_bytes.fetch_add(len, Ordering::Relaxed);
    }

    /// Current window values without resetting them.
    #[cfg(test)]
    pub(crate) fn peek(&self) -> (u64, u64, u64) {
        (
            self.tx_requested.load(Ordering::Relaxed),
            self.tx_bytes.load(Ordering::Relaxed),
            self.rx_bytes.load(Ordering::Relaxed),
        )
    }

    fn take(&self) -> (u64, u64, u64) {
        (
            self.tx_requested.swap(0, Ordering::Relaxed),
            self.tx_bytes.swap(0, Ordering::Relaxed),
            self.rx_bytes.swap(0, Ordering::Relaxed),
        )
    }
}

/// Snapshot of one rolled statistics window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Length of the window in milliseconds.
    pub window_ms: f64,
    /// Bytes queued for sending during the window.
    pub tx_requested: u64,
    /// Bytes the transport confirmed during the window.
    pub tx_bytes: u64,
    /// Bytes received during the window.
    pub rx_bytes: u64,
    /// Confirmed send rate in bytes per millisecond.
    pub tx_rate: f64,
    /// Receive rate in bytes per millisecond.
    pub rx_rate: f64,
    /// `tx_requested / tx_bytes`, or 0 when nothing was confirmed.
    pub tx_ratio: f64,
    /// Confirmed bytes sent since the connection opened.
    pub tx_total: u64,
    /// Bytes received since the connection opened.
    pub rx_total: u64,
}

/// Window bookkeeping kept under the connection lock.
#[derive(Debug)]
pub(crate) struct StatsWindow {
    started: Instant,
    tx_total: u64,
    rx_total: u64,
    last: Statistics,
}

impl StatsWindow {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            started: now,
            tx_total: 0,
            rx_total: 0,
            last: Statistics::default(),
        }
    }

    pub(crate) fn last(&self) -> Statistics {
        self.last
    }

    /// Close the current window. Windows shorter than `min_window` are left
    /// open so they fold into the next roll.
    pub(crate) fn roll(
        &mut self,
        counters: &Counters,
        now: Instant,
        min_window: Duration,
    ) -> Option<Statistics> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < min_window || elapsed.is_zero() {
            return None;
        }

        let (tx_requested, tx_bytes, rx_bytes) = counters.take();
        self.tx_total += tx_bytes;
        self.rx_total += rx_bytes;
        self.started = now;

        let window_ms = elapsed.as_micros() as f64 / 1000.0;
        self.last = Statistics {
            window_ms,
            tx_requested,
            tx_bytes,
            rx_bytes,
            tx_rate: tx_bytes as f64 / window_ms,
            rx_rate: rx_bytes as f64 / window_ms,
            tx_ratio: if tx_bytes == 0 {
                0.0
            } else {
                tx_requested as f64 / tx_bytes as f64
            },
            tx_total: self.tx_total,
            rx_total: self.rx_total,
        };
        Some(self.last)
    }
}
