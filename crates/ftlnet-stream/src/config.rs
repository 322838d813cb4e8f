use std::time::Duration;

/// Timing and buffering for a stream multiplexer.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Delay before re-requesting a stream the remote did not find.
    pub retry_interval: Duration,
    /// Period of request packets for enabled channels while live.
    pub heartbeat_interval: Duration,
    /// End-of-frameset samples needed before latency/fps are recomputed.
    pub stats_min_samples: u32,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_millis(500),
            stats_min_samples: 20,
            event_capacity: 1024,
        }
    }
}

impl StreamConfig {
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_stats_min_samples(mut self, samples: u32) -> Self {
        self.stats_min_samples = samples;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
