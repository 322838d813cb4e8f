use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Environment fallback for `--log-level`.
pub const LOG_LEVEL_ENV: &str = "FTLNET_LOG";
/// Environment fallback for `--log-format`.
pub const LOG_FORMAT_ENV: &str = "FTLNET_LOG_FORMAT";

/// Target prefix shared by every crate of the workspace.
const OWN_TARGETS: &str = "ftlnet";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// The chosen level applies to ftlnet crates. Transport dependencies
    /// never log below `warn`.
    fn targets(self) -> Targets {
        let own = self.as_filter();
        Targets::new()
            .with_default(own.min(LevelFilter::WARN))
            .with_target(OWN_TARGETS, own)
    }

    /// Module paths only help once per-frame detail is on.
    fn shows_targets(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(level.shows_targets());
    let registry = tracing_subscriber::registry().with(level.targets());

    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn dependencies_stay_at_warn() {
        let targets = LogLevel::Debug.targets();
        assert!(targets.would_enable("ftlnet_peer::connection", &Level::DEBUG));
        assert!(targets.would_enable("ftlnet_stream::mux", &Level::DEBUG));
        assert!(!targets.would_enable("tokio_tungstenite", &Level::DEBUG));
        assert!(targets.would_enable("tokio_tungstenite", &Level::WARN));
    }

    #[test]
    fn quiet_levels_apply_everywhere() {
        let targets = LogLevel::Error.targets();
        assert!(!targets.would_enable("ftlnet_peer::connection", &Level::WARN));
        assert!(!targets.would_enable("tokio_tungstenite", &Level::WARN));
        assert!(targets.would_enable("tokio_tungstenite", &Level::ERROR));
    }

    #[test]
    fn module_paths_shown_only_when_verbose() {
        assert!(!LogLevel::Info.shows_targets());
        assert!(LogLevel::Trace.shows_targets());
    }
}
