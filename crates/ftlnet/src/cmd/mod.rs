use std::time::Duration;

use clap::{Args, Subcommand};
use ftlnet_proto::Value;

use crate::exit::{io_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept peers and answer `echo` calls.
    Serve(ServeArgs),
    /// Call one procedure on a peer and print the result.
    Call(CallArgs),
    /// Follow a stream and print its events.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (framed TCP).
    #[arg(env = "FTLNET_ADDR", default_value = "127.0.0.1:9001")]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Peer address (framed TCP).
    #[arg(env = "FTLNET_ADDR")]
    pub addr: String,
    /// Procedure name.
    pub procedure: String,
    /// Arguments as JSON. An array is spread positionally; any other value
    /// is passed as the single argument.
    #[arg(long)]
    pub json: Option<String>,
    /// Deadline for connecting, handshake and the call (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Peer address (framed TCP).
    pub addr: String,
    /// Stream URI.
    pub uri: String,
    /// Frameset to select.
    #[arg(long, default_value = "0")]
    pub frameset: u32,
    /// Frame within the frameset.
    #[arg(long, default_value = "0")]
    pub frame: u8,
    /// Video channels to enable (comma-separated ids).
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<u16>,
    /// Also print raw and generic packet events.
    #[arg(long)]
    pub all: bool,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Period of statistics lines (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub stats_interval: String,
    /// Deadline for connecting and handshake.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))
}

/// Flips to true on Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<tokio::sync::watch::Receiver<bool>> {
    let (tx, rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = tx.send(true);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(rx)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_call_args(json: Option<&str>) -> CliResult<Vec<Value>> {
    let Some(json) = json else {
        return Ok(Vec::new());
    };
    let parsed: serde_json::Value = serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
    let items = match parsed {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            ftlnet_proto::to_value(item)
                .map_err(|err| CliError::new(USAGE, format!("unsupported argument: {err}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn call_args_spread_arrays() {
        let args = parse_call_args(Some(r#"[1, "two", {"k": true}]"#)).unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], Value::from(1));
        assert_eq!(args[1], Value::from("two"));
        assert_eq!(
            args[2],
            Value::Map(vec![(Value::from("k"), Value::Boolean(true))])
        );
    }

    #[test]
    fn call_args_wrap_scalars() {
        assert_eq!(parse_call_args(Some("5")).unwrap(), vec![Value::from(5)]);
        assert!(parse_call_args(None).unwrap().is_empty());
        assert_eq!(parse_call_args(Some("{")).unwrap_err().code, USAGE);
    }
}
