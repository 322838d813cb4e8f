use std::future::Future;
use std::time::Duration;

use ftlnet_peer::connect_tcp;

use crate::cmd::{parse_call_args, parse_duration, runtime, CallArgs};
use crate::exit::{peer_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_call_result, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let call_args = parse_call_args(args.json.as_deref())?;
    runtime()?.block_on(async move {
        let connection = within(timeout, "connect", connect_tcp(args.addr.as_str()))
            .await?
            .map_err(|err| peer_error("connect failed", err))?;
        let peer = within(timeout, "handshake", connection.wait_connected())
            .await?
            .map_err(|err| peer_error("handshake failed", err))?;

        let result = connection
            .rpc_timeout(&args.procedure, call_args, timeout)
            .await
            .map_err(|err| peer_error("call failed", err))?;
        print_call_result(&args.procedure, &peer.to_string(), &result, format);

        connection.close().await;
        Ok(SUCCESS)
    })
}

async fn within<F: Future>(timeout: Duration, what: &str, future: F) -> CliResult<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("{what} timed out after {timeout:?}")))
}
