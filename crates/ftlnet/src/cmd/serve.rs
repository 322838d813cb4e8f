use std::net::SocketAddr;

use ftlnet_peer::{Connection, PeerListener};
use ftlnet_proto::Value;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, runtime, ServeArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_peer_event, OutputFormat};

/// Procedure bound on every accepted peer.
pub const ECHO: &str = "echo";

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    runtime()?.block_on(serve(args, format))
}

async fn serve(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = PeerListener::bind(args.addr.as_str())
        .await
        .map_err(|err| peer_error("bind failed", err))?;
    let local = listener
        .local_addr()
        .map_err(|err| peer_error("bind failed", err))?;
    info!(addr = %local, "listening");
    print_peer_event("listening", local, None, format);

    let mut shutdown = install_ctrlc_handler()?;
    loop {
        tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            accepted = listener.accept() => {
                let (connection, addr) = accepted.map_err(|err| peer_error("accept failed", err))?;
                bind_echo(&connection);
                tokio::spawn(track(connection, addr, format));
            }
        }
    }

    info!(accepted = listener.accepted(), "shutting down");
    Ok(SUCCESS)
}

fn bind_echo(connection: &Connection) {
    connection.bind(ECHO, |mut args| {
        Ok(if args.len() == 1 {
            args.remove(0)
        } else {
            Value::Array(args)
        })
    });
}

async fn track(connection: Connection, addr: SocketAddr, format: OutputFormat) {
    match connection.wait_connected().await {
        Ok(peer) => {
            let peer = peer.to_string();
            print_peer_event("connected", addr, Some(&peer), format);
            connection.closed().await;
            print_peer_event("disconnected", addr, Some(&peer), format);
        }
        Err(err) => {
            warn!(%addr, error = %err, "peer failed before handshake");
        }
    }
}
