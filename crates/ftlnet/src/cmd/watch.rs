use ftlnet_peer::connect_tcp;
use ftlnet_stream::{StreamEvent, StreamMux};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, runtime, WatchArgs};
use crate::exit::{peer_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_event, print_statistics, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let stats_interval = parse_duration(&args.stats_interval)?;
    let timeout = parse_duration(&args.timeout)?;
    runtime()?.block_on(async move {
        let connection = tokio::time::timeout(timeout, connect_tcp(args.addr.as_str()))
            .await
            .map_err(|_| CliError::new(TIMEOUT, "connect timed out"))?
            .map_err(|err| peer_error("connect failed", err))?;
        tokio::time::timeout(timeout, connection.wait_connected())
            .await
            .map_err(|_| CliError::new(TIMEOUT, "handshake timed out"))?
            .map_err(|err| peer_error("handshake failed", err))?;

        let mux = StreamMux::new(connection.clone(), args.uri.clone());
        let mut events = mux.subscribe();
        if args.channels.is_empty() {
            mux.enable_frame(args.frameset, args.frame);
        }
        for &channel in &args.channels {
            mux.enable_video(args.frameset, args.frame, channel);
        }
        mux.start();
        info!(uri = %args.uri, frameset = args.frameset, frame = args.frame, "watching stream");

        let mut shutdown = install_ctrlc_handler()?;
        let mut stats = tokio::time::interval_at(
            tokio::time::Instant::now() + stats_interval,
            stats_interval,
        );
        let mut printed = 0usize;
        let outcome = loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break Ok(SUCCESS),
                _ = stats.tick() => {
                    print_statistics(&args.uri, &mux.statistics(), &connection.statistics(), format);
                }
                event = events.recv() => match event {
                    Ok(StreamEvent::Stop) => {
                        print_event(&args.uri, &StreamEvent::Stop, format);
                        break Err(CliError::new(FAILURE, "stream stopped"));
                    }
                    Ok(event) => {
                        if !args.all && matches!(event, StreamEvent::Raw { .. } | StreamEvent::Packet { .. }) {
                            continue;
                        }
                        print_event(&args.uri, &event, format);
                        printed += 1;
                        if args.count.is_some_and(|count| printed >= count) {
                            break Ok(SUCCESS);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event output fell behind");
                    }
                    Err(RecvError::Closed) => break Err(CliError::new(FAILURE, "stream closed")),
                },
            }
        };

        mux.destroy();
        connection.close().await;
        outcome
    })
}
