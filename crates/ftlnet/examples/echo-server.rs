//! Minimal echo server: accepts peers and answers `echo` calls.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- call 127.0.0.1:9001 echo --json '["hello"]'

use ftlnet::peer::PeerListener;
use ftlnet::proto::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let listener = PeerListener::bind("127.0.0.1:9001").await?;
    eprintln!("Listening on {}", listener.local_addr()?);

    loop {
        let (connection, addr) = listener.accept().await?;
        connection.bind("echo", |args| Ok(Value::Array(args)));

        tokio::spawn(async move {
            match connection.wait_connected().await {
                Ok(peer) => eprintln!("Peer {peer} connected from {addr}"),
                Err(err) => {
                    eprintln!("Handshake with {addr} failed: {err}");
                    return;
                }
            }
            connection.closed().await;
            eprintln!("Peer at {addr} disconnected");
        });
    }
}
