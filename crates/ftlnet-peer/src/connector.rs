use ftlnet_transport::Socket;
use tokio::net::ToSocketAddrs;
use tracing::debug;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::Result;

/// Connect to a framed TCP peer as a client.
///
/// The returned connection is still handshaking; use
/// [`Connection::wait_connected`] before relying on the peer id.
pub async fn connect_tcp(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Connection> {
    connect_tcp_with_config(addr, ConnectionConfig::default()).await
}

/// Connect with explicit configuration.
pub async fn connect_tcp_with_config(
    addr: impl ToSocketAddrs + std::fmt::Debug,
    config: ConnectionConfig,
) -> Result<Connection> {
    let socket = ftlnet_transport::connect_tcp(addr).await?;
    Ok(client(socket, config))
}

/// Connect to a framed Unix domain socket peer as a client.
#[cfg(unix)]
pub async fn connect_unix(
    path: impl AsRef<std::path::Path>,
    config: ConnectionConfig,
) -> Result<Connection> {
    let socket = ftlnet_transport::connect_unix(path).await?;
    Ok(client(socket, config))
}

/// Connect to a WebSocket peer as a client.
#[cfg(feature = "websocket")]
pub async fn connect_websocket(url: &str, config: ConnectionConfig) -> Result<Connection> {
    let socket = ftlnet_transport::websocket::connect(url).await?;
    Ok(client(socket, config))
}

fn client(socket: Socket, config: ConnectionConfig) -> Connection {
    debug!(local_id = %config.handshake.local_id, "starting client connection");
    Connection::with_config(socket, false, config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ftlnet_proto::Value;

    use super::*;
    use crate::handshake::PeerId;
    use crate::listener::PeerListener;
    use crate::registry::{ConnectionRegistry, RegistryConfig};

    #[tokio::test]
    async fn tcp_call_roundtrip() {
        let registry = ConnectionRegistry::new(RegistryConfig::default());
        let listener = PeerListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .with_config(
                ConnectionConfig::default()
                    .with_local_id(PeerId::random())
                    .with_registry(registry.clone()),
            );
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (connection, _) = listener.accept().await.unwrap();
            connection.bind_typed("greet", |(name,): (String,)| Ok(format!("hello {name}")));
            connection.wait_connected().await.unwrap();
            connection.closed().await;
        });

        let client = connect_tcp_with_config(
            addr,
            ConnectionConfig::default()
                .with_local_id(PeerId::random())
                .with_registry(registry.clone()),
        )
        .await
        .unwrap();
        tokio::time::timeout(Duration::from_secs(5), client.wait_connected())
            .await
            .unwrap()
            .unwrap();

        let reply = tokio::time::timeout(
            Duration::from_secs(5),
            client.rpc("greet", vec![Value::from("ftl")]),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reply.as_str(), Some("hello ftl"));

        client.close().await;
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn connect_failure_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect_tcp(addr).await.unwrap_err();
        assert!(matches!(err, crate::PeerError::Transport(_)));
    }
}
