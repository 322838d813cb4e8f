use std::net::SocketAddr;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::codec::{FrameCodec, FrameConfig};
use crate::error::{Result, TransportError};
use crate::socket::Socket;

/// Wrap any byte stream in length-prefixed message framing.
pub fn from_stream<T>(io: T, config: FrameConfig) -> Socket
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sink, stream) = Framed::new(io, FrameCodec::new(config)).split();
    Socket::spawn(sink, stream)
}

/// Connect to a framed TCP peer.
pub async fn connect_tcp(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Socket> {
    let label = format!("{addr:?}");
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect {
            addr: label.clone(),
            source,
        })?;
    stream.set_nodelay(true)?;
    debug!(addr = %label, "connected framed tcp socket");
    Ok(from_stream(stream, FrameConfig::default()))
}

/// Connect to a framed Unix domain socket peer.
#[cfg(unix)]
pub async fn connect_unix(path: impl AsRef<std::path::Path>) -> Result<Socket> {
    let path = path.as_ref();
    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect {
            addr: path.display().to_string(),
            source,
        })?;
    debug!(?path, "connected framed unix socket");
    Ok(from_stream(stream, FrameConfig::default()))
}

/// Accepts framed TCP connections.
pub struct FramedListener {
    listener: TcpListener,
    config: FrameConfig,
}

impl FramedListener {
    /// Bind and listen on a TCP address.
    pub async fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let label = format!("{addr:?}");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: label,
                source,
            })?;
        info!(addr = ?listener.local_addr().ok(), "listening for framed tcp peers");
        Ok(Self {
            listener,
            config: FrameConfig::default(),
        })
    }

    /// Override framing config for accepted sockets.
    pub fn with_config(mut self, config: FrameConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(Socket, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%addr, "accepted framed tcp socket");
        Ok((from_stream(stream, self.config.clone()), addr))
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
