use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use ftlnet_transport::{FrameConfig, FramedListener};
use tokio::net::ToSocketAddrs;
use tracing::debug;

use crate::connection::{Connection, ConnectionConfig};
use crate::error::Result;

/// Accepts framed TCP peers. Accepted connections take the server role and
/// send their handshake immediately.
pub struct PeerListener {
    listener: FramedListener,
    config: ConnectionConfig,
    accepted: AtomicU64,
}

impl PeerListener {
    /// Bind and listen on a TCP address.
    pub async fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = FramedListener::bind(addr).await?;
        Ok(Self {
            listener,
            config: ConnectionConfig::default(),
            accepted: AtomicU64::new(0),
        })
    }

    /// Override the configuration of accepted connections.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Override transport framing limits.
    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.listener = self.listener.with_config(frame);
        self
    }

    /// Accept the next peer.
    pub async fn accept(&self) -> Result<(Connection, SocketAddr)> {
        let (socket, addr) = self.listener.accept().await?;
        let count = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(%addr, count, "accepted peer");
        Ok((Connection::with_config(socket, true, self.config.clone()), addr))
    }

    /// Number of peers accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
