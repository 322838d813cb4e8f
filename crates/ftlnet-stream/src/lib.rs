//! Stream channel multiplexing over an ftlnet [`Connection`](ftlnet_peer::Connection).
//!
//! A [`StreamMux`] binds one stream URI, asks the remote to enable it and
//! turns the inbound packet triples into typed [`StreamEvent`]s filtered by
//! the selected frameset and frame.

pub mod config;
pub mod error;
pub mod event;
pub mod mux;
mod state;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use event::StreamEvent;
pub use mux::StreamMux;
pub use state::StreamStatistics;
