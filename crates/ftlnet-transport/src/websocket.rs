//! WebSocket transport: one binary frame per message.

use bytes::Bytes;
use futures_util::{future, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::socket::Socket;

/// Connect to a WebSocket peer (`ws://` or `wss://`).
pub async fn connect(url: &str) -> Result<Socket> {
    let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
    debug!(url, "connected websocket");
    Ok(from_websocket(stream))
}

/// Complete the server side of a WebSocket upgrade on an accepted stream.
pub async fn accept<S>(stream: S) -> Result<Socket>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let stream = tokio_tungstenite::accept_async(stream).await?;
    debug!("accepted websocket");
    Ok(from_websocket(stream))
}

/// Drive an established WebSocket as a message socket.
///
/// Text frames are delivered as their UTF-8 bytes. Ping, pong and close
/// frames are handled by the protocol layer and never surface.
pub fn from_websocket<S>(stream: WebSocketStream<S>) -> Socket
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sink, stream) = stream.split();

    let sink = sink
        .sink_map_err(TransportError::from)
        .with(|payload: Bytes| future::ready(Ok::<_, TransportError>(Message::Binary(payload.to_vec()))));

    let stream = stream.filter_map(|message| {
        future::ready(match message {
            Ok(Message::Binary(data)) => Some(Ok(Bytes::from(data))),
            Ok(Message::Text(text)) => Some(Ok(Bytes::from(text.into_bytes()))),
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_)) => None,
            Err(err) => Some(Err(TransportError::from(err))),
        })
    });

    Socket::spawn(Box::pin(sink), Box::pin(stream))
}
