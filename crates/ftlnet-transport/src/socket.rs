use std::fmt;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Invoked with the message length once the transport has accepted the bytes.
pub type SentCallback = Box<dyn FnOnce(usize) + Send + 'static>;

/// Something that happened on the receiving side of a socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// One complete inbound message.
    Message(Bytes),
    /// The socket closed (locally requested or remote hang-up).
    Closed,
    /// The transport failed; the socket is unusable afterwards.
    Error(TransportError),
}

enum Command {
    Send {
        payload: Bytes,
        on_sent: Option<SentCallback>,
    },
    Close,
}

/// Sending half of a [`Socket`]. Cheap to clone.
#[derive(Clone)]
pub struct SocketWriter {
    commands: mpsc::UnboundedSender<Command>,
}

impl SocketWriter {
    /// Queue one message for transmission.
    ///
    /// Fails only when the socket driver is gone. `on_sent` fires after the
    /// transport accepted the bytes.
    pub fn send(&self, payload: Bytes, on_sent: Option<SentCallback>) -> Result<()> {
        self.commands
            .send(Command::Send { payload, on_sent })
            .map_err(|_| TransportError::Closed)
    }

    /// Request closure. Completion is reported as [`SocketEvent::Closed`].
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// True once the driver has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

impl fmt::Debug for SocketWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketWriter")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving half of a [`Socket`].
#[derive(Debug)]
pub struct SocketReader {
    events: mpsc::UnboundedReceiver<SocketEvent>,
    finished: bool,
}

impl SocketReader {
    /// Next event, in transport order.
    ///
    /// Yields exactly one terminal event (`Closed` or `Error`), then `None`.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await.unwrap_or(SocketEvent::Closed);
        if matches!(event, SocketEvent::Closed | SocketEvent::Error(_)) {
            self.finished = true;
        }
        Some(event)
    }
}

/// An ordered, reliable, message-framed connection.
#[derive(Debug)]
pub struct Socket {
    writer: SocketWriter,
    reader: SocketReader,
}

impl Socket {
    fn from_channels(
        commands: mpsc::UnboundedSender<Command>,
        events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> Self {
        Self {
            writer: SocketWriter { commands },
            reader: SocketReader {
                events,
                finished: false,
            },
        }
    }

    /// Create two sockets connected to each other in memory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn pair() -> (Socket, Socket) {
        let (left_cmd_tx, left_cmd_rx) = mpsc::unbounded_channel();
        let (right_cmd_tx, right_cmd_rx) = mpsc::unbounded_channel();
        let (left_evt_tx, left_evt_rx) = mpsc::unbounded_channel();
        let (right_evt_tx, right_evt_rx) = mpsc::unbounded_channel();

        tokio::spawn(forward(
            left_cmd_rx,
            left_evt_tx.clone(),
            right_evt_tx.clone(),
        ));
        tokio::spawn(forward(right_cmd_rx, right_evt_tx, left_evt_tx));

        (
            Socket::from_channels(left_cmd_tx, left_evt_rx),
            Socket::from_channels(right_cmd_tx, right_evt_rx),
        )
    }

    /// Drive a message sink/stream pair on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<Si, St>(sink: Si, stream: St) -> Socket
    where
        Si: Sink<Bytes, Error = TransportError> + Send + Unpin + 'static,
        St: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(sink, stream, cmd_rx, evt_tx));
        Socket::from_channels(cmd_tx, evt_rx)
    }

    /// Borrow the sending half.
    pub fn writer(&self) -> &SocketWriter {
        &self.writer
    }

    /// Split into sending and receiving halves.
    pub fn split(self) -> (SocketWriter, SocketReader) {
        (self.writer, self.reader)
    }
}

async fn forward(
    mut commands: mpsc::UnboundedReceiver<Command>,
    local: mpsc::UnboundedSender<SocketEvent>,
    remote: mpsc::UnboundedSender<SocketEvent>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Send { payload, on_sent } => {
                let len = payload.len();
                if remote.send(SocketEvent::Message(payload)).is_err() {
                    let _ = local.send(SocketEvent::Error(TransportError::Closed));
                    return;
                }
                if let Some(on_sent) = on_sent {
                    on_sent(len);
                }
            }
            Command::Close => break,
        }
    }

    trace!("in-memory socket closed");
    let _ = local.send(SocketEvent::Closed);
    let _ = remote.send(SocketEvent::Closed);
}

async fn drive<Si, St>(
    mut sink: Si,
    mut stream: St,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SocketEvent>,
) where
    Si: Sink<Bytes, Error = TransportError> + Unpin,
    St: Stream<Item = Result<Bytes>> + Unpin,
{
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send { payload, on_sent }) => {
                    let len = payload.len();
                    if let Err(err) = sink.send(payload).await {
                        debug!(error = %err, "socket send failed");
                        let _ = events.send(SocketEvent::Error(err));
                        return;
                    }
                    if let Some(on_sent) = on_sent {
                        on_sent(len);
                    }
                }
                Some(Command::Close) | None => {
                    if let Err(err) = sink.close().await {
                        debug!(error = %err, "socket close failed");
                    }
                    let _ = events.send(SocketEvent::Closed);
                    return;
                }
            },
            item = stream.next() => match item {
                Some(Ok(payload)) => {
                    if events.send(SocketEvent::Message(payload)).is_err() {
                        return;
                    }
                }
                Some(Err(err)) => {
                    debug!(error = %err, "socket receive failed");
                    let _ = events.send(SocketEvent::Error(err));
                    return;
                }
                None => {
                    let _ = events.send(SocketEvent::Closed);
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn pair_delivers_messages_in_order() {
        let (left, right) = Socket::pair();
        let (left_writer, _left_reader) = left.split();
        let (_right_writer, mut right_reader) = right.split();

        left_writer.send(Bytes::from_static(b"one"), None).unwrap();
        left_writer.send(Bytes::from_static(b"two"), None).unwrap();

        for expected in [&b"one"[..], &b"two"[..]] {
            match right_reader.next_event().await {
                Some(SocketEvent::Message(payload)) => assert_eq!(payload.as_ref(), expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn sent_callback_reports_length() {
        let (left, right) = Socket::pair();
        let (left_writer, _left_reader) = left.split();
        let (_right_writer, mut right_reader) = right.split();

        let sent = Arc::new(AtomicUsize::new(0));
        let counter = sent.clone();
        left_writer
            .send(
                Bytes::from_static(b"12345"),
                Some(Box::new(move |len| {
                    counter.fetch_add(len, Ordering::SeqCst);
                })),
            )
            .unwrap();

        assert!(matches!(
            right_reader.next_event().await,
            Some(SocketEvent::Message(_))
        ));
        assert_eq!(sent.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn close_is_seen_by_both_sides_once() {
        let (left, right) = Socket::pair();
        let (left_writer, mut left_reader) = left.split();
        let (_right_writer, mut right_reader) = right.split();

        left_writer.close();

        assert!(matches!(left_reader.next_event().await, Some(SocketEvent::Closed)));
        assert!(left_reader.next_event().await.is_none());
        assert!(matches!(right_reader.next_event().await, Some(SocketEvent::Closed)));
        assert!(right_reader.next_event().await.is_none());
    }

    #[tokio::test]
    async fn dropping_writer_closes_socket() {
        let (left, right) = Socket::pair();
        let (left_writer, _left_reader) = left.split();
        let (_right_writer, mut right_reader) = right.split();

        drop(left_writer);

        assert!(matches!(right_reader.next_event().await, Some(SocketEvent::Closed)));
    }
}
