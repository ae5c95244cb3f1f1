//! Outbound frame sinks.
//!
//! A session never writes to a socket itself. It pushes encoded frames into
//! a sink, which either queues them for the connection task or collects
//! them for replay.

use docfeed_protocol::{ProtocolError, ServerMessage};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Why a frame could not be handed to the peer.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The peer is not draining its queue fast enough.
    #[error("outbound queue full")]
    Full,

    /// The peer is gone.
    #[error("peer disconnected")]
    Closed,

    /// The message could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Destination for a session's outbound messages.
///
/// `send` runs while the store's writer waits on it, so it must never block.
pub trait OutboundSink: Send + Sync {
    /// Queues one message.
    fn send(&self, message: &ServerMessage) -> Result<(), SinkError>;
}

/// Sink feeding a bounded channel drained by a connection task.
///
/// The first failed send detaches the sender. The connection task then sees
/// its receiver close once the queue is drained and shuts the socket.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver the connection task drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Returns true until the first failed send or [`detach`](Self::detach).
    pub fn is_attached(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Drops the sender; later sends fail with [`SinkError::Closed`].
    pub fn detach(&self) {
        self.tx.lock().take();
    }
}

impl OutboundSink for ChannelSink {
    fn send(&self, message: &ServerMessage) -> Result<(), SinkError> {
        let frame = message.encode()?;
        let mut guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(SinkError::Closed)?;
        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                guard.take();
                Err(SinkError::Full)
            }
            Err(TrySendError::Closed(_)) => {
                guard.take();
                Err(SinkError::Closed)
            }
        }
    }
}

/// Sink that keeps every frame in memory.
#[derive(Default)]
pub struct CollectingSink {
    frames: Mutex<Vec<String>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames collected so far.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    /// Takes the collected frames, leaving the sink empty.
    pub fn take_frames(&self) -> Vec<String> {
        std::mem::take(&mut *self.frames.lock())
    }

    /// Collected frames decoded back into messages. Undecodable frames are
    /// skipped.
    pub fn messages(&self) -> Vec<ServerMessage> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| ServerMessage::decode(frame).ok())
            .collect()
    }
}

impl OutboundSink for CollectingSink {
    fn send(&self, message: &ServerMessage) -> Result<(), SinkError> {
        let frame = message.encode()?;
        self.frames.lock().push(frame);
        Ok(())
    }
}
