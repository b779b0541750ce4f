//! Connection abstraction and an in-process channel implementation.

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use super::packet::Frame;
use crate::error::{Error, Result};

/// A bidirectional link to the server. Inbound messages arrive separately as
/// text on the receiver handed to the application loop.
pub trait Connection {
    fn is_open(&self) -> bool;
    fn send(&mut self, frame: Frame) -> Result<()>;
    fn close(&mut self) {}
}

// ---------------------------------------------------------------------------
// ChannelConnection
// ---------------------------------------------------------------------------

/// Client side of an in-process connection.
#[derive(Debug)]
pub struct ChannelConnection {
    outbound: UnboundedSender<Frame>,
    closed: bool,
}

impl ChannelConnection {
    /// Create a connected pair: the client connection, the client's inbound
    /// message stream, and the server end.
    pub fn pair() -> (Self, UnboundedReceiver<String>, ServerEnd) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Self {
            outbound: out_tx,
            closed: false,
        };
        let server = ServerEnd {
            inbound: Some(in_tx),
            outbound: out_rx,
        };
        (conn, in_rx, server)
    }
}

impl Connection for ChannelConnection {
    fn is_open(&self) -> bool {
        !self.closed && !self.outbound.is_closed()
    }

    fn send(&mut self, frame: Frame) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionLost);
        }
        self.outbound.send(frame).map_err(|_| Error::ConnectionLost)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

// ---------------------------------------------------------------------------
// ServerEnd
// ---------------------------------------------------------------------------

/// Server side of a [`ChannelConnection`].
#[derive(Debug)]
pub struct ServerEnd {
    inbound: Option<UnboundedSender<String>>,
    outbound: UnboundedReceiver<Frame>,
}

impl ServerEnd {
    /// Deliver a raw message to the client. Returns `false` once disconnected.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Next frame sent by the client, waiting if none is queued.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Next queued frame, if any.
    pub fn try_recv(&mut self) -> Option<Frame> {
        match self.outbound.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// All frames queued so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop delivering messages; the client's inbound stream ends once
    /// drained while its outbound link stays open.
    pub fn close_inbound(&mut self) {
        self.inbound = None;
    }

    /// Simulate the server going away: the client sees the link closed.
    pub fn disconnect(&mut self) {
        self.inbound = None;
        self.outbound.close();
    }
}
