//! Server link: connection state, packet sending, keepalive scheduling.

pub mod connection;
pub mod packet;

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::client::Signal;
use crate::error::Result;

pub use connection::{ChannelConnection, Connection, ServerEnd};
pub use packet::{Envelope, Frame, PacketType};

/// Owns the connection and the bookkeeping around it.
pub struct Transport {
    connection: Box<dyn Connection>,
    pid: String,
    keepalive: Option<Duration>,
    keepalive_task: Option<AbortHandle>,
    last_send: Option<Instant>,
    last_receive: Option<Instant>,
}

impl Transport {
    pub fn new(connection: Box<dyn Connection>, pid: impl Into<String>) -> Self {
        Self {
            connection,
            pid: pid.into(),
            keepalive: None,
            keepalive_task: None,
            last_send: None,
            last_receive: None,
        }
    }

    /// Page id stamped on every packet.
    pub fn pid(&self) -> &str {
        &self.pid
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Encode and send one packet.
    pub fn send(&mut self, kind: PacketType, data: Value, blob: Option<&[u8]>) -> Result<()> {
        let frame = Envelope::new(kind, self.pid.clone(), data).encode(blob)?;
        self.connection.send(frame)?;
        self.last_send = Some(Instant::now());
        Ok(())
    }

    pub fn mark_received(&mut self) {
        self.last_receive = Some(Instant::now());
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    pub fn last_receive(&self) -> Option<Instant> {
        self.last_receive
    }

    pub fn keepalive(&self) -> Option<Duration> {
        self.keepalive
    }

    /// Replace the keepalive schedule. `None` or a zero interval cancels it.
    ///
    /// While active, [`Signal::Keepalive`] is posted every half interval; the
    /// receiver decides via [`Transport::keepalive_due`] whether to ping.
    pub fn set_keepalive(&mut self, interval: Option<Duration>, signals: &UnboundedSender<Signal>) {
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
        self.keepalive = interval.filter(|d| !d.is_zero());
        let Some(interval) = self.keepalive else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!("no async runtime; keepalive ticks disabled");
            return;
        }
        let period = (interval / 2).max(Duration::from_millis(1));
        let tx = signals.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(Signal::Keepalive).is_err() {
                    break;
                }
            }
        });
        self.keepalive_task = Some(task.abort_handle());
        tracing::debug!(?interval, "keepalive scheduled");
    }

    /// Whether a full keepalive interval has passed since the last send.
    pub fn keepalive_due(&self) -> bool {
        match (self.keepalive, self.last_send) {
            (Some(interval), Some(sent)) => sent.elapsed() >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
        self.connection.close();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
    }
}
