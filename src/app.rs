//! App struct: startup and the single-consumer event loop.
//!
//! [`App`] owns a [`Client`] and the three streams that drive it: inbound
//! server messages, deferred [`Signal`]s, and log records bound for the
//! server. [`App::run`] announces the session, then handles one item at a
//! time until the server stops sending. Every action batch is drained to
//! completion before the next item is looked at, so server actions are
//! applied strictly in arrival order.

use std::rc::Rc;

use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::client::{Client, Signal};
use crate::config::ClientConfig;
use crate::error::{FatalHandler, Result};
use crate::logging::{LogRecord, CONSOLE_TARGET};
use crate::registry::ModuleLoader;
use crate::transport::{ChannelConnection, Connection, PacketType, ServerEnd};

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// The application: a client plus the loop feeding it.
pub struct App {
    client: Client,
    inbound: UnboundedReceiver<String>,
    signals: UnboundedReceiver<Signal>,
    logs: Option<UnboundedReceiver<LogRecord>>,
}

impl App {
    /// Create an app talking over `connection`, with server messages
    /// arriving on `inbound`.
    pub fn new(
        config: ClientConfig,
        connection: Box<dyn Connection>,
        inbound: UnboundedReceiver<String>,
        loader: Rc<dyn ModuleLoader>,
    ) -> Self {
        let (tx, signals) = mpsc::unbounded_channel();
        Self {
            client: Client::new(config, connection, loader, tx),
            inbound,
            signals,
            logs: None,
        }
    }

    /// Create an app over an in-process channel, returning the server end.
    pub fn channel(config: ClientConfig, loader: Rc<dyn ModuleLoader>) -> (Self, ServerEnd) {
        let (connection, inbound, server) = ChannelConnection::pair();
        (Self::new(config, Box::new(connection), inbound, loader), server)
    }

    /// Forward queued log records to the server (builder).
    pub fn with_logs(mut self, logs: UnboundedReceiver<LogRecord>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Replace the fatal error handler (builder).
    pub fn with_fatal_handler(mut self, handler: impl FatalHandler + 'static) -> Self {
        self.client = self.client.with_fatal_handler(handler);
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Send `init`, then process messages, signals and log records until the
    /// inbound stream ends.
    pub async fn run(&mut self) -> Result<()> {
        self.client.start()?;
        tracing::info!(pid = %self.client.config().pid, "session started");
        loop {
            tokio::select! {
                biased;
                Some(signal) = self.signals.recv() => self.client.handle_signal(signal).await,
                Some(record) = next_log(&mut self.logs) => self.forward_log(record),
                message = self.inbound.recv() => match message {
                    Some(text) => self.client.receive(&text).await,
                    None => break,
                },
            }
        }
        while let Ok(signal) = self.signals.try_recv() {
            self.client.handle_signal(signal).await;
        }
        self.client.set_keepalive(0);
        tracing::info!(pid = %self.client.config().pid, "session ended");
        Ok(())
    }

    /// Send one log record as a `log` packet, or print it when the server
    /// cannot be reached.
    fn forward_log(&mut self, record: LogRecord) {
        if !self.client.is_connected() {
            tracing::info!(target: CONSOLE_TARGET, level = %record.level, "{}", record.message);
            return;
        }
        let data = json!({
            "level": record.level.as_str().to_lowercase(),
            "message": record.message,
        });
        if let Err(error) = self.client.send_data(PacketType::Log, data, None) {
            tracing::warn!(target: CONSOLE_TARGET, %error, "log forwarding failed");
        }
    }
}

async fn next_log(logs: &mut Option<UnboundedReceiver<LogRecord>>) -> Option<LogRecord> {
    match logs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").field("client", &self.client).finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
