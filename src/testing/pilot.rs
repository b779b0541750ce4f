//! Pilot: programmatic interaction with a headless client.
//!
//! The `Pilot` wires a [`Client`] to an in-memory [`ChannelConnection`] and a
//! [`MemoryLoader`] serving the built-in widgets. It can push server messages,
//! run deferred signals, and read back what the client sent.

use std::rc::Rc;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::client::{Client, Signal};
use crate::config::ClientConfig;
use crate::dom::NodeId;
use crate::error::RecordingHandler;
use crate::event::Event;
use crate::registry::MemoryLoader;
use crate::transport::{ChannelConnection, Envelope, PacketType, ServerEnd};
use crate::widget::{Props, WidgetKey};

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless client driver for testing.
///
/// # Examples
///
/// ```ignore
/// let mut pilot = Pilot::new();
/// pilot.create("Button", "btn1", json!({"label": "Go"})).await;
/// pilot.send(json!({"tgt": "btn1", "fcn": "updateState", "arg": ["label", "Stop"]})).await;
/// assert_eq!(pilot.text("btn1"), "Stop");
/// ```
pub struct Pilot {
    client: Client,
    server: ServerEnd,
    signals: UnboundedReceiver<Signal>,
    fatal: RecordingHandler,
    sent: Vec<(Envelope, Option<Vec<u8>>)>,
    _inbound: UnboundedReceiver<String>,
}

impl Pilot {
    /// A client with page id `"test"` and the built-in widgets.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::new("test"))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::build(config, MemoryLoader::with_builtins())
    }

    /// A client loading modules from `loader`.
    pub fn with_loader(loader: MemoryLoader) -> Self {
        Self::build(ClientConfig::new("test"), loader)
    }

    fn build(config: ClientConfig, loader: MemoryLoader) -> Self {
        let (connection, inbound, server) = ChannelConnection::pair();
        let (tx, signals) = mpsc::unbounded_channel();
        let fatal = RecordingHandler::new();
        let client = Client::new(config, Box::new(connection), Rc::new(loader), tx)
            .with_fatal_handler(fatal.clone());
        Self {
            client,
            server,
            signals,
            fatal,
            sent: Vec::new(),
            _inbound: inbound,
        }
    }

    // ── Access ───────────────────────────────────────────────────────

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// The server side of the connection.
    pub fn server(&mut self) -> &mut ServerEnd {
        &mut self.server
    }

    // ── Server messages ──────────────────────────────────────────────

    /// Deliver a message as the server would, draining the action queue.
    pub async fn send(&mut self, message: Value) {
        self.client.receive(&message.to_string()).await;
    }

    /// Create a built-in widget at the top level.
    ///
    /// # Panics
    ///
    /// Panics if creation fails.
    pub async fn create(&mut self, wclass: &str, id: &str, state: Value) -> WidgetKey {
        self.create_with(Props::new(wclass).with_id(id), None, state).await
    }

    /// Create a widget from full properties under an optional parent.
    ///
    /// # Panics
    ///
    /// Panics if creation fails.
    pub async fn create_with(&mut self, props: Props, parent: Option<WidgetKey>, state: Value) -> WidgetKey {
        let state = match state {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        match self.client.create(parent, props, Some(state)).await {
            Ok(key) => key,
            Err(error) => panic!("widget creation failed: {error}"),
        }
    }

    /// Run every deferred signal posted so far.
    pub async fn pump(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            self.client.handle_signal(signal).await;
        }
    }

    // ── DOM interaction ──────────────────────────────────────────────

    /// Fire a DOM event at the element with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if no such element exists or a listener fails.
    pub fn fire(&mut self, id: &str, event: Event) -> Event {
        let node = self.node(id);
        match self.client.fire(node, event) {
            Ok(event) => event,
            Err(error) => panic!("listener failed: {error}"),
        }
    }

    /// Put `value` in the form control `id` and fire `input` at it, as typing
    /// would.
    ///
    /// # Panics
    ///
    /// Panics if no such element exists or a listener fails.
    pub fn type_text(&mut self, id: &str, value: &str) -> Event {
        let node = self.node(id);
        if let Some(data) = self.client.dom_mut().get_mut(node) {
            data.value = Some(value.to_owned());
        }
        self.fire(id, Event::new("input"))
    }

    /// Element with id `id`.
    ///
    /// # Panics
    ///
    /// Panics if no such element exists.
    pub fn node(&self, id: &str) -> NodeId {
        match self.client.dom().query_by_id(id) {
            Some(node) => node,
            None => panic!("no element with id '{id}'"),
        }
    }

    /// Text content of the element with id `id`, or empty.
    pub fn text(&self, id: &str) -> String {
        self.client
            .dom()
            .query_by_id(id)
            .map(|n| self.client.dom().text_content(n))
            .unwrap_or_default()
    }

    /// Markup of the application root.
    pub fn html(&self) -> String {
        let dom = self.client.dom();
        dom.outer_html(dom.app_root())
    }

    /// Markup of the element with id `id`, attached or not.
    ///
    /// # Panics
    ///
    /// Panics if no such element exists.
    pub fn html_of(&self, id: &str) -> String {
        self.client.dom().outer_html(self.node(id))
    }

    // ── Outbound ─────────────────────────────────────────────────────

    fn collect(&mut self) {
        for frame in self.server.drain() {
            match frame.decode() {
                Ok(decoded) => self.sent.push(decoded),
                Err(error) => panic!("client sent an undecodable frame: {error}"),
            }
        }
    }

    /// Every packet the client has sent, oldest first.
    pub fn outbound(&mut self) -> Vec<Envelope> {
        self.collect();
        self.sent.iter().map(|(e, _)| e.clone()).collect()
    }

    /// Every packet with its trailing blob, if any.
    pub fn outbound_with_blobs(&mut self) -> (Vec<Envelope>, Vec<Option<Vec<u8>>>) {
        self.collect();
        self.sent.iter().cloned().unzip()
    }

    /// Data of every `event` packet sent.
    pub fn events(&mut self) -> Vec<Value> {
        self.outbound()
            .into_iter()
            .filter(|e| e.kind == PacketType::Event)
            .map(|e| e.data)
            .collect()
    }

    /// Data of the `event` packets of type `kind`.
    pub fn events_of(&mut self, kind: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|e| e.get("type").and_then(Value::as_str) == Some(kind))
            .collect()
    }

    /// Messages reported to the fatal handler.
    pub fn fatal_messages(&self) -> Vec<String> {
        self.fatal.messages()
    }
}

impl Default for Pilot {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
