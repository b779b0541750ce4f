//! The client context.
//!
//! A [`Client`] owns everything one page session needs: the element arena,
//! the widget registry, the module cache, the action queue, the event
//! pipeline, the transport and the popup manager. Widget code receives
//! `&mut Client` and reaches all of it from there; nothing is global.
//!
//! Work that has to happen later (keepalive checks, timer ticks, component
//! mounts, deferred fatal errors) is posted as a [`Signal`] and handled by
//! the application loop through [`Client::handle_signal`].

use std::rc::Rc;

use serde_json::{json, Map, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::action::{self, ActionQueue, Namespace};
use crate::config::ClientConfig;
use crate::dom::{Dom, NodeId};
use crate::error::{AlertHandler, Error, FatalHandler, Result};
use crate::event::{handler, EventPipeline, KEY_BACKSPACE};
use crate::registry::{ModuleCache, ModuleLoader, Registry};
use crate::transport::{Connection, PacketType, Transport};
use crate::util;
use crate::widget::{Class, LifecycleTracker, WidgetKey, WidgetNode};
use crate::widgets::popup::PopupManager;

/// Deferred work for the application loop.
#[derive(Debug)]
pub enum Signal {
    /// Half a keepalive interval elapsed.
    Keepalive,
    /// A timer widget's interval elapsed.
    Tick(String),
    /// A hosted component is ready to be mounted.
    Mount(String),
    /// A file selected in an upload widget is ready to be read.
    Upload { id: String, file: String },
    /// An error raised outside any caller that could report it.
    Fatal(Error),
}

/// Process-scoped state of one page session.
pub struct Client {
    pub(crate) dom: Dom,
    pub(crate) registry: Registry,
    pub(crate) modules: ModuleCache,
    pub(crate) actions: ActionQueue,
    pub(crate) events: EventPipeline,
    pub(crate) transport: Transport,
    pub(crate) popups: PopupManager,
    pub(crate) lifecycle: LifecycleTracker,
    pub(crate) globals: Namespace,
    config: ClientConfig,
    fatal: Rc<dyn FatalHandler>,
    signals: UnboundedSender<Signal>,
    page: Option<WidgetKey>,
    can_close: bool,
    lost: bool,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        connection: Box<dyn Connection>,
        loader: Rc<dyn ModuleLoader>,
        signals: UnboundedSender<Signal>,
    ) -> Self {
        let transport = Transport::new(connection, config.pid.clone());
        let mut client = Self {
            dom: Dom::new(),
            registry: Registry::new(),
            modules: ModuleCache::new(loader),
            actions: ActionQueue::new(),
            events: EventPipeline::new(),
            transport,
            popups: PopupManager::new(),
            lifecycle: LifecycleTracker::new(),
            globals: action::builtins(),
            config,
            fatal: Rc::new(AlertHandler),
            signals,
            page: None,
            can_close: true,
            lost: false,
        };
        client.install_document_listeners();
        client
    }

    /// Replace the fatal error handler (builder).
    pub fn with_fatal_handler(mut self, handler: impl FatalHandler + 'static) -> Self {
        self.fatal = Rc::new(handler);
        self
    }

    fn install_document_listeners(&mut self) {
        let body = self.dom.body();
        self.on(
            body,
            "contextmenu",
            handler(|cx, event| {
                if !cx.config.debug {
                    event.prevent_default();
                }
                Ok(())
            }),
        );
        self.on(
            body,
            "keydown",
            handler(|cx, event| {
                let backspace = event
                    .json("keyCode")
                    .and_then(Value::as_u64)
                    .is_some_and(|code| code == u64::from(KEY_BACKSPACE));
                if backspace {
                    let editable = event
                        .target()
                        .and_then(|t| cx.dom.get(t))
                        .is_some_and(|d| d.tag == "input" || d.tag == "textarea");
                    if !editable {
                        event.prevent_default();
                    }
                }
                Ok(())
            }),
        );
        self.on(
            body,
            "click",
            handler(|cx, event| cx.close_popups(event.target())),
        );
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// A live widget.
    pub fn node(&self, key: WidgetKey) -> Result<&WidgetNode> {
        self.registry.get(key).ok_or(Error::Stale)
    }

    pub fn node_mut(&mut self, key: WidgetKey) -> Result<&mut WidgetNode> {
        self.registry.get_mut(key).ok_or(Error::Stale)
    }

    /// The widget's root element, once rendered.
    pub fn handle(&self, key: WidgetKey) -> Option<NodeId> {
        self.registry.get(key)?.handle()
    }

    pub fn class_of(&self, key: WidgetKey) -> Result<Rc<Class>> {
        Ok(Rc::clone(self.node(key)?.class()))
    }

    /// Widget registered under `id`.
    pub fn find(&self, id: &str) -> Option<WidgetKey> {
        self.registry.find(id)
    }

    pub fn widget_id(&self, key: WidgetKey) -> Option<String> {
        self.registry.get(key).map(|w| w.id().to_owned())
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn lifecycle(&mut self) -> &mut LifecycleTracker {
        &mut self.lifecycle
    }

    /// The page widget, once created.
    pub fn page(&self) -> Option<WidgetKey> {
        self.page
    }

    pub(crate) fn set_page(&mut self, page: Option<WidgetKey>) {
        self.page = page;
    }

    /// Whether the page may be closed without confirmation.
    pub fn can_close(&self) -> bool {
        self.can_close
    }

    pub(crate) fn set_can_close(&mut self, can_close: bool) {
        self.can_close = can_close;
    }

    pub(crate) fn signals(&self) -> &UnboundedSender<Signal> {
        &self.signals
    }

    /// Post deferred work to the application loop.
    pub(crate) fn post(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!("signal dropped; application loop is gone");
        }
    }

    /// Report an error to the fatal handler.
    pub fn fatal(&self, error: &Error) {
        self.fatal.fatal(error);
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Announce the session and start the keepalive schedule.
    pub fn start(&mut self) -> Result<()> {
        let data = self.init_packet();
        self.send_data(PacketType::Init, Value::Object(data), None)?;
        self.set_keepalive(self.config.keepalive);
        Ok(())
    }

    /// Environment details sent with the `init` packet.
    pub fn init_packet(&self) -> Map<String, Value> {
        let config = &self.config;
        let mut data = Map::new();
        data.insert("requestURL".into(), json!(config.request_url));
        data.insert("baseURL".into(), json!(config.base_url));
        data.insert("viewportHeight".into(), json!(config.viewport.height));
        data.insert("viewportWidth".into(), json!(config.viewport.width));
        data.insert("timezoneOffset".into(), json!(config.timezone_offset));
        let mut env = Map::new();
        env.insert("screen".into(), Value::Object(config.screen.clone()));
        env.insert("browser".into(), Value::Object(config.browser.clone()));
        data.extend(util::flatten(&env));
        data
    }

    /// Send one packet.
    ///
    /// On a closed connection the keepalive is stopped, the page is blanked
    /// (outside debug mode) and [`Error::ConnectionLost`] is posted for the
    /// fatal handler; the caller itself sees success.
    pub fn send_data(&mut self, kind: PacketType, data: Value, blob: Option<&[u8]>) -> Result<()> {
        if !self.transport.is_connected() {
            self.connection_lost();
            return Ok(());
        }
        if kind != PacketType::Log {
            tracing::debug!(?kind, %data, "sending");
        }
        match self.transport.send(kind, data, blob) {
            Err(Error::ConnectionLost) => {
                self.connection_lost();
                Ok(())
            }
            other => other,
        }
    }

    fn connection_lost(&mut self) {
        self.transport.set_keepalive(None, &self.signals);
        if self.lost {
            return;
        }
        self.lost = true;
        tracing::error!("connection to server lost");
        if !self.config.debug {
            let root = self.dom.app_root();
            self.dom.empty(root);
        }
        self.post(Signal::Fatal(Error::ConnectionLost));
    }

    pub fn ping(&mut self, data: impl Into<Value>) -> Result<()> {
        self.send_data(PacketType::Ping, data.into(), None)
    }

    /// Change the keepalive interval in milliseconds; `0` disables it.
    pub fn set_keepalive(&mut self, millis: u64) {
        let interval = (millis > 0).then(|| std::time::Duration::from_millis(millis));
        self.transport.set_keepalive(interval, &self.signals);
    }

    /// Run one piece of deferred work. Errors go to the fatal handler.
    pub async fn handle_signal(&mut self, signal: Signal) {
        let result = match signal {
            Signal::Keepalive => {
                if self.transport.keepalive_due() {
                    self.ping("keepalive")
                } else {
                    Ok(())
                }
            }
            Signal::Tick(id) => crate::widgets::timer::tick(self, &id),
            Signal::Mount(id) => crate::host::mount(self, &id).await,
            Signal::Upload { id, file } => crate::widgets::upload::complete(self, &id, &file),
            Signal::Fatal(error) => Err(error),
        };
        if let Err(error) = result {
            self.fatal(&error);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pid", &self.config.pid)
            .field("widgets", &self.registry.len())
            .field("connected", &self.transport.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;
    use crate::event::{Event, KeyEvent, Modifiers};
    use crate::testing::Pilot;
    use pretty_assertions::assert_eq;

    #[test]
    fn init_packet_flattens_environment() {
        let mut config = ClientConfig::new("p1").with_viewport(1024.0, 768.0);
        config.base_url = Some("http://host/app/".into());
        config.timezone_offset = -60;
        config.screen.insert("width".into(), json!(1920));
        config.browser.insert("language".into(), json!("en"));
        let mut pilot = Pilot::with_config(config);
        pilot.client_mut().start().unwrap();
        let packets = pilot.outbound();
        assert_eq!(packets[0].kind, PacketType::Init);
        assert_eq!(
            packets[0].data,
            json!({
                "requestURL": null,
                "baseURL": "http://host/app/",
                "viewportHeight": 768.0,
                "viewportWidth": 1024.0,
                "timezoneOffset": -60,
                "screen_width": 1920,
                "browser_language": "en"
            })
        );
    }

    #[tokio::test]
    async fn lost_connection_is_deferred_fatal() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        pilot.server().disconnect();
        let cx = pilot.client_mut();
        assert!(cx.ping("x").is_ok());
        assert!(!cx.dom.contains(node));
        assert!(pilot.fatal_messages().is_empty());
        pilot.pump().await;
        let messages = pilot.fatal_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Fatal error:"));
        assert!(messages[0].contains("interrupted"));
    }

    #[test]
    fn debug_mode_keeps_page() {
        let mut pilot = Pilot::with_config(ClientConfig::new("p").with_debug(true));
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        pilot.server().disconnect();
        let cx = pilot.client_mut();
        cx.ping("x").unwrap();
        assert!(cx.dom.contains(node));
    }

    #[tokio::test]
    async fn keepalive_pings_only_when_idle() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        cx.set_keepalive(60_000);
        cx.handle_signal(Signal::Keepalive).await;
        cx.handle_signal(Signal::Keepalive).await;
        let pings: Vec<_> = pilot
            .outbound()
            .into_iter()
            .filter(|p| p.kind == PacketType::Ping)
            .collect();
        assert_eq!(pings.len(), 1);
        assert_eq!(pings[0].data, json!("keepalive"));
    }

    #[test]
    fn backspace_outside_inputs_is_suppressed() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let div = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        let input = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("input"));
        let key = KeyEvent::new(KEY_BACKSPACE, Modifiers::NONE);
        let event = cx.fire(div, key.to_event("keydown")).unwrap();
        assert!(event.is_default_prevented());
        let event = cx.fire(input, key.to_event("keydown")).unwrap();
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn context_menu_suppressed_unless_debug() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let root = cx.dom.app_root();
        assert!(cx.fire(root, Event::new("contextmenu")).unwrap().is_default_prevented());
        let mut pilot = Pilot::with_config(ClientConfig::new("p").with_debug(true));
        let cx = pilot.client_mut();
        let root = cx.dom.app_root();
        assert!(!cx.fire(root, Event::new("contextmenu")).unwrap().is_default_prevented());
    }
}
