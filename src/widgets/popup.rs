//! Popups and the open-popup set.
//!
//! A popup's handle is an empty placeholder; what the user sees is its real
//! element, a hidden `<div data-sw-popup>` under the application root that
//! also anchors the popup's children. Opening a popup relates it to another
//! widget; a click anywhere outside open popups closes them.

use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::{json, Value};

use super::TagRenderer;
use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::Result;
use crate::event::{handler, Event};
use crate::widget::{Ancillary, Behavior, Class, Super, WidgetKey};

/// Attribute marking the real element of a popup.
pub const POPUP_ATTR: &str = "data-sw-popup";

/// Popups currently open, in the order they were opened.
#[derive(Debug, Default)]
pub struct PopupManager {
    open: IndexSet<WidgetKey>,
}

impl PopupManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, key: WidgetKey) -> bool {
        self.open.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[derive(Debug, Default)]
struct PopupState {
    related: Option<NodeId>,
}

struct PopupBehavior;

impl Behavior for PopupBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<NodeId> {
        if cx.ancillary_node(key, "real").is_none() {
            let node = cx.node(key)?;
            let data = NodeData::new("div")
                .with_id(format!("{}-real", node.id()))
                .with_attr(POPUP_ATTR, "true")
                .with_classes(["hidden", node.wclazz()]);
            let app_root = cx.dom.app_root();
            let real = cx.dom.insert_child(app_root, data);
            cx.on(
                real,
                "click.popup",
                handler(|_, event| {
                    event.stop_propagation();
                    Ok(())
                }),
            );
            cx.set_ancillary(key, "real", Ancillary::Element { node: real, home: None })?;
        }
        TagRenderer("span").render(cx, key, sup)
    }

    fn anchor(&self, cx: &Client, key: WidgetKey, _sup: Super<'_>) -> Option<NodeId> {
        cx.ancillary_node(key, "real")
    }

    fn detach(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.close_popup(key, true, true)?;
        sup.detach(cx, key)
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.popups.open.shift_remove(&key);
        sup.destroy(cx, key)
    }
}

pub fn popup_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("Popup")
        .behavior(PopupBehavior)
        .method("open", |cx, key, args| {
            let related = args.opt_widget(0).and_then(|w| cx.handle(w));
            cx.open_popup(key, related, args.bool(1))?;
            Ok(Value::Null)
        })
        .method("close", |cx, key, args| {
            cx.close_popup(key, args.bool(0), args.bool(1))?;
            Ok(Value::Null)
        })
        .method("closePopups", |cx, key, args| {
            let within = match args.opt_widget(0) {
                Some(widget) => cx.handle(widget),
                None => cx.ancillary_node(key, "real"),
            };
            cx.close_popups(within)?;
            Ok(Value::Null)
        })
        .method("isOpen", |cx, key, _| Ok(json!(cx.popups.is_open(key))))
        .build()
}

impl Client {
    /// Show a popup related to `related`, closing popups that do not
    /// contain it. Reopening with the same relation does nothing.
    pub fn open_popup(&mut self, key: WidgetKey, related: Option<NodeId>, notself: bool) -> Result<()> {
        let current = self.node(key)?.ext::<PopupState>().and_then(|s| s.related);
        let is_open = self.popups.is_open(key);
        if is_open && (related.is_none() || related == current) {
            return Ok(());
        }
        self.close_popups(related)?;
        self.node_mut(key)?.ext_mut::<PopupState>().related = related;
        if let Some(data) = self.ancillary_node(key, "real").and_then(|r| self.dom.get_mut(r)) {
            data.remove_class("hidden");
        }
        self.popups.open.insert(key);
        tracing::debug!(popup = %self.node(key)?.id(), "popup opened");
        self.popup_trigger(key, "open", related, notself)
    }

    /// Hide a popup. Unless `notothers`, popups related to elements inside
    /// it are closed too.
    pub fn close_popup(&mut self, key: WidgetKey, notself: bool, notothers: bool) -> Result<()> {
        if self.popups.open.shift_remove(&key) {
            let related = self.node_mut(key)?.ext_mut::<PopupState>().related.take();
            if let Some(data) = self.ancillary_node(key, "real").and_then(|r| self.dom.get_mut(r)) {
                data.add_class("hidden");
            }
            self.popup_trigger(key, "close", related, notself)?;
        }
        if !notothers {
            let real = self.ancillary_node(key, "real");
            self.close_popups(real)?;
        }
        Ok(())
    }

    /// Close every open popup related to an element inside the popup that
    /// contains `within`; with no such popup, close them all.
    pub fn close_popups(&mut self, within: Option<NodeId>) -> Result<()> {
        let container = within.and_then(|n| self.enclosing_popup(n));
        let open: Vec<WidgetKey> = self.popups.open.iter().copied().collect();
        for popup in open {
            let related = self
                .registry
                .get(popup)
                .and_then(|n| n.ext::<PopupState>())
                .and_then(|s| s.related);
            let affected = match (container, related) {
                (None, _) => true,
                (Some(container), Some(related)) => related != container && self.dom.is_within(related, container),
                (Some(_), None) => false,
            };
            if affected {
                self.close_popup(popup, false, true)?;
            }
        }
        Ok(())
    }

    /// Open popups, oldest first.
    pub fn open_popups(&self) -> Vec<WidgetKey> {
        self.popups.open.iter().copied().collect()
    }

    fn enclosing_popup(&self, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.dom.ancestors(node))
            .find(|n| self.dom.get(*n).is_some_and(|d| d.attr(POPUP_ATTR).is_some()))
    }

    fn popup_trigger(&mut self, key: WidgetKey, which: &str, related: Option<NodeId>, notself: bool) -> Result<()> {
        let related = related.and_then(|n| self.widget_at(n));
        if !notself {
            let mut event = Event::new(which);
            if let Some(related) = related {
                event = event.with_field("relatedTarget", related);
            }
            self.trigger(key, event)?;
        }
        if let Some(related) = related {
            let event = Event::new(format!("popup{which}")).with_field("relatedTarget", key);
            self.trigger(related, event)?;
        }
        Ok(())
    }
}
