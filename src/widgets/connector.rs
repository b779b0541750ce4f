//! Connector: an element spliced between a container and one child.
//!
//! Containers whose children need a wrapping element (a table cell, a list
//! item) place the child in a connector rendered from arbitrary markup. The
//! connector lives and dies with its child.

use std::rc::Rc;

use serde_json::{Map, Value};

use crate::client::Client;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::registry::BUILTIN_MODULE;
use crate::widget::{base_class, Behavior, Class, Props, Super, WidgetKey};

/// Creation property holding the connector's markup.
const MARKUP_PROP: &str = "_dom";

struct ConnectorBehavior;

impl Behavior for ConnectorBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        let node = cx.node(key)?;
        let markup = node
            .props()
            .extra
            .get(MARKUP_PROP)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::NoRenderer(node.wclass().to_owned()))?;
        cx.element(key, &markup)
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        if let Some(&child) = cx.node(key)?.children().first() {
            cx.destroy(child)?;
        }
        sup.destroy(cx, key)
    }

    fn on_remove_child(
        &self,
        cx: &mut Client,
        key: WidgetKey,
        child: WidgetKey,
        destroyed: bool,
        anchor: Option<NodeId>,
        sup: Super<'_>,
    ) -> Result<()> {
        sup.on_remove_child(cx, key, child, destroyed, anchor)?;
        match cx.registry.get(key).and_then(|n| n.parent()) {
            Some(parent) => cx.remove_child(parent, key, true).map(|_| ()),
            None => Ok(()),
        }
    }
}

pub fn connector_class(base: &Rc<Class>) -> Rc<Class> {
    base.extend("Connector").behavior(ConnectorBehavior).build()
}

impl Client {
    /// Wrap `child` in a new top-level connector rendered from `markup`.
    /// The connector's id is the child's id with a `-cnc` suffix.
    pub fn connect(&mut self, markup: &str, child: WidgetKey) -> Result<WidgetKey> {
        let id = self.sub_id(child, "cnc").ok_or(Error::Stale)?;
        let class = self
            .modules
            .class(BUILTIN_MODULE, "Connector")
            .unwrap_or_else(|| connector_class(&base_class()));
        let props = Props::new("Connector")
            .with_id(id)
            .container()
            .with_prop(MARKUP_PROP, markup);
        let connector = self.construct(class, None, props, Map::new())?;
        self.add_child(connector, child, None)?;
        Ok(connector)
    }
}
