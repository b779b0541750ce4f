//! Meta widgets: widgets whose real element lives elsewhere in the document.
//!
//! The handle of a meta widget is a placeholder comment. Its real element
//! (a `<style>`, `<link>` or `<script>`) is rendered under an anchor such as
//! the document head and owned as the `real` ancillary, so it follows the
//! widget through detach, reattach and destroy.

use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::Result;
use crate::util;
use crate::widget::{Ancillary, Behavior, Class, Super, WidgetKey};

/// The real element of a meta widget.
pub trait RealElement: 'static {
    /// Where the real element is placed.
    fn anchor(&self, cx: &Client) -> NodeId;

    fn render_real(&self, cx: &mut Client, key: WidgetKey) -> Result<NodeId>;
}

/// Behavior for a meta widget with real element `R`.
pub struct Meta<R>(pub R);

impl<R: RealElement> Behavior for Meta<R> {
    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        cx.remove_ancillary(key, "real")?;
        let real = self.0.render_real(cx, key)?;
        let id = cx.sub_id(key, "real").unwrap_or_default();
        if let Some(data) = cx.dom.get_mut(real) {
            data.id = Some(id);
        }
        let anchor = self.0.anchor(cx);
        cx.dom.append(anchor, real);
        cx.set_ancillary(key, "real", Ancillary::Element { node: real, home: None })?;
        let id = cx.node(key)?.id().to_owned();
        Ok(cx.dom.create(NodeData::comment(format!(" {id} "))))
    }
}

/// Abstract parent of the meta widgets.
pub fn meta_class(base: &Rc<Class>) -> Rc<Class> {
    base.extend("MetaWidget").build()
}

impl Client {
    /// The real element of a meta widget.
    pub fn real_element(&self, key: WidgetKey) -> Option<NodeId> {
        self.ancillary_node(key, "real")
    }
}

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// A style sheet: inline `<style>` text, or a `<link>` when `src` is set.
struct StyleElement;

impl RealElement for StyleElement {
    fn anchor(&self, cx: &Client) -> NodeId {
        cx.dom.head()
    }

    fn render_real(&self, cx: &mut Client, key: WidgetKey) -> Result<NodeId> {
        if cx.has_state(key, "src") {
            cx.element(key, r#"<link type="text/css" rel="stylesheet"/>"#)
        } else {
            cx.element(key, "<style/>")
        }
    }
}

pub fn style_class(meta: &Rc<Class>) -> Rc<Class> {
    meta.extend("Style")
        .behavior(Meta(StyleElement))
        .setter("content", |cx, key, v, _| {
            cx.rerender(key)?;
            let text = util::as_text(v).unwrap_or_default();
            if let Some(real) = cx.real_element(key) {
                let text = cx.resolve_el(key, &text, '#');
                cx.dom.set_text(real, text);
            }
            Ok(())
        })
        .setter("src", |cx, key, v, _| {
            cx.rerender(key)?;
            let real = cx.real_element(key);
            cx.set_node_attr(real, "href", v);
            Ok(())
        })
        .build()
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

struct ScriptElement;

impl RealElement for ScriptElement {
    fn anchor(&self, cx: &Client) -> NodeId {
        cx.dom.body()
    }

    fn render_real(&self, cx: &mut Client, key: WidgetKey) -> Result<NodeId> {
        cx.element(key, "<script/>")
    }
}

struct ScriptBehavior;

impl Behavior for ScriptBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        let mut state = Map::new();
        state.insert("async".into(), json!(false));
        state.insert("defer".into(), json!(false));
        cx.init_state(key, state, false)
    }

    fn render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<NodeId> {
        Meta(ScriptElement).render(cx, key, sup)
    }
}

fn real_attr(name: &'static str) -> impl Fn(&mut Client, WidgetKey, &Value, Option<&Value>) -> Result<()> {
    move |cx, key, v, _| {
        let real = cx.real_element(key);
        cx.set_node_attr(real, name, v);
        Ok(())
    }
}

pub fn script_class(meta: &Rc<Class>) -> Rc<Class> {
    meta.extend("Script")
        .behavior(ScriptBehavior)
        .setter("async", real_attr("async"))
        .setter("content", |cx, key, v, _| {
            let text = util::as_text(v).unwrap_or_default();
            if let Some(real) = cx.real_element(key) {
                let text = cx.resolve_el(key, &text, '#');
                cx.dom.set_text(real, text);
            }
            Ok(())
        })
        .setter("defer", real_attr("defer"))
        .setter("src", real_attr("src"))
        .setter("type", real_attr("type"))
        .build()
}
