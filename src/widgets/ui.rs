//! UIWidget: the base of every visible widget.
//!
//! Adds CSS class management on top of the base protocol. The widget's own
//! classes live in the reserved `_clazz` state so that they survive a
//! rerender; the `clazz` state holds classes supplied by the server.

use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::Result;
use crate::event::{handler, KeyEvent};
use crate::util;
use crate::widget::{Ancillary, Behavior, Class, Super, WidgetKey};

/// Listener namespace of the key-capture handler.
const KEYCAPTURE_NS: &str = "keycapture";

struct UiBehavior;

impl Behavior for UiBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        let wclazz = cx.node(key)?.wclazz().to_owned();
        let mut state = Map::new();
        state.insert("_clazz".into(), json!(wclazz));
        state.insert("clazz".into(), json!(""));
        state.insert("visible".into(), json!(true));
        cx.init_state(key, state, false)
    }
}

/// Key chords captured by a widget.
#[derive(Debug, Default)]
struct KeyCapture(Vec<String>);

pub fn ui_class(base: &Rc<Class>) -> Rc<Class> {
    base.extend("UIWidget")
        .behavior(UiBehavior)
        .setter("balloon", |cx, key, v, _| {
            cx.set_balloon(key, v);
            Ok(())
        })
        .setter("badge", |cx, key, v, _| {
            cx.set_badge(key, v);
            Ok(())
        })
        .setter("clazz", |cx, key, v, old| {
            cx.apply_clazz(key, v, old);
            Ok(())
        })
        .setter("css", |cx, key, v, _| cx.set_inline_css(key, v))
        .setter("disabled", |cx, key, v, _| {
            let node = cx.input_node(key);
            cx.set_node_attr(node, "disabled", &json!(util::truthy(v)));
            Ok(())
        })
        .setter("hint", |cx, key, v, _| {
            let node = cx.input_node(key);
            cx.set_node_attr(node, "title", v);
            Ok(())
        })
        .setter("keycapture", |cx, key, v, _| cx.set_key_capture(key, v))
        .setter("style", |cx, key, v, _| {
            cx.set_handle_attr(key, "style", v);
            Ok(())
        })
        .setter("tabindex", |cx, key, v, _| {
            let node = cx.input_node(key);
            cx.set_node_attr(node, "tabindex", v);
            Ok(())
        })
        .setter("visible", |cx, key, v, _| {
            if let Some(data) = cx.handle(key).and_then(|h| cx.dom.get_mut(h)) {
                data.toggle_class("hidden", Some(!util::truthy(v)));
            }
            Ok(())
        })
        .method("toggleClass", |cx, key, args| {
            Ok(json!(cx.toggle_class(key, &args.str(0)?, args.opt_bool(1))?))
        })
        .method("replaceClass", |cx, key, args| {
            cx.replace_class(key, &args.str(0)?, &args.str(1)?)?;
            Ok(Value::Null)
        })
        .method("addMask", |cx, key, args| {
            cx.add_mask(key, args.opt_str(0).as_deref())?;
            Ok(Value::Null)
        })
        .method("removeMask", |cx, key, _| {
            cx.remove_mask(key)?;
            Ok(Value::Null)
        })
        .build()
}

impl Client {
    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    /// Add (`Some(true)`), remove (`Some(false)`) or flip (`None`) each of
    /// the whitespace-separated `classes`. The widget's own class list in
    /// `_clazz` is updated so it survives a rerender. Returns whether that
    /// list changed.
    pub fn toggle_class(&mut self, key: WidgetKey, classes: &str, add: Option<bool>) -> Result<bool> {
        let current = self
            .node(key)?
            .get_state("_clazz")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let mut words: Vec<String> = util::string_to_set(&current).into_iter().map(str::to_owned).collect();
        let handle = self.handle(key);
        let mut changed = false;
        for class in util::string_to_set(classes) {
            let exists = words.iter().any(|w| w == class);
            let remove = add.map_or(exists, |a| !a);
            if exists == remove {
                changed = true;
                if remove {
                    words.retain(|w| w != class);
                } else {
                    words.push(class.to_owned());
                }
            }
            if let Some(data) = handle.and_then(|h| self.dom.get_mut(h)) {
                data.toggle_class(class, Some(!remove));
            }
        }
        if changed {
            self.set_state(key, "_clazz", json!(words.join(" ")))?;
        }
        Ok(changed)
    }

    /// Remove `old` classes and add `new` ones.
    pub fn replace_class(&mut self, key: WidgetKey, old: &str, new: &str) -> Result<()> {
        self.toggle_class(key, old, Some(false))?;
        self.toggle_class(key, new, Some(true))?;
        Ok(())
    }

    /// Class name for a part of the widget: `<wclazz>-<sub>`.
    pub fn subclazz(&self, key: WidgetKey, sub: &str) -> String {
        let wclazz = self.registry.get(key).map(|n| n.wclazz()).unwrap_or_default();
        format!("{wclazz}-{sub}")
    }

    /// Put the widget's own classes and the server-supplied `value` on the
    /// handle, dropping the previously supplied ones. Classes added by the
    /// rendering itself are kept.
    fn apply_clazz(&mut self, key: WidgetKey, value: &Value, old: Option<&Value>) {
        let own = self
            .registry
            .get(key)
            .and_then(|n| n.get_state("_clazz"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let previous = old.and_then(util::as_text).unwrap_or_default();
        let extra = util::as_text(value).unwrap_or_default();
        if let Some(data) = self.handle(key).and_then(|h| self.dom.get_mut(h)) {
            for class in util::string_to_set(&previous) {
                data.remove_class(class);
            }
            for class in util::string_to_set(&own).into_iter().chain(util::string_to_set(&extra)) {
                data.add_class(class);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    /// The element receiving input attributes: the `inp` sub-component when
    /// the widget has one, else the handle.
    pub fn input_node(&self, key: WidgetKey) -> Option<NodeId> {
        self.sub(key, "inp").or_else(|| self.handle(key))
    }

    fn set_balloon(&mut self, key: WidgetKey, value: &Value) {
        let handle = self.handle(key);
        let text = util::as_text(value).filter(|t| !t.is_empty());
        let on = text.is_some();
        self.set_node_attr(handle, "data-balloon", &text.map_or(Value::Null, Value::String));
        self.set_node_attr(handle, "data-balloon-pos", &json!(if on { "right" } else { "" }));
        self.set_node_attr(handle, "data-balloon-visible", &json!(on));
        self.set_node_attr(handle, "data-balloon-length", &json!(if on { "fit" } else { "" }));
    }

    fn set_badge(&mut self, key: WidgetKey, value: &Value) {
        let Some(badge) = self.sub(key, "badge") else {
            return;
        };
        let text = util::as_text(value).unwrap_or_default();
        let number = value.as_f64().unwrap_or(0.0);
        self.dom.set_text(badge, text.clone());
        if let Some(data) = self.dom.get_mut(badge) {
            data.toggle_class("hidden", Some(text.is_empty()));
            data.toggle_class("badge-negative", Some(number < 0.0));
        }
    }

    /// Inline style sheet placed in the document head.
    fn set_inline_css(&mut self, key: WidgetKey, value: &Value) -> Result<()> {
        let Some(css) = util::as_text(value).filter(|t| !t.is_empty()) else {
            return self.remove_ancillary(key, "inline");
        };
        let css = self.resolve_el(key, &css, '#');
        match self.ancillary_node(key, "inline") {
            Some(style) => self.dom.set_text(style, css),
            None => {
                let id = self.sub_id(key, "inline").unwrap_or_default();
                let head = self.dom.head();
                let style = self
                    .dom
                    .insert_child(head, NodeData::new("style").with_id(id).with_text(css));
                self.set_ancillary(key, "inline", Ancillary::Element { node: style, home: None })?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Key capture
    // -----------------------------------------------------------------------

    fn set_key_capture(&mut self, key: WidgetKey, value: &Value) -> Result<()> {
        let chords: Vec<String> = util::as_text(value)
            .map(|t| util::string_to_set(&t).into_iter().map(str::to_owned).collect())
            .unwrap_or_default();
        let enabled = !chords.is_empty();
        self.node_mut(key)?.ext_mut::<KeyCapture>().0 = chords;
        let Some(handle) = self.handle(key) else {
            return Ok(());
        };
        let spec = format!("keydown.{KEYCAPTURE_NS}");
        self.off(handle, &spec);
        if enabled {
            self.on(
                handle,
                &spec,
                handler(move |cx, event| {
                    let Some(chord) = KeyEvent::from_event(event).map(KeyEvent::to_key_capture) else {
                        return Ok(());
                    };
                    let captured = cx
                        .registry
                        .get(key)
                        .and_then(|n| n.ext::<KeyCapture>())
                        .is_some_and(|k| k.0.contains(&chord));
                    if captured {
                        event.stop();
                        let mut capture = event.derive(KEYCAPTURE_NS);
                        cx.send_to_server(&mut capture, None)?;
                    }
                    Ok(())
                }),
            );
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mask
    // -----------------------------------------------------------------------

    /// Cover the widget with an overlay, optionally labelled.
    pub fn add_mask(&mut self, key: WidgetKey, label: Option<&str>) -> Result<()> {
        self.remove_mask(key)?;
        let Some(handle) = self.handle(key) else {
            return Ok(());
        };
        let id = self.sub_id(key, "mask").unwrap_or_default();
        let class = self.subclazz(key, "mask");
        let mask = self
            .dom
            .create(NodeData::new("div").with_id(id).with_class("sw-mask").with_class(class));
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            self.dom.insert_child(mask, NodeData::new("span").with_text(label));
        }
        self.dom.prepend(handle, mask);
        self.set_ancillary(key, "mask", Ancillary::Element { node: mask, home: None })
    }

    pub fn remove_mask(&mut self, key: WidgetKey) -> Result<()> {
        self.remove_ancillary(key, "mask")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Modifiers;
    use crate::testing::Pilot;
    use pretty_assertions::assert_eq;

    fn classes(pilot: &Pilot, id: &str) -> Vec<String> {
        pilot.client().dom().get(pilot.node(id)).unwrap().classes.clone()
    }

    #[tokio::test]
    async fn own_classes_survive_rerender() {
        let mut pilot = Pilot::new();
        let key = pilot.create("Div", "d1", json!({"clazz": "server"})).await;
        assert_eq!(classes(&pilot, "d1"), vec!["sw_div", "server"]);
        assert!(pilot.client_mut().toggle_class(key, "busy", None).unwrap());
        assert!(!pilot.client_mut().toggle_class(key, "busy", Some(true)).unwrap());
        pilot.client_mut().rerender(key).unwrap();
        assert_eq!(classes(&pilot, "d1"), vec!["sw_div", "busy", "server"]);
        pilot.client_mut().replace_class(key, "busy", "idle").unwrap();
        assert_eq!(
            pilot.client().get_state(key, "_clazz"),
            Some(json!("sw_div idle"))
        );
    }

    #[tokio::test]
    async fn visible_and_hint() {
        let mut pilot = Pilot::new();
        pilot.create("Div", "d1", json!({"hint": "tip"})).await;
        pilot.send(json!({"tgt": "d1", "fcn": "updateState", "arg": ["visible", false]})).await;
        assert!(classes(&pilot, "d1").contains(&"hidden".to_owned()));
        let data = pilot.client().dom().get(pilot.node("d1")).unwrap();
        assert_eq!(data.attr("title").as_deref(), Some("tip"));
    }

    #[tokio::test]
    async fn balloon_attributes() {
        let mut pilot = Pilot::new();
        let key = pilot.create("Div", "d1", json!({"balloon": "careful"})).await;
        let html = pilot.html_of("d1");
        assert!(html.contains(r#"data-balloon="careful""#));
        assert!(html.contains(r#"data-balloon-pos="right""#));
        pilot.client_mut().update_state(key, "balloon", Value::Null, true).unwrap();
        assert!(!pilot.html_of("d1").contains("data-balloon"));
    }

    #[tokio::test]
    async fn inline_css_lives_in_head() {
        let mut pilot = Pilot::new();
        let key = pilot.create("Div", "d1", json!({"css": "##{id} { color: red }"})).await;
        let style = pilot.node("d1-inline");
        let cx = pilot.client();
        assert_eq!(cx.dom().parent(style), Some(cx.dom().head()));
        assert_eq!(cx.dom().text_content(style), "#d1 { color: red }");
        pilot.client_mut().destroy(key).unwrap();
        assert!(!pilot.client().dom().contains(style));
    }

    #[tokio::test]
    async fn key_capture_forwards_matching_chords() {
        let mut pilot = Pilot::new();
        pilot.create("Div", "d1", json!({"keycapture": "^#83 #27"})).await;
        let save = KeyEvent::new(83, Modifiers::CTRL).to_event("keydown");
        let event = pilot.fire("d1", save);
        assert!(event.is_default_prevented());
        pilot.fire("d1", KeyEvent::new(65, Modifiers::NONE).to_event("keydown"));
        let sent = pilot.events_of("keycapture");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["keyCode"], json!(83));
        assert_eq!(sent[0]["ctrlKey"], json!(true));
    }

    #[tokio::test]
    async fn mask_overlay() {
        let mut pilot = Pilot::new();
        pilot.create("Div", "d1", json!({})).await;
        pilot.send(json!({"tgt": "d1", "fcn": "addMask", "arg": ["Loading"]})).await;
        let mask = pilot.node("d1-mask");
        assert_eq!(pilot.client().dom().parent(mask), Some(pilot.node("d1")));
        assert_eq!(pilot.text("d1-mask"), "Loading");
        assert!(pilot
            .client()
            .dom()
            .get(mask)
            .unwrap()
            .has_class("sw_div-mask"));
        pilot.send(json!({"tgt": "d1", "fcn": "removeMask"})).await;
        assert!(pilot.client().dom().query_by_id("d1-mask").is_none());
        assert!(pilot.fatal_messages().is_empty());
    }
}
