//! Input widgets.
//!
//! An input box keeps its `value` state in step with the input element as the
//! user types. `change` is fired on blur, or on every edit when `synced` is
//! set. Number boxes validate each edit locally: a rejected edit restores the
//! last accepted value and suppresses the DOM event.
//!
//! Validation is configured by class fields:
//!
//! | field          | meaning                                           |
//! |----------------|---------------------------------------------------|
//! | `_type`        | `type` attribute of the input element             |
//! | `_constraint`  | characters a key press may produce                |
//! | `_partial`     | incomplete entries accepted as-is (`"-"`, `"."`)  |
//! | `_min`, `_max` | range used when no `minvalue`/`maxvalue` state    |
//! | `_integer`     | reject fractional numbers                         |

use std::rc::Rc;

use serde_json::{json, Map, Value};

use crate::client::Client;
use crate::dom::NodeId;
use crate::error::Result;
use crate::event::{handler, Event, KeyEvent, Modifiers, KEY_ENTER};
use crate::util;
use crate::widget::{Behavior, Class, Super, WidgetKey};

/// Listener namespace for the input element handlers.
const INPUT_NS: &str = "inputbox";

// ---------------------------------------------------------------------------
// InputWidget
// ---------------------------------------------------------------------------

struct InputBehavior;

impl Behavior for InputBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        let mut state = Map::new();
        state.insert("readonly".into(), json!(false));
        cx.init_state(key, state, false)
    }
}

fn input_attr(name: &'static str) -> impl Fn(&mut Client, WidgetKey, &Value, Option<&Value>) -> Result<()> {
    move |cx, key, v, _| {
        let node = cx.input_node(key);
        cx.set_node_attr(node, name, v);
        Ok(())
    }
}

/// Abstract parent of widgets accepting user input.
pub fn input_class(ui: &Rc<Class>) -> Rc<Class> {
    ui.extend("InputWidget")
        .behavior(InputBehavior)
        .setter("maxlength", input_attr("maxlength"))
        .setter("maxvalue", input_attr("max"))
        .setter("minvalue", input_attr("min"))
        .setter("pattern", input_attr("pattern"))
        .setter("placeholder", input_attr("placeholder"))
        .setter("readonly", input_attr("readonly"))
        .setter("required", input_attr("required"))
        .setter("value", |cx, key, v, _| {
            let text = util::as_text(v).unwrap_or_default();
            cx.set_input_value(key, text);
            Ok(())
        })
        .build()
}

impl Client {
    /// Current value of the widget's input element.
    pub fn input_value(&self, key: WidgetKey) -> String {
        self.input_node(key)
            .and_then(|n| self.dom.get(n))
            .and_then(|d| d.value.clone())
            .unwrap_or_default()
    }

    fn set_input_value(&mut self, key: WidgetKey, value: String) {
        if let Some(data) = self.input_node(key).and_then(|n| self.dom.get_mut(n)) {
            data.value = Some(value);
        }
    }
}

// ---------------------------------------------------------------------------
// InputboxWidget
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InputboxState {
    synchronized: bool,
    changed: bool,
}

struct InputboxBehavior;

impl Behavior for InputboxBehavior {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)?;
        cx.node_mut(key)?.ext_mut::<InputboxState>();
        cx.forward_to_server(key, "change", true)?;
        cx.toggle_class(key, "sw_inputbox", Some(true))?;
        Ok(())
    }

    fn render(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<NodeId> {
        let span = cx.element(key, "<span/>")?;
        let input = cx.element(key, r#"<input id="${id}-inp" type="${_type}"/>"#)?;
        cx.dom.append(span, input);
        Ok(span)
    }

    fn after_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.after_render(cx, key)?;
        let Some(input) = cx.sub(key, "inp") else {
            return Ok(());
        };
        cx.on(input, &format!("input.{INPUT_NS}"), handler(move |cx, event| cx.handle_input(key, event)));
        cx.on(input, &format!("blur.{INPUT_NS}"), handler(move |cx, event| cx.handle_blur(key, event)));
        cx.on(
            input,
            &format!("keyup.{INPUT_NS}"),
            handler(move |cx, event| {
                if KeyEvent::from_event(event).is_some_and(|k| k.code == KEY_ENTER) {
                    cx.trigger(key, Event::new("enter"))?;
                }
                Ok(())
            }),
        );
        cx.on(
            input,
            &format!("keypress.{INPUT_NS}"),
            handler(move |cx, event| {
                cx.constrain_input(key, event);
                Ok(())
            }),
        );
        Ok(())
    }
}

/// Abstract parent of text-entry widgets.
pub fn inputbox_class(input: &Rc<Class>) -> Rc<Class> {
    input
        .extend("InputboxWidget")
        .behavior(InputboxBehavior)
        .field("_type", "text")
        .setter("synced", |cx, key, v, _| {
            cx.node_mut(key)?.ext_mut::<InputboxState>().synchronized = util::truthy(v);
            Ok(())
        })
        .method("clear", |cx, key, _| {
            cx.set_input_value(key, String::new());
            cx.set_state(key, "value", json!(""))?;
            Ok(Value::Null)
        })
        .build()
}

impl Client {
    fn handle_input(&mut self, key: WidgetKey, event: &mut Event) -> Result<()> {
        let value = self.input_value(key);
        if !value.is_empty() && !self.validate_input(key, &value) {
            event.stop();
            let previous = self
                .get_state(key, "value")
                .as_ref()
                .and_then(util::as_text)
                .unwrap_or_default();
            self.set_input_value(key, previous);
            return Ok(());
        }
        self.set_state(key, "value", json!(value))?;
        let state = self.node_mut(key)?.ext_mut::<InputboxState>();
        if state.synchronized {
            self.fire_changed(key)
        } else {
            state.changed = true;
            Ok(())
        }
    }

    fn handle_blur(&mut self, key: WidgetKey, event: &mut Event) -> Result<()> {
        let message = event
            .json("validationMessage")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_owned);
        let invalid = message.is_some();
        self.update_state(key, "balloon", message.map_or(Value::Null, Value::String), true)?;
        let changed = self.node(key)?.ext::<InputboxState>().is_some_and(|s| s.changed);
        if changed && !invalid {
            self.fire_changed(key)?;
        }
        Ok(())
    }

    fn fire_changed(&mut self, key: WidgetKey) -> Result<()> {
        self.node_mut(key)?.ext_mut::<InputboxState>().changed = false;
        let value = self.input_value(key);
        self.trigger(key, Event::new("change").with_field("value", json!(value)))?;
        Ok(())
    }

    /// Suppress key presses producing characters outside the class's
    /// `_constraint`.
    fn constrain_input(&self, key: WidgetKey, event: &mut Event) {
        let Some(allowed) = self
            .registry
            .get(key)
            .and_then(|n| n.class().field("_constraint"))
            .and_then(Value::as_str)
        else {
            return;
        };
        let Some(pressed) = KeyEvent::from_event(event) else {
            return;
        };
        let shortcut = pressed.modifiers.contains(Modifiers::CTRL)
            || pressed.modifiers.contains(Modifiers::ALT)
            || pressed.modifiers.contains(Modifiers::META);
        if let Some(ch) = pressed.ch.filter(|_| !shortcut) {
            if !allowed.contains(ch) {
                event.stop();
            }
        }
    }

    /// Whether `value` is acceptable to the widget's class. Classes without
    /// a `_partial` field accept anything.
    pub fn validate_input(&self, key: WidgetKey, value: &str) -> bool {
        let Some(node) = self.registry.get(key) else {
            return true;
        };
        let class = node.class();
        let Some(partial) = class.field("_partial").and_then(Value::as_array) else {
            return true;
        };
        if partial.iter().any(|p| p.as_str() == Some(value)) {
            return true;
        }
        let Ok(number) = value.parse::<f64>() else {
            return false;
        };
        if !number.is_finite() {
            return false;
        }
        if class.field("_integer").is_some_and(util::truthy) && number.fract() != 0.0 {
            return false;
        }
        let bound = |state: &str, field: &str| {
            node.get_state(state)
                .and_then(Value::as_f64)
                .or_else(|| class.field(field).and_then(Value::as_f64))
        };
        bound("minvalue", "_min").map_or(true, |min| number >= min)
            && bound("maxvalue", "_max").map_or(true, |max| number <= max)
    }
}

// ---------------------------------------------------------------------------
// Concrete boxes
// ---------------------------------------------------------------------------

pub fn textbox_class(inputbox: &Rc<Class>) -> Rc<Class> {
    inputbox
        .extend("Textbox")
        .setter("masked", |cx, key, v, _| {
            let kind = if util::truthy(v) {
                json!("password")
            } else {
                cx.class_of(key)?.field("_type").cloned().unwrap_or(Value::Null)
            };
            let node = cx.input_node(key);
            cx.set_node_attr(node, "type", &kind);
            Ok(())
        })
        .build()
}

/// Abstract parent of the numeric boxes.
pub fn numberbox_class(inputbox: &Rc<Class>) -> Rc<Class> {
    inputbox
        .extend("NumberboxWidget")
        .field("_constraint", "0123456789+-")
        .field("_partial", json!(["", "+", "-"]))
        .build()
}

pub fn integerbox_class(numberbox: &Rc<Class>) -> Rc<Class> {
    numberbox
        .extend("Integerbox")
        .field("_min", i64::from(i32::MIN))
        .field("_max", i64::from(i32::MAX))
        .field("_integer", true)
        .build()
}

pub fn doublebox_class(numberbox: &Rc<Class>) -> Rc<Class> {
    numberbox
        .extend("Doublebox")
        .field("_constraint", "0123456789+-.")
        .field("_partial", json!(["", "+", "-", ".", "+.", "-."]))
        .field("_min", -f64::MAX)
        .field("_max", f64::MAX)
        .build()
}
