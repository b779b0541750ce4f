//! The base render protocol.
//!
//! Every widget runs through the same sequence:
//!
//! - **construct**: initial state (with `statechange` forwarding on), the
//!   class `init` hook, the first render, registration;
//! - **rerender**: children are detached, a fresh handle is rendered, every
//!   stored state is re-applied through its setter, the new handle replaces
//!   the old one (or joins the parent on first render), children are
//!   reattached in order, then `after_render` runs;
//! - **detach / attach**: the handle and its ancillaries leave and rejoin
//!   the document without losing state;
//! - **destroy**: a child is removed through its parent; a parentless widget
//!   releases its children, ancillaries, handle and registry entry.
//!
//! State dispatch maps a state key to the class setter of the same name.
//! Keys starting with `_` are internal and have no setter.

use std::rc::Rc;

use serde_json::{json, Map, Value};

use super::class::{Behavior, Class, Super};
use super::instance::{Ancillary, Props, WidgetNode};
use super::lifecycle::Lifecycle;
use super::{widget_ref, Args, WidgetKey};
use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::{Error, Result};
use crate::event::{handler, Event, Handler};
use crate::util;

/// Listener namespace for server forwarding.
const FORWARD_NS: &str = "fwd";

// ---------------------------------------------------------------------------
// BaseWidget
// ---------------------------------------------------------------------------

struct BaseBehavior;

impl Behavior for BaseBehavior {
    fn detach(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<()> {
        cx.detach_base(key)
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, _sup: Super<'_>) -> Result<()> {
        cx.destroy_base(key)
    }
}

/// The root of every widget class: containment, state and lifecycle
/// methods, and the `content`, `forwarding` and `name` setters.
pub fn base_class() -> Rc<Class> {
    Class::root("BaseWidget")
        .behavior(BaseBehavior)
        .setter("content", |cx, key, v, _| cx.set_content(key, v))
        .setter("forwarding", |cx, key, v, _| {
            cx.restore_forwarding(key, v);
            Ok(())
        })
        .setter("name", |cx, key, v, _| {
            cx.set_handle_attr(key, "data-sw-name", v);
            Ok(())
        })
        .method("addChild", |cx, key, args| {
            let index = args.opt_int(1).and_then(|i| usize::try_from(i).ok());
            cx.add_child(key, args.widget(0)?, index)?;
            Ok(Value::Null)
        })
        .method("removeChild", |cx, key, args| {
            Ok(json!(cx.remove_child(key, args.widget(0)?, args.bool(1))?))
        })
        .method("destroy", |cx, key, _| cx.destroy(key).map(|()| Value::Null))
        .method("detach", |cx, key, _| cx.detach(key).map(|()| Value::Null))
        .method("rerender", |cx, key, _| cx.rerender(key).map(|()| Value::Null))
        .method("updateState", |cx, key, args| {
            Ok(json!(cx.update_state(key, &args.str(0)?, args.value(1), args.bool(2))?))
        })
        .method("setState", |cx, key, args| {
            Ok(json!(cx.set_state(key, &args.str(0)?, args.value(1))?))
        })
        .method("initState", |cx, key, args| {
            let state = args.object(0).unwrap_or_default();
            cx.init_state(key, state, args.bool(1))?;
            Ok(Value::Null)
        })
        .method("getState", |cx, key, args| {
            Ok(cx.get_state(key, &args.str(0)?).unwrap_or(Value::Null))
        })
        .method("hasState", |cx, key, args| Ok(json!(cx.has_state(key, &args.str(0)?))))
        .method("getChildCount", |cx, key, _| Ok(json!(cx.child_count(key))))
        .method("getChildIndex", |cx, key, args| {
            Ok(json!(cx.child_index(key, args.widget(0)?)))
        })
        .method("getIndex", |cx, key, _| Ok(json!(cx.index_of(key))))
        .method("getAncestor", |cx, key, args| {
            let found = cx.ancestor(key, &args.str(0)?, args.opt_str(1).as_deref());
            Ok(cx.reference(found))
        })
        .method("getNamespace", |cx, key, _| {
            let namespace = cx.namespace_of(key);
            Ok(cx.reference(Some(namespace)))
        })
        .method("findByName", |cx, key, args| {
            let found = cx.find_by_name(key, &args.str(0)?);
            Ok(cx.reference(found))
        })
        .method("swapChildren", |cx, key, args| {
            let index = |i: usize| {
                args.opt_int(i)
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| args.invalid(format!("argument {i} must be an index")))
            };
            cx.swap_children(key, index(0)?, index(1)?)?;
            Ok(Value::Null)
        })
        .method("trigger", |cx, key, args| {
            let event = Event::new(args.str(0)?).with_params(args.object(1).unwrap_or_default());
            cx.trigger(key, event)?;
            Ok(Value::Null)
        })
        .method("forwardToServer", |cx, key, args| {
            cx.forward_to_server(key, &args.str(0)?, !args.bool(1))?;
            Ok(Value::Null)
        })
        .build()
}

/// Listener that sends the event to the server.
pub fn forwarder() -> Handler {
    handler(|cx, event| cx.send_to_server(event, None))
}

fn forward_spec(types: &[&str]) -> String {
    types
        .iter()
        .map(|t| format!("{t}.{FORWARD_NS}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Client {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Instantiate `class`: initial state, `init`, first render, registration.
    pub(crate) fn construct(
        &mut self,
        class: Rc<Class>,
        parent: Option<WidgetKey>,
        props: Props,
        state: Map<String, Value>,
    ) -> Result<WidgetKey> {
        let id = match &props.id {
            Some(id) => id.clone(),
            None => self.registry.unique_id(),
        };
        if self.registry.find(&id).is_some() {
            return Err(Error::DuplicateId(id));
        }
        if let Some(parent) = parent {
            self.node(parent)?;
        }
        let mut node = WidgetNode::new(id, Rc::clone(&class), props, parent);
        node.state
            .insert("forwarding".into(), json!({"statechange": true}));
        let key = self.registry.insert(node);
        self.lifecycle.on_create(key);
        let built = self
            .init_state(key, state, true)
            .and_then(|()| class.init(self, key))
            .and_then(|()| self.rerender(key))
            .and_then(|()| self.registry.register(key));
        match built {
            Ok(()) => {
                tracing::debug!(id = %self.node(key)?.id(), class = class.name(), "created widget");
                Ok(key)
            }
            Err(error) => {
                self.abandon(key);
                Err(error)
            }
        }
    }

    /// Undo a partial construction.
    fn abandon(&mut self, key: WidgetKey) {
        if let Some(parent) = self.registry.get(key).and_then(WidgetNode::parent) {
            if let Some(children) = self.registry.get_mut(parent).and_then(|p| p.children.as_mut()) {
                children.retain(|c| *c != key);
            }
        }
        let _ = self.detach_ancillaries(key, true);
        if let Some(handle) = self.handle(key) {
            self.dom.remove(handle);
        }
        self.lifecycle.on_destroy(key);
        self.registry.remove(key);
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Render a fresh handle and re-apply all state. Nested calls while a
    /// render is in progress are ignored.
    pub fn rerender(&mut self, key: WidgetKey) -> Result<()> {
        let node = self.node_mut(key)?;
        if node.lifecycle.is_rendering() || node.lifecycle.is_destroyed() {
            return Ok(());
        }
        let previous = node.lifecycle;
        node.lifecycle = Lifecycle::Rendering;
        let result = self.render_pass(key);
        let attached = self
            .handle(key)
            .is_some_and(|h| self.dom.parent(h).is_some());
        if let Some(node) = self.registry.get_mut(key) {
            node.lifecycle = match (&result, previous) {
                (Ok(()), Lifecycle::Detached) if !attached => Lifecycle::Detached,
                (Ok(()), _) => Lifecycle::Rendered,
                (Err(_), previous) => previous,
            };
        }
        result?;
        self.class_of(key)?.after_render(self, key)?;
        self.lifecycle.on_render(key);
        Ok(())
    }

    fn render_pass(&mut self, key: WidgetKey) -> Result<()> {
        let children = self.node(key)?.children().to_vec();
        for child in &children {
            self.detach(*child)?;
        }
        let class = self.class_of(key)?;
        let old = self.handle(key);
        let handle = class.render(self, key)?;
        let id = self.node(key)?.id().to_owned();
        if let Some(data) = self.dom.get_mut(handle) {
            data.id = Some(id);
            data.widget = Some(key);
        }
        self.node_mut(key)?.handle = Some(handle);
        class.before_render(self, key)?;
        self.sync_state(key)?;
        match (old, self.node(key)?.parent) {
            (Some(old), _) => self.dom.replace_with(old, handle),
            (None, Some(parent)) => self.add_child(parent, key, None)?,
            (None, None) => {}
        }
        for child in children {
            self.attach(child, None)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Containment
    // -----------------------------------------------------------------------

    /// Move `child` under `parent` at `index` (appended when absent or out
    /// of range).
    pub fn add_child(&mut self, parent: WidgetKey, child: WidgetKey, index: Option<usize>) -> Result<()> {
        let node = self.node(parent)?;
        if !node.is_container() {
            return Err(Error::NotAContainer(node.id().to_owned()));
        }
        if !self.registry.contains(child) || child == parent || self.is_ancestor(child, parent) {
            return Err(Error::InvalidChild);
        }
        if let Some(old) = self.node(child)?.parent {
            self.remove_child(old, child, false)?;
        }
        let index = index.filter(|i| *i < self.child_count(parent));
        self.node_mut(child)?.parent = Some(parent);
        self.attach(child, index)?;
        if let Some(children) = self.node_mut(parent)?.children.as_mut() {
            match index {
                Some(i) => children.insert(i, child),
                None => children.push(child),
            }
        }
        self.class_of(parent)?.on_add_child(self, parent, child)
    }

    /// Take `child` out of `parent`, destroying or detaching it. Returns
    /// `false` if it was not a child.
    pub fn remove_child(&mut self, parent: WidgetKey, child: WidgetKey, destroy: bool) -> Result<bool> {
        let Some(index) = self.child_index(parent, child) else {
            return Ok(false);
        };
        let anchor = self.handle(child).and_then(|h| self.dom.parent(h));
        if let Some(children) = self.node_mut(parent)?.children.as_mut() {
            children.remove(index);
        }
        self.node_mut(child)?.parent = None;
        if destroy {
            self.destroy(child)?;
        } else {
            self.detach(child)?;
        }
        self.class_of(parent)?
            .on_remove_child(self, parent, child, destroy, anchor)?;
        Ok(true)
    }

    /// Insert the widget's handle under its parent's anchor, before the
    /// sibling at `index` when given, and restore its ancillaries.
    pub fn attach(&mut self, key: WidgetKey, index: Option<usize>) -> Result<()> {
        let node = self.node(key)?;
        let (Some(parent), Some(handle)) = (node.parent, node.handle) else {
            return Ok(());
        };
        let reference = index
            .and_then(|i| self.node(parent).ok()?.children().get(i).copied())
            .and_then(|sibling| self.handle(sibling))
            .filter(|r| *r != handle && self.dom.parent(*r).is_some());
        match reference {
            Some(reference) => self.dom.insert_before(reference, handle),
            None => {
                let class = self.class_of(parent)?;
                if let Some(anchor) = class.anchor(self, parent) {
                    self.dom.append(anchor, handle);
                }
            }
        }
        self.attach_ancillaries(key)?;
        let node = self.node_mut(key)?;
        if node.lifecycle == Lifecycle::Detached {
            node.lifecycle = Lifecycle::Rendered;
        }
        self.lifecycle.on_attach(key);
        Ok(())
    }

    /// Take the widget out of the document, keeping it alive.
    pub fn detach(&mut self, key: WidgetKey) -> Result<()> {
        match self.registry.get(key) {
            Some(node) => Rc::clone(node.class()).detach(self, key),
            None => Ok(()),
        }
    }

    pub(crate) fn detach_base(&mut self, key: WidgetKey) -> Result<()> {
        let Some(node) = self.registry.get_mut(key) else {
            return Ok(());
        };
        if node.lifecycle == Lifecycle::Rendered {
            node.lifecycle = Lifecycle::Detached;
        }
        if let Some(handle) = node.handle {
            self.dom.detach(handle);
        }
        self.detach_ancillaries(key, false)?;
        self.lifecycle.on_detach(key);
        Ok(())
    }

    /// Destroy the widget. A child is removed through its parent.
    pub fn destroy(&mut self, key: WidgetKey) -> Result<()> {
        match self.registry.get(key) {
            Some(node) if !node.lifecycle.is_destroyed() => Rc::clone(node.class()).destroy(self, key),
            _ => Ok(()),
        }
    }

    pub(crate) fn destroy_base(&mut self, key: WidgetKey) -> Result<()> {
        let Some(node) = self.registry.get(key) else {
            return Ok(());
        };
        match node.parent {
            Some(parent) => self.remove_child(parent, key, true).map(|_| ()),
            None => self.dispose(key),
        }
    }

    fn dispose(&mut self, key: WidgetKey) -> Result<()> {
        let node = self.node_mut(key)?;
        if node.lifecycle.is_destroyed() {
            return Ok(());
        }
        node.lifecycle = Lifecycle::Destroyed;
        let children = node.children().to_vec();
        for child in children {
            self.remove_child(key, child, true)?;
        }
        self.detach_ancillaries(key, true)?;
        if let Some(handle) = self.handle(key) {
            self.dom.remove(handle);
        }
        if self.page() == Some(key) {
            self.set_page(None);
        }
        self.lifecycle.on_destroy(key);
        if let Some(node) = self.registry.remove(key) {
            tracing::debug!(id = %node.id(), "destroyed widget");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ancillaries
    // -----------------------------------------------------------------------

    /// Record an element or widget owned by `key` outside its handle.
    pub fn set_ancillary(&mut self, key: WidgetKey, name: &str, ancillary: Ancillary) -> Result<()> {
        self.node_mut(key)?.ancillaries.insert(name.to_owned(), ancillary);
        Ok(())
    }

    /// Forget an ancillary, removing its element from the document.
    pub fn remove_ancillary(&mut self, key: WidgetKey, name: &str) -> Result<()> {
        match self.node_mut(key)?.ancillaries.shift_remove(name) {
            Some(Ancillary::Element { node, .. }) => {
                self.dom.remove(node);
            }
            Some(Ancillary::Widget { key, .. }) => self.destroy(key)?,
            None => {}
        }
        Ok(())
    }

    /// The element of a named element ancillary.
    pub fn ancillary_node(&self, key: WidgetKey, name: &str) -> Option<NodeId> {
        match self.registry.get(key)?.ancillary(name)? {
            Ancillary::Element { node, .. } => Some(node),
            Ancillary::Widget { key, .. } => self.handle(key),
        }
    }

    fn detach_ancillaries(&mut self, key: WidgetKey, destroy: bool) -> Result<()> {
        let Some(node) = self.registry.get_mut(key) else {
            return Ok(());
        };
        if destroy {
            let entries: Vec<Ancillary> = node.ancillaries.drain(..).map(|(_, a)| a).collect();
            for ancillary in entries {
                match ancillary {
                    Ancillary::Element { node, .. } => {
                        self.dom.remove(node);
                    }
                    Ancillary::Widget { key, .. } => self.destroy(key)?,
                }
            }
            return Ok(());
        }
        let names: Vec<String> = node.ancillaries.keys().cloned().collect();
        for name in names {
            let Some(ancillary) = self.registry.get(key).and_then(|n| n.ancillary(&name)) else {
                continue;
            };
            let updated = match ancillary {
                Ancillary::Element { node, home } => {
                    let home = self.dom.parent(node).or(home);
                    self.dom.detach(node);
                    Ancillary::Element { node, home }
                }
                Ancillary::Widget { key: widget, home } => {
                    let handle = self.handle(widget);
                    let home = handle.and_then(|h| self.dom.parent(h)).or(home);
                    if let Some(handle) = handle {
                        self.dom.detach(handle);
                    }
                    Ancillary::Widget { key: widget, home }
                }
            };
            self.node_mut(key)?.ancillaries.insert(name, updated);
        }
        Ok(())
    }

    fn attach_ancillaries(&mut self, key: WidgetKey) -> Result<()> {
        let entries: Vec<(String, Ancillary)> = self
            .node(key)?
            .ancillaries
            .iter()
            .map(|(n, a)| (n.clone(), *a))
            .collect();
        for (name, ancillary) in entries {
            let (node, home) = match ancillary {
                Ancillary::Element { node, home } => (Some(node), home),
                Ancillary::Widget { key, home } => (self.handle(key), home),
            };
            if let (Some(node), Some(home)) = (node, home) {
                self.dom.append(home, node);
            }
            let cleared = match ancillary {
                Ancillary::Element { node, .. } => Ancillary::Element { node, home: None },
                Ancillary::Widget { key, .. } => Ancillary::Widget { key, home: None },
            };
            self.node_mut(key)?.ancillaries.insert(name, cleared);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn get_state(&self, key: WidgetKey, name: &str) -> Option<Value> {
        self.registry.get(key)?.get_state(name).cloned()
    }

    /// Whether the state is present, non-null and not an empty string.
    pub fn has_state(&self, key: WidgetKey, name: &str) -> bool {
        match self.registry.get(key).and_then(|n| n.get_state(name)) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    /// Merge `state` into the widget's state without invoking setters.
    /// With `overwrite` unset, existing keys are kept.
    pub fn init_state(&mut self, key: WidgetKey, state: Map<String, Value>, overwrite: bool) -> Result<()> {
        let node = self.node_mut(key)?;
        for (name, value) in state {
            if overwrite || !node.state.contains_key(&name) {
                node.state.insert(name, value);
            }
        }
        Ok(())
    }

    /// Store a value. Returns whether it changed; a changed key moves to the
    /// end of the ordering.
    pub fn set_state(&mut self, key: WidgetKey, name: &str, value: Value) -> Result<bool> {
        let node = self.node_mut(key)?;
        if node.state.get(name).is_some_and(|old| util::values_equal(old, &value)) {
            return Ok(false);
        }
        node.state.shift_remove(name);
        node.state.insert(name.to_owned(), value);
        Ok(true)
    }

    /// Store a value and run its setter when it changed or a render is in
    /// progress. A change not coming from the server raises `statechange`.
    pub fn update_state(&mut self, key: WidgetKey, name: &str, value: Value, from_server: bool) -> Result<bool> {
        let old = self.get_state(key, name);
        let changed = self.set_state(key, name, value.clone())?;
        if changed || self.node(key)?.lifecycle.is_rendering() {
            self.apply_state(key, name, old)?;
            if changed && !from_server {
                self.state_changed(key, name, value)?;
            }
        }
        Ok(changed)
    }

    /// Run the setter for `name` with its stored value.
    pub fn apply_state(&mut self, key: WidgetKey, name: &str, old: Option<Value>) -> Result<()> {
        if name.starts_with('_') {
            return Ok(());
        }
        let node = self.node(key)?;
        let setter = node.class().setter(name).ok_or_else(|| Error::UnrecognizedState {
            wclass: node.wclass().to_owned(),
            key: name.to_owned(),
        })?;
        let value = node.get_state(name).cloned().unwrap_or(Value::Null);
        setter(self, key, &value, old.as_ref())
    }

    /// Run every stored state's setter, in order.
    pub fn sync_state(&mut self, key: WidgetKey) -> Result<()> {
        let names: Vec<String> = self.node(key)?.state.keys().cloned().collect();
        for name in names {
            self.apply_state(key, &name, None)?;
        }
        Ok(())
    }

    fn state_changed(&mut self, key: WidgetKey, name: &str, value: Value) -> Result<()> {
        let event = Event::new("statechange")
            .with_field("state", json!(name))
            .with_field("value", value);
        self.trigger(key, event).map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Run the listeners on the widget's handle. Does not bubble.
    pub fn trigger(&mut self, key: WidgetKey, mut event: Event) -> Result<Event> {
        if let Some(handle) = self.handle(key) {
            self.trigger_handler(handle, &mut event)?;
        }
        Ok(event)
    }

    /// Turn server forwarding of the given event types on or off.
    pub fn forward_to_server(&mut self, key: WidgetKey, types: &str, forward: bool) -> Result<()> {
        let types = util::string_to_set(types);
        let node = self.node_mut(key)?;
        let entry = node
            .state
            .entry("forwarding".to_owned())
            .or_insert_with(|| json!({}));
        if !entry.is_object() {
            *entry = json!({});
        }
        if let Value::Object(map) = entry {
            for kind in &types {
                if forward {
                    map.insert((*kind).to_owned(), Value::Bool(true));
                } else {
                    map.remove(*kind);
                }
            }
        }
        if let Some(handle) = node.handle {
            let spec = forward_spec(&types);
            self.off(handle, &spec);
            if forward {
                self.on(handle, &spec, forwarder());
            }
        }
        Ok(())
    }

    /// Event types currently forwarded to the server.
    pub fn forwarded(&self, key: WidgetKey) -> Vec<String> {
        match self.registry.get(key).and_then(|n| n.get_state("forwarding")) {
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, on)| util::truthy(on))
                .map(|(k, _)| k.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn restore_forwarding(&mut self, key: WidgetKey, value: &Value) {
        let Some(handle) = self.handle(key) else {
            return;
        };
        self.off(handle, &format!(".{FORWARD_NS}"));
        if let Value::Object(map) = value {
            let types: Vec<&str> = map
                .iter()
                .filter(|(_, on)| util::truthy(on))
                .map(|(k, _)| k.as_str())
                .collect();
            if !types.is_empty() {
                self.on(handle, &forward_spec(&types), forwarder());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Sub-components and attributes
    // -----------------------------------------------------------------------

    /// Id of a sub-component: `<id>-<sub>`.
    pub fn sub_id(&self, key: WidgetKey, sub: &str) -> Option<String> {
        Some(format!("{}-{sub}", self.registry.get(key)?.id()))
    }

    /// A sub-component element, looked up under the handle first and then
    /// in the whole document.
    pub fn sub(&self, key: WidgetKey, sub: &str) -> Option<NodeId> {
        let id = self.sub_id(key, sub)?;
        self.handle(key)
            .and_then(|h| self.dom.find_in(h, &id))
            .or_else(|| self.dom.query_by_id(&id))
    }

    /// Set an attribute from a state value: `null`, `false` and `""`
    /// remove it, `true` sets it to its own name.
    pub fn set_node_attr(&mut self, node: Option<NodeId>, name: &str, value: &Value) {
        let Some(data) = node.and_then(|n| self.dom.get_mut(n)) else {
            return;
        };
        match value {
            Value::Null | Value::Bool(false) => data.set_attr(name, None),
            Value::Bool(true) => data.set_flag(name, true),
            Value::String(s) if s.is_empty() => data.set_attr(name, None),
            other => data.set_attr(name, util::as_text(other)),
        }
    }

    /// [`set_node_attr`](Self::set_node_attr) on the widget's handle.
    pub fn set_handle_attr(&mut self, key: WidgetKey, name: &str, value: &Value) {
        let handle = self.handle(key);
        self.set_node_attr(handle, name, value);
    }

    fn set_content(&mut self, key: WidgetKey, value: &Value) -> Result<()> {
        let span = self.sub(key, "content");
        let text = util::as_text(value).filter(|t| !t.is_empty());
        match (text, span) {
            (None, Some(span)) => {
                self.dom.remove(span);
            }
            (None, None) => {}
            (Some(text), Some(span)) => self.dom.set_text(span, text),
            (Some(text), None) => {
                let Some(handle) = self.handle(key) else {
                    return Ok(());
                };
                let id = self.sub_id(key, "content").unwrap_or_default();
                self.dom.insert_child(handle, NodeData::new("span").with_id(id).with_text(text));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tree navigation
    // -----------------------------------------------------------------------

    pub fn child_count(&self, key: WidgetKey) -> usize {
        self.registry.get(key).map_or(0, |n| n.children().len())
    }

    pub fn child_index(&self, parent: WidgetKey, child: WidgetKey) -> Option<usize> {
        self.registry
            .get(parent)?
            .children()
            .iter()
            .position(|c| *c == child)
    }

    /// Position of the widget within its parent.
    pub fn index_of(&self, key: WidgetKey) -> Option<usize> {
        let parent = self.registry.get(key)?.parent?;
        self.child_index(parent, key)
    }

    pub fn children_of(&self, key: WidgetKey) -> Vec<WidgetKey> {
        self.registry
            .get(key)
            .map(|n| n.children().to_vec())
            .unwrap_or_default()
    }

    /// Run `f` on each child, in order.
    pub fn for_each_child(
        &mut self,
        key: WidgetKey,
        mut f: impl FnMut(&mut Client, WidgetKey) -> Result<()>,
    ) -> Result<()> {
        for child in self.children_of(key) {
            f(self, child)?;
        }
        Ok(())
    }

    /// Exchange two children and their handles.
    pub fn swap_children(&mut self, key: WidgetKey, first: usize, second: usize) -> Result<()> {
        let node = self.node_mut(key)?;
        let id = node.id().to_owned();
        let Some(children) = node.children.as_mut() else {
            return Err(Error::NotAContainer(id));
        };
        if first >= children.len() || second >= children.len() {
            return Err(Error::invalid_argument("swapChildren", format!("index out of range for {id}")));
        }
        children.swap(first, second);
        let (a, b) = (children[first], children[second]);
        if let (Some(ha), Some(hb)) = (self.handle(a), self.handle(b)) {
            self.dom.swap(ha, hb);
        }
        Ok(())
    }

    fn is_ancestor(&self, ancestor: WidgetKey, key: WidgetKey) -> bool {
        let mut current = self.registry.get(key).and_then(WidgetNode::parent);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.registry.get(k).and_then(WidgetNode::parent);
        }
        false
    }

    /// Nearest ancestor of class `wclass` in module `wmodule` (the widget's
    /// own module when `None`).
    pub fn ancestor(&self, key: WidgetKey, wclass: &str, wmodule: Option<&str>) -> Option<WidgetKey> {
        let node = self.registry.get(key)?;
        let wmodule = wmodule.or(node.wmodule()).map(str::to_owned);
        let mut current = node.parent;
        while let Some(k) = current {
            let n = self.registry.get(k)?;
            if n.wclass() == wclass && n.wmodule().map(str::to_owned) == wmodule {
                return Some(k);
            }
            current = n.parent;
        }
        None
    }

    /// The widget rooting the namespace that `key` belongs to: the nearest
    /// ancestor flagged as a namespace, or the top of the tree.
    pub fn namespace_of(&self, key: WidgetKey) -> WidgetKey {
        let mut current = key;
        while let Some(parent) = self.registry.get(current).and_then(WidgetNode::parent) {
            if self.registry.get(parent).is_some_and(WidgetNode::is_namespace) {
                return parent;
            }
            current = parent;
        }
        current
    }

    /// Widget whose `name` state equals `name`, searched depth-first through
    /// the namespace of `key`.
    pub fn find_by_name(&self, key: WidgetKey, name: &str) -> Option<WidgetKey> {
        let mut stack = vec![self.namespace_of(key)];
        while let Some(k) = stack.pop() {
            let node = self.registry.get(k)?;
            if node.get_state("name").and_then(Value::as_str) == Some(name) {
                return Some(k);
            }
            stack.extend(node.children().iter().rev());
        }
        None
    }

    /// `key` as a widget reference value, or `null`.
    pub fn reference(&self, key: Option<WidgetKey>) -> Value {
        key.and_then(|k| self.widget_id(k))
            .map_or(Value::Null, |id| widget_ref(&id))
    }

    /// Widget owning `node` or its nearest ancestor.
    pub fn widget_at(&self, node: NodeId) -> Option<WidgetKey> {
        self.dom.closest_widget(node).map(|(_, key)| key)
    }

    // -----------------------------------------------------------------------
    // Invocation
    // -----------------------------------------------------------------------

    /// Call a widget method by name; a setter name is called with the first
    /// argument as its value.
    pub fn invoke(&mut self, key: WidgetKey, function: &str, args: Args) -> Result<Value> {
        let class = self.class_of(key)?;
        if let Some(method) = class.method(function) {
            return method(self, key, args);
        }
        if let Some(setter) = class.setter(function) {
            setter(self, key, &args.value(0), None)?;
            return Ok(Value::Null);
        }
        Err(Error::UnknownFunction {
            target: self.widget_id(key).unwrap_or_default(),
            function: function.to_owned(),
        })
    }
}
