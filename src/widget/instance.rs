//! Widget instances: properties, state, tree links and per-class extension data.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::class::Class;
use super::lifecycle::Lifecycle;
use super::WidgetKey;
use crate::dom::NodeId;

/// Prefix of the CSS class derived from a widget's class name.
pub const CLASS_PREFIX: &str = "sw_";

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// Creation-time properties sent by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the widget class.
    pub wclass: String,
    /// Module providing the class; the built-in module when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wmodule: Option<String>,
    /// Whether the widget may hold children.
    #[serde(default)]
    pub cntr: bool,
    /// Whether the widget starts a namespace for name lookups.
    #[serde(default)]
    pub nmsp: bool,
    /// CSS class override; derived from `wclass` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wclazz: Option<String>,
    /// Any further properties, kept for the class to read.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Props {
    pub fn new(wclass: impl Into<String>) -> Self {
        Self {
            wclass: wclass.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.wmodule = Some(module.into());
        self
    }

    /// Mark the widget as a container (builder).
    pub fn container(mut self) -> Self {
        self.cntr = true;
        self
    }

    /// Mark the widget as a namespace root (builder).
    pub fn namespace(mut self) -> Self {
        self.nmsp = true;
        self
    }

    pub fn with_prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(name.to_owned(), value.into());
        self
    }

    /// CSS class for the widget.
    pub fn wclazz(&self) -> String {
        self.wclazz
            .clone()
            .unwrap_or_else(|| format!("{CLASS_PREFIX}{}", self.wclass.to_lowercase()))
    }
}

// ---------------------------------------------------------------------------
// Ancillary
// ---------------------------------------------------------------------------

/// An element or widget owned by a widget but living outside its handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ancillary {
    /// A bare element. `home` is where it was attached before a detach.
    Element { node: NodeId, home: Option<NodeId> },
    /// A whole widget.
    Widget { key: WidgetKey, home: Option<NodeId> },
}

// ---------------------------------------------------------------------------
// WidgetNode
// ---------------------------------------------------------------------------

/// A live widget instance, stored in the registry arena.
pub struct WidgetNode {
    id: String,
    class: Rc<Class>,
    props: Props,
    wclazz: String,
    pub(crate) state: IndexMap<String, Value>,
    pub(crate) parent: Option<WidgetKey>,
    pub(crate) children: Option<Vec<WidgetKey>>,
    pub(crate) handle: Option<NodeId>,
    pub(crate) ancillaries: IndexMap<String, Ancillary>,
    pub(crate) lifecycle: Lifecycle,
    ext: HashMap<TypeId, Box<dyn Any>>,
}

impl WidgetNode {
    pub(crate) fn new(id: String, class: Rc<Class>, props: Props, parent: Option<WidgetKey>) -> Self {
        let wclazz = props.wclazz();
        let children = props.cntr.then(Vec::new);
        Self {
            id,
            class,
            props,
            wclazz,
            state: IndexMap::new(),
            parent,
            children,
            handle: None,
            ancillaries: IndexMap::new(),
            lifecycle: Lifecycle::Unattached,
            ext: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn wclass(&self) -> &str {
        &self.props.wclass
    }

    pub fn wmodule(&self) -> Option<&str> {
        self.props.wmodule.as_deref()
    }

    pub fn wclazz(&self) -> &str {
        &self.wclazz
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    pub fn is_namespace(&self) -> bool {
        self.props.nmsp
    }

    pub fn state(&self) -> &IndexMap<String, Value> {
        &self.state
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn parent(&self) -> Option<WidgetKey> {
        self.parent
    }

    /// Children in order. Empty for non-containers.
    pub fn children(&self) -> &[WidgetKey] {
        self.children.as_deref().unwrap_or_default()
    }

    pub fn handle(&self) -> Option<NodeId> {
        self.handle
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn ancillary(&self, name: &str) -> Option<Ancillary> {
        self.ancillaries.get(name).copied()
    }

    /// Class-specific data of type `T`, if present.
    pub fn ext<T: 'static>(&self) -> Option<&T> {
        self.ext.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Class-specific data of type `T`, created on first access.
    pub fn ext_mut<T: Default + 'static>(&mut self) -> &mut T {
        let slot = self
            .ext
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("extension slot keyed by its own TypeId"),
        }
    }

    /// Remove and return class-specific data of type `T`.
    pub fn take_ext<T: 'static>(&mut self) -> Option<T> {
        let boxed = self.ext.remove(&TypeId::of::<T>())?;
        boxed.downcast().ok().map(|b: Box<T>| *b)
    }
}

impl std::fmt::Debug for WidgetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetNode")
            .field("id", &self.id)
            .field("wclass", &self.props.wclass)
            .field("lifecycle", &self.lifecycle)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn props_deserialize_with_extras() {
        let props: Props = serde_json::from_value(json!({
            "id": "btn1",
            "wclass": "Button",
            "cntr": false,
            "_maxsize": 10
        }))
        .unwrap();
        assert_eq!(props.id.as_deref(), Some("btn1"));
        assert_eq!(props.wclass, "Button");
        assert!(props.wmodule.is_none());
        assert!(!props.nmsp);
        assert_eq!(props.extra.get("_maxsize"), Some(&json!(10)));
    }

    #[test]
    fn props_require_wclass() {
        assert!(serde_json::from_value::<Props>(json!({"id": "x"})).is_err());
    }

    #[test]
    fn derived_css_class() {
        assert_eq!(Props::new("Textbox").wclazz(), "sw_textbox");
        let mut props = Props::new("Textbox");
        props.wclazz = Some("custom".into());
        assert_eq!(props.wclazz(), "custom");
    }

    #[test]
    fn container_flag_controls_children() {
        let class = Class::root("Div").build();
        let leaf = WidgetNode::new("a".into(), class.clone(), Props::new("Div"), None);
        assert!(!leaf.is_container());
        assert!(leaf.children().is_empty());
        let cntr = WidgetNode::new("b".into(), class, Props::new("Div").container(), None);
        assert!(cntr.is_container());
    }

    #[derive(Default, Debug, PartialEq)]
    struct Counter(u32);

    #[test]
    fn extension_slots() {
        let class = Class::root("Timer").build();
        let mut node = WidgetNode::new("t".into(), class, Props::new("Timer"), None);
        assert!(node.ext::<Counter>().is_none());
        node.ext_mut::<Counter>().0 += 2;
        assert_eq!(node.ext::<Counter>(), Some(&Counter(2)));
        assert_eq!(node.take_ext::<Counter>(), Some(Counter(2)));
        assert!(node.ext::<Counter>().is_none());
    }
}
