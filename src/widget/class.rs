//! Widget classes: single inheritance with super calls.
//!
//! A [`Class`] bundles three things a widget kind needs:
//!
//! - a [`Behavior`] implementing the render protocol hooks, where each hook
//!   receives a [`Super`] handle that runs the parent class's version;
//! - a table of named state **setters**, invoked by state dispatch;
//! - a table of named **methods**, invoked by server actions.
//!
//! Subclasses are derived with [`Class::extend`]. The parent's tables are
//! copied at extension time, so lookups never walk the chain. A table entry
//! added with a `*_with_super` builder receives the inherited entry as its
//! first argument. A plain entry that replaces an inherited one is recorded as
//! *shadowing* and, in debug builds, logged as a warning. Names ending in `_`
//! are private and never enter the tables.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::{Args, WidgetKey};
use crate::client::Client;
use crate::dom::NodeId;
use crate::error::{Error, Result};

/// A named widget method.
pub type MethodFn = dyn Fn(&mut Client, WidgetKey, Args) -> Result<Value>;

/// A state setter: `(client, widget, new value, previous value)`.
pub type SetterFn = dyn Fn(&mut Client, WidgetKey, &Value, Option<&Value>) -> Result<()>;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Render protocol hooks. Every hook defaults to its parent's version.
pub trait Behavior: 'static {
    fn init(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.init(cx, key)
    }

    /// Produce a fresh root element for the widget.
    fn render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<NodeId> {
        sup.render(cx, key)
    }

    fn before_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.before_render(cx, key)
    }

    fn after_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.after_render(cx, key)
    }

    /// Element that children's handles attach under.
    fn anchor(&self, cx: &Client, key: WidgetKey, sup: Super<'_>) -> Option<NodeId> {
        sup.anchor(cx, key)
    }

    fn detach(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.detach(cx, key)
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.destroy(cx, key)
    }

    fn on_add_child(&self, cx: &mut Client, key: WidgetKey, child: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.on_add_child(cx, key, child)
    }

    /// Called after `child` left this container. `anchor` is the element the
    /// child's handle was attached under.
    fn on_remove_child(
        &self,
        cx: &mut Client,
        key: WidgetKey,
        child: WidgetKey,
        destroyed: bool,
        anchor: Option<NodeId>,
        sup: Super<'_>,
    ) -> Result<()> {
        sup.on_remove_child(cx, key, child, destroyed, anchor)
    }
}

/// Behavior that adds nothing to its parent.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inherit;

impl Behavior for Inherit {}

/// Handle to the parent class's hooks.
#[derive(Clone, Copy)]
pub struct Super<'a> {
    parent: Option<&'a Class>,
}

impl Super<'_> {
    pub fn init(self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.init(cx, key),
            None => Ok(()),
        }
    }

    pub fn render(self, cx: &mut Client, key: WidgetKey) -> Result<NodeId> {
        match self.parent {
            Some(class) => class.render(cx, key),
            None => Err(Error::NoRenderer(cx.node(key)?.wclass().to_owned())),
        }
    }

    pub fn before_render(self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.before_render(cx, key),
            None => Ok(()),
        }
    }

    pub fn after_render(self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.after_render(cx, key),
            None => Ok(()),
        }
    }

    pub fn anchor(self, cx: &Client, key: WidgetKey) -> Option<NodeId> {
        match self.parent {
            Some(class) => class.anchor(cx, key),
            None => cx.handle(key),
        }
    }

    pub fn detach(self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.detach(cx, key),
            None => Ok(()),
        }
    }

    pub fn destroy(self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.destroy(cx, key),
            None => Ok(()),
        }
    }

    pub fn on_add_child(self, cx: &mut Client, key: WidgetKey, child: WidgetKey) -> Result<()> {
        match self.parent {
            Some(class) => class.on_add_child(cx, key, child),
            None => Ok(()),
        }
    }

    pub fn on_remove_child(
        self,
        cx: &mut Client,
        key: WidgetKey,
        child: WidgetKey,
        destroyed: bool,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        match self.parent {
            Some(class) => class.on_remove_child(cx, key, child, destroyed, anchor),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Class
// ---------------------------------------------------------------------------

/// A widget class.
pub struct Class {
    name: String,
    parent: Option<Rc<Class>>,
    behavior: Box<dyn Behavior>,
    setters: HashMap<String, Rc<SetterFn>>,
    methods: HashMap<String, Rc<MethodFn>>,
    fields: HashMap<String, Value>,
    shadowed: Vec<String>,
}

impl Class {
    /// Start a class with no parent.
    pub fn root(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), None)
    }

    /// Start a subclass of `self`.
    pub fn extend(self: &Rc<Self>, name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), Some(Rc::clone(self)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Class>> {
        self.parent.as_ref()
    }

    /// Whether this class is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.parent.as_ref().is_some_and(|p| p.is_a(name))
    }

    pub fn setter(&self, name: &str) -> Option<Rc<SetterFn>> {
        self.setters.get(name).cloned()
    }

    pub fn method(&self, name: &str) -> Option<Rc<MethodFn>> {
        self.methods.get(name).cloned()
    }

    /// A class-level constant.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Table entries that replaced an inherited entry without chaining to it.
    pub fn shadowed(&self) -> &[String] {
        &self.shadowed
    }

    fn sup(&self) -> Super<'_> {
        Super {
            parent: self.parent.as_deref(),
        }
    }

    pub fn init(&self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        self.behavior.init(cx, key, self.sup())
    }

    pub fn render(&self, cx: &mut Client, key: WidgetKey) -> Result<NodeId> {
        self.behavior.render(cx, key, self.sup())
    }

    pub fn before_render(&self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        self.behavior.before_render(cx, key, self.sup())
    }

    pub fn after_render(&self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        self.behavior.after_render(cx, key, self.sup())
    }

    pub fn anchor(&self, cx: &Client, key: WidgetKey) -> Option<NodeId> {
        self.behavior.anchor(cx, key, self.sup())
    }

    pub fn detach(&self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        self.behavior.detach(cx, key, self.sup())
    }

    pub fn destroy(&self, cx: &mut Client, key: WidgetKey) -> Result<()> {
        self.behavior.destroy(cx, key, self.sup())
    }

    pub fn on_add_child(&self, cx: &mut Client, key: WidgetKey, child: WidgetKey) -> Result<()> {
        self.behavior.on_add_child(cx, key, child, self.sup())
    }

    pub fn on_remove_child(
        &self,
        cx: &mut Client,
        key: WidgetKey,
        child: WidgetKey,
        destroyed: bool,
        anchor: Option<NodeId>,
    ) -> Result<()> {
        self.behavior
            .on_remove_child(cx, key, child, destroyed, anchor, self.sup())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("setters", &self.setters.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClassBuilder
// ---------------------------------------------------------------------------

/// Builder returned by [`Class::root`] and [`Class::extend`].
pub struct ClassBuilder {
    name: String,
    parent: Option<Rc<Class>>,
    behavior: Option<Box<dyn Behavior>>,
    setters: HashMap<String, Rc<SetterFn>>,
    methods: HashMap<String, Rc<MethodFn>>,
    fields: HashMap<String, Value>,
    shadowed: Vec<String>,
}

impl ClassBuilder {
    fn new(name: String, parent: Option<Rc<Class>>) -> Self {
        let (setters, methods, fields) = match &parent {
            Some(p) => (p.setters.clone(), p.methods.clone(), p.fields.clone()),
            None => Default::default(),
        };
        Self {
            name,
            parent,
            behavior: None,
            setters,
            methods,
            fields,
            shadowed: Vec::new(),
        }
    }

    /// Override protocol hooks.
    pub fn behavior(mut self, behavior: impl Behavior) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Add or replace a class-level constant.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        if accepts(name) {
            self.fields.insert(name.to_owned(), value.into());
        }
        self
    }

    /// Add or replace a setter without chaining to an inherited one.
    pub fn setter(
        mut self,
        name: &str,
        f: impl Fn(&mut Client, WidgetKey, &Value, Option<&Value>) -> Result<()> + 'static,
    ) -> Self {
        if accepts(name) {
            self.note_shadow(name, self.setters.contains_key(name));
            self.setters.insert(name.to_owned(), Rc::new(f));
        }
        self
    }

    /// Add a setter that receives the inherited setter (a no-op if none).
    pub fn setter_with_super(
        mut self,
        name: &str,
        f: impl Fn(&SetterFn, &mut Client, WidgetKey, &Value, Option<&Value>) -> Result<()> + 'static,
    ) -> Self {
        if accepts(name) {
            let inherited: Rc<SetterFn> = self
                .setters
                .get(name)
                .cloned()
                .unwrap_or_else(|| Rc::new(noop_setter));
            let wrapped = move |cx: &mut Client, key: WidgetKey, value: &Value, old: Option<&Value>| {
                f(&*inherited, cx, key, value, old)
            };
            self.setters.insert(name.to_owned(), Rc::new(wrapped));
        }
        self
    }

    /// Add or replace a method without chaining to an inherited one.
    pub fn method(
        mut self,
        name: &str,
        f: impl Fn(&mut Client, WidgetKey, Args) -> Result<Value> + 'static,
    ) -> Self {
        if accepts(name) {
            self.note_shadow(name, self.methods.contains_key(name));
            self.methods.insert(name.to_owned(), Rc::new(f));
        }
        self
    }

    /// Add a method that receives the inherited method (returning `null` if none).
    pub fn method_with_super(
        mut self,
        name: &str,
        f: impl Fn(&MethodFn, &mut Client, WidgetKey, Args) -> Result<Value> + 'static,
    ) -> Self {
        if accepts(name) {
            let inherited: Rc<MethodFn> = self
                .methods
                .get(name)
                .cloned()
                .unwrap_or_else(|| Rc::new(noop_method));
            let wrapped =
                move |cx: &mut Client, key: WidgetKey, args: Args| f(&*inherited, cx, key, args);
            self.methods.insert(name.to_owned(), Rc::new(wrapped));
        }
        self
    }

    fn note_shadow(&mut self, name: &str, inherited: bool) {
        if !inherited || self.parent.is_none() {
            return;
        }
        if cfg!(debug_assertions) {
            tracing::warn!(class = %self.name, member = name, "override does not call its inherited version");
        }
        self.shadowed.push(name.to_owned());
    }

    pub fn build(self) -> Rc<Class> {
        Rc::new(Class {
            name: self.name,
            parent: self.parent,
            behavior: self.behavior.unwrap_or_else(|| Box::new(Inherit)),
            setters: self.setters,
            methods: self.methods,
            fields: self.fields,
            shadowed: self.shadowed,
        })
    }
}

fn noop_setter(_: &mut Client, _: WidgetKey, _: &Value, _: Option<&Value>) -> Result<()> {
    Ok(())
}

fn noop_method(_: &mut Client, _: WidgetKey, _: Args) -> Result<Value> {
    Ok(Value::Null)
}

/// Names ending in `_` are private to the defining code.
fn accepts(name: &str) -> bool {
    if name.ends_with('_') {
        tracing::trace!(member = name, "skipping private member");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Rc<Class> {
        Class::root("Base")
            .field("kind", "base")
            .method("hello", |_, _, _| Ok(json!("base")))
            .setter("label", |_, _, _, _| Ok(()))
            .build()
    }

    #[test]
    fn extend_copies_tables() {
        let base = base();
        let child = base.extend("Child").build();
        assert!(child.method("hello").is_some());
        assert!(child.setter("label").is_some());
        assert_eq!(child.field("kind"), Some(&json!("base")));
        assert!(child.is_a("Base"));
        assert!(child.is_a("Child"));
        assert!(!base.is_a("Child"));
        assert_eq!(child.parent().map(|p| p.name()), Some("Base"));
    }

    #[test]
    fn private_members_are_skipped() {
        let class = Class::root("X")
            .method("helper_", |_, _, _| Ok(Value::Null))
            .setter("secret_", |_, _, _, _| Ok(()))
            .field("f_", 1)
            .build();
        assert!(class.method("helper_").is_none());
        assert!(class.setter("secret_").is_none());
        assert!(class.field("f_").is_none());
    }

    #[test]
    fn plain_override_is_shadowing() {
        let child = base()
            .extend("Child")
            .method("hello", |_, _, _| Ok(json!("child")))
            .method("fresh", |_, _, _| Ok(Value::Null))
            .build();
        assert_eq!(child.shadowed(), &["hello".to_owned()]);
    }

    #[test]
    fn super_override_is_not_shadowing() {
        let child = base()
            .extend("Child")
            .method_with_super("hello", |sup, cx, key, args| sup(cx, key, args))
            .setter_with_super("label", |sup, cx, key, v, old| sup(cx, key, v, old))
            .build();
        assert!(child.shadowed().is_empty());
    }

    #[test]
    fn root_overrides_never_shadow() {
        let class = Class::root("R")
            .method("a", |_, _, _| Ok(Value::Null))
            .method("a", |_, _, _| Ok(Value::Null))
            .build();
        assert!(class.shadowed().is_empty());
    }

    #[test]
    fn debug_names_class() {
        let s = format!("{:?}", base().extend("Child").build());
        assert!(s.contains("Child"));
        assert!(s.contains("Base"));
    }
}
