//! Widget registry and module loading.
//!
//! The [`Registry`] is the arena that owns every live [`WidgetNode`] and the
//! map from protocol ids to widget keys. Widget classes come from modules,
//! fetched on demand through a [`ModuleLoader`] and cached in a
//! [`ModuleCache`]. Classes may also be added to a module directly as
//! add-ons, without loading it.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use slotmap::SlotMap;

use crate::action::{GlobalFn, Namespace};
use crate::client::Client;
use crate::error::{Error, Result};
use crate::widget::{Class, Props, WidgetKey, WidgetNode};

/// Module providing the built-in widget classes.
pub const BUILTIN_MODULE: &str = "widgets";

/// Prefix of generated widget ids.
const ID_PREFIX: &str = "_sw_";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Live widgets, keyed by arena key and by protocol id.
#[derive(Debug, Default)]
pub struct Registry {
    widgets: SlotMap<WidgetKey, WidgetNode>,
    ids: HashMap<String, WidgetKey>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a widget without making it findable by id.
    pub(crate) fn insert(&mut self, node: WidgetNode) -> WidgetKey {
        self.widgets.insert(node)
    }

    /// Make `key` findable by its id.
    pub(crate) fn register(&mut self, key: WidgetKey) -> Result<()> {
        let id = self.widgets.get(key).ok_or(Error::Stale)?.id().to_owned();
        match self.ids.get(&id) {
            Some(existing) if *existing != key => Err(Error::DuplicateId(id)),
            _ => {
                self.ids.insert(id, key);
                Ok(())
            }
        }
    }

    pub(crate) fn unregister(&mut self, key: WidgetKey) {
        if let Some(node) = self.widgets.get(key) {
            if self.ids.get(node.id()) == Some(&key) {
                self.ids.remove(node.id());
            }
        }
    }

    /// Drop a widget from the arena, unregistering it first.
    pub(crate) fn remove(&mut self, key: WidgetKey) -> Option<WidgetNode> {
        self.unregister(key);
        self.widgets.remove(key)
    }

    /// Widget registered under `id`. An unknown id is not an error.
    pub fn find(&self, id: &str) -> Option<WidgetKey> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, key: WidgetKey) -> Option<&WidgetNode> {
        self.widgets.get(key)
    }

    pub fn get_mut(&mut self, key: WidgetKey) -> Option<&mut WidgetNode> {
        self.widgets.get_mut(key)
    }

    pub fn contains(&self, key: WidgetKey) -> bool {
        self.widgets.contains_key(key)
    }

    /// Number of widgets in the arena.
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Ids of all registered widgets.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }

    /// A fresh id, never equal to one already registered.
    pub fn unique_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{ID_PREFIX}{}", self.next_id);
            if !self.ids.contains_key(&id) {
                return id;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A named bundle of widget classes and functions.
#[derive(Clone, Default)]
pub struct Module {
    name: String,
    classes: HashMap<String, Rc<Class>>,
    functions: Namespace,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a class under its own name (builder).
    pub fn with_class(mut self, class: Rc<Class>) -> Self {
        self.classes.insert(class.name().to_owned(), class);
        self
    }

    /// Add a function at a dotted path (builder).
    pub fn with_function(mut self, path: &str, f: Rc<GlobalFn>) -> Self {
        self.functions.define(path, f);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self, name: &str) -> Option<Rc<Class>> {
        self.classes.get(name).cloned()
    }

    pub fn functions(&self) -> &Namespace {
        &self.functions
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut classes: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        classes.sort_unstable();
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("classes", &classes)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ModuleLoader
// ---------------------------------------------------------------------------

/// Resolves module names to modules, possibly asynchronously.
#[async_trait(?Send)]
pub trait ModuleLoader {
    async fn load(&self, name: &str) -> Result<Rc<Module>>;
}

/// Loader serving modules from memory, optionally after a delay.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    modules: HashMap<String, Rc<Module>>,
    delay: Option<Duration>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader serving the built-in widget module.
    pub fn with_builtins() -> Self {
        Self::new().with_module(crate::widgets::module())
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.insert(module.name().to_owned(), Rc::new(module));
        self
    }

    /// Delay every load, simulating a network fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait(?Send)]
impl ModuleLoader for MemoryLoader {
    async fn load(&self, name: &str) -> Result<Rc<Module>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(name.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// ModuleCache
// ---------------------------------------------------------------------------

/// Loaded modules plus add-on classes.
pub struct ModuleCache {
    loader: Rc<dyn ModuleLoader>,
    loaded: HashMap<String, Rc<Module>>,
    addons: HashMap<String, HashMap<String, Rc<Class>>>,
}

impl ModuleCache {
    pub fn new(loader: Rc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            loaded: HashMap::new(),
            addons: HashMap::new(),
        }
    }

    /// The module named `name`, loading it on first use.
    pub async fn load(&mut self, name: &str) -> Result<Rc<Module>> {
        if let Some(module) = self.loaded.get(name) {
            return Ok(Rc::clone(module));
        }
        tracing::debug!(module = name, "loading module");
        let loader = Rc::clone(&self.loader);
        let module = loader.load(name).await?;
        self.loaded.insert(name.to_owned(), Rc::clone(&module));
        Ok(module)
    }

    /// The module named `name`, if already loaded.
    pub fn cached(&self, name: &str) -> Option<Rc<Module>> {
        self.loaded.get(name).cloned()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Class `class` of `module`, from add-ons or an already loaded module.
    pub fn class(&self, module: &str, class: &str) -> Option<Rc<Class>> {
        self.addons
            .get(module)
            .and_then(|classes| classes.get(class))
            .cloned()
            .or_else(|| self.loaded.get(module)?.class(class))
    }

    pub fn add_class(&mut self, module: &str, class: Rc<Class>) {
        self.addons
            .entry(module.to_owned())
            .or_default()
            .insert(class.name().to_owned(), class);
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

impl Client {
    /// Create a widget, loading its module first if needed.
    pub async fn create(
        &mut self,
        parent: Option<WidgetKey>,
        mut props: Props,
        state: Option<Map<String, Value>>,
    ) -> Result<WidgetKey> {
        let module = props.wmodule.get_or_insert_with(|| BUILTIN_MODULE.to_owned()).clone();
        if self.modules.class(&module, &props.wclass).is_none() {
            self.modules.load(&module).await?;
        }
        self.create_now(parent, props, state)
    }

    /// Create a widget whose class is already available, without suspending.
    pub fn create_now(
        &mut self,
        parent: Option<WidgetKey>,
        mut props: Props,
        state: Option<Map<String, Value>>,
    ) -> Result<WidgetKey> {
        let module = props.wmodule.get_or_insert_with(|| BUILTIN_MODULE.to_owned()).clone();
        let class = self
            .modules
            .class(&module, &props.wclass)
            .ok_or_else(|| Error::UnknownClass {
                module: module.clone(),
                class: props.wclass.clone(),
            })?;
        if props.id.is_none() {
            props.id = Some(self.registry.unique_id());
        }
        self.construct(class, parent, props, state.unwrap_or_default())
    }

    /// Register `class` into `module` without loading the module.
    pub fn addon(&mut self, module: &str, class: Rc<Class>) {
        self.modules.add_class(module, class);
    }
}
