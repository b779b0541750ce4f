//! Server actions and the serial action processor.
//!
//! The server drives the client with action records `{tgt, fcn, arg}`. A
//! message carries one record or an array of them. Records are appended to
//! a FIFO queue and drained one at a time by [`Client::process_queue`]:
//!
//! - an action without `fcn` is skipped;
//! - `tgt` starting with `@` names a module, loaded (and awaited) before its
//!   function runs, so later actions wait for the load;
//! - any other `tgt` is a widget id, optionally followed by `-<sub>` to
//!   address an element inside the widget;
//! - without `tgt`, `fcn` is a dotted path into the global [`Namespace`].
//!
//! Arguments are resolved after the target: a single value becomes a
//! one-element list and widget references become live widgets. An error
//! aborts the drain, discards the rest of the queue and goes to the fatal
//! handler.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::Client;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::util;
use crate::widget::args::referenced_id;
use crate::widget::{widget_ref, Arg, Args, Props};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A single server instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcn: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub arg: Value,
}

impl Action {
    /// An action on a target.
    pub fn new(tgt: impl Into<String>, fcn: impl Into<String>, arg: Value) -> Self {
        Self {
            tgt: Some(tgt.into()),
            fcn: Some(fcn.into()),
            arg,
        }
    }

    /// An action resolved against the global namespace.
    pub fn global(fcn: impl Into<String>, arg: Value) -> Self {
        Self {
            tgt: None,
            fcn: Some(fcn.into()),
            arg,
        }
    }
}

/// Decode a message body holding one action or an array of them.
pub fn decode(text: &str) -> Result<Vec<Action>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Resolve a wire argument into positional arguments.
///
/// `null` means no arguments and any other non-array value is a single
/// argument. Widget references to unknown ids become `null`.
pub fn decode_args(function: &str, arg: &Value, registry: &Registry) -> Args {
    let items: Vec<Value> = match arg {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };
    let items = items
        .into_iter()
        .map(|value| match referenced_id(&value) {
            Some(id) => registry.find(id).map_or(Arg::Value(Value::Null), Arg::Widget),
            None => Arg::Value(value),
        })
        .collect();
    Args::new(function, items)
}

/// Encode arguments back to wire form. Widgets no longer in the registry
/// become `null`.
pub fn encode_args(args: &Args, registry: &Registry) -> Value {
    Value::Array(
        args.iter()
            .map(|arg| match arg {
                Arg::Value(v) => v.clone(),
                Arg::Widget(key) => registry
                    .get(*key)
                    .map_or(Value::Null, |w| widget_ref(w.id())),
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// A function callable from actions. It may suspend the action drain.
pub type GlobalFn = dyn for<'a> Fn(&'a mut Client, Args) -> LocalBoxFuture<'a, Result<Value>>;

/// Wrap an asynchronous function.
pub fn function<F>(f: F) -> Rc<GlobalFn>
where
    F: for<'a> Fn(&'a mut Client, Args) -> LocalBoxFuture<'a, Result<Value>> + 'static,
{
    Rc::new(f)
}

/// Wrap a synchronous function.
pub fn sync_function<F>(f: F) -> Rc<GlobalFn>
where
    F: Fn(&mut Client, Args) -> Result<Value> + 'static,
{
    function(move |cx, args| std::future::ready(f(cx, args)).boxed_local())
}

#[derive(Clone)]
enum Entry {
    Function(Rc<GlobalFn>),
    Namespace(Namespace),
}

/// A tree of named functions addressed by dotted paths.
#[derive(Clone, Default)]
pub struct Namespace {
    entries: HashMap<String, Entry>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `f` at `path`, creating intermediate namespaces.
    pub fn define(&mut self, path: &str, f: Rc<GlobalFn>) {
        let mut names: Vec<&str> = path.split('.').collect();
        let Some(last) = names.pop() else {
            return;
        };
        let mut current = self;
        for name in names {
            let entry = current
                .entries
                .entry(name.to_owned())
                .or_insert_with(|| Entry::Namespace(Namespace::new()));
            if let Entry::Function(_) = entry {
                *entry = Entry::Namespace(Namespace::new());
            }
            current = match entry {
                Entry::Namespace(ns) => ns,
                Entry::Function(_) => return,
            };
        }
        current.entries.insert(last.to_owned(), Entry::Function(f));
    }

    /// The function at `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<Rc<GlobalFn>> {
        let mut current = self;
        let mut names = path.split('.').peekable();
        while let Some(name) = names.next() {
            match (current.entries.get(name)?, names.peek()) {
                (Entry::Function(f), None) => return Some(Rc::clone(f)),
                (Entry::Namespace(ns), Some(_)) => current = ns,
                _ => return None,
            }
        }
        None
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Namespace").field("entries", &names).finish()
    }
}

/// The global namespace every client starts with.
pub fn builtins() -> Namespace {
    let mut ns = Namespace::new();
    ns.define(
        "widget.create",
        function(|cx, args| {
            async move {
                let parent = args.opt_widget(0);
                let props: Props = serde_json::from_value(Value::Object(
                    args.object(1).ok_or_else(|| args.invalid("props must be an object"))?,
                ))?;
                let key = cx.create(parent, props, args.object(2)).await?;
                Ok(cx.widget_id(key).map_or(Value::Null, Value::String))
            }
            .boxed_local()
        }),
    );
    ns.define(
        "widget.find",
        sync_function(|cx, args| {
            let id = args.str(0)?;
            Ok(cx.find(&id).map_or(Value::Null, |_| Value::String(id)))
        }),
    );
    for level in ["trace", "debug", "info", "warn", "error"] {
        ns.define(&format!("log.{level}"), sync_function(move |_, args| server_log(level, &args)));
    }
    ns.define(
        "ws.setKeepalive",
        sync_function(|cx, args| {
            let millis = args.opt_int(0).unwrap_or(0).max(0) as u64;
            cx.set_keepalive(millis);
            Ok(Value::Null)
        }),
    );
    ns.define(
        "ws.ping",
        sync_function(|cx, args| {
            cx.ping(args.value(0))?;
            Ok(Value::Null)
        }),
    );
    ns
}

/// Log a message on behalf of the server.
fn server_log(level: &str, args: &Args) -> Result<Value> {
    let text = args
        .iter()
        .map(|arg| match arg {
            Arg::Value(v) => util::as_text(v).unwrap_or_else(|| "null".to_owned()),
            Arg::Widget(key) => format!("{key:?}"),
        })
        .collect::<Vec<_>>()
        .join(" ");
    match level {
        "trace" => tracing::trace!(target: "statewire::server", "{text}"),
        "debug" => tracing::debug!(target: "statewire::server", "{text}"),
        "info" => tracing::info!(target: "statewire::server", "{text}"),
        "warn" => tracing::warn!(target: "statewire::server", "{text}"),
        _ => tracing::error!(target: "statewire::server", "{text}"),
    }
    Ok(Value::Null)
}

// ---------------------------------------------------------------------------
// ActionQueue
// ---------------------------------------------------------------------------

/// Pending actions and the drain guard.
#[derive(Debug, Default)]
pub struct ActionQueue {
    queue: VecDeque<Action>,
    processing: bool,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether a drain is in progress.
    pub fn is_processing(&self) -> bool {
        self.processing
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

/// Where an action's function is looked up.
enum Target {
    Global,
    Module(String),
    Widget(crate::widget::WidgetKey),
    Element(Option<NodeId>),
}

impl Client {
    /// Handle one inbound message.
    pub async fn receive(&mut self, text: &str) {
        self.transport.mark_received();
        tracing::debug!(message = text, "received");
        match decode(text) {
            Ok(actions) => self.submit(actions).await,
            Err(error) => self.fatal(&error),
        }
    }

    /// Append actions without draining.
    pub fn queue_action(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.actions.queue.extend(actions);
    }

    /// Append actions and drain the queue.
    pub async fn submit(&mut self, actions: impl IntoIterator<Item = Action>) {
        self.queue_action(actions);
        self.process_queue().await;
    }

    /// Drain the queue in order. A drain already in progress picks up
    /// anything appended to it, so a nested call returns immediately.
    pub async fn process_queue(&mut self) {
        if self.actions.processing {
            return;
        }
        self.actions.processing = true;
        while let Some(action) = self.actions.queue.pop_front() {
            if let Err(error) = self.process_action(action).await {
                let dropped = self.actions.queue.len();
                self.actions.queue.clear();
                self.actions.processing = false;
                tracing::debug!(dropped, "action drain aborted");
                self.fatal(&error);
                return;
            }
        }
        self.actions.processing = false;
    }

    /// Run one action.
    pub async fn process_action(&mut self, action: Action) -> Result<Value> {
        tracing::debug!(?action, "processing");
        let Some(fcn) = action.fcn.as_deref().filter(|f| !f.is_empty()) else {
            return Ok(Value::Null);
        };
        let target = match action.tgt.as_deref() {
            None | Some("") => Target::Global,
            Some(tgt) => match tgt.strip_prefix('@') {
                Some(module) => Target::Module(module.to_owned()),
                None => self.resolve_target(tgt)?,
            },
        };
        let unknown = || Error::UnknownFunction {
            target: action.tgt.clone().unwrap_or_default(),
            function: fcn.to_owned(),
        };
        match target {
            Target::Global => {
                let f = self.globals.resolve(fcn).ok_or_else(unknown)?;
                let args = decode_args(fcn, &action.arg, &self.registry);
                f(self, args).await
            }
            Target::Module(name) => {
                let module = self.modules.load(&name).await?;
                let f = module.functions().resolve(fcn).ok_or_else(unknown)?;
                let args = decode_args(fcn, &action.arg, &self.registry);
                f(self, args).await
            }
            Target::Widget(key) => {
                let args = decode_args(fcn, &action.arg, &self.registry);
                self.invoke(key, fcn, args)
            }
            Target::Element(node) => {
                let args = decode_args(fcn, &action.arg, &self.registry);
                match node {
                    Some(node) => self.invoke_element(node, fcn, &args),
                    None if ELEMENT_FUNCTIONS.contains(&fcn) => Ok(Value::Null),
                    None => Err(unknown()),
                }
            }
        }
    }

    /// `id` or `id-sub`. The widget must exist; a missing sub-element is
    /// tolerated.
    fn resolve_target(&self, tgt: &str) -> Result<Target> {
        let (base, sub) = match tgt.find('-') {
            Some(i) if i > 0 => (&tgt[..i], Some(&tgt[i + 1..])),
            _ => (tgt, None),
        };
        let key = self
            .find(base)
            .ok_or_else(|| Error::UnknownTarget(tgt.to_owned()))?;
        Ok(match sub {
            Some(sub) => Target::Element(self.sub(key, sub)),
            None => Target::Widget(key),
        })
    }

    /// Functions callable on a sub-element.
    fn invoke_element(&mut self, node: NodeId, fcn: &str, args: &Args) -> Result<Value> {
        let classes = |i: usize| args.opt_str(i).unwrap_or_default();
        match fcn {
            "text" => match args.get(0) {
                Some(Arg::Value(v)) => {
                    let text = util::as_text(v).unwrap_or_default();
                    self.dom.set_text(node, text);
                    Ok(Value::Null)
                }
                _ => Ok(Value::String(self.dom.text_content(node))),
            },
            "attr" => {
                let name = args.str(0)?;
                if args.len() < 2 {
                    return Ok(self
                        .dom
                        .get(node)
                        .and_then(|d| d.attr(&name))
                        .map_or(Value::Null, Value::String));
                }
                let value = util::as_text(&args.value(1));
                if let Some(data) = self.dom.get_mut(node) {
                    data.set_attr(&name, value);
                }
                Ok(Value::Null)
            }
            "removeAttr" => {
                let name = args.str(0)?;
                if let Some(data) = self.dom.get_mut(node) {
                    for name in util::string_to_set(&name) {
                        data.set_attr(name, None);
                    }
                }
                Ok(Value::Null)
            }
            "addClass" | "removeClass" | "toggleClass" => {
                let names = classes(0);
                let add = match fcn {
                    "addClass" => Some(true),
                    "removeClass" => Some(false),
                    _ => args.opt_bool(1),
                };
                if let Some(data) = self.dom.get_mut(node) {
                    for class in util::string_to_set(&names) {
                        data.toggle_class(class, add);
                    }
                }
                Ok(Value::Null)
            }
            "show" | "hide" => {
                if let Some(data) = self.dom.get_mut(node) {
                    data.toggle_class("hidden", Some(fcn == "hide"));
                }
                Ok(Value::Null)
            }
            "remove" => {
                self.dom.remove(node);
                Ok(Value::Null)
            }
            "empty" => {
                self.dom.empty(node);
                Ok(Value::Null)
            }
            _ => Err(Error::UnknownFunction {
                target: self.element_id(node).unwrap_or_default(),
                function: fcn.to_owned(),
            }),
        }
    }
}

const ELEMENT_FUNCTIONS: &[&str] = &[
    "text",
    "attr",
    "removeAttr",
    "addClass",
    "removeClass",
    "toggleClass",
    "show",
    "hide",
    "remove",
    "empty",
];
