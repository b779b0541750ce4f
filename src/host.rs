//! Hosting foreign components inside a widget.
//!
//! A [`ComponentHost`] wraps an externally built component tree. The core
//! relies on three operations only: mount it into an element, invoke a named
//! function on its root component, and unmount it. Mounting is asynchronous,
//! so a `HostWidget` posts a [`Signal::Mount`] after rendering and buffers
//! every `invoke` until the mount has completed.

use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{Client, Signal};
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::registry::BUILTIN_MODULE;
use crate::util;
use crate::widget::{base_class, Behavior, Class, Super, WidgetKey};
use crate::widgets::{ui::ui_class, TagRenderer};

/// A foreign component tree living inside a widget's element.
#[async_trait(?Send)]
pub trait ComponentHost {
    /// Bootstrap the component into the element with id `element_id`.
    async fn mount(&mut self, element_id: &str) -> Result<()>;

    /// Call `function` on the root component.
    fn invoke(&mut self, function: &str, args: Vec<Value>) -> Result<Value>;

    fn unmount(&mut self);
}

/// Builds a host for the component at `src`.
pub trait HostFactory {
    fn create(&self, src: &str) -> Result<Box<dyn ComponentHost>>;
}

/// Factory used when no component framework is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl HostFactory for NoHost {
    fn create(&self, src: &str) -> Result<Box<dyn ComponentHost>> {
        Err(Error::Host(format!("no component host installed for '{src}'")))
    }
}

#[derive(Default)]
struct HostState {
    host: Option<Box<dyn ComponentHost>>,
    mounted: bool,
    queue: Vec<(String, Vec<Value>)>,
}

struct HostBehavior {
    factory: Rc<dyn HostFactory>,
}

impl Behavior for HostBehavior {
    fn render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<NodeId> {
        TagRenderer("div").render(cx, key, sup)
    }

    fn before_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.unmount_host(key);
        sup.before_render(cx, key)
    }

    fn after_render(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        sup.after_render(cx, key)?;
        let src = cx
            .get_state(key, "src")
            .and_then(|v| util::as_text(&v))
            .filter(|s| !s.is_empty());
        let Some(src) = src else {
            return Ok(());
        };
        let host = self.factory.create(&src)?;
        let node = cx.node_mut(key)?;
        let id = node.id().to_owned();
        node.ext_mut::<HostState>().host = Some(host);
        tracing::debug!(widget = %id, %src, "component host created");
        cx.post(Signal::Mount(id));
        Ok(())
    }

    fn destroy(&self, cx: &mut Client, key: WidgetKey, sup: Super<'_>) -> Result<()> {
        cx.unmount_host(key);
        sup.destroy(cx, key)
    }
}

/// The `HostWidget` class, creating hosts with `factory`.
pub fn host_class(ui: &Rc<Class>, factory: Rc<dyn HostFactory>) -> Rc<Class> {
    ui.extend("HostWidget")
        .behavior(HostBehavior { factory })
        .setter("src", |cx, key, _, _| cx.rerender(key))
        .method("invoke", |cx, key, args| {
            let function = args.str(0)?;
            let rest = (1..args.len()).map(|i| args.value(i)).collect();
            cx.invoke_host(key, &function, rest)
        })
        .build()
}

impl Client {
    /// Make `HostWidget` build its components with `factory`.
    pub fn set_component_host(&mut self, factory: Rc<dyn HostFactory>) {
        let ui = self
            .modules
            .class(BUILTIN_MODULE, "UIWidget")
            .unwrap_or_else(|| ui_class(&base_class()));
        self.addon(BUILTIN_MODULE, host_class(&ui, factory));
    }

    /// Call `function` on the hosted component, or buffer the call until it
    /// is mounted.
    pub fn invoke_host(&mut self, key: WidgetKey, function: &str, args: Vec<Value>) -> Result<Value> {
        let state = self.node_mut(key)?.ext_mut::<HostState>();
        if state.mounted {
            if let Some(host) = state.host.as_mut() {
                return host.invoke(function, args);
            }
        }
        state.queue.push((function.to_owned(), args));
        Ok(Value::Null)
    }

    pub fn is_host_mounted(&self, key: WidgetKey) -> bool {
        self.registry
            .get(key)
            .and_then(|n| n.ext::<HostState>())
            .is_some_and(|s| s.mounted)
    }

    fn unmount_host(&mut self, key: WidgetKey) {
        let Some(node) = self.registry.get_mut(key) else {
            return;
        };
        let state = node.ext_mut::<HostState>();
        if let Some(mut host) = state.host.take() {
            if state.mounted {
                host.unmount();
            }
        }
        state.mounted = false;
    }
}

/// Mount the component of host widget `id`, then run the calls buffered
/// while it was loading.
pub async fn mount(cx: &mut Client, id: &str) -> Result<()> {
    let Some(key) = cx.find(id) else {
        return Ok(());
    };
    let state = cx.node_mut(key)?.ext_mut::<HostState>();
    if state.mounted {
        return Ok(());
    }
    let Some(host) = state.host.as_mut() else {
        return Ok(());
    };
    host.mount(id).await?;
    let state = cx.node_mut(key)?.ext_mut::<HostState>();
    state.mounted = true;
    let queue = std::mem::take(&mut state.queue);
    tracing::debug!(widget = %id, buffered = queue.len(), "component mounted");
    for (function, args) in queue {
        cx.invoke_host(key, &function, args)?;
    }
    Ok(())
}
