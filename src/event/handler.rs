//! Listener registration and dispatch.
//!
//! Listeners are stored per element in the DOM arena and keyed by event type
//! plus an optional namespace, written `type.namespace`. A spec string may name
//! several space-separated types; `.namespace` alone matches every type in
//! that namespace when removing.
//!
//! [`Client::fire`] delivers an event along the bubble path from the target
//! up to the document root. [`Client::trigger_handler`] runs only the
//! listeners of one element and never bubbles.

use std::fmt;
use std::rc::Rc;

use super::message::Event;
use crate::client::Client;
use crate::dom::{Dom, NodeId};
use crate::error::Result;

/// An event listener.
pub type Handler = Rc<dyn Fn(&mut Client, &mut Event) -> Result<()>>;

/// Wrap a closure as a [`Handler`].
pub fn handler(f: impl Fn(&mut Client, &mut Event) -> Result<()> + 'static) -> Handler {
    Rc::new(f)
}

/// A registered listener.
#[derive(Clone)]
pub struct Listener {
    pub kind: String,
    pub namespace: Option<String>,
    pub handler: Handler,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Split `"click.fwd change"` into `[("click", Some("fwd")), ("change", None)]`.
pub fn parse_spec(spec: &str) -> Vec<(&str, Option<&str>)> {
    spec.split_whitespace()
        .map(|word| match word.split_once('.') {
            Some((kind, ns)) => (kind, (!ns.is_empty()).then_some(ns)),
            None => (word, None),
        })
        .collect()
}

/// Compute the bubble path from `start` up to the root (inclusive).
///
/// Returns `[start, parent, grandparent, ..., root]`.
/// If `start` does not exist in the DOM, returns an empty vec.
pub fn bubble_path(dom: &Dom, start: NodeId) -> Vec<NodeId> {
    if !dom.contains(start) {
        return Vec::new();
    }
    let mut path = vec![start];
    path.extend(dom.ancestors(start));
    path
}

impl Client {
    /// Register `handler` on `node` for each type in `spec`.
    pub fn on(&mut self, node: NodeId, spec: &str, handler: Handler) {
        if !self.dom.contains(node) {
            return;
        }
        let Some(list) = self.dom.listeners.entry(node).map(|e| e.or_default()) else {
            return;
        };
        for (kind, namespace) in parse_spec(spec) {
            list.push(Listener {
                kind: kind.to_owned(),
                namespace: namespace.map(str::to_owned),
                handler: Rc::clone(&handler),
            });
        }
    }

    /// Remove listeners on `node` matching `spec`.
    pub fn off(&mut self, node: NodeId, spec: &str) {
        let Some(list) = self.dom.listeners.get_mut(node) else {
            return;
        };
        for (kind, namespace) in parse_spec(spec) {
            list.retain(|l| {
                let kind_matches = kind.is_empty() || l.kind == kind;
                let ns_matches = namespace.is_none() || l.namespace.as_deref() == namespace;
                !(kind_matches && ns_matches)
            });
        }
    }

    /// Whether `node` has any listener for `kind`.
    pub fn has_listener(&self, node: NodeId, kind: &str) -> bool {
        self.dom
            .listeners
            .get(node)
            .is_some_and(|list| list.iter().any(|l| l.kind == kind))
    }

    /// Run the listeners of `node` alone. Does not bubble.
    pub fn trigger_handler(&mut self, node: NodeId, event: &mut Event) -> Result<()> {
        if event.target().is_none() {
            event.set_target(node);
        }
        self.run_listeners(node, event)
    }

    /// Deliver `event` from `target` up through its ancestors.
    pub fn fire(&mut self, target: NodeId, mut event: Event) -> Result<Event> {
        event.set_target(target);
        for node in bubble_path(&self.dom, target) {
            self.run_listeners(node, &mut event)?;
            if event.is_propagation_stopped() {
                break;
            }
        }
        Ok(event)
    }

    fn run_listeners(&mut self, node: NodeId, event: &mut Event) -> Result<()> {
        let handlers: Vec<Handler> = match self.dom.listeners.get(node) {
            Some(list) => list
                .iter()
                .filter(|l| l.kind == event.kind())
                .map(|l| Rc::clone(&l.handler))
                .collect(),
            None => return Ok(()),
        };
        event.set_current_target(node);
        for handler in handlers {
            handler(self, event)?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeData;
    use crate::testing::Pilot;
    use serde_json::json;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> Handler {
        let log = Rc::clone(log);
        handler(move |_, event| {
            log.borrow_mut().push(format!("{tag}:{}", event.kind()));
            Ok(())
        })
    }

    #[test]
    fn parse_specs() {
        assert_eq!(
            parse_spec("click.fwd  change .popup"),
            vec![("click", Some("fwd")), ("change", None), ("", Some("popup"))]
        );
        assert!(parse_spec("  ").is_empty());
    }

    #[test]
    fn bubble_path_order() {
        let mut dom = Dom::new();
        let a = dom.insert_child(dom.app_root(), NodeData::new("div"));
        let b = dom.insert_child(a, NodeData::new("span"));
        let path = bubble_path(&dom, b);
        assert_eq!(&path[..3], &[b, a, dom.app_root()]);
        assert_eq!(path.last(), Some(&dom.root()));
        dom.remove(b);
        assert!(bubble_path(&dom, b).is_empty());
    }

    #[test]
    fn fire_bubbles_until_stopped() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let outer = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        let inner = cx.dom.insert_child(outer, NodeData::new("span"));
        let log = Rc::new(RefCell::new(Vec::new()));
        cx.on(inner, "click", recorder(&log, "inner"));
        cx.on(outer, "click", recorder(&log, "outer"));
        cx.fire(inner, Event::new("click")).unwrap();
        assert_eq!(*log.borrow(), vec!["inner:click", "outer:click"]);

        log.borrow_mut().clear();
        cx.on(
            inner,
            "click",
            handler(|_, e| {
                e.stop_propagation();
                Ok(())
            }),
        );
        let event = cx.fire(inner, Event::new("click")).unwrap();
        assert!(event.is_propagation_stopped());
        assert_eq!(*log.borrow(), vec!["inner:click"]);
    }

    #[test]
    fn trigger_handler_does_not_bubble() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let outer = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        let inner = cx.dom.insert_child(outer, NodeData::new("span"));
        let log = Rc::new(RefCell::new(Vec::new()));
        cx.on(inner, "ping", recorder(&log, "inner"));
        cx.on(outer, "ping", recorder(&log, "outer"));
        let mut event = Event::new("ping").with_field("n", json!(1));
        cx.trigger_handler(inner, &mut event).unwrap();
        assert_eq!(*log.borrow(), vec!["inner:ping"]);
        assert_eq!(event.current_target(), Some(inner));
    }

    #[test]
    fn off_by_type_and_namespace() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        let log = Rc::new(RefCell::new(Vec::new()));
        cx.on(node, "click.a change.a", recorder(&log, "a"));
        cx.on(node, "click.b", recorder(&log, "b"));
        cx.off(node, ".a");
        assert!(!cx.has_listener(node, "change"));
        assert!(cx.has_listener(node, "click"));
        cx.off(node, "click");
        assert!(!cx.has_listener(node, "click"));
    }

    #[test]
    fn listeners_die_with_node() {
        let mut pilot = Pilot::new();
        let cx = pilot.client_mut();
        let node = cx.dom.insert_child(cx.dom.app_root(), NodeData::new("div"));
        let log = Rc::new(RefCell::new(Vec::new()));
        cx.on(node, "click", recorder(&log, "x"));
        cx.dom.remove(node);
        assert!(!cx.has_listener(node, "click"));
    }
}
