//! The event object passed to listeners and serialized for the server.
//!
//! An [`Event`] has a type, a target element, and a bag of named fields. A
//! field may hold JSON, a widget, an element, or a binary blob; widgets and
//! elements are converted to their ids when the event is sent.
//!
//! Every event carries a *sent* marker. The marker is shared between an event
//! and the events [derived](Event::derive) from it, so once any of them has
//! been transmitted none of them is sent again.

use std::cell::Cell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::dom::NodeId;
use crate::widget::WidgetKey;

// ---------------------------------------------------------------------------
// EventValue
// ---------------------------------------------------------------------------

/// A field value on an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    Json(Value),
    Widget(WidgetKey),
    Node(NodeId),
    Blob(Rc<[u8]>),
}

impl From<Value> for EventValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<WidgetKey> for EventValue {
    fn from(key: WidgetKey) -> Self {
        Self::Widget(key)
    }
}

impl From<NodeId> for EventValue {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl From<Vec<u8>> for EventValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Blob(bytes.into())
    }
}

impl EventValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A DOM or widget event.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    target: Option<NodeId>,
    current_target: Option<NodeId>,
    fields: IndexMap<String, EventValue>,
    sent: Rc<Cell<bool>>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    /// Create an event of the given type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            current_target: None,
            fields: IndexMap::new(),
            sent: Rc::new(Cell::new(false)),
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Set the originating element (builder).
    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    /// Add a field (builder).
    pub fn with_field(mut self, name: &str, value: impl Into<EventValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Add every entry of a JSON object as a field (builder).
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.assign(params);
        self
    }

    /// A copy with a different type that shares this event's sent marker.
    pub fn derive(&self, kind: impl Into<String>) -> Self {
        let mut event = self.clone();
        event.kind = kind.into();
        event.default_prevented = false;
        event.propagation_stopped = false;
        event
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: impl Into<String>) {
        self.kind = kind.into();
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: NodeId) {
        self.target = Some(target);
    }

    /// Element whose listener is currently running.
    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub(crate) fn set_current_target(&mut self, node: NodeId) {
        self.current_target = Some(node);
    }

    pub fn field(&self, name: &str) -> Option<&EventValue> {
        self.fields.get(name)
    }

    /// A JSON field, or `None` if absent or not JSON.
    pub fn json(&self, name: &str) -> Option<&Value> {
        self.field(name)?.as_json()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &EventValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set(&mut self, name: &str, value: impl Into<EventValue>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    /// Merge JSON params into the fields, replacing existing entries.
    pub fn assign(&mut self, params: Map<String, Value>) {
        for (name, value) in params {
            self.fields.insert(name, EventValue::Json(value));
        }
    }

    /// Whether this event (or one sharing its marker) was already sent.
    pub fn is_sent(&self) -> bool {
        self.sent.get()
    }

    pub fn mark_sent(&self) {
        self.sent.set(true);
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Prevent the default action and stop propagation.
    pub fn stop(&mut self) {
        self.prevent_default();
        self.stop_propagation();
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_fields() {
        let event = Event::new("click")
            .with_field("button", json!(0))
            .with_params(json!({"x": 1, "button": 2}).as_object().unwrap().clone());
        assert_eq!(event.kind(), "click");
        assert_eq!(event.json("button"), Some(&json!(2)));
        assert_eq!(event.json("x"), Some(&json!(1)));
        assert_eq!(event.fields().count(), 2);
    }

    #[test]
    fn derived_events_share_sent_marker() {
        let original = Event::new("keydown");
        let derived = original.derive("keycapture");
        assert_eq!(derived.kind(), "keycapture");
        assert!(!original.is_sent());
        derived.mark_sent();
        assert!(original.is_sent());
    }

    #[test]
    fn clones_share_sent_marker() {
        let event = Event::new("change");
        let copy = event.clone();
        event.mark_sent();
        assert!(copy.is_sent());
    }

    #[test]
    fn stop_sets_both_flags() {
        let mut event = Event::new("keypress");
        assert!(!event.is_default_prevented());
        event.stop();
        assert!(event.is_default_prevented());
        assert!(event.is_propagation_stopped());
        let derived = event.derive("other");
        assert!(!derived.is_propagation_stopped());
    }

    #[test]
    fn blob_field() {
        let event = Event::new("upload").with_field("blob", vec![1u8, 2, 3]);
        match event.field("blob") {
            Some(EventValue::Blob(bytes)) => assert_eq!(&bytes[..], &[1, 2, 3]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(event.json("blob").is_none());
    }
}
