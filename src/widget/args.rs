//! Invocation arguments: JSON values with widget references resolved.
//!
//! On the wire a widget reference is an object carrying a single
//! [`WIDGET_MARKER`] key whose value is the widget id. References are resolved
//! against the registry when an action is processed; a reference to an unknown
//! id becomes `null`.

use serde_json::{Map, Value};

use super::WidgetKey;
use crate::error::{Error, Result};

/// Key marking a JSON object as a widget reference.
pub const WIDGET_MARKER: &str = "__widget__";

/// Encode a reference to the widget with the given id.
pub fn widget_ref(id: &str) -> Value {
    let mut map = Map::new();
    map.insert(WIDGET_MARKER.to_owned(), Value::String(id.to_owned()));
    Value::Object(map)
}

/// The referenced id, if `value` is a widget reference.
pub fn referenced_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(WIDGET_MARKER)?.as_str(),
        _ => None,
    }
}

/// A single resolved argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Widget(WidgetKey),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<WidgetKey> for Arg {
    fn from(key: WidgetKey) -> Self {
        Self::Widget(key)
    }
}

/// Positional arguments for a widget method or global function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    function: String,
    items: Vec<Arg>,
}

impl Args {
    pub fn new(function: impl Into<String>, items: Vec<Arg>) -> Self {
        Self {
            function: function.into(),
            items,
        }
    }

    /// Build from plain values (no widget references).
    pub fn values(function: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::new(function, values.into_iter().map(Arg::Value).collect())
    }

    /// Name of the function being invoked, for error messages.
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.items.get(index)
    }

    /// The JSON value at `index`; `null` when missing or a widget.
    pub fn value(&self, index: usize) -> Value {
        match self.items.get(index) {
            Some(Arg::Value(v)) => v.clone(),
            _ => Value::Null,
        }
    }

    /// A required string argument.
    pub fn str(&self, index: usize) -> Result<String> {
        self.opt_str(index)
            .ok_or_else(|| self.invalid(format!("argument {index} must be a string")))
    }

    pub fn opt_str(&self, index: usize) -> Option<String> {
        match self.items.get(index) {
            Some(Arg::Value(Value::String(s))) => Some(s.clone()),
            _ => None,
        }
    }

    /// A boolean argument; `None` when missing or `null`.
    pub fn opt_bool(&self, index: usize) -> Option<bool> {
        match self.items.get(index) {
            Some(Arg::Value(Value::Null)) | None => None,
            Some(Arg::Value(v)) => Some(crate::util::truthy(v)),
            Some(Arg::Widget(_)) => Some(true),
        }
    }

    pub fn bool(&self, index: usize) -> bool {
        self.opt_bool(index).unwrap_or(false)
    }

    pub fn opt_int(&self, index: usize) -> Option<i64> {
        match self.items.get(index) {
            Some(Arg::Value(Value::Number(n))) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// A required widget argument.
    pub fn widget(&self, index: usize) -> Result<WidgetKey> {
        self.opt_widget(index).ok_or(Error::InvalidChild)
    }

    pub fn opt_widget(&self, index: usize) -> Option<WidgetKey> {
        match self.items.get(index) {
            Some(Arg::Widget(key)) => Some(*key),
            _ => None,
        }
    }

    /// An object argument; `None` when missing or not an object.
    pub fn object(&self, index: usize) -> Option<Map<String, Value>> {
        match self.items.get(index) {
            Some(Arg::Value(Value::Object(map))) => Some(map.clone()),
            _ => None,
        }
    }

    /// Arguments from `index` onward.
    pub fn rest(&self, index: usize) -> Vec<Arg> {
        self.items.iter().skip(index).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.items.iter()
    }

    pub fn invalid(&self, message: impl Into<String>) -> Error {
        Error::invalid_argument(&self.function, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slotmap::SlotMap;

    #[test]
    fn marker_round_trip() {
        let r = widget_ref("w1");
        assert_eq!(r, json!({"__widget__": "w1"}));
        assert_eq!(referenced_id(&r), Some("w1"));
        assert_eq!(referenced_id(&json!({"__widget__": "w1", "x": 1})), None);
        assert_eq!(referenced_id(&json!("w1")), None);
    }

    #[test]
    fn typed_accessors() {
        let args = Args::values("f", [json!("a"), json!(3), json!(null), json!({"k": 1})]);
        assert_eq!(args.len(), 4);
        assert_eq!(args.str(0).unwrap(), "a");
        assert!(args.str(1).is_err());
        assert_eq!(args.opt_int(1), Some(3));
        assert_eq!(args.opt_bool(2), None);
        assert!(args.object(3).is_some());
        assert_eq!(args.value(9), Value::Null);
        assert_eq!(args.rest(2).len(), 2);
    }

    #[test]
    fn widget_argument() {
        let mut sm: SlotMap<WidgetKey, ()> = SlotMap::with_key();
        let key = sm.insert(());
        let args = Args::new("addChild", vec![Arg::Widget(key), Arg::Value(json!(0))]);
        assert_eq!(args.widget(0).unwrap(), key);
        assert!(matches!(args.widget(1), Err(Error::InvalidChild)));
        assert_eq!(args.value(0), Value::Null);
    }

    #[test]
    fn invalid_names_function() {
        let args = Args::values("toggleClass", []);
        let err = args.str(0).unwrap_err();
        assert!(err.to_string().starts_with("invalid argument for toggleClass"));
    }
}
