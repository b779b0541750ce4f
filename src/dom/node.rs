//! Node types: NodeId, NodeData.

use std::collections::BTreeMap;

use slotmap::new_key_type;

use crate::geometry::Rect;
use crate::widget::WidgetKey;

new_key_type! {
    /// Unique identifier for a DOM node. Copy, lightweight (u64).
    pub struct NodeId;
}

/// Tag used for comment placeholders.
pub const COMMENT_TAG: &str = "#comment";

/// Data associated with a single DOM node.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Element tag name (e.g. "div", "button"), or [`COMMENT_TAG`].
    pub tag: String,
    /// Optional unique id (`#id`).
    pub id: Option<String>,
    /// CSS classes, in insertion order.
    pub classes: Vec<String>,
    /// Remaining attributes. `id` and `class` never live here.
    pub attrs: BTreeMap<String, String>,
    /// Own text content. Setting it replaces element children.
    pub text: Option<String>,
    /// Current value of a form control.
    pub value: Option<String>,
    /// Last known bounding box.
    pub rect: Rect,
    /// Widget whose handle this node is, if any.
    pub widget: Option<WidgetKey>,
}

impl NodeData {
    /// Create a new element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: None,
            value: None,
            rect: Rect::default(),
            widget: None,
        }
    }

    /// Create a comment placeholder carrying `text`.
    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(COMMENT_TAG).with_text(text)
    }

    /// Whether this is a comment placeholder.
    pub fn is_comment(&self) -> bool {
        self.tag == COMMENT_TAG
    }

    /// Set the id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a single CSS class (builder).
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Add multiple CSS classes (builder).
    pub fn with_classes(mut self, classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for class in classes {
            let class = class.into();
            if !self.classes.contains(&class) {
                self.classes.push(class);
            }
        }
        self
    }

    /// Set an attribute (builder). Routes `id` and `class` to their fields.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, Some(value.into()));
        self
    }

    /// Set the text content (builder).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the form value (builder).
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Read an attribute. `id` and `class` are synthesized from their fields.
    pub fn attr(&self, name: &str) -> Option<String> {
        match name {
            "id" => self.id.clone(),
            "class" if self.classes.is_empty() => None,
            "class" => Some(self.classes.join(" ")),
            _ => self.attrs.get(name).cloned(),
        }
    }

    /// Set or clear an attribute.
    ///
    /// Setting `class` replaces the whole class list with the whitespace-split value.
    pub fn set_attr(&mut self, name: &str, value: Option<String>) {
        match (name, value) {
            ("id", value) => self.id = value,
            ("class", Some(value)) => {
                self.classes.clear();
                for class in value.split_whitespace() {
                    self.add_class(class);
                }
            }
            ("class", None) => self.classes.clear(),
            (name, Some(value)) => {
                self.attrs.insert(name.to_owned(), value);
            }
            (name, None) => {
                self.attrs.remove(name);
            }
        }
    }

    /// Set or clear a boolean attribute (present with its own name as value).
    pub fn set_flag(&mut self, name: &str, on: bool) {
        self.set_attr(name, on.then(|| name.to_owned()));
    }

    /// Check whether this node has a given CSS class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add a CSS class. No-op if already present.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_owned());
        }
    }

    /// Remove a CSS class. No-op if not present.
    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Toggle a CSS class. `add` forces the direction; `None` flips it.
    pub fn toggle_class(&mut self, class: &str, add: Option<bool>) {
        let add = add.unwrap_or_else(|| !self.has_class(class));
        if add {
            self.add_class(class);
        } else {
            self.remove_class(class);
        }
    }
}
