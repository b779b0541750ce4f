//! Markup fragments and `${...}` references.
//!
//! Widgets describe their elements with one-element markup strings such as
//! `<span id="${id}-lbl"/>`. References are resolved against the widget
//! (`id`, `wclass`, `wclazz`, `_state.<key>`, class fields and creation
//! properties) and the result is parsed into a detached element.
//!
//! A small table of shared fragments is addressed by key. A key written
//! `state:key` is included only when that state is truthy; `:key` is short
//! for `key:key`.

use super::WidgetKey;
use crate::client::Client;
use crate::dom::{NodeData, NodeId};
use crate::error::{Error, Result};
use crate::util;

/// Shared fragments by key.
pub const TEMPLATES: &[(&str, &str)] = &[
    ("badge", r#"<span id="${id}-badge" class="badge"/>"#),
    ("closable", r#"<span id="${id}-cls" class="icon icon-remove"/>"#),
    ("image", r#"<img id="${id}-img" src="${_state.image}"/>"#),
    ("label", r#"<span id="${id}-lbl"/>"#),
];

fn template(key: &str) -> Option<&'static str> {
    TEMPLATES.iter().find(|(k, _)| *k == key).map(|(_, t)| *t)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse markup for a single element: `<tag a="1" b>text</tag>` or
/// `<tag a="1"/>`. A bare tag name is accepted too.
pub fn parse_element(markup: &str) -> Result<NodeData> {
    let bad = |message: &str| Error::invalid_argument("markup", format!("{message}: {markup}"));
    let text = markup.trim();
    let Some(body) = text.strip_prefix('<') else {
        return if !text.is_empty() && text.chars().all(is_name_char) {
            Ok(NodeData::new(text))
        } else {
            Err(bad("expected an element"))
        };
    };
    let tag_len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    if tag_len == 0 {
        return Err(bad("missing tag name"));
    }
    let tag = &body[..tag_len];
    let mut data = NodeData::new(tag);
    let mut rest = &body[tag_len..];
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("/>") {
            return if after.trim().is_empty() {
                Ok(data)
            } else {
                Err(bad("trailing content"))
            };
        }
        if let Some(after) = rest.strip_prefix('>') {
            let close = format!("</{tag}>");
            let inner = match after.trim_end().strip_suffix(close.as_str()) {
                Some(inner) => inner,
                None if after.trim().is_empty() => "",
                None => return Err(bad("unterminated element")),
            };
            if inner.contains('<') {
                return Err(bad("nested elements are not supported"));
            }
            if !inner.is_empty() {
                data.text = Some(inner.to_owned());
            }
            return Ok(data);
        }
        let name_len = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
        if name_len == 0 {
            return Err(bad("malformed attribute"));
        }
        let name = &rest[..name_len];
        rest = rest[name_len..].trim_start();
        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'');
                match quote {
                    Some(q) => {
                        let end = after[1..].find(q).ok_or_else(|| bad("unterminated value"))?;
                        rest = &after[end + 2..];
                        after[1..end + 1].to_owned()
                    }
                    None => {
                        let end = after
                            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
                            .unwrap_or(after.len());
                        rest = &after[end..];
                        after[..end].to_owned()
                    }
                }
            }
            None => String::new(),
        };
        data.set_attr(name, Some(value));
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
}

// ---------------------------------------------------------------------------
// Client integration
// ---------------------------------------------------------------------------

impl Client {
    /// Substitute `<prefix>{name}` references using the widget's properties.
    pub fn resolve_el(&self, key: WidgetKey, text: &str, prefix: char) -> String {
        let Some(node) = self.registry.get(key) else {
            return text.to_owned();
        };
        util::resolve_el(text, prefix, |name| {
            let value = match name {
                "id" => return Some(node.id().to_owned()),
                "wclass" => return Some(node.wclass().to_owned()),
                "wclazz" => return Some(node.wclazz().to_owned()),
                _ => match name.strip_prefix("_state.") {
                    Some(state) => node.get_state(state),
                    None => node
                        .class()
                        .field(name)
                        .or_else(|| node.props().extra.get(name)),
                },
            };
            value.and_then(util::as_text)
        })
    }

    /// Build a detached element from markup with references resolved.
    pub fn element(&mut self, key: WidgetKey, markup: &str) -> Result<NodeId> {
        let data = parse_element(&self.resolve_el(key, markup, '$'))?;
        Ok(self.dom.create(data))
    }

    /// Append the shared fragments named by `keys` to `parent`.
    pub fn append_templates(&mut self, key: WidgetKey, parent: NodeId, keys: &[&str]) -> Result<()> {
        for spec in keys {
            let name = match spec.split_once(':') {
                Some((state, name)) => {
                    let state = if state.is_empty() { name } else { state };
                    let on = self
                        .node(key)?
                        .get_state(state)
                        .is_some_and(util::truthy);
                    if !on {
                        continue;
                    }
                    name
                }
                None => spec,
            };
            if let Some(markup) = template(name) {
                let node = self.element(key, markup)?;
                self.dom.append(parent, node);
            }
        }
        Ok(())
    }
}
