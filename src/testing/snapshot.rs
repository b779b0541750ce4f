//! Snapshot rendering helpers.
//!
//! Functions that turn the document and the widget tree into stable,
//! line-oriented text, suitable for `insta` snapshots and plain assertions.

use std::fmt::Write as _;

use crate::client::Client;
use crate::dom::{Dom, NodeId};
use crate::widget::WidgetKey;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serialize `node` as indented markup, one element per line.
///
/// Elements without element children stay on a single line, exactly as
/// [`Dom::outer_html`] writes them. Nesting is indented by two spaces. The
/// final line has no trailing newline.
pub fn pretty_html(dom: &Dom, node: NodeId) -> String {
    let mut lines = Vec::new();
    write_pretty(dom, node, 0, &mut lines);
    lines.join("\n")
}

/// The application root of `client` as indented markup.
pub fn document_to_string(client: &Client) -> String {
    let dom = client.dom();
    pretty_html(dom, dom.app_root())
}

/// Outline of the widget tree: one `Class#id` line per widget, children
/// indented under their parent.
///
/// Top-level widgets (those without a parent) are listed in id order.
pub fn widget_tree(client: &Client) -> String {
    let mut roots: Vec<(String, WidgetKey)> = client
        .registry()
        .ids()
        .filter_map(|id| Some((id.to_owned(), client.find(id)?)))
        .filter(|(_, key)| client.registry().get(*key).is_some_and(|n| n.parent().is_none()))
        .collect();
    roots.sort();

    let mut out = String::new();
    for (_, key) in roots {
        write_widget(client, key, 0, &mut out);
    }
    out.truncate(out.trim_end().len());
    out
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn write_pretty(dom: &Dom, node: NodeId, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let has_elements = dom
        .children(node)
        .iter()
        .any(|c| dom.open_tag(*c).is_some());
    let open = match dom.open_tag(node) {
        Some(open) if has_elements && !dom.is_void(node) => open,
        _ => {
            lines.push(format!("{indent}{}", dom.outer_html(node)));
            return;
        }
    };
    lines.push(format!("{indent}{open}"));
    if let Some(text) = dom.get(node).and_then(|d| d.text.as_deref()) {
        lines.push(format!("{indent}  {text}"));
    }
    for &child in dom.children(node) {
        write_pretty(dom, child, depth + 1, lines);
    }
    if let Some(data) = dom.get(node) {
        lines.push(format!("{indent}</{}>", data.tag));
    }
}

fn write_widget(client: &Client, key: WidgetKey, depth: usize, out: &mut String) {
    let Some(node) = client.registry().get(key) else {
        return;
    };
    let _ = writeln!(out, "{}{}#{}", "  ".repeat(depth), node.wclass(), node.id());
    for &child in node.children() {
        write_widget(client, child, depth + 1, out);
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
    use crate::widget::Props;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn leaf_elements_stay_on_one_line() {
        let mut dom = Dom::new();
        let root = dom.app_root();
        let list = dom.insert_child(root, NodeData::new("ul").with_id("l"));
        dom.insert_child(list, NodeData::new("li").with_text("a"));
        dom.insert_child(list, NodeData::new("li").with_text("b & c"));
        dom.insert_child(root, NodeData::new("input").with_attr("type", "text"));
        assert_eq!(
            document_to_string_of(&dom),
            [
                r#"<div id="sw_root">"#,
                r#"  <ul id="l">"#,
                "    <li>a</li>",
                "    <li>b &amp; c</li>",
                "  </ul>",
                r#"  <input type="text">"#,
                "</div>",
            ]
            .join("\n")
        );
    }

    fn document_to_string_of(dom: &Dom) -> String {
        pretty_html(dom, dom.app_root())
    }

    #[test]
    fn empty_root_is_a_single_line() {
        let dom = Dom::new();
        assert_eq!(document_to_string_of(&dom), r#"<div id="sw_root"></div>"#);
    }

    #[test]
    fn widget_tree_lists_nesting() {
        let mut pilot = Pilot::new();
        tokio_test::block_on(async {
            let page = pilot
                .create_with(Props::new("Div").with_id("pg").container(), None, json!({}))
                .await;
            pilot
                .create_with(Props::new("Button").with_id("b1"), Some(page), json!({"label": "Go"}))
                .await;
            pilot.create("Span", "alone", json!({"content": "x"})).await;
        });
        assert_eq!(widget_tree(pilot.client()), "Span#alone\nDiv#pg\n  Button#b1");
    }
}
