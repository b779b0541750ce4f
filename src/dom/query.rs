//! DOM queries: by id, class, predicate; owning-widget lookup; markup output.

use super::node::{NodeData, NodeId};
use super::tree::Dom;
use crate::widget::WidgetKey;

/// Elements serialized without a closing tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

impl Dom {
    /// Find the node whose `id` matches the given string.
    ///
    /// Nodes in the live document win over detached ones; detached nodes are
    /// searched in slotmap insertion order.
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_in(self.root(), id).or_else(|| {
            self.iter_nodes()
                .find(|(_, data)| data.id.as_deref() == Some(id))
                .map(|(node_id, _)| node_id)
        })
    }

    /// Find the first node in the subtree rooted at `start` with the given id.
    pub fn find_in(&self, start: NodeId, id: &str) -> Option<NodeId> {
        self.walk_depth_first(start)
            .into_iter()
            .find(|&node| self.get(node).is_some_and(|data| data.id.as_deref() == Some(id)))
    }

    /// Find all nodes that have the given CSS class.
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        self.query_all(|data| data.has_class(class))
    }

    /// Find all nodes matching an arbitrary predicate.
    pub fn query_all(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
            .collect()
    }

    /// The nearest node at or above `node` that is a widget handle, with its widget.
    pub fn closest_widget(&self, node: NodeId) -> Option<(NodeId, WidgetKey)> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find_map(|n| self.get(n)?.widget.map(|key| (n, key)))
    }

    /// Serialize `node` and its subtree as markup.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.get(node) else {
            return;
        };
        if data.is_comment() {
            out.push_str("<!--");
            out.push_str(data.text.as_deref().unwrap_or_default());
            out.push_str("-->");
            return;
        }

        write_open_tag(data, out);
        if VOID_TAGS.contains(&data.tag.as_str()) {
            return;
        }
        if let Some(text) = &data.text {
            out.push_str(&escape(text, false));
        }
        for &child in self.children(node) {
            self.write_html(child, out);
        }
        out.push_str("</");
        out.push_str(&data.tag);
        out.push('>');
    }

    /// The opening tag of `node` alone, or `None` for comments and stale ids.
    pub fn open_tag(&self, node: NodeId) -> Option<String> {
        let data = self.get(node).filter(|d| !d.is_comment())?;
        let mut out = String::new();
        write_open_tag(data, &mut out);
        Some(out)
    }

    /// Whether `node` is an element that never has a closing tag.
    pub fn is_void(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(|d| VOID_TAGS.contains(&d.tag.as_str()))
    }

    /// Iterate over all `(NodeId, &NodeData)` pairs in the arena.
    fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes.iter()
    }
}

fn write_open_tag(data: &NodeData, out: &mut String) {
    out.push('<');
    out.push_str(&data.tag);
    let named = [("id", data.attr("id")), ("class", data.attr("class"))];
    let rest = data.attrs.iter().map(|(k, v)| (k.as_str(), Some(v.clone())));
    for (name, value) in named.into_iter().chain(rest) {
        if let Some(value) = value {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(&value, true));
            out.push('"');
        }
    }
    out.push('>');
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::dom::node::NodeData;
    use crate::dom::tree::Dom;
    use crate::widget::WidgetKey;
    use slotmap::KeyData;

    /// Build a test tree for queries:
    /// ```text
    ///       root (div #root)
    ///      /    \
    ///    a       b
    ///  (#sidebar (#main
    ///   .nav)     .content)
    ///   / \
    ///  c   d
    /// (#save    (#cancel
    ///  .primary  .danger
    ///  .btn)     .btn)
    /// ```
    fn build_query_tree() -> Dom {
        let mut dom = Dom::new();
        let root = dom.insert_child(dom.app_root(), NodeData::new("div").with_id("root"));
        let a = dom.insert_child(root, NodeData::new("div").with_id("sidebar").with_class("nav"));
        let _b = dom.insert_child(root, NodeData::new("div").with_id("main").with_class("content"));
        let _c = dom.insert_child(
            a,
            NodeData::new("button")
                .with_id("save")
                .with_class("primary")
                .with_class("btn"),
        );
        let _d = dom.insert_child(
            a,
            NodeData::new("button")
                .with_id("cancel")
                .with_class("danger")
                .with_class("btn"),
        );
        dom
    }

    #[test]
    fn query_by_id_found() {
        let dom = build_query_tree();
        let id = dom.query_by_id("sidebar").unwrap();
        assert!(dom.get(id).unwrap().has_class("nav"));
    }

    #[test]
    fn query_by_id_not_found() {
        let dom = build_query_tree();
        assert!(dom.query_by_id("nonexistent").is_none());
    }

    #[test]
    fn query_by_id_prefers_connected() {
        let mut dom = Dom::new();
        let detached = dom.create(NodeData::new("span").with_id("dup"));
        let live = dom.insert_child(dom.app_root(), NodeData::new("span").with_id("dup"));
        assert_eq!(dom.query_by_id("dup"), Some(live));
        dom.remove(live);
        assert_eq!(dom.query_by_id("dup"), Some(detached));
    }

    #[test]
    fn find_in_is_scoped() {
        let dom = build_query_tree();
        let main = dom.query_by_id("main").unwrap();
        let sidebar = dom.query_by_id("sidebar").unwrap();
        assert!(dom.find_in(main, "save").is_none());
        assert!(dom.find_in(sidebar, "save").is_some());
    }

    #[test]
    fn query_by_class_multiple() {
        let dom = build_query_tree();
        assert_eq!(dom.query_by_class("btn").len(), 2);
        assert_eq!(dom.query_by_class("nav").len(), 1);
        assert!(dom.query_by_class("nonexistent").is_empty());
    }

    #[test]
    fn query_all_custom_predicate() {
        let dom = build_query_tree();
        let results = dom.query_all(|data| data.id.as_ref().is_some_and(|id| id.starts_with('s')));
        // "sidebar", "save" and the app root
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn closest_widget_walks_up() {
        let mut dom = build_query_tree();
        let key = WidgetKey::from(KeyData::from_ffi(1));
        let sidebar = dom.query_by_id("sidebar").unwrap();
        dom.get_mut(sidebar).unwrap().widget = Some(key);
        let save = dom.query_by_id("save").unwrap();
        assert_eq!(dom.closest_widget(save), Some((sidebar, key)));
        let main = dom.query_by_id("main").unwrap();
        assert_eq!(dom.closest_widget(main), None);
    }

    #[test]
    fn outer_html_serializes_subtree() {
        let mut dom = Dom::new();
        let button = dom.insert_child(
            dom.app_root(),
            NodeData::new("button").with_id("b").with_class("btn").with_attr("title", "say \"hi\""),
        );
        dom.insert_child(button, NodeData::new("span").with_text("a < b"));
        dom.insert_child(button, NodeData::new("input").with_attr("type", "text"));
        dom.insert_child(button, NodeData::comment("c"));
        assert_eq!(
            dom.outer_html(button),
            r#"<button id="b" class="btn" title="say &quot;hi&quot;"><span>a &lt; b</span><input type="text"><!--c--></button>"#
        );
    }
}
