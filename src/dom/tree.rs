//! Tree operations: create, attach, detach, replace, remove, walk.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeId};
use crate::event::Listener;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Id of the element all page content is rendered into.
pub const APP_ROOT_ID: &str = "sw_root";

/// The central DOM tree, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that node removal is O(subtree size) and lookup is O(1).
/// A fresh `Dom` always holds a document skeleton:
///
/// ```text
/// html
/// ├── head
/// └── body
///     └── div#sw_root
/// ```
///
/// Nodes created with [`Dom::create`] start out detached and only become part
/// of the document once appended somewhere under it.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    pub(crate) listeners: SecondaryMap<NodeId, Vec<Listener>>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    app_root: NodeId,
}

impl Dom {
    /// Create a DOM holding an empty document skeleton.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut children = SecondaryMap::new();
        let mut parent = SecondaryMap::new();

        let root = nodes.insert(NodeData::new("html"));
        let head = nodes.insert(NodeData::new("head"));
        let body = nodes.insert(NodeData::new("body"));
        let app_root = nodes.insert(NodeData::new("div").with_id(APP_ROOT_ID));
        children.insert(root, vec![head, body]);
        children.insert(head, Vec::new());
        children.insert(body, vec![app_root]);
        children.insert(app_root, Vec::new());
        parent.insert(head, root);
        parent.insert(body, root);
        parent.insert(app_root, body);

        Self {
            nodes,
            children,
            parent,
            listeners: SecondaryMap::new(),
            root,
            head,
            body,
            app_root,
        }
    }

    /// Create a detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        id
    }

    /// Create a node as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics (debug) if `parent` does not exist in the tree.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        debug_assert!(self.nodes.contains_key(parent), "parent node does not exist");
        let id = self.create(data);
        self.append(parent, id);
        id
    }

    /// Remove a node and all its descendants recursively.
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't exist.
    /// The document skeleton itself can only be emptied, never removed.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) || self.is_landmark(id) {
            return None;
        }

        self.detach(id);

        // Collect all descendants (BFS) to remove them.
        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                for &child in &kids {
                    to_remove.push_back(child);
                }
            }
            self.parent.remove(current);
            self.listeners.remove(current);
            let data = self.nodes.remove(current);
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data
    }

    /// Remove every child of `id` and clear its text.
    pub fn empty(&mut self, id: NodeId) {
        for child in self.children(id).to_vec() {
            self.remove(child);
        }
        if let Some(data) = self.nodes.get_mut(id) {
            data.text = None;
        }
    }

    /// Detach `node` from its parent, keeping its subtree intact.
    ///
    /// Returns `true` if the node had a parent.
    pub fn detach(&mut self, node: NodeId) -> bool {
        match self.parent.remove(node) {
            Some(old_parent) => {
                if let Some(siblings) = self.children.get_mut(old_parent) {
                    siblings.retain(|&child| child != node);
                }
                true
            }
            None => false,
        }
    }

    /// Move `node` to become the last child of `parent`.
    pub fn append(&mut self, parent: NodeId, node: NodeId) {
        let len = self.children(parent).len();
        self.insert_at(parent, len, node);
    }

    /// Move `node` to become the first child of `parent`.
    pub fn prepend(&mut self, parent: NodeId, node: NodeId) {
        self.insert_at(parent, 0, node);
    }

    /// Move `node` to position `index` under `parent` (clamped to the child count).
    ///
    /// If `node` was previously attached anywhere, it is detached first.
    pub fn insert_at(&mut self, parent: NodeId, index: usize, node: NodeId) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(node) || parent == node {
            return;
        }
        self.detach(node);
        self.parent.insert(node, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            let index = index.min(siblings.len());
            siblings.insert(index, node);
        }
    }

    /// Move `node` immediately before `reference`.
    ///
    /// Does nothing if `reference` has no parent.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        if let Some(parent) = self.parent(reference) {
            self.detach(node);
            let index = self.index_in_parent(reference).unwrap_or(0);
            self.insert_at(parent, index, node);
        }
    }

    /// Put `new` in the position occupied by `old`, then remove `old` and its subtree.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        if self.parent(old).is_some() {
            self.insert_before(old, new);
        }
        self.remove(old);
    }

    /// Exchange the positions of two nodes.
    pub fn swap(&mut self, a: NodeId, b: NodeId) {
        let (Some(pa), Some(pb)) = (self.parent(a), self.parent(b)) else {
            return;
        };
        let (Some(ia), Some(ib)) = (self.index_in_parent(a), self.index_in_parent(b)) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(pa) {
            siblings[ia] = b;
        }
        if let Some(siblings) = self.children.get_mut(pb) {
            siblings[ib] = a;
        }
        self.parent.insert(a, pb);
        self.parent.insert(b, pa);
    }

    /// Replace all element children of `id` with the given text.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.empty(id);
        if let Some(data) = self.nodes.get_mut(id) {
            data.text = Some(text.into());
        }
    }

    /// Concatenated text of `id` and all its descendants, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|node| self.nodes.get(node))
            .filter(|data| !data.is_comment())
            .filter_map(|data| data.text.as_deref())
            .collect()
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Walk from `id` up to the root, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent and ends at the topmost ancestor.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Whether `node` is `ancestor` or lies somewhere beneath it.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Whether `id` is part of the live document.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_within(id, self.root)
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// The `html` element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `head` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `body` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// The element page content renders into.
    pub fn app_root(&self) -> NodeId {
        self.app_root
    }

    fn is_landmark(&self, id: NodeId) -> bool {
        id == self.root || id == self.head || id == self.body || id == self.app_root
    }

    /// Number of nodes in the arena, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty. Never true for a live document.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            let kids = self.children(current);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        result
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a small test tree under the app root:
    /// ```text
    ///       root
    ///      /    \
    ///    a        b
    ///   / \
    ///  c   d
    /// ```
    fn build_tree() -> (Dom, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let app = dom.app_root();
        let root = dom.insert_child(app, NodeData::new("div").with_id("root"));
        let a = dom.insert_child(root, NodeData::new("div").with_id("a").with_class("left"));
        let b = dom.insert_child(root, NodeData::new("div").with_id("b").with_class("right"));
        let c = dom.insert_child(a, NodeData::new("button").with_id("c"));
        let d = dom.insert_child(a, NodeData::new("label").with_id("d"));
        (dom, root, a, b, c, d)
    }

    #[test]
    fn document_skeleton() {
        let dom = Dom::new();
        assert_eq!(dom.children(dom.root()), &[dom.head(), dom.body()]);
        assert_eq!(dom.children(dom.body()), &[dom.app_root()]);
        assert_eq!(dom.get(dom.app_root()).unwrap().id.as_deref(), Some(APP_ROOT_ID));
        assert_eq!(dom.len(), 4);
    }

    #[test]
    fn insert_child_parent_relationship() {
        let (dom, root, a, _b, c, _d) = build_tree();
        assert_eq!(dom.parent(a), Some(root));
        assert_eq!(dom.parent(c), Some(a));
        assert_eq!(dom.parent(root), Some(dom.app_root()));
    }

    #[test]
    fn create_is_detached() {
        let mut dom = Dom::new();
        let n = dom.create(NodeData::new("span"));
        assert_eq!(dom.parent(n), None);
        assert!(!dom.is_connected(n));
        dom.append(dom.app_root(), n);
        assert!(dom.is_connected(n));
    }

    #[test]
    fn children_list() {
        let (dom, root, a, b, c, d) = build_tree();
        assert_eq!(dom.children(root), &[a, b]);
        assert_eq!(dom.children(a), &[c, d]);
        assert!(dom.children(c).is_empty());
    }

    #[test]
    fn ancestors() {
        let (dom, root, a, _b, c, _d) = build_tree();
        assert_eq!(
            dom.ancestors(c),
            vec![a, root, dom.app_root(), dom.body(), dom.root()]
        );
        assert!(dom.is_within(c, root));
        assert!(!dom.is_within(root, c));
    }

    #[test]
    fn remove_subtree() {
        let (mut dom, root, a, b, c, d) = build_tree();
        let removed = dom.remove(a);
        assert_eq!(removed.unwrap().id.as_deref(), Some("a"));
        assert!(!dom.contains(a));
        assert!(!dom.contains(c));
        assert!(!dom.contains(d));
        assert_eq!(dom.children(root), &[b]);
    }

    #[test]
    fn remove_nonexistent() {
        let mut dom = Dom::new();
        let id = dom.create(NodeData::new("x"));
        dom.remove(id);
        assert!(dom.remove(id).is_none());
    }

    #[test]
    fn landmarks_cannot_be_removed() {
        let mut dom = Dom::new();
        assert!(dom.remove(dom.body()).is_none());
        assert!(dom.contains(dom.body()));
    }

    #[test]
    fn detach_keeps_subtree() {
        let (mut dom, root, a, b, c, _d) = build_tree();
        assert!(dom.detach(a));
        assert!(!dom.detach(a));
        assert_eq!(dom.children(root), &[b]);
        assert_eq!(dom.parent(c), Some(a));
        assert!(!dom.is_connected(c));
    }

    #[test]
    fn insert_at_and_before() {
        let (mut dom, root, a, b, c, _d) = build_tree();
        dom.insert_at(root, 0, c);
        assert_eq!(dom.children(root), &[c, a, b]);
        let e = dom.create(NodeData::new("hr"));
        dom.insert_before(b, e);
        assert_eq!(dom.children(root), &[c, a, e, b]);
        dom.insert_at(root, 99, c);
        assert_eq!(dom.children(root), &[a, e, b, c]);
    }

    #[test]
    fn append_moves_node() {
        let (mut dom, root, a, b, c, d) = build_tree();
        dom.append(b, c);
        assert_eq!(dom.parent(c), Some(b));
        assert_eq!(dom.children(a), &[d]);
        assert_eq!(dom.children(root), &[a, b]);
    }

    #[test]
    fn replace_with_takes_position() {
        let (mut dom, root, a, b, c, _d) = build_tree();
        let fresh = dom.create(NodeData::new("div").with_id("a2"));
        dom.replace_with(a, fresh);
        assert_eq!(dom.children(root), &[fresh, b]);
        assert!(!dom.contains(a));
        assert!(!dom.contains(c));
    }

    #[test]
    fn replace_unattached_just_removes() {
        let mut dom = Dom::new();
        let old = dom.create(NodeData::new("div"));
        let new = dom.create(NodeData::new("div"));
        dom.replace_with(old, new);
        assert!(!dom.contains(old));
        assert_eq!(dom.parent(new), None);
    }

    #[test]
    fn swap_siblings_and_cousins() {
        let (mut dom, root, a, b, c, d) = build_tree();
        dom.swap(c, d);
        assert_eq!(dom.children(a), &[d, c]);
        dom.swap(c, b);
        assert_eq!(dom.children(root), &[a, c]);
        assert_eq!(dom.children(a), &[d, b]);
    }

    #[test]
    fn text_replaces_children() {
        let (mut dom, _root, a, _b, c, _d) = build_tree();
        dom.get_mut(c).unwrap().text = Some("Go".into());
        assert_eq!(dom.text_content(a), "Go");
        dom.set_text(a, "plain");
        assert!(dom.children(a).is_empty());
        assert!(!dom.contains(c));
        assert_eq!(dom.text_content(a), "plain");
    }

    #[test]
    fn empty_clears_everything() {
        let (mut dom, root, ..) = build_tree();
        dom.empty(root);
        assert!(dom.children(root).is_empty());
        assert_eq!(dom.len(), 5);
    }

    #[test]
    fn walk_depth_first() {
        let (dom, root, a, b, c, d) = build_tree();
        assert_eq!(dom.walk_depth_first(root), vec![root, a, c, d, b]);
        assert_eq!(dom.walk_depth_first(a), vec![a, c, d]);
    }

    #[test]
    fn default_impl() {
        let dom = Dom::default();
        assert!(!dom.is_empty());
    }
}
