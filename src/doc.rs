//! Document model and value adapter.
//!
//! The parsed JSON value is flattened once into an arena of document nodes,
//! each carrying its key, parent, index among siblings, and children in
//! document order (object members keep insertion order via serde_json's
//! `preserve_order` feature). The adapter side produces the format trees the
//! browser renders: a full `content` form ("key: value") and a short `label`
//! form (just the key) shown while a node is expanded.

use serde_json::Value;

use crate::layout::{self, Fmt};
use crate::style;

/// Handle into the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocId(usize);

#[derive(Debug)]
enum Data {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Array,
    Object,
}

#[derive(Debug)]
struct DocNode {
    key: String,
    parent: Option<DocId>,
    index: usize,
    children: Vec<DocId>,
    data: Data,
}

/// An immutable document tree.
#[derive(Debug)]
pub struct Doc {
    nodes: Vec<DocNode>,
}

impl Doc {
    /// Flattens a parsed value. Iterative so document depth is bounded by
    /// memory, not the stack.
    pub fn from_value(root: &Value) -> Doc {
        struct Item<'a> {
            value: &'a Value,
            parent: Option<DocId>,
            index: usize,
            key: String,
        }
        let mut nodes: Vec<DocNode> = Vec::new();
        let mut stack = vec![Item { value: root, parent: None, index: 0, key: String::new() }];
        while let Some(item) = stack.pop() {
            let id = DocId(nodes.len());
            let data = match item.value {
                Value::Null => Data::Null,
                Value::Bool(b) => Data::Bool(*b),
                Value::Number(n) => Data::Number(n.to_string()),
                Value::String(s) => Data::String(s.clone()),
                Value::Array(_) => Data::Array,
                Value::Object(_) => Data::Object,
            };
            nodes.push(DocNode {
                key: item.key,
                parent: item.parent,
                index: item.index,
                children: Vec::new(),
                data,
            });
            if let Some(DocId(p)) = item.parent {
                nodes[p].children.push(id);
            }
            // Children are pushed in reverse so they pop (and are appended to
            // the parent's list) in document order.
            match item.value {
                Value::Array(items) => {
                    for (i, v) in items.iter().enumerate().rev() {
                        stack.push(Item { value: v, parent: Some(id), index: i, key: i.to_string() });
                    }
                }
                Value::Object(items) => {
                    for (i, (k, v)) in items.iter().enumerate().rev() {
                        stack.push(Item { value: v, parent: Some(id), index: i, key: k.clone() });
                    }
                }
                _ => {}
            }
        }
        Doc { nodes }
    }

    pub fn root(&self) -> DocId {
        DocId(0)
    }

    pub fn key(&self, id: DocId) -> &str {
        &self.nodes[id.0].key
    }

    pub fn children(&self, id: DocId) -> &[DocId] {
        &self.nodes[id.0].children
    }

    pub fn has_children(&self, id: DocId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }

    /// Child indices from the root down to this node.
    pub fn path(&self, id: DocId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = id;
        while let Some(p) = self.nodes[cur.0].parent {
            path.push(self.nodes[cur.0].index);
            cur = p;
        }
        path.reverse();
        path
    }

    pub fn depth(&self, id: DocId) -> usize {
        let mut depth = 0;
        let mut cur = id;
        while let Some(p) = self.nodes[cur.0].parent {
            depth += 1;
            cur = p;
        }
        depth
    }

    /// The short form shown while a node is expanded: just its key.
    pub fn label_fmt(&self, id: DocId) -> Fmt {
        self.key_fmt(id)
    }

    /// The full collapsed form: "key: value" (value only at the root).
    pub fn content_fmt(&self, id: DocId) -> Fmt {
        match self.nodes[id.0].parent {
            None => self.value_fmt(id),
            Some(_) => layout::seq(vec![
                self.key_fmt(id),
                layout::skip(layout::fg(style::MUTED, layout::text(": "))),
                self.value_fmt(id),
            ]),
        }
    }

    fn key_fmt(&self, id: DocId) -> Fmt {
        let node = &self.nodes[id.0];
        match node.parent {
            None => layout::text(""),
            Some(p) => match self.nodes[p.0].data {
                // Array indices are rendered but not searchable.
                Data::Array => layout::skip(layout::fg(style::MUTED, layout::text(&node.key))),
                _ => layout::fg(style::KEY, layout::text(&node.key)),
            },
        }
    }

    fn value_fmt(&self, id: DocId) -> Fmt {
        let node = &self.nodes[id.0];
        let marker = |s: &str| layout::skip(layout::nobreak(layout::fg(style::KEYWORD, layout::text(s))));
        match &node.data {
            Data::String(s) => layout::fg(style::STRING, layout::text(s)),
            Data::Number(n) => layout::fg(style::KEYWORD, layout::text(n)),
            Data::Bool(true) => layout::fg(style::KEYWORD, layout::text("true")),
            Data::Bool(false) => layout::fg(style::KEYWORD, layout::text("false")),
            Data::Null => layout::fg(style::KEYWORD, layout::text("null")),
            Data::Object => marker(if node.children.is_empty() { "{ }" } else { "{...}" }),
            Data::Array => marker(if node.children.is_empty() { "[ ]" } else { "[...]" }),
        }
    }

    /// Successor in document pre-order, without wrapping.
    pub fn next_dfs(&self, id: DocId) -> Option<DocId> {
        if let Some(&first) = self.nodes[id.0].children.first() {
            return Some(first);
        }
        let mut cur = id;
        while let Some(p) = self.nodes[cur.0].parent {
            let siblings = &self.nodes[p.0].children;
            let idx = self.nodes[cur.0].index;
            if idx + 1 < siblings.len() {
                return Some(siblings[idx + 1]);
            }
            cur = p;
        }
        None
    }

    /// Predecessor in document pre-order, without wrapping.
    pub fn prev_dfs(&self, id: DocId) -> Option<DocId> {
        let p = self.nodes[id.0].parent?;
        let idx = self.nodes[id.0].index;
        if idx == 0 {
            return Some(p);
        }
        Some(self.deep_last(self.nodes[p.0].children[idx - 1]))
    }

    /// Deepest last descendant (the node itself if childless).
    pub fn deep_last(&self, id: DocId) -> DocId {
        let mut cur = id;
        while let Some(&last) = self.nodes[cur.0].children.last() {
            cur = last;
        }
        cur
    }

    /// Steps to the nearest node whose content contains `q`, in the given
    /// direction, wrapping past the document ends. Returns `None` when a
    /// full cycle finds nothing.
    pub fn search_step(&self, from: DocId, q: &str, forward: bool) -> Option<DocId> {
        let mut cur = from;
        loop {
            cur = if forward {
                self.next_dfs(cur).unwrap_or_else(|| self.root())
            } else {
                self.prev_dfs(cur).unwrap_or_else(|| self.deep_last(self.root()))
            };
            if self.content_fmt(cur).contains(q) {
                return Some(cur);
            }
            if cur == from {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Doc {
        Doc::from_value(&v)
    }

    #[test]
    fn object_members_keep_insertion_order() {
        let d = doc(json!({"z": 1, "a": 2, "m": 3}));
        let keys: Vec<&str> = d.children(d.root()).iter().map(|&c| d.key(c)).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn array_keys_are_decimal_indices() {
        let d = doc(json!([10, 20, 30]));
        let keys: Vec<&str> = d.children(d.root()).iter().map(|&c| d.key(c)).collect();
        assert_eq!(keys, ["0", "1", "2"]);
        assert_eq!(d.key(d.root()), "");
    }

    #[test]
    fn paths_follow_child_indices() {
        let d = doc(json!({"a": [true, {"b": null}]}));
        let a = d.children(d.root())[0];
        let arr1 = d.children(a)[1];
        let b = d.children(arr1)[0];
        assert_eq!(d.path(d.root()), Vec::<usize>::new());
        assert_eq!(d.path(b), vec![0, 1, 0]);
        assert_eq!(d.depth(b), 3);
    }

    #[test]
    fn dfs_next_and_prev_are_inverse() {
        let d = doc(json!({"a": [1, 2], "b": {"c": 3}}));
        let mut order = vec![d.root()];
        while let Some(next) = d.next_dfs(*order.last().expect("non-empty")) {
            order.push(next);
        }
        assert_eq!(order.len(), 6);
        for pair in order.windows(2) {
            assert_eq!(d.prev_dfs(pair[1]), Some(pair[0]));
        }
        assert_eq!(d.prev_dfs(d.root()), None);
        assert_eq!(d.deep_last(d.root()), *order.last().expect("non-empty"));
    }

    #[test]
    fn array_index_keys_are_not_searchable() {
        let d = doc(json!(["needle"]));
        let elem = d.children(d.root())[0];
        assert!(d.content_fmt(elem).contains("needle"));
        // The index key "0" and the ": " separator are skip-wrapped.
        assert!(!d.content_fmt(elem).contains("0"));
        assert!(!d.content_fmt(elem).contains(": "));
    }

    #[test]
    fn object_keys_are_searchable() {
        let d = doc(json!({"needle": 1}));
        let member = d.children(d.root())[0];
        assert!(d.content_fmt(member).contains("needle"));
    }

    #[test]
    fn collapsed_markers_distinguish_empty_containers() {
        let d = doc(json!({"full": [1], "empty": []}));
        let full = d.children(d.root())[0];
        let empty = d.children(d.root())[1];
        let full_line = d.content_fmt(full).wrap(40).plain_line(0);
        let empty_line = d.content_fmt(empty).wrap(40).plain_line(0);
        assert!(full_line.ends_with("[...]"));
        assert!(empty_line.ends_with("[ ]"));
        assert!(d.has_children(full));
        assert!(!d.has_children(empty));
    }

    #[test]
    fn search_step_wraps_around() {
        let d = doc(json!({"a": "x", "b": "y", "c": "x"}));
        let kids = d.children(d.root());
        let (a, b, c) = (kids[0], kids[1], kids[2]);
        assert_eq!(d.search_step(a, "x", true), Some(c));
        assert_eq!(d.search_step(c, "x", true), Some(a));
        assert_eq!(d.search_step(a, "x", false), Some(c));
        assert_eq!(d.search_step(b, "zzz", true), None);
    }

    #[test]
    fn root_content_is_value_only() {
        let d = doc(json!("hello"));
        let w = d.content_fmt(d.root()).wrap(40);
        assert_eq!(w.plain_line(0), "hello");
    }
}
