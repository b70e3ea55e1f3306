//! List positions: a (node, line) pair naming one displayable row, or the
//! past-end sentinel. All walking is iterative; large documents must not
//! touch the call stack.

use super::node::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPos {
    pub node: Option<NodeId>,
    pub line: usize,
}

impl RowPos {
    pub const NIL: RowPos = RowPos { node: None, line: 0 };

    pub fn new(node: NodeId, line: usize) -> Self {
        RowPos { node: Some(node), line }
    }

    pub fn at(node: NodeId) -> Self {
        Self::new(node, 0)
    }

    pub fn is_nil(&self) -> bool {
        self.node.is_none()
    }

    /// Rows between this position and `to`, walking forward. `None` when
    /// `to` is not reachable forward. The sentinel is reachable from
    /// everywhere and measures the distance to past-the-end.
    pub fn distance_to(&self, tree: &Tree, to: RowPos) -> Option<usize> {
        let mut rows = 0;
        let mut cur = *self;
        while cur.node != to.node {
            let node = cur.node?;
            rows += tree.height(node) - cur.line;
            cur = RowPos { node: tree.next(node), line: 0 };
        }
        (rows + to.line).checked_sub(cur.line)
    }

    /// The position `n` rows forward. With `clamp`, stops on the last row
    /// of the last node; otherwise returns the sentinel when walking past
    /// the end.
    pub fn ahead(&self, tree: &Tree, n: usize, clamp: bool) -> RowPos {
        let mut cur = *self;
        let mut remain = n;
        loop {
            let Some(node) = cur.node else { return RowPos::NIL };
            let h = tree.height(node);
            if remain < h - cur.line {
                return RowPos::new(node, cur.line + remain);
            }
            match tree.next(node) {
                None => {
                    return if clamp {
                        RowPos::new(node, h.saturating_sub(1))
                    } else {
                        RowPos::NIL
                    };
                }
                Some(next) => {
                    remain -= h - cur.line;
                    cur = RowPos::at(next);
                }
            }
        }
    }

    /// The position `n` rows backward. With `clamp`, stops on the first
    /// row of the first node.
    pub fn behind(&self, tree: &Tree, n: usize, clamp: bool) -> RowPos {
        let mut cur = *self;
        let mut remain = n;
        loop {
            let Some(node) = cur.node else { return RowPos::NIL };
            if remain <= cur.line {
                return RowPos::new(node, cur.line - remain);
            }
            match tree.prev(node) {
                None => {
                    return if clamp { RowPos::new(node, 0) } else { RowPos::NIL };
                }
                Some(prev) => {
                    remain -= cur.line + 1;
                    cur = RowPos::new(prev, tree.height(prev).saturating_sub(1));
                }
            }
        }
    }

    /// Signed row movement.
    pub fn shift(&self, tree: &Tree, delta: isize, clamp: bool) -> RowPos {
        match delta {
            d if d > 0 => self.ahead(tree, d as usize, clamp),
            d if d < 0 => self.behind(tree, d.unsigned_abs(), clamp),
            _ => *self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Doc;
    use serde_json::json;

    fn tree(v: serde_json::Value) -> Tree {
        Tree::new(Doc::from_value(&v), 80)
    }

    #[test]
    fn distance_skips_the_hidden_root() {
        let t = tree(json!({"a": 1, "b": 2}));
        let top = RowPos::at(t.root());
        let a = t.children(t.root())[0];
        let b = t.children(t.root())[1];
        assert_eq!(top.distance_to(&t, RowPos::at(a)), Some(0));
        assert_eq!(top.distance_to(&t, RowPos::at(b)), Some(1));
        assert_eq!(top.distance_to(&t, RowPos::NIL), Some(2));
    }

    #[test]
    fn distance_is_additive() {
        let mut t = tree(json!({"a": [1, 2], "b": 3}));
        let a = t.children(t.root())[0];
        t.expand(a, 80);
        let top = RowPos::at(t.root());
        let b = t.children(t.root())[1];
        let mid = RowPos::at(t.children(a)[1]);
        let ab = top.distance_to(&t, mid).expect("forward");
        let bc = mid.distance_to(&t, RowPos::at(b)).expect("forward");
        assert_eq!(top.distance_to(&t, RowPos::at(b)), Some(ab + bc));
    }

    #[test]
    fn distance_backward_is_none() {
        let t = tree(json!({"a": 1, "b": 2}));
        let a = t.children(t.root())[0];
        let b = t.children(t.root())[1];
        assert_eq!(RowPos::at(b).distance_to(&t, RowPos::at(a)), None);
    }

    #[test]
    fn ahead_walks_across_nodes() {
        let t = tree(json!({"a": 1, "b": 2, "c": 3}));
        let kids: Vec<_> = t.children(t.root()).to_vec();
        let top = RowPos::at(t.root());
        assert_eq!(top.ahead(&t, 0, false), RowPos::at(kids[0]));
        assert_eq!(top.ahead(&t, 2, false), RowPos::at(kids[2]));
    }

    #[test]
    fn ahead_past_end_clamps_or_sentinels() {
        let t = tree(json!({"a": 1, "b": 2}));
        let kids: Vec<_> = t.children(t.root()).to_vec();
        let top = RowPos::at(t.root());
        assert_eq!(top.ahead(&t, 99, true), RowPos::at(kids[1]));
        assert!(top.ahead(&t, 99, false).is_nil());
    }

    #[test]
    fn behind_clamps_at_the_top() {
        let t = tree(json!({"a": 1, "b": 2}));
        let kids: Vec<_> = t.children(t.root()).to_vec();
        let second = RowPos::at(kids[1]);
        assert_eq!(second.behind(&t, 1, true), RowPos::at(kids[0]));
        assert_eq!(second.behind(&t, 99, true), RowPos::at(t.root()));
        assert!(second.behind(&t, 99, false).is_nil());
    }

    #[test]
    fn shift_matches_ahead_and_behind() {
        let t = tree(json!({"a": 1, "b": 2, "c": 3}));
        let kids: Vec<_> = t.children(t.root()).to_vec();
        let mid = RowPos::at(kids[1]);
        assert_eq!(mid.shift(&t, 1, false), RowPos::at(kids[2]));
        assert_eq!(mid.shift(&t, -1, false), RowPos::at(kids[0]));
        assert_eq!(mid.shift(&t, 0, false), mid);
    }

    #[test]
    fn large_flat_document_walks_without_overflow() {
        let values: Vec<serde_json::Value> = (0..10_000).map(|i| json!(i)).collect();
        let t = tree(serde_json::Value::Array(values));
        let top = RowPos::at(t.root());
        assert_eq!(top.distance_to(&t, RowPos::NIL), Some(10_000));
        let last = top.ahead(&t, 99_999, true);
        assert_eq!(last.node, Some(t.last_visible()));
        assert_eq!(last.behind(&t, 99_999, true), RowPos::at(t.root()));
    }
}
