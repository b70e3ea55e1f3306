//! The visible tree: exactly the expanded portion of the document.
//!
//! List nodes live in an arena and refer to each other by handle, so the
//! cyclic link structure (`prev`/`next` visual order, `prev_sib`/`next_sib`
//! subtree-skipping shortcuts, `parent`, `children`) needs no reference
//! counting. Nodes are created when their parent expands and freed when it
//! collapses; the chain around a collapsed subtree is patched first, then
//! the subtree slots are released.
//!
//! A container root is expanded at construction and occupies zero rows, so
//! the screen starts at its first child; every other node shows at least
//! one row (its collapsed `body` or, while expanded, its short `label`).

use crate::doc::{Doc, DocId};
use crate::layout::{Fmt, Hit, Wrapped};

/// Cells per tree depth level in the glyph prefix.
const COL_WIDTH: usize = 4;

/// Handle into the visible-tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct SearchCache {
    query: String,
    expanded: bool,
    hits: Vec<Hit>,
}

#[derive(Debug)]
struct Node {
    doc: DocId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    prev_sib: Option<NodeId>,
    next_sib: Option<NodeId>,
    expanded: bool,
    last_child: bool,
    depth: usize,
    prefix_first: String,
    prefix_rest: String,
    /// Full collapsed rendering ("key: value").
    body: Wrapped,
    /// Short rendering shown while expanded (just the key).
    label: Wrapped,
    search: Option<SearchCache>,
}

/// The visible tree plus the document it views.
#[derive(Debug)]
pub struct Tree {
    doc: Doc,
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl Tree {
    pub fn new(doc: Doc, width: usize) -> Self {
        let mut tree = Tree { doc, slots: Vec::new(), free: Vec::new(), root: NodeId(0) };
        let root_doc = tree.doc.root();
        let root = tree.alloc(root_doc, None, true, 0);
        tree.root = root;
        tree.reformat(root, width);
        if tree.expandable(root) {
            tree.expand(root, width);
        }
        tree
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &Node {
        self.slots[id.0].as_ref().expect("stale node handle")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.0].as_mut().expect("stale node handle")
    }

    fn alloc(&mut self, doc: DocId, parent: Option<NodeId>, last_child: bool, depth: usize) -> NodeId {
        let node = Node {
            doc,
            parent,
            children: Vec::new(),
            prev: None,
            next: None,
            prev_sib: None,
            next_sib: None,
            expanded: false,
            last_child,
            depth,
            prefix_first: String::new(),
            prefix_rest: String::new(),
            body: Fmt::Text(String::new()).wrap(1),
            label: Fmt::Text(String::new()).wrap(1),
            search: None,
        };
        match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(node);
                NodeId(i)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub fn doc_id(&self, id: NodeId) -> DocId {
        self.node(id).doc
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev
    }

    pub fn next_sib(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sib
    }

    pub fn prev_sib(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sib
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, idx: usize) -> NodeId {
        self.node(id).children[idx]
    }

    pub fn expanded(&self, id: NodeId) -> bool {
        self.node(id).expanded
    }

    pub fn expandable(&self, id: NodeId) -> bool {
        self.doc.has_children(self.node(id).doc)
    }

    /// Rows this node occupies on screen. The expanded root is the single
    /// zero-row node; everything else is at least one row.
    pub fn height(&self, id: NodeId) -> usize {
        let node = self.node(id);
        if node.parent.is_none() && node.expanded {
            return 0;
        }
        self.displayed(id).rows()
    }

    /// The rendering currently on screen: label while expanded, body otherwise.
    pub fn displayed(&self, id: NodeId) -> &Wrapped {
        let node = self.node(id);
        if node.expanded { &node.label } else { &node.body }
    }

    pub fn prefix(&self, id: NodeId, first_line: bool) -> &str {
        let node = self.node(id);
        if first_line { &node.prefix_first } else { &node.prefix_rest }
    }

    /// True when `a` comes before `b` in document pre-order.
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        self.doc.path(self.node(a).doc) < self.doc.path(self.node(b).doc)
    }

    /// True when `a` is a proper ancestor of `b`.
    pub fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        let pa = self.doc.path(self.node(a).doc);
        let pb = self.doc.path(self.node(b).doc);
        pa.len() < pb.len() && pb[..pa.len()] == pa[..]
    }

    /// First node with at least one row (skips the hidden root).
    pub fn first_visible(&self) -> NodeId {
        let mut cur = self.root;
        while self.height(cur) == 0 {
            match self.node(cur).next {
                Some(n) => cur = n,
                None => return self.root,
            }
        }
        cur
    }

    /// Last node in visual order, reached by skipping whole subtrees.
    pub fn last_visible(&self) -> NodeId {
        let mut cur = self.root;
        loop {
            let step = self.node(cur).next_sib.or(self.node(cur).next);
            match step {
                Some(n) => cur = n,
                None => return cur,
            }
        }
    }

    /// Creates list nodes for every document child and splices the chain
    /// between the node and its old successor. Sibling links are set
    /// directly: this is the only insertion the tree ever performs.
    pub fn expand(&mut self, id: NodeId, width: usize) {
        if self.node(id).expanded || !self.expandable(id) {
            return;
        }
        let depth = self.node(id).depth + 1;
        let kids: Vec<DocId> = self.doc.children(self.node(id).doc).to_vec();
        let succ = self.node(id).next;

        let mut created = Vec::with_capacity(kids.len());
        let last_idx = kids.len() - 1;
        for (i, child_doc) in kids.into_iter().enumerate() {
            let nid = self.alloc(child_doc, Some(id), i == last_idx, depth);
            self.reformat(nid, width);
            created.push(nid);
        }

        for i in 0..created.len() {
            let before = if i == 0 { id } else { created[i - 1] };
            let after = created.get(i + 1).copied().or(succ);
            let node = self.node_mut(created[i]);
            node.prev = Some(before);
            node.prev_sib = Some(before);
            node.next = after;
            node.next_sib = after;
        }

        let first = created[0];
        let last = *created.last().expect("expand created no children");
        self.node_mut(id).next = Some(first);
        if let Some(s) = succ {
            self.node_mut(s).prev = Some(last);
        }
        let node = self.node_mut(id);
        node.children = created;
        node.expanded = true;
    }

    /// Splices the subtree out of the chain and frees it.
    pub fn collapse(&mut self, id: NodeId) {
        if !self.node(id).expanded {
            return;
        }
        let succ = self.node(id).next_sib;
        self.node_mut(id).next = succ;
        if let Some(s) = succ {
            self.node_mut(s).prev = Some(id);
        }
        let mut stack = std::mem::take(&mut self.node_mut(id).children);
        while let Some(n) = stack.pop() {
            stack.extend(std::mem::take(&mut self.node_mut(n).children));
            self.slots[n.0] = None;
            self.free.push(n.0);
        }
        self.node_mut(id).expanded = false;
    }

    pub fn toggle(&mut self, id: NodeId, width: usize) {
        if self.node(id).expanded {
            self.collapse(id);
        } else {
            self.expand(id, width);
        }
    }

    /// Expands the node and everything beneath it.
    pub fn expand_all(&mut self, id: NodeId, width: usize) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if self.expandable(n) {
                self.expand(n, width);
                stack.extend(self.node(n).children.iter().copied());
            }
        }
    }

    /// Recomputes the glyph prefixes and both renderings for one node.
    pub fn reformat(&mut self, id: NodeId, width: usize) {
        let depth = self.node(id).depth;
        let levels = ((width.saturating_sub(1)) / COL_WIDTH).max(1);
        let maxdepth = if depth == 0 { 0 } else { (depth - 1) % levels };

        let ancestor_cols = |tree: &Tree, start: Option<NodeId>, from_level: usize| -> String {
            let mut flags = Vec::new();
            let mut cur = start;
            let mut level = from_level;
            while let Some(n) = cur {
                let node = tree.node(n);
                if node.parent.is_none() || level > maxdepth {
                    break;
                }
                flags.push(node.last_child);
                cur = node.parent;
                level += 1;
            }
            flags
                .into_iter()
                .rev()
                .map(|last| if last { "    " } else { "│   " })
                .collect()
        };

        let parent = self.node(id).parent;
        let prefix_first = match parent {
            None => String::new(),
            Some(p) => {
                let branch = if self.node(id).last_child { "└" } else { "├" };
                format!("{}{}── ", ancestor_cols(self, Some(p), 1), branch)
            }
        };
        let prefix_rest = ancestor_cols(self, Some(id), 0);

        let contentw = width - ((maxdepth + 1) * COL_WIDTH) % width;
        let doc_id = self.node(id).doc;
        let body = self.doc.content_fmt(doc_id).wrap(contentw);
        let label = self.doc.label_fmt(doc_id).wrap(contentw);

        let node = self.node_mut(id);
        node.prefix_first = prefix_first;
        node.prefix_rest = prefix_rest;
        node.body = body;
        node.label = label;
        node.search = None;
    }

    /// Reformats every visible node at a new width.
    pub fn reformat_all(&mut self, width: usize) {
        let mut cur = Some(self.root);
        while let Some(id) = cur {
            self.reformat(id, width);
            cur = self.node(id).next;
        }
    }

    /// Brings the node's search cache in line with the active query.
    pub fn ensure_search(&mut self, id: NodeId, query: Option<&str>) {
        match query {
            None => self.node_mut(id).search = None,
            Some(q) => {
                let expanded = self.node(id).expanded;
                let fresh = match &self.node(id).search {
                    Some(c) => c.query != q || c.expanded != expanded,
                    None => true,
                };
                if fresh {
                    let hits = self.displayed(id).search(q);
                    self.node_mut(id).search =
                        Some(SearchCache { query: q.to_string(), expanded, hits });
                }
            }
        }
    }

    /// The cached hits, if a query is set.
    pub fn hits(&self, id: NodeId) -> Option<&[Hit]> {
        self.node(id).search.as_ref().map(|c| c.hits.as_slice())
    }

    /// Rows of this node touched by its cached hits.
    pub fn match_lines(&self, id: NodeId) -> Vec<usize> {
        match self.hits(id) {
            Some(hits) if !hits.is_empty() => self.displayed(id).match_lines(hits),
            _ => Vec::new(),
        }
    }

    pub fn has_matches(&self, id: NodeId) -> bool {
        self.hits(id).map_or(false, |h| !h.is_empty())
    }
}
