use std::cmp::Ordering;
use std::ptr::NonNull;

use crate::{
    base_node::{BaseNode, MAX_PREFIX_LEN},
    key::LoadKey,
    node_ptr::NodePtr,
    static_node::{self, StaticNode, StaticNodePtr},
    tree::minimum,
};

/// Ancestor frame of the cursor. For N4/N16 (and the dense static layouts)
/// `cursor` is a slot index; for N48/N256 (and the full static layouts) it
/// is a key byte.
struct NodeCursor {
    node: NonNull<BaseNode>,
    cursor: u16,
}

/// Lower-bound cursor over the dynamic tree: an explicit stack of ancestor
/// frames positioned by `lower_bound`, advanced leaf by leaf in byte-lex
/// order.
pub(crate) struct RangeCursor<'a, const K_LEN: usize, L: LoadKey<K_LEN>> {
    loader: &'a L,
    stack: Vec<NodeCursor>,
    pending: Option<u64>,
}

impl<'a, const K_LEN: usize, L: LoadKey<K_LEN>> RangeCursor<'a, K_LEN, L> {
    pub(crate) fn lower_bound(root: NodePtr, key: &[u8; K_LEN], loader: &'a L) -> Self {
        let mut cursor = Self {
            loader,
            stack: Vec::new(),
            pending: None,
        };
        let leaf = cursor.descend(root, key);
        if !leaf.is_null() {
            let value = leaf.leaf_value();
            let leaf_key = loader.load(value);
            // A lazily expanded leaf found on the equal-prefix path may still
            // be smaller than the search key in its unstored suffix.
            if leaf_key[..] < key[..] {
                cursor.pending = cursor.advance();
            } else {
                cursor.pending = Some(value);
            }
        }
        cursor
    }

    fn descend(&mut self, mut node: NodePtr, key: &[u8; K_LEN]) -> NodePtr {
        let mut depth = 0usize;
        while !node.is_null() {
            if node.is_leaf() {
                return node;
            }

            let inner_ptr = node.as_node();
            let inner = unsafe { inner_ptr.as_ref() };

            match self.compare_prefix(node, key, depth) {
                // Key sorts below the whole subtree: its leftmost leaf is
                // the answer.
                Ordering::Less => return self.minimum_record_path(node),
                // Key sorts above the whole subtree: backtrack to the next
                // sibling subtree.
                Ordering::Greater => {
                    let next = self.next_slot();
                    return self.minimum_record_path(next);
                }
                Ordering::Equal => {}
            }
            depth += inner.prefix_len() as usize;

            match inner.seek_slot(key[depth]) {
                Some((cursor, exact)) => {
                    self.stack.push(NodeCursor {
                        node: inner_ptr,
                        cursor,
                    });
                    let child = inner.child_at(cursor).unwrap();
                    if exact {
                        node = child;
                        depth += 1;
                    } else {
                        return self.minimum_record_path(child);
                    }
                }
                None => {
                    let next = self.next_slot();
                    return self.minimum_record_path(next);
                }
            }
        }
        NodePtr::null()
    }

    /// Three-way comparison of the key slice at `depth` against the node's
    /// compressed path; the tail beyond the inline cap comes from the
    /// subtree's smallest leaf.
    fn compare_prefix(&self, node: NodePtr, key: &[u8; K_LEN], depth: usize) -> Ordering {
        let inner_ptr = node.as_node();
        let inner = unsafe { inner_ptr.as_ref() };
        let prefix_len = inner.prefix_len() as usize;
        let inline = inner.prefix();

        for (pos, p) in inline.iter().enumerate() {
            match key[depth + pos].cmp(p) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        if prefix_len > MAX_PREFIX_LEN {
            let min_key = self.loader.load(minimum(node).leaf_value());
            for pos in MAX_PREFIX_LEN..prefix_len {
                match key[depth + pos].cmp(&min_key[depth + pos]) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
        }
        Ordering::Equal
    }

    /// Descends to the subtree's leftmost leaf, recording a frame per level.
    fn minimum_record_path(&mut self, node: NodePtr) -> NodePtr {
        let mut n = node;
        while !n.is_null() && !n.is_leaf() {
            let inner_ptr = n.as_node();
            let inner = unsafe { inner_ptr.as_ref() };
            match inner.first_cursor() {
                Some(cursor) => {
                    self.stack.push(NodeCursor {
                        node: inner_ptr,
                        cursor,
                    });
                    n = inner.child_at(cursor).unwrap();
                }
                None => return NodePtr::null(),
            }
        }
        n
    }

    /// Pops frames while advancing the top cursor; the first frame with a
    /// further child yields it.
    fn next_slot(&mut self) -> NodePtr {
        while let Some(top) = self.stack.last_mut() {
            let node_ptr = top.node;
            let inner = unsafe { node_ptr.as_ref() };
            if let Some(next) = inner.next_cursor(top.cursor) {
                top.cursor = next;
                return inner.child_at(next).unwrap();
            }
            self.stack.pop();
        }
        NodePtr::null()
    }

    fn advance(&mut self) -> Option<u64> {
        let next = self.next_slot();
        let leaf = self.minimum_record_path(next);
        if leaf.is_null() {
            None
        } else {
            Some(leaf.leaf_value())
        }
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>> Iterator for RangeCursor<'_, K_LEN, L> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self.pending.take() {
            Some(v) => Some(v),
            None => self.advance(),
        }
    }
}

struct StaticNodeCursor {
    node: NonNull<StaticNode>,
    cursor: u16,
}

/// Lower-bound cursor over the static tree, with frame semantics analogous
/// to the dynamic one (slot indices for the dense layouts, key bytes for the
/// full ones).
pub(crate) struct StaticRangeCursor<'a, const K_LEN: usize, L: LoadKey<K_LEN>> {
    loader: &'a L,
    stack: Vec<StaticNodeCursor>,
    pending: Option<u64>,
}

impl<'a, const K_LEN: usize, L: LoadKey<K_LEN>> StaticRangeCursor<'a, K_LEN, L> {
    pub(crate) fn lower_bound(root: StaticNodePtr, key: &[u8; K_LEN], loader: &'a L) -> Self {
        let mut cursor = Self {
            loader,
            stack: Vec::new(),
            pending: None,
        };
        let leaf = cursor.descend(root, key);
        if !leaf.is_null() {
            let value = leaf.leaf_value();
            let leaf_key = loader.load(value);
            if leaf_key[..] < key[..] {
                cursor.pending = cursor.advance();
            } else {
                cursor.pending = Some(value);
            }
        }
        cursor
    }

    fn descend(&mut self, mut node: StaticNodePtr, key: &[u8; K_LEN]) -> StaticNodePtr {
        let mut depth = 0usize;
        while !node.is_null() {
            if node.is_leaf() {
                return node;
            }

            let inner_ptr = node.as_node();
            let inner = unsafe { inner_ptr.as_ref() };

            match self.compare_prefix(node, key, depth) {
                Ordering::Less => return self.minimum_record_path(node),
                Ordering::Greater => {
                    let next = self.next_slot();
                    return self.minimum_record_path(next);
                }
                Ordering::Equal => {}
            }
            depth += unsafe { static_node::prefix_len(inner) } as usize;

            match unsafe { static_node::seek_slot(inner, key[depth]) } {
                Some((cursor, exact)) => {
                    self.stack.push(StaticNodeCursor {
                        node: inner_ptr,
                        cursor,
                    });
                    let child = unsafe { static_node::child_at(inner, cursor) }.unwrap();
                    if exact {
                        node = child;
                        depth += 1;
                    } else {
                        return self.minimum_record_path(child);
                    }
                }
                None => {
                    let next = self.next_slot();
                    return self.minimum_record_path(next);
                }
            }
        }
        StaticNodePtr::null()
    }

    fn compare_prefix(&self, node: StaticNodePtr, key: &[u8; K_LEN], depth: usize) -> Ordering {
        let inner_ptr = node.as_node();
        let inner = unsafe { inner_ptr.as_ref() };
        let prefix_len = unsafe { static_node::prefix_len(inner) } as usize;
        let inline = unsafe { static_node::prefix_inline(inner) };

        for (pos, p) in inline.iter().enumerate() {
            match key[depth + pos].cmp(p) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        if prefix_len > MAX_PREFIX_LEN {
            let min_leaf = unsafe { static_node::minimum(node) };
            let min_key = self.loader.load(min_leaf.leaf_value());
            for pos in MAX_PREFIX_LEN..prefix_len {
                match key[depth + pos].cmp(&min_key[depth + pos]) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
        }
        Ordering::Equal
    }

    fn minimum_record_path(&mut self, node: StaticNodePtr) -> StaticNodePtr {
        let mut n = node;
        while !n.is_null() && !n.is_leaf() {
            let inner_ptr = n.as_node();
            let inner = unsafe { inner_ptr.as_ref() };
            match unsafe { static_node::first_cursor(inner) } {
                Some(cursor) => {
                    self.stack.push(StaticNodeCursor {
                        node: inner_ptr,
                        cursor,
                    });
                    n = unsafe { static_node::child_at(inner, cursor) }.unwrap();
                }
                None => return StaticNodePtr::null(),
            }
        }
        n
    }

    fn next_slot(&mut self) -> StaticNodePtr {
        while let Some(top) = self.stack.last_mut() {
            let node_ptr = top.node;
            let inner = unsafe { node_ptr.as_ref() };
            if let Some(next) = unsafe { static_node::next_cursor(inner, top.cursor) } {
                top.cursor = next;
                return unsafe { static_node::child_at(inner, next) }.unwrap();
            }
            self.stack.pop();
        }
        StaticNodePtr::null()
    }

    fn advance(&mut self) -> Option<u64> {
        let next = self.next_slot();
        let leaf = self.minimum_record_path(next);
        if leaf.is_null() {
            None
        } else {
            Some(leaf.leaf_value())
        }
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>> Iterator for StaticRangeCursor<'_, K_LEN, L> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match self.pending.take() {
            Some(v) => Some(v),
            None => self.advance(),
        }
    }
}

/// Iterator over values in byte-lex key order, starting at the smallest key
/// greater than or equal to the `lower_bound` input. Returned by
/// [`HybridArt::lower_bound`](crate::HybridArt::lower_bound); visits the
/// dynamic and static trees together when both exist.
pub struct Scanner<'a, const K_LEN: usize, L: LoadKey<K_LEN>>(ScannerInner<'a, K_LEN, L>);

enum ScannerInner<'a, const K_LEN: usize, L: LoadKey<K_LEN>> {
    Dynamic(RangeCursor<'a, K_LEN, L>),
    Static(StaticRangeCursor<'a, K_LEN, L>),
    Merged(MergedCursor<'a, K_LEN, L>),
}

/// Merge-sorts the two generations by loaded key. On a tie the dynamic
/// value wins and the static one is skipped, so scans shadow merged state
/// exactly like point lookups.
struct MergedCursor<'a, const K_LEN: usize, L: LoadKey<K_LEN>> {
    loader: &'a L,
    dynamic: RangeCursor<'a, K_LEN, L>,
    fixed: StaticRangeCursor<'a, K_LEN, L>,
    dynamic_head: Option<u64>,
    fixed_head: Option<u64>,
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>> MergedCursor<'_, K_LEN, L> {
    fn next(&mut self) -> Option<u64> {
        match (self.dynamic_head, self.fixed_head) {
            (None, None) => None,
            (Some(d), None) => {
                self.dynamic_head = self.dynamic.next();
                Some(d)
            }
            (None, Some(s)) => {
                self.fixed_head = self.fixed.next();
                Some(s)
            }
            (Some(d), Some(s)) => match self.loader.load(d).cmp(&self.loader.load(s)) {
                Ordering::Less => {
                    self.dynamic_head = self.dynamic.next();
                    Some(d)
                }
                Ordering::Greater => {
                    self.fixed_head = self.fixed.next();
                    Some(s)
                }
                Ordering::Equal => {
                    self.dynamic_head = self.dynamic.next();
                    self.fixed_head = self.fixed.next();
                    Some(d)
                }
            },
        }
    }
}

impl<'a, const K_LEN: usize, L: LoadKey<K_LEN>> Scanner<'a, K_LEN, L> {
    pub(crate) fn dynamic(cursor: RangeCursor<'a, K_LEN, L>) -> Self {
        Scanner(ScannerInner::Dynamic(cursor))
    }

    pub(crate) fn fixed(cursor: StaticRangeCursor<'a, K_LEN, L>) -> Self {
        Scanner(ScannerInner::Static(cursor))
    }

    pub(crate) fn merged(
        mut dynamic: RangeCursor<'a, K_LEN, L>,
        mut fixed: StaticRangeCursor<'a, K_LEN, L>,
        loader: &'a L,
    ) -> Self {
        let dynamic_head = dynamic.next();
        let fixed_head = fixed.next();
        Scanner(ScannerInner::Merged(MergedCursor {
            loader,
            dynamic,
            fixed,
            dynamic_head,
            fixed_head,
        }))
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>> Iterator for Scanner<'_, K_LEN, L> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        match &mut self.0 {
            ScannerInner::Dynamic(cursor) => cursor.next(),
            ScannerInner::Static(cursor) => cursor.next(),
            ScannerInner::Merged(cursor) => cursor.next(),
        }
    }
}
