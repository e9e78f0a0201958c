use std::ptr::NonNull;

use crate::{
    base_node::{BaseNode, Node, NodeType, MAX_PREFIX_LEN},
    error::ArtError,
    key::LoadKey,
    node_16::Node16,
    node_256::Node256,
    node_4::Node4,
    node_48::Node48,
    node_ptr::NodePtr,
    static_node::{self, StaticNode, StaticNodePtr},
    Allocator, DefaultAllocator,
};

/// Per-class node population, maintained by the mutator and the merger.
#[derive(Default, Clone, Copy, Debug)]
pub(crate) struct ClassCounts {
    pub(crate) n4: usize,
    pub(crate) n16: usize,
    pub(crate) n48: usize,
    pub(crate) n256: usize,
    pub(crate) d: usize,
    pub(crate) dp: usize,
    pub(crate) f: usize,
    pub(crate) fp: usize,
}

impl ClassCounts {
    fn add(&mut self, t: NodeType) {
        match t {
            NodeType::N4 => self.n4 += 1,
            NodeType::N16 => self.n16 += 1,
            NodeType::N48 => self.n48 += 1,
            NodeType::N256 => self.n256 += 1,
        }
    }

    fn sub(&mut self, t: NodeType) {
        match t {
            NodeType::N4 => self.n4 -= 1,
            NodeType::N16 => self.n16 -= 1,
            NodeType::N48 => self.n48 -= 1,
            NodeType::N256 => self.n256 -= 1,
        }
    }
}

/// The hybrid tree proper: a mutable dynamic root and, after a merge, a
/// read-only static root sharing the same leaf encoding.
pub(crate) struct RawArt<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator = DefaultAllocator> {
    pub(crate) root: NodePtr,
    pub(crate) static_root: StaticNodePtr,
    pub(crate) loader: L,
    pub(crate) allocator: A,
    pub(crate) memory: usize,
    pub(crate) static_memory: usize,
    pub(crate) counts: ClassCounts,
}

unsafe impl<const K_LEN: usize, L: LoadKey<K_LEN> + Send, A: Allocator + Send> Send
    for RawArt<K_LEN, L, A>
{
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator> RawArt<K_LEN, L, A> {
    pub(crate) fn new(loader: L, allocator: A) -> Self {
        RawArt {
            root: NodePtr::null(),
            static_root: StaticNodePtr::null(),
            loader,
            allocator,
            memory: 0,
            static_memory: 0,
            counts: ClassCounts::default(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_null() && self.static_root.is_null()
    }

    fn alloc_node<N: Node>(&mut self, prefix: &[u8], prefix_len: u32) -> Result<NonNull<N>, ArtError> {
        let node = BaseNode::make_node::<N>(prefix, prefix_len, &self.allocator)?;
        self.memory += N::get_type().node_layout().size();
        self.counts.add(N::get_type());
        Ok(node)
    }

    pub(crate) unsafe fn dealloc_node(&mut self, node: NonNull<BaseNode>) {
        let t = node.as_ref().get_type();
        self.memory -= t.node_layout().size();
        self.counts.sub(t);
        BaseNode::drop_node(node, &self.allocator);
    }

    /// Point lookup on the dynamic tree, optimistic version: prefixes longer
    /// than the inline cap are skipped and the final leaf is verified
    /// against the full loaded key.
    pub(crate) fn get(&self, key: &[u8; K_LEN]) -> Option<u64> {
        let mut node = self.root;
        let mut depth = 0;
        let mut skipped_prefix = false;

        while !node.is_null() {
            if node.is_leaf() {
                let value = node.leaf_value();
                if !skipped_prefix && depth == K_LEN {
                    return Some(value);
                }
                let leaf_key = self.loader.load(value);
                let start = if skipped_prefix { 0 } else { depth };
                if leaf_key[start..] != key[start..] {
                    return None;
                }
                return Some(value);
            }

            let inner_ptr = node.as_node();
            let inner = unsafe { inner_ptr.as_ref() };
            let prefix_len = inner.prefix_len() as usize;
            if prefix_len > 0 {
                for (pos, p) in inner.prefix().iter().enumerate() {
                    if key[depth + pos] != *p {
                        return None;
                    }
                }
                if prefix_len > MAX_PREFIX_LEN {
                    skipped_prefix = true;
                }
                depth += prefix_len;
            }

            node = inner.get_child(key[depth])?;
            depth += 1;
        }
        None
    }

    /// Point lookup on the static tree. One dispatch per node; each layout
    /// case is exclusive.
    pub(crate) fn get_static(&self, key: &[u8; K_LEN]) -> Option<u64> {
        let mut node = self.static_root;
        let mut depth = 0;
        let mut skipped_prefix = false;

        while !node.is_null() {
            if node.is_leaf() {
                let value = node.leaf_value();
                if !skipped_prefix && depth == K_LEN {
                    return Some(value);
                }
                let leaf_key = self.loader.load(value);
                let start = if skipped_prefix { 0 } else { depth };
                if leaf_key[start..] != key[start..] {
                    return None;
                }
                return Some(value);
            }

            let inner_ptr = node.as_node();
            let inner = unsafe { inner_ptr.as_ref() };
            let prefix_len = unsafe { static_node::prefix_len(inner) } as usize;
            if prefix_len > 0 {
                let inline = unsafe { static_node::prefix_inline(inner) };
                for (pos, p) in inline.iter().enumerate() {
                    if key[depth + pos] != *p {
                        return None;
                    }
                }
                if prefix_len > MAX_PREFIX_LEN {
                    skipped_prefix = true;
                }
                depth += prefix_len;
            }

            node = unsafe { static_node::find_child(inner, key[depth]) };
            depth += 1;
        }
        None
    }

    pub(crate) fn insert(&mut self, key: &[u8; K_LEN], value: u64) -> Result<bool, ArtError> {
        debug_assert!(value < 1 << 63);
        let root_ref: *mut NodePtr = &mut self.root;
        unsafe { self.insert_rec(root_ref, key, 0, value) }
    }

    unsafe fn insert_rec(
        &mut self,
        node_ref: *mut NodePtr,
        key: &[u8; K_LEN],
        mut depth: usize,
        value: u64,
    ) -> Result<bool, ArtError> {
        let node = *node_ref;

        if node.is_null() {
            *node_ref = NodePtr::from_leaf(value);
            return Ok(true);
        }

        if node.is_leaf() {
            // Replace the leaf with a Node4 holding both keys under their
            // common path.
            let existing_key = self.loader.load(node.leaf_value());
            let mut new_prefix_len = 0;
            while depth + new_prefix_len < K_LEN
                && existing_key[depth + new_prefix_len] == key[depth + new_prefix_len]
            {
                new_prefix_len += 1;
            }
            if depth + new_prefix_len >= K_LEN {
                // The residual key coincides with the existing leaf.
                return if node.leaf_value() == value {
                    Ok(false)
                } else {
                    Err(ArtError::DuplicateKey)
                };
            }

            let inline = new_prefix_len.min(MAX_PREFIX_LEN);
            let mut new_node = self
                .alloc_node::<Node4>(&key[depth..depth + inline], new_prefix_len as u32)?;
            new_node
                .as_mut()
                .insert(existing_key[depth + new_prefix_len], node);
            new_node
                .as_mut()
                .insert(key[depth + new_prefix_len], NodePtr::from_leaf(value));
            *node_ref = NodePtr::from_node(new_node.cast::<BaseNode>());
            return Ok(true);
        }

        let mut inner = node.as_node();
        let prefix_len = inner.as_ref().prefix_len() as usize;
        if prefix_len > 0 {
            let mismatch = self.prefix_mismatch(inner, key, depth);
            if mismatch != prefix_len {
                self.split_prefix(node, node_ref, key, depth, mismatch, value)?;
                return Ok(true);
            }
            depth += prefix_len;
        }

        let byte = key[depth];
        match inner.as_mut().get_child_slot(byte) {
            Some(slot) => self.insert_rec(slot.as_ptr(), key, depth + 1, value),
            None => {
                self.insert_child(inner, node_ref, byte, NodePtr::from_leaf(value))?;
                Ok(true)
            }
        }
    }

    /// The prefix diverges from the key at `mismatch`: allocate a new Node4
    /// holding the matched head, rehome the old node under its divergent
    /// byte with a shortened prefix, and attach the new leaf.
    unsafe fn split_prefix(
        &mut self,
        node: NodePtr,
        node_ref: *mut NodePtr,
        key: &[u8; K_LEN],
        depth: usize,
        mismatch: usize,
        value: u64,
    ) -> Result<(), ArtError> {
        let mut inner = node.as_node();
        let prefix_len = inner.as_ref().prefix_len() as usize;
        debug_assert!(mismatch < prefix_len);

        let head_len = mismatch.min(MAX_PREFIX_LEN);
        let mut head = [0u8; MAX_PREFIX_LEN];
        head[..head_len].copy_from_slice(&inner.as_ref().prefix()[..head_len]);
        let mut new_node = self.alloc_node::<Node4>(&head[..head_len], mismatch as u32)?;

        let shortened = prefix_len - mismatch - 1;
        if prefix_len <= MAX_PREFIX_LEN {
            // The divergent byte and the remaining path are all inline.
            let mut old = [0u8; MAX_PREFIX_LEN];
            old[..prefix_len].copy_from_slice(inner.as_ref().prefix());
            new_node.as_mut().insert(old[mismatch], node);
            inner
                .as_mut()
                .set_prefix(&old[mismatch + 1..mismatch + 1 + shortened], shortened as u32);
        } else {
            // Bytes past the inline cap live only in the leaves; recover the
            // path from the smallest one.
            let min_key = self.loader.load(minimum(node).leaf_value());
            new_node.as_mut().insert(min_key[depth + mismatch], node);
            let keep = shortened.min(MAX_PREFIX_LEN);
            inner.as_mut().set_prefix(
                &min_key[depth + mismatch + 1..depth + mismatch + 1 + keep],
                shortened as u32,
            );
        }

        new_node
            .as_mut()
            .insert(key[depth + mismatch], NodePtr::from_leaf(value));
        *node_ref = NodePtr::from_node(new_node.cast::<BaseNode>());
        Ok(())
    }

    /// Position of the first prefix byte differing from the key, or the full
    /// prefix length when everything matches. Bytes past the inline cap come
    /// from the subtree's smallest leaf.
    pub(crate) unsafe fn prefix_mismatch(
        &self,
        node: NonNull<BaseNode>,
        key: &[u8; K_LEN],
        depth: usize,
    ) -> usize {
        let prefix_len = node.as_ref().prefix_len() as usize;
        let inline = node.as_ref().prefix();

        let mut pos = 0;
        while pos < inline.len() {
            if key[depth + pos] != inline[pos] {
                return pos;
            }
            pos += 1;
        }
        if prefix_len > MAX_PREFIX_LEN {
            let min_key = self.loader.load(minimum(NodePtr::from_node(node)).leaf_value());
            while pos < prefix_len {
                if key[depth + pos] != min_key[depth + pos] {
                    return pos;
                }
                pos += 1;
            }
        }
        pos
    }

    unsafe fn insert_child(
        &mut self,
        node: NonNull<BaseNode>,
        node_ref: *mut NodePtr,
        key_byte: u8,
        child: NodePtr,
    ) -> Result<(), ArtError> {
        match node.as_ref().get_type() {
            NodeType::N4 => self.insert_grow::<Node4, Node16>(node.cast(), node_ref, key_byte, child),
            NodeType::N16 => {
                self.insert_grow::<Node16, Node48>(node.cast(), node_ref, key_byte, child)
            }
            NodeType::N48 => {
                self.insert_grow::<Node48, Node256>(node.cast(), node_ref, key_byte, child)
            }
            NodeType::N256 => {
                self.insert_grow::<Node256, Node256>(node.cast(), node_ref, key_byte, child)
            }
        }
    }

    unsafe fn insert_grow<CurT: Node, BiggerT: Node>(
        &mut self,
        mut n: NonNull<CurT>,
        node_ref: *mut NodePtr,
        key_byte: u8,
        child: NodePtr,
    ) -> Result<(), ArtError> {
        if !n.as_ref().is_full() {
            n.as_mut().insert(key_byte, child);
            return Ok(());
        }

        let mut head = [0u8; MAX_PREFIX_LEN];
        let inline = n.as_ref().base().prefix().len();
        head[..inline].copy_from_slice(n.as_ref().base().prefix());
        let prefix_len = n.as_ref().base().prefix_len();

        let mut big = self.alloc_node::<BiggerT>(&head[..inline], prefix_len)?;
        n.as_ref().copy_to(big.as_mut());
        big.as_mut().insert(key_byte, child);
        *node_ref = NodePtr::from_node(big.cast::<BaseNode>());
        self.dealloc_node(n.cast::<BaseNode>());
        Ok(())
    }

    /// Replaces an existing leaf's value without structural change, or
    /// inserts the key when absent.
    pub(crate) fn upsert(&mut self, key: &[u8; K_LEN], value: u64) -> Result<(), ArtError> {
        debug_assert!(value < 1 << 63);
        let mut node_ref: *mut NodePtr = &mut self.root;
        let mut depth = 0;

        unsafe {
            loop {
                let node = *node_ref;
                if node.is_null() {
                    *node_ref = NodePtr::from_leaf(value);
                    return Ok(());
                }
                if node.is_leaf() {
                    if self.loader.load(node.leaf_value()) == *key {
                        *node_ref = NodePtr::from_leaf(value);
                        return Ok(());
                    }
                    return self.insert_rec(node_ref, key, depth, value).map(|_| ());
                }

                let mut inner = node.as_node();
                let prefix_len = inner.as_ref().prefix_len() as usize;
                if prefix_len > 0 {
                    if self.prefix_mismatch(inner, key, depth) != prefix_len {
                        return self.insert_rec(node_ref, key, depth, value).map(|_| ());
                    }
                    depth += prefix_len;
                }

                let byte = key[depth];
                match inner.as_mut().get_child_slot(byte) {
                    Some(slot) => {
                        node_ref = slot.as_ptr();
                        depth += 1;
                    }
                    None => {
                        self.insert_child(inner, node_ref, byte, NodePtr::from_leaf(value))?;
                        return Ok(());
                    }
                }
            }
        }
    }

    pub(crate) fn erase(&mut self, key: &[u8; K_LEN]) {
        let root_ref: *mut NodePtr = &mut self.root;
        unsafe { self.erase_rec(root_ref, key, 0) }
    }

    unsafe fn erase_rec(&mut self, node_ref: *mut NodePtr, key: &[u8; K_LEN], mut depth: usize) {
        let node = *node_ref;
        if node.is_null() {
            return;
        }

        if node.is_leaf() {
            if self.loader.load(node.leaf_value()) == *key {
                *node_ref = NodePtr::null();
            }
            return;
        }

        let mut inner = node.as_node();
        let prefix_len = inner.as_ref().prefix_len() as usize;
        if prefix_len > 0 {
            if self.prefix_mismatch(inner, key, depth) != prefix_len {
                return;
            }
            depth += prefix_len;
        }

        let byte = key[depth];
        let slot = match inner.as_mut().get_child_slot(byte) {
            Some(slot) => slot,
            None => return,
        };
        let child = *slot.as_ptr();
        if child.is_leaf() {
            if self.loader.load(child.leaf_value()) == *key {
                self.remove_child(inner, node_ref, byte);
            }
        } else {
            self.erase_rec(slot.as_ptr(), key, depth + 1);
        }
    }

    unsafe fn remove_child(
        &mut self,
        node: NonNull<BaseNode>,
        node_ref: *mut NodePtr,
        key_byte: u8,
    ) {
        match node.as_ref().get_type() {
            NodeType::N4 => {
                let mut n = node.cast::<Node4>();
                n.as_mut().remove(key_byte);
                if n.as_ref().base().get_count() == 1 {
                    self.collapse_node4(n, node_ref);
                }
            }
            NodeType::N16 => {
                let mut n = node.cast::<Node16>();
                n.as_mut().remove(key_byte);
                if n.as_ref().is_under_full() {
                    self.shrink_node::<Node16, Node4>(n, node_ref);
                }
            }
            NodeType::N48 => {
                let mut n = node.cast::<Node48>();
                n.as_mut().remove(key_byte);
                if n.as_ref().is_under_full() {
                    self.shrink_node::<Node48, Node16>(n, node_ref);
                }
            }
            NodeType::N256 => {
                let mut n = node.cast::<Node256>();
                n.as_mut().remove(key_byte);
                if n.as_ref().is_under_full() {
                    self.shrink_node::<Node256, Node48>(n, node_ref);
                }
            }
        }
    }

    /// A one-way Node4 disappears: its surviving child inherits the node's
    /// prefix, the connecting byte, and its own prefix, concatenated up to
    /// the inline cap.
    unsafe fn collapse_node4(&mut self, n: NonNull<Node4>, node_ref: *mut NodePtr) {
        let (byte, child) = n
            .as_ref()
            .get_children(0, 255)
            .next()
            .expect("collapsing an empty Node4");

        if !child.is_leaf() {
            let node_prefix_len = n.as_ref().base().prefix_len();
            let mut buf = [0u8; MAX_PREFIX_LEN];
            let inline = n.as_ref().base().prefix();
            let mut len = inline.len();
            buf[..len].copy_from_slice(inline);

            if len < MAX_PREFIX_LEN {
                buf[len] = byte;
                len += 1;
            }
            let mut child_inner = child.as_node();
            if len < MAX_PREFIX_LEN {
                let child_inline = child_inner.as_ref().prefix();
                let l2 = child_inline.len().min(MAX_PREFIX_LEN - len);
                buf[len..len + l2].copy_from_slice(&child_inline[..l2]);
                len += l2;
            }

            let new_len = child_inner.as_ref().prefix_len() + node_prefix_len + 1;
            child_inner.as_mut().set_prefix(&buf[..len], new_len);
        }

        *node_ref = child;
        self.dealloc_node(n.cast::<BaseNode>());
    }

    unsafe fn shrink_node<CurT: Node, SmallerT: Node>(
        &mut self,
        n: NonNull<CurT>,
        node_ref: *mut NodePtr,
    ) {
        let mut head = [0u8; MAX_PREFIX_LEN];
        let inline = n.as_ref().base().prefix().len();
        head[..inline].copy_from_slice(n.as_ref().base().prefix());
        let prefix_len = n.as_ref().base().prefix_len();

        // Shrinking is an optimization; if the allocator is exhausted the
        // node simply stays in its larger class.
        let mut small = match self.alloc_node::<SmallerT>(&head[..inline], prefix_len) {
            Ok(small) => small,
            Err(_) => return,
        };
        n.as_ref().copy_to(small.as_mut());
        *node_ref = NodePtr::from_node(small.cast::<BaseNode>());
        self.dealloc_node(n.cast::<BaseNode>());
    }
}

/// Leaf with the smallest key in the subtree; descends first children.
pub(crate) fn minimum(node: NodePtr) -> NodePtr {
    let mut n = node;
    while !n.is_null() && !n.is_leaf() {
        let inner = n.as_node();
        let inner = unsafe { inner.as_ref() };
        n = match inner.first_cursor() {
            Some(cursor) => inner.child_at(cursor).unwrap(),
            None => NodePtr::null(),
        };
    }
    n
}

/// Leaf with the largest key in the subtree.
pub(crate) fn maximum(node: NodePtr) -> NodePtr {
    let mut n = node;
    while !n.is_null() && !n.is_leaf() {
        let inner = n.as_node();
        let inner = unsafe { inner.as_ref() };
        n = match inner.get_children(0, 255).last() {
            Some((_, child)) => child,
            None => NodePtr::null(),
        };
    }
    n
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator> Drop for RawArt<K_LEN, L, A> {
    fn drop(&mut self) {
        // Dynamic tree: worklist walk, one free per inner node. Leaves are
        // tagged values and own no storage.
        let mut stack: Vec<NonNull<BaseNode>> = Vec::new();
        if !self.root.is_null() && !self.root.is_leaf() {
            stack.push(self.root.as_node());
        }
        while let Some(node) = stack.pop() {
            for (_, child) in unsafe { node.as_ref() }.get_children(0, 255) {
                if !child.is_null() && !child.is_leaf() {
                    stack.push(child.as_node());
                }
            }
            unsafe { BaseNode::drop_node(node, &self.allocator) };
        }

        // Static tree: each node is a single variable-length allocation.
        let mut stack: Vec<NonNull<StaticNode>> = Vec::new();
        if !self.static_root.is_null() && !self.static_root.is_leaf() {
            stack.push(self.static_root.as_node());
        }
        while let Some(node) = stack.pop() {
            unsafe {
                let mut cursor = static_node::first_cursor(node.as_ref());
                while let Some(c) = cursor {
                    if let Some(child) = static_node::child_at(node.as_ref(), c) {
                        if !child.is_leaf() {
                            stack.push(child.as_node());
                        }
                    }
                    cursor = static_node::next_cursor(node.as_ref(), c);
                }
                let layout = static_node::node_layout(node.as_ref());
                self.allocator.deallocate(node.cast::<u8>(), layout);
            }
        }
    }
}
