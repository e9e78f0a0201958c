use std::collections::VecDeque;
use std::ptr::NonNull;

use crate::{
    base_node::BaseNode,
    error::ArtError,
    key::LoadKey,
    node_16::Node16,
    node_ptr::NodePtr,
    static_node::{
        self, NodeD, NodeDP, NodeF, NodeFP, StaticNode, StaticNodePtr, StaticNodeType, DENSE_MAX,
    },
    tree::RawArt,
    Allocator,
};

impl<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator> RawArt<K_LEN, L, A> {
    /// Rebuilds the dynamic tree into the static representation and releases
    /// the dynamic nodes. A no-op when a static root already exists or the
    /// tree is empty; afterwards inserts grow a fresh dynamic tree.
    pub(crate) fn merge(&mut self) -> Result<(), ArtError> {
        if !self.static_root.is_null() {
            return Ok(());
        }
        if self.root.is_null() {
            return Ok(());
        }
        if self.root.is_leaf() {
            // A single-entry tree is just its tagged value; the encodings
            // are identical on both sides.
            self.static_root = StaticNodePtr::from_bits(self.root.bits());
            self.root = NodePtr::null();
            return Ok(());
        }

        let result = self.first_merge();
        // The walk consumes dynamic nodes as it goes; whatever happened, the
        // old root must not be reachable again.
        self.root = NodePtr::null();
        result
    }

    /// Level-order walk over the dynamic tree. Each dequeued node is
    /// rewritten into the static layout chosen by its fan-out and child mix;
    /// non-leaf child slots temporarily keep the dynamic pointer bits and
    /// are back-patched, in BFS order, through a parallel queue of minted
    /// static nodes with a per-parent cursor over its branch slots.
    fn first_merge(&mut self) -> Result<(), ArtError> {
        let mut node_queue: VecDeque<NonNull<BaseNode>> = VecDeque::new();
        let mut parent_queue: VecDeque<NonNull<StaticNode>> = VecDeque::new();
        let mut minted: Vec<NonNull<StaticNode>> = Vec::new();
        node_queue.push_back(self.root.as_node());

        let mut parent: Option<NonNull<StaticNode>> = None;
        let mut parent_pos: Option<u16> = None;

        while let Some(n) = node_queue.pop_front() {
            let s = match unsafe { self.rewrite_node(n, &mut node_queue) } {
                Ok(s) => s,
                Err(e) => {
                    unsafe { self.abort_merge(n, node_queue, minted) };
                    return Err(e);
                }
            };
            minted.push(s);
            parent_queue.push_back(s);

            match (parent, parent_pos) {
                (Some(p), Some(pos)) => unsafe {
                    write_branch_slot(p, pos, StaticNodePtr::from_node(s));
                },
                _ => {
                    // First minted node: it becomes the static root and the
                    // first wiring parent.
                    parent = Some(s);
                    self.static_root = StaticNodePtr::from_node(s);
                }
            }

            loop {
                let p = match parent {
                    Some(p) => p,
                    None => break,
                };
                let from = match parent_pos {
                    Some(pos) => pos + 1,
                    None => 0,
                };
                match unsafe { next_branch_slot(p, from) } {
                    Some(pos) => {
                        parent_pos = Some(pos);
                        break;
                    }
                    None => {
                        parent_queue.pop_front();
                        parent = parent_queue.front().copied();
                        parent_pos = None;
                        if parent.is_none() {
                            break;
                        }
                    }
                }
            }

            unsafe { self.dealloc_node(n) };
        }

        debug_assert_eq!(self.memory, 0);
        Ok(())
    }

    /// Allocation failed mid-walk: release the unprocessed dynamic subtrees
    /// and every minted static node (their slots may still hold placeholder
    /// bits, so they are freed flat, without traversal).
    unsafe fn abort_merge(
        &mut self,
        current: NonNull<BaseNode>,
        mut node_queue: VecDeque<NonNull<BaseNode>>,
        minted: Vec<NonNull<StaticNode>>,
    ) {
        node_queue.push_front(current);
        while let Some(n) = node_queue.pop_front() {
            for (_, child) in n.as_ref().get_children(0, 255) {
                if !child.is_leaf() {
                    node_queue.push_back(child.as_node());
                }
            }
            self.dealloc_node(n);
        }

        for s in minted {
            let layout = static_node::node_layout(s.as_ref());
            self.allocator.deallocate(s.cast::<u8>(), layout);
        }
        self.static_root = StaticNodePtr::null();
        self.static_memory = 0;
        self.counts.d = 0;
        self.counts.dp = 0;
        self.counts.f = 0;
        self.counts.fp = 0;
    }

    /// Mints the static counterpart of one dynamic node and enqueues its
    /// non-leaf children.
    unsafe fn rewrite_node(
        &mut self,
        n: NonNull<BaseNode>,
        node_queue: &mut VecDeque<NonNull<BaseNode>>,
    ) -> Result<NonNull<StaticNode>, ArtError> {
        let n_ref = n.as_ref();
        let node_count = n_ref.get_count();
        let prefix_len = n_ref.prefix_len();
        let has_prefix = prefix_len > 0;
        let dense = node_count <= DENSE_MAX && !is_inner_only(n_ref);

        let size = match (dense, has_prefix) {
            (true, false) => NodeD::size_for(node_count),
            (true, true) => NodeDP::size_for(node_count, prefix_len as usize),
            (false, false) => NodeF::size_for(),
            (false, true) => NodeFP::size_for(prefix_len as usize),
        };
        let layout = std::alloc::Layout::from_size_align(size, 8).unwrap();
        let mem = self.allocator.allocate_zeroed(layout)?.as_ptr() as *mut u8;

        let s: NonNull<StaticNode> = if dense {
            if has_prefix {
                let mut node = NodeDP::init(mem, node_count as u8, prefix_len);
                node.as_mut().set_prefix(n_ref.prefix());
                let mut slot = 0;
                for (byte, child) in n_ref.get_children(0, 255) {
                    if !child.is_leaf() {
                        node_queue.push_back(child.as_node());
                    }
                    node.as_mut().set_key(slot, Node16::flip_sign(byte));
                    node.as_mut()
                        .set_child(slot, StaticNodePtr::from_bits(child.bits()));
                    slot += 1;
                }
                self.counts.dp += 1;
                node.cast()
            } else {
                let mut node = NodeD::init(mem, node_count as u8);
                let mut slot = 0;
                for (byte, child) in n_ref.get_children(0, 255) {
                    if !child.is_leaf() {
                        node_queue.push_back(child.as_node());
                    }
                    node.as_mut().set_key(slot, Node16::flip_sign(byte));
                    node.as_mut()
                        .set_child(slot, StaticNodePtr::from_bits(child.bits()));
                    slot += 1;
                }
                self.counts.d += 1;
                node.cast()
            }
        } else if has_prefix {
            let mut node = NodeFP::init(mem, node_count as u16, prefix_len);
            node.as_mut().set_prefix(n_ref.prefix());
            for (byte, child) in n_ref.get_children(0, 255) {
                if !child.is_leaf() {
                    node_queue.push_back(child.as_node());
                }
                node.as_mut()
                    .set_child(byte, StaticNodePtr::from_bits(child.bits()));
            }
            self.counts.fp += 1;
            node.cast()
        } else {
            let mut node = NodeF::init(mem, node_count as u16);
            for (byte, child) in n_ref.get_children(0, 255) {
                if !child.is_leaf() {
                    node_queue.push_back(child.as_node());
                }
                node.as_mut()
                    .set_child(byte, StaticNodePtr::from_bits(child.bits()));
            }
            self.counts.f += 1;
            node.cast()
        };

        self.static_memory += size;
        Ok(s)
    }
}

/// True when no child of the node is a leaf; such nodes take the full
/// 256-slot layout regardless of fan-out.
fn is_inner_only(n: &BaseNode) -> bool {
    for (_, child) in n.get_children(0, 255) {
        if child.is_leaf() {
            return false;
        }
    }
    true
}

unsafe fn write_branch_slot(p: NonNull<StaticNode>, pos: u16, child: StaticNodePtr) {
    match p.as_ref().get_type() {
        StaticNodeType::D => p.cast::<NodeD>().as_mut().set_child(pos as usize, child),
        StaticNodeType::DP => p.cast::<NodeDP>().as_mut().set_child(pos as usize, child),
        StaticNodeType::F => p.cast::<NodeF>().as_mut().set_child(pos as u8, child),
        StaticNodeType::FP => p.cast::<NodeFP>().as_mut().set_child(pos as u8, child),
    }
}

/// Next slot of `p` at or after `from` that holds a non-leaf child (still a
/// placeholder or an already-wired static node).
unsafe fn next_branch_slot(p: NonNull<StaticNode>, from: u16) -> Option<u16> {
    let node = p.as_ref();
    match node.get_type() {
        StaticNodeType::D | StaticNodeType::DP => {
            let count = static_node::count(node) as u16;
            let mut pos = from;
            while pos < count {
                let child = static_node::child_at(node, pos).unwrap();
                if !child.is_leaf() {
                    return Some(pos);
                }
                pos += 1;
            }
            None
        }
        StaticNodeType::F | StaticNodeType::FP => {
            let mut pos = from as usize;
            while pos < 256 {
                if let Some(child) = static_node::child_at(node, pos as u16) {
                    if !child.is_leaf() {
                        return Some(pos as u16);
                    }
                }
                pos += 1;
            }
            None
        }
    }
}
