use std::ptr::NonNull;

use crate::{
    error::OOMError,
    node_16::{Node16, Node16Iter},
    node_256::{Node256, Node256Iter},
    node_4::{Node4, Node4Iter},
    node_48::{Node48, Node48Iter},
    node_ptr::NodePtr,
    Allocator,
};

/// Inline prefix capacity. Compressed paths longer than this keep only their
/// first 9 bytes in the header; the tail is recovered from a descendant leaf.
pub(crate) const MAX_PREFIX_LEN: usize = 9;

pub(crate) type Prefix = [u8; MAX_PREFIX_LEN];

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum NodeType {
    N4 = 0,
    N16 = 1,
    N48 = 2,
    N256 = 3,
}

impl NodeType {
    pub(crate) fn node_layout(&self) -> std::alloc::Layout {
        match *self {
            NodeType::N4 => std::alloc::Layout::new::<Node4>(),
            NodeType::N16 => std::alloc::Layout::new::<Node16>(),
            NodeType::N48 => std::alloc::Layout::new::<Node48>(),
            NodeType::N256 => std::alloc::Layout::new::<Node256>(),
        }
    }
}

pub(crate) trait Node {
    fn base(&self) -> &BaseNode;
    fn is_full(&self) -> bool;
    /// True once an erase has brought the node down to the threshold where
    /// it shrinks into the next-smaller class.
    fn is_under_full(&self) -> bool;
    fn insert(&mut self, key: u8, node: NodePtr);
    fn get_child(&self, key: u8) -> Option<NodePtr>;
    fn get_child_slot(&mut self, key: u8) -> Option<NonNull<NodePtr>>;
    fn get_children(&self, start: u8, end: u8) -> NodeIter<'_>;
    fn remove(&mut self, k: u8);
    fn copy_to<N: Node>(&self, dst: &mut N);
    fn get_type() -> NodeType
    where
        Self: Sized;

    /// Position of the first live child whose key byte is >= `key`, together
    /// with whether it is an exact hit. Positions are slot indices for
    /// N4/N16 and key bytes for N48/N256, matching the range cursor frames.
    fn seek_slot(&self, key: u8) -> Option<(u16, bool)>;
    fn child_at(&self, cursor: u16) -> Option<NodePtr>;
    fn next_cursor(&self, cursor: u16) -> Option<u16>;
    fn first_cursor(&self) -> Option<u16>;
}

pub(crate) enum NodeIter<'a> {
    N4(Node4Iter<'a>),
    N16(Node16Iter<'a>),
    N48(Node48Iter<'a>),
    N256(Node256Iter<'a>),
}

impl Iterator for NodeIter<'_> {
    type Item = (u8, NodePtr);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            NodeIter::N4(iter) => iter.next(),
            NodeIter::N16(iter) => iter.next(),
            NodeIter::N48(iter) => iter.next(),
            NodeIter::N256(iter) => iter.next(),
        }
    }
}

#[repr(C)]
pub(crate) struct BaseNode {
    pub(crate) meta: NodeMeta,
}

pub(crate) struct NodeMeta {
    /// Logical compressed-path length; may exceed the inline capacity.
    prefix_len: u32,
    pub(crate) count: u16,
    node_type: NodeType,
    prefix: Prefix,
}

#[cfg(test)]
mod layout_assertion {
    use super::*;
    static_assertions::const_assert_eq!(std::mem::size_of::<NodeMeta>(), 16);
    static_assertions::const_assert_eq!(std::mem::align_of::<NodeMeta>(), 4);
    static_assertions::const_assert_eq!(std::mem::size_of::<BaseNode>(), 16);
}

macro_rules! gen_method {
    ($method_name:ident, ($($arg_n:ident : $args:ty),*), $return:ty) => {
        impl BaseNode {
            pub(crate) fn $method_name(&self, $($arg_n : $args),*) -> $return {
                match self.get_type() {
                    NodeType::N4 => {
                        let node = unsafe { &*(self as *const BaseNode as *const Node4) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N16 => {
                        let node = unsafe { &*(self as *const BaseNode as *const Node16) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N48 => {
                        let node = unsafe { &*(self as *const BaseNode as *const Node48) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N256 => {
                        let node = unsafe { &*(self as *const BaseNode as *const Node256) };
                        node.$method_name($($arg_n),*)
                    }
                }
            }
        }
    };
}

macro_rules! gen_method_mut {
    ($method_name:ident, ($($arg_n:ident : $args:ty),*), $return:ty) => {
        impl BaseNode {
            pub(crate) fn $method_name(&mut self, $($arg_n : $args),*) -> $return {
                match self.get_type() {
                    NodeType::N4 => {
                        let node = unsafe { &mut *(self as *mut BaseNode as *mut Node4) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N16 => {
                        let node = unsafe { &mut *(self as *mut BaseNode as *mut Node16) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N48 => {
                        let node = unsafe { &mut *(self as *mut BaseNode as *mut Node48) };
                        node.$method_name($($arg_n),*)
                    }
                    NodeType::N256 => {
                        let node = unsafe { &mut *(self as *mut BaseNode as *mut Node256) };
                        node.$method_name($($arg_n),*)
                    }
                }
            }
        }
    };
}

gen_method!(get_child, (k: u8), Option<NodePtr>);
gen_method!(get_children, (start: u8, end: u8), NodeIter<'_>);
gen_method!(seek_slot, (k: u8), Option<(u16, bool)>);
gen_method!(child_at, (cursor: u16), Option<NodePtr>);
gen_method!(next_cursor, (cursor: u16), Option<u16>);
gen_method!(first_cursor, (), Option<u16>);

gen_method_mut!(get_child_slot, (k: u8), Option<NonNull<NodePtr>>);

impl BaseNode {
    pub(crate) fn new(n_type: NodeType, prefix: &[u8], prefix_len: u32) -> Self {
        debug_assert!(prefix.len() <= MAX_PREFIX_LEN);
        debug_assert!(prefix.len() <= prefix_len as usize);

        let mut prefix_v: Prefix = [0; MAX_PREFIX_LEN];
        prefix_v[..prefix.len()].copy_from_slice(prefix);

        BaseNode {
            meta: NodeMeta {
                prefix_len,
                count: 0,
                node_type: n_type,
                prefix: prefix_v,
            },
        }
    }

    pub(crate) fn make_node<N: Node>(
        prefix: &[u8],
        prefix_len: u32,
        allocator: &impl Allocator,
    ) -> Result<NonNull<N>, OOMError> {
        let layout = N::get_type().node_layout();
        let ptr = allocator.allocate_zeroed(layout)?;
        let base_ptr = ptr.as_ptr() as *mut BaseNode;
        let node = BaseNode::new(N::get_type(), prefix, prefix_len);
        unsafe {
            std::ptr::write(base_ptr, node);

            if matches!(N::get_type(), NodeType::N48) {
                let mem = base_ptr as *mut Node48;
                (*mem).init_empty();
            }

            Ok(NonNull::new_unchecked(base_ptr as *mut N))
        }
    }

    /// # Safety
    /// `node` must be a live node allocated through `make_node` with the
    /// same allocator, and no references into it may outlive this call.
    pub(crate) unsafe fn drop_node(node: NonNull<BaseNode>, allocator: &impl Allocator) {
        let layout = node.as_ref().get_type().node_layout();
        allocator.deallocate(node.cast::<u8>(), layout);
    }

    pub(crate) fn get_type(&self) -> NodeType {
        self.meta.node_type
    }

    pub(crate) fn get_count(&self) -> usize {
        self.meta.count as usize
    }

    /// Logical compressed-path length, which may exceed what `prefix()`
    /// returns.
    pub(crate) fn prefix_len(&self) -> u32 {
        self.meta.prefix_len
    }

    /// The inline portion of the compressed path.
    pub(crate) fn prefix(&self) -> &[u8] {
        let inline = (self.meta.prefix_len as usize).min(MAX_PREFIX_LEN);
        &self.meta.prefix[..inline]
    }

    pub(crate) fn set_prefix(&mut self, prefix: &[u8], prefix_len: u32) {
        debug_assert!(prefix.len() <= MAX_PREFIX_LEN);
        self.meta.prefix[..prefix.len()].copy_from_slice(prefix);
        self.meta.prefix_len = prefix_len;
    }
}
