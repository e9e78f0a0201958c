use std::ptr::NonNull;

use crate::{
    base_node::{BaseNode, Node, NodeIter, NodeType},
    node_ptr::NodePtr,
};

/// Directly indexed node; a null slot means the byte is absent. Leaves are
/// tagged and therefore never null, so no separate occupancy mask is needed.
#[repr(C)]
#[repr(align(8))]
pub(crate) struct Node256 {
    base: BaseNode,

    children: [NodePtr; 256],
}


pub(crate) struct Node256Iter<'a> {
    start: u16,
    end: u16,
    node: &'a Node256,
}

impl Iterator for Node256Iter<'_> {
    type Item = (u8, NodePtr);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.start > self.end {
                return None;
            }
            let cur = self.start as usize;
            self.start += 1;

            if !self.node.children[cur].is_null() {
                return Some((cur as u8, self.node.children[cur]));
            }
        }
    }
}

impl Node for Node256 {
    fn get_type() -> NodeType {
        NodeType::N256
    }

    fn base(&self) -> &BaseNode {
        &self.base
    }

    fn is_full(&self) -> bool {
        false
    }

    fn is_under_full(&self) -> bool {
        self.base.meta.count == 37
    }

    fn insert(&mut self, key: u8, node: NodePtr) {
        debug_assert!(self.children[key as usize].is_null());
        self.children[key as usize] = node;
        self.base.meta.count += 1;
    }

    fn get_child(&self, key: u8) -> Option<NodePtr> {
        let child = self.children[key as usize];
        if child.is_null() {
            None
        } else {
            Some(child)
        }
    }

    fn get_child_slot(&mut self, key: u8) -> Option<NonNull<NodePtr>> {
        if self.children[key as usize].is_null() {
            None
        } else {
            Some(NonNull::from(&mut self.children[key as usize]))
        }
    }

    fn get_children(&self, start: u8, end: u8) -> NodeIter<'_> {
        NodeIter::N256(Node256Iter {
            start: start as u16,
            end: end as u16,
            node: self,
        })
    }

    fn remove(&mut self, k: u8) {
        debug_assert!(!self.children[k as usize].is_null());
        self.children[k as usize] = NodePtr::null();
        self.base.meta.count -= 1;
    }

    fn copy_to<N: Node>(&self, dst: &mut N) {
        for (i, c) in self.children.iter().enumerate() {
            if !c.is_null() {
                dst.insert(i as u8, *c);
            }
        }
    }

    fn seek_slot(&self, key: u8) -> Option<(u16, bool)> {
        for b in key as usize..256 {
            if !self.children[b].is_null() {
                return Some((b as u16, b == key as usize));
            }
        }
        None
    }

    fn child_at(&self, cursor: u16) -> Option<NodePtr> {
        let child = self.children[cursor as usize];
        if child.is_null() {
            None
        } else {
            Some(child)
        }
    }

    fn next_cursor(&self, cursor: u16) -> Option<u16> {
        for b in cursor as usize + 1..256 {
            if !self.children[b].is_null() {
                return Some(b as u16);
            }
        }
        None
    }

    fn first_cursor(&self) -> Option<u16> {
        for b in 0..256 {
            if !self.children[b].is_null() {
                return Some(b as u16);
            }
        }
        None
    }
}
