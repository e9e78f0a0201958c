use std::ptr::NonNull;

use crate::{
    base_node::{BaseNode, Node, NodeIter, NodeType},
    node_ptr::NodePtr,
};

pub(crate) const EMPTY_MARKER: u8 = 48;

#[repr(C)]
#[repr(align(8))]
pub(crate) struct Node48 {
    base: BaseNode,

    pub(crate) child_idx: [u8; 256],
    children: [NodePtr; 48],
}


impl Node48 {
    pub(crate) fn init_empty(&mut self) {
        for v in self.child_idx.iter_mut() {
            *v = EMPTY_MARKER;
        }
        for child in self.children.iter_mut() {
            *child = NodePtr::null();
        }
    }
}

pub(crate) struct Node48Iter<'a> {
    start: u16,
    end: u16,
    node: &'a Node48,
}

impl Iterator for Node48Iter<'_> {
    type Item = (u8, NodePtr);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.start > self.end {
                return None;
            }

            let key = self.start as usize;
            self.start += 1;

            let child_loc = self.node.child_idx[key];
            if child_loc != EMPTY_MARKER {
                return Some((key as u8, self.node.children[child_loc as usize]));
            }
        }
    }
}

impl Node for Node48 {
    fn get_type() -> NodeType {
        NodeType::N48
    }

    fn base(&self) -> &BaseNode {
        &self.base
    }

    fn is_full(&self) -> bool {
        self.base.meta.count == 48
    }

    fn is_under_full(&self) -> bool {
        self.base.meta.count == 12
    }

    fn insert(&mut self, key: u8, node: NodePtr) {
        // Erases leave holes anywhere in the dense array, so probe from the
        // current count for the first free slot.
        let count = self.base.get_count();
        let mut pos = count;
        if pos >= 48 || !self.children[pos].is_null() {
            pos = 0;
            while !self.children[pos].is_null() {
                pos += 1;
            }
        }
        debug_assert!(pos < 48);

        self.children[pos] = node;
        self.child_idx[key as usize] = pos as u8;
        self.base.meta.count += 1;
    }

    fn get_child(&self, key: u8) -> Option<NodePtr> {
        let pos = self.child_idx[key as usize];
        if pos == EMPTY_MARKER {
            None
        } else {
            Some(self.children[pos as usize])
        }
    }

    fn get_child_slot(&mut self, key: u8) -> Option<NonNull<NodePtr>> {
        let pos = self.child_idx[key as usize];
        if pos == EMPTY_MARKER {
            None
        } else {
            Some(NonNull::from(&mut self.children[pos as usize]))
        }
    }

    fn get_children(&self, start: u8, end: u8) -> NodeIter<'_> {
        NodeIter::N48(Node48Iter {
            start: start as u16,
            end: end as u16,
            node: self,
        })
    }

    fn remove(&mut self, k: u8) {
        debug_assert!(self.child_idx[k as usize] != EMPTY_MARKER);
        let pos = self.child_idx[k as usize];
        self.children[pos as usize] = NodePtr::null();
        self.child_idx[k as usize] = EMPTY_MARKER;
        self.base.meta.count -= 1;
        debug_assert!(self.get_child(k).is_none());
    }

    fn copy_to<N: Node>(&self, dst: &mut N) {
        for (i, c) in self.child_idx.iter().enumerate() {
            if *c != EMPTY_MARKER {
                dst.insert(i as u8, self.children[*c as usize]);
            }
        }
    }

    fn seek_slot(&self, key: u8) -> Option<(u16, bool)> {
        for b in key as usize..256 {
            if self.child_idx[b] != EMPTY_MARKER {
                return Some((b as u16, b == key as usize));
            }
        }
        None
    }

    fn child_at(&self, cursor: u16) -> Option<NodePtr> {
        let pos = self.child_idx[cursor as usize];
        if pos == EMPTY_MARKER {
            None
        } else {
            Some(self.children[pos as usize])
        }
    }

    fn next_cursor(&self, cursor: u16) -> Option<u16> {
        for b in cursor as usize + 1..256 {
            if self.child_idx[b] != EMPTY_MARKER {
                return Some(b as u16);
            }
        }
        None
    }

    fn first_cursor(&self) -> Option<u16> {
        for b in 0..256 {
            if self.child_idx[b] != EMPTY_MARKER {
                return Some(b as u16);
            }
        }
        None
    }
}
