//! A hybrid adaptive radix tree: an in-memory ordered index over
//! fixed-length byte-string keys mapping to 63-bit values.
//!
//! The index keeps two representations of the same mapping:
//!
//! - a **dynamic** tree of adaptive inner nodes (4, 16, 48 and 256 child
//!   slots) that supports insert, upsert, erase and lower-bound scans;
//! - a **static** tree of compact variable-sized nodes built by [`merge`],
//!   which rewrites the dynamic tree level by level into a read-optimized
//!   form and releases the dynamic nodes.
//!
//! Values are packed directly into child pointer slots with a low-bit tag,
//! so leaves cost nothing beyond the slot that references them. Because a
//! leaf stores only its value, the index needs a way to recover key bytes
//! from a value when verifying optimistically skipped prefixes; see
//! [`LoadKey`].
//!
//! ```
//! use hybart::U64Art;
//!
//! let mut tree = U64Art::new();
//! tree.insert(&42u64.to_be_bytes(), 42).unwrap();
//! assert_eq!(tree.find(&42u64.to_be_bytes()), 42);
//!
//! tree.merge().unwrap();
//! assert_eq!(tree.find(&42u64.to_be_bytes()), 42);
//! ```
//!
//! Layout constants that are part of the on-heap ABI: inline prefixes cap at
//! 9 bytes, the dense static layout is used up to 227 children, nodes shrink
//! at {1, 3, 12, 37} children, the N48 empty marker is 48 and the leaf tag
//! is the pointer's low bit.
//!
//! [`merge`]: HybridArt::merge

mod art;
mod base_node;
mod error;
mod key;
mod merge;
mod node_16;
mod node_256;
mod node_4;
mod node_48;
mod node_ptr;
mod range_scan;
mod static_node;
mod stats;
mod tree;

#[cfg(test)]
mod tests;

pub use art::{HybridArt, U64Art};
pub use error::{ArtError, OOMError};
pub use key::{KeyTable, LoadKey, U64KeyLoader};
pub use range_scan::Scanner;
pub use stats::NodeStats;

use std::alloc::Layout;
use std::ptr::NonNull;

/// Node memory provider.
///
/// Dynamic nodes are fixed-size per class; static nodes are single
/// variable-length allocations. Every allocation is at least 8-byte aligned
/// so the low bit of node addresses is free for the leaf tag.
pub trait Allocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, OOMError>;

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, OOMError> {
        let ptr = self.allocate(layout)?;
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr() as *mut u8, 0, layout.size());
        }
        Ok(ptr)
    }

    /// # Safety
    /// `ptr` must originate from `allocate` on this allocator with the same
    /// `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Allocator backed by `std::alloc`.
#[derive(Clone, Copy, Default)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, OOMError> {
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() {
            return Err(OOMError::new());
        }
        let slice = std::ptr::slice_from_raw_parts_mut(ptr, layout.size());
        Ok(NonNull::new(slice).unwrap())
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, OOMError> {
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(OOMError::new());
        }
        let slice = std::ptr::slice_from_raw_parts_mut(ptr, layout.size());
        Ok(NonNull::new(slice).unwrap())
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }
}
