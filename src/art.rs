use crate::{
    error::ArtError,
    key::{LoadKey, U64KeyLoader},
    range_scan::{RangeCursor, Scanner, StaticRangeCursor},
    static_node,
    stats::NodeStats,
    tree::{maximum, minimum, RawArt},
    Allocator, DefaultAllocator,
};

/// The hybrid adaptive radix tree.
///
/// Keys are fixed-length byte strings of `K_LEN` bytes; integer keys are
/// expected big-endian so byte order matches numeric order. Values are
/// 63-bit integers packed into child slots, and `L` recovers a key from its
/// value when the tree has to verify an optimistically skipped prefix.
///
/// ```
/// use hybart::U64Art;
///
/// let mut tree = U64Art::new();
/// for k in [3u64, 1, 2] {
///     tree.insert(&k.to_be_bytes(), k).unwrap();
/// }
/// assert_eq!(tree.find(&2u64.to_be_bytes()), 2);
/// assert_eq!(tree.find(&4u64.to_be_bytes()), 0);
/// assert_eq!(tree.scan(&1u64.to_be_bytes(), 3), 6);
/// ```
pub struct HybridArt<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator = DefaultAllocator> {
    inner: RawArt<K_LEN, L, A>,
}

/// 8-byte big-endian keys whose value is the key itself.
pub type U64Art = HybridArt<8, U64KeyLoader, DefaultAllocator>;

impl HybridArt<8, U64KeyLoader, DefaultAllocator> {
    pub fn new() -> Self {
        Self::with_loader(U64KeyLoader)
    }
}

impl Default for HybridArt<8, U64KeyLoader, DefaultAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>> HybridArt<K_LEN, L, DefaultAllocator> {
    pub fn with_loader(loader: L) -> Self {
        Self::with_loader_in(loader, DefaultAllocator)
    }
}

impl<const K_LEN: usize, L: LoadKey<K_LEN>, A: Allocator> HybridArt<K_LEN, L, A> {
    pub fn with_loader_in(loader: L, allocator: A) -> Self {
        HybridArt {
            inner: RawArt::new(loader, allocator),
        }
    }

    /// Inserts a key. Returns whether the tree changed: `Ok(false)` when the
    /// identical pair is already present, [`ArtError::DuplicateKey`] when
    /// the key is present with a different value.
    ///
    /// ```
    /// use hybart::U64Art;
    ///
    /// let mut tree = U64Art::new();
    /// assert!(tree.insert(&7u64.to_be_bytes(), 7).unwrap());
    /// assert!(!tree.insert(&7u64.to_be_bytes(), 7).unwrap());
    /// assert!(tree.insert(&7u64.to_be_bytes(), 8).is_err());
    /// ```
    pub fn insert(&mut self, key: &[u8; K_LEN], value: u64) -> Result<bool, ArtError> {
        assert!(value < 1 << 63, "values are 63-bit");
        self.inner.insert(key, value)
    }

    /// Replaces the value of an existing key without structural change;
    /// inserts the key when absent.
    ///
    /// ```
    /// use hybart::{HybridArt, KeyTable};
    ///
    /// let mut tree: HybridArt<8, KeyTable<8>> = HybridArt::with_loader(KeyTable::new());
    /// let key = 9u64.to_be_bytes();
    /// let v1 = tree.loader_mut().intern(&key);
    /// let v2 = tree.loader_mut().intern(&key);
    /// tree.insert(&key, v1).unwrap();
    /// tree.upsert(&key, v2).unwrap();
    /// assert_eq!(tree.get(&key), Some(v2));
    /// ```
    pub fn upsert(&mut self, key: &[u8; K_LEN], value: u64) -> Result<(), ArtError> {
        assert!(value < 1 << 63, "values are 63-bit");
        self.inner.upsert(key, value)
    }

    /// Point lookup returning 0 when the key is absent. 0 is a reserved
    /// sentinel; callers needing nullable semantics use [`get`](Self::get).
    pub fn find(&self, key: &[u8; K_LEN]) -> u64 {
        self.get(key).unwrap_or(0)
    }

    /// Point lookup. Consults the dynamic tree first, then the static tree,
    /// so keys inserted after a merge shadow merged state.
    pub fn get(&self, key: &[u8; K_LEN]) -> Option<u64> {
        match self.inner.get(key) {
            Some(v) => Some(v),
            None => self.inner.get_static(key),
        }
    }

    /// Positions a cursor at the smallest key >= `key` and returns it as an
    /// iterator over values in byte-lex key order. When keys were inserted
    /// after a merge, both generations are walked merge-sorted by key; a key
    /// present in both yields its dynamic value, so scans shadow merged
    /// state the same way [`get`](Self::get) does.
    ///
    /// ```
    /// use hybart::U64Art;
    ///
    /// let mut tree = U64Art::new();
    /// for k in [10u64, 20, 30] {
    ///     tree.insert(&k.to_be_bytes(), k).unwrap();
    /// }
    /// let values: Vec<u64> = tree.lower_bound(&15u64.to_be_bytes()).collect();
    /// assert_eq!(values, vec![20, 30]);
    /// ```
    pub fn lower_bound(&self, key: &[u8; K_LEN]) -> Scanner<'_, K_LEN, L> {
        let has_dynamic = !self.inner.root.is_null();
        let has_static = !self.inner.static_root.is_null();
        if has_dynamic && has_static {
            Scanner::merged(
                RangeCursor::lower_bound(self.inner.root, key, &self.inner.loader),
                StaticRangeCursor::lower_bound(self.inner.static_root, key, &self.inner.loader),
                &self.inner.loader,
            )
        } else if has_dynamic {
            Scanner::dynamic(RangeCursor::lower_bound(
                self.inner.root,
                key,
                &self.inner.loader,
            ))
        } else {
            Scanner::fixed(StaticRangeCursor::lower_bound(
                self.inner.static_root,
                key,
                &self.inner.loader,
            ))
        }
    }

    /// Sums the values of up to `range` keys starting at the smallest key
    /// >= `key`. Like [`lower_bound`](Self::lower_bound), the range covers
    /// both the dynamic tree and any previously merged static tree.
    pub fn scan(&self, key: &[u8; K_LEN], range: usize) -> u64 {
        self.lower_bound(key).take(range).sum()
    }

    /// Removes the key if present.
    ///
    /// ```
    /// use hybart::U64Art;
    ///
    /// let mut tree = U64Art::new();
    /// tree.insert(&5u64.to_be_bytes(), 5).unwrap();
    /// tree.erase(&5u64.to_be_bytes());
    /// assert_eq!(tree.find(&5u64.to_be_bytes()), 0);
    /// ```
    pub fn erase(&mut self, key: &[u8; K_LEN]) {
        self.inner.erase(key)
    }

    /// Rebuilds the dynamic tree into the compact static representation and
    /// releases the dynamic nodes; afterwards point lookups run on the
    /// static tree and later inserts grow a fresh dynamic tree. Calling it
    /// again while a static root exists is a no-op.
    ///
    /// ```
    /// use hybart::U64Art;
    ///
    /// let mut tree = U64Art::new();
    /// for k in 0..100u64 {
    ///     tree.insert(&k.to_be_bytes(), k).unwrap();
    /// }
    /// tree.merge().unwrap();
    /// assert_eq!(tree.memory_bytes(), 0);
    /// assert!(tree.static_memory_bytes() > 0);
    /// assert_eq!(tree.find(&42u64.to_be_bytes()), 42);
    /// ```
    pub fn merge(&mut self) -> Result<(), ArtError> {
        self.inner.merge()
    }

    /// Smallest stored value by key order, across both trees.
    pub fn minimum(&self) -> Option<u64> {
        let dynamic = minimum(self.inner.root);
        let fixed = unsafe { static_node::minimum(self.inner.static_root) };
        match (dynamic.is_null(), fixed.is_null()) {
            (true, true) => None,
            (false, true) => Some(dynamic.leaf_value()),
            (true, false) => Some(fixed.leaf_value()),
            (false, false) => {
                let d_key = self.inner.loader.load(dynamic.leaf_value());
                let f_key = self.inner.loader.load(fixed.leaf_value());
                if d_key <= f_key {
                    Some(dynamic.leaf_value())
                } else {
                    Some(fixed.leaf_value())
                }
            }
        }
    }

    /// Largest stored value by key order, across both trees.
    pub fn maximum(&self) -> Option<u64> {
        let dynamic = maximum(self.inner.root);
        let fixed = unsafe { static_node::maximum(self.inner.static_root) };
        match (dynamic.is_null(), fixed.is_null()) {
            (true, true) => None,
            (false, true) => Some(dynamic.leaf_value()),
            (true, false) => Some(fixed.leaf_value()),
            (false, false) => {
                let d_key = self.inner.loader.load(dynamic.leaf_value());
                let f_key = self.inner.loader.load(fixed.leaf_value());
                if d_key >= f_key {
                    Some(dynamic.leaf_value())
                } else {
                    Some(fixed.leaf_value())
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Bytes held by dynamic nodes.
    pub fn memory_bytes(&self) -> usize {
        self.inner.memory
    }

    /// Bytes held by static nodes, populated by [`merge`](Self::merge).
    pub fn static_memory_bytes(&self) -> usize {
        self.inner.static_memory
    }

    /// Per-level dynamic class population plus static class counters.
    pub fn stats(&self) -> NodeStats {
        self.inner.stats()
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.inner.loader
    }
}
