/// Recovers the key bytes that belong to a stored value.
///
/// Leaves carry only their 63-bit value, so parts of a key that the tree
/// does not materialize (bytes past the 9-byte inline prefix, and the suffix
/// of a lazily expanded leaf) must be reloadable from the value alone. This
/// mirrors how a database index resolves a tuple id back to its key column.
pub trait LoadKey<const K_LEN: usize> {
    fn load(&self, value: u64) -> [u8; K_LEN];
}

/// Loader for 8-byte keys whose value *is* the key, big-endian encoded.
///
/// This is the common benchmark configuration: `insert(k.to_be_bytes(), k)`.
/// Storing a value that does not round-trip to its key breaks prefix
/// recovery for that leaf; use [`KeyTable`] when values are independent of
/// keys.
#[derive(Clone, Copy, Default)]
pub struct U64KeyLoader;

impl LoadKey<8> for U64KeyLoader {
    #[inline]
    fn load(&self, value: u64) -> [u8; 8] {
        value.to_be_bytes()
    }
}

/// Loader that owns the key bytes and hands out table indices as values.
///
/// ```
/// use hybart::{HybridArt, KeyTable};
///
/// let mut tree: HybridArt<31, KeyTable<31>> = HybridArt::with_loader(KeyTable::new());
/// let key = [b'k'; 31];
/// let value = tree.loader_mut().intern(&key);
/// tree.insert(&key, value).unwrap();
/// assert_eq!(tree.get(&key), Some(value));
/// ```
#[derive(Clone, Default)]
pub struct KeyTable<const K_LEN: usize> {
    keys: Vec<[u8; K_LEN]>,
}

impl<const K_LEN: usize> KeyTable<K_LEN> {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Stores a copy of `key` and returns the value under which it can be
    /// inserted into the tree.
    pub fn intern(&mut self, key: &[u8; K_LEN]) -> u64 {
        self.keys.push(*key);
        (self.keys.len() - 1) as u64
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<const K_LEN: usize> LoadKey<K_LEN> for KeyTable<K_LEN> {
    #[inline]
    fn load(&self, value: u64) -> [u8; K_LEN] {
        self.keys[value as usize]
    }
}
