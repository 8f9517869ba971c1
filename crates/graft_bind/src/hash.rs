//! Hash containers used across the crate, based on *hashbrown* and
//! *foldhash*, plus a [`TypeIdMap`] specialization keyed by [`TypeId`].

use core::any::TypeId;
use core::fmt::Debug;
use core::hash::{BuildHasher, Hasher};

// -----------------------------------------------------------------------------
// Hashers

/// A fixed hasher provided hash results that only depend on the input.
pub type FixedHasher = foldhash::fast::FoldHasher<'static>;

/// A fixed hash seed.
const FIXED_HASH_STATE: foldhash::fast::FixedState =
    foldhash::fast::FixedState::with_seed(0x6B8F_13A2_5D07_40C9);

/// Fixed hash state based upon a random but fixed seed.
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

/// A no-op hash that directly passes a `u64` through.
///
/// [`TypeId`] is already a high-quality hash, so re-hashing it buys
/// nothing.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        // Usually `write_u64` is hit instead; this path folds bytes so that
        // wider inputs still produce a stable value.
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Build-state for [`NoOpHasher`].
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}

// -----------------------------------------------------------------------------
// Containers

/// The crate's default [`hashbrown::HashMap`] flavor.
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// The crate's default [`hashbrown::HashSet`] flavor.
pub type HashSet<T> = hashbrown::HashSet<T, FixedHashState>;

// -----------------------------------------------------------------------------
// TypeIdMap

/// A specialized map container with [`TypeId`] as the fixed key type.
///
/// The interface is fully abstracted, exposing no `HashMap` specific APIs,
/// so the underlying implementation can change without breaking callers.
pub struct TypeIdMap<V>(hashbrown::HashMap<TypeId, V, NoOpHashState>);

impl<V> TypeIdMap<V> {
    /// Creates an empty `TypeIdMap`.
    #[inline]
    pub const fn new() -> Self {
        Self(hashbrown::HashMap::with_hasher(NoOpHashState))
    }

    /// Attempts to insert a key-value pair into the map.
    ///
    /// - Returns `true` if the key was not present and the pair was inserted.
    /// - Returns `false` if the key already exists, leaving the map
    ///   unchanged.
    ///
    /// The closure `f` is only called if the key is not present.
    #[inline]
    pub fn try_insert(&mut self, type_id: TypeId, f: impl FnOnce() -> V) -> bool {
        match self.0.entry(type_id) {
            hashbrown::hash_map::Entry::Vacant(entry) => {
                entry.insert(f());
                true
            }
            hashbrown::hash_map::Entry::Occupied(_) => false,
        }
    }

    /// Returns a reference to the value corresponding to the type.
    pub fn get(&self, type_id: &TypeId) -> Option<&V> {
        self.0.get(type_id)
    }

    /// Returns a reference to the value corresponding to the type.
    #[inline(always)]
    pub fn get_type<T: ?Sized + 'static>(&self) -> Option<&V> {
        self.get(&TypeId::of::<T>())
    }

    /// Returns a mutable reference to the value corresponding to the type.
    pub fn get_mut(&mut self, type_id: &TypeId) -> Option<&mut V> {
        self.0.get_mut(type_id)
    }

    /// Inserts a key-value pair into the map.
    pub fn insert(&mut self, type_id: TypeId, v: V) -> Option<V> {
        self.0.insert(type_id, v)
    }

    /// Inserts a key-value pair into the map.
    #[inline(always)]
    pub fn insert_type<T: ?Sized + 'static>(&mut self, v: V) -> Option<V> {
        self.insert(TypeId::of::<T>(), v)
    }

    /// Returns `true` if the map contains a value for the specified key.
    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.0.contains_key(type_id)
    }

    /// Returns the number of elements in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An iterator visiting all values in arbitrary order.
    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> {
        self.0.values()
    }
}

impl<T: Clone> Clone for TypeIdMap<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for TypeIdMap<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for TypeIdMap<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hasher_passthrough() {
        use core::hash::{Hash, Hasher};
        let mut hasher = NoOpHashState.build_hasher();
        3_u64.hash(&mut hasher);
        assert_eq!(hasher.finish(), 3);
    }

    #[test]
    fn try_insert_is_first_wins() {
        let mut map = TypeIdMap::<i32>::new();
        assert!(map.try_insert(TypeId::of::<String>(), || 1));
        assert!(!map.try_insert(TypeId::of::<String>(), || 2));
        assert_eq!(map.get_type::<String>(), Some(&1));
    }
}
