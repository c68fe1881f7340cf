//! RawTable: the structural key -> value layer under `SharedHashMap`.
//!
//! Entries live densely in a `Vec`; a hashbrown `HashTable<usize>` indexes
//! them by hash. Dense storage gives iteration cursors a plain position to
//! resume from. Each entry stores its precomputed hash and growth always
//! uses the stored hash, so `K: Hash` never runs after insertion.

use crate::error::{Error, Result};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_table::Entry as IndexEntry;
use hashbrown::HashTable;
use tracing::trace;

#[derive(Clone, Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

#[derive(Clone)]
pub struct RawTable<K, V, S> {
    hasher: S,
    index: HashTable<usize>,
    entries: Vec<Entry<K, V>>,
}

impl<K, V, S> RawTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            entries: Vec::new(),
        }
    }

    pub fn try_with_capacity_and_hasher(capacity: usize, hasher: S) -> Result<Self> {
        let mut table = Self::with_hasher(hasher);
        table.try_reserve(capacity)?;
        Ok(table)
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// Reserve room for `additional` more entries without panicking on
    /// allocation failure.
    pub fn try_reserve(&mut self, additional: usize) -> Result<()> {
        let before = self.capacity();
        let entries = &self.entries;
        self.index
            .try_reserve(additional, |&i| entries[i].hash)
            .map_err(|_| Error::AllocationError {
                requested: additional,
            })?;
        self.entries
            .try_reserve(additional)
            .map_err(|_| Error::AllocationError {
                requested: additional,
            })?;
        let after = self.capacity();
        if after != before {
            trace!(before, after, len = self.entries.len(), "table grew");
        }
        Ok(())
    }

    fn find_index<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.index
            .find(hash, |&i| self.entries[i].key.borrow() == q)
            .copied()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_index(hash, q).map(|i| &self.entries[i].value)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.find_index(hash, q).is_some()
    }

    /// Insert or overwrite; returns the previous value for an existing key.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.upsert(key, value, |k| k)
    }

    /// Like `insert`, but clones the key only when it is not present yet.
    pub fn insert_cloned(&mut self, key: &K, value: V) -> Result<Option<V>>
    where
        K: Clone,
    {
        self.upsert(key, value, K::clone)
    }

    /// Shared insert path; `to_owned` runs only when the key is new.
    fn upsert<B>(&mut self, key: B, value: V, to_owned: impl FnOnce(B) -> K) -> Result<Option<V>>
    where
        B: Borrow<K>,
    {
        // Reserve first so that a failed allocation leaves the table as it was.
        self.try_reserve(1)?;
        let k: &K = key.borrow();
        let hash = self.make_hash(k);
        let entries = &self.entries;
        match self.index.entry(
            hash,
            |&i| entries[i].key == *k,
            |&i| entries[i].hash,
        ) {
            IndexEntry::Occupied(o) => {
                let i = *o.get();
                Ok(Some(core::mem::replace(&mut self.entries[i].value, value)))
            }
            IndexEntry::Vacant(v) => {
                let i = self.entries.len();
                self.entries.push(Entry {
                    key: to_owned(key),
                    value,
                    hash,
                });
                v.insert(i);
                Ok(None)
            }
        }
    }

    /// Remove a key, returning its entry. The last entry moves into the
    /// vacated position.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let entries = &self.entries;
        let found = self
            .index
            .find_entry(hash, |&i| entries[i].key.borrow() == q)
            .ok()?;
        let (idx, _) = found.remove();

        let last = self.entries.len() - 1;
        let removed = self.entries.swap_remove(idx);
        if idx != last {
            let moved_hash = self.entries[idx].hash;
            if let Some(slot) = self.index.find_mut(moved_hash, |&i| i == last) {
                *slot = idx;
            }
        }
        Some((removed.key, removed.value))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    /// Entry at a storage position, for cursors.
    pub fn entry_at(&self, pos: usize) -> Option<(&K, &V)> {
        self.entries.get(pos).map(|e| (&e.key, &e.value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }
}

impl<K, V, S> Default for RawTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    type Table<K, V> = RawTable<K, V, ahash::RandomState>;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl core::hash::Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        } // force all keys into the same hash bucket
    }

    /// Invariant: inserting an existing key overwrites and returns the old value;
    /// the number of entries does not change.
    #[test]
    fn overwrite_returns_previous() {
        let mut m: Table<String, i32> = Table::default();
        assert_eq!(m.insert("dup".to_string(), 1).unwrap(), None);
        assert_eq!(m.insert("dup".to_string(), 2).unwrap(), Some(1));
        assert_eq!(m.get("dup"), Some(&2));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn insert_cloned_matches_insert() {
        let mut a: Table<String, i32> = Table::default();
        let mut b: Table<String, i32> = Table::default();
        for (i, k) in ["x", "y", "x", "z", "y"].iter().enumerate() {
            a.insert((*k).to_string(), i as i32).unwrap();
            b.insert_cloned(&(*k).to_string(), i as i32).unwrap();
        }
        assert_eq!(a.len(), b.len());
        for (k, v) in a.iter() {
            assert_eq!(b.get(k), Some(v));
        }
    }

    /// Invariant: `get(k).is_some() == contains_key(k)` for present/absent keys.
    #[test]
    fn get_contains_parity() {
        let mut m: Table<String, i32> = Table::default();
        for (i, k) in ["a", "b", "c"].iter().enumerate() {
            m.insert((*k).to_string(), i as i32).unwrap();
        }
        for k in ["a", "b", "c", "x", "y"] {
            assert_eq!(m.get(k).is_some(), m.contains_key(k));
        }
        assert!(!m.contains_key("x"));
    }

    /// Invariant: lookups work under total hash collision; equality resolves
    /// to the correct entry.
    #[test]
    fn collision_handling_with_const_hasher() {
        let mut m: RawTable<String, i32, ConstBuildHasher> =
            RawTable::with_hasher(ConstBuildHasher);
        m.insert("a".to_string(), 1).unwrap();
        m.insert("b".to_string(), 2).unwrap();
        m.insert("a".to_string(), 3).unwrap();
        assert_eq!(m.get("a"), Some(&3));
        assert_eq!(m.get("b"), Some(&2));
        assert_eq!(m.len(), 2);
    }

    /// Invariant: removing from the middle keeps every other key reachable
    /// (the moved entry is re-indexed).
    #[test]
    fn remove_keeps_other_entries_reachable() {
        let mut m: Table<i64, i64> = Table::default();
        for i in 0..100 {
            m.insert(i, i * 10).unwrap();
        }
        for i in (0..100).step_by(3) {
            assert_eq!(m.remove(&i), Some((i, i * 10)));
        }
        for i in 0..100 {
            if i % 3 == 0 {
                assert!(!m.contains_key(&i));
            } else {
                assert_eq!(m.get(&i), Some(&(i * 10)));
            }
        }
        assert_eq!(m.len(), 66);
        assert_eq!(m.remove(&0), None);
    }

    /// Invariant: the same with colliding hashes, where the moved entry must be
    /// told apart from its neighbours by position alone.
    #[test]
    fn remove_under_collisions() {
        let mut m: RawTable<i32, i32, ConstBuildHasher> = RawTable::with_hasher(ConstBuildHasher);
        for i in 0..8 {
            m.insert(i, i).unwrap();
        }
        m.remove(&2).unwrap();
        m.remove(&0).unwrap();
        for i in [1, 3, 4, 5, 6, 7] {
            assert_eq!(m.get(&i), Some(&i));
        }
    }

    #[test]
    fn remove_then_reinsert_same_key_yields_new_value() {
        let mut m: Table<String, i32> = Table::default();
        m.insert("k".to_string(), 1).unwrap();
        assert_eq!(m.remove("k"), Some(("k".to_string(), 1)));
        assert!(!m.contains_key("k"));
        m.insert("k".to_string(), 2).unwrap();
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: positional access covers every live entry exactly once.
    #[test]
    fn entry_at_walks_all_entries() {
        let mut m: Table<i32, i32> = Table::default();
        for i in 0..10 {
            m.insert(i, -i).unwrap();
        }
        m.remove(&4);
        let mut seen = BTreeSet::new();
        let mut pos = 0;
        while let Some((k, v)) = m.entry_at(pos) {
            assert_eq!(*v, -*k);
            assert!(seen.insert(*k));
            pos += 1;
        }
        assert_eq!(seen.len(), 9);
        assert!(!seen.contains(&4));
        assert_eq!(m.iter().count(), 9);
    }

    #[test]
    fn len_is_empty_and_clear() {
        let mut m: Table<i32, i32> = Table::default();
        assert!(m.is_empty());
        m.insert(1, 1).unwrap();
        m.insert(2, 2).unwrap();
        assert_eq!(m.len(), 2);
        m.clear();
        assert!(m.is_empty());
        assert!(!m.contains_key(&1));
        m.insert(1, 5).unwrap();
        assert_eq!(m.get(&1), Some(&5));
    }

    #[test]
    fn reserve_presizes() {
        let m: Table<i64, i64> = Table::try_with_capacity_and_hasher(1000, Default::default()).unwrap();
        assert!(m.capacity() >= 1000);
        assert!(m.is_empty());
    }

    #[test]
    fn absurd_reserve_reports_allocation_error() {
        let mut m: Table<i64, i64> = Table::default();
        match m.try_reserve(usize::MAX / 2) {
            Err(Error::AllocationError { requested }) => assert_eq!(requested, usize::MAX / 2),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(m.is_empty());
    }
}
