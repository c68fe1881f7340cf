//! Bulk construction of position maps.
//!
//! A position map sends every distinct key to the last index at which it
//! occurs in a reference sequence. Building one is a single pass over the
//! keys into a pre-sized private table, which is published as a shared
//! table only once it is complete.

use crate::error::Result;
use crate::raw_table::RawTable;
use crate::registry;
use crate::shared_map::SharedHashMap;
use crate::types::MapKey;
use tracing::debug;

/// Table mapping each key to the last position it was seen at.
pub type PositionMap<K> = SharedHashMap<K, i64>;

/// Largest number of slots reserved up front. Inputs with more keys than
/// this grow past it on demand, which keeps heavily duplicated inputs from
/// reserving N slots for U << N distinct keys.
pub const PRESIZE_CEILING: usize = 1 << 22;

/// Initial capacity for a table built from `n` keys.
#[inline]
pub fn presize_hint(n: usize) -> usize {
    n.min(PRESIZE_CEILING)
}

/// A position map under construction.
///
/// Only the builder can see its table, so pushes need no access checks.
/// Dropping an unfinished builder discards everything pushed so far.
pub struct PositionMapBuilder<K: MapKey> {
    table: RawTable<K, i64, K::BuildHasher>,
    next: i64,
}

impl<K: MapKey> PositionMapBuilder<K> {
    pub fn new() -> Self {
        Self {
            table: RawTable::default(),
            next: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            table: RawTable::try_with_capacity_and_hasher(capacity, K::BuildHasher::default())?,
            next: 0,
        })
    }

    /// Number the next pushed key `base` instead of `0`.
    pub fn with_offset(mut self, base: i64) -> Self {
        self.next = base;
        self
    }

    /// Record `key` at the next position.
    #[inline]
    pub fn push(&mut self, key: &K) -> Result<()> {
        self.table.insert_cloned(key, self.next)?;
        self.next += 1;
        Ok(())
    }

    pub fn extend_from_slice(&mut self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.push(key)?;
        }
        Ok(())
    }

    /// Distinct keys seen so far.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Position the next pushed key will get.
    pub fn next_position(&self) -> i64 {
        self.next
    }

    /// Publish the table.
    pub fn finish(self) -> PositionMap<K> {
        SharedHashMap::from_table(self.table)
    }
}

impl<K: MapKey> Default for PositionMapBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the position map of `keys` in one pass.
///
/// Fails with `UnsupportedKeyType` when `K` has no bulk builder (the generic
/// fallback); use [`build_position_map_sequential`] for those.
pub fn build_position_map<K: MapKey>(keys: &[K]) -> Result<PositionMap<K>> {
    let symbol = registry::position_builder(K::KEY_TYPE)?;
    let mut builder = PositionMapBuilder::with_capacity(presize_hint(keys.len()))?;
    builder.extend_from_slice(keys)?;
    let map = builder.finish();
    debug!(
        builder = symbol,
        keys = keys.len(),
        distinct = map.len(),
        "built position map"
    );
    Ok(map)
}

/// Per-element fallback: `set(keys[i], i)` for every `i` in order. Works for
/// every key type.
pub fn build_position_map_sequential<K: MapKey>(keys: &[K]) -> Result<PositionMap<K>> {
    let map = PositionMap::empty();
    for (i, key) in keys.iter().enumerate() {
        map.set(key.clone(), i as i64)?;
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Generic;

    #[test]
    fn last_occurrence_wins() {
        let m = build_position_map(&[1i64, 2, 3, 1, 2, 3]).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(&1, -1), 3);
        assert_eq!(m.get(&2, -1), 4);
        assert_eq!(m.get(&3, -1), 5);
        assert_eq!(m.get(&4, -1), -1);
    }

    #[test]
    fn empty_input_gives_empty_map() {
        let m = build_position_map::<i32>(&[]).unwrap();
        assert_eq!(m.len(), 0);
        assert_eq!(m.get(&0, -1), -1);
    }

    #[test]
    fn string_keys_query_by_str() {
        let keys: Vec<String> = ["a", "b", "a"].iter().map(|s| s.to_string()).collect();
        let m = build_position_map(&keys).unwrap();
        assert_eq!(m.get("a", -1), 2);
        assert_eq!(m.get("b", -1), 1);
        assert_eq!(m.get("c", -1), -1);
    }

    #[test]
    fn generic_keys_need_the_fallback() {
        let keys = vec![Generic((1u8, 'a')), Generic((2u8, 'b')), Generic((1u8, 'a'))];
        match build_position_map(&keys) {
            Err(Error::UnsupportedKeyType { key_type: "generic" }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        let m = build_position_map_sequential(&keys).unwrap();
        assert_eq!(m.get(&Generic((1u8, 'a')), -1), 2);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn bulk_and_sequential_agree() {
        let keys: Vec<i64> = (0..1000).map(|i| (i * 7919) % 113).collect();
        let bulk = build_position_map(&keys).unwrap();
        let seq = build_position_map_sequential(&keys).unwrap();
        assert_eq!(bulk, seq);
    }

    #[test]
    fn offset_builder_numbers_from_base() {
        let mut b = PositionMapBuilder::new().with_offset(100);
        b.extend_from_slice(&[9i32, 8, 9]).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.next_position(), 103);
        let m = b.finish();
        assert_eq!(m.get(&9, -1), 102);
        assert_eq!(m.get(&8, -1), 101);
    }

    #[test]
    fn unreservable_builder_reports_allocation_error() {
        match PositionMapBuilder::<i64>::with_capacity(usize::MAX / 2) {
            Err(Error::AllocationError { requested }) => assert_eq!(requested, usize::MAX / 2),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("reservation of usize::MAX / 2 entries succeeded"),
        }
    }

    #[test]
    fn presize_is_capped() {
        assert_eq!(presize_hint(10), 10);
        assert_eq!(presize_hint(usize::MAX), PRESIZE_CEILING);
    }
}
