//! Lazy keys/values/items views over a shared table.
//!
//! A view owns a cloned `SharedHashMap` handle, which keeps the table alive,
//! and its own cursor position. Views are single-pass and cannot be
//! restarted. Order follows storage order and is otherwise unspecified.
//!
//! A view is tied to the table contents it started on: once the table is
//! mutated (or a write is in progress when the view advances) the view is
//! invalidated and yields nothing further.

use crate::shared_map::{Fetch, SharedHashMap};
use crate::types::{MapKey, MapValue};
use core::iter::FusedIterator;
use tracing::warn;

/// Cursor state shared by the three view flavours.
pub struct Cursor<K: MapKey, V: MapValue> {
    map: SharedHashMap<K, V>,
    pos: usize,
    stamp: u64,
    remaining: Option<usize>,
    done: bool,
    invalidated: bool,
}

impl<K: MapKey, V: MapValue> Cursor<K, V> {
    pub(crate) fn new(map: SharedHashMap<K, V>) -> Self {
        let stamp = map.stamp();
        Self {
            map,
            pos: 0,
            stamp,
            remaining: None,
            done: false,
            invalidated: false,
        }
    }

    fn advance<T>(&mut self, f: impl FnOnce(&K, &V) -> T) -> Option<T> {
        if self.done {
            return None;
        }
        match self.map.fetch_at(self.pos, self.stamp, f) {
            (Fetch::Item(t), remaining) => {
                self.pos += 1;
                self.remaining = Some(remaining);
                Some(t)
            }
            (Fetch::End, _) => {
                self.finish();
                None
            }
            (Fetch::Invalidated, _) => {
                warn!(position = self.pos, "table changed during iteration; view invalidated");
                self.invalidated = true;
                self.finish();
                None
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.remaining = Some(0);
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (0, Some(n)),
            None if self.done => (0, Some(0)),
            None => (0, None),
        }
    }

    /// Whether the view stopped early because the table changed.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// The table this view reads from.
    pub fn map(&self) -> &SharedHashMap<K, V> {
        &self.map
    }
}

macro_rules! view {
    ($(#[$doc:meta])* $name:ident, $item:ty, |$k:ident, $v:ident| $fetch:expr) => {
        $(#[$doc])*
        pub struct $name<K: MapKey, V: MapValue> {
            cursor: Cursor<K, V>,
        }

        impl<K: MapKey, V: MapValue> $name<K, V> {
            pub(crate) fn new(cursor: Cursor<K, V>) -> Self {
                Self { cursor }
            }

            pub fn is_invalidated(&self) -> bool {
                self.cursor.is_invalidated()
            }

            pub fn map(&self) -> &SharedHashMap<K, V> {
                self.cursor.map()
            }
        }

        impl<K: MapKey, V: MapValue> Iterator for $name<K, V> {
            type Item = $item;

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                self.cursor.advance(|$k: &K, $v: &V| $fetch)
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.cursor.size_hint()
            }
        }

        impl<K: MapKey, V: MapValue> FusedIterator for $name<K, V> {}
    };
}

view!(
    /// Keys of a shared table.
    Keys, K, |k, _v| k.clone()
);
view!(
    /// Values of a shared table.
    Values, V, |_k, v| v.clone()
);
view!(
    /// `(key, value)` pairs of a shared table.
    Items, (K, V), |k, v| (k.clone(), v.clone())
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample() -> SharedHashMap<i64, i64> {
        SharedHashMap::from_arrays(&[5, 6, 7, 8], &[50, 60, 70, 80]).unwrap()
    }

    #[test]
    fn views_yield_every_entry_once() {
        let m = sample();
        let keys: BTreeSet<i64> = m.keys().collect();
        assert_eq!(keys, BTreeSet::from([5, 6, 7, 8]));
        let values: BTreeSet<i64> = m.values().collect();
        assert_eq!(values, BTreeSet::from([50, 60, 70, 80]));
        for (k, v) in m.items() {
            assert_eq!(m.get(&k, -1), v);
        }
    }

    /// Invariant: a view keeps the table alive after every handle is gone.
    #[test]
    fn view_holds_a_reference() {
        let m = sample();
        let mut it = m.items();
        assert_eq!(m.ref_count(), 2);
        drop(m);
        assert_eq!(Items::map(&it).ref_count(), 1);
        let mut n = 0;
        while it.next().is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
    }

    #[test]
    fn views_are_single_pass() {
        let m = sample();
        let mut it = m.keys();
        assert_eq!(it.by_ref().count(), 4);
        assert_eq!(it.next(), None);
        assert_eq!(it.size_hint(), (0, Some(0)));
    }

    /// Invariant: a mutation after creation ends the view instead of
    /// yielding a mix of old and new contents.
    #[test]
    fn mutation_invalidates_view() {
        let m = sample();
        let mut it = m.keys();
        assert!(it.next().is_some());
        m.set(9, 90).unwrap();
        assert_eq!(it.next(), None);
        assert!(it.is_invalidated());

        // a view created after the write is unaffected
        assert_eq!(m.keys().count(), 5);
    }

    #[test]
    fn noop_writes_keep_views_valid() {
        let m = sample();
        let mut it = m.values();
        m.pop(&100).unwrap();
        assert!(it.next().is_some());
        assert!(!it.is_invalidated());
    }

    #[test]
    fn empty_table_views_are_empty() {
        let m: SharedHashMap<String, i32> = SharedHashMap::empty();
        assert_eq!(m.keys().count(), 0);
        assert_eq!(m.items().count(), 0);
    }
}
