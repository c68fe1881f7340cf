//! SharedHashMap: the reference-counted table handle.
//!
//! A handle is an `Arc` around one `RawTable` plus its access state. Cloning
//! a handle (or opening an iteration view) shares the table; the table is
//! freed when the last holder is dropped. Mutation goes through `&self`, so
//! every holder observes it.

use crate::access::{AccessState, ReadGuard, WriteGuard};
use crate::builder::presize_hint;
use crate::error::{Error, Result};
use crate::iter::{Cursor, Items, Keys, Values};
use crate::raw_table::RawTable;
use crate::registry::{self, Specialization};
use crate::types::{MapKey, MapValue};
use core::borrow::Borrow;
use core::cell::UnsafeCell;
use core::fmt;
use core::hash::Hash;
use std::sync::Arc;
use tracing::warn;

type Table<K, V> = RawTable<K, V, <K as MapKey>::BuildHasher>;

struct Inner<K: MapKey, V> {
    table: UnsafeCell<Table<K, V>>, // interior mutability via UnsafeCell, guarded by `access`
    access: AccessState,
}

// SAFETY: the table is only dereferenced while holding a guard from
// `access`: shared references under a read guard, the unique mutable
// reference under the write guard, which excludes all readers.
unsafe impl<K: MapKey, V: Send + Sync> Sync for Inner<K, V> {}

/// Result of reading one cursor position.
pub(crate) enum Fetch<T> {
    Item(T),
    End,
    Invalidated,
}

pub struct SharedHashMap<K: MapKey, V: MapValue> {
    inner: Arc<Inner<K, V>>,
}

impl<K: MapKey, V: MapValue> SharedHashMap<K, V> {
    pub(crate) fn from_table(table: Table<K, V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: UnsafeCell::new(table),
                access: AccessState::new(),
            }),
        }
    }

    /// A new, empty table.
    pub fn empty() -> Self {
        Self::from_table(RawTable::default())
    }

    /// A new, empty table with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self::from_table(RawTable::try_with_capacity_and_hasher(
            capacity,
            K::BuildHasher::default(),
        )?))
    }

    /// Build from positionally aligned key and value arrays. Pairs are
    /// applied in order, so a repeated key keeps its last value.
    pub fn from_arrays(keys: &[K], values: &[V]) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(Error::LengthMismatch {
                left: keys.len(),
                right: values.len(),
            });
        }
        let mut table = RawTable::try_with_capacity_and_hasher(
            presize_hint(keys.len()),
            K::BuildHasher::default(),
        )?;
        for (k, v) in keys.iter().zip(values) {
            table.insert_cloned(k, v.clone())?;
        }
        Ok(Self::from_table(table))
    }

    /// Build a table mapping every key to the same value.
    pub fn from_keys(keys: &[K], value: V) -> Result<Self> {
        let mut table = RawTable::try_with_capacity_and_hasher(
            presize_hint(keys.len()),
            K::BuildHasher::default(),
        )?;
        for k in keys {
            table.insert_cloned(k, value.clone())?;
        }
        Ok(Self::from_table(table))
    }

    fn read_guard(&self) -> ReadGuard<'_> {
        match self.inner.access.read() {
            Ok(g) => g,
            Err(c) => panic!("SharedHashMap read overlapped a write: {}", c.describe()),
        }
    }

    fn table<'a>(&'a self, _guard: &ReadGuard<'a>) -> &'a Table<K, V> {
        // SAFETY: the caller holds a read guard on this table.
        unsafe { &*self.inner.table.get() }
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut Table<K, V>, &mut WriteGuard<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.inner.access.write().map_err(|c| {
            warn!(conflict = c.describe(), "rejected write on shared table");
            Error::AccessConflict(c.describe())
        })?;
        // SAFETY: the write guard excludes every other reader and writer.
        let table = unsafe { &mut *self.inner.table.get() };
        f(table, &mut guard)
    }

    /// Enter a read phase for many lookups at once.
    ///
    /// The returned reader performs lookups without touching the access
    /// state; writers fail with `AccessConflict` until it is dropped.
    pub fn reader(&self) -> Result<MapReader<'_, K, V>> {
        let guard = self
            .inner
            .access
            .read()
            .map_err(|c| Error::AccessConflict(c.describe()))?;
        // SAFETY: `guard` is stored alongside the reference and outlives it.
        let table = unsafe { &*self.inner.table.get() };
        Ok(MapReader {
            table,
            _guard: guard,
        })
    }

    /// Value for `q`, or `default` when absent.
    ///
    /// # Panics
    /// If a write on this table is in progress (for instance from a key's
    /// `Eq`/`Hash` running inside `set`, or from another thread).
    pub fn get<Q>(&self, q: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let g = self.read_guard();
        self.table(&g).get(q).cloned().unwrap_or(default)
    }

    /// Value for `q`, if present. Panics like [`get`](Self::get).
    pub fn try_get<Q>(&self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let g = self.read_guard();
        self.table(&g).get(q).cloned()
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let g = self.read_guard();
        self.table(&g).contains_key(q)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        let g = self.read_guard();
        self.table(&g).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or overwrite `key`, returning the previous value.
    ///
    /// Must not overlap any other access to this table; overlapping calls
    /// fail with `AccessConflict`.
    pub fn set(&self, key: K, value: V) -> Result<Option<V>> {
        self.write(|t, g| {
            let prev = t.insert(key, value)?;
            g.mark_mutated();
            Ok(prev)
        })
    }

    /// Remove `q`, returning its value.
    pub fn pop<Q>(&self, q: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.write(|t, g| {
            let removed = t.remove(q).map(|(_, v)| v);
            if removed.is_some() {
                g.mark_mutated();
            }
            Ok(removed)
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.write(|t, g| {
            if !t.is_empty() {
                t.clear();
                g.mark_mutated();
            }
            Ok(())
        })
    }

    /// Copy every entry of `other` into this table; `other`'s values win.
    pub fn update(&self, other: &SharedHashMap<K, V>) -> Result<()> {
        if self.ptr_eq(other) {
            return Ok(());
        }
        let src = other.reader()?;
        self.write(|t, g| {
            if src.is_empty() {
                return Ok(());
            }
            t.try_reserve(src.len())?;
            // Anything inserted before a failure stays; the table is
            // mutated either way.
            g.mark_mutated();
            for (k, v) in src.table.iter() {
                t.insert_cloned(k, v.clone())?;
            }
            Ok(())
        })
    }

    /// Lazy view over the keys.
    pub fn keys(&self) -> Keys<K, V> {
        Keys::new(Cursor::new(self.clone()))
    }

    /// Lazy view over the values.
    pub fn values(&self) -> Values<K, V> {
        Values::new(Cursor::new(self.clone()))
    }

    /// Lazy view over `(key, value)` pairs.
    pub fn items(&self) -> Items<K, V> {
        Items::new(Cursor::new(self.clone()))
    }

    /// Number of live holders of this table, views included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles share one table.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registry entry for this table's key/value types.
    pub fn specialization(&self) -> Result<&'static Specialization> {
        registry::specialization(K::KEY_TYPE, V::VALUE_TYPE)
    }

    pub(crate) fn stamp(&self) -> u64 {
        self.inner.access.stamp()
    }

    /// Read the entry at `pos`, provided the table is unchanged since `stamp`.
    pub(crate) fn fetch_at<T>(
        &self,
        pos: usize,
        stamp: u64,
        f: impl FnOnce(&K, &V) -> T,
    ) -> (Fetch<T>, usize) {
        let Ok(g) = self.inner.access.read() else {
            return (Fetch::Invalidated, 0);
        };
        if self.inner.access.stamp() != stamp {
            return (Fetch::Invalidated, 0);
        }
        let t = self.table(&g);
        let remaining = t.len().saturating_sub(pos + 1);
        match t.entry_at(pos) {
            Some((k, v)) => (Fetch::Item(f(k, v)), remaining),
            None => (Fetch::End, 0),
        }
    }
}

impl<K: MapKey, V: MapValue> Clone for SharedHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: MapKey, V: MapValue> Default for SharedHashMap<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: MapKey, V: MapValue> fmt::Debug for SharedHashMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SharedHashMap");
        d.field("key_type", &K::KEY_TYPE)
            .field("value_type", &V::VALUE_TYPE)
            .field("ref_count", &self.ref_count());
        match self.inner.access.read() {
            Ok(g) => d.field("len", &self.table(&g).len()),
            Err(_) => d.field("len", &"<being written>"),
        };
        d.finish()
    }
}

/// Tables are equal when they hold the same keys with equal values.
impl<K: MapKey, V: MapValue + PartialEq> PartialEq for SharedHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (ga, gb) = (self.read_guard(), other.read_guard());
        let (a, b) = (self.table(&ga), other.table(&gb));
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
    }
}

/// A read phase over one table. Lookups are plain loads; hold it for the
/// duration of a parallel loop.
///
/// References handed out by a reader live no longer than the reader, so
/// no write can start while one is in use:
///
/// ```compile_fail
/// use position_hashmap::SharedHashMap;
///
/// let m = SharedHashMap::from_arrays(&[1i64], &[10i64]).unwrap();
/// let r = m.reader().unwrap();
/// let v = r.get_ref(&1).unwrap();
/// drop(r);
/// m.set(1, 99).unwrap();
/// assert_eq!(*v, 10);
/// ```
///
/// ```compile_fail
/// use position_hashmap::SharedHashMap;
///
/// let m = SharedHashMap::from_arrays(&[1i64, 2], &[10i64, 20]).unwrap();
/// let r = m.reader().unwrap();
/// let items: Vec<(&i64, &i64)> = r.iter().collect();
/// drop(r);
/// m.clear().unwrap();
/// assert_eq!(items.len(), 2);
/// ```
pub struct MapReader<'a, K: MapKey, V> {
    table: &'a Table<K, V>,
    _guard: ReadGuard<'a>,
}

impl<'a, K: MapKey, V: MapValue> MapReader<'a, K, V> {
    #[inline]
    pub fn get<Q>(&self, q: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q).cloned().unwrap_or(default)
    }

    #[inline]
    pub fn get_ref<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q)
    }

    #[inline]
    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains_key(q)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.table.iter()
    }
}
