//! position-hashmap: shared, type-specialized hash tables and bulk
//! position indexing.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build a lookup structure once from a reference sequence, then
//!   answer "where does this element live" for large query batches in
//!   parallel.
//! - Layers:
//!   - RawTable<K, V, S>: structural table. Entries live densely in a
//!     `Vec`; a `hashbrown::HashTable<usize>` indexes them by stored hash.
//!   - SharedHashMap<K, V>: public handle. An `Arc` around one RawTable and
//!     its access state; clones and iteration views share the table.
//!   - PositionMapBuilder / build_position_map: single-pass bulk build of a
//!     key -> last-index table into a private RawTable, published when done.
//!   - PositionIndexer / get_indexer: rayon-parallel lookup of a query
//!     array into an aligned position array, optionally against a
//!     ShardedPositionMap.
//!   - DynHashMap: run-time-typed facade over the twelve specialized
//!     `(key, value)` pairs, with type checks at the call boundary.
//!
//! Constraints
//! - No operation blocks. Readers and writers of one table are never
//!   queued; an overlapping write fails with `Error::AccessConflict`.
//! - Lookups in parallel loops go through a `MapReader`, which enters the
//!   read phase once and then performs plain loads.
//! - Table construction and growth are fallible; allocation failure is
//!   `Error::AllocationError`, never an abort.
//!
//! Access discipline
//! - Each table carries an atomic `AccessState`: any number of readers or a
//!   single writer. Handle-level reads (`get`, `contains`, `len`) panic if
//!   they meet an active writer, which can only happen through reentrancy
//!   from `K: Eq/Hash` or a data race in the caller. Writes report the
//!   conflict as an error instead.
//! - Every effective mutation bumps a stamp. Iteration views capture the
//!   stamp when created and end (`is_invalidated`) once it moves.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash; growth and removal reindex by the
//!   stored hash, so `K: Hash` is never invoked after insertion.
//! - Integer keys hash with `rustc_hash::FxBuildHasher`; strings and
//!   generic keys with `ahash::RandomState`.
//!
//! Position semantics
//! - Positions are 0-based `i64`. A repeated key keeps its last index;
//!   sharded lookups walk shards from last to first to preserve that.
//! - Keys absent from the map report `indexer::MISSING` (`-1`).
//!
//! Notes and non-goals
//! - Float keys are rejected (`UnsupportedKeyType`).
//! - Generic keys (`types::Generic<T>`) work for every table operation but
//!   have no bulk position builder; use `build_position_map_sequential`.
//! - Iteration order is storage order and otherwise unspecified.

pub mod access;
pub mod array;
pub mod builder;
pub mod dyn_map;
pub mod error;
pub mod indexer;
pub mod iter;
mod raw_table;
pub mod registry;
pub mod shared_map;
pub mod sharded;
pub mod types;

// Public surface
pub use array::{Scalar, TypedArray};
pub use builder::{build_position_map, build_position_map_sequential, PositionMap, PositionMapBuilder};
pub use dyn_map::DynHashMap;
pub use error::{Error, Result};
pub use indexer::{get_indexer, get_indexer_into, IndexerConfig, PositionIndexer, PositionLookup, MISSING};
pub use iter::{Items, Keys, Values};
pub use registry::{Operation, Specialization};
pub use shared_map::{MapReader, SharedHashMap};
pub use sharded::{ShardedPositionMap, ShardedReader};
pub use types::{ElemType, Generic, KeyType, MapKey, MapValue, ValueType};
