//! Sharded position maps.
//!
//! The reference sequence is cut into contiguous chunks and each chunk is
//! built into its own table by an independent worker, so construction needs
//! no shared writes. Every shard remembers the `[min, max]` key range it
//! saw; a query skips shards whose range cannot hold the key.
//!
//! Later shards cover later positions, so a query walks shards from last to
//! first and the first hit is the key's last occurrence overall.

use crate::builder::{presize_hint, PositionMap, PositionMapBuilder};
use crate::error::Result;
use crate::indexer::{PositionLookup, MISSING};
use crate::registry;
use crate::shared_map::MapReader;
use crate::types::MapKey;
use rayon::prelude::*;
use tracing::debug;

/// Inclusive key range observed while building one shard.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyRange<K> {
    pub min: K,
    pub max: K,
}

impl<K: Ord + Clone> KeyRange<K> {
    fn new(key: &K) -> Self {
        Self {
            min: key.clone(),
            max: key.clone(),
        }
    }

    fn observe(&mut self, key: &K) {
        if *key < self.min {
            self.min = key.clone();
        } else if *key > self.max {
            self.max = key.clone();
        }
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.min <= *key && *key <= self.max
    }
}

pub struct Shard<K: MapKey> {
    map: PositionMap<K>,
    range: Option<KeyRange<K>>,
    offset: usize,
    len: usize,
}

impl<K: MapKey + Ord> Shard<K> {
    fn build(keys: &[K], offset: usize) -> Result<Self> {
        let mut builder = PositionMapBuilder::with_capacity(presize_hint(keys.len()))?
            .with_offset(offset as i64);
        let mut range: Option<KeyRange<K>> = None;
        for key in keys {
            builder.push(key)?;
            match &mut range {
                Some(r) => r.observe(key),
                None => range = Some(KeyRange::new(key)),
            }
        }
        Ok(Self {
            map: builder.finish(),
            range,
            offset,
            len: keys.len(),
        })
    }

    pub fn map(&self) -> &PositionMap<K> {
        &self.map
    }

    /// Key range of this shard; `None` for an empty shard.
    pub fn range(&self) -> Option<&KeyRange<K>> {
        self.range.as_ref()
    }

    /// Positions `offset..offset + len` of the reference sequence.
    pub fn span(&self) -> (usize, usize) {
        (self.offset, self.len)
    }
}

pub struct ShardedPositionMap<K: MapKey> {
    shards: Vec<Shard<K>>,
}

impl<K: MapKey + Ord> ShardedPositionMap<K> {
    /// Build `shards` independent position maps over contiguous chunks of
    /// `keys`, in parallel.
    pub fn build(keys: &[K], shards: usize) -> Result<Self> {
        registry::position_builder(K::KEY_TYPE)?;
        let chunk = keys.len().div_ceil(shards.max(1)).max(1);
        let shards = keys
            .par_chunks(chunk)
            .enumerate()
            .map(|(i, part)| Shard::build(part, i * chunk))
            .collect::<Result<Vec<_>>>()?;
        debug!(keys = keys.len(), shards = shards.len(), "built sharded position map");
        Ok(Self { shards })
    }

    pub fn shards(&self) -> &[Shard<K>] {
        &self.shards
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Last position of `key` across all shards, or `default`.
    pub fn get(&self, key: &K, default: i64) -> i64 {
        for shard in self.shards.iter().rev() {
            match &shard.range {
                Some(r) if r.contains(key) => {}
                _ => continue,
            }
            if let Some(p) = shard.map.try_get(key) {
                return p;
            }
        }
        default
    }

    /// Enter the read phase on every shard.
    pub fn reader(&self) -> Result<ShardedReader<'_, K>> {
        let shards = self
            .shards
            .iter()
            .filter_map(|s| s.range.as_ref().map(|r| (s, r)))
            .map(|(s, r)| Ok((s.map.reader()?, r)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ShardedReader { shards })
    }

    /// Fold every shard into one position map, later shards winning.
    pub fn merge(&self) -> Result<PositionMap<K>> {
        let total: usize = self.shards.iter().map(|s| s.map.len()).sum();
        let merged = PositionMap::with_capacity(presize_hint(total))?;
        for shard in &self.shards {
            merged.update(&shard.map)?;
        }
        Ok(merged)
    }
}

/// Read phase over every non-empty shard.
pub struct ShardedReader<'a, K: MapKey> {
    shards: Vec<(MapReader<'a, K, i64>, &'a KeyRange<K>)>,
}

impl<K: MapKey + Ord> PositionLookup<K> for ShardedReader<'_, K> {
    #[inline]
    fn position(&self, key: &K) -> i64 {
        for (reader, range) in self.shards.iter().rev() {
            if !range.contains(key) {
                continue;
            }
            if let Some(&p) = reader.get_ref(key) {
                return p;
            }
        }
        MISSING
    }
}
