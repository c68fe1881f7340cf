//! Parallel position lookup.
//!
//! Given a position map and a query sequence, produce an array aligned with
//! the query holding each element's position or [`MISSING`]. Workers split
//! the query into disjoint chunks; the table is read-only for the whole call
//! and the read phase is entered once, up front.

use crate::builder::PositionMap;
use crate::error::{Error, Result};
use crate::shared_map::MapReader;
use crate::sharded::ShardedPositionMap;
use crate::types::MapKey;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Position reported for keys absent from the map.
pub const MISSING: i64 = -1;

/// Anything that can answer "where does this key live".
pub trait PositionLookup<K>: Sync {
    fn position(&self, key: &K) -> i64;
}

impl<K: MapKey> PositionLookup<K> for MapReader<'_, K, i64> {
    #[inline]
    fn position(&self, key: &K) -> i64 {
        self.get(key, MISSING)
    }
}

#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// Worker threads for a dedicated pool; `None` uses rayon's global pool.
    pub num_threads: Option<usize>,
    /// Smallest number of query elements handed to one worker.
    pub min_chunk_len: usize,
    /// Shards for [`PositionIndexer::build_sharded`]; `None` uses one per
    /// worker thread.
    pub shards: Option<usize>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_chunk_len: 4096,
            shards: None,
        }
    }
}

impl IndexerConfig {
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    pub fn with_min_chunk_len(mut self, n: usize) -> Self {
        self.min_chunk_len = n.max(1);
        self
    }

    pub fn with_shards(mut self, n: usize) -> Self {
        self.shards = Some(n.max(1));
        self
    }
}

pub struct PositionIndexer {
    config: IndexerConfig,
    pool: Option<ThreadPool>,
}

impl PositionIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self> {
        let pool = match config.num_threads {
            Some(n) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("position-indexer-{}", i))
                    .build()?,
            ),
            None => None,
        };
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Worker count calls on this indexer run with.
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(p) => p.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(p) => p.install(f),
            None => f(),
        }
    }

    /// Positions of every `query` element in `map`.
    pub fn get_indexer<K: MapKey>(&self, map: &PositionMap<K>, query: &[K]) -> Result<Vec<i64>> {
        let reader = map.reader()?;
        self.lookup_all(&reader, query)
    }

    /// Positions of every `query` element in a sharded map.
    pub fn get_indexer_sharded<K: MapKey + Ord>(
        &self,
        map: &ShardedPositionMap<K>,
        query: &[K],
    ) -> Result<Vec<i64>> {
        let reader = map.reader()?;
        self.lookup_all(&reader, query)
    }

    pub fn lookup_all<K, L>(&self, lookup: &L, query: &[K]) -> Result<Vec<i64>>
    where
        K: Sync,
        L: PositionLookup<K>,
    {
        let mut out = vec![MISSING; query.len()];
        self.lookup_into(lookup, query, &mut out)?;
        Ok(out)
    }

    /// Fill `out[i]` with the position of `query[i]`.
    pub fn lookup_into<K, L>(&self, lookup: &L, query: &[K], out: &mut [i64]) -> Result<()>
    where
        K: Sync,
        L: PositionLookup<K>,
    {
        if out.len() != query.len() {
            return Err(Error::LengthMismatch {
                left: query.len(),
                right: out.len(),
            });
        }
        let min_len = self.config.min_chunk_len.max(1);
        self.install(|| fill(lookup, query, out, min_len));
        debug!(queries = query.len(), threads = self.num_threads(), "filled indexer");
        Ok(())
    }

    /// Build a sharded position map of `keys`, one shard per parallel chunk.
    pub fn build_sharded<K: MapKey + Ord>(&self, keys: &[K]) -> Result<ShardedPositionMap<K>> {
        let shards = self.config.shards.unwrap_or_else(|| self.num_threads());
        self.install(|| ShardedPositionMap::build(keys, shards))
    }
}

/// [`PositionIndexer::get_indexer`] on rayon's global pool.
pub fn get_indexer<K: MapKey>(map: &PositionMap<K>, query: &[K]) -> Result<Vec<i64>> {
    let reader = map.reader()?;
    let mut out = vec![MISSING; query.len()];
    fill(&reader, query, &mut out, IndexerConfig::default().min_chunk_len);
    Ok(out)
}

/// [`PositionIndexer::lookup_into`] on rayon's global pool.
pub fn get_indexer_into<K: MapKey>(map: &PositionMap<K>, query: &[K], out: &mut [i64]) -> Result<()> {
    if out.len() != query.len() {
        return Err(Error::LengthMismatch {
            left: query.len(),
            right: out.len(),
        });
    }
    let reader = map.reader()?;
    fill(&reader, query, out, IndexerConfig::default().min_chunk_len);
    Ok(())
}

fn fill<K: Sync, L: PositionLookup<K>>(lookup: &L, query: &[K], out: &mut [i64], min_len: usize) {
    out.par_iter_mut()
        .zip(query.par_iter())
        .with_min_len(min_len)
        .for_each(|(slot, key)| *slot = lookup.position(key));
}
