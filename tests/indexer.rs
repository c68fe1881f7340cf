// PositionIndexer integration suite.
//
// Verifies the indexer contract end to end: output aligned with the
// query, MISSING for absent keys, identical results across worker counts,
// shard counts and concurrent callers sharing one map.
use position_hashmap::{
    build_position_map, get_indexer, get_indexer_into, Error, IndexerConfig, PositionIndexer,
    ShardedPositionMap, MISSING,
};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

#[test]
fn repeated_reference_scenario() {
    let m = build_position_map(&[1i64, 2, 3, 1, 2, 3]).unwrap();
    assert_eq!(m.len(), 3);
    assert_eq!(get_indexer(&m, &[3, 4, 1, 2, 1]).unwrap(), vec![5, MISSING, 3, 4, 3]);
}

#[test]
fn string_scenario() {
    let keys: Vec<String> = ["b", "a", "c", "a"].iter().map(|s| s.to_string()).collect();
    let query: Vec<String> = ["a", "z", "b", "c"].iter().map(|s| s.to_string()).collect();
    let m = build_position_map(&keys).unwrap();
    let mut out = vec![0i64; query.len()];
    get_indexer_into(&m, &query, &mut out).unwrap();
    assert_eq!(out, vec![3, MISSING, 0, 2]);
}

// Test: many threads querying one shared map at once see the same answers
// as a single-threaded pass.
#[test]
fn concurrent_callers_agree() {
    let keys: Vec<i64> = lcg(3).take(40_000).map(|x| (x % 10_000) as i64).collect();
    let query: Vec<i64> = lcg(9).take(20_000).map(|x| (x % 12_000) as i64).collect();
    let m = build_position_map(&keys).unwrap();
    let expected: Vec<i64> = query.iter().map(|q| m.get(q, MISSING)).collect();
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| get_indexer(&m, &query).unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

#[test]
fn worker_counts_agree() {
    let keys: Vec<i32> = lcg(5).take(30_000).map(|x| (x % 7_000) as i32).collect();
    let query: Vec<i32> = (-100..8_000).collect();
    let m = build_position_map(&keys).unwrap();
    let baseline = get_indexer(&m, &query).unwrap();
    for threads in [1, 2, 5] {
        let indexer = PositionIndexer::new(
            IndexerConfig::default()
                .with_num_threads(threads)
                .with_min_chunk_len(128),
        )
        .unwrap();
        assert_eq!(indexer.get_indexer(&m, &query).unwrap(), baseline, "threads {}", threads);
    }
}

#[test]
fn sharded_and_flat_agree() {
    let keys: Vec<i64> = lcg(17).take(25_000).map(|x| (x % 3_000) as i64).collect();
    let query: Vec<i64> = (-5..3_005).collect();
    let flat = build_position_map(&keys).unwrap();
    let baseline = get_indexer(&flat, &query).unwrap();
    for shards in [1, 3, 8, 64] {
        let sharded = ShardedPositionMap::build(&keys, shards).unwrap();
        let indexer = PositionIndexer::new(IndexerConfig::default()).unwrap();
        assert_eq!(
            indexer.get_indexer_sharded(&sharded, &query).unwrap(),
            baseline,
            "shards {}",
            shards
        );
        assert_eq!(sharded.merge().unwrap(), flat);
    }
}

#[test]
fn pool_of_zero_threads_uses_default() {
    // rayon treats zero as "pick automatically"
    let indexer = PositionIndexer::new(IndexerConfig::default().with_num_threads(0)).unwrap();
    assert!(indexer.num_threads() >= 1);
}

#[test]
fn misaligned_output_is_rejected() {
    let m = build_position_map(&[1i64, 2]).unwrap();
    let reader = m.reader().unwrap();
    let indexer = PositionIndexer::new(IndexerConfig::default()).unwrap();
    let mut out = vec![0i64; 1];
    assert!(matches!(
        indexer.lookup_into(&reader, &[1i64, 2], &mut out),
        Err(Error::LengthMismatch { left: 2, right: 1 })
    ));
}
