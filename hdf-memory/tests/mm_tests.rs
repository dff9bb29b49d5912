//! Object pool tests

use std::sync::Arc;
use std::thread;

use hdf_api::Error;
use hdf_memory::*;
use proptest::prelude::*;

fn sample_pool() -> ObjectPool {
    let config = ObjectPoolConfig::new(0)
        .with_chunk(16, 8)
        .with_chunk(64, 4)
        .with_chunk(256, 2)
        .fit_buffer();
    ObjectPool::new(&config).unwrap()
}

#[test]
fn test_pool_exhaustion_reports_busy() {
    let pool = sample_pool();
    let chunks: Vec<Chunk> = (0..4).map(|_| pool.alloc(48).unwrap()).collect();
    assert!(matches!(pool.alloc(48), Err(Error::Busy(_))));

    // Larger and smaller classes are unaffected
    let small = pool.alloc(8).unwrap();
    let large = pool.alloc(200).unwrap();
    assert_eq!(small.size(), 16);
    assert_eq!(large.size(), 256);

    for chunk in chunks {
        pool.free(chunk).unwrap();
    }
    pool.free(small).unwrap();
    pool.free(large).unwrap();
    assert_eq!(pool.free_chunks(), 14);
}

#[test]
fn test_pool_slot_returns_on_drop() {
    let pool = Arc::new(sample_pool());
    {
        let slot = pool.obtain(60).unwrap();
        slot.write(0, b"uart_service").unwrap();
        let mut out = [0u8; 4];
        slot.read(0, &mut out).unwrap();
        assert_eq!(&out, b"uart");
        assert_eq!(pool.stats()[1].free_chunks, 3);
    }
    assert_eq!(pool.stats()[1].free_chunks, 4);
}

#[test]
fn test_pool_concurrent_alloc() {
    let pool = Arc::new(sample_pool());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let slot = pool.obtain(10).unwrap();
                    assert_eq!(slot.size(), 16);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(pool.free_chunks(), 14);
}

proptest! {
    #[test]
    fn prop_best_fit_picks_smallest_class(size in 1usize..=256) {
        let pool = sample_pool();
        let chunk = pool.alloc(size).unwrap();
        let expected = [16usize, 64, 256].into_iter().find(|&c| c >= size).unwrap();
        prop_assert_eq!(chunk.size(), expected);
        pool.free(chunk).unwrap();
    }

    #[test]
    fn prop_alloc_free_sequence_keeps_accounting(sizes in prop::collection::vec(1usize..=64, 0..20)) {
        let pool = sample_pool();
        let mut held = Vec::new();
        for size in sizes {
            match pool.alloc(size) {
                Ok(chunk) => held.push(chunk),
                Err(err) => prop_assert!(matches!(err, Error::Busy(_))),
            }
        }
        prop_assert_eq!(pool.free_chunks() + held.len(), 14);
        for chunk in held {
            pool.free(chunk).unwrap();
        }
        prop_assert_eq!(pool.free_chunks(), 14);
    }
}
