// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end allocator scenarios: round trips, free-list recycling,
//! size-class dispatch, growth semantics, and cross-thread publication.

use offheap::{size_class, ObjectRef, Plain, SliceRef, Store};

fn stat_totals(store: &Store) -> (u64, u64, u64, u64) {
    let stats = store.stats();
    (
        stats.iter().map(|s| s.allocs).sum(),
        stats.iter().map(|s| s.frees).sum(),
        stats.iter().map(|s| s.raw_allocs).sum(),
        stats.iter().map(|s| s.reuses).sum(),
    )
}

#[test]
fn object_round_trip() {
    let store = Store::new();
    let r = store.alloc_object::<i64>();
    *r.value() = 42;
    assert_eq!(*r.value(), 42);
    store.free_object(r);

    let stats = store.stats()[size_class(8)];
    assert_eq!(stats.allocs, 1);
    assert_eq!(stats.frees, 1);
    assert_eq!(stats.live, 0);
    assert_eq!(stats.raw_allocs, 1);
    assert_eq!(stats.reuses, 0);
}

#[test]
fn free_list_reuse() {
    let store = Store::new();
    let first: Vec<ObjectRef<u64>> = (0..3).map(|_| store.alloc_object::<u64>()).collect();
    for r in &first {
        store.free_object(*r);
    }
    let second: Vec<ObjectRef<u64>> = (0..3).map(|_| store.alloc_object::<u64>()).collect();

    let stats = store.stats()[size_class(8)];
    assert_eq!(stats.allocs, 6);
    assert_eq!(stats.frees, 3);
    assert_eq!(stats.live, 3);
    assert_eq!(stats.raw_allocs, 3);
    assert_eq!(stats.reuses, 3);
    assert_eq!(stats.slabs, 1);

    for r in second {
        store.free_object(r);
    }
}

#[test]
fn size_class_dispatch() {
    let expected = [
        (0u64, 0usize),
        (1, 0),
        (2, 1),
        (3, 2),
        (4, 2),
        (31, 5),
        (32, 5),
        (33, 6),
        (511, 9),
        (512, 9),
        (513, 10),
    ];
    for (size, class) in expected {
        assert_eq!(size_class(size), class, "size {size}");
    }
}

#[test]
fn slice_append_growth() {
    let store = Store::new();
    let mut r: SliceRef<i64> = store.alloc_slice(0, 0);
    for i in 0..100 {
        r = store.append(r, i);
    }

    let expected: Vec<i64> = (0..100).collect();
    assert_eq!(&*r.value(), expected.as_slice());
    assert_eq!(r.capacity(), 128);

    // Eight appends crossed a power-of-two capacity boundary; each freed
    // its predecessor and no other append freed anything.
    let (allocs, frees, _, _) = stat_totals(&store);
    assert_eq!(allocs, 9);
    assert_eq!(frees, 8);

    store.free_slice(r);
}

#[test]
fn string_concat() {
    let store = Store::new();
    let r = store.concat_strings(&["all", "oca", "ted"]);
    assert_eq!(r.value(), "allocated");
    store.free_string(r);
}

#[test]
fn interleaved_allocs_read_back_exactly() {
    let store = Store::new();
    let mut refs = Vec::new();
    for round in 0..10u64 {
        for k in 0..50u64 {
            let r = store.alloc_object::<u64>();
            *r.value() = round * 1000 + k;
            refs.push((round * 1000 + k, r));
        }
        // Free every other ref from the previous round to interleave
        // recycling with fresh allocation.
        if round > 0 {
            let cut = refs.len() - 50;
            let mut kept = Vec::new();
            for (i, (v, r)) in refs.drain(..cut).enumerate() {
                if i % 2 == 0 {
                    store.free_object(r);
                } else {
                    kept.push((v, r));
                }
            }
            kept.extend(refs.drain(..));
            refs = kept;
        }
    }
    for (expected, r) in &refs {
        assert_eq!(*r.value(), *expected);
    }
    for (_, r) in refs {
        store.free_object(r);
    }
}

#[test]
fn live_refs_never_alias() {
    let store = Store::new();
    let refs: Vec<ObjectRef<u64>> = (0..200).map(|_| store.alloc_object::<u64>()).collect();
    for (i, r) in refs.iter().enumerate() {
        *r.value() = i as u64;
    }
    for (i, r) in refs.iter().enumerate() {
        assert_eq!(*r.value(), i as u64, "slot aliased");
    }
    for r in refs {
        store.free_object(r);
    }
}

#[test]
#[should_panic(expected = "double free")]
fn double_free_raises() {
    let store = Store::new();
    let r = store.alloc_object::<u32>();
    store.free_object(r);
    store.free_object(r);
}

#[test]
#[should_panic(expected = "use after free")]
fn read_after_free_raises() {
    let store = Store::new();
    let r = store.alloc_object::<u32>();
    store.free_object(r);
    let _ = r.value();
}

#[test]
#[should_panic(expected = "stale reference")]
fn append_invalidates_the_input_ref() {
    let store = Store::new();
    let before: SliceRef<u8> = store.alloc_slice(0, 8);
    let after = store.append(before, 1);
    assert_eq!(&*after.value(), &[1]);
    let _ = before.value();
}

#[test]
fn append_slice_and_concat_agree() {
    let store = Store::new();
    let a = store.concat_slices::<u32>(&[&[1, 2, 3], &[4, 5]]);
    let mut b: SliceRef<u32> = store.alloc_slice(0, 0);
    b = store.append_slice(b, &[1, 2, 3]);
    b = store.append_slice(b, &[4, 5]);
    assert_eq!(&*a.value(), &*b.value());
    store.free_slice(a);
    store.free_slice(b);
}

#[test]
fn handles_publish_across_threads() {
    use crossbeam::channel;
    use std::sync::Arc;

    let store = Arc::new(Store::new());
    let (tx, rx) = channel::bounded::<(u64, ObjectRef<u64>)>(32);

    let producer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for i in 0..1000u64 {
                let r = store.alloc_object::<u64>();
                *r.value() = i * i;
                tx.send((i, r)).expect("receiver should be alive");
            }
        })
    };

    let consumer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            // Channel receipt is the happens-before edge that makes the
            // producer's write visible.
            for (i, r) in rx {
                assert_eq!(*r.value(), i * i);
                store.free_object(r);
            }
        })
    };

    producer.join().expect("producer should not panic");
    consumer.join().expect("consumer should not panic");

    let (allocs, frees, _, _) = stat_totals(&store);
    assert_eq!(allocs, 1000);
    assert_eq!(frees, 1000);
}

#[test]
fn randomized_parallel_stress() {
    use std::sync::Arc;

    let store = Arc::new(Store::sized(4096));
    let mut threads = Vec::new();
    for seed in 0..4u64 {
        let store = Arc::clone(&store);
        threads.push(std::thread::spawn(move || {
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut live: Vec<(u64, SliceRef<u64>)> = Vec::new();
            for _ in 0..2000 {
                if live.is_empty() || rng.bool() {
                    let len = rng.usize(0..32);
                    let fill = rng.u64(..);
                    let mut r: SliceRef<u64> = store.alloc_slice(0, len);
                    for _ in 0..len {
                        r = store.append(r, fill);
                    }
                    live.push((fill, r));
                } else {
                    let (fill, r) = live.swap_remove(rng.usize(0..live.len()));
                    assert!(r.value().iter().all(|v| *v == fill));
                    store.free_slice(r);
                }
            }
            for (fill, r) in live {
                assert!(r.value().iter().all(|v| *v == fill));
                store.free_slice(r);
            }
        }));
    }
    for t in threads {
        t.join().expect("stress thread should not panic");
    }

    let stats = store.stats();
    let live: u64 = stats.iter().map(|s| s.live).sum();
    assert_eq!(live, 0);
}

#[test]
fn zero_sized_and_oversized_edges() {
    #[derive(Clone, Copy)]
    struct Marker;
    // SAFETY: zero-sized, dropless, no owned memory.
    unsafe impl Plain for Marker {}

    let store = Store::new();
    let a = store.alloc_object::<Marker>();
    let b = store.alloc_object::<Marker>();
    assert_ne!(a, b, "zero-sized objects still get distinct slots");
    store.free_object(a);
    store.free_object(b);

    let empty = store.alloc_string_from_str("");
    assert_eq!(empty.value(), "");
    store.free_string(empty);
}

#[test]
fn alloc_configs_cover_every_class() {
    let store = Store::new();
    let configs = store.alloc_configs();
    assert_eq!(configs.len(), offheap::MAX_SIZE_CLASS + 1);
    for (class, config) in configs.iter().enumerate() {
        assert_eq!(config.object_size, 1u64 << class);
        assert!(config.objects_per_slab >= 1);
        assert_eq!(
            config.slab_total_bytes,
            config.total_object_bytes + config.total_metadata_bytes
        );
    }
}
