mod common;

use common::Arena;
use kernel_memory_addresses::{PhysicalPage, Size4K};
use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const THREADS: usize = 8;

fn slot(arena: &Arena, page: PhysicalPage<Size4K>) -> usize {
    usize::try_from(page.pages_from(arena.page(0)).unwrap()).unwrap()
}

#[test]
fn concurrent_allocations_are_exclusive() {
    let pages = 32;
    let iters = 2_000;

    let arena = Arena::new(pages);
    let pmm = arena.allocator();
    let claimed: Vec<AtomicBool> = (0..pages).map(|_| AtomicBool::new(false)).collect();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for t in 0..THREADS {
            let (arena, pmm, claimed, start) = (&arena, &pmm, &claimed, &start);
            s.spawn(move || {
                let tag = u8::try_from(0x10 + t).unwrap();
                let mut held = Vec::with_capacity(3);
                start.wait();

                for i in 0..iters {
                    // Grab a few pages; the pool may run dry, which is fine.
                    for _ in 0..3 {
                        let Some(page) = pmm.allocate() else { break };
                        let was = claimed[slot(arena, page)].swap(true, Ordering::SeqCst);
                        assert!(!was, "{page} handed to two threads at once");
                        arena.write(page, tag);
                        held.push(page);
                    }

                    // Every other round, take an extra reference and drop it again.
                    if i % 2 == 0 {
                        for page in &held {
                            pmm.accumulate(page.base()).unwrap();
                        }
                        for page in &held {
                            pmm.release(page.base()).unwrap();
                        }
                    }

                    for page in held.drain(..) {
                        assert!(
                            arena.bytes_of(page).iter().all(|&b| b == tag),
                            "{page} was written by someone else"
                        );
                        claimed[slot(arena, page)].store(false, Ordering::SeqCst);
                        pmm.release(page.base()).unwrap();
                    }

                    thread::yield_now();
                }
            });
        }
    });

    assert_eq!(pmm.free_pages(), pages);
    assert!(claimed.iter().all(|c| !c.load(Ordering::SeqCst)));
}

#[test]
fn shared_page_counts_survive_contention() {
    let iters = 5_000;

    let arena = Arena::new(4);
    let pmm = arena.allocator();
    let shared = pmm.allocate().unwrap();
    let start = Barrier::new(THREADS);

    thread::scope(|s| {
        for _ in 0..THREADS {
            let (pmm, start) = (&pmm, &start);
            s.spawn(move || {
                start.wait();
                for _ in 0..iters {
                    pmm.accumulate(shared.base()).unwrap();
                    pmm.release(shared.base()).unwrap();
                }
            });
        }
    });

    // No lost update: the original owner still holds the page.
    assert_eq!(pmm.free_pages(), 3);
    pmm.release(shared.base()).unwrap();
    assert_eq!(pmm.free_pages(), 4);
}

#[test]
fn last_release_races_with_allocation() {
    let pages = 8;
    let rounds = 500;

    let arena = Arena::new(pages);
    let pmm = arena.allocator();

    for _ in 0..rounds {
        // Every page owned by all threads at once.
        let owned: Vec<_> = std::iter::from_fn(|| pmm.allocate()).collect();
        assert_eq!(owned.len(), pages);
        for page in &owned {
            for _ in 1..THREADS {
                pmm.accumulate(page.base()).unwrap();
            }
        }

        // Each thread drops its share, then immediately tries to allocate.
        let start = Barrier::new(THREADS);
        let grabbed: Vec<Vec<PhysicalPage<Size4K>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let (pmm, owned, start) = (&pmm, &owned, &start);
                    s.spawn(move || {
                        start.wait();
                        for page in owned {
                            pmm.release(page.base()).unwrap();
                        }
                        std::iter::from_fn(|| pmm.allocate()).collect()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut all: Vec<_> = grabbed.into_iter().flatten().collect();
        let count = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), count, "a page was allocated twice");
        assert_eq!(count + pmm.free_pages(), pages);

        for page in all {
            pmm.release(page.base()).unwrap();
        }
        assert_eq!(pmm.free_pages(), pages);
    }
}
