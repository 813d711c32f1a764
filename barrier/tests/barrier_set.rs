use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use barrier::{everyone, BarrierError, BarrierSet};

#[test]
fn test_initialize_sizes_every_slot() {
    let barriers = BarrierSet::initialize(6);
    assert_eq!(barriers.len(), BarrierSet::DEFAULT_SLOTS);
    for id in 0..barriers.len() {
        assert_eq!(barriers.participants(id), Some(6));
        assert!(barriers.participates(id, 5));
    }
    assert_eq!(barriers.participants(BarrierSet::DEFAULT_SLOTS), None);
    barriers.teardown();
}

#[test]
fn test_reconfigure_counts() {
    let mut barriers = BarrierSet::initialize(5);

    // explicit count
    assert_eq!(barriers.reconfigure(1, 4, 5), Ok(4));
    assert_eq!(barriers.participants(1), Some(4));

    // zero asks the predicate
    barriers.set_predicate(2, Arc::new(|id| id % 2 == 0)).unwrap();
    assert_eq!(barriers.reconfigure(2, 0, 5), Ok(3));
    assert!(barriers.participates(2, 4));
    assert!(!barriers.participates(2, 3));

    // never below one
    barriers.set_predicate(3, Arc::new(|_| false)).unwrap();
    assert_eq!(barriers.reconfigure(3, 0, 5), Ok(1));

    barriers.set_predicate(3, everyone()).unwrap();
    assert_eq!(barriers.reconfigure(3, 0, 5), Ok(5));

    assert_eq!(
        barriers.reconfigure(16, 2, 5),
        Err(BarrierError::OutOfRange { id: 16, slots: 16 })
    );
}

#[test]
fn test_non_participants_pass_through() {
    let mut barriers = BarrierSet::initialize(3);
    barriers.set_predicate(1, Arc::new(|id| id < 2)).unwrap();
    barriers.reconfigure(1, 0, 3).unwrap();
    let barriers = &barriers;

    let blocked = thread::scope(|s| {
        let handles: Vec<_> = (0..3)
            .map(|id| s.spawn(move || barriers.wait(1, id)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });
    assert_eq!(blocked, vec![true, true, false]);
}

#[test]
fn test_missing_participant_blocks() {
    let mut barriers = BarrierSet::initialize(2);
    // three participants configured, only two arrive at first
    barriers.reconfigure(4, 3, 3).unwrap();
    let barriers = &barriers;
    let released = AtomicUsize::new(0);
    let released = &released;

    thread::scope(|s| {
        for id in 0..2 {
            s.spawn(move || {
                barriers.wait(4, id);
                released.fetch_add(1, Ordering::SeqCst);
            });
        }
        thread::sleep(Duration::from_millis(200));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        // the late third participant opens the barrier
        barriers.wait(4, 2);
    });
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[test]
fn test_phases_reuse_across_repetitions() {
    const THREADS: usize = 4;
    const REPS: usize = 500;

    let barriers = BarrierSet::initialize(THREADS);
    let barriers = &barriers;
    let counter = AtomicUsize::new(0);
    let counter = &counter;

    thread::scope(|s| {
        for id in 0..THREADS {
            s.spawn(move || {
                for rep in 0..REPS {
                    barriers.wait(0, id);
                    counter.fetch_add(1, Ordering::Relaxed);
                    barriers.wait(3, id);
                    assert_eq!(counter.load(Ordering::Relaxed), THREADS * (rep + 1));
                }
                barriers.wait(10, id);
            });
        }
    });
    assert_eq!(counter.load(Ordering::Relaxed), THREADS * REPS);
}
