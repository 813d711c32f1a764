use bench_config::{BenchConfig, RoleAssignment, TestId};
use coherence::{
    AtomicOps, Backoff, LineBuffer, Probe, RaceState, Slot, StrideWalker, TasMode, TAS_SET,
};

const REPS: usize = 8;

fn single_thread_config(stride: usize) -> BenchConfig {
    let roles = RoleAssignment::build(None, None, TestId::Cas, 1).unwrap();
    let mut config = BenchConfig::new(roles);
    config.repetitions = REPS;
    config.stride = stride;
    config.cache_lines = 16;
    config
}

#[test]
fn test_backoff_doubles_up_to_cap() {
    let mut backoff = Backoff::new(8);
    let spins: Vec<u32> = (0..6).map(|_| backoff.snooze()).collect();
    assert_eq!(spins, vec![1, 2, 4, 8, 8, 8]);

    backoff.reset();
    assert_eq!(backoff.current(), 1);

    // a zero cap still pauses once
    let mut floor = Backoff::new(0);
    assert_eq!(floor.cap(), 1);
    assert_eq!(floor.snooze(), 1);
    assert_eq!(floor.snooze(), 1);
}

#[test]
fn test_stride_walk_bounds() {
    let mut direct = StrideWalker::new(1, 7);
    for _ in 0..100 {
        assert_eq!(direct.draw(), 0);
    }

    let mut walker = StrideWalker::new(8, 42);
    for _ in 0..200 {
        let mut visited = Vec::new();
        let last = walker.walk(|offset| {
            visited.push(offset);
            offset
        });
        assert_eq!(last, 0);
        assert_eq!(visited.last(), Some(&0));
        assert!(visited.iter().all(|&offset| offset < 8));
        assert_eq!(visited.iter().filter(|&&offset| offset == 0).count(), 1);
    }
}

#[test]
fn test_single_thread_cas_always_lands() {
    let config = single_thread_config(4);
    let buffer = LineBuffer::allocate(config.cache_lines).unwrap();
    let race = RaceState::new(1, REPS);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 1);

    for rep in 0..REPS {
        assert!(ops.cas(rep));
        assert_eq!(race.winner(rep), Some(0));
    }
    let counters = ops.counters();
    assert_eq!(counters.successes, REPS as u64);
    assert_eq!(counters.failures, 0);
    assert_eq!(ops.samples().count(Slot::Primary), REPS);
    assert_eq!(race.wins(0), REPS as u64);
}

#[test]
fn test_tas_and_release() {
    let config = single_thread_config(1);
    let buffer = LineBuffer::allocate(config.cache_lines).unwrap();
    let race = RaceState::new(1, REPS);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 1);

    assert!(ops.tas(0, TasMode::Once));
    assert!(!ops.tas(1, TasMode::Once));
    assert_eq!(ops.target().head().load(std::sync::atomic::Ordering::Relaxed), TAS_SET);
    ops.release_tas();
    assert!(ops.tas(2, TasMode::UntilAcquired));

    let counters = ops.counters();
    assert_eq!((counters.successes, counters.failures), (2, 1));
}

#[test]
fn test_fai_swap_and_retry() {
    let config = single_thread_config(2);
    let buffer = LineBuffer::allocate(config.cache_lines).unwrap();
    let race = RaceState::new(1, REPS);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 3);

    assert_eq!(ops.fai(0), 0);
    assert_eq!(ops.fai(1), 1);
    assert_eq!(ops.swap(2), 2);
    assert_eq!(ops.swap(3), 0);
    assert_eq!(ops.cas_until_success(4), 1);
    assert_eq!(ops.load(5), 1);
}

#[test]
fn test_store_slots_and_advance() {
    let config = single_thread_config(2);
    let buffer = LineBuffer::allocate(config.cache_lines).unwrap();
    let race = RaceState::new(1, REPS);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 5);

    ops.store(0, Slot::Primary);
    ops.store(0, Slot::Secondary);
    ops.store(1, Slot::Secondary);
    assert_eq!(ops.samples().count(Slot::Primary), 1);
    assert_eq!(ops.samples().count(Slot::Secondary), 2);

    ops.advance(2);
    assert_eq!(ops.base(), 2);
    ops.store_target(2);
    assert_eq!(buffer.line(2).head().load(std::sync::atomic::Ordering::Relaxed), 2);

    // probes time a region but never claim a round
    ops.probe(7, Probe::Pause);
    assert_eq!(race.winner(7), None);
}

#[test]
fn test_chase_ring_is_one_cycle() {
    let config = single_thread_config(1);
    let buffer = LineBuffer::allocate(config.cache_lines).unwrap();
    buffer.build_chase_ring(9);

    let mut seen = vec![false; buffer.len()];
    let mut index = 0;
    for _ in 0..buffer.len() {
        assert!(!seen[index]);
        seen[index] = true;
        index = buffer.next_in_ring(index);
    }
    assert_eq!(index, 0);
    assert!(seen.into_iter().all(|visited| visited));

    let race = RaceState::new(1, REPS);
    let mut ops = AtomicOps::new(&buffer, &race, &config, 0, 1);
    assert_eq!(ops.chase(0), 0);
    assert_eq!(ops.samples().count(Slot::Primary), 1);
}
