//! The memory primitives under measurement. Each one reaches the line under test through a
//! random walk over decoy lines, so that hardware prefetchers cannot warm the target up.

use std::sync::atomic::Ordering;

use bench_config::{BenchConfig, FenceLevel, LoadFence, StoreFence};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use utils::cycles::{full_fence, load_fence, nop, pause, read_cycles, store_fence};

use crate::{CacheLine, LineBuffer, RaceState, SampleStore, Slot};

/// Value test-and-set leaves in the flag byte.
pub const TAS_SET: u32 = 0xFF;

/// Draws decoy offsets in `0..stride`.
#[derive(Debug, Clone)]
pub struct StrideWalker {
    rng: SmallRng,
    stride: usize,
}

impl StrideWalker {
    pub fn new(stride: usize, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            stride: stride.max(1),
        }
    }

    #[inline(always)]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline(always)]
    pub fn draw(&mut self) -> usize {
        if self.stride == 1 {
            0
        } else {
            self.rng.gen_range(0..self.stride)
        }
    }

    /// Apply `op` to random offsets until offset 0, the target, comes up. Every nonzero offset
    /// is a decoy whose result is discarded; the target's result is returned.
    #[inline(always)]
    pub fn walk<R>(&mut self, mut op: impl FnMut(usize) -> R) -> R {
        loop {
            let offset = self.draw();
            let result = op(offset);
            if offset == 0 {
                return result;
            }
        }
    }
}

/// Exponential pause count between failed attempts, doubling up to a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: u32,
    cap: u32,
}

impl Backoff {
    pub fn new(cap: u32) -> Self {
        Self {
            current: 1,
            cap: cap.max(1),
        }
    }

    #[inline(always)]
    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// Pause count the next [`Backoff::snooze`] will use.
    #[inline(always)]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[inline(always)]
    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Spin for the current pause count, then double it up to the cap. Returns the count spun.
    #[inline]
    pub fn snooze(&mut self) -> u32 {
        let spins = self.current;
        for _ in 0..spins {
            pause();
        }
        self.current = spins.saturating_mul(2).min(self.cap);
        spins
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl OpCounters {
    #[inline(always)]
    fn record(&mut self, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TasMode {
    /// One test-and-set on the target, successful or not.
    Once,
    /// Spin with pauses until the target's flag is acquired.
    UntilAcquired,
}

/// Timed regions that touch no memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    LoadFence,
    StoreFence,
    FullFence,
    Pause,
    Nop,
    Empty,
}

#[inline(always)]
fn fence_after_load(fence: LoadFence) {
    match fence {
        LoadFence::None => {}
        LoadFence::Load => load_fence(),
        LoadFence::Full => full_fence(),
    }
}

#[inline(always)]
fn fence_after_store(fence: StoreFence, buffer: &LineBuffer, index: usize, value: u32) {
    match fence {
        StoreFence::None => {}
        StoreFence::Store => store_fence(),
        StoreFence::Full => full_fence(),
        StoreFence::DoubleWrite => buffer
            .line((index + 1) % buffer.len())
            .head()
            .store(value, Ordering::Relaxed),
    }
}

#[inline(always)]
fn cas_word(line: &CacheLine, rep: usize) -> bool {
    let expected = (rep & 1) as u32;
    line.head()
        .compare_exchange(expected, expected ^ 1, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

#[inline(always)]
fn tas_word(line: &CacheLine) -> bool {
    line.head().swap(TAS_SET, Ordering::SeqCst) & TAS_SET != TAS_SET
}

/// Re-prime `line` for round `rep` of a seeded run: store the value the round's CAS expects,
/// move the line into the primer's cache with a CAS, reopen the race and stamp the round start.
pub fn prime_round(line: &CacheLine, race: &RaceState, rep: usize) {
    line.head().store((rep & 1) as u32, Ordering::Relaxed);
    full_fence();
    cas_word(line, rep);
    race.reset_round(rep);
    full_fence();
    race.mark_round_start(rep, read_cycles());
}

/// One thread's handle on the primitives: the shared buffer and race state, its own stride
/// walk, samples and counters.
pub struct AtomicOps<'a> {
    buffer: &'a LineBuffer,
    race: &'a RaceState,
    rank: usize,
    fence: FenceLevel,
    walker: StrideWalker,
    samples: SampleStore,
    counters: OpCounters,
    backoff: Option<Backoff>,
    // index of the line under test
    base: usize,
    checksum: u64,
}

impl<'a> AtomicOps<'a> {
    pub fn new(
        buffer: &'a LineBuffer,
        race: &'a RaceState,
        config: &BenchConfig,
        rank: usize,
        seed: u64,
    ) -> Self {
        Self {
            buffer,
            race,
            rank,
            fence: config.fence,
            walker: StrideWalker::new(config.stride, seed),
            samples: SampleStore::new(config.repetitions),
            counters: OpCounters::default(),
            backoff: config.backoff.cap_for(rank).map(Backoff::new),
            base: 0,
            checksum: 0,
        }
    }

    #[inline(always)]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline(always)]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The line under test.
    #[inline(always)]
    pub fn target(&self) -> &'a CacheLine {
        self.buffer.line(self.base)
    }

    /// Move the line under test `lines` forward.
    #[inline(always)]
    pub fn advance(&mut self, lines: usize) {
        self.base += lines;
    }

    #[inline(always)]
    pub fn counters(&self) -> OpCounters {
        self.counters
    }

    #[inline(always)]
    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    pub fn calibrate(&mut self) -> u64 {
        self.samples.calibrate()
    }

    /// Running sum of values read by the primitives, kept so the reads stay observable.
    #[inline(always)]
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    pub fn into_parts(self) -> (SampleStore, OpCounters, u64) {
        (self.samples, self.counters, self.checksum)
    }

    // terminal bookkeeping of a contending primitive
    #[inline(always)]
    fn complete(&mut self, rep: usize, success: bool) {
        self.counters.record(success);
        self.race.try_claim(rep, self.rank);
    }

    /// Timed, walked load of the target.
    pub fn load(&mut self, rep: usize) -> u32 {
        let (buffer, base, fence) = (self.buffer, self.base, self.fence.load);
        let samples = &mut self.samples;
        let value = self.walker.walk(|offset| {
            let line = buffer.line(base + offset);
            let start = read_cycles();
            let value = line.head().load(Ordering::Relaxed);
            fence_after_load(fence);
            samples.record(Slot::Primary, rep, start);
            value
        });
        full_fence();
        self.complete(rep, true);
        self.checksum += value as u64;
        value
    }

    /// Walked load that only pulls the line into this core's cache.
    pub fn load_untimed(&mut self) -> u32 {
        let (buffer, base) = (self.buffer, self.base);
        let value = self
            .walker
            .walk(|offset| buffer.line(base + offset).head().load(Ordering::Relaxed));
        fence_after_load(self.fence.load);
        self.checksum += value as u64;
        value
    }

    /// Timed load of the target without a walk.
    pub fn load_target(&mut self, rep: usize) -> u32 {
        let line = self.target();
        let start = read_cycles();
        let value = line.head().load(Ordering::Relaxed);
        fence_after_load(self.fence.load);
        self.samples.record(Slot::Primary, rep, start);
        full_fence();
        self.complete(rep, true);
        self.checksum += value as u64;
        value
    }

    /// Timed, walked store of the repetition counter, sampled into `slot`.
    pub fn store(&mut self, rep: usize, slot: Slot) {
        let (buffer, base, fence) = (self.buffer, self.base, self.fence.store);
        let value = rep as u32;
        let samples = &mut self.samples;
        self.walker.walk(|offset| {
            let index = base + offset;
            let start = read_cycles();
            buffer.line(index).head().store(value, Ordering::Relaxed);
            fence_after_store(fence, buffer, index, value);
            samples.record(slot, rep, start);
        });
        self.complete(rep, true);
    }

    /// Timed store to the target without a walk.
    pub fn store_target(&mut self, rep: usize) {
        let value = rep as u32;
        let start = read_cycles();
        self.target().head().store(value, Ordering::Relaxed);
        fence_after_store(self.fence.store, self.buffer, self.base, value);
        self.samples.record(Slot::Primary, rep, start);
        self.complete(rep, true);
    }

    pub fn store_untimed(&mut self, rep: usize) {
        let value = rep as u32;
        self.target().head().store(value, Ordering::Relaxed);
        fence_after_store(self.fence.store, self.buffer, self.base, value);
    }

    /// Timed, walked compare-and-swap from `rep & 1` to its complement.
    pub fn cas(&mut self, rep: usize) -> bool {
        let (buffer, base) = (self.buffer, self.base);
        let samples = &mut self.samples;
        let success = self.walker.walk(|offset| {
            let line = buffer.line(base + offset);
            let start = read_cycles();
            let success = cas_word(line, rep);
            samples.record(Slot::Primary, rep, start);
            success
        });
        self.complete(rep, success);
        success
    }

    pub fn cas_target(&mut self, rep: usize) -> bool {
        let line = self.target();
        let start = read_cycles();
        let success = cas_word(line, rep);
        self.samples.record(Slot::Primary, rep, start);
        self.complete(rep, success);
        success
    }

    /// Timed, walked fetch-and-increment. Returns the prior value.
    pub fn fai(&mut self, rep: usize) -> u32 {
        let (buffer, base) = (self.buffer, self.base);
        let samples = &mut self.samples;
        let prior = self.walker.walk(|offset| {
            let line = buffer.line(base + offset);
            let start = read_cycles();
            let prior = line.head().fetch_add(1, Ordering::SeqCst);
            samples.record(Slot::Primary, rep, start);
            prior
        });
        self.complete(rep, true);
        self.checksum += prior as u64;
        prior
    }

    /// Timed, walked test-and-set of the flag byte. Success means the flag was clear.
    pub fn tas(&mut self, rep: usize, mode: TasMode) -> bool {
        let (buffer, base) = (self.buffer, self.base);
        let samples = &mut self.samples;
        let success = self.walker.walk(|offset| {
            let line = buffer.line(base + offset);
            let start = read_cycles();
            let mut acquired = tas_word(line);
            if offset == 0 && mode == TasMode::UntilAcquired {
                while !acquired {
                    pause();
                    acquired = tas_word(line);
                }
            }
            samples.record(Slot::Primary, rep, start);
            acquired
        });
        self.complete(rep, success);
        success
    }

    /// Clear the target's flag after a test-and-set so the next round can acquire it.
    pub fn release_tas(&self) {
        full_fence();
        self.target().head().store(0, Ordering::Relaxed);
    }

    /// Timed, walked swap of the target with this thread's rank. Returns the prior value.
    pub fn swap(&mut self, rep: usize) -> u32 {
        let (buffer, base, rank) = (self.buffer, self.base, self.rank as u32);
        let samples = &mut self.samples;
        let prior = self.walker.walk(|offset| {
            let line = buffer.line(base + offset);
            let start = read_cycles();
            let prior = line.head().swap(rank, Ordering::SeqCst);
            samples.record(Slot::Primary, rep, start);
            prior
        });
        full_fence();
        self.complete(rep, true);
        self.checksum += prior as u64;
        prior
    }

    /// Timed flush of the target out of every cache.
    pub fn invalidate(&mut self, rep: usize) {
        let line = self.target();
        let start = read_cycles();
        line.flush();
        self.samples.record(Slot::Primary, rep, start);
        full_fence();
        self.complete(rep, true);
    }

    /// Overwrite the target word, followed by a full fence.
    pub fn set_head(&self, value: u32) {
        self.target().head().store(value, Ordering::Relaxed);
        full_fence();
    }

    /// Compare-and-swap the (unwalked) target until it lands, backing off between failures when
    /// configured. The whole retry loop is one sample. Returns the number of attempts.
    pub fn cas_until_success(&mut self, rep: usize) -> u64 {
        let line = self.target();
        if let Some(backoff) = self.backoff.as_mut() {
            backoff.reset();
        }

        let start = read_cycles();
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            let current = line.head().load(Ordering::Relaxed);
            if line
                .head()
                .compare_exchange(
                    current,
                    current.wrapping_add(1),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
            if let Some(backoff) = self.backoff.as_mut() {
                backoff.snooze();
            }
        }
        self.samples.record(Slot::Primary, rep, start);

        self.counters.attempts += attempts;
        self.counters.failures += attempts - 1;
        self.counters.successes += 1;
        self.race.try_claim(rep, self.rank);
        attempts
    }

    /// Follow the pointer-chase ring once around the whole buffer, starting at the target. The
    /// sample is the mean cycles per hop.
    pub fn chase(&mut self, rep: usize) -> usize {
        let hops = self.buffer.len();
        let fence = self.fence.load;
        let mut index = self.base;
        let start = read_cycles();
        for _ in 0..hops {
            index = self.buffer.next_in_ring(index);
            fence_after_load(fence);
        }
        let elapsed = read_cycles()
            .wrapping_sub(start)
            .saturating_sub(self.samples.correction());
        self.samples
            .record_value(Slot::Primary, rep, elapsed / hops.max(1) as u64);
        self.complete(rep, true);
        self.checksum += index as u64;
        index
    }

    /// Time a region holding only `probe`.
    pub fn probe(&mut self, rep: usize, probe: Probe) {
        let start = read_cycles();
        match probe {
            Probe::LoadFence => load_fence(),
            Probe::StoreFence => store_fence(),
            Probe::FullFence => full_fence(),
            Probe::Pause => pause(),
            Probe::Nop => nop(),
            Probe::Empty => {}
        }
        self.samples.record(Slot::Primary, rep, start);
    }
}
