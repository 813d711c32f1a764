use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use utils::cycles::{flush_line, full_fence};
use utils::placement::{numa_node_of, pin_to_core, PageLock};

use crate::{BenchError, BenchResult};

pub const WORDS_PER_LINE: usize = 16;

// every byte set to b'1'
const FILL_WORD: u32 = u32::from_ne_bytes([b'1'; 4]);

/// Word index holding the successor of a line in the pointer-chase ring. Word 0 stays the target
/// of the atomic primitives.
const CHASE_WORD: usize = 1;

/// One hardware cache line of 32-bit words.
#[repr(C, align(64))]
pub struct CacheLine {
    words: [AtomicU32; WORDS_PER_LINE],
}

impl CacheLine {
    fn filled() -> Self {
        Self {
            words: std::array::from_fn(|_| AtomicU32::new(FILL_WORD)),
        }
    }

    /// The word every primitive operates on.
    #[inline(always)]
    pub fn head(&self) -> &AtomicU32 {
        &self.words[0]
    }

    #[inline(always)]
    pub fn word(&self, index: usize) -> &AtomicU32 {
        &self.words[index]
    }

    #[inline(always)]
    pub fn flush(&self) {
        flush_line(self);
    }
}

/// The shared buffer of cache lines under test. Workers access it concurrently without any
/// locking.
pub struct LineBuffer {
    // declared first so the pages are unlocked before they are freed
    lock: Option<PageLock>,
    lines: Vec<CacheLine>,
}

impl LineBuffer {
    /// Allocate `lines` cache lines on the calling thread, zero word 0 of each and flush it.
    pub fn allocate(lines: usize) -> BenchResult<Self> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(lines)
            .map_err(|_| BenchError::Allocation { lines })?;
        buffer.extend((0..lines).map(|_| CacheLine::filled()));

        for line in &buffer {
            line.head().store(0, Ordering::Relaxed);
            line.flush();
        }
        full_fence();

        Ok(Self {
            lock: None,
            lines: buffer,
        })
    }

    /// Allocate from a thread pinned to `core`, so that first touch places the pages on that
    /// core's NUMA node. Falls back to the calling thread when no core is given.
    pub fn allocate_near(lines: usize, core: Option<usize>) -> BenchResult<Self> {
        let Some(core) = core else {
            return Self::allocate(lines);
        };

        let name = format!("ccbench-alloc-{core}");
        let buffer = thread::scope(|s| {
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(s, move || {
                    pin_to_core(core);
                    Self::allocate(lines)
                })
                .map_err(|source| BenchError::Spawn {
                    name: name.clone(),
                    source,
                })?;
            handle.join().map_err(|_| BenchError::Join { name: name.clone() })?
        })?;

        debug!(
            "allocated {lines} cache lines from core {core} (numa node {:?})",
            numa_node_of(core)
        );
        Ok(buffer)
    }

    /// Best effort; a refusal is logged and the buffer stays swappable.
    pub fn lock_pages(&mut self) {
        self.lock = PageLock::lock(&self.lines);
    }

    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[inline(always)]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of_val(self.lines.as_slice())
    }

    #[inline(always)]
    pub fn line(&self, index: usize) -> &CacheLine {
        &self.lines[index]
    }

    /// Link every line into one random cycle for the pointer-chase scenario.
    pub fn build_chase_ring(&self, seed: u64) {
        let mut order: Vec<u32> = (0..self.lines.len() as u32).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

        for (i, &from) in order.iter().enumerate() {
            let to = order[(i + 1) % order.len()];
            self.lines[from as usize]
                .word(CHASE_WORD)
                .store(to, Ordering::Relaxed);
        }
        full_fence();
    }

    #[inline(always)]
    pub fn next_in_ring(&self, index: usize) -> usize {
        self.lines[index].word(CHASE_WORD).load(Ordering::Relaxed) as usize
    }
}
