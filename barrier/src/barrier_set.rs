use std::fmt;
use std::sync::{Arc, Barrier};

use crossbeam_utils::CachePadded;
use log::trace;
use utils::cycles::full_fence;

use crate::{BarrierError, BarrierResult};

/// Decides whether a thread id takes part in a barrier.
pub type Participation = Arc<dyn Fn(usize) -> bool + Send + Sync>;

/// Participation predicate that admits every thread.
pub fn everyone() -> Participation {
    Arc::new(|_| true)
}

struct Slot {
    barrier: Barrier,
    participants: usize,
    predicate: Participation,
}

impl Slot {
    fn new(participants: usize, predicate: Participation) -> Self {
        Self {
            barrier: Barrier::new(participants),
            participants,
            predicate,
        }
    }
}

/// A fixed bank of reusable barriers.
///
/// Every slot is created for the full thread count. Slots that serve a subset of the threads
/// are resized with [`BarrierSet::reconfigure`] while the bank is still exclusively owned, i.e.
/// before any worker can reach them. After that the bank is shared read-only and only
/// [`BarrierSet::wait`] is called.
///
/// A slot's participant count has to equal the number of threads that reach it in one phase.
/// Too few arrivals block forever; there is no timeout.
pub struct BarrierSet {
    slots: Vec<CachePadded<Slot>>,
}

impl BarrierSet {
    pub const DEFAULT_SLOTS: usize = 16;

    /// The default bank, every slot sized for `threads` participants.
    pub fn initialize(threads: usize) -> Self {
        Self::with_slots(Self::DEFAULT_SLOTS, threads)
    }

    pub fn with_slots(slots: usize, threads: usize) -> Self {
        let threads = threads.max(1);
        Self {
            slots: (0..slots)
                .map(|_| CachePadded::new(Slot::new(threads, everyone())))
                .collect(),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, id: usize) -> BarrierResult<&mut Slot> {
        let slots = self.slots.len();
        self.slots
            .get_mut(id)
            .map(|slot| &mut **slot)
            .ok_or(BarrierError::OutOfRange { id, slots })
    }

    /// Replace the participation predicate of barrier `id`. Takes effect for `wait` right away
    /// and for sizing on the next [`BarrierSet::reconfigure`] with a zero count.
    pub fn set_predicate(&mut self, id: usize, predicate: Participation) -> BarrierResult<()> {
        self.slot_mut(id)?.predicate = predicate;
        Ok(())
    }

    /// Recreate barrier `id` for `participants` threads. A zero count sizes the barrier by
    /// asking the predicate about every thread id in `0..total_threads`; the result is never
    /// below one. Returns the new participant count.
    pub fn reconfigure(
        &mut self,
        id: usize,
        participants: usize,
        total_threads: usize,
    ) -> BarrierResult<usize> {
        let slot = self.slot_mut(id)?;
        let participants = match participants {
            0 => (0..total_threads)
                .filter(|&thread| (slot.predicate)(thread))
                .count()
                .max(1),
            n => n,
        };
        *slot = Slot::new(participants, slot.predicate.clone());
        trace!("barrier {id} now waits for {participants} threads");
        Ok(participants)
    }

    /// Configured participant count of barrier `id`.
    pub fn participants(&self, id: usize) -> Option<usize> {
        self.slots.get(id).map(|slot| slot.participants)
    }

    pub fn participates(&self, id: usize, thread_id: usize) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| (slot.predicate)(thread_id))
    }

    /// Block on barrier `id` until all its participants arrive. Threads the predicate rejects
    /// return at once without blocking anybody. Returns whether the caller took part.
    ///
    /// A full fence precedes the wait so that every memory operation issued before the phase
    /// boundary is globally visible once the barrier opens.
    ///
    /// Panics if `id` lies outside the bank.
    #[inline]
    pub fn wait(&self, id: usize, thread_id: usize) -> bool {
        full_fence();
        let slot = &self.slots[id];
        if !(slot.predicate)(thread_id) {
            return false;
        }
        slot.barrier.wait();
        true
    }

    /// Release every barrier.
    pub fn teardown(self) {
        drop(self);
    }
}

impl fmt::Debug for BarrierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BarrierSet")
            .field(
                "participants",
                &self.slots.iter().map(|slot| slot.participants).collect::<Vec<_>>(),
            )
            .finish()
    }
}
