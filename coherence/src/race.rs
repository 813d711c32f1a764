//! Cross-thread bookkeeping: who won each repetition, and how long every contender took from the
//! common start of a round.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use itertools::Itertools;

/// Sentinel of a cell nobody has claimed.
pub const UNCLAIMED: u32 = u32::MAX;

/// A cell that exactly one thread can claim until it is reset.
#[derive(Debug)]
pub struct ClaimCell(AtomicU32);

impl Default for ClaimCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimCell {
    pub const fn new() -> Self {
        Self(AtomicU32::new(UNCLAIMED))
    }

    /// Single attempt to move the cell from unclaimed to `id`.
    #[inline(always)]
    pub fn try_claim(&self, id: u32) -> bool {
        self.0
            .compare_exchange(UNCLAIMED, id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline(always)]
    pub fn reset(&self) {
        self.0.store(UNCLAIMED, Ordering::Release);
    }

    #[inline(always)]
    pub fn winner(&self) -> Option<u32> {
        match self.0.load(Ordering::Acquire) {
            UNCLAIMED => None,
            id => Some(id),
        }
    }
}

/// A counter that only goes up, padded to its own cache line so that neighbouring threads'
/// counters do not share it.
#[derive(Debug, Default)]
pub struct MonotonicCounter(CachePadded<AtomicU64>);

impl MonotonicCounter {
    /// Returns the new value.
    #[inline(always)]
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Race state shared by all workers of a run.
///
/// The only writes are a single claim per repetition, increments of the claiming thread's own
/// counter, the round-start stamp written by whoever primes a round, and completion latencies
/// that each thread writes into its own row.
#[derive(Debug)]
pub struct RaceState {
    threads: usize,
    repetitions: usize,
    winners: Vec<ClaimCell>,
    wins: Vec<MonotonicCounter>,
    // 0 means no round start was recorded
    round_start: Vec<AtomicU64>,
    // thread-major, 0 means no latency recorded
    latency: Vec<AtomicU64>,
}

impl RaceState {
    pub fn new(threads: usize, repetitions: usize) -> Self {
        Self {
            threads,
            repetitions,
            winners: (0..repetitions).map(|_| ClaimCell::new()).collect(),
            wins: (0..threads).map(|_| MonotonicCounter::default()).collect(),
            round_start: (0..repetitions).map(|_| AtomicU64::new(0)).collect(),
            latency: (0..threads * repetitions)
                .map(|_| AtomicU64::new(0))
                .collect(),
        }
    }

    #[inline(always)]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[inline(always)]
    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// One claim attempt for `thread` in repetition `rep`; the winner's counter goes up.
    #[inline(always)]
    pub fn try_claim(&self, rep: usize, thread: usize) -> bool {
        let won = self.winners[rep].try_claim(thread as u32);
        if won {
            self.wins[thread].increment();
        }
        won
    }

    #[inline(always)]
    pub fn reset_round(&self, rep: usize) {
        self.winners[rep].reset();
    }

    #[inline(always)]
    pub fn winner(&self, rep: usize) -> Option<usize> {
        self.winners[rep].winner().map(|id| id as usize)
    }

    #[inline(always)]
    pub fn wins(&self, thread: usize) -> u64 {
        self.wins[thread].get()
    }

    #[inline(always)]
    pub fn mark_round_start(&self, rep: usize, timestamp: u64) {
        self.round_start[rep].store(timestamp.max(1), Ordering::Release);
    }

    #[inline(always)]
    pub fn round_start(&self, rep: usize) -> Option<u64> {
        match self.round_start[rep].load(Ordering::Acquire) {
            0 => None,
            start => Some(start),
        }
    }

    /// Record how long `thread` took from the start of round `rep` to `now`. Only the first
    /// write per thread and repetition counts; later ones and rounds without a start stamp are
    /// ignored. Returns whether the value was stored.
    #[inline(always)]
    pub fn record_completion(&self, thread: usize, rep: usize, now: u64) -> bool {
        let Some(start) = self.round_start(rep) else {
            return false;
        };
        // zero is the "unset" marker, a same-tick completion still counts as one cycle
        let latency = now.saturating_sub(start).max(1);
        self.latency[thread * self.repetitions + rep]
            .compare_exchange(0, latency, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    #[inline(always)]
    pub fn latency(&self, thread: usize, rep: usize) -> Option<u64> {
        match self.latency[thread * self.repetitions + rep].load(Ordering::Relaxed) {
            0 => None,
            latency => Some(latency),
        }
    }

    /// Reduce the race bookkeeping once every worker has finished.
    pub fn summarize(&self) -> RaceSummary {
        let winners = (0..self.repetitions).map(|rep| self.winner(rep)).collect_vec();
        let wins = (0..self.threads).map(|thread| self.wins(thread)).collect_vec();

        let latency = (0..self.threads)
            .map(|thread| {
                LatencyStats::from_samples(
                    (0..self.repetitions).filter_map(|rep| self.latency(thread, rep)),
                )
            })
            .collect_vec();

        let winner_fastest = winners
            .iter()
            .enumerate()
            .map(|(rep, winner)| {
                let winner = (*winner)?;
                let fastest = (0..self.threads)
                    .filter_map(|thread| self.latency(thread, rep))
                    .min()?;
                Some(self.latency(winner, rep) == Some(fastest))
            })
            .collect_vec();

        RaceSummary {
            unclaimed_rounds: winners.iter().filter(|winner| winner.is_none()).count(),
            winners,
            wins,
            latency,
            timed_rounds: winner_fastest.iter().flatten().count(),
            winner_was_fastest: winner_fastest
                .iter()
                .filter(|&&fastest| fastest == Some(true))
                .count(),
            winner_fastest,
        }
    }
}

/// Common-start latency of one thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

impl LatencyStats {
    pub fn from_samples(samples: impl Iterator<Item = u64>) -> Option<Self> {
        let (samples, sum, min, max) = samples.fold(
            (0usize, 0u128, u64::MAX, 0u64),
            |(n, sum, min, max), x| (n + 1, sum + x as u128, min.min(x), max.max(x)),
        );
        (samples > 0).then(|| Self {
            samples,
            mean: sum as f64 / samples as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceSummary {
    /// Winning thread of every repetition.
    pub winners: Vec<Option<usize>>,
    /// Lifetime wins per thread.
    pub wins: Vec<u64>,
    /// Common-start latency per thread; `None` when the thread recorded none.
    pub latency: Vec<Option<LatencyStats>>,
    /// Repetitions nobody claimed.
    pub unclaimed_rounds: usize,
    /// Claimed repetitions with at least one recorded latency.
    pub timed_rounds: usize,
    /// Of those, the repetitions whose winner also had the smallest latency.
    pub winner_was_fastest: usize,
    /// Per repetition, whether the winner had the smallest latency; `None` when unclaimed or untimed.
    pub winner_fastest: Vec<Option<bool>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_cell() {
        let cell = ClaimCell::new();
        assert_eq!(cell.winner(), None);
        assert!(cell.try_claim(3));
        assert!(!cell.try_claim(1));
        assert_eq!(cell.winner(), Some(3));
        cell.reset();
        assert!(cell.try_claim(1));
    }

    #[test]
    fn test_latency_requires_round_start() {
        let race = RaceState::new(2, 4);
        assert!(!race.record_completion(0, 0, 100));
        assert_eq!(race.latency(0, 0), None);

        race.mark_round_start(1, 1000);
        assert!(race.record_completion(1, 1, 1000));
        assert_eq!(race.latency(1, 1), Some(1));
    }

    #[test]
    fn test_latency_first_write_wins() {
        let race = RaceState::new(2, 4);
        race.mark_round_start(0, 100);
        assert!(race.record_completion(0, 0, 150));
        assert!(!race.record_completion(0, 0, 900));
        assert_eq!(race.latency(0, 0), Some(50));
        assert_eq!(race.latency(1, 0), None);
    }

    #[test]
    fn test_summary_consistency_check() {
        let race = RaceState::new(2, 3);
        for rep in 0..3 {
            race.mark_round_start(rep, 100);
        }
        // rep 0: thread 0 wins and is fastest
        assert!(race.try_claim(0, 0));
        race.record_completion(0, 0, 110);
        race.record_completion(1, 0, 130);
        // rep 1: thread 1 wins but thread 0 is faster
        assert!(race.try_claim(1, 1));
        race.record_completion(0, 1, 105);
        race.record_completion(1, 1, 120);
        // rep 2: nobody claims

        let summary = race.summarize();
        assert_eq!(summary.winners, vec![Some(0), Some(1), None]);
        assert_eq!(summary.wins, vec![1, 1]);
        assert_eq!(summary.unclaimed_rounds, 1);
        assert_eq!(summary.timed_rounds, 2);
        assert_eq!(summary.winner_was_fastest, 1);
        assert_eq!(summary.winner_fastest, vec![Some(true), Some(false), None]);

        let thread0 = summary.latency[0].unwrap();
        assert_eq!((thread0.samples, thread0.min, thread0.max), (2, 5, 10));
        assert_eq!(thread0.mean, 7.5);
    }
}
