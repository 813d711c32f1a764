use bench_config::RankInfo;
use itertools::Itertools;

use crate::{Distribution, LatencyStats, OpCounters, RaceSummary, SampleStore, Slot};

/// Reduced samples of one slot of one thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotReport {
    pub slot: Slot,
    pub count: usize,
    pub stats: Option<Distribution>,
    /// The first samples in repetition order, kept for verbose output.
    pub first: Vec<u64>,
}

/// What one worker measured.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadReport {
    pub info: RankInfo,
    /// Core the thread found itself on after pinning, when the platform can tell.
    pub observed_core: Option<usize>,
    pub correction: u64,
    pub slots: [SlotReport; 2],
    pub counters: OpCounters,
    pub checksum: u64,
}

impl ThreadReport {
    pub fn reduce(
        info: RankInfo,
        observed_core: Option<usize>,
        samples: &SampleStore,
        counters: OpCounters,
        checksum: u64,
        keep_first: usize,
    ) -> Self {
        Self {
            info,
            observed_core,
            correction: samples.correction(),
            slots: Slot::ALL.map(|slot| SlotReport {
                slot,
                count: samples.count(slot),
                stats: samples.distribution(slot),
                first: samples.first(slot, keep_first),
            }),
            counters,
            checksum,
        }
    }

    #[inline(always)]
    pub fn slot(&self, slot: Slot) -> &SlotReport {
        &self.slots[slot.index()]
    }

    /// Statistics of the primary slot, if the thread timed anything.
    #[inline(always)]
    pub fn primary(&self) -> Option<&Distribution> {
        self.slot(Slot::Primary).stats.as_ref()
    }
}

/// Spread of the per-thread mean latencies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossCoreSummary {
    pub mean_avg: f64,
    pub min_avg: f64,
    pub min_core: usize,
    pub max_avg: f64,
    pub max_core: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub threads: Vec<ThreadReport>,
    pub race: RaceSummary,
    pub repetitions: usize,
    /// Whether every round was primed from the seed core.
    pub seeded: bool,
    pub buffer_bytes: usize,
    pub buffer_locked: bool,
    /// Word 0 of the first line after the run.
    pub final_word: u32,
}

impl RunReport {
    #[inline(always)]
    pub fn wins(&self, rank: usize) -> u64 {
        self.race.wins.get(rank).copied().unwrap_or(0)
    }

    #[inline(always)]
    pub fn latency(&self, rank: usize) -> Option<&LatencyStats> {
        self.race.latency.get(rank).and_then(Option::as_ref)
    }

    /// Sum of every thread's checksum, printed so the reads cannot be optimized away.
    pub fn checksum(&self) -> u64 {
        self.threads
            .iter()
            .fold(0u64, |sum, thread| sum.wrapping_add(thread.checksum))
    }

    /// Mean, smallest and largest of the primary averages over the threads that timed
    /// something.
    pub fn cross_core(&self) -> Option<CrossCoreSummary> {
        let averages = self
            .threads
            .iter()
            .filter_map(|thread| thread.primary().map(|stats| (thread.info.core, stats.avg)))
            .collect_vec();
        if averages.is_empty() {
            return None;
        }

        let mean_avg = averages.iter().map(|&(_, avg)| avg).sum::<f64>() / averages.len() as f64;
        let (min_core, min_avg) = averages
            .iter()
            .copied()
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let (max_core, max_avg) = averages
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        Some(CrossCoreSummary {
            mean_avg,
            min_avg,
            min_core,
            max_avg,
            max_core,
        })
    }
}
