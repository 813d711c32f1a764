//! Per-thread cycle samples and their reduction into summary statistics.

use log::{debug, warn};
use utils::cycles::read_cycles;

/// Timing slot of a sample. Most scenarios only use the primary slot; the owned-line stores
/// time their second store separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary = 0,
    Secondary = 1,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Primary, Slot::Secondary];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

const SLOTS: usize = Slot::ALL.len();

// marks a repetition that has no sample in a slot
const UNRECORDED: u64 = u64::MAX;

const CALIBRATION_SAMPLES: usize = 1024;
const CALIBRATION_ATTEMPTS: usize = 5;
const CALIBRATION_MAX_DEVIATION: f64 = 0.08;

/// Raw cycle counts of one thread, indexed by slot and repetition. Owned by the producing
/// thread for the whole run.
#[derive(Debug, Clone)]
pub struct SampleStore {
    samples: [Vec<u64>; SLOTS],
    recorded: [usize; SLOTS],
    correction: u64,
}

impl SampleStore {
    pub fn new(repetitions: usize) -> Self {
        Self {
            samples: std::array::from_fn(|_| vec![UNRECORDED; repetitions]),
            recorded: [0; SLOTS],
            correction: 0,
        }
    }

    /// Measure the cost of an empty timed region and subtract it from every later sample.
    /// Retries while the measurement is noisy; returns the correction in cycles.
    pub fn calibrate(&mut self) -> u64 {
        let mut estimate = None;
        for attempt in 1..=CALIBRATION_ATTEMPTS {
            let overhead = (0..CALIBRATION_SAMPLES).map(|_| {
                let start = read_cycles();
                read_cycles().wrapping_sub(start)
            });
            let Some(stats) = Distribution::from_samples(overhead) else {
                break;
            };
            let noisy = stats.std_dev > CALIBRATION_MAX_DEVIATION * stats.avg;
            estimate = Some(stats.avg.round() as u64);
            if !noisy {
                break;
            }
            if attempt == CALIBRATION_ATTEMPTS {
                warn!(
                    "timer correction stays noisy (avg {:.1}, std dev {:.1}), using it anyway",
                    stats.avg, stats.std_dev
                );
            } else {
                debug!("timer correction attempt {attempt} too noisy, retrying");
            }
        }
        self.correction = estimate.unwrap_or(0);
        self.correction
    }

    #[inline(always)]
    pub fn correction(&self) -> u64 {
        self.correction
    }

    /// Close a timed region opened at `start`. A later sample for the same repetition replaces
    /// the earlier one.
    #[inline(always)]
    pub fn record(&mut self, slot: Slot, rep: usize, start: u64) {
        let elapsed = read_cycles().wrapping_sub(start);
        self.record_value(slot, rep, elapsed.saturating_sub(self.correction));
    }

    #[inline(always)]
    pub fn record_value(&mut self, slot: Slot, rep: usize, cycles: u64) {
        let cell = &mut self.samples[slot.index()][rep];
        if *cell == UNRECORDED {
            self.recorded[slot.index()] += 1;
        }
        *cell = cycles.min(UNRECORDED - 1);
    }

    /// Number of repetitions with a sample in `slot`.
    #[inline(always)]
    pub fn count(&self, slot: Slot) -> usize {
        self.recorded[slot.index()]
    }

    pub fn samples(&self, slot: Slot) -> impl Iterator<Item = u64> + '_ {
        self.samples[slot.index()]
            .iter()
            .copied()
            .filter(|&cycles| cycles != UNRECORDED)
    }

    pub fn first(&self, slot: Slot, k: usize) -> Vec<u64> {
        self.samples(slot).take(k).collect()
    }

    pub fn distribution(&self, slot: Slot) -> Option<Distribution> {
        Distribution::from_samples(self.samples(slot))
    }
}

/// Samples whose distance from the mean is within a fraction of it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Band {
    /// Upper bound of the distance as a fraction of the mean; `None` for the outliers.
    pub within: Option<f64>,
    pub count: usize,
    pub avg: f64,
}

/// Summary statistics of one slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub avg: f64,
    pub min: u64,
    pub max: u64,
    pub std_dev: f64,
    pub abs_dev: f64,
    pub bands: [Band; 5],
}

impl Distribution {
    pub const BAND_LIMITS: [f64; 4] = [0.10, 0.25, 0.50, 0.75];

    pub fn from_samples(samples: impl IntoIterator<Item = u64>) -> Option<Self> {
        let samples: Vec<u64> = samples.into_iter().collect();
        let count = samples.len();
        if count == 0 {
            return None;
        }

        let n = count as f64;
        let avg = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
        let min = samples.iter().copied().min()?;
        let max = samples.iter().copied().max()?;
        let var = samples
            .iter()
            .map(|&x| (x as f64 - avg).powi(2))
            .sum::<f64>()
            / n;
        let abs_dev = samples.iter().map(|&x| (x as f64 - avg).abs()).sum::<f64>() / n;

        let mut bands: [Band; 5] = std::array::from_fn(|i| Band {
            within: Self::BAND_LIMITS.get(i).copied(),
            ..Band::default()
        });
        let mut sums = [0f64; 5];
        for &x in &samples {
            let distance = (x as f64 - avg).abs();
            let band = Self::BAND_LIMITS
                .iter()
                .position(|&limit| distance <= limit * avg)
                .unwrap_or(Self::BAND_LIMITS.len());
            bands[band].count += 1;
            sums[band] += x as f64;
        }
        for (band, sum) in bands.iter_mut().zip(sums) {
            if band.count > 0 {
                band.avg = sum / band.count as f64;
            }
        }

        Some(Self {
            count,
            avg,
            min,
            max,
            std_dev: var.sqrt(),
            abs_dev,
            bands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_of_known_samples() {
        let stats = Distribution::from_samples([10, 20, 30, 40]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.avg, 25.0);
        assert_eq!((stats.min, stats.max), (10, 40));
        assert!((stats.std_dev - 125f64.sqrt()).abs() < 1e-9);
        assert_eq!(stats.abs_dev, 10.0);

        // 20 and 30 are 20% away from 25, 10 and 40 are 60% away
        let counts: Vec<_> = stats.bands.iter().map(|band| band.count).collect();
        assert_eq!(counts, vec![0, 2, 0, 2, 0]);
        assert_eq!(stats.bands[1].avg, 25.0);
        assert_eq!(stats.bands[4].within, None);

        assert!(Distribution::from_samples(std::iter::empty()).is_none());
    }

    #[test]
    fn test_store_counts_repetitions_once() {
        let mut store = SampleStore::new(4);
        store.record_value(Slot::Primary, 0, 7);
        store.record_value(Slot::Primary, 0, 9);
        store.record_value(Slot::Primary, 3, 11);

        assert_eq!(store.count(Slot::Primary), 2);
        assert_eq!(store.count(Slot::Secondary), 0);
        assert_eq!(store.samples(Slot::Primary).collect::<Vec<_>>(), vec![9, 11]);
        assert_eq!(store.first(Slot::Primary, 1), vec![9]);
        assert!(store.distribution(Slot::Secondary).is_none());
    }

    #[test]
    fn test_correction_is_subtracted() {
        let mut store = SampleStore::new(1);
        let correction = store.calibrate();
        assert_eq!(store.correction(), correction);

        // shorter than the correction, must saturate instead of wrapping
        store.record(Slot::Primary, 0, read_cycles());
        assert_eq!(store.count(Slot::Primary), 1);
    }
}
