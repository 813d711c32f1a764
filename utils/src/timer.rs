//! Nested phase timer for the harness's own setup and teardown (allocation, spawning,
//! reduction). Compiled in with the `profile` feature; a zero-sized no-op otherwise.
//!
//! Output goes to stderr so it never interleaves with the measurement report on stdout.

#[cfg(feature = "profile")]
use colored::Colorize;
#[cfg(feature = "profile")]
use core::sync::atomic::AtomicUsize;
#[cfg(feature = "profile")]
use core::sync::atomic::Ordering;
#[cfg(feature = "profile")]
use std::time::Instant;

#[cfg(feature = "profile")]
use crate::cycles::read_cycles;

#[cfg(feature = "profile")]
pub static PHASE_DEPTH: AtomicUsize = AtomicUsize::new(0);

#[cfg(feature = "profile")]
pub struct Timer {
    label: String,
    wall: Instant,
    cycles: u64,
    active: bool,
}

#[cfg(feature = "profile")]
impl Timer {
    /// Open a phase. Inactive timers (e.g. on worker threads) stay silent.
    #[inline(always)]
    pub fn new(label: &str, active: bool) -> Self {
        if active {
            let depth = PHASE_DEPTH.fetch_add(1, Ordering::Relaxed) + 1;
            eprintln!(
                "{:indent$}> {}",
                "",
                label.yellow().bold(),
                indent = 2 * depth
            );
        }
        Self {
            label: label.to_string(),
            wall: Instant::now(),
            cycles: read_cycles(),
            active,
        }
    }

    /// Close the phase, printing its wall time and the cycles it spanned.
    #[inline(always)]
    pub fn stop(&self) {
        if self.active {
            let elapsed = self.wall.elapsed();
            let cycles = read_cycles().wrapping_sub(self.cycles);
            let depth = PHASE_DEPTH.load(Ordering::Relaxed);
            eprintln!(
                "{:indent$}< {} {:?} ({} cycles)",
                "",
                self.label.blue().bold(),
                elapsed,
                cycles,
                indent = 2 * depth
            );
            PHASE_DEPTH.fetch_sub(1, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    pub fn note(&self, msg: &str) {
        if self.active {
            let depth = PHASE_DEPTH.load(Ordering::Relaxed) + 1;
            eprintln!("{:indent$}- {}", "", msg.green(), indent = 2 * depth);
        }
    }
}

#[cfg(not(feature = "profile"))]
pub struct Timer {}

#[cfg(not(feature = "profile"))]
impl Timer {
    #[inline(always)]
    pub fn new(_label: &str, _active: bool) -> Self {
        Self {}
    }

    #[inline(always)]
    pub fn stop(&self) {}

    #[inline(always)]
    pub fn note(&self, _msg: &str) {}
}
