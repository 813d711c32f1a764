//! Cycle counter and the ordering instructions that the benchmark scripts interleave with their
//! memory operations.
//!
//! On x86_64 every helper lowers to the single instruction it is named after. Other targets get
//! the closest portable equivalent so the harness still runs, but the numbers are only comparable
//! within one architecture.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{_mm_clflush, _mm_lfence, _mm_mfence, _mm_sfence, _rdtsc};
#[cfg(not(target_arch = "x86_64"))]
use core::sync::atomic::{fence, Ordering};

/// Read the free-running cycle counter.
///
/// The read is not serialized. Fence placement around a timed region belongs to each scenario.
#[inline(always)]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { _rdtsc() }
    }

    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        unsafe {
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val);
        }
        val
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        portable::read_cycles()
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod portable {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    // nanoseconds since a process-wide epoch, comparable across threads
    #[inline(always)]
    pub(super) fn read_cycles() -> u64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

#[inline(always)]
pub fn load_fence() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _mm_lfence()
    }
    #[cfg(not(target_arch = "x86_64"))]
    fence(Ordering::Acquire);
}

#[inline(always)]
pub fn store_fence() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _mm_sfence()
    }
    #[cfg(not(target_arch = "x86_64"))]
    fence(Ordering::Release);
}

#[inline(always)]
pub fn full_fence() {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        _mm_mfence()
    }
    #[cfg(not(target_arch = "x86_64"))]
    fence(Ordering::SeqCst);
}

/// Spin-loop relaxation hint (`pause` on x86).
#[inline(always)]
pub fn pause() {
    core::hint::spin_loop();
}

#[inline(always)]
pub fn nop() {
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    unsafe {
        core::arch::asm!("nop", options(nomem, nostack, preserves_flags));
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}

/// Write back and invalidate the cache line holding `value` in every cache of the coherence
/// domain.
#[inline(always)]
pub fn flush_line<T>(value: &T) {
    let ptr = value as *const T as *const u8;

    #[cfg(target_arch = "x86_64")]
    unsafe {
        _mm_clflush(ptr)
    }

    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("dc civac, {}", in(reg) ptr, options(nostack, preserves_flags));
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = ptr;
        fence(Ordering::SeqCst);
    }
}

/// Logical cpu the calling thread is currently running on, when the platform can tell.
pub fn current_cpu() -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        let cpu = unsafe { libc::sched_getcpu() };
        usize::try_from(cpu).ok()
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
