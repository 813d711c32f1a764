//! Thread and memory placement. Every helper here is best effort: a failure is logged and the
//! caller carries on with the operating system's default placement.

use core_affinity::CoreId;
use log::{debug, warn};

/// Pin the calling thread to a logical core. Returns whether the pin took effect.
pub fn pin_to_core(core: usize) -> bool {
    let allowed = core_affinity::get_core_ids()
        .map(|ids| ids.iter().any(|id| id.id == core))
        .unwrap_or(false);
    if !allowed {
        warn!("core {core} is not available to this process, running unpinned");
        return false;
    }
    let pinned = core_affinity::set_for_current(CoreId { id: core });
    if !pinned {
        warn!("could not pin thread to core {core}, running unpinned");
    }
    pinned
}

/// Number of logical cores the process may run on.
pub fn available_cores() -> usize {
    core_affinity::get_core_ids()
        .map(|ids| ids.len())
        .unwrap_or(1)
}

/// NUMA node that owns a logical core, as exported by sysfs.
pub fn numa_node_of(core: usize) -> Option<usize> {
    #[cfg(target_os = "linux")]
    {
        let dir = std::fs::read_dir(format!("/sys/devices/system/cpu/cpu{core}")).ok()?;
        dir.filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("node"))
                    .and_then(|id| id.parse::<usize>().ok())
            })
            .next()
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = core;
        None
    }
}

/// Pages pinned in RAM with `mlock`; unlocked again on drop.
#[derive(Debug)]
pub struct PageLock {
    addr: usize,
    len: usize,
}

impl PageLock {
    /// Lock the pages backing `region`. The caller keeps `region` alive for as long as the
    /// returned guard exists.
    pub fn lock<T>(region: &[T]) -> Option<Self> {
        let len = std::mem::size_of_val(region);
        if len == 0 {
            return None;
        }
        let addr = region.as_ptr() as usize;

        #[cfg(unix)]
        {
            let rc = unsafe { libc::mlock(addr as *const libc::c_void, len) };
            if rc != 0 {
                warn!(
                    "mlock of {len} bytes failed: {}, pages stay swappable",
                    std::io::Error::last_os_error()
                );
                return None;
            }
            debug!("locked {len} bytes at {addr:#x}");
            Some(Self { addr, len })
        }

        #[cfg(not(unix))]
        {
            warn!("page locking is not supported on this platform");
            let _ = addr;
            None
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munlock(self.addr as *const libc::c_void, self.len);
        }
    }
}
