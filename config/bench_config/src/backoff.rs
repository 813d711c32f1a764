use crate::{ConfigError, ConfigResult};

/// Exponential backoff for the retry-until-success compare-and-swap. The pause count doubles
/// after each failed attempt until it reaches the cap of the retrying thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffConfig {
    pub enabled: bool,
    pub cap: u32,
    /// One cap per thread, in rank order. Overrides `cap` when present.
    pub per_thread: Option<Vec<u32>>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cap: Self::DEFAULT_CAP,
            per_thread: None,
        }
    }
}

impl BackoffConfig {
    pub const DEFAULT_CAP: u32 = 1024;

    pub fn with_cap(cap: u32) -> Self {
        Self {
            enabled: true,
            cap,
            per_thread: None,
        }
    }

    /// The cap that applies to `rank`, or `None` when backoff is off.
    #[inline]
    pub fn cap_for(&self, rank: usize) -> Option<u32> {
        if !self.enabled {
            return None;
        }
        Some(
            self.per_thread
                .as_ref()
                .and_then(|caps| caps.get(rank).copied())
                .unwrap_or(self.cap),
        )
    }

    pub fn validate(&self, threads: usize) -> ConfigResult<()> {
        if let Some(caps) = &self.per_thread {
            if caps.len() != threads {
                return Err(ConfigError::BackoffShape {
                    caps: caps.len(),
                    threads,
                });
            }
            if caps.contains(&0) {
                return Err(ConfigError::ZeroBackoffCap);
            }
        }
        if self.enabled && self.cap == 0 {
            return Err(ConfigError::ZeroBackoffCap);
        }
        Ok(())
    }
}
