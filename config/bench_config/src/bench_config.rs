use log::debug;

use crate::{BackoffConfig, ConfigError, ConfigResult, FenceLevel, RoleAssignment, TestId};

/// Everything a run needs, validated once and then shared read-only with every worker.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub repetitions: usize,
    /// Bound of the random decoy offset; always a power of two.
    pub stride: usize,
    pub fence: FenceLevel,
    /// Size of the shared buffer in cache lines.
    pub cache_lines: usize,
    /// Flush the target line before every repetition.
    pub flush: bool,
    /// Arrange for the timed atomic to succeed instead of racing it.
    pub force_success: bool,
    /// Core that re-primes the line before every repetition.
    pub seed_core: Option<usize>,
    pub backoff: BackoffConfig,
    pub verbose: bool,
    /// Samples printed per slot in verbose mode.
    pub print: usize,
    /// Allocate the buffer from the seed core (or rank 0's core).
    pub numa: bool,
    pub lock_memory: bool,
    /// Keep the winner of every repetition for the report.
    pub trace_winners: bool,
    pub roles: RoleAssignment,
}

impl BenchConfig {
    pub const CACHE_LINE_SIZE: usize = 64;
    pub const DEFAULT_REPETITIONS: usize = 10_000;
    pub const DEFAULT_STRIDE: usize = 2;
    pub const DEFAULT_THREADS: usize = 2;
    pub const DEFAULT_TEST: TestId = TestId::StoreOnModified;
    pub const DEFAULT_CACHE_LINES: usize = 1024 * 1024;
    pub const DEFAULT_PRINT: usize = 100;

    /// Defaults for everything except the role table.
    pub fn new(roles: RoleAssignment) -> Self {
        Self {
            repetitions: Self::DEFAULT_REPETITIONS,
            stride: Self::DEFAULT_STRIDE,
            fence: FenceLevel::default(),
            cache_lines: Self::DEFAULT_CACHE_LINES,
            flush: false,
            force_success: false,
            seed_core: None,
            backoff: BackoffConfig::default(),
            verbose: false,
            print: Self::DEFAULT_PRINT,
            numa: true,
            lock_memory: false,
            trace_winners: false,
            roles,
        }
    }

    /// Round a requested stride up to the next power of two.
    #[inline]
    pub fn round_stride(stride: usize) -> usize {
        stride.max(1).next_power_of_two()
    }

    /// Cache lines needed to cover `bytes`, at least one.
    #[inline]
    pub fn lines_for_bytes(bytes: usize) -> usize {
        bytes.div_ceil(Self::CACHE_LINE_SIZE).max(1)
    }

    #[inline(always)]
    pub fn num_threads(&self) -> usize {
        self.roles.num_threads()
    }

    /// Rank that primes the line itself when the seed core is one of the workers.
    pub fn seed_rank(&self) -> Option<usize> {
        self.seed_core
            .and_then(|core| self.roles.rank_on_core(core))
    }

    /// Core whose thread allocates and first-touches the buffer: the seed core, else rank 0's.
    pub fn allocation_core(&self) -> Option<usize> {
        if !self.numa {
            return None;
        }
        self.seed_core
            .or_else(|| self.roles.ranks().first().map(|info| info.core))
    }

    /// A helper thread is spawned when the seed core is not one of the workers.
    pub fn needs_seed_helper(&self) -> bool {
        self.seed_core.is_some() && self.seed_rank().is_none()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let threads = self.num_threads();
        if threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.repetitions == 0 {
            return Err(ConfigError::NoRepetitions);
        }
        if self.cache_lines == 0 {
            return Err(ConfigError::EmptyBuffer);
        }
        self.backoff.validate(threads)?;

        let tests = self.roles.tests();
        let only_pointer_chase = tests.iter().all(|&test| test == TestId::LoadFromMemSize);
        if self.stride >= self.cache_lines && !only_pointer_chase {
            return Err(ConfigError::StrideTooLarge {
                stride: self.stride,
                lines: self.cache_lines,
            });
        }

        if !self.flush {
            if let Some(&test) = tests.iter().find(|test| test.uses_fresh_line()) {
                // the last repetition still walks up to `stride` lines past its base
                let needed = self.repetitions.saturating_mul(self.stride);
                if needed > self.cache_lines {
                    return Err(ConfigError::BufferTooSmall {
                        test,
                        stride: self.stride,
                        repetitions: self.repetitions,
                        needed,
                        lines: self.cache_lines,
                    });
                }
            }
        }

        debug!(
            "config ok: {threads} threads, {} repetitions, stride {}, {} cache lines",
            self.repetitions, self.stride, self.cache_lines
        );
        Ok(())
    }
}
