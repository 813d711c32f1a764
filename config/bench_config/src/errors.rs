use thiserror::Error;

use crate::TestId;

/// Problems with the shape or values of a run configuration. All of them are detected before any
/// worker thread exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown test id {0} (valid ids are 0..={})", TestId::COUNT - 1)]
    UnknownTest(usize),

    #[error("core group {0} is empty")]
    EmptyGroup(usize),

    #[error("test row {0} is empty")]
    EmptyTestRow(usize),

    #[error("{tests} test ids given for {groups} core groups")]
    TestsPerGroupMismatch { tests: usize, groups: usize },

    #[error("{rows} test rows do not match {groups} core groups")]
    TestShape { rows: usize, groups: usize },

    #[error("{caps} per-thread backoff caps given for {threads} threads")]
    BackoffShape { caps: usize, threads: usize },

    #[error("backoff cap must be at least 1")]
    ZeroBackoffCap,

    #[error("at least one thread is required")]
    NoThreads,

    #[error("repetition count must be positive")]
    NoRepetitions,

    #[error("the buffer must hold at least one cache line")]
    EmptyBuffer,

    #[error("stride {stride} must be smaller than the buffer's {lines} cache lines")]
    StrideTooLarge { stride: usize, lines: usize },

    #[error(
        "{test} moves {stride} lines per repetition: {repetitions} repetitions need {needed} cache \
         lines, the buffer has {lines} (use a larger --mem-size or --flush)"
    )]
    BufferTooSmall {
        test: TestId,
        stride: usize,
        repetitions: usize,
        needed: usize,
        lines: usize,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
