use bench_config::{BackoffConfig, BenchConfig, ConfigError, FenceLevel, RoleAssignment};
use clap::Parser;
use thiserror::Error;

use crate::array_literal::{parse_size, ArrayLiteral};

/// Measure cache-coherence latencies of loads, stores, CAS, FAI, TAS and SWAP between cores.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Repetitions of the test case
    #[arg(short, long, default_value_t = BenchConfig::DEFAULT_REPETITIONS)]
    pub repetitions: usize,

    /// Test id(s): one global id, one per group, or one per thread of a single group, e.g. [12]
    /// or [0,7]
    #[arg(short, long)]
    pub test: Option<ArrayLiteral>,

    /// Number of threads, on cores 0..n, when no core array is given
    #[arg(short, long, default_value_t = BenchConfig::DEFAULT_THREADS)]
    pub cores: usize,

    /// Cores to run on, one bracketed row per group, e.g. [0,1] or [0,1][4...7]
    #[arg(short = 'x', long)]
    pub cores_array: Option<ArrayLiteral>,

    /// Bound of the random decoy offset used to defeat prefetching, rounded up to a power of two
    #[arg(short, long, default_value_t = BenchConfig::DEFAULT_STRIDE)]
    pub stride: usize,

    /// Fence level 0-9: 1 load/store, 2 full, 3 load/none, 4 none/store, 5 full/none,
    /// 6 none/full, 7 full/store, 8 load/full, 9 double write; anything else means none
    #[arg(short = 'e', long, default_value_t = 0)]
    pub fence: u8,

    /// Size of the buffer in bytes, with an optional K/M/G suffix (default 64M)
    #[arg(short, long, value_parser = parse_size)]
    pub mem_size: Option<usize>,

    /// Flush the line before every repetition
    #[arg(short, long)]
    pub flush: bool,

    /// Make the timed atomic operations succeed (e.g. TAS_ON_SHARED)
    #[arg(short = 'u', long)]
    pub success: bool,

    /// Print the distribution of every thread's samples
    #[arg(short, long)]
    pub verbose: bool,

    /// Samples to print per thread; implies --verbose
    #[arg(short, long)]
    pub print: Option<usize>,

    /// Core that re-primes the line before every repetition
    #[arg(short = 'b', long)]
    pub seed: Option<usize>,

    /// Do not allocate the buffer from the seed core
    #[arg(short = 'n', long)]
    pub no_numa: bool,

    /// Lock the buffer's pages in memory
    #[arg(short = 'K', long)]
    pub mlock: bool,

    /// Print the winner of every repetition as CSV
    #[arg(short = 'R', long)]
    pub winners: bool,

    /// Back off exponentially between failed CAS_UNTIL_SUCCESS attempts
    #[arg(short = 'B', long)]
    pub backoff: bool,

    /// Pause cap of the backoff
    #[arg(short = 'k', long, default_value_t = BackoffConfig::DEFAULT_CAP)]
    pub backoff_cap: u32,

    /// One backoff cap per thread in rank order; implies --backoff
    #[arg(short = 'a', long)]
    pub backoff_caps: Option<ArrayLiteral>,

    /// List the test ids and exit
    #[arg(short = 'l', long)]
    pub list_tests: bool,
}

#[derive(Debug, Error)]
pub enum ArgsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("backoff cap {cap} of thread {rank} does not fit in 32 bits")]
    CapOutOfRange { rank: usize, cap: usize },
}

impl TryFrom<&Args> for BenchConfig {
    type Error = ArgsError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let roles = RoleAssignment::build(
            args.cores_array.as_ref().map(ArrayLiteral::rows),
            args.test.as_ref().map(ArrayLiteral::rows),
            BenchConfig::DEFAULT_TEST,
            args.cores,
        )?;

        let per_thread = args
            .backoff_caps
            .as_ref()
            .map(|caps| {
                caps.rows()
                    .concat()
                    .into_iter()
                    .enumerate()
                    .map(|(rank, cap)| {
                        u32::try_from(cap).map_err(|_| ArgsError::CapOutOfRange { rank, cap })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let mut config = BenchConfig::new(roles);
        config.repetitions = args.repetitions;
        config.stride = BenchConfig::round_stride(args.stride);
        config.fence = FenceLevel::new(args.fence);
        if let Some(bytes) = args.mem_size {
            config.cache_lines = BenchConfig::lines_for_bytes(bytes);
        }
        config.flush = args.flush;
        config.force_success = args.success;
        config.seed_core = args.seed;
        config.verbose = args.verbose || args.print.is_some();
        config.print = args.print.unwrap_or(BenchConfig::DEFAULT_PRINT);
        config.numa = !args.no_numa;
        config.lock_memory = args.mlock;
        config.trace_winners = args.winners;
        config.backoff = BackoffConfig {
            enabled: args.backoff || per_thread.is_some(),
            cap: args.backoff_cap,
            per_thread,
        };

        config.validate()?;
        Ok(config)
    }
}
