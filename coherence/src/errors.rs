use barrier::BarrierError;
use bench_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("barrier setup failed: {0}")]
    Barrier(#[from] BarrierError),

    #[error("failed to allocate {lines} cache lines")]
    Allocation { lines: usize },

    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} terminated abnormally")]
    Join { name: String },
}

pub type BenchResult<T> = std::result::Result<T, BenchError>;
