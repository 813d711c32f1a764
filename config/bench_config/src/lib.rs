mod backoff;
pub use backoff::*;

mod bench_config;
pub use bench_config::*;

mod errors;
pub use errors::*;

mod fence;
pub use fence::*;

mod roles;
pub use roles::*;

mod test_id;
pub use test_id::*;
