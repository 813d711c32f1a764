mod barrier_set;
pub use barrier_set::*;

mod errors;
pub use errors::*;
