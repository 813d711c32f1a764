mod buffer;
pub use buffer::*;

mod engine;
pub use engine::*;

mod errors;
pub use errors::*;

mod layout;
pub use layout::*;

mod ops;
pub use ops::*;

mod race;
pub use race::*;

mod report;
pub use report::*;

mod samples;
pub use samples::*;

mod script;
pub use script::*;
