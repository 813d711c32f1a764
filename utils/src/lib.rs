pub mod cycles;
pub mod placement;
pub mod timer;
