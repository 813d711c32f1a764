use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BarrierError {
    #[error("barrier {id} is outside the bank of {slots} barriers")]
    OutOfRange { id: usize, slots: usize },
}

pub type BarrierResult<T> = std::result::Result<T, BarrierError>;
