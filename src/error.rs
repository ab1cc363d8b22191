use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReverbError {
    /// Rejected at construction time, or by the filter kernel.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An invariant of the processing pipeline broke mid-call.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, ReverbError>;
