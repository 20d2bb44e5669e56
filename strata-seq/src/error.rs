//! Error types for sequence operations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeqError {
    #[error("index {index} out of range (size {size})")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("invalid range {start}..{end} (size {size})")]
    InvalidRange { start: u64, end: u64, size: u64 },
}

pub type Result<T> = std::result::Result<T, SeqError>;
