//! Error types for durable list encoding and decoding.

use thiserror::Error;

use crate::prefix::BlockType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurableError {
    #[error("index {index} out of range for list of size {size}")]
    IndexOutOfRange { index: u64, size: u64 },

    #[error("expected {expected:?} block, found {actual:?}")]
    UnexpectedBlock {
        expected: BlockType,
        actual: BlockType,
    },

    #[error("unknown block tag {0:#04x}")]
    UnknownBlockTag(u8),

    #[error("truncated input: needed {requested} bytes, {remaining} remaining")]
    Truncated { requested: u64, remaining: u64 },

    #[error("varint exceeds 64 bits")]
    VarintOverflow,

    #[error("invalid skip table: {0}")]
    InvalidTable(String),
}

pub type Result<T> = std::result::Result<T, DurableError>;
