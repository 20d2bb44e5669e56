//! Durable, block-framed encoding for indexed sequences.
//!
//! A list is serialized as a single framed block: a header with the element
//! count, an optional tiered skip table, and a run of element blocks. The
//! reader is lazy: decoding touches only the header, and random access
//! materializes the skip table once and then decodes a single element block
//! per lookup.

pub mod bytes;
pub mod encoding;
pub mod error;
pub mod list;
pub mod prefix;
pub mod skip_table;

pub use bytes::{Accumulator, Input};
pub use encoding::{Codec, Encoding, VlqCodec, VlqEncoding};
pub use error::{DurableError, Result};
pub use list::{encode, encode_seq, DurableList};
pub use prefix::{BlockPrefix, BlockType};
pub use skip_table::{SkipTable, SkipTableWriter, TIER_FAN_OUT};
