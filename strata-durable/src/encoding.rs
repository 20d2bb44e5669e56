//! Element encodings.
//!
//! An [`Encoding`] chooses a codec per element position, letting a list mix
//! representations across ranges. Consecutive elements whose codecs compare
//! equal are packed into the same block, up to the codec's block limit.

use crate::bytes::{Accumulator, Input};
use crate::error::Result;

/// Chooses how each element of a list is serialized.
pub trait Encoding<V> {
    type Codec: Codec<V>;

    /// The codec for the element at `index`.
    fn element_codec(&self, index: u64) -> Self::Codec;
}

/// Serializes elements of one kind into a block.
pub trait Codec<V>: PartialEq {
    /// Maximum number of elements packed into one block under this codec.
    fn block_limit(&self) -> u64;

    fn write_element(&self, value: &V, out: &mut Accumulator) -> Result<()>;

    fn read_element(&self, input: &mut Input) -> Result<V>;
}

// =============================================================================
// VLQ reference encoding
// =============================================================================

/// Encodes `u64` elements as LEB128 varints.
#[derive(Debug, Clone, Copy, Default)]
pub struct VlqEncoding {
    block_limit: u64,
}

impl VlqEncoding {
    pub fn new(block_limit: u64) -> Self {
        debug_assert!(block_limit > 0, "block limit must be positive");
        VlqEncoding { block_limit }
    }
}

impl Encoding<u64> for VlqEncoding {
    type Codec = VlqCodec;

    fn element_codec(&self, _index: u64) -> VlqCodec {
        VlqCodec {
            block_limit: self.block_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlqCodec {
    block_limit: u64,
}

impl Codec<u64> for VlqCodec {
    fn block_limit(&self) -> u64 {
        self.block_limit
    }

    fn write_element(&self, value: &u64, out: &mut Accumulator) -> Result<()> {
        out.write_vlq(*value);
        Ok(())
    }

    fn read_element(&self, input: &mut Input) -> Result<u64> {
        input.read_vlq()
    }
}
