//! Block framing: every region of a durable list is introduced by a prefix
//! carrying its type tag and payload length.
//!
//! Wire layout:
//!
//! | field  | encoding | meaning                      |
//! |--------|----------|------------------------------|
//! | tag    | u8       | block type                   |
//! | length | VLQ      | payload byte count           |

use crate::bytes::{Accumulator, Input};
use crate::error::{DurableError, Result};

/// The kinds of framed region a durable list contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// A complete encoded list.
    List,
    /// A skip table over a list's element region.
    Table,
    /// A run of encoded elements.
    Encoded,
}

impl BlockType {
    fn tag(self) -> u8 {
        match self {
            BlockType::List => 0x01,
            BlockType::Table => 0x02,
            BlockType::Encoded => 0x03,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(BlockType::List),
            0x02 => Ok(BlockType::Table),
            0x03 => Ok(BlockType::Encoded),
            other => Err(DurableError::UnknownBlockTag(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPrefix {
    pub block_type: BlockType,
    pub length: u64,
}

impl BlockPrefix {
    pub fn new(block_type: BlockType, length: u64) -> Self {
        BlockPrefix { block_type, length }
    }

    pub fn write_to(&self, out: &mut Accumulator) {
        out.push_u8(self.block_type.tag());
        out.write_vlq(self.length);
    }

    pub fn read_from(input: &mut Input) -> Result<Self> {
        let block_type = BlockType::from_tag(input.read_u8()?)?;
        let length = input.read_vlq()?;
        Ok(BlockPrefix { block_type, length })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_round_trip() {
        for (ty, len) in [
            (BlockType::List, 0),
            (BlockType::Table, 127),
            (BlockType::Encoded, 1 << 30),
        ] {
            let mut acc = Accumulator::new();
            BlockPrefix::new(ty, len).write_to(&mut acc);
            let mut input = acc.into_input();
            assert_eq!(BlockPrefix::read_from(&mut input).unwrap(), BlockPrefix::new(ty, len));
            assert_eq!(input.remaining(), 0);
        }
    }

    #[test]
    fn test_unknown_tag() {
        let mut acc = Accumulator::new();
        acc.push_u8(0x7E);
        acc.write_vlq(4);
        let mut input = acc.into_input();
        assert_eq!(
            BlockPrefix::read_from(&mut input),
            Err(DurableError::UnknownBlockTag(0x7E))
        );
    }
}
