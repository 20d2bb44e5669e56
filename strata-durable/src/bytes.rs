//! Byte-level primitives: a sharable read cursor and a write accumulator.
//!
//! `Input` is a cheap view over a shared byte buffer. Duplicating or slicing
//! one never copies the underlying bytes, which lets a decoded list hand out
//! independent cursors over its element region while holding the block alive.
//!
//! Unsigned integers use LEB128: seven payload bits per byte, low bits first,
//! high bit set on every byte except the last.

use std::sync::Arc;

use crate::error::{DurableError, Result};
use crate::prefix::{BlockPrefix, BlockType};

// =============================================================================
// Input
// =============================================================================

/// A positioned read cursor over a window of a shared byte buffer.
#[derive(Debug, Clone)]
pub struct Input {
    bytes: Arc<[u8]>,
    start: usize,
    end: usize,
    pos: usize,
}

impl Input {
    pub fn new(bytes: Arc<[u8]>) -> Self {
        let end = bytes.len();
        Input {
            bytes,
            start: 0,
            end,
            pos: 0,
        }
    }

    /// Total length of this window, independent of the cursor.
    pub fn len(&self) -> u64 {
        (self.end - self.start) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Cursor position relative to the start of the window.
    pub fn position(&self) -> u64 {
        (self.pos - self.start) as u64
    }

    pub fn remaining(&self) -> u64 {
        (self.end - self.pos) as u64
    }

    /// Move the cursor to an absolute offset within the window.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        let target = self.start as u64 + offset;
        if target > self.end as u64 {
            return Err(DurableError::Truncated {
                requested: offset,
                remaining: self.len(),
            });
        }
        self.pos = target as usize;
        Ok(())
    }

    /// An independent cursor over the same window, rewound to its start.
    pub fn duplicate(&self) -> Input {
        Input {
            bytes: Arc::clone(&self.bytes),
            start: self.start,
            end: self.end,
            pos: self.start,
        }
    }

    fn check(&self, n: u64) -> Result<()> {
        if self.remaining() < n {
            return Err(DurableError::Truncated {
                requested: n,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check(buf.len() as u64)?;
        buf.copy_from_slice(&self.bytes[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    /// Decode a LEB128 unsigned integer at the cursor.
    pub fn read_vlq(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            let payload = (byte & 0x7F) as u64;
            // shift must stay < 64, and the final payload must fit
            if shift >= 64 || (shift == 63 && payload > 1) {
                return Err(DurableError::VarintOverflow);
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Split off the next `n` bytes as a new window and advance past them.
    pub fn slice(&mut self, n: u64) -> Result<Input> {
        self.check(n)?;
        let sliced = Input {
            bytes: Arc::clone(&self.bytes),
            start: self.pos,
            end: self.pos + n as usize,
            pos: self.pos,
        };
        self.pos += n as usize;
        Ok(sliced)
    }

    /// Read a block prefix, failing unless it carries the expected type.
    pub fn read_prefix(&mut self, expected: BlockType) -> Result<BlockPrefix> {
        let prefix = BlockPrefix::read_from(self)?;
        if prefix.block_type != expected {
            return Err(DurableError::UnexpectedBlock {
                expected,
                actual: prefix.block_type,
            });
        }
        Ok(prefix)
    }

    /// Read a prefix of the expected type and slice off its payload.
    pub fn slice_block(&mut self, expected: BlockType) -> Result<Input> {
        let prefix = self.read_prefix(expected)?;
        self.slice(prefix.length)
    }
}

// =============================================================================
// Accumulator
// =============================================================================

/// A growable write buffer with helpers for the framing primitives.
#[derive(Debug, Default)]
pub struct Accumulator {
    buf: Vec<u8>,
}

impl Accumulator {
    pub fn new() -> Self {
        Accumulator { buf: Vec::new() }
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn push_u8(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Encode a LEB128 unsigned integer at the end of the buffer.
    pub fn write_vlq(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Frame the bytes produced by `body` as a block of the given type.
    ///
    /// The body writes into a nested accumulator so the prefix can record the
    /// exact payload length before the payload lands in this buffer.
    pub fn block<F>(&mut self, block_type: BlockType, body: F) -> Result<()>
    where
        F: FnOnce(&mut Accumulator) -> Result<()>,
    {
        let mut nested = Accumulator::new();
        body(&mut nested)?;
        BlockPrefix::new(block_type, nested.len()).write_to(self);
        self.buf.extend_from_slice(&nested.buf);
        Ok(())
    }

    /// Finish writing and re-open the buffer for reading.
    pub fn into_input(self) -> Input {
        Input::new(self.buf.into())
    }
}

// =============================================================================
// Tests
// =============================================================================
