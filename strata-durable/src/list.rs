//! Durable list encoding and the lazily-decoded reader.
//!
//! Wire layout of a `List` block payload:
//!
//! | field       | encoding       | meaning                             |
//! |-------------|----------------|-------------------------------------|
//! | size        | VLQ            | element count                       |
//! | tier count  | u8             | skip table tiers, 0 when absent     |
//! | skip table  | `Table` block  | only present when tier count > 0    |
//! | elements    | `Encoded`*     | one block per run                   |
//!
//! Elements are partitioned into runs of consecutive positions that share an
//! equal codec, capped at the codec's block limit. Each run becomes one
//! `Encoded` block, and the skip table records where each block starts so a
//! random access decodes one block instead of the whole region.

use std::marker::PhantomData;

use once_cell::sync::OnceCell;
use tracing::debug;

use strata_seq::{Seq, TransientSeq};

use crate::bytes::{Accumulator, Input};
use crate::encoding::{Codec, Encoding};
use crate::error::{DurableError, Result};
use crate::prefix::BlockType;
use crate::skip_table::{SkipTable, SkipTableWriter};

// =============================================================================
// Encoding
// =============================================================================

fn flush_run<'a, V: 'a, C: Codec<V>>(
    run: &mut Vec<&'a V>,
    codec: &C,
    start_index: u64,
    body: &mut Accumulator,
    table: &mut SkipTableWriter,
) -> Result<()> {
    table.append(start_index, body.len());
    body.block(BlockType::Encoded, |block| {
        for value in run.drain(..) {
            codec.write_element(value, block)?;
        }
        Ok(())
    })
}

/// Encode a list as a single `List` block.
pub fn encode<'a, V: 'a, E: Encoding<V>>(
    elements: impl IntoIterator<Item = &'a V>,
    encoding: &E,
    out: &mut Accumulator,
) -> Result<()> {
    let mut body = Accumulator::new();
    let mut table = SkipTableWriter::new();
    let mut size = 0u64;
    let mut blocks = 0u64;

    let mut run: Vec<&V> = Vec::new();
    let mut run_codec: Option<E::Codec> = None;
    let mut run_start = 0u64;

    for value in elements {
        let codec = encoding.element_codec(size);
        if let Some(current) = &run_codec {
            if *current != codec || run.len() as u64 >= current.block_limit() {
                flush_run(&mut run, current, run_start, &mut body, &mut table)?;
                blocks += 1;
                run_start = size;
                run_codec = Some(codec);
            }
        } else {
            run_codec = Some(codec);
        }
        run.push(value);
        size += 1;
    }
    if let Some(current) = &run_codec {
        if !run.is_empty() {
            flush_run(&mut run, current, run_start, &mut body, &mut table)?;
            blocks += 1;
        }
    }

    let tiers = table.tiers();
    out.block(BlockType::List, |outer| {
        outer.write_vlq(size);
        outer.push_u8(tiers);
        if tiers > 0 {
            table.flush_to(outer)?;
        }
        outer.write(body.as_slice());
        Ok(())
    })?;

    debug!(size, blocks, tiers, "encoded list block");
    Ok(())
}

/// Encode a sequence's elements as a `List` block.
pub fn encode_seq<V: Clone, E: Encoding<V>>(
    seq: &Seq<V>,
    encoding: &E,
    out: &mut Accumulator,
) -> Result<()> {
    encode(seq.iter(), encoding, out)
}

// =============================================================================
// Reader
// =============================================================================

/// A decoded list over a shared byte buffer.
///
/// Construction reads only the header. The skip table is materialized on the
/// first random access and element blocks are decoded as they are touched.
#[derive(Debug)]
pub struct DurableList<V, E: Encoding<V>> {
    size: u64,
    tier_count: u8,
    table_bytes: Option<Input>,
    table: OnceCell<SkipTable>,
    elements: Input,
    encoding: E,
    _marker: PhantomData<fn() -> V>,
}

impl<V, E: Encoding<V>> DurableList<V, E> {
    /// Read a `List` block header at the cursor, consuming the whole block.
    pub fn decode(input: &mut Input, encoding: E) -> Result<Self> {
        let mut block = input.slice_block(BlockType::List)?;
        let size = block.read_vlq()?;
        let tier_count = block.read_u8()?;
        let table_bytes = if tier_count > 0 {
            Some(block.slice_block(BlockType::Table)?)
        } else {
            None
        };
        let elements = block.slice(block.remaining())?;

        debug!(size, tier_count, "decoded list header");
        Ok(DurableList {
            size,
            tier_count,
            table_bytes,
            table: OnceCell::new(),
            elements,
            encoding,
            _marker: PhantomData,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Skip table tiers recorded in the header.
    pub fn tier_count(&self) -> u8 {
        self.tier_count
    }

    fn table(&self) -> Result<Option<&SkipTable>> {
        match &self.table_bytes {
            None => Ok(None),
            Some(bytes) => {
                let table = self
                    .table
                    .get_or_try_init(|| SkipTable::decode(bytes.duplicate(), self.tier_count))?;
                Ok(Some(table))
            }
        }
    }

    /// Decode the element at `index`, touching only its block.
    pub fn nth(&self, index: u64) -> Result<V> {
        if index >= self.size {
            return Err(DurableError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }

        let (mut at, offset) = match self.table()? {
            Some(table) => table.lookup(index),
            None => (0, 0),
        };

        let mut cursor = self.elements.duplicate();
        cursor.seek(offset)?;
        loop {
            let codec = self.encoding.element_codec(at);
            let mut block = cursor.slice_block(BlockType::Encoded)?;
            while block.remaining() > 0 {
                let value = codec.read_element(&mut block)?;
                if at == index {
                    return Ok(value);
                }
                at += 1;
            }
        }
    }

    /// Sequential decode of every element, in order.
    pub fn iter(&self) -> Iter<'_, V, E> {
        Iter {
            list: self,
            cursor: self.elements.duplicate(),
            block: None,
            codec: None,
            at: 0,
        }
    }

    /// Rebuild an in-memory sequence from the encoded elements.
    pub fn to_seq(&self) -> Result<Seq<V>>
    where
        V: Clone,
    {
        let mut transient = TransientSeq::new();
        for value in self.iter() {
            transient.push_back(value?);
        }
        Ok(transient.persistent())
    }
}

/// Streaming decoder over a [`DurableList`]. Yields `Err` once and stops if
/// the element region is corrupt.
pub struct Iter<'a, V, E: Encoding<V>> {
    list: &'a DurableList<V, E>,
    cursor: Input,
    block: Option<Input>,
    codec: Option<E::Codec>,
    at: u64,
}

impl<'a, V, E: Encoding<V>> Iterator for Iter<'a, V, E> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Result<V>> {
        if self.at >= self.list.size {
            return None;
        }
        loop {
            match &mut self.block {
                Some(block) if block.remaining() > 0 => {
                    let codec = self.codec.as_ref()?;
                    return match codec.read_element(block) {
                        Ok(value) => {
                            self.at += 1;
                            Some(Ok(value))
                        }
                        Err(err) => {
                            self.at = self.list.size;
                            Some(Err(err))
                        }
                    };
                }
                _ => match self.cursor.slice_block(BlockType::Encoded) {
                    Ok(block) => {
                        self.codec = Some(self.list.encoding.element_codec(self.at));
                        self.block = Some(block);
                    }
                    Err(err) => {
                        self.at = self.list.size;
                        return Some(Err(err));
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.list.size - self.at) as usize;
        (0, Some(remaining))
    }
}

// =============================================================================
// Tests
// =============================================================================
