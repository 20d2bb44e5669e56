//! End-to-end encode/decode coverage: round trips across block shapes,
//! mixed codecs, corruption handling, and the laziness guarantee of random
//! access.

use std::cell::Cell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use strata_durable::{
    encode, encode_seq, Accumulator, BlockType, Codec, DurableError, DurableList, Encoding, Input,
    Result, VlqEncoding,
};
use strata_seq::Seq;

fn encode_values(values: &[u64], block_limit: u64) -> Input {
    let mut out = Accumulator::new();
    encode(values.iter(), &VlqEncoding::new(block_limit), &mut out).unwrap();
    out.into_input()
}

fn decode_list(input: &mut Input, block_limit: u64) -> DurableList<u64, VlqEncoding> {
    DurableList::decode(input, VlqEncoding::new(block_limit)).unwrap()
}

// --- round trips ---

#[test]
fn round_trip_shapes() {
    for (len, limit) in [(0u64, 8u64), (1, 8), (8, 8), (9, 8), (64, 8), (1000, 8)] {
        let values: Vec<u64> = (0..len).map(|i| i * 7 + 3).collect();
        let mut input = encode_values(&values, limit);
        let list = decode_list(&mut input, limit);
        assert_eq!(list.size(), len, "len={len} limit={limit}");
        for (i, v) in values.iter().enumerate() {
            assert_eq!(list.nth(i as u64).unwrap(), *v);
        }
        let decoded: Vec<u64> = list.iter().map(|r| r.unwrap()).collect();
        assert_eq!(decoded, values);
    }
}

#[test]
fn round_trip_from_sequence() {
    let seq: Seq<u64> = (0..500).collect();
    let mut out = Accumulator::new();
    encode_seq(&seq, &VlqEncoding::new(32), &mut out).unwrap();
    let mut input = out.into_input();
    let list = decode_list(&mut input, 32);
    assert_eq!(list.to_seq().unwrap(), seq);
}

#[test]
fn out_of_range_index() {
    let mut input = encode_values(&[1, 2, 3], 8);
    let list = decode_list(&mut input, 8);
    assert!(matches!(
        list.nth(3),
        Err(DurableError::IndexOutOfRange { index: 3, size: 3 })
    ));
}

// --- tier structure ---

#[test]
fn tier_counts_track_block_counts() {
    // one block: no table
    let mut input = encode_values(&(0..8).collect::<Vec<_>>(), 8);
    assert_eq!(decode_list(&mut input, 8).tier_count(), 0);

    // up to 32 blocks: one tier
    let mut input = encode_values(&(0..256).collect::<Vec<_>>(), 8);
    assert_eq!(decode_list(&mut input, 8).tier_count(), 1);

    // 33 blocks: two tiers
    let mut input = encode_values(&(0..264).collect::<Vec<_>>(), 8);
    assert_eq!(decode_list(&mut input, 8).tier_count(), 2);
}

#[test]
fn random_access_across_tier_boundaries() {
    // 63 blocks of 16: two tiers, exercises the positional descent
    let values: Vec<u64> = (0..1008).map(|i| i * 11).collect();
    let mut input = encode_values(&values, 16);
    let list = decode_list(&mut input, 16);
    assert_eq!(list.tier_count(), 2);

    let mut rng = StdRng::seed_from_u64(0xB10C);
    for _ in 0..200 {
        let i = rng.gen_range(0..values.len()) as u64;
        assert_eq!(list.nth(i).unwrap(), values[i as usize]);
    }
    assert_eq!(list.nth(0).unwrap(), 0);
    assert_eq!(list.nth(1007).unwrap(), 1007 * 11);
}

// --- mixed codecs ---

/// Splits elements into two codec regimes at a fixed pivot, forcing a block
/// boundary there regardless of the block limit.
#[derive(Debug, Clone, Copy)]
struct SplitEncoding {
    pivot: u64,
    limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SplitCodec {
    wide: bool,
    limit: u64,
}

impl Encoding<u64> for SplitEncoding {
    type Codec = SplitCodec;

    fn element_codec(&self, index: u64) -> SplitCodec {
        SplitCodec {
            wide: index >= self.pivot,
            limit: self.limit,
        }
    }
}

impl Codec<u64> for SplitCodec {
    fn block_limit(&self) -> u64 {
        self.limit
    }

    fn write_element(&self, value: &u64, out: &mut Accumulator) -> Result<()> {
        if self.wide {
            out.write(&value.to_le_bytes());
        } else {
            out.write_vlq(*value);
        }
        Ok(())
    }

    fn read_element(&self, input: &mut Input) -> Result<u64> {
        if self.wide {
            let mut buf = [0u8; 8];
            input.read_exact(&mut buf)?;
            Ok(u64::from_le_bytes(buf))
        } else {
            input.read_vlq()
        }
    }
}

#[test]
fn codec_change_forces_block_boundary() {
    let values: Vec<u64> = (0..40).collect();
    let encoding = SplitEncoding { pivot: 13, limit: 32 };
    let mut out = Accumulator::new();
    encode(values.iter(), &encoding, &mut out).unwrap();
    let mut input = out.into_input();
    let list = DurableList::decode(&mut input, encoding).unwrap();

    // 13 narrow elements then 27 wide ones, split at the pivot
    for (i, v) in values.iter().enumerate() {
        assert_eq!(list.nth(i as u64).unwrap(), *v, "index {i}");
    }
    let decoded: Vec<u64> = list.iter().map(|r| r.unwrap()).collect();
    assert_eq!(decoded, values);
}

// --- corruption and truncation ---

#[test]
fn wrong_outer_block_type() {
    let mut acc = Accumulator::new();
    acc.block(BlockType::Encoded, |b| {
        b.write_vlq(0);
        Ok(())
    })
    .unwrap();
    let mut input = acc.into_input();
    assert!(matches!(
        DurableList::decode(&mut input, VlqEncoding::new(8)),
        Err(DurableError::UnexpectedBlock { expected: BlockType::List, .. })
    ));
}

#[test]
fn unknown_tag_is_rejected() {
    let mut acc = Accumulator::new();
    acc.push_u8(0x7F);
    acc.write_vlq(3);
    let mut input = acc.into_input();
    assert!(matches!(
        DurableList::decode(&mut input, VlqEncoding::new(8)),
        Err(DurableError::UnknownBlockTag(0x7F))
    ));
}

#[test]
fn truncation_surfaces_as_error() {
    let input = encode_values(&(0..200).collect::<Vec<_>>(), 8);
    let total = input.len();

    // cut at several points: inside the header, the table, the elements
    for keep in [1u64, 3, total / 4, total / 2, total - 1] {
        let mut src = input.duplicate();
        let mut acc = Accumulator::new();
        let mut byte = [0u8];
        for _ in 0..keep {
            src.read_exact(&mut byte).unwrap();
            acc.push_u8(byte[0]);
        }
        let mut cut = acc.into_input();
        assert!(
            matches!(
                DurableList::decode(&mut cut, VlqEncoding::new(8)),
                Err(DurableError::Truncated { .. })
            ),
            "keep={keep} of {total}"
        );
    }
}

// --- laziness of random access ---

/// VLQ codec that counts every element decode through a shared cell.
#[derive(Debug, Clone)]
struct CountingEncoding {
    limit: u64,
    reads: Rc<Cell<u64>>,
}

#[derive(Debug, Clone)]
struct CountingCodec {
    limit: u64,
    reads: Rc<Cell<u64>>,
}

impl PartialEq for CountingCodec {
    fn eq(&self, other: &Self) -> bool {
        self.limit == other.limit
    }
}

impl Encoding<u64> for CountingEncoding {
    type Codec = CountingCodec;

    fn element_codec(&self, _index: u64) -> CountingCodec {
        CountingCodec {
            limit: self.limit,
            reads: Rc::clone(&self.reads),
        }
    }
}

impl Codec<u64> for CountingCodec {
    fn block_limit(&self) -> u64 {
        self.limit
    }

    fn write_element(&self, value: &u64, out: &mut Accumulator) -> Result<()> {
        out.write_vlq(*value);
        Ok(())
    }

    fn read_element(&self, input: &mut Input) -> Result<u64> {
        self.reads.set(self.reads.get() + 1);
        input.read_vlq()
    }
}

#[test]
fn random_access_decodes_one_block() {
    let values: Vec<u64> = (0..1000).collect();
    let reads = Rc::new(Cell::new(0));
    let encoding = CountingEncoding {
        limit: 64,
        reads: Rc::clone(&reads),
    };

    let mut out = Accumulator::new();
    encode(values.iter(), &encoding, &mut out).unwrap();
    let mut input = out.into_input();
    let list = DurableList::decode(&mut input, encoding).unwrap();
    assert!(list.tier_count() > 0);

    reads.set(0);
    assert_eq!(list.nth(999).unwrap(), 999);
    assert!(
        reads.get() <= 64,
        "decoded {} elements for one lookup",
        reads.get()
    );

    reads.set(0);
    assert_eq!(list.nth(0).unwrap(), 0);
    assert!(reads.get() <= 64);
}
