//! Persistent indexed sequence backed by a 32-ary relaxed radix tree.
//!
//! [`Seq`] is an immutable value type with O(log n) random access, update,
//! push/pop at both ends, concatenation, and sub-range slicing, all via
//! structural sharing: derived sequences share unchanged subtrees with
//! their ancestors. [`TransientSeq`] is the linear builder counterpart:
//! it holds a private ownership token and batches in-place edits, then
//! seals back into a [`Seq`].
//!
//! Persistent values are safe for unsynchronized concurrent reads; any
//! observer holding a prior reference is unaffected by later edits. A
//! transient is single-owner by construction (`&mut self` everywhere,
//! sealing consumes it).

pub mod error;
pub mod iter;
pub mod seq;

mod node;
mod token;

pub use error::{Result, SeqError};
pub use iter::Iter;
pub use seq::{Seq, TransientSeq};
