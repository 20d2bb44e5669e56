//! The public sequence types: persistent [`Seq`] and linear
//! [`TransientSeq`].
//!
//! A `Seq` is a value: every operation returns a new sequence sharing
//! structure with the receiver, and each persistent edit runs under a
//! freshly minted token so the edited path is copied and everything else
//! shared. A `TransientSeq` holds one private token across a batch of
//! edits, mutating in place every node it already owns; sealing it with
//! [`TransientSeq::persistent`] consumes the builder, so no token capable
//! of further in-place edits survives.

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SeqError};
use crate::iter::Iter;
use crate::node::{Child, Leaf, Node};
use crate::token::Token;

// ============================================================================
// Seq
// ============================================================================

/// Persistent indexed sequence with O(log n) access, update, push/pop at
/// both ends, concatenation, and slicing.
pub struct Seq<V> {
    root: Arc<Node<V>>,
    len: u64,
}

impl<V: Clone> Seq<V> {
    /// The empty sequence.
    pub fn new() -> Seq<V> {
        Seq {
            root: Arc::new(Node::empty(Token::new())),
            len: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element at `index`, or `IndexOutOfRange`.
    pub fn nth(&self, index: u64) -> Result<&V> {
        if index >= self.len {
            return Err(SeqError::IndexOutOfRange {
                index,
                size: self.len,
            });
        }
        Ok(self.root.nth(index))
    }

    /// Element at `index`, or `None` when out of range.
    pub fn get(&self, index: u64) -> Option<&V> {
        self.nth(index).ok()
    }

    pub fn first(&self) -> Option<&V> {
        self.root.first_leaf().and_then(|l| l.elements.first())
    }

    pub fn last(&self) -> Option<&V> {
        self.root.last_leaf().and_then(|l| l.elements.last())
    }

    /// New sequence with `index` overwritten by `value`. Only the path
    /// from root to leaf is copied.
    pub fn set(&self, index: u64, value: V) -> Result<Seq<V>> {
        if index >= self.len {
            return Err(SeqError::IndexOutOfRange {
                index,
                size: self.len,
            });
        }
        let mut root = self.root.clone();
        Node::set_in(&mut root, Token::new(), index, value);
        Ok(Seq {
            root,
            len: self.len,
        })
    }

    /// New sequence with `value` appended.
    pub fn push_back(&self, value: V) -> Seq<V> {
        let editor = Token::new();
        let mut root = self.root.clone();
        let leaf = Child::Leaf(Arc::new(Leaf::unit(editor, value)));
        Node::add_last_in(&mut root, editor, leaf, 1);
        Seq {
            root,
            len: self.len + 1,
        }
    }

    /// New sequence with `value` prepended.
    pub fn push_front(&self, value: V) -> Seq<V> {
        let editor = Token::new();
        let mut root = self.root.clone();
        let leaf = Child::Leaf(Arc::new(Leaf::unit(editor, value)));
        Node::add_first_in(&mut root, editor, leaf, 1);
        Seq {
            root,
            len: self.len + 1,
        }
    }

    /// New sequence without the last element, plus that element.
    pub fn pop_back(&self) -> Option<(Seq<V>, V)> {
        let mut root = self.root.clone();
        let value = Node::remove_last_in(&mut root, Token::new())?;
        Some((
            Seq {
                root,
                len: self.len - 1,
            },
            value,
        ))
    }

    /// New sequence without the first element, plus that element.
    pub fn pop_front(&self) -> Option<(Seq<V>, V)> {
        let mut root = self.root.clone();
        let value = Node::remove_first_in(&mut root, Token::new())?;
        Some((
            Seq {
                root,
                len: self.len - 1,
            },
            value,
        ))
    }

    /// Concatenation of `self` and `other`, sharing both trees.
    pub fn concat(&self, other: &Seq<V>) -> Seq<V> {
        Seq {
            root: Node::concat(Token::new(), &self.root, &other.root),
            len: self.len + other.len,
        }
    }

    /// Sub-sequence `[start, end)`, sharing fully enclosed subtrees.
    pub fn slice(&self, start: u64, end: u64) -> Result<Seq<V>> {
        if start > end || end > self.len {
            return Err(SeqError::InvalidRange {
                start,
                end,
                size: self.len,
            });
        }
        if start == end {
            return Ok(Seq::new());
        }
        Ok(Seq {
            root: self.root.slice(Token::new(), start, end),
            len: end - start,
        })
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(&self.root)
    }

    /// Start a linear builder over this sequence. The builder's first
    /// touch of any shared node copies it; everything it creates after
    /// that is edited in place.
    pub fn transient(self) -> TransientSeq<V> {
        TransientSeq {
            root: self.root,
            len: self.len,
            token: Token::new(),
        }
    }
}

impl<V: Clone> Default for Seq<V> {
    fn default() -> Seq<V> {
        Seq::new()
    }
}

impl<V: Clone> Clone for Seq<V> {
    fn clone(&self) -> Seq<V> {
        Seq {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<V: Clone + PartialEq> PartialEq for Seq<V> {
    fn eq(&self, other: &Seq<V>) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<V: Clone + Eq> Eq for Seq<V> {}

impl<V: Clone + fmt::Debug> fmt::Debug for Seq<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<V: Clone> FromIterator<V> for Seq<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Seq<V> {
        let mut t = Seq::new().transient();
        for value in iter {
            t.push_back(value);
        }
        t.persistent()
    }
}

impl<'a, V: Clone> IntoIterator for &'a Seq<V> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

// ============================================================================
// TransientSeq
// ============================================================================

/// Single-owner builder over a sequence. Batches edits with no extra
/// copies per already-owned level; sealing yields an immutable [`Seq`].
pub struct TransientSeq<V> {
    root: Arc<Node<V>>,
    len: u64,
    token: Token,
}

impl<V: Clone> TransientSeq<V> {
    pub fn new() -> TransientSeq<V> {
        Seq::new().transient()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn nth(&self, index: u64) -> Result<&V> {
        if index >= self.len {
            return Err(SeqError::IndexOutOfRange {
                index,
                size: self.len,
            });
        }
        Ok(self.root.nth(index))
    }

    pub fn set(&mut self, index: u64, value: V) -> Result<()> {
        if index >= self.len {
            return Err(SeqError::IndexOutOfRange {
                index,
                size: self.len,
            });
        }
        Node::set_in(&mut self.root, self.token, index, value);
        Ok(())
    }

    pub fn push_back(&mut self, value: V) {
        let leaf = Child::Leaf(Arc::new(Leaf::unit(self.token, value)));
        Node::add_last_in(&mut self.root, self.token, leaf, 1);
        self.len += 1;
    }

    pub fn push_front(&mut self, value: V) {
        let leaf = Child::Leaf(Arc::new(Leaf::unit(self.token, value)));
        Node::add_first_in(&mut self.root, self.token, leaf, 1);
        self.len += 1;
    }

    pub fn pop_back(&mut self) -> Option<V> {
        let value = Node::remove_last_in(&mut self.root, self.token)?;
        self.len -= 1;
        Some(value)
    }

    pub fn pop_front(&mut self) -> Option<V> {
        let value = Node::remove_first_in(&mut self.root, self.token)?;
        self.len -= 1;
        Some(value)
    }

    /// Seal the builder into a persistent sequence. Consuming `self`
    /// drops the only token able to edit these nodes in place.
    pub fn persistent(self) -> Seq<V> {
        Seq {
            root: self.root,
            len: self.len,
        }
    }
}

impl<V: Clone> Default for TransientSeq<V> {
    fn default() -> TransientSeq<V> {
        TransientSeq::new()
    }
}

impl<V: Clone> Extend<V> for TransientSeq<V> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
