//! Ownership tokens: opaque mutation permits for tree nodes.
//!
//! A node may be mutated in place only by the holder of its token; every
//! other caller gets a shallow clone bound to its own token first. Tokens
//! carry no data; equality is the entire contract.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identity marking a node as exclusively mutable by its holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token(u64);

impl Token {
    /// Mint a token no one else holds.
    pub(crate) fn new() -> Token {
        Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_distinct() {
        let a = Token::new();
        let b = Token::new();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
