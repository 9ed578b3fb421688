//! The fixed-width opaque key/value type stored at BST nodes.

use std::fmt;

/// An 8-byte opaque key or value. Callers encode whatever fits in 64 bits
/// (an integer, a hash, a packed small string); the tree and the command
/// log only ever compare and copy `Term`s, never interpret their bits.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Term(pub u64);

impl Term {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Term(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term({})", self.0)
    }
}

impl From<u64> for Term {
    fn from(raw: u64) -> Self {
        Term(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_underlying_integer() {
        assert!(Term(1) < Term(2));
        assert_eq!(Term(5), Term(5));
    }
}
