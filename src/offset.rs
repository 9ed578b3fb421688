//! Cyclic offset arithmetic and the node-reference/cutoff newtypes.
//!
//! An [`Offset`] is an address into a [`crate::cb::Cb`] ring. The integer
//! keeps counting past the ring's size; [`Cb::at`](crate::cb::Cb::at) is what
//! folds it back into the live byte range by masking against `ring_size - 1`.
//! Because the counter wraps, two offsets are never compared with plain `<`;
//! they are compared by modular distance, below half the offset space.

use std::cmp::Ordering;
use std::fmt;

/// Half of the `Offset` domain. Two offsets `a`, `b` are ordered `a <= b` iff
/// `b.wrapping_sub(a) < HALF`. This is the one true comparison in the crate;
/// nothing else should reach for `<` on a raw `u64` address.
const HALF: u64 = u64::MAX / 2;

/// A cyclic address into a ring. See the module docs for the comparison rule.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Offset(pub u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    #[inline]
    pub fn new(raw: u64) -> Self {
        Offset(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// `self + n`, wrapping at the offset domain (not the ring size).
    #[inline]
    pub fn add(self, n: u64) -> Offset {
        Offset(self.0.wrapping_add(n))
    }

    /// `self - n`, wrapping at the offset domain.
    #[inline]
    pub fn sub(self, n: u64) -> Offset {
        Offset(self.0.wrapping_sub(n))
    }

    /// Unsigned modular distance from `self` to `other`, i.e. the value `n`
    /// such that `self.add(n) == other`.
    #[inline]
    pub fn distance_to(self, other: Offset) -> u64 {
        other.0.wrapping_sub(self.0)
    }

    /// Rounds `self` up to the next multiple of `alignment`, which must be a
    /// power of two.
    #[inline]
    pub fn align_up(self, alignment: u64) -> Offset {
        debug_assert!(alignment.is_power_of_two());
        Offset((self.0.wrapping_add(alignment - 1)) & !(alignment - 1))
    }

    /// True if `self` is aligned to `alignment` (a power of two).
    #[inline]
    pub fn is_aligned(self, alignment: u64) -> bool {
        debug_assert!(alignment.is_power_of_two());
        self.0 & (alignment - 1) == 0
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Offset({:#x})", self.0)
    }
}

/// Three-way modular comparison. Returns `Less`/`Equal`/`Greater` using the
/// "distance below half the offset space" rule from the module docs, rather
/// than comparing the raw integers.
#[inline]
pub fn offset_cmp(a: Offset, b: Offset) -> Ordering {
    if a.0 == b.0 {
        Ordering::Equal
    } else if a.distance_to(b) < HALF {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// `a <= b` under the modular distance rule.
#[inline]
pub fn offset_lte(a: Offset, b: Offset) -> bool {
    a.0 == b.0 || a.distance_to(b) < HALF
}

/// `a < b` under the modular distance rule.
#[inline]
pub fn offset_lt(a: Offset, b: Offset) -> bool {
    a.0 != b.0 && a.distance_to(b) < HALF
}

/// Smallest offset `>= o` that is aligned to `alignment`.
#[inline]
pub fn offset_aligned_gte(o: Offset, alignment: u64) -> Offset {
    o.align_up(alignment)
}

/// Largest offset `<= o` that is aligned to `alignment`.
#[inline]
pub fn offset_aligned_lte(o: Offset, alignment: u64) -> Offset {
    debug_assert!(alignment.is_power_of_two());
    Offset(o.0 & !(alignment - 1))
}

/// Largest offset strictly less than `o` that is aligned to `alignment`.
#[inline]
pub fn offset_aligned_lt(o: Offset, alignment: u64) -> Offset {
    let down = offset_aligned_lte(o, alignment);
    if down.0 == o.0 {
        down.sub(alignment)
    } else {
        down
    }
}

/// The raw sentinel encoded on-arena for "no node". Alignment of node
/// allocations must exceed 1 so this value can never collide with a real
/// offset.
pub(crate) const NIL_OFFSET: u64 = 1;

/// A tagged reference to a BST node: either absent, or a live node at an
/// [`Offset`]. This is the public, safe surface recommended in the design
/// notes in place of comparing raw offsets against the sentinel `1`
/// everywhere; the raw sentinel only appears at the (de)serialization
/// boundary in [`crate::bst`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeRef {
    Nil,
    At(Offset),
}

impl NodeRef {
    #[inline]
    pub fn is_nil(self) -> bool {
        matches!(self, NodeRef::Nil)
    }

    #[inline]
    pub fn offset(self) -> Option<Offset> {
        match self {
            NodeRef::Nil => None,
            NodeRef::At(o) => Some(o),
        }
    }

    #[inline]
    pub(crate) fn to_raw(self) -> u64 {
        match self {
            NodeRef::Nil => NIL_OFFSET,
            NodeRef::At(o) => o.get(),
        }
    }

    #[inline]
    pub(crate) fn from_raw(raw: u64) -> Self {
        if raw == NIL_OFFSET {
            NodeRef::Nil
        } else {
            NodeRef::At(Offset(raw))
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Nil => write!(f, "NodeRef::Nil"),
            NodeRef::At(o) => write!(f, "NodeRef::At({:?})", o),
        }
    }
}

/// The copy-on-write boundary passed to every BST mutation: nodes at or
/// above this offset (in cyclic order) may be mutated in place, nodes below
/// it must be cloned first.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Cutoff(pub Offset);

impl Cutoff {
    /// Offset zero: by convention (see `DESIGN.md`), this means every node
    /// may be mutated in place -- there is no prior persistent reader to
    /// protect.
    #[inline]
    pub fn unrestricted() -> Self {
        Cutoff(Offset::ZERO)
    }

    #[inline]
    pub fn at(o: Offset) -> Self {
        Cutoff(o)
    }

    /// True if a node at `node_offset` may be mutated in place under this
    /// cutoff, i.e. `node_offset >= cutoff`.
    #[inline]
    pub fn allows_mutation_at(self, node_offset: Offset) -> bool {
        self.0 == Offset::ZERO || offset_lte(self.0, node_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmp_respects_half_space() {
        let a = Offset(10);
        let b = Offset(20);
        assert_eq!(offset_cmp(a, b), Ordering::Less);
        assert!(offset_lte(a, b));
        assert!(!offset_lte(b, a));
    }

    #[test]
    fn cmp_wraps_around() {
        let a = Offset(u64::MAX - 2);
        let b = Offset(3);
        // b is "after" a once you cross the wrap, distance is small (5)
        assert_eq!(offset_cmp(a, b), Ordering::Less);
        assert!(offset_lte(a, b));
    }

    #[test]
    fn align_helpers() {
        assert_eq!(offset_aligned_gte(Offset(5), 8), Offset(8));
        assert_eq!(offset_aligned_gte(Offset(8), 8), Offset(8));
        assert_eq!(offset_aligned_lte(Offset(9), 8), Offset(8));
        assert_eq!(offset_aligned_lt(Offset(8), 8), Offset(0));
        assert_eq!(offset_aligned_lt(Offset(9), 8), Offset(8));
    }

    #[test]
    fn cutoff_zero_is_unrestricted() {
        let c = Cutoff::unrestricted();
        assert!(c.allows_mutation_at(Offset(0)));
        assert!(c.allows_mutation_at(Offset(12345)));
    }

    #[test]
    fn noderef_raw_roundtrip() {
        assert!(NodeRef::from_raw(NIL_OFFSET).is_nil());
        let r = NodeRef::At(Offset(64));
        assert_eq!(NodeRef::from_raw(r.to_raw()), r);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn cmp_is_consistent_with_small_forward_steps(base: u64, step in 1u64..(HALF - 1)) {
            let a = Offset(base);
            let b = a.add(step);
            prop_assert_eq!(offset_cmp(a, b), Ordering::Less);
            prop_assert!(offset_lte(a, b));
            prop_assert!(!offset_lte(b, a));
        }

        #[test]
        fn align_up_is_idempotent_and_never_smaller(raw: u64, shift in 0u32..6) {
            let alignment = 1u64 << shift;
            let o = Offset(raw);
            let aligned = o.align_up(alignment);
            prop_assert!(aligned.is_aligned(alignment));
            prop_assert_eq!(aligned.align_up(alignment), aligned);
        }
    }
}
