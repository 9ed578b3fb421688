//! Persistent, append-oriented data structures over a continuous ring buffer.
//!
//! A [`cb::Cb`] is a power-of-two ring of bytes mapped twice in succession so
//! that any range up to its own size can always be read back as one
//! contiguous slice. [`region::Region`] carves fixed-size allocations out of
//! a `Cb`. [`bst`] is a persistent left-leaning red-black tree addressed by
//! [`offset::Offset`] rather than pointers, so a tree root from five minutes
//! ago is still a valid, readable value as long as nothing below its
//! [`offset::Cutoff`] has been reused. [`map::Map`] layers an append-only
//! command log on top of the tree so that `set`/`delete` never pay the cost
//! of a rebalance, deferring that work to an explicit [`map::consolidate`].
//!
//! The [`structmap`] module (behind the default-on `structmap` feature) is an
//! independent 16-way trie from 64-bit ids to offsets, for callers that want
//! a flatter index than the tree.

//#![deny(missing_docs)]

pub mod bst;
pub mod cb;
pub mod error;
pub mod hash;
pub mod map;
pub mod offset;
pub mod os;
pub mod region;
#[cfg(feature = "structmap")]
pub mod structmap;
pub mod term;

pub use crate::bst::{bst_cmp, bst_contains_key, bst_delete, bst_hash, bst_insert, bst_lookup, bst_print, bst_render, bst_size, bst_traverse};
pub use crate::cb::{Cb, Flags, Params};
pub use crate::error::{Error, Input, Operation, Result};
pub use crate::hash::TreeHasher;
pub use crate::map::{consolidate, kv_delete, kv_lookup, kv_set, Map};
pub use crate::offset::{Cutoff, NodeRef, Offset};
pub use crate::os::page_size;
pub use crate::region::{Region, RegionFlags};
#[cfg(feature = "structmap")]
pub use crate::structmap::{struct_delete, struct_insert, struct_lookup};
pub use crate::term::Term;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_set_lookup_consolidate() {
        let mut cb = Cb::create(Params::new(1 << 20)).unwrap();
        let mut map = Map::init();
        kv_set(&mut cb, &mut map, Term::new(1), Term::new(100)).unwrap();
        kv_set(&mut cb, &mut map, Term::new(2), Term::new(200)).unwrap();
        kv_delete(&mut cb, &mut map, Term::new(1)).unwrap();
        consolidate(&mut cb, &mut map).unwrap();
        kv_set(&mut cb, &mut map, Term::new(3), Term::new(300)).unwrap();

        assert!(kv_lookup(&cb, &map, Term::new(1)).is_err());
        assert_eq!(kv_lookup(&cb, &map, Term::new(2)).unwrap(), Term::new(200));
        assert_eq!(kv_lookup(&cb, &map, Term::new(3)).unwrap(), Term::new(300));
    }
}
