//! An optional 16-way HAMT from 64-bit ids to arena [`Offset`]s, persistent
//! under the same cutoff discipline as [`crate::bst`].
//!
//! Each level branches on one nibble (4 bits) of the key, so a full key is
//! resolved in exactly 16 levels with no collision handling needed -- two
//! distinct 64-bit keys can never land in the same leaf slot. This module is
//! independent of [`crate::map`]; nothing wires it in by default.

use zerocopy::{AsBytes, FromBytes};

use crate::cb::Cb;
use crate::error::{Error, Input, Operation, Result};
use crate::offset::{Cutoff, NodeRef, Offset, NIL_OFFSET};

const FANOUT: usize = 16;
const DEPTH: u32 = 16;

#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
struct TrieNode {
    children: [u64; FANOUT],
}

const NODE_SIZE: usize = std::mem::size_of::<TrieNode>();
const NODE_ALIGN: u64 = std::mem::align_of::<TrieNode>() as u64;

impl TrieNode {
    fn empty() -> Self {
        TrieNode {
            children: [NIL_OFFSET; FANOUT],
        }
    }
}

fn nibble(key: u64, depth: u32) -> usize {
    ((key >> (60 - depth * 4)) & 0xf) as usize
}

fn read_node(cb: &Cb, off: Offset) -> Result<TrieNode> {
    let bytes = cb.at(off, NODE_SIZE)?;
    TrieNode::read_from(bytes).ok_or_else(|| Error::input(Operation::BstLookup, Input::BadParam))
}

fn write_node(cb: &mut Cb, off: Offset, node: &TrieNode) -> Result<()> {
    cb.memcpy_in(off, node.as_bytes())
}

fn alloc_node(cb: &mut Cb, node: TrieNode) -> Result<Offset> {
    let off = cb.memalign(NODE_SIZE, NODE_ALIGN)?;
    cb.memcpy_in(off, node.as_bytes())?;
    Ok(off)
}

fn writable(cb: &mut Cb, cutoff: Cutoff, off: Offset) -> Result<Offset> {
    if cutoff.allows_mutation_at(off) {
        Ok(off)
    } else {
        let node = read_node(cb, off)?;
        alloc_node(cb, node)
    }
}

fn insert_at(cb: &mut Cb, cutoff: Cutoff, node: NodeRef, depth: u32, key: u64, value: Offset) -> Result<NodeRef> {
    let off = match node {
        NodeRef::Nil => alloc_node(cb, TrieNode::empty())?,
        NodeRef::At(off) => off,
    };
    let orig = read_node(cb, off)?;
    let idx = nibble(key, depth);
    let mut new_node = orig;

    if depth == DEPTH - 1 {
        new_node.children[idx] = value.get();
    } else {
        let child = NodeRef::from_raw(orig.children[idx]);
        let new_child = insert_at(cb, cutoff, child, depth + 1, key, value)?;
        new_node.children[idx] = new_child.to_raw();
    }

    let w = writable(cb, cutoff, off)?;
    write_node(cb, w, &new_node)?;
    Ok(NodeRef::At(w))
}

/// Inserts (or overwrites) the mapping `key -> value`.
pub fn struct_insert(cb: &mut Cb, root: NodeRef, cutoff: Cutoff, key: u64, value: Offset) -> Result<NodeRef> {
    insert_at(cb, cutoff, root, 0, key, value)
}

/// Looks up `key`, returning [`Error::not_found`] if absent.
pub fn struct_lookup(cb: &Cb, root: NodeRef, key: u64) -> Result<Offset> {
    let mut node = root;
    for depth in 0..DEPTH {
        let off = match node {
            NodeRef::Nil => return Err(Error::not_found(Operation::BstLookup)),
            NodeRef::At(off) => off,
        };
        let trie = read_node(cb, off)?;
        let idx = nibble(key, depth);
        if depth == DEPTH - 1 {
            let raw = trie.children[idx];
            return if raw == NIL_OFFSET {
                Err(Error::not_found(Operation::BstLookup))
            } else {
                Ok(Offset::new(raw))
            };
        }
        node = NodeRef::from_raw(trie.children[idx]);
    }
    unreachable!("loop always returns by the last depth")
}

fn delete_at(cb: &mut Cb, cutoff: Cutoff, node: NodeRef, depth: u32, key: u64) -> Result<NodeRef> {
    let off = match node {
        NodeRef::Nil => return Err(Error::not_found(Operation::BstDelete)),
        NodeRef::At(off) => off,
    };
    let orig = read_node(cb, off)?;
    let idx = nibble(key, depth);
    let mut new_node = orig;

    if depth == DEPTH - 1 {
        if orig.children[idx] == NIL_OFFSET {
            return Err(Error::not_found(Operation::BstDelete));
        }
        new_node.children[idx] = NIL_OFFSET;
    } else {
        let child = NodeRef::from_raw(orig.children[idx]);
        let new_child = delete_at(cb, cutoff, child, depth + 1, key)?;
        new_node.children[idx] = new_child.to_raw();
    }

    let w = writable(cb, cutoff, off)?;
    write_node(cb, w, &new_node)?;
    Ok(NodeRef::At(w))
}

/// Removes `key`, returning [`Error::not_found`] if it was absent.
pub fn struct_delete(cb: &mut Cb, root: NodeRef, cutoff: Cutoff, key: u64) -> Result<NodeRef> {
    delete_at(cb, cutoff, root, 0, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cb::{Cb, Params};

    fn new_cb() -> Cb {
        Cb::create(Params::new(1 << 20)).unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut cb = new_cb();
        let cutoff = Cutoff::unrestricted();
        let mut root = NodeRef::Nil;
        for id in [1u64, 0xffff_ffff, 42, 7, 1 << 40] {
            root = struct_insert(&mut cb, root, cutoff, id, Offset::new(id * 8 + 8)).unwrap();
        }
        for id in [1u64, 0xffff_ffff, 42, 7, 1 << 40] {
            let got = struct_lookup(&cb, root, id).unwrap();
            assert_eq!(got, Offset::new(id * 8 + 8));
        }
        assert!(struct_lookup(&cb, root, 999).is_err());
    }

    #[test]
    fn delete_removes_mapping() {
        let mut cb = new_cb();
        let cutoff = Cutoff::unrestricted();
        let root = struct_insert(&mut cb, NodeRef::Nil, cutoff, 5, Offset::new(80)).unwrap();
        let root = struct_delete(&mut cb, root, cutoff, 5).unwrap();
        assert!(struct_lookup(&cb, root, 5).is_err());
    }

    #[test]
    fn persists_under_cutoff() {
        let mut cb = new_cb();
        let root = struct_insert(&mut cb, NodeRef::Nil, Cutoff::unrestricted(), 1, Offset::new(64)).unwrap();
        let cutoff = Cutoff::at(cb.cursor());
        let _new_root = struct_insert(&mut cb, root, cutoff, 2, Offset::new(72)).unwrap();
        assert_eq!(struct_lookup(&cb, root, 1).unwrap(), Offset::new(64));
        assert!(struct_lookup(&cb, root, 2).is_err());
    }
}
