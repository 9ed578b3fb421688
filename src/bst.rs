//! A persistent (copy-on-write) left-leaning red-black tree addressed by
//! arena offsets.
//!
//! Every mutating operation takes an explicit [`Cutoff`]: nodes at or above
//! the cutoff offset belong to the caller alone and may be updated in place;
//! nodes below it may still be visible to an older, already-published root,
//! so they are cloned before any field changes. This is the whole of the
//! persistence mechanism -- there is no separate "snapshot" type, only roots
//! and the cutoff under which they were built.
//!
//! The balancing algorithm is Sedgewick's left-leaning red-black BST: a
//! node's `color` field records the color of the link *from its parent*, the
//! root is always forced black, and `flip_colors`/`rotate_left`/
//! `rotate_right`/`move_red_left`/`move_red_right` are the same five helpers
//! used by the textbook imperative version, just returning a (possibly new)
//! offset instead of mutating a `Node` reference in place.

use std::cmp::Ordering;
use std::fmt::Write as _;

use zerocopy::{AsBytes, FromBytes};

use crate::cb::Cb;
use crate::error::{Error, Input, Operation, Result};
use crate::hash::TreeHasher;
use crate::offset::{Cutoff, NodeRef, Offset};
use crate::term::Term;

const RED: u8 = 0;
const BLACK: u8 = 1;

#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
struct RawNode {
    key: u64,
    value: u64,
    left: u64,
    right: u64,
    color: u8,
    _pad: [u8; 7],
}

const NODE_SIZE: usize = std::mem::size_of::<RawNode>();
const NODE_ALIGN: u64 = std::mem::align_of::<RawNode>() as u64;

impl RawNode {
    fn leaf(key: Term, value: Term) -> Self {
        RawNode {
            key: key.get(),
            value: value.get(),
            left: crate::offset::NIL_OFFSET,
            right: crate::offset::NIL_OFFSET,
            color: RED,
            _pad: [0; 7],
        }
    }
}

fn read_node(cb: &Cb, off: Offset) -> Result<RawNode> {
    let bytes = cb.at(off, NODE_SIZE)?;
    RawNode::read_from(bytes).ok_or_else(|| Error::input(Operation::BstLookup, Input::BadParam))
}

fn write_node(cb: &mut Cb, off: Offset, node: &RawNode) -> Result<()> {
    cb.memcpy_in(off, node.as_bytes())
}

fn alloc_node(cb: &mut Cb, node: RawNode) -> Result<Offset> {
    let off = cb.memalign(NODE_SIZE, NODE_ALIGN)?;
    cb.memcpy_in(off, node.as_bytes())?;
    Ok(off)
}

/// Returns an offset that may be mutated in place under `cutoff`: `off`
/// itself if it is already at or above the cutoff, otherwise a fresh clone
/// of the node at `off`.
fn writable(cb: &mut Cb, cutoff: Cutoff, off: Offset) -> Result<Offset> {
    if cutoff.allows_mutation_at(off) {
        Ok(off)
    } else {
        let node = read_node(cb, off)?;
        alloc_node(cb, node)
    }
}

fn offset_of(raw: u64) -> Offset {
    match NodeRef::from_raw(raw) {
        NodeRef::At(off) => off,
        NodeRef::Nil => unreachable!("offset_of called on a nil child"),
    }
}

fn is_red(cb: &Cb, node: NodeRef) -> Result<bool> {
    match node {
        NodeRef::Nil => Ok(false),
        NodeRef::At(off) => Ok(read_node(cb, off)?.color == RED),
    }
}

fn set_child(cb: &mut Cb, cutoff: Cutoff, h_off: Offset, child: NodeRef, left: bool) -> Result<Offset> {
    let mut node = read_node(cb, h_off)?;
    let w = writable(cb, cutoff, h_off)?;
    if left {
        node.left = child.to_raw();
    } else {
        node.right = child.to_raw();
    }
    write_node(cb, w, &node)?;
    Ok(w)
}

fn rotate_left(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let mut h = read_node(cb, h_off)?;
    let x_off = offset_of(h.right);
    let mut x = read_node(cb, x_off)?;
    let h_w = writable(cb, cutoff, h_off)?;
    let x_w = writable(cb, cutoff, x_off)?;
    h.right = x.left;
    x.left = NodeRef::At(h_w).to_raw();
    x.color = h.color;
    h.color = RED;
    write_node(cb, h_w, &h)?;
    write_node(cb, x_w, &x)?;
    Ok(x_w)
}

fn rotate_right(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let mut h = read_node(cb, h_off)?;
    let x_off = offset_of(h.left);
    let mut x = read_node(cb, x_off)?;
    let h_w = writable(cb, cutoff, h_off)?;
    let x_w = writable(cb, cutoff, x_off)?;
    h.left = x.right;
    x.right = NodeRef::At(h_w).to_raw();
    x.color = h.color;
    h.color = RED;
    write_node(cb, h_w, &h)?;
    write_node(cb, x_w, &x)?;
    Ok(x_w)
}

fn flip_colors(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let mut h = read_node(cb, h_off)?;
    let mut l = read_node(cb, offset_of(h.left))?;
    let mut r = read_node(cb, offset_of(h.right))?;

    let h_w = writable(cb, cutoff, h_off)?;
    let l_w = writable(cb, cutoff, offset_of(h.left))?;
    let r_w = writable(cb, cutoff, offset_of(h.right))?;

    h.color = BLACK - h.color + RED; // flip RED<->BLACK (0<->1)
    l.color = BLACK - l.color + RED;
    r.color = BLACK - r.color + RED;
    h.left = NodeRef::At(l_w).to_raw();
    h.right = NodeRef::At(r_w).to_raw();

    write_node(cb, l_w, &l)?;
    write_node(cb, r_w, &r)?;
    write_node(cb, h_w, &h)?;
    Ok(h_w)
}

fn balance(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let mut h_off = h_off;
    let mut h = read_node(cb, h_off)?;

    if is_red(cb, NodeRef::from_raw(h.right))? && !is_red(cb, NodeRef::from_raw(h.left))? {
        h_off = rotate_left(cb, cutoff, h_off)?;
        h = read_node(cb, h_off)?;
    }
    if is_red(cb, NodeRef::from_raw(h.left))? {
        let left = read_node(cb, offset_of(h.left))?;
        if is_red(cb, NodeRef::from_raw(left.left))? {
            h_off = rotate_right(cb, cutoff, h_off)?;
            h = read_node(cb, h_off)?;
        }
    }
    if is_red(cb, NodeRef::from_raw(h.left))? && is_red(cb, NodeRef::from_raw(h.right))? {
        h_off = flip_colors(cb, cutoff, h_off)?;
    }
    Ok(h_off)
}

fn set_color(cb: &mut Cb, cutoff: Cutoff, off: Offset, color: u8) -> Result<Offset> {
    let mut node = read_node(cb, off)?;
    if node.color == color {
        return Ok(off);
    }
    let w = writable(cb, cutoff, off)?;
    node.color = color;
    write_node(cb, w, &node)?;
    Ok(w)
}

fn insert(cb: &mut Cb, cutoff: Cutoff, h: NodeRef, key: Term, value: Term) -> Result<NodeRef> {
    let off = match h {
        NodeRef::Nil => {
            let off = alloc_node(cb, RawNode::leaf(key, value))?;
            return Ok(NodeRef::At(off));
        }
        NodeRef::At(off) => off,
    };

    let orig = read_node(cb, off)?;
    let mut new_node = orig;
    match key.get().cmp(&orig.key) {
        Ordering::Less => {
            let new_left = insert(cb, cutoff, NodeRef::from_raw(orig.left), key, value)?;
            new_node.left = new_left.to_raw();
        }
        Ordering::Greater => {
            let new_right = insert(cb, cutoff, NodeRef::from_raw(orig.right), key, value)?;
            new_node.right = new_right.to_raw();
        }
        Ordering::Equal => {
            new_node.value = value.get();
        }
    }

    let w = writable(cb, cutoff, off)?;
    write_node(cb, w, &new_node)?;
    Ok(NodeRef::At(balance(cb, cutoff, w)?))
}

/// Inserts `key`/`value`, overwriting the existing value if `key` is already
/// present. Returns the new root; the old root (and everything reachable
/// only from nodes below `cutoff`) remains valid and untouched.
pub fn bst_insert(cb: &mut Cb, root: NodeRef, cutoff: Cutoff, key: Term, value: Term) -> Result<NodeRef> {
    let new_root = insert(cb, cutoff, root, key, value)?;
    match new_root {
        NodeRef::Nil => Ok(NodeRef::Nil),
        NodeRef::At(off) => Ok(NodeRef::At(set_color(cb, cutoff, off, BLACK)?)),
    }
}

/// Looks up `key`, returning [`Error::not_found`] if it is absent.
pub fn bst_lookup(cb: &Cb, root: NodeRef, key: Term) -> Result<Term> {
    let mut cur = root;
    loop {
        match cur {
            NodeRef::Nil => return Err(Error::not_found(Operation::BstLookup)),
            NodeRef::At(off) => {
                let node = read_node(cb, off)?;
                cur = match key.get().cmp(&node.key) {
                    Ordering::Equal => return Ok(Term::new(node.value)),
                    Ordering::Less => NodeRef::from_raw(node.left),
                    Ordering::Greater => NodeRef::from_raw(node.right),
                };
            }
        }
    }
}

/// True if `key` is present in the tree.
pub fn bst_contains_key(cb: &Cb, root: NodeRef, key: Term) -> bool {
    bst_lookup(cb, root, key).is_ok()
}

fn min_offset(cb: &Cb, h_off: Offset) -> Result<Offset> {
    let mut cur = h_off;
    loop {
        let node = read_node(cb, cur)?;
        match NodeRef::from_raw(node.left) {
            NodeRef::Nil => return Ok(cur),
            NodeRef::At(l) => cur = l,
        }
    }
}

fn move_red_left(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let h_off = flip_colors(cb, cutoff, h_off)?;
    let h = read_node(cb, h_off)?;
    let right_off = offset_of(h.right);
    let right = read_node(cb, right_off)?;
    if is_red(cb, NodeRef::from_raw(right.left))? {
        let new_right = rotate_right(cb, cutoff, right_off)?;
        let h_off = set_child(cb, cutoff, h_off, NodeRef::At(new_right), false)?;
        let h_off = rotate_left(cb, cutoff, h_off)?;
        flip_colors(cb, cutoff, h_off)
    } else {
        Ok(h_off)
    }
}

fn move_red_right(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<Offset> {
    let h_off = flip_colors(cb, cutoff, h_off)?;
    let h = read_node(cb, h_off)?;
    let left_off = offset_of(h.left);
    let left = read_node(cb, left_off)?;
    if is_red(cb, NodeRef::from_raw(left.left))? {
        let h_off = rotate_right(cb, cutoff, h_off)?;
        flip_colors(cb, cutoff, h_off)
    } else {
        Ok(h_off)
    }
}

fn delete_min(cb: &mut Cb, cutoff: Cutoff, h_off: Offset) -> Result<NodeRef> {
    let node = read_node(cb, h_off)?;
    if matches!(NodeRef::from_raw(node.left), NodeRef::Nil) {
        return Ok(NodeRef::Nil);
    }

    let mut h_off = h_off;
    let left_off = offset_of(node.left);
    let left = read_node(cb, left_off)?;
    if !is_red(cb, NodeRef::from_raw(node.left))? && !is_red(cb, NodeRef::from_raw(left.left))? {
        h_off = move_red_left(cb, cutoff, h_off)?;
    }

    let node = read_node(cb, h_off)?;
    let new_left = delete_min(cb, cutoff, offset_of(node.left))?;
    let h_off = set_child(cb, cutoff, h_off, new_left, true)?;
    Ok(NodeRef::At(balance(cb, cutoff, h_off)?))
}

fn delete(cb: &mut Cb, cutoff: Cutoff, h_off: Offset, key: Term) -> Result<NodeRef> {
    let node = read_node(cb, h_off)?;
    let mut h_off = h_off;

    if key.get() < node.key {
        match NodeRef::from_raw(node.left) {
            NodeRef::Nil => return Err(Error::not_found(Operation::BstDelete)),
            NodeRef::At(left_off) => {
                let left = read_node(cb, left_off)?;
                if !is_red(cb, NodeRef::from_raw(node.left))? && !is_red(cb, NodeRef::from_raw(left.left))? {
                    h_off = move_red_left(cb, cutoff, h_off)?;
                }
            }
        }
        let node = read_node(cb, h_off)?;
        let new_left = delete(cb, cutoff, offset_of(node.left), key)?;
        h_off = set_child(cb, cutoff, h_off, new_left, true)?;
    } else {
        let node = read_node(cb, h_off)?;
        if is_red(cb, NodeRef::from_raw(node.left))? {
            h_off = rotate_right(cb, cutoff, h_off)?;
        }
        let node = read_node(cb, h_off)?;
        if key.get() == node.key && matches!(NodeRef::from_raw(node.right), NodeRef::Nil) {
            return Ok(NodeRef::Nil);
        }
        let node = read_node(cb, h_off)?;
        match NodeRef::from_raw(node.right) {
            NodeRef::Nil => return Err(Error::not_found(Operation::BstDelete)),
            NodeRef::At(right_off) => {
                let right = read_node(cb, right_off)?;
                if !is_red(cb, NodeRef::from_raw(node.right))? && !is_red(cb, NodeRef::from_raw(right.left))? {
                    h_off = move_red_right(cb, cutoff, h_off)?;
                }
            }
        }
        let node = read_node(cb, h_off)?;
        if key.get() == node.key {
            let right_off = offset_of(node.right);
            let succ_off = min_offset(cb, right_off)?;
            let succ = read_node(cb, succ_off)?;
            let new_right = delete_min(cb, cutoff, right_off)?;

            let mut updated = read_node(cb, h_off)?;
            let w = writable(cb, cutoff, h_off)?;
            updated.key = succ.key;
            updated.value = succ.value;
            updated.right = new_right.to_raw();
            write_node(cb, w, &updated)?;
            h_off = w;
        } else {
            let right_off = offset_of(node.right);
            let new_right = delete(cb, cutoff, right_off, key)?;
            h_off = set_child(cb, cutoff, h_off, new_right, false)?;
        }
    }

    Ok(NodeRef::At(balance(cb, cutoff, h_off)?))
}

/// Deletes `key`, returning [`Error::not_found`] if it is absent.
pub fn bst_delete(cb: &mut Cb, root: NodeRef, cutoff: Cutoff, key: Term) -> Result<NodeRef> {
    let root_off = match root {
        NodeRef::Nil => return Err(Error::not_found(Operation::BstDelete)),
        NodeRef::At(off) => off,
    };

    let node = read_node(cb, root_off)?;
    let mut root_off = root_off;
    if !is_red(cb, NodeRef::from_raw(node.left))? && !is_red(cb, NodeRef::from_raw(node.right))? {
        root_off = set_color(cb, cutoff, root_off, RED)?;
    }

    let new_root = delete(cb, cutoff, root_off, key)?;
    match new_root {
        NodeRef::Nil => Ok(NodeRef::Nil),
        NodeRef::At(off) => Ok(NodeRef::At(set_color(cb, cutoff, off, BLACK)?)),
    }
}

/// Visits every `(key, value)` pair in ascending key order.
pub fn bst_traverse<F: FnMut(Term, Term)>(cb: &Cb, root: NodeRef, f: &mut F) -> Result<()> {
    if let NodeRef::At(off) = root {
        let node = read_node(cb, off)?;
        bst_traverse(cb, NodeRef::from_raw(node.left), f)?;
        f(Term::new(node.key), Term::new(node.value));
        bst_traverse(cb, NodeRef::from_raw(node.right), f)?;
    }
    Ok(())
}

/// Number of entries reachable from `root`.
pub fn bst_size(cb: &Cb, root: NodeRef) -> Result<usize> {
    let mut n = 0;
    bst_traverse(cb, root, &mut |_, _| n += 1)?;
    Ok(n)
}

/// True if the two roots (each resolved against its own arena) hold the same
/// ordered sequence of entries.
pub fn bst_cmp(cb_a: &Cb, root_a: NodeRef, cb_b: &Cb, root_b: NodeRef) -> Result<bool> {
    let mut a = Vec::new();
    bst_traverse(cb_a, root_a, &mut |k, v| a.push((k.get(), v.get())))?;
    let mut b = Vec::new();
    bst_traverse(cb_b, root_b, &mut |k, v| b.push((k.get(), v.get())))?;
    Ok(a == b)
}

/// A deterministic hash over the tree's ordered `(key, value)` sequence. Two
/// trees with identical contents hash identically regardless of shape.
pub fn bst_hash(cb: &Cb, root: NodeRef) -> Result<u64> {
    let mut hasher = TreeHasher::new();
    bst_traverse(cb, root, &mut |k, v| hasher.write_pair(k, v))?;
    Ok(hasher.finish())
}

fn render(cb: &Cb, node: NodeRef, depth: usize, out: &mut String) -> Result<()> {
    if let NodeRef::At(off) = node {
        let n = read_node(cb, off)?;
        render(cb, NodeRef::from_raw(n.right), depth + 1, out)?;
        let color = if n.color == RED { 'R' } else { 'B' };
        let _ = writeln!(out, "{}{} {} -> {}", "  ".repeat(depth), color, n.key, n.value);
        render(cb, NodeRef::from_raw(n.left), depth + 1, out)?;
    }
    Ok(())
}

/// Renders the tree as indented, right-to-left text for debugging.
pub fn bst_render(cb: &Cb, root: NodeRef) -> Result<String> {
    let mut out = String::new();
    render(cb, root, 0, &mut out)?;
    Ok(out)
}

/// Prints [`bst_render`]'s output to standard out.
pub fn bst_print(cb: &Cb, root: NodeRef) -> Result<()> {
    print!("{}", bst_render(cb, root)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cb::{Cb, Params};

    fn new_cb() -> Cb {
        Cb::create(Params::new(1 << 20)).unwrap()
    }

    #[test]
    fn insert_and_lookup_round_trip() {
        let mut cb = new_cb();
        let mut root = NodeRef::Nil;
        let cutoff = Cutoff::unrestricted();
        for k in [5u64, 2, 8, 1, 9, 3, 7, 4, 6, 0] {
            root = bst_insert(&mut cb, root, cutoff, Term::new(k), Term::new(k * 10)).unwrap();
        }
        for k in 0u64..10 {
            assert_eq!(bst_lookup(&cb, root, Term::new(k)).unwrap(), Term::new(k * 10));
        }
        assert!(bst_lookup(&cb, root, Term::new(100)).is_err());
    }

    #[test]
    fn traverse_is_strictly_ascending() {
        let mut cb = new_cb();
        let mut root = NodeRef::Nil;
        let cutoff = Cutoff::unrestricted();
        for k in [40u64, 10, 30, 20, 50, 5, 35] {
            root = bst_insert(&mut cb, root, cutoff, Term::new(k), Term::new(k)).unwrap();
        }
        let mut seen = Vec::new();
        bst_traverse(&cb, root, &mut |k, _| seen.push(k.get())).unwrap();
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted);
        assert_eq!(bst_size(&cb, root).unwrap(), 7);
    }

    #[test]
    fn overwrite_existing_key() {
        let mut cb = new_cb();
        let cutoff = Cutoff::unrestricted();
        let root = bst_insert(&mut cb, NodeRef::Nil, cutoff, Term::new(1), Term::new(100)).unwrap();
        let root = bst_insert(&mut cb, root, cutoff, Term::new(1), Term::new(200)).unwrap();
        assert_eq!(bst_lookup(&cb, root, Term::new(1)).unwrap(), Term::new(200));
        assert_eq!(bst_size(&cb, root).unwrap(), 1);
    }

    #[test]
    fn delete_absent_key_is_not_found() {
        let mut cb = new_cb();
        let cutoff = Cutoff::unrestricted();
        let root = bst_insert(&mut cb, NodeRef::Nil, cutoff, Term::new(1), Term::new(1)).unwrap();
        assert!(bst_delete(&mut cb, root, cutoff, Term::new(99)).is_err());
    }

    #[test]
    fn insert_then_delete_all_empties_tree() {
        let mut cb = new_cb();
        let cutoff = Cutoff::unrestricted();
        let mut root = NodeRef::Nil;
        let keys: Vec<u64> = (0..15).collect();
        for &k in &keys {
            root = bst_insert(&mut cb, root, cutoff, Term::new(k), Term::new(k)).unwrap();
        }
        for &k in &keys {
            root = bst_delete(&mut cb, root, cutoff, Term::new(k)).unwrap();
            assert!(!bst_contains_key(&cb, root, Term::new(k)));
        }
        assert!(matches!(root, NodeRef::Nil));
    }

    #[test]
    fn persists_under_cutoff() {
        let mut cb = new_cb();
        let mut root = NodeRef::Nil;
        root = bst_insert(&mut cb, root, Cutoff::unrestricted(), Term::new(1), Term::new(1)).unwrap();
        root = bst_insert(&mut cb, root, Cutoff::unrestricted(), Term::new(2), Term::new(2)).unwrap();

        // Anything built so far is now "published"; further inserts must not
        // mutate it in place.
        let published_root = root;
        let mut published_contents = Vec::new();
        bst_traverse(&cb, published_root, &mut |k, v| published_contents.push((k.get(), v.get()))).unwrap();

        let cutoff = Cutoff::at(cb.cursor());
        let _new_root = bst_insert(&mut cb, root, cutoff, Term::new(3), Term::new(3)).unwrap();

        let mut still_published = Vec::new();
        bst_traverse(&cb, published_root, &mut |k, v| still_published.push((k.get(), v.get()))).unwrap();
        assert_eq!(published_contents, still_published);
    }

    #[test]
    fn hash_is_order_independent_of_insertion_sequence() {
        let mut cb_a = new_cb();
        let mut cb_b = new_cb();
        let cutoff = Cutoff::unrestricted();
        let mut root_a = NodeRef::Nil;
        for k in [1u64, 2, 3, 4, 5] {
            root_a = bst_insert(&mut cb_a, root_a, cutoff, Term::new(k), Term::new(k)).unwrap();
        }
        let mut root_b = NodeRef::Nil;
        for k in [5u64, 4, 3, 2, 1] {
            root_b = bst_insert(&mut cb_b, root_b, cutoff, Term::new(k), Term::new(k)).unwrap();
        }
        assert_eq!(bst_hash(&cb_a, root_a).unwrap(), bst_hash(&cb_b, root_b).unwrap());
        assert!(bst_cmp(&cb_a, root_a, &cb_b, root_b).unwrap());
    }

    use proptest::prelude::*;
    use std::collections::BTreeMap;

    proptest! {
        #[test]
        fn matches_a_reference_ordered_map(ops in proptest::collection::vec((any::<bool>(), 0u64..40), 1..200)) {
            let mut cb = new_cb();
            let cutoff = Cutoff::unrestricted();
            let mut root = NodeRef::Nil;
            let mut reference: BTreeMap<u64, u64> = BTreeMap::new();

            for (i, (is_set, key)) in ops.iter().enumerate() {
                if *is_set {
                    let value = *key * 1000 + i as u64;
                    root = bst_insert(&mut cb, root, cutoff, Term::new(*key), Term::new(value)).unwrap();
                    reference.insert(*key, value);
                } else if reference.contains_key(key) {
                    root = bst_delete(&mut cb, root, cutoff, Term::new(*key)).unwrap();
                    reference.remove(key);
                }
            }

            let mut seen = Vec::new();
            bst_traverse(&cb, root, &mut |k, v| seen.push((k.get(), v.get()))).unwrap();
            let expected: Vec<(u64, u64)> = reference.into_iter().collect();
            prop_assert_eq!(seen, expected);
        }

        #[test]
        fn every_published_root_keeps_strictly_ascending_order(keys in proptest::collection::vec(0u64..200, 0..80)) {
            let mut cb = new_cb();
            let cutoff = Cutoff::unrestricted();
            let mut root = NodeRef::Nil;
            for k in keys {
                root = bst_insert(&mut cb, root, cutoff, Term::new(k), Term::new(k)).unwrap();
                let mut seen = Vec::new();
                bst_traverse(&cb, root, &mut |k, _| seen.push(k.get())).unwrap();
                let mut sorted = seen.clone();
                sorted.sort_unstable();
                sorted.dedup();
                prop_assert_eq!(seen, sorted);
            }
        }
    }
}
