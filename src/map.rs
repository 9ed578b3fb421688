//! The append-only command log and the lazily-consolidated lookup map built
//! on top of it.
//!
//! `kv_set`/`kv_delete` only ever append a record; they never touch a
//! [`crate::bst`] node. A lookup walks the chain from the newest record
//! backward, returning the first decisive answer it finds: a `Set` record
//! for the key, a `Delete` record for the key (absence), or a `BstRoot`
//! record, which hands the question off to the tree and terminates the walk
//! unconditionally -- nothing older than a `BstRoot` record is ever
//! reachable past it, and the single-threaded model means nothing races the
//! walk, so there is no ambiguity to resolve here. [`consolidate`] is the
//! only operation that touches the tree: it folds the whole chain into a
//! fresh root and appends a new `BstRoot` record, after which the chain
//! before it is dead weight future lookups no longer need to walk.

use std::collections::{BTreeMap, HashMap};

use zerocopy::{AsBytes, FromBytes};

use crate::bst;
use crate::cb::Cb;
use crate::error::{Error, Input, Operation, Result};
use crate::offset::{Cutoff, NodeRef, Offset};
use crate::term::Term;

const KIND_SET: u8 = 0;
const KIND_DELETE: u8 = 1;
const KIND_BST_ROOT: u8 = 2;

#[repr(C)]
#[derive(Copy, Clone, AsBytes, FromBytes)]
struct RawCommand {
    kind: u8,
    _pad: [u8; 7],
    prev: u64,
    key: u64,
    value: u64,
}

const COMMAND_SIZE: usize = std::mem::size_of::<RawCommand>();
const COMMAND_ALIGN: u64 = std::mem::align_of::<RawCommand>() as u64;

fn read_command(cb: &Cb, off: Offset) -> Result<RawCommand> {
    let bytes = cb.at(off, COMMAND_SIZE)?;
    RawCommand::read_from(bytes).ok_or_else(|| Error::input(Operation::Consolidate, Input::BadParam))
}

fn append_command(cb: &mut Cb, cmd: RawCommand) -> Result<Offset> {
    let off = cb.memalign(COMMAND_SIZE, COMMAND_ALIGN)?;
    cb.memcpy_in(off, cmd.as_bytes())?;
    Ok(off)
}

/// A lazily-consolidated key/value map: an append-only command chain with an
/// optional tree root to shadow.
pub struct Map {
    tail: NodeRef,
}

impl Map {
    /// Creates a new, empty map.
    pub fn init() -> Map {
        Map { tail: NodeRef::Nil }
    }

    /// The most recent command record, or `NodeRef::Nil` if nothing has been
    /// appended yet.
    pub fn tail(&self) -> NodeRef {
        self.tail
    }
}

impl Default for Map {
    fn default() -> Self {
        Map::init()
    }
}

/// Sets `key` to `value`, appending a log record. O(1) regardless of map
/// size; the tree is not touched.
pub fn kv_set(cb: &mut Cb, map: &mut Map, key: Term, value: Term) -> Result<()> {
    let cmd = RawCommand {
        kind: KIND_SET,
        _pad: [0; 7],
        prev: map.tail.to_raw(),
        key: key.get(),
        value: value.get(),
    };
    let off = append_command(cb, cmd)?;
    map.tail = NodeRef::At(off);
    Ok(())
}

/// Deletes `key`, appending a tombstone record regardless of whether the key
/// is currently present -- presence is only ever discovered lazily, during a
/// lookup or a traversal.
pub fn kv_delete(cb: &mut Cb, map: &mut Map, key: Term) -> Result<()> {
    let cmd = RawCommand {
        kind: KIND_DELETE,
        _pad: [0; 7],
        prev: map.tail.to_raw(),
        key: key.get(),
        value: 0,
    };
    let off = append_command(cb, cmd)?;
    map.tail = NodeRef::At(off);
    Ok(())
}

/// Looks up `key`, walking the chain from newest to oldest.
pub fn kv_lookup(cb: &Cb, map: &Map, key: Term) -> Result<Term> {
    let mut cur = map.tail;
    loop {
        match cur {
            NodeRef::Nil => return Err(Error::not_found(Operation::BstLookup)),
            NodeRef::At(off) => {
                let cmd = read_command(cb, off)?;
                match cmd.kind {
                    KIND_SET if cmd.key == key.get() => return Ok(Term::new(cmd.value)),
                    KIND_DELETE if cmd.key == key.get() => {
                        return Err(Error::not_found(Operation::BstLookup))
                    }
                    KIND_BST_ROOT => {
                        return bst::bst_lookup(cb, NodeRef::from_raw(cmd.value), key)
                    }
                    _ => cur = NodeRef::from_raw(cmd.prev),
                }
            }
        }
    }
}

/// Visits every live `(key, value)` pair in ascending key order, merging the
/// unconsolidated tail of the command chain with the shadowed tree.
pub fn traverse<F: FnMut(Term, Term)>(cb: &Cb, map: &Map, f: &mut F) -> Result<()> {
    let mut overrides: HashMap<u64, Option<u64>> = HashMap::new();
    let mut root = NodeRef::Nil;
    let mut cur = map.tail;

    loop {
        match cur {
            NodeRef::Nil => break,
            NodeRef::At(off) => {
                let cmd = read_command(cb, off)?;
                match cmd.kind {
                    KIND_SET => {
                        overrides.entry(cmd.key).or_insert(Some(cmd.value));
                    }
                    KIND_DELETE => {
                        overrides.entry(cmd.key).or_insert(None);
                    }
                    KIND_BST_ROOT => {
                        root = NodeRef::from_raw(cmd.value);
                        break;
                    }
                    _ => {}
                }
                cur = NodeRef::from_raw(cmd.prev);
            }
        }
    }

    let mut combined: BTreeMap<u64, u64> = BTreeMap::new();
    bst::bst_traverse(cb, root, &mut |k, v| {
        combined.insert(k.get(), v.get());
    })?;
    for (key, ov) in overrides {
        match ov {
            Some(value) => {
                combined.insert(key, value);
            }
            None => {
                combined.remove(&key);
            }
        }
    }
    for (key, value) in combined {
        f(Term::new(key), Term::new(value));
    }
    Ok(())
}

/// Folds the entire command chain into a freshly built tree and appends a
/// new `BstRoot` record, so future lookups can stop walking the chain as
/// soon as they reach it.
pub fn consolidate(cb: &mut Cb, map: &mut Map) -> Result<()> {
    let mut entries = Vec::new();
    traverse(cb, map, &mut |k, v| entries.push((k, v)))?;

    let cutoff = Cutoff::at(cb.cursor());
    let mut new_root = NodeRef::Nil;
    for (key, value) in entries {
        new_root = bst::bst_insert(cb, new_root, cutoff, key, value)?;
    }

    let cmd = RawCommand {
        kind: KIND_BST_ROOT,
        _pad: [0; 7],
        prev: map.tail.to_raw(),
        key: 0,
        value: new_root.to_raw(),
    };
    let off = append_command(cb, cmd)?;
    map.tail = NodeRef::At(off);
    log::debug!("consolidated map at offset {:?}", off);
    Ok(())
}

/// Prints every live entry, one per line, in ascending key order.
pub fn print(cb: &Cb, map: &Map) -> Result<()> {
    traverse(cb, map, &mut |k, v| println!("{} -> {}", k.get(), v.get()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cb::{Cb, Params};

    fn new_cb() -> Cb {
        Cb::create(Params::new(1 << 20)).unwrap()
    }

    #[test]
    fn set_then_lookup() {
        let mut cb = new_cb();
        let mut map = Map::init();
        kv_set(&mut cb, &mut map, Term::new(1), Term::new(10)).unwrap();
        kv_set(&mut cb, &mut map, Term::new(2), Term::new(20)).unwrap();
        assert_eq!(kv_lookup(&cb, &map, Term::new(1)).unwrap(), Term::new(10));
        assert_eq!(kv_lookup(&cb, &map, Term::new(2)).unwrap(), Term::new(20));
        assert!(kv_lookup(&cb, &map, Term::new(3)).is_err());
    }

    #[test]
    fn delete_shadows_earlier_set() {
        let mut cb = new_cb();
        let mut map = Map::init();
        kv_set(&mut cb, &mut map, Term::new(1), Term::new(10)).unwrap();
        kv_delete(&mut cb, &mut map, Term::new(1)).unwrap();
        assert!(kv_lookup(&cb, &map, Term::new(1)).is_err());
    }

    #[test]
    fn consolidate_preserves_visible_state() {
        let mut cb = new_cb();
        let mut map = Map::init();
        for k in 0u64..20 {
            kv_set(&mut cb, &mut map, Term::new(k), Term::new(k * 2)).unwrap();
        }
        kv_delete(&mut cb, &mut map, Term::new(5)).unwrap();

        let mut before = Vec::new();
        traverse(&cb, &map, &mut |k, v| before.push((k.get(), v.get()))).unwrap();

        consolidate(&mut cb, &mut map).unwrap();

        let mut after = Vec::new();
        traverse(&cb, &map, &mut |k, v| after.push((k.get(), v.get()))).unwrap();
        assert_eq!(before, after);
        assert!(kv_lookup(&cb, &map, Term::new(5)).is_err());
        assert_eq!(kv_lookup(&cb, &map, Term::new(6)).unwrap(), Term::new(12));
    }

    #[test]
    fn interleaved_set_delete_consolidate() {
        let mut cb = new_cb();
        let mut map = Map::init();
        kv_set(&mut cb, &mut map, Term::new(1), Term::new(1)).unwrap();
        consolidate(&mut cb, &mut map).unwrap();
        kv_set(&mut cb, &mut map, Term::new(2), Term::new(2)).unwrap();
        kv_delete(&mut cb, &mut map, Term::new(1)).unwrap();
        consolidate(&mut cb, &mut map).unwrap();
        kv_set(&mut cb, &mut map, Term::new(1), Term::new(99)).unwrap();

        assert_eq!(kv_lookup(&cb, &map, Term::new(1)).unwrap(), Term::new(99));
        assert_eq!(kv_lookup(&cb, &map, Term::new(2)).unwrap(), Term::new(2));
    }
}
