//! A small driver that exercises a `Map` end to end: a handful of sets and
//! deletes, a consolidation, then a printed traversal of what's left.

use cbtree::{consolidate, kv_delete, kv_set, map, Cb, Map, Params, Term};

fn run() -> cbtree::Result<()> {
    env_logger::init();

    let mut cb = Cb::create(Params::new(1 << 20))?;
    let mut map = Map::init();

    for i in 0u64..10 {
        kv_set(&mut cb, &mut map, Term::new(i), Term::new(i * i))?;
    }
    kv_delete(&mut cb, &mut map, Term::new(3))?;
    kv_set(&mut cb, &mut map, Term::new(7), Term::new(777))?;

    consolidate(&mut cb, &mut map)?;

    kv_set(&mut cb, &mut map, Term::new(10), Term::new(100))?;
    kv_delete(&mut cb, &mut map, Term::new(1))?;

    map::print(&cb, &map)?;
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("cbtree-demo: {}", e);
        std::process::exit(1);
    }
}
