//! A windowed sub-allocator over a [`Cb`]'s cursor.
//!
//! A `Region` carves aligned, fixed-size allocations out of a range of a
//! buffer. It grows forward from its starting offset by default, or backward
//! (toward lower offsets) when created with [`RegionFlags::REVERSED`] -- used
//! for allocations that should not interleave with the region growing the
//! other direction from the same arena. When a region runs out of space it
//! automatically reserves another block of its preferred size from the
//! underlying `Cb`, unless it was created with [`RegionFlags::FINAL`].

use bitflags::bitflags;

use crate::cb::Cb;
use crate::error::{Error, Input, Operation, Result};
use crate::offset::Offset;

bitflags! {
    pub struct RegionFlags: u32 {
        /// Grow toward lower offsets instead of higher ones.
        const REVERSED = 0b01;
        /// Never auto-refill; [`Region::memalign`] returns
        /// [`Input::Depleted`] once the initial block is exhausted.
        const FINAL = 0b10;
    }
}

/// A sub-allocator carved from a [`Cb`].
pub struct Region {
    flags: RegionFlags,
    block_size: usize,
    /// Start of the current block (lowest offset of it, regardless of
    /// growth direction).
    block_start: Offset,
    /// Next offset to hand out, in growth direction. For a forward region
    /// this is the high-water mark; for a reversed region it's the low
    /// watermark (addresses are still handed out increasing toward
    /// `block_start`).
    next: Offset,
    remaining: usize,
}

impl Region {
    /// Creates a region of `size` bytes reserved from `cb`, handing out
    /// allocations aligned to `alignment`.
    pub fn create(cb: &mut Cb, alignment: u64, size: usize, flags: RegionFlags) -> Result<Region> {
        let start = cb
            .memalign(size, alignment)
            .map_err(|_| Error::input(Operation::RegionCreate, Input::Depleted))?;
        let next = if flags.contains(RegionFlags::REVERSED) {
            start.add(size as u64)
        } else {
            start
        };
        Ok(Region {
            flags,
            block_size: size,
            block_start: start,
            next,
            remaining: size,
        })
    }

    /// Creates a sub-region of `parent`'s remaining space, useful for
    /// splitting one arena into independently growing forward/reverse
    /// halves.
    pub fn derive(
        parent: &mut Region,
        alignment: u64,
        size: usize,
        flags: RegionFlags,
    ) -> Result<Region> {
        let start = parent.memalign_raw(size, alignment)?;
        let next = if flags.contains(RegionFlags::REVERSED) {
            start.add(size as u64)
        } else {
            start
        };
        Ok(Region {
            flags,
            block_size: size,
            block_start: start,
            next,
            remaining: size,
        })
    }

    fn memalign_raw(&mut self, size: usize, alignment: u64) -> Result<Offset> {
        if !alignment.is_power_of_two() {
            return Err(Error::input(Operation::RegionMemalign, Input::BadParam));
        }
        if self.flags.contains(RegionFlags::REVERSED) {
            let candidate = self.next.sub(size as u64);
            let aligned = align_down(candidate, alignment);
            let used = self.next.distance_to(self.block_start.add(self.block_size as u64))
                - self.next.distance_to(aligned);
            if used > self.block_size as u64 {
                return Err(Error::input(Operation::RegionMemalign, Input::Depleted));
            }
            self.next = aligned;
            self.remaining = self.next.distance_to(self.block_start) as usize;
            Ok(aligned)
        } else {
            let aligned = self.next.align_up(alignment);
            let end = aligned.add(size as u64);
            if self.block_start.distance_to(end) > self.block_size as u64 {
                return Err(Error::input(Operation::RegionMemalign, Input::Depleted));
            }
            self.next = end;
            self.remaining = self.block_size - self.block_start.distance_to(end) as usize;
            Ok(aligned)
        }
    }

    /// Reserves `size` bytes aligned to `alignment`, refilling from `cb`
    /// automatically if the current block is depleted (unless the region was
    /// created with [`RegionFlags::FINAL`]).
    pub fn memalign(&mut self, cb: &mut Cb, alignment: u64, size: usize) -> Result<Offset> {
        match self.memalign_raw(size, alignment) {
            Ok(off) => Ok(off),
            Err(e) if e.operation() == Operation::RegionMemalign && !self.flags.contains(RegionFlags::FINAL) => {
                let _ = e;
                self.refill(cb, size.max(self.block_size))?;
                self.memalign_raw(size, alignment)
            }
            Err(e) => Err(e),
        }
    }

    fn refill(&mut self, cb: &mut Cb, preferred: usize) -> Result<()> {
        let size = preferred.max(self.block_size);
        let start = cb
            .memalign(size, 1)
            .map_err(|_| Error::input(Operation::RegionMemalign, Input::Depleted))?;
        self.block_start = start;
        self.block_size = size;
        self.next = if self.flags.contains(RegionFlags::REVERSED) {
            start.add(size as u64)
        } else {
            start
        };
        self.remaining = size;
        log::debug!("region refilled with {} bytes", size);
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn flags(&self) -> RegionFlags {
        self.flags
    }
}

fn align_down(off: Offset, alignment: u64) -> Offset {
    debug_assert!(alignment.is_power_of_two());
    Offset::new(off.get() & !(alignment - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cb::{Cb, Params};

    #[test]
    fn forward_region_hands_out_increasing_offsets() {
        let mut cb = Cb::create(Params::new(1 << 16)).unwrap();
        let mut region = Region::create(&mut cb, 8, 256, RegionFlags::empty()).unwrap();
        let a = region.memalign(&mut cb, 8, 16).unwrap();
        let b = region.memalign(&mut cb, 8, 16).unwrap();
        assert!(b.get() > a.get());
    }

    #[test]
    fn reversed_region_hands_out_decreasing_offsets() {
        let mut cb = Cb::create(Params::new(1 << 16)).unwrap();
        let mut region = Region::create(&mut cb, 8, 256, RegionFlags::REVERSED).unwrap();
        let a = region.memalign(&mut cb, 8, 16).unwrap();
        let b = region.memalign(&mut cb, 8, 16).unwrap();
        assert!(b.get() < a.get());
    }

    #[test]
    fn final_region_does_not_refill() {
        let mut cb = Cb::create(Params::new(1 << 16)).unwrap();
        let mut region = Region::create(&mut cb, 8, 32, RegionFlags::FINAL).unwrap();
        assert!(region.memalign(&mut cb, 8, 16).is_ok());
        assert!(region.memalign(&mut cb, 8, 16).is_ok());
        assert!(region.memalign(&mut cb, 8, 16).is_err());
    }

    #[test]
    fn non_final_region_auto_refills() {
        let mut cb = Cb::create(Params::new(1 << 16)).unwrap();
        let mut region = Region::create(&mut cb, 8, 16, RegionFlags::empty()).unwrap();
        assert!(region.memalign(&mut cb, 8, 16).is_ok());
        // the block is now exhausted; this should trigger a refill instead
        // of failing.
        assert!(region.memalign(&mut cb, 8, 16).is_ok());
    }
}
