//! The continuous buffer (CB): a power-of-two ring preceded by a page-aligned
//! header reservation, whose first `loop_size` bytes are mirrored
//! immediately past the ring's tail in the virtual address space. A write
//! that starts anywhere in the ring and is no longer than `loop_size` can
//! always be read back as one contiguous slice without special-casing wrap;
//! anything longer falls back to a split copy across `ring_end`.
//!
//! Everything above this module deals exclusively in [`Offset`], the
//! ever-increasing cyclic counter; [`Cb::phys`] is the one place a logical
//! offset is folded down into an actual byte index in the mapping.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::{ptr, slice};

use bitflags::bitflags;

use crate::error::{Error, Input, Operation, Result};
use crate::offset::Offset;
use crate::os::{self, Protect};

bitflags! {
    /// Behavioral flags for a [`Cb`].
    pub struct Flags: u32 {
        /// Keep the backing file on disk after the `Cb` is dropped. Without
        /// this, a file-backed `Cb`'s path is removed on drop the same way a
        /// plain temporary file would be.
        const LEAVE_FILES = 0b001;
        /// Touch every page of the mapping at creation time so the first
        /// write to each page doesn't take a fresh fault.
        const PREFAULT = 0b010;
        /// Lock the mapping's pages into physical memory (best-effort; a
        /// failure to lock is logged, not returned as an error).
        const MLOCK = 0b100;
    }
}

/// Construction parameters for a [`Cb`].
///
/// Builder-style, mirroring how the teacher's own `MapMut`/`Alloc`
/// constructors take a handful of named knobs rather than a long positional
/// argument list.
pub struct Params {
    pub ring_size: usize,
    /// Page-aligned reservation preceding the ring's data region. Counted
    /// in the backing file's length but never addressed through an
    /// [`Offset`].
    pub header_size: usize,
    /// Multiple of the platform page size, `<= ring_size`. The first
    /// `loop_size` bytes of the ring are mapped a second time immediately
    /// past its tail, so any write no longer than `loop_size` is readable
    /// back as one contiguous slice regardless of wrap.
    pub loop_size: usize,
    pub index: u32,
    pub flags: Flags,
    pub filename_prefix: Option<String>,
    pub open_mode: u32,
    pub on_resize: Option<Box<dyn FnMut(usize, usize)>>,
    pub on_preresize: Option<Box<dyn FnMut(usize, usize) -> bool>>,
}

impl Default for Params {
    fn default() -> Self {
        let page = os::page_size();
        Params {
            ring_size: 1 << 20,
            header_size: page,
            loop_size: page,
            index: 0,
            flags: Flags::empty(),
            filename_prefix: None,
            open_mode: 0o600,
            on_resize: None,
            on_preresize: None,
        }
    }
}

impl Params {
    pub fn new(ring_size: usize) -> Self {
        Params {
            ring_size,
            ..Default::default()
        }
    }

    /// Overrides the page-aligned header reservation (default: one page).
    pub fn header_size(mut self, header_size: usize) -> Self {
        self.header_size = header_size;
        self
    }

    /// Overrides the loop alias size (default: one page). Must stay a
    /// multiple of the platform page size and no larger than `ring_size`.
    pub fn loop_size(mut self, loop_size: usize) -> Self {
        self.loop_size = loop_size;
        self
    }

    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn filename_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.filename_prefix = Some(prefix.into());
        self
    }

    pub fn on_resize<F: FnMut(usize, usize) + 'static>(mut self, f: F) -> Self {
        self.on_resize = Some(Box::new(f));
        self
    }

    pub fn on_preresize<F: FnMut(usize, usize) -> bool + 'static>(mut self, f: F) -> Self {
        self.on_preresize = Some(Box::new(f));
        self
    }

    /// The file name this `Cb` would use, following the file layout scheme
    /// `<prefix>[-]<index>-<log2(ring_size)>`.
    pub fn file_name(&self) -> Option<String> {
        self.filename_prefix.as_ref().map(|prefix| {
            let log2 = self.ring_size.trailing_zeros();
            let sep = if prefix.ends_with('-') { "" } else { "-" };
            format!("{}{}{}-{}", prefix, sep, self.index, log2)
        })
    }
}

/// An append-only, power-of-two-sized ring of bytes addressed by an
/// ever-increasing [`Offset`]. See the module docs for the magic-ring trick
/// that makes a write starting anywhere in the ring appear contiguous.
pub struct Cb {
    /// Start of the whole reservation (header, then ring, then loop alias).
    base_ptr: *mut u8,
    /// Start of the ring's data region: `base_ptr + header_size`.
    ptr: *mut u8,
    header_size: usize,
    ring_size: usize,
    loop_size: usize,
    data_start: Offset,
    cursor: Offset,
    file: Option<File>,
    path: Option<PathBuf>,
    flags: Flags,
    on_resize: Option<Box<dyn FnMut(usize, usize)>>,
    on_preresize: Option<Box<dyn FnMut(usize, usize) -> bool>>,
    /// The buffer this one replaced, if any, kept reachable for optional
    /// traversal after a [`Cb::resize`]. Its mapping stays live (and is
    /// unmapped in turn) for as long as this chain is.
    link: Option<Box<Cb>>,
}

impl std::fmt::Debug for Cb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cb")
            .field("ring_size", &self.ring_size)
            .field("data_start", &self.data_start)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Cb {
    /// Creates a new, empty continuous buffer.
    ///
    /// ```
    /// use cbtree::cb::{Cb, Params};
    ///
    /// let cb = Cb::create(Params::new(1 << 16)).expect("create cb");
    /// assert_eq!(cb.data_size(), 0);
    /// assert_eq!(cb.ring_size(), 1 << 16);
    /// ```
    pub fn create(mut params: Params) -> Result<Cb> {
        if !params.ring_size.is_power_of_two() {
            return Err(Error::input(Operation::CreateCb, Input::BadParam));
        }
        let page = os::page_size();
        if params.ring_size < page {
            return Err(Error::input(Operation::CreateCb, Input::BadParam));
        }
        if params.header_size == 0 || params.header_size % page != 0 {
            return Err(Error::input(Operation::CreateCb, Input::BadParam));
        }
        if params.loop_size == 0
            || params.loop_size % page != 0
            || params.loop_size > params.ring_size
        {
            return Err(Error::input(Operation::CreateCb, Input::BadParam));
        }

        let base_ptr = unsafe { os::map_ring(params.header_size, params.ring_size, params.loop_size) }
            .map_err(|e| Error::io(Operation::CreateCb, e))?;
        let ptr = unsafe { base_ptr.add(params.header_size) };

        let (file, path) = match params.file_name() {
            Some(name) => {
                let path = PathBuf::from(name);
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .mode_or_default(params.open_mode)
                    .open(&path)
                    .map_err(|e| Error::io(Operation::CreateCb, e))?;
                file.set_len(params.header_size as u64 + params.ring_size as u64)
                    .map_err(|e| Error::io(Operation::CreateCb, e))?;
                (Some(file), Some(path))
            }
            None => (None, None),
        };

        if params.flags.contains(Flags::PREFAULT) {
            unsafe { ptr::write_bytes(base_ptr, 0, params.header_size + params.ring_size) };
        }
        if params.flags.contains(Flags::MLOCK) {
            lock_pages(base_ptr, params.header_size + params.ring_size);
        }

        Ok(Cb {
            base_ptr,
            ptr,
            header_size: params.header_size,
            ring_size: params.ring_size,
            loop_size: params.loop_size,
            data_start: Offset::ZERO,
            cursor: Offset::ZERO,
            file,
            path,
            flags: params.flags,
            on_resize: params.on_resize.take(),
            on_preresize: params.on_preresize.take(),
            link: None,
        })
    }

    #[inline]
    fn phys(&self, off: Offset) -> usize {
        (off.get() & (self.ring_size as u64 - 1)) as usize
    }

    /// The current write position: the offset the next [`append`](Cb::append)
    /// will return.
    #[inline]
    pub fn cursor(&self) -> Offset {
        self.cursor
    }

    /// The oldest offset still considered live.
    #[inline]
    pub fn data_start(&self) -> Offset {
        self.data_start
    }

    #[inline]
    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// The largest span, in bytes, that may be addressed contiguously from
    /// any live offset without falling back to a split copy.
    #[inline]
    pub fn loop_size(&self) -> usize {
        self.loop_size
    }

    /// The page-aligned reservation preceding the ring's data region.
    #[inline]
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// The buffer this one replaced, if it was produced by [`Cb::resize`].
    #[inline]
    pub fn link(&self) -> Option<&Cb> {
        self.link.as_deref()
    }

    /// Bytes currently live, i.e. the span from `data_start` to `cursor`.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_start.distance_to(self.cursor) as usize
    }

    fn free_space(&self) -> usize {
        self.ring_size - self.data_size()
    }

    /// Returns a contiguous, read-only view of `len` bytes starting at `off`,
    /// the only place the cursor is permitted to skip bytes: callers needing
    /// a contiguous writable span align the cursor and read back the aligned
    /// region through this accessor. Requires `len <= loop_size`, since only
    /// the loop-aliased span of the ring can be returned as one slice; a
    /// longer span must go through [`Cb::memcpy_out`]'s split copy instead.
    pub fn contiguous_range(&self, off: Offset, len: usize) -> Result<&[u8]> {
        self.check_live(off, len, Operation::MemcpyOut)?;
        if len > self.loop_size {
            return Err(Error::input(Operation::MemcpyOut, Input::BadParam));
        }
        let phys = self.phys(off);
        Ok(unsafe { slice::from_raw_parts(self.ptr.add(phys), len) })
    }

    fn check_live(&self, off: Offset, len: usize, op: Operation) -> Result<()> {
        if len > self.ring_size {
            return Err(Error::input(op, Input::BadParam));
        }
        let from_start = self.data_start.distance_to(off);
        if from_start > self.ring_size as u64 {
            return Err(Error::input(op, Input::StaleOffset));
        }
        let end = off.add(len as u64);
        if self.data_start.distance_to(end) > self.data_start.distance_to(self.cursor) {
            return Err(Error::input(op, Input::StaleOffset));
        }
        Ok(())
    }

    fn mirror_write(&mut self, phys: usize, bytes: &[u8]) -> Result<()> {
        let file = match &mut self.file {
            Some(f) => f,
            None => return Ok(()),
        };
        let header = self.header_size as u64;
        let first = bytes.len().min(self.ring_size - phys);
        write_at(file, header + phys as u64, &bytes[..first])
            .map_err(|e| Error::io(Operation::MemcpyIn, e))?;
        if first < bytes.len() {
            write_at(file, header, &bytes[first..])
                .map_err(|e| Error::io(Operation::MemcpyIn, e))?;
        }
        Ok(())
    }

    /// Writes `bytes` into the ring at physical offset `phys`, taking the
    /// short path (one `memcpy`, relying on the loop alias) when `bytes` is
    /// no longer than `loop_size`, otherwise splitting into at most two
    /// contiguous segments at `ring_end`.
    fn write_ring(&mut self, phys: usize, bytes: &[u8]) {
        if bytes.len() <= self.loop_size {
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(phys), bytes.len()) };
        } else {
            unsafe { ring_write(self.ptr, self.ring_size, phys, bytes) };
        }
    }

    /// Reads `dst.len()` bytes from the ring at physical offset `phys`,
    /// mirroring [`Cb::write_ring`]'s short-path/split-path choice.
    fn read_ring(&self, phys: usize, dst: &mut [u8]) {
        if dst.len() <= self.loop_size {
            let src = unsafe { slice::from_raw_parts(self.ptr.add(phys), dst.len()) };
            dst.copy_from_slice(src);
        } else {
            unsafe { ring_read(self.ptr, self.ring_size, phys, dst) };
        }
    }

    /// Ensures `needed` free bytes by growing the ring (doubling until it
    /// fits) if the current one is too small.
    fn ensure_free(&mut self, needed: usize, op: Operation) -> Result<()> {
        if needed <= self.free_space() {
            return Ok(());
        }
        let mut target = self.ring_size;
        while target - self.data_size() < needed {
            target = target
                .checked_mul(2)
                .ok_or_else(|| Error::input(op, Input::Depleted))?;
        }
        self.grow(target)
    }

    /// Appends `bytes` to the buffer, growing the ring first if it doesn't
    /// currently have enough free space, and returns the offset it was
    /// written at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<Offset> {
        self.ensure_free(bytes.len(), Operation::Append)?;
        let start = self.cursor;
        let phys = self.phys(start);
        self.write_ring(phys, bytes);
        self.mirror_write(phys, bytes)?;
        self.cursor = self.cursor.add(bytes.len() as u64);
        Ok(start)
    }

    /// Reserves `size` bytes aligned to `alignment`, without writing into
    /// them. The caller fills the region with [`Cb::memcpy_in`].
    pub fn memalign(&mut self, size: usize, alignment: u64) -> Result<Offset> {
        if !alignment.is_power_of_two() {
            return Err(Error::input(Operation::Memalign, Input::BadParam));
        }
        let aligned = self.cursor.align_up(alignment);
        let pad = self.cursor.distance_to(aligned) as usize;
        let needed = pad + size;
        if needed > self.free_space() || size > self.ring_size {
            return Err(Error::input(Operation::Memalign, Input::Depleted));
        }
        self.cursor = aligned.add(size as u64);
        Ok(aligned)
    }

    /// Writes `src` at `off`, which must already lie within `[data_start,
    /// cursor)`.
    pub fn memcpy_in(&mut self, off: Offset, src: &[u8]) -> Result<()> {
        self.check_live(off, src.len(), Operation::MemcpyIn)?;
        let phys = self.phys(off);
        self.write_ring(phys, src);
        self.mirror_write(phys, src)
    }

    /// Reads `dst.len()` bytes starting at `off` into `dst`, taking the
    /// short path (one `memcpy`) when `dst.len() <= loop_size`, otherwise
    /// splitting into at most two contiguous segments at `ring_end`.
    pub fn memcpy_out(&self, off: Offset, dst: &mut [u8]) -> Result<()> {
        self.check_live(off, dst.len(), Operation::MemcpyOut)?;
        let phys = self.phys(off);
        self.read_ring(phys, dst);
        Ok(())
    }

    /// Reads `len` bytes from `self` at `src_off` and appends them to `dst`,
    /// returning the offset they land at in `dst`. Used when consolidation
    /// copies command-log payloads into a freshly built tree's arena.
    pub fn memcpy(&self, src_off: Offset, len: usize, dst: &mut Cb) -> Result<Offset> {
        let mut buf = vec![0u8; len];
        self.memcpy_out(src_off, &mut buf)?;
        dst.append(&buf)
    }

    /// Resolves a logical offset within `[data_start, cursor]` to a location
    /// that has already been read. `at` fails with [`Input::StaleOffset`] if
    /// the offset's modular distance from `data_start` exceeds `ring_size`
    /// (it denotes data that has already been overwritten).
    pub fn at(&self, off: Offset, len: usize) -> Result<&[u8]> {
        self.contiguous_range(off, len)
    }

    /// Moves the write cursor back to `off`, which must be within
    /// `[data_start, cursor]`. Used to discard a partially built region after
    /// a failed append.
    pub fn rewind_to(&mut self, off: Offset) -> Result<()> {
        let from_start = self.data_start.distance_to(off);
        let live = self.data_start.distance_to(self.cursor);
        if from_start > live {
            return Err(Error::input(Operation::Append, Input::BadParam));
        }
        self.cursor = off;
        Ok(())
    }

    /// Advances `data_start`, marking bytes before `off` as no longer live.
    /// This never moves or copies memory; it only changes what [`Cb::at`]
    /// will accept.
    pub fn advance_data_start(&mut self, off: Offset) -> Result<()> {
        let live = self.data_start.distance_to(self.cursor);
        let advance = self.data_start.distance_to(off);
        if advance > live {
            return Err(Error::input(Operation::Append, Input::BadParam));
        }
        self.data_start = off;
        Ok(())
    }

    /// Grows the ring to `new_ring_size` (must be a power of two larger than
    /// the current size), preserving all live data and its offsets.
    pub fn grow(&mut self, new_ring_size: usize) -> Result<()> {
        if !new_ring_size.is_power_of_two() || new_ring_size <= self.ring_size {
            return Err(Error::input(Operation::Grow, Input::BadParam));
        }
        if let Some(cb) = &mut self.on_preresize {
            if !cb(self.ring_size, new_ring_size) {
                return Err(Error::input(Operation::Grow, Input::BadParam));
            }
        }
        self.resize(new_ring_size, Operation::Grow)?;
        if let Some(cb) = &mut self.on_resize {
            cb(self.ring_size, new_ring_size);
        }
        log::debug!("cb grew to {} bytes", new_ring_size);
        Ok(())
    }

    /// Shrinks the ring to `new_ring_size`, which must still hold all live
    /// data.
    pub fn shrink(&mut self, new_ring_size: usize) -> Result<()> {
        if !new_ring_size.is_power_of_two() || new_ring_size >= self.ring_size {
            return Err(Error::input(Operation::Shrink, Input::BadParam));
        }
        if self.data_size() > new_ring_size || new_ring_size < self.loop_size {
            return Err(Error::input(Operation::Shrink, Input::BadParam));
        }
        self.resize(new_ring_size, Operation::Shrink)?;
        log::debug!("cb shrank to {} bytes", new_ring_size);
        Ok(())
    }

    /// Shrinks to the smallest power-of-two ring size that still fits the
    /// live data (never below a single page).
    pub fn shrink_auto(&mut self) -> Result<()> {
        let min = self.data_size().max(self.loop_size).next_power_of_two();
        if min >= self.ring_size {
            return Ok(());
        }
        self.shrink(min)
    }

    /// Maps a new ring of `new_ring_size` at the same `header_size`/
    /// `loop_size`, copies the live data across, and swaps it in. The old
    /// mapping is kept reachable via [`Cb::link`] rather than unmapped
    /// immediately.
    fn resize(&mut self, new_ring_size: usize, op: Operation) -> Result<()> {
        let new_base = unsafe { os::map_ring(self.header_size, new_ring_size, self.loop_size) }
            .map_err(|e| Error::io(op, e))?;
        let new_ptr = unsafe { new_base.add(self.header_size) };

        let data_size = self.data_size();
        if data_size > 0 {
            let old_phys = self.phys(self.data_start);
            let mut buf = vec![0u8; data_size];
            unsafe { ring_read(self.ptr, self.ring_size, old_phys, &mut buf) };
            let new_phys = (self.data_start.get() & (new_ring_size as u64 - 1)) as usize;
            unsafe { ring_write(new_ptr, new_ring_size, new_phys, &buf) };
        }

        if let Some(file) = &mut self.file {
            file.set_len(self.header_size as u64 + new_ring_size as u64)
                .map_err(|e| Error::io(op, e))?;
        }

        let old = Cb {
            base_ptr: self.base_ptr,
            ptr: self.ptr,
            header_size: self.header_size,
            ring_size: self.ring_size,
            loop_size: self.loop_size,
            data_start: self.data_start,
            cursor: self.cursor,
            file: None,
            path: None,
            flags: self.flags,
            on_resize: None,
            on_preresize: None,
            link: self.link.take(),
        };

        self.base_ptr = new_base;
        self.ptr = new_ptr;
        self.ring_size = new_ring_size;
        self.link = Some(Box::new(old));
        Ok(())
    }
}

impl Drop for Cb {
    fn drop(&mut self) {
        unsafe { os::unmap_ring(self.base_ptr, self.header_size, self.ring_size, self.loop_size) }
            .unwrap_or_default();
        if let (Some(_), Some(path)) = (&self.file, &self.path) {
            if !self.flags.contains(Flags::LEAVE_FILES) {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

/// Reads `dst.len()` bytes from a raw ring mapping at physical offset
/// `phys`, splitting into at most two contiguous segments at `ring_size`.
/// Used directly (without the loop-alias short path) when copying between
/// two distinct mappings of different sizes, as [`Cb::resize`] does.
unsafe fn ring_read(ptr: *mut u8, ring_size: usize, phys: usize, dst: &mut [u8]) {
    let len = dst.len();
    let first = (ring_size - phys).min(len);
    ptr::copy_nonoverlapping(ptr.add(phys), dst.as_mut_ptr(), first);
    if first < len {
        ptr::copy_nonoverlapping(ptr, dst.as_mut_ptr().add(first), len - first);
    }
}

/// Writes `src` into a raw ring mapping at physical offset `phys`, the
/// write-side counterpart of [`ring_read`].
unsafe fn ring_write(ptr: *mut u8, ring_size: usize, phys: usize, src: &[u8]) {
    let len = src.len();
    let first = (ring_size - phys).min(len);
    ptr::copy_nonoverlapping(src.as_ptr(), ptr.add(phys), first);
    if first < len {
        ptr::copy_nonoverlapping(src.as_ptr().add(first), ptr, len - first);
    }
}

// `Cb` owns a raw pointer and a `Drop` impl that unmaps it; sharing one
// across threads without external synchronization would let two threads
// unmap or mutate concurrently, so it stays single-threaded the same way
// the teacher's `Ring`/`MapMut` do.
unsafe impl Send for Cb {}

#[cfg(unix)]
fn lock_pages(ptr: *mut u8, len: usize) {
    let ret = unsafe { libc::mlock(ptr as *const libc::c_void, len) };
    if ret != 0 {
        log::warn!("mlock failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn lock_pages(_ptr: *mut u8, _len: usize) {
    log::warn!("MLOCK requested but not supported on this platform");
}

#[cfg(unix)]
fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(bytes, offset)
}

#[cfg(not(unix))]
fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)
}

trait OpenOptionsExt2 {
    fn mode_or_default(self, mode: u32) -> Self;
}

impl OpenOptionsExt2 for OpenOptions {
    #[cfg(unix)]
    fn mode_or_default(mut self, mode: u32) -> Self {
        use std::os::unix::fs::OpenOptionsExt;
        self.mode(mode);
        self
    }

    #[cfg(not(unix))]
    fn mode_or_default(self, _mode: u32) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec requires `ring_size >= page_size`, so tests size rings off the
    /// real platform page size rather than fixed literals.
    fn page() -> usize {
        os::page_size()
    }

    #[test]
    fn append_and_read_back() {
        let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
        let off = cb.append(b"hello").unwrap();
        assert_eq!(cb.data_size(), 5);
        let mut buf = [0u8; 5];
        cb.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn append_grows_ring_when_depleted() {
        let ring_size = page() * 4;
        let mut cb = Cb::create(Params::new(ring_size)).unwrap();
        let bytes = vec![7u8; ring_size];
        let off = cb.append(&bytes).unwrap();
        assert_eq!(cb.data_size(), ring_size);

        cb.append(&[1]).unwrap();
        assert_eq!(cb.ring_size(), ring_size * 2);

        let mut buf = vec![0u8; ring_size];
        cb.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(buf, bytes);
    }

    #[test]
    fn memalign_respects_alignment() {
        let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
        cb.append(b"x").unwrap();
        let off = cb.memalign(16, 16).unwrap();
        assert!(off.is_aligned(16));
        assert!(off.get() >= 1);
    }

    #[test]
    fn memalign_does_not_grow_on_depletion() {
        let ring_size = page() * 2;
        let mut cb = Cb::create(Params::new(ring_size)).unwrap();
        cb.append(&vec![0u8; ring_size - 8]).unwrap();
        assert!(cb.memalign(ring_size, 8).is_err());
        assert_eq!(cb.ring_size(), ring_size);
    }

    #[test]
    fn grow_preserves_data_and_offsets() {
        let mut cb = Cb::create(Params::new(page() * 2)).unwrap();
        let off = cb.append(b"persist me").unwrap();
        cb.grow(page() * 8).unwrap();
        assert_eq!(cb.ring_size(), page() * 8);
        let mut buf = [0u8; 10];
        cb.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(&buf, b"persist me");
    }

    #[test]
    fn resize_keeps_old_buffer_reachable_via_link() {
        let mut cb = Cb::create(Params::new(page() * 2)).unwrap();
        let off = cb.append(b"persist me").unwrap();
        cb.grow(page() * 8).unwrap();

        let old = cb.link().expect("resize must keep the old buffer linked");
        assert_eq!(old.ring_size(), page() * 2);
        let mut buf = [0u8; 10];
        old.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(&buf, b"persist me");
    }

    #[test]
    fn shrink_rejects_when_data_does_not_fit() {
        let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
        cb.append(&vec![0u8; page() * 2 + 1]).unwrap();
        assert!(cb.shrink(page()).is_err());
    }

    #[test]
    fn shrink_rejects_below_loop_size() {
        let mut cb = Cb::create(Params::new(page() * 8).loop_size(page() * 4)).unwrap();
        assert!(cb.shrink(page() * 2).is_err());
    }

    #[test]
    fn stale_offset_is_rejected() {
        let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
        let off = cb.append(&vec![1u8; page()]).unwrap();
        cb.append(&vec![2u8; page()]).unwrap();
        cb.advance_data_start(Offset::new(off.get() + page() as u64))
            .unwrap();
        let mut buf = [0u8; 4];
        assert!(cb.memcpy_out(off, &mut buf).is_err());
    }

    #[test]
    fn write_of_loop_size_minus_one_straddles_ring_end() {
        let ring_size = page() * 4;
        let mut cb = Cb::create(Params::new(ring_size)).unwrap();
        let loop_size = cb.loop_size();
        cb.append(&vec![9u8; ring_size - 5]).unwrap();
        cb.advance_data_start(cb.cursor()).unwrap();

        let payload = vec![5u8; loop_size - 1];
        let off = cb.append(&payload).unwrap();
        let mut buf = vec![0u8; payload.len()];
        cb.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(buf, payload);
    }

    #[test]
    fn write_longer_than_loop_size_uses_split_copy() {
        let ring_size = page() * 4;
        let mut cb = Cb::create(Params::new(ring_size)).unwrap();
        let loop_size = cb.loop_size();
        cb.append(&vec![9u8; ring_size - 5]).unwrap();
        cb.advance_data_start(cb.cursor()).unwrap();

        let payload: Vec<u8> = (0..(loop_size * 2)).map(|i| (i % 251) as u8).collect();
        let off = cb.append(&payload).unwrap();
        let mut buf = vec![0u8; payload.len()];
        cb.memcpy_out(off, &mut buf).unwrap();
        assert_eq!(buf, payload);
    }

    #[test]
    fn contiguous_range_rejects_spans_longer_than_loop_size() {
        let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
        let off = cb.append(&vec![1u8; cb.loop_size() + 1]).unwrap();
        assert!(cb.contiguous_range(off, cb.loop_size() + 1).is_err());
    }

    #[test]
    fn cross_cb_memcpy_preserves_content() {
        let mut src = Cb::create(Params::new(page() * 4)).unwrap();
        let mut dst = Cb::create(Params::new(page() * 4)).unwrap();
        let off = src.append(&vec![3u8; cb_test_payload_len()]).unwrap();
        let dst_off = src.memcpy(off, cb_test_payload_len(), &mut dst).unwrap();
        let mut buf = vec![0u8; cb_test_payload_len()];
        dst.memcpy_out(dst_off, &mut buf).unwrap();
        assert_eq!(buf, vec![3u8; cb_test_payload_len()]);
    }

    fn cb_test_payload_len() -> usize {
        200
    }

    #[test]
    fn file_backed_cb_mirrors_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ring").to_str().unwrap().to_owned();
        let ring_size = page() * 4;
        let params = Params::new(ring_size).filename_prefix(prefix);
        let path = PathBuf::from(params.file_name().unwrap());

        let mut cb = Cb::create(params).unwrap();
        cb.append(b"on disk").unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.len(), cb.header_size() + ring_size);
        let header = cb.header_size();
        assert_eq!(&on_disk[header..header + 7], b"on disk");
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn memcpy_round_trips_any_payload(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut cb = Cb::create(Params::new(page() * 4)).unwrap();
            let off = cb.append(&payload).unwrap();
            let mut buf = vec![0u8; payload.len()];
            cb.memcpy_out(off, &mut buf).unwrap();
            prop_assert_eq!(buf, payload);
        }

        #[test]
        fn data_size_tracks_every_append(chunks in proptest::collection::vec(1usize..64, 0..32)) {
            let mut cb = Cb::create(Params::new(page() * 16)).unwrap();
            let mut total = 0usize;
            for len in chunks {
                cb.append(&vec![1u8; len]).unwrap();
                total += len;
            }
            prop_assert_eq!(cb.data_size(), total);
        }

        #[test]
        fn grow_preserves_payload_for_any_size(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut cb = Cb::create(Params::new(page() * 2)).unwrap();
            let off = cb.append(&payload).unwrap();
            cb.grow(page() * 32).unwrap();
            let mut buf = vec![0u8; payload.len()];
            cb.memcpy_out(off, &mut buf).unwrap();
            prop_assert_eq!(buf, payload);
        }

        #[test]
        fn append_never_fails_on_depletion(chunks in proptest::collection::vec(1usize..1024, 0..32)) {
            let mut cb = Cb::create(Params::new(page())).unwrap();
            for len in chunks {
                prop_assert!(cb.append(&vec![2u8; len]).is_ok());
            }
        }
    }
}
