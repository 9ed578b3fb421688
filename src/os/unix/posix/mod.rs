extern crate libc;

mod memfd;
use self::memfd::memfd_open;

use std::io::{Error, Result};
use std::os::raw::c_int;
use std::ptr;

use self::libc::{
    c_void, close, ftruncate, mmap, off_t, MAP_ANON, MAP_FAILED, MAP_FIXED, MAP_PRIVATE,
    MAP_SHARED, PROT_READ, PROT_WRITE,
};

use super::unmap;

/// Creates the header+ring mapping and its loop alias.
///
/// `header_size + ring_size` bytes are backed by a temporary file descriptor
/// and mapped once; the trailing `loop_size` bytes of virtual address space
/// are then remapped onto the same fd at offset `header_size`, aliasing the
/// first `loop_size` bytes of the ring so that any write starting within the
/// ring and no longer than `loop_size` can be read back as one contiguous
/// slice without special-casing wrap.
pub unsafe fn map_ring(header_size: usize, ring_size: usize, loop_size: usize) -> Result<*mut u8> {
    // Create a temporary file descriptor truncated to hold the header and
    // the ring, but not the loop alias -- that part is virtual-only.
    let fd = tmp_open(header_size + ring_size)?;
    let ret = wrap_fd(header_size, ring_size, loop_size, fd);
    close(fd);
    ret
}

fn wrap_fd(header_size: usize, ring_size: usize, loop_size: usize, fd: c_int) -> Result<*mut u8> {
    // Reserve the whole address range up front so the loop alias lands
    // immediately after the ring with no other mapping able to claim it.
    let total = header_size + ring_size + loop_size;
    let pg = map(ptr::null_mut(), total, MAP_PRIVATE | MAP_ANON, -1, 0)?;
    match wrap_ptr(pg, header_size, ring_size, loop_size, fd) {
        Err(err) => unsafe {
            unmap_ring(pg, header_size, ring_size, loop_size).unwrap_or_default();
            Err(err)
        },
        Ok(pg) => Ok(pg),
    }
}

fn wrap_ptr(
    pg: *mut u8,
    header_size: usize,
    ring_size: usize,
    loop_size: usize,
    fd: c_int,
) -> Result<*mut u8> {
    // Map the header and ring onto the file at its start.
    map(pg, header_size + ring_size, MAP_SHARED | MAP_FIXED, fd, 0)?;
    // Alias the first `loop_size` bytes of the ring (file offset
    // `header_size`) immediately past the ring's tail.
    map(
        unsafe { pg.add(header_size + ring_size) },
        loop_size,
        MAP_SHARED | MAP_FIXED,
        fd,
        header_size as off_t,
    )?;
    Ok(pg)
}

fn map(pg: *mut u8, len: usize, flags: c_int, fd: c_int, file_off: off_t) -> Result<*mut u8> {
    unsafe {
        let pg = mmap(
            pg as *mut c_void,
            len,
            PROT_READ | PROT_WRITE,
            flags,
            fd,
            file_off,
        );
        if pg == MAP_FAILED {
            Err(Error::last_os_error())
        } else {
            Ok(pg as *mut u8)
        }
    }
}

/// Unmaps a mapping created by `map_ring`.
pub unsafe fn unmap_ring(
    pg: *mut u8,
    header_size: usize,
    ring_size: usize,
    loop_size: usize,
) -> Result<()> {
    unmap(pg, header_size + ring_size + loop_size)
}

fn tmp_open(size: usize) -> Result<c_int> {
    let fd = memfd_open()?;
    if unsafe { ftruncate(fd, size as off_t) } < 0 {
        let err = Error::last_os_error();
        unsafe {
            close(fd);
        }
        Err(err)
    } else {
        Ok(fd)
    }
}
