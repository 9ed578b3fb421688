extern crate libc;

use super::Protect;

use std::fs::File;
use std::io::{Error, Result};
use std::os::unix::io::AsRawFd;
use std::ptr;

use self::libc::{
    c_void, mmap, munmap, off_t, sysconf, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE,
    _SC_PAGESIZE,
};

// macOS/iOS lack `memfd_create` and re-mapping a live region with
// `MAP_FIXED` is unreliable on those kernels, so the ring trick goes through
// the mach vm calls directly instead of the posix path below.
#[cfg(any(target_os = "macos", target_os = "ios"))]
mod mach;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use self::mach::{map_ring, unmap_ring};

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
mod posix;
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
pub use self::posix::{map_ring, unmap_ring};

pub fn page_size() -> usize {
    unsafe { sysconf(_SC_PAGESIZE) as usize }
}

pub unsafe fn map_file(file: &File, off: usize, len: usize, prot: Protect) -> Result<*mut u8> {
    let prot = match prot {
        Protect::ReadOnly => PROT_READ,
        Protect::ReadWrite => PROT_READ | PROT_WRITE,
    };
    let pg = mmap(
        ptr::null_mut(),
        len,
        prot,
        MAP_SHARED,
        file.as_raw_fd(),
        off as off_t,
    );
    if pg == MAP_FAILED {
        Err(Error::last_os_error())
    } else {
        Ok(pg as *mut u8)
    }
}

pub unsafe fn unmap(pg: *mut u8, len: usize) -> Result<()> {
    if munmap(pg as *mut c_void, len) < 0 {
        Err(Error::last_os_error())
    } else {
        Ok(())
    }
}
