extern crate winapi;

use super::Protect;

use std::fs::File;
use std::io::{Error, Result};
use std::mem;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use self::winapi::shared::basetsd::SIZE_T;
use self::winapi::shared::minwindef::DWORD;
use self::winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use self::winapi::um::memoryapi::{
    CreateFileMappingW, MapViewOfFile, MapViewOfFileEx, UnmapViewOfFile, FILE_MAP_READ,
    FILE_MAP_WRITE,
};
use self::winapi::um::sysinfoapi::{GetSystemInfo, LPSYSTEM_INFO, SYSTEM_INFO};
use self::winapi::um::winnt::{PAGE_READONLY, PAGE_READWRITE};

pub fn page_size() -> usize {
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info as LPSYSTEM_INFO);
        info.dwPageSize as usize
    }
}

pub unsafe fn map_file(file: &File, off: usize, len: usize, prot: Protect) -> Result<*mut u8> {
    let (page_prot, access) = match prot {
        Protect::ReadOnly => (PAGE_READONLY, FILE_MAP_READ),
        Protect::ReadWrite => (PAGE_READWRITE, FILE_MAP_READ | FILE_MAP_WRITE),
    };

    let map = CreateFileMappingW(
        file.as_raw_handle(),
        ptr::null_mut(),
        page_prot,
        0,
        0,
        ptr::null(),
    );
    if map.is_null() {
        return Err(Error::last_os_error());
    }

    let view = MapViewOfFile(
        map,
        access,
        (off >> 16 >> 16) as DWORD,
        (off & 0xffff_ffff) as DWORD,
        len as SIZE_T,
    );
    CloseHandle(map);

    if view.is_null() {
        Err(Error::last_os_error())
    } else {
        Ok(view as *mut u8)
    }
}

/// Creates the header+ring mapping and its loop alias by mapping the same
/// pagefile-backed section into two adjacent views.
///
/// The section is sized `header_size + ring_size`; the first view covers it
/// at offset `0`, and a second, `loop_size`-byte view is placed immediately
/// after it but backed by the section at offset `header_size`, aliasing the
/// ring's first `loop_size` bytes so a write no longer than `loop_size` is
/// always readable as one contiguous slice regardless of wrap.
pub unsafe fn map_ring(header_size: usize, ring_size: usize, loop_size: usize) -> Result<*mut u8> {
    let region_len = (header_size + ring_size) as u64;
    let map = CreateFileMappingW(
        INVALID_HANDLE_VALUE,
        ptr::null_mut(),
        PAGE_READWRITE,
        (region_len >> 32) as DWORD,
        (region_len & 0xffff_ffff) as DWORD,
        ptr::null(),
    );
    if map.is_null() {
        return Err(Error::last_os_error());
    }

    let first = MapViewOfFile(map, FILE_MAP_READ | FILE_MAP_WRITE, 0, 0, region_len as SIZE_T);
    if first.is_null() {
        let err = Error::last_os_error();
        CloseHandle(map);
        return Err(err);
    }

    let header = header_size as u64;
    let second = MapViewOfFileEx(
        map,
        FILE_MAP_READ | FILE_MAP_WRITE,
        (header >> 32) as DWORD,
        (header & 0xffff_ffff) as DWORD,
        loop_size as SIZE_T,
        first.offset(region_len as isize) as *mut _,
    );
    if second.is_null() {
        let err = Error::last_os_error();
        UnmapViewOfFile(first);
        CloseHandle(map);
        return Err(err);
    }

    CloseHandle(map);
    Ok(first as *mut u8)
}

pub unsafe fn unmap(pg: *mut u8, _len: usize) -> Result<()> {
    if UnmapViewOfFile(pg as *mut _) == 0 {
        Err(Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Unmaps a mapping created by [`map_ring`].
pub unsafe fn unmap_ring(
    pg: *mut u8,
    header_size: usize,
    ring_size: usize,
    _loop_size: usize,
) -> Result<()> {
    let region_len = header_size + ring_size;
    unmap(pg, region_len)?;
    unmap(pg.offset(region_len as isize), 0)
}
