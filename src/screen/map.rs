//! Scoped read-write memory mapping over a device handle.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::ptr;

use crate::error::{YavError, YavResult};

/// A `MAP_SHARED` read-write mapping, unmapped on drop.
pub(crate) struct Mapping {
    ptr: *mut u8,
    len: usize,
}

impl Mapping {
    pub(crate) fn new(file: &File, len: usize, offset: i64) -> YavResult<Self> {
        // SAFETY: length and offset come from the driver that owns the
        // backing object; the mapping is released before the fd closes.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                offset as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(YavError::hardware("mmap", io::Error::last_os_error()));
        }

        Ok(Self { ptr: ptr.cast(), len })
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the region stays mapped for as long as `self` lives and no
        // other slice over it can coexist with this &mut borrow
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe the mapping created in `new`
        unsafe {
            libc::munmap(self.ptr.cast(), self.len);
        }
    }
}

/// Round a driver-reported length up to whole pages.
pub(crate) fn page_align(len: usize) -> usize {
    // SAFETY: sysconf with a valid name has no preconditions
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    len.div_ceil(page) * page
}
