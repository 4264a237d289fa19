//! File-backed `MAP_SHARED` memory mapping.
//!
//! Writes land in the page cache immediately and reach the file on [`MappedFile::flush`],
//! which blocks until `msync(MS_SYNC)` returns.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

pub struct MappedFile {
    ptr: *mut u8,
    len: usize,
    _file: File,
}

// Safety: the mapping is owned exclusively by this value and is only reachable
// through `&self`/`&mut self`, so moving it to another thread is sound.
unsafe impl Send for MappedFile {}

impl MappedFile {
    /// Opens (or creates) `path` and maps the whole file read-write.
    ///
    /// An empty or new file is first grown to `initial_len` bytes. Returns the
    /// mapping and whether the file was freshly created.
    pub fn open(path: &Path, initial_len: u64) -> io::Result<(Self, bool)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut len = file.metadata()?.len();
        let created = len == 0;
        if created {
            file.set_len(initial_len)?;
            len = initial_len;
        }
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large to map"))?;
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty file",
            ));
        }

        let ptr = map_shared(&file, len)?;
        Ok((
            Self {
                ptr,
                len,
                _file: file,
            },
            created,
        ))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn bytes(&self) -> &[u8] {
        // Safety: `ptr` is a live mapping of exactly `len` bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // Safety: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    /// Synchronously writes dirty pages back to the file.
    #[cfg(unix)]
    pub fn flush(&self) -> io::Result<()> {
        // Safety: `ptr`/`len` describe a live mapping returned by mmap.
        let rc = unsafe { libc::msync(self.ptr as *mut libc::c_void, self.len, libc::MS_SYNC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn flush(&self) -> io::Result<()> {
        Err(unsupported())
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        unmap(self.ptr, self.len);
    }
}

#[cfg(unix)]
fn unmap(ptr: *mut u8, len: usize) {
    // Safety: the mapping was created by `map_shared` with this exact length and
    // no slices into it can outlive the owning `MappedFile`.
    unsafe {
        libc::munmap(ptr as *mut libc::c_void, len);
    }
}

#[cfg(not(unix))]
fn unmap(_ptr: *mut u8, _len: usize) {}

#[cfg(unix)]
fn map_shared(file: &File, len: usize) -> io::Result<*mut u8> {
    use std::os::unix::io::AsRawFd;

    // Safety: fd is open read-write for the duration of the call; MAP_SHARED makes
    // writes visible in the file.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            file.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(ptr as *mut u8)
}

#[cfg(not(unix))]
fn map_shared(_file: &File, _len: usize) -> io::Result<*mut u8> {
    Err(unsupported())
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "file-backed shared mappings require unix",
    )
}
