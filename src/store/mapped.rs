//! Read-only file-mapped backend.
//!
//! A database file is the 16-byte magic followed by raw block data with no
//! framing; geometry arrives out-of-band. The whole file is mapped shared
//! and read-only, the magic is verified, and the block array is exposed as
//! the bytes past the header. The mapping base is page-aligned and the
//! header is exactly one lane wide, so block 0 keeps 16-byte alignment.

use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::num::NonZeroUsize;
use std::path::Path;
use std::ptr::NonNull;

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use crate::error::Error;

/// First 16 bytes of every database file.
pub const DB_MAGIC: &[u8; 16] = b"RAIDPIRDB_v0.9.5";

/// Header length: the magic, nothing else.
pub const DB_HEADER_LEN: usize = 16;

/// An open read-only mapping of a database file. Unmapped on drop. The
/// file descriptor is closed as soon as the mapping exists; the mapping
/// keeps the file alive.
pub(crate) struct MappedFile {
    base: NonNull<c_void>,
    map_len: usize,
}

impl MappedFile {
    /// Map `path` and verify the magic. `data_len` is the declared
    /// `num_blocks * block_size`; the file must hold at least the header
    /// plus that many bytes (anything shorter would fault on access).
    pub fn open(path: &Path, data_len: usize) -> Result<Self, Error> {
        let map_len = data_len + DB_HEADER_LEN;

        let file = File::open(path).map_err(|source| Error::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if file_len < map_len as u64 {
            return Err(Error::OpenFailed {
                path: path.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file holds {file_len} bytes, geometry needs {map_len}"),
                ),
            });
        }

        let len = NonZeroUsize::new(map_len).expect("header makes the mapping non-empty");
        // SAFETY: fresh shared read-only mapping of a file we just opened;
        // no existing Rust references alias it.
        let base = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .map_err(|source| Error::MmapFailed {
            path: path.to_path_buf(),
            source,
        })?;
        // `file` drops here; the mapping keeps the file alive.

        let mapped = MappedFile { base, map_len };
        if &mapped.raw()[..DB_HEADER_LEN] != DB_MAGIC {
            // `mapped` is dropped by the early return, which unmaps.
            return Err(Error::BadMagic {
                path: path.to_path_buf(),
            });
        }
        Ok(mapped)
    }

    #[inline]
    fn raw(&self) -> &[u8] {
        // SAFETY: the mapping is valid for map_len bytes until munmap in Drop.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr() as *const u8, self.map_len) }
    }

    /// The block array: everything past the header.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.raw()[DB_HEADER_LEN..]
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        // SAFETY: base/map_len are exactly what mmap returned.
        let _ = unsafe { munmap(self.base, self.map_len) };
    }
}

// SAFETY: the mapping is private to this handle and read-only; concurrent
// reads from multiple threads are sound. External mutation of the mapped
// file is a host contract, as with any shared database file.
unsafe impl Send for MappedFile {}
unsafe impl Sync for MappedFile {}
