//! Error taxonomy for the datastore kernel.
//!
//! Every fallible operation in the crate surfaces one of these variants;
//! nothing is swallowed internally. Variants carry the values a caller needs
//! to produce a useful report (slot index, offending offsets, the path and
//! OS-level cause for file operations).

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors returned by the registry, the reducers, and the buffer helpers.
#[derive(Debug)]
pub enum Error {
    /// Block size is zero or not a multiple of 64 bytes.
    InvalidBlockSize { block_size: usize },
    /// Every registry slot is in use.
    RegistryFull { capacity: usize },
    /// An aligned allocation failed (or the requested size overflows).
    OutOfMemory { bytes: usize },
    /// The descriptor does not name a used registry slot.
    BadDescriptor { index: usize },
    /// `offset + quantity` exceeds the datastore's byte span.
    OutOfBounds {
        offset: usize,
        quantity: usize,
        limit: usize,
    },
    /// Write attempted on a file-mapped (read-only) datastore.
    ReadOnlyBackend { index: usize },
    /// The database file could not be opened or inspected.
    OpenFailed { path: PathBuf, source: io::Error },
    /// The `mmap` call itself failed.
    MmapFailed { path: PathBuf, source: nix::Error },
    /// The file does not start with the 16-byte database magic.
    BadMagic { path: PathBuf },
    /// A reducer was invoked with `use_precomputed` before `do_preprocessing`.
    PreprocNotBuilt { index: usize },
    /// Two buffers (or a concatenated bitstring and its count) disagree in length.
    LengthMismatch { left: usize, right: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBlockSize { block_size } => {
                write!(f, "block size {block_size} is not a positive multiple of 64")
            }
            Error::RegistryFull { capacity } => {
                write!(f, "all {capacity} datastore slots are in use")
            }
            Error::OutOfMemory { bytes } => {
                write!(f, "failed to allocate {bytes} bytes")
            }
            Error::BadDescriptor { index } => {
                write!(f, "descriptor {index} does not name an active datastore")
            }
            Error::OutOfBounds {
                offset,
                quantity,
                limit,
            } => {
                write!(
                    f,
                    "range of {quantity} bytes at offset {offset} exceeds datastore span of {limit} bytes"
                )
            }
            Error::ReadOnlyBackend { index } => {
                write!(f, "descriptor {index} is file-mapped and rejects writes")
            }
            Error::OpenFailed { path, source } => {
                write!(f, "database file {}: {source}", path.display())
            }
            Error::MmapFailed { path, source } => {
                write!(f, "cannot map database file {}: {source}", path.display())
            }
            Error::BadMagic { path } => {
                write!(f, "{} is not a RAID-PIR database file", path.display())
            }
            Error::PreprocNotBuilt { index } => {
                write!(
                    f,
                    "descriptor {index} has no precomputed groups; run preprocessing first"
                )
            }
            Error::LengthMismatch { left, right } => {
                write!(f, "mismatched lengths: {left} and {right}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenFailed { source, .. } => Some(source),
            Error::MmapFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
