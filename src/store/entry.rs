//! One datastore entry: geometry, backing storage, optional group tables.

use crate::store::mapped::MappedFile;
use crate::store::precompute::BLOCKS_PER_GROUP;
use crate::xor::AlignedBuf;

/// Which backend holds the block array.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BackendKind {
    /// Heap-owned, zero-initialised, writable through `set_data`.
    InMemory,
    /// Read-only mapping of a database file.
    FileMapped,
}

/// Backing storage for a block array. Either way the exposed view is a
/// 16-byte-aligned run of `num_blocks * block_size` bytes.
pub(crate) enum Storage {
    Owned(AlignedBuf),
    Mapped(MappedFile),
}

impl Storage {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned(buf) => buf.as_slice(),
            Storage::Mapped(map) => map.data(),
        }
    }

    /// Writable view, or `None` for the read-only mapped backend.
    #[inline]
    pub fn writable(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::Owned(buf) => Some(buf.as_mut_slice()),
            Storage::Mapped(_) => None,
        }
    }

    #[inline]
    pub fn kind(&self) -> BackendKind {
        match self {
            Storage::Owned(_) => BackendKind::InMemory,
            Storage::Mapped(_) => BackendKind::FileMapped,
        }
    }
}

/// A fully-initialised datastore. A registry slot is either `Some(Entry)`
/// with every field live, or `None`; there is no partial state.
pub(crate) struct Entry {
    pub num_blocks: usize,
    pub block_size: usize,
    pub storage: Storage,
    /// 4-Russians lookup region; present only after successful preprocessing.
    /// Freed together with `storage` when the entry is dropped.
    pub groups: Option<AlignedBuf>,
}

impl Entry {
    /// Total byte span of the block array.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.num_blocks * self.block_size
    }

    /// Number of 4-block groups, counting a trailing short group.
    #[inline]
    pub fn num_groups(&self) -> usize {
        self.num_blocks.div_ceil(BLOCKS_PER_GROUP)
    }

    /// Blocks in the trailing short group, or 0 when every group is full.
    #[inline]
    pub fn extra_rows(&self) -> usize {
        self.num_blocks % BLOCKS_PER_GROUP
    }
}
