//! The datastore registry: a fixed table of block-array datastores
//! addressed by opaque descriptors.
//!
//! The registry is an ordinary owned object, not process-global state; a
//! host embeds one and decides how (or whether) to share it. Reducer
//! operations take `&self` and touch only immutable entry state, so a host
//! may run them concurrently from many threads over a shared reference.
//! Mutating operations take `&mut self`, which makes the
//! readers-concurrent / writers-exclusive rule a compile-time property.

mod entry;
mod mapped;
mod precompute;
mod reduce;

use std::path::Path;

use crate::error::Error;
use crate::xor::AlignedBuf;

use entry::{Entry, Storage};

pub use entry::BackendKind;
pub use mapped::{DB_HEADER_LEN, DB_MAGIC};

use mapped::MappedFile;

/// Registry capacity unless a host asks for another.
pub const DEFAULT_CAPACITY: usize = 16;

/// Opaque handle to a registry slot. Obtainable only from the registry, so
/// no arithmetic can be performed on it; validity is still re-checked at
/// every entry point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Descriptor(usize);

impl Descriptor {
    /// Slot index, for messages and host-side bookkeeping.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity table of datastores.
pub struct Registry {
    slots: Vec<Option<Entry>>,
}

impl Registry {
    /// A registry with [`DEFAULT_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A registry with a caller-chosen slot count. Hosts are expected to
    /// size this for their workload; running out is a configuration error.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Registry { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `d` currently names an active datastore.
    #[inline]
    pub fn is_used(&self, d: Descriptor) -> bool {
        matches!(self.slots.get(d.0), Some(Some(_)))
    }

    fn entry(&self, d: Descriptor) -> Result<&Entry, Error> {
        self.slots
            .get(d.0)
            .and_then(Option::as_ref)
            .ok_or(Error::BadDescriptor { index: d.0 })
    }

    fn entry_mut(&mut self, d: Descriptor) -> Result<&mut Entry, Error> {
        self.slots
            .get_mut(d.0)
            .and_then(Option::as_mut)
            .ok_or(Error::BadDescriptor { index: d.0 })
    }

    /// Lowest-indexed free slot.
    fn free_slot(&self) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::RegistryFull {
                capacity: self.slots.len(),
            })
    }

    fn checked_geometry(block_size: usize, num_blocks: usize) -> Result<usize, Error> {
        if block_size == 0 || block_size % 64 != 0 {
            return Err(Error::InvalidBlockSize { block_size });
        }
        num_blocks
            .checked_mul(block_size)
            .ok_or(Error::OutOfMemory { bytes: usize::MAX })
    }

    /// Create an in-memory datastore of `num_blocks` zeroed blocks.
    pub fn allocate(&mut self, block_size: usize, num_blocks: usize) -> Result<Descriptor, Error> {
        let data_len = Self::checked_geometry(block_size, num_blocks)?;
        let slot = self.free_slot()?;
        let buf = AlignedBuf::zeroed(data_len).ok_or(Error::OutOfMemory { bytes: data_len })?;
        self.slots[slot] = Some(Entry {
            num_blocks,
            block_size,
            storage: Storage::Owned(buf),
            groups: None,
        });
        Ok(Descriptor(slot))
    }

    /// Open a database file read-only and map it as a datastore.
    ///
    /// The file must start with the 16-byte magic; the block array is the
    /// bytes after it. All failures leave the registry unchanged and the
    /// file unmapped.
    pub fn initialize(
        &mut self,
        block_size: usize,
        num_blocks: usize,
        path: impl AsRef<Path>,
    ) -> Result<Descriptor, Error> {
        let data_len = Self::checked_geometry(block_size, num_blocks)?;
        let slot = self.free_slot()?;
        let map = MappedFile::open(path.as_ref(), data_len)?;
        self.slots[slot] = Some(Entry {
            num_blocks,
            block_size,
            storage: Storage::Mapped(map),
            groups: None,
        });
        Ok(Descriptor(slot))
    }

    /// Release a datastore: storage (freed or unmapped) and any
    /// precomputed groups go together, and the slot becomes free.
    /// Deallocating twice reports `BadDescriptor` and changes nothing.
    pub fn deallocate(&mut self, d: Descriptor) -> Result<(), Error> {
        let slot = self
            .slots
            .get_mut(d.0)
            .ok_or(Error::BadDescriptor { index: d.0 })?;
        if slot.is_none() {
            return Err(Error::BadDescriptor { index: d.0 });
        }
        *slot = None; // drops Entry: storage and groups in one step
        Ok(())
    }

    /// Copy `bytes` into the datastore at `offset`. In-memory backend only.
    pub fn set_data(&mut self, d: Descriptor, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let index = d.0;
        let entry = self.entry_mut(d)?;
        let limit = entry.data_len();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= limit)
            .ok_or(Error::OutOfBounds {
                offset,
                quantity: bytes.len(),
                limit,
            })?;
        let data = entry
            .storage
            .writable()
            .ok_or(Error::ReadOnlyBackend { index })?;
        data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `quantity` bytes out of the datastore starting at `offset`.
    pub fn get_data(&self, d: Descriptor, offset: usize, quantity: usize) -> Result<Vec<u8>, Error> {
        let entry = self.entry(d)?;
        let limit = entry.data_len();
        let end = offset
            .checked_add(quantity)
            .filter(|&end| end <= limit)
            .ok_or(Error::OutOfBounds {
                offset,
                quantity,
                limit,
            })?;
        Ok(entry.storage.bytes()[offset..end].to_vec())
    }

    /// Build the 4-Russians lookup tables for `d` from its current
    /// contents. Mutating the datastore afterwards leaves the tables
    /// stale; rebuild before the next precomputed query (host contract,
    /// not tracked by the kernel). On allocation failure the entry keeps
    /// no tables and the error is returned.
    pub fn do_preprocessing(&mut self, d: Descriptor) -> Result<(), Error> {
        let entry = self.entry_mut(d)?;
        entry.groups = None; // stale tables never outlive a rebuild attempt
        let region = precompute::build_groups(entry)?;
        entry.groups = Some(region);
        Ok(())
    }

    /// Whether `d` currently has precomputed group tables.
    pub fn has_precomputed(&self, d: Descriptor) -> Result<bool, Error> {
        Ok(self.entry(d)?.groups.is_some())
    }

    pub fn block_size(&self, d: Descriptor) -> Result<usize, Error> {
        Ok(self.entry(d)?.block_size)
    }

    pub fn num_blocks(&self, d: Descriptor) -> Result<usize, Error> {
        Ok(self.entry(d)?.num_blocks)
    }

    pub fn backend_kind(&self, d: Descriptor) -> Result<BackendKind, Error> {
        Ok(self.entry(d)?.storage.kind())
    }

    /// Answer one bitstring query: the XOR of the blocks its set bits
    /// select, as one block of `block_size` bytes.
    pub fn produce_xor_from_bitstring(
        &self,
        d: Descriptor,
        bitstring: &[u8],
        use_precomputed: bool,
    ) -> Result<Vec<u8>, Error> {
        let index = d.0;
        let entry = self.entry(d)?;
        let block_size = entry.block_size;
        let mut result = AlignedBuf::zeroed(block_size).ok_or(Error::OutOfMemory {
            bytes: block_size,
        })?;
        if use_precomputed {
            let groups = entry
                .groups
                .as_ref()
                .ok_or(Error::PreprocNotBuilt { index })?;
            reduce::xor_bitstring_grouped(entry, groups.as_slice(), bitstring, result.as_mut_slice());
        } else {
            reduce::xor_bitstring_plain(entry, bitstring, result.as_mut_slice());
        }
        Ok(result.as_slice().to_vec())
    }

    /// Answer `num_strings` parallel queries in one pass over the blocks.
    ///
    /// `bitstring` is the concatenation of `num_strings` equal-length
    /// slices; the result is the concatenation of the per-slice answer
    /// blocks. The walk order (blocks outer, slices inner) is the point:
    /// the datastore is traversed once however many queries ride along.
    pub fn produce_xor_from_bitstrings(
        &self,
        d: Descriptor,
        bitstring: &[u8],
        num_strings: u32,
        use_precomputed: bool,
    ) -> Result<Vec<u8>, Error> {
        let index = d.0;
        let n = num_strings as usize;
        if n == 0 || bitstring.len() % n != 0 {
            return Err(Error::LengthMismatch {
                left: bitstring.len(),
                right: n,
            });
        }
        let slice_len = bitstring.len() / n;

        let entry = self.entry(d)?;
        let out_len = entry
            .block_size
            .checked_mul(n)
            .ok_or(Error::OutOfMemory { bytes: usize::MAX })?;
        let mut result =
            AlignedBuf::zeroed(out_len).ok_or(Error::OutOfMemory { bytes: out_len })?;
        if use_precomputed {
            let groups = entry
                .groups
                .as_ref()
                .ok_or(Error::PreprocNotBuilt { index })?;
            reduce::xor_multi_grouped(
                entry,
                groups.as_slice(),
                bitstring,
                slice_len,
                n,
                result.as_mut_slice(),
            );
        } else {
            reduce::xor_multi_plain(entry, bitstring, slice_len, n, result.as_mut_slice());
        }
        Ok(result.as_slice().to_vec())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_scans_lowest_free_slot() {
        let mut reg = Registry::with_capacity(4);
        let d0 = reg.allocate(64, 2).unwrap();
        let d1 = reg.allocate(64, 2).unwrap();
        let d2 = reg.allocate(64, 2).unwrap();
        assert_eq!((d0.index(), d1.index(), d2.index()), (0, 1, 2));

        reg.deallocate(d1).unwrap();
        let d1_again = reg.allocate(64, 2).unwrap();
        assert_eq!(d1_again.index(), 1);
    }

    #[test]
    fn rejects_bad_block_sizes() {
        let mut reg = Registry::new();
        for bad in [0usize, 1, 63, 65, 100] {
            assert!(
                matches!(
                    reg.allocate(bad, 4),
                    Err(Error::InvalidBlockSize { block_size }) if block_size == bad
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn registry_full_is_reported() {
        let mut reg = Registry::with_capacity(2);
        reg.allocate(64, 1).unwrap();
        reg.allocate(64, 1).unwrap();
        assert!(matches!(
            reg.allocate(64, 1),
            Err(Error::RegistryFull { capacity: 2 })
        ));
    }

    #[test]
    fn double_deallocate_is_reported_not_fatal() {
        let mut reg = Registry::new();
        let d = reg.allocate(64, 1).unwrap();
        reg.deallocate(d).unwrap();
        assert!(matches!(
            reg.deallocate(d),
            Err(Error::BadDescriptor { index: 0 })
        ));
        // The slot is genuinely free again.
        assert_eq!(reg.allocate(64, 1).unwrap().index(), 0);
    }

    #[test]
    fn set_data_bounds_are_checked() {
        let mut reg = Registry::new();
        let d = reg.allocate(64, 2).unwrap();
        assert!(reg.set_data(d, 0, &[1u8; 128]).is_ok());
        assert!(matches!(
            reg.set_data(d, 1, &[1u8; 128]),
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            reg.set_data(d, usize::MAX, &[1u8; 1]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn precomputed_query_requires_preprocessing() {
        let mut reg = Registry::new();
        let d = reg.allocate(64, 4).unwrap();
        assert!(matches!(
            reg.produce_xor_from_bitstring(d, &[0xF0], true),
            Err(Error::PreprocNotBuilt { index: 0 })
        ));
        reg.do_preprocessing(d).unwrap();
        assert!(reg.produce_xor_from_bitstring(d, &[0xF0], true).is_ok());
    }

    #[test]
    fn multi_rejects_ragged_input() {
        let mut reg = Registry::new();
        let d = reg.allocate(64, 8).unwrap();
        assert!(matches!(
            reg.produce_xor_from_bitstrings(d, &[0u8; 3], 2, false),
            Err(Error::LengthMismatch { left: 3, right: 2 })
        ));
        assert!(matches!(
            reg.produce_xor_from_bitstrings(d, &[0u8; 2], 0, false),
            Err(Error::LengthMismatch { .. })
        ));
    }
}
