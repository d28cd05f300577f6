// pirstore — XOR datastore kernel for RAID-PIR mirrors.

//! The server-side performance core of a RAID-PIR mirror: a registry of
//! block-table datastores (heap-owned or file-mapped), a 128-bit SIMD XOR
//! engine, 4-Russians query preprocessing, and bitstring reducers that
//! fold the selected blocks of a query into answer blocks.
//!
//! A host obtains a [`Descriptor`] from a [`Registry`], populates the
//! datastore (or maps a database file), optionally builds the lookup
//! tables, and then answers client queries with the `produce_xor_*`
//! methods. Query methods take `&Registry`, so a host may serve many
//! queries concurrently over a shared registry; see [`pool::WorkerPool`]
//! for a ready-made fan-out.

pub mod cli;
pub mod dbfile;
pub mod error;
pub mod pool;
pub mod store;
pub mod xor;

/// The crate-wide error taxonomy.
pub use error::Error;

/// The datastore registry and its opaque descriptors.
pub use store::{BackendKind, Descriptor, Registry, DEFAULT_CAPACITY};

/// Database file magic and header width.
pub use store::{DB_HEADER_LEN, DB_MAGIC};

/// XOR two equal-length byte strings into a fresh buffer.
pub use xor::xor_buffers;

/// 16-byte-aligned scratch buffers, as used for all SIMD operands.
pub use xor::AlignedBuf;
