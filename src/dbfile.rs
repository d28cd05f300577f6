//! Database file producer and loader.
//!
//! The on-disk format is deliberately bare: the 16-byte magic, then raw
//! block data with no framing or size metadata. Geometry travels
//! out-of-band, so the writer reports how many blocks it produced and the
//! reader takes the block size on trust.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::store::{DB_HEADER_LEN, DB_MAGIC};

/// Write `payload` to `path` in database format: magic, then the payload
/// zero-padded up to a whole number of `block_size`-byte blocks. Returns
/// the number of blocks written.
pub fn write_db(path: &Path, block_size: usize, payload: &[u8]) -> Result<usize, Error> {
    if block_size == 0 || block_size % 64 != 0 {
        return Err(Error::InvalidBlockSize { block_size });
    }
    let num_blocks = payload.len().div_ceil(block_size);

    let open_err = |source| Error::OpenFailed {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(open_err)?;
    let mut out = BufWriter::new(file);
    out.write_all(DB_MAGIC).map_err(open_err)?;
    out.write_all(payload).map_err(open_err)?;
    let padding = num_blocks * block_size - payload.len();
    if padding > 0 {
        out.write_all(&vec![0u8; padding]).map_err(open_err)?;
    }
    out.flush().map_err(open_err)?;
    Ok(num_blocks)
}

/// Read a database file into memory, verifying the magic. Returns the
/// block count and the block data (any trailing partial block is
/// dropped, mirroring what a mapped view of the same geometry exposes).
pub fn read_db(path: &Path, block_size: usize) -> Result<(usize, Vec<u8>), Error> {
    if block_size == 0 || block_size % 64 != 0 {
        return Err(Error::InvalidBlockSize { block_size });
    }
    let raw = std::fs::read(path).map_err(|source| Error::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.len() < DB_HEADER_LEN || &raw[..DB_HEADER_LEN] != DB_MAGIC {
        return Err(Error::BadMagic {
            path: path.to_path_buf(),
        });
    }
    let mut data = raw;
    data.drain(..DB_HEADER_LEN);
    let num_blocks = data.len() / block_size;
    data.truncate(num_blocks * block_size);
    Ok((num_blocks, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_pads_to_block_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pad.db");
        let payload = vec![0xCDu8; 100];

        let blocks = write_db(&path, 64, &payload).unwrap();
        assert_eq!(blocks, 2);

        let (num_blocks, data) = read_db(&path, 64).unwrap();
        assert_eq!(num_blocks, 2);
        assert_eq!(&data[..100], &payload[..]);
        assert!(data[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foreign.db");
        std::fs::write(&path, b"definitely not a database").unwrap();
        assert!(matches!(
            read_db(&path, 64),
            Err(Error::BadMagic { .. })
        ));
    }

    #[test]
    fn rejects_bad_block_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.db");
        assert!(matches!(
            write_db(&path, 100, &[0u8; 10]),
            Err(Error::InvalidBlockSize { block_size: 100 })
        ));
    }
}
