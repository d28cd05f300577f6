//! 4-Russians preprocessing: per-group lookup tables of XOR combinations.
//!
//! Blocks are partitioned into groups of 4. For each group the table holds
//! 16 slots, one per selector nibble; slot `k` is the XOR of the group's
//! blocks picked by the bits of `k` read MSB-first (bit 3 selects the
//! group's first block). With the tables built, a reducer pays one
//! block-XOR per nibble of the query instead of one per set bit.
//!
//! Construction walks Gray codes: consecutive codes differ in one bit, so
//! every slot is the previous slot XOR a single source block. A trailing
//! short group of `r` blocks walks `r`-bit Gray codes with slot indices
//! shifted left, building exactly the slots a masked nibble can reach and
//! leaving the rest zero.

use crate::error::Error;
use crate::store::entry::Entry;
use crate::xor::{xor_into, AlignedBuf};

/// Group width. Fixed: the reducers consume one 4-bit nibble per group.
pub(crate) const BLOCKS_PER_GROUP: usize = 4;

/// Slots per group table (all subsets of a group).
pub(crate) const GROUP_SLOTS: usize = 1 << BLOCKS_PER_GROUP;

/// Slot-index mask that keeps only bits selecting blocks present in a
/// short group of `rows` blocks.
#[inline]
pub(crate) fn present_mask(rows: usize) -> usize {
    debug_assert!(rows >= 1 && rows <= BLOCKS_PER_GROUP);
    (GROUP_SLOTS - 1) & !((1 << (BLOCKS_PER_GROUP - rows)) - 1)
}

/// Build the lookup region for `entry`: `num_groups * 16` block slots,
/// 16-byte aligned, slot 0 of every group all-zero.
pub(crate) fn build_groups(entry: &Entry) -> Result<AlignedBuf, Error> {
    let block_size = entry.block_size;
    let num_groups = entry.num_groups();
    let total = num_groups
        .checked_mul(GROUP_SLOTS)
        .and_then(|slots| slots.checked_mul(block_size))
        .ok_or(Error::OutOfMemory { bytes: usize::MAX })?;

    let mut region = AlignedBuf::zeroed(total).ok_or(Error::OutOfMemory { bytes: total })?;
    let data = entry.storage.bytes();

    for group in 0..num_groups {
        let rows = if group == num_groups - 1 && entry.extra_rows() != 0 {
            entry.extra_rows()
        } else {
            BLOCKS_PER_GROUP
        };
        let src = &data[group * BLOCKS_PER_GROUP * block_size..][..rows * block_size];
        let dst = &mut region.as_mut_slice()[group * GROUP_SLOTS * block_size..][..GROUP_SLOTS * block_size];
        fill_group(dst, src, rows, block_size);
    }
    Ok(region)
}

/// Fill one group table from `rows` source blocks via the Gray-code walk.
///
/// `table` is the group's 16-slot region (already zeroed); `blocks` holds
/// the `rows` source blocks back to back. Slot indices are Gray codes over
/// `rows` bits shifted so they line up with masked selector nibbles.
fn fill_group(table: &mut [u8], blocks: &[u8], rows: usize, block_size: usize) {
    let shift = BLOCKS_PER_GROUP - rows;
    let mut prev_code = 0usize;
    for k in 1..(1usize << rows) {
        let code = k ^ (k >> 1);
        let flipped = code ^ prev_code; // exactly one bit
        // Selector bits are MSB-first, so the lowest bit flips the last row.
        let source_row = rows - 1 - flipped.trailing_zeros() as usize;

        let prev_slot = (prev_code << shift) * block_size;
        let slot = (code << shift) * block_size;
        table.copy_within(prev_slot..prev_slot + block_size, slot);
        xor_into(
            &mut table[slot..slot + block_size],
            &blocks[source_row * block_size..][..block_size],
        );
        prev_code = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::entry::Storage;
    use crate::xor::xor_bytes;

    fn make_entry(block_size: usize, num_blocks: usize) -> Entry {
        let mut buf = AlignedBuf::zeroed(block_size * num_blocks).unwrap();
        for (i, chunk) in buf.as_mut_slice().chunks_mut(block_size).enumerate() {
            // Distinct fill per block so any mix-up shows.
            chunk.fill(0);
            for (j, b) in chunk.iter_mut().enumerate() {
                *b = (i as u8).wrapping_mul(17) ^ (j as u8);
            }
        }
        Entry {
            num_blocks,
            block_size,
            storage: Storage::Owned(buf),
            groups: None,
        }
    }

    /// Slot `k` of group `g` must equal the XOR of the group's blocks
    /// selected by the MSB-first bits of `k`, for every slot a masked
    /// nibble can reach.
    #[test]
    fn slots_match_subset_xor() {
        for num_blocks in [4usize, 5, 6, 7, 8, 13] {
            let block_size = 64;
            let entry = make_entry(block_size, num_blocks);
            let region = build_groups(&entry).unwrap();
            let data = entry.storage.bytes();

            for group in 0..entry.num_groups() {
                let rows = (num_blocks - group * BLOCKS_PER_GROUP).min(BLOCKS_PER_GROUP);
                for k in 0..GROUP_SLOTS {
                    if k & present_mask(rows) != k {
                        continue; // unreachable in a short group, checked elsewhere
                    }
                    let mut expect = vec![0u8; block_size];
                    for i in 0..rows {
                        if k & (1 << (BLOCKS_PER_GROUP - 1 - i)) != 0 {
                            let block =
                                &data[(group * BLOCKS_PER_GROUP + i) * block_size..][..block_size];
                            xor_bytes(&mut expect, block);
                        }
                    }
                    let slot =
                        &region.as_slice()[(group * GROUP_SLOTS + k) * block_size..][..block_size];
                    assert_eq!(slot, &expect[..], "blocks {num_blocks} group {group} slot {k}");
                }
            }
        }
    }

    #[test]
    fn slot_zero_stays_zero() {
        let entry = make_entry(64, 9);
        let region = build_groups(&entry).unwrap();
        for group in 0..entry.num_groups() {
            let slot0 = &region.as_slice()[group * GROUP_SLOTS * 64..][..64];
            assert!(slot0.iter().all(|&b| b == 0), "group {group}");
        }
    }

    #[test]
    fn unreachable_short_group_slots_stay_zero() {
        // 5 blocks: the last group holds one block, so only slots 0 and 8
        // are reachable; everything else must remain zero.
        let entry = make_entry(64, 5);
        let region = build_groups(&entry).unwrap();
        let last = entry.num_groups() - 1;
        for k in 0..GROUP_SLOTS {
            if k == 0 || k == present_mask(1) {
                continue;
            }
            let slot = &region.as_slice()[(last * GROUP_SLOTS + k) * 64..][..64];
            assert!(slot.iter().all(|&b| b == 0), "slot {k}");
        }
    }

    #[test]
    fn mask_values() {
        assert_eq!(present_mask(1), 0b1000);
        assert_eq!(present_mask(2), 0b1100);
        assert_eq!(present_mask(3), 0b1110);
        assert_eq!(present_mask(4), 0b1111);
    }
}
