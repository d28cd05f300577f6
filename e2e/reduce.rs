//! E2E: reducer semantics — boundary scenarios and the algebraic
//! properties both reduction paths must satisfy.

use pirstore::{xor_buffers, Registry};

/// Build an in-memory datastore where block `i` is filled with `fill(i)`.
fn filled_store(reg: &mut Registry, block_size: usize, num_blocks: usize, fill: impl Fn(usize) -> u8) -> pirstore::Descriptor {
    let d = reg.allocate(block_size, num_blocks).unwrap();
    for i in 0..num_blocks {
        let block = vec![fill(i); block_size];
        reg.set_data(d, i * block_size, &block).unwrap();
    }
    d
}

// ─────────────────────────────────────────────────────────────────────────────
// A single set bit returns exactly that block
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn one_bit_selects_one_block() {
    let mut reg = Registry::new();
    let d = reg.allocate(64, 8).unwrap();
    reg.set_data(d, 3 * 64, &[0x03; 64]).unwrap();

    // Bit 3 (MSB-first) of byte 0.
    let answer = reg.produce_xor_from_bitstring(d, &[0x10, 0x00], false).unwrap();
    assert_eq!(answer, vec![0x03; 64]);
}

#[test]
fn each_single_bit_returns_its_block() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 16, |i| (i as u8) * 3 + 1);
    reg.do_preprocessing(d).unwrap();

    for i in 0..16usize {
        let mut bits = [0u8; 2];
        bits[i / 8] = 0x80 >> (i % 8);
        for flag in [false, true] {
            let answer = reg.produce_xor_from_bitstring(d, &bits, flag).unwrap();
            assert_eq!(answer, vec![(i as u8) * 3 + 1; 64], "bit {i} flag {flag}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parity of all 16 blocks filled 0..15 cancels to zero
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_parity_of_nibble_fill_cancels() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 16, |i| i as u8);

    let answer = reg.produce_xor_from_bitstring(d, &[0xFF, 0xFF], false).unwrap();
    assert_eq!(answer, vec![0u8; 64]);
}

// ─────────────────────────────────────────────────────────────────────────────
// An all-zero bitstring reduces to a zero block
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn zero_bitstring_returns_zero_block() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 12, |i| i as u8 | 0x40);
    reg.do_preprocessing(d).unwrap();
    for flag in [false, true] {
        let answer = reg.produce_xor_from_bitstring(d, &[0x00, 0x00], flag).unwrap();
        assert_eq!(answer, vec![0u8; 64], "flag {flag}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Short last group: excess bits are ignored, both paths agree
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn short_last_group_ignores_excess_bits() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 5, |i| 1u8 << i);
    reg.do_preprocessing(d).unwrap();

    // 0x7F selects blocks 1..7; only 1..4 exist. Expected parity:
    // blocks 1,2,3,4 = 0x02 ^ 0x04 ^ 0x08 ^ 0x10 = 0x1E.
    let plain = reg.produce_xor_from_bitstring(d, &[0x7F], false).unwrap();
    let grouped = reg.produce_xor_from_bitstring(d, &[0x7F], true).unwrap();
    assert_eq!(plain, vec![0x1E; 64]);
    assert_eq!(grouped, plain);

    // The lone bit addressing block 4 must reach it on both paths.
    let plain = reg.produce_xor_from_bitstring(d, &[0x08], false).unwrap();
    let grouped = reg.produce_xor_from_bitstring(d, &[0x08], true).unwrap();
    assert_eq!(plain, vec![0x10; 64]);
    assert_eq!(grouped, plain);
}

// ─────────────────────────────────────────────────────────────────────────────
// Plain and precomputed paths agree on arbitrary queries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn paths_agree_across_sizes_and_patterns() {
    for num_blocks in [1usize, 4, 5, 6, 7, 8, 9, 23, 64] {
        let mut reg = Registry::new();
        let d = filled_store(&mut reg, 64, num_blocks, |i| {
            (i as u8).wrapping_mul(37).wrapping_add(11)
        });
        reg.do_preprocessing(d).unwrap();

        let nbytes = num_blocks.div_ceil(8);
        let mut state = 0x243F_6A88u32;
        for _ in 0..16 {
            let bits: Vec<u8> = (0..nbytes)
                .map(|_| {
                    state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                    (state >> 24) as u8
                })
                .collect();
            let plain = reg.produce_xor_from_bitstring(d, &bits, false).unwrap();
            let grouped = reg.produce_xor_from_bitstring(d, &bits, true).unwrap();
            assert_eq!(plain, grouped, "num_blocks {num_blocks} bits {bits:02x?}");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Linearity: reduce(b1) ^ reduce(b2) == reduce(b1 ^ b2)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reduction_is_linear_in_the_bitstring() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 16, |i| (i as u8).wrapping_mul(73));

    let b1 = [0xC3u8, 0x5A];
    let b2 = [0x66u8, 0x0F];
    let b3: Vec<u8> = b1.iter().zip(&b2).map(|(x, y)| x ^ y).collect();

    let r1 = reg.produce_xor_from_bitstring(d, &b1, false).unwrap();
    let r2 = reg.produce_xor_from_bitstring(d, &b2, false).unwrap();
    let r3 = reg.produce_xor_from_bitstring(d, &b3, false).unwrap();
    assert_eq!(xor_buffers(&r1, &r2).unwrap(), r3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi-query output equals per-slice single queries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn multi_query_matches_concatenated_singles() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 13, |i| (i as u8) ^ 0xA5);
    reg.do_preprocessing(d).unwrap();

    let slices: [&[u8]; 3] = [&[0x80, 0x40], &[0x13, 0x37], &[0xFF, 0xF8]];
    let concat: Vec<u8> = slices.concat();

    for flag in [false, true] {
        let batched = reg
            .produce_xor_from_bitstrings(d, &concat, 3, flag)
            .unwrap();
        assert_eq!(batched.len(), 3 * 64);
        for (j, slice) in slices.iter().enumerate() {
            let single = reg.produce_xor_from_bitstring(d, slice, flag).unwrap();
            assert_eq!(&batched[j * 64..][..64], &single[..], "slice {j} flag {flag}");
        }
    }
}

#[test]
fn multi_query_single_slice_degenerates_to_single() {
    let mut reg = Registry::new();
    let d = filled_store(&mut reg, 64, 8, |i| i as u8 + 1);

    let bits = [0xB1u8];
    let single = reg.produce_xor_from_bitstring(d, &bits, false).unwrap();
    let multi = reg.produce_xor_from_bitstrings(d, &bits, 1, false).unwrap();
    assert_eq!(single, multi);
}

// ─────────────────────────────────────────────────────────────────────────────
// Larger block sizes exercise the full vector path
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn wide_blocks_reduce_correctly() {
    let mut reg = Registry::new();
    let block_size = 4096;
    let d = reg.allocate(block_size, 6).unwrap();
    for i in 0..6usize {
        let block: Vec<u8> = (0..block_size)
            .map(|j| ((i * 131 + j * 7) % 251) as u8)
            .collect();
        reg.set_data(d, i * block_size, &block).unwrap();
    }
    reg.do_preprocessing(d).unwrap();

    // Blocks 0, 2, 5 selected.
    let bits = [0b1010_0100u8];
    let mut expect = vec![0u8; block_size];
    for i in [0usize, 2, 5] {
        for (e, b) in expect
            .iter_mut()
            .zip(reg.get_data(d, i * block_size, block_size).unwrap())
        {
            *e ^= b;
        }
    }
    assert_eq!(reg.produce_xor_from_bitstring(d, &bits, false).unwrap(), expect);
    assert_eq!(reg.produce_xor_from_bitstring(d, &bits, true).unwrap(), expect);
}
