//! The XOR engine: byte-wise loops for ragged edges, 128-bit vector lanes
//! for everything in between.
//!
//! The lane path is the kernel's performance floor; every reducer funnels
//! through [`xor_full_blocks`]. On x86-64 it compiles to SSE2
//! load/xor/store; elsewhere a 16-byte integer fallback keeps the same
//! contract.

use crate::error::Error;
use crate::xor::buffer::{AlignedBuf, ALIGNMENT};

/// Width of one vector lane in bytes.
pub const LANE: usize = 16;

/// XOR `count` 16-byte lanes of `src` into `dest`.
///
/// This is the hot path inside the reducers; both pointers are expected to
/// come from lane-aligned regions.
///
/// # Safety
/// - `dest` and `src` are 16-byte aligned.
/// - Both are valid for `count * 16` bytes (writes for `dest`, reads for
///   `src`) and do not overlap.
#[inline(always)]
pub unsafe fn xor_full_blocks(dest: *mut u8, src: *const u8, count: usize) {
    #[cfg(target_arch = "x86_64")]
    {
        use core::arch::x86_64::{_mm_load_si128, _mm_store_si128, _mm_xor_si128, __m128i};

        let mut d = dest as *mut __m128i;
        let mut s = src as *const __m128i;
        for _ in 0..count {
            _mm_store_si128(d, _mm_xor_si128(_mm_load_si128(d), _mm_load_si128(s)));
            d = d.add(1);
            s = s.add(1);
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        // 16-byte alignment satisfies u128 alignment on every supported target.
        let mut d = dest as *mut u128;
        let mut s = src as *const u128;
        for _ in 0..count {
            *d ^= *s;
            d = d.add(1);
            s = s.add(1);
        }
    }
}

/// Byte-wise XOR of `src` into `dest`. Used for unaligned heads and tails.
#[inline(always)]
pub fn xor_bytes(dest: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dest.len(), src.len());
    for (d, s) in dest.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// XOR `src` into `dest` in place.
///
/// Short inputs (up to one lane) go byte-wise. Longer inputs require both
/// slices to share the same address remainder modulo 16, which every caller
/// in this crate guarantees; the head bytes up to the first lane boundary
/// and the tail bytes after the last full lane are handled byte-wise, the
/// middle with full vector lanes.
///
/// # Panics
/// When the lengths differ, or when the alignment remainders differ on the
/// vector path. Both are programmer errors, not data errors.
pub fn xor_into(dest: &mut [u8], src: &[u8]) {
    assert_eq!(dest.len(), src.len(), "xor_into: length mismatch");
    let n = dest.len();
    if n <= LANE {
        xor_bytes(dest, src);
        return;
    }

    let dest_rem = dest.as_ptr() as usize % LANE;
    let src_rem = src.as_ptr() as usize % LANE;
    assert_eq!(
        dest_rem, src_rem,
        "xor_into: dest and src must be identically aligned"
    );

    let head = (LANE - src_rem) % LANE;
    xor_bytes(&mut dest[..head], &src[..head]);

    let lanes = (n - head) / LANE;
    // SAFETY: both ranges start lane-aligned (same remainder, offset by
    // `head`), cover `lanes * 16` bytes inside the slices, and the borrows
    // guarantee no overlap.
    unsafe {
        xor_full_blocks(dest[head..].as_mut_ptr(), src[head..].as_ptr(), lanes);
    }

    let tail_start = head + lanes * LANE;
    xor_bytes(&mut dest[tail_start..], &src[tail_start..]);
}

/// XOR two equal-length byte strings into a fresh buffer.
///
/// Convenience operation for hosts (PIR clients combine mirror answers this
/// way). The scratch buffer is aligned to `b`'s remainder so the vector
/// path applies to the bulk of the data.
pub fn xor_buffers(a: &[u8], b: &[u8]) -> Result<Vec<u8>, Error> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let len = a.len();
    let mut scratch = AlignedBuf::zeroed(len + ALIGNMENT).ok_or(Error::OutOfMemory {
        bytes: len + ALIGNMENT,
    })?;
    let shift = b.as_ptr() as usize % ALIGNMENT;
    let dest = &mut scratch.as_mut_slice()[shift..shift + len];
    dest.copy_from_slice(a);
    xor_into(dest, b);
    Ok(dest.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn involution_restores_dest() {
        for len in [1usize, 5, 16, 17, 63, 64, 100, 1024] {
            let src = pattern(len, 7);
            let orig = pattern(len, 99);
            let mut dest = orig.clone();
            xor_into(&mut dest, &src);
            xor_into(&mut dest, &src);
            assert_eq!(dest, orig, "len {len}");
        }
    }

    #[test]
    fn matches_scalar_reference() {
        for len in [2usize, 16, 17, 31, 32, 33, 255, 4096] {
            let src = pattern(len, 3);
            let mut dest = pattern(len, 200);
            let expect: Vec<u8> = dest.iter().zip(&src).map(|(d, s)| d ^ s).collect();
            xor_into(&mut dest, &src);
            assert_eq!(dest, expect, "len {len}");
        }
    }

    #[test]
    fn misaligned_head_and_tail() {
        // Slice both buffers at the same odd offset so the shared-remainder
        // precondition holds while the head/tail paths get exercised.
        let src = pattern(256, 11);
        let mut dest = pattern(256, 42);
        let expect: Vec<u8> = dest[3..250].iter().zip(&src[3..250]).map(|(d, s)| d ^ s).collect();
        xor_into(&mut dest[3..250], &src[3..250]);
        assert_eq!(&dest[3..250], &expect[..]);
    }

    #[test]
    fn xor_buffers_roundtrip() {
        let a = pattern(777, 1);
        let b = pattern(777, 2);
        let c = xor_buffers(&a, &b).unwrap();
        let back = xor_buffers(&c, &b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn xor_buffers_rejects_length_mismatch() {
        let err = xor_buffers(&[0u8; 4], &[0u8; 5]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { left: 4, right: 5 }));
    }
}
