//! Lane-level load/store utilities for the AVX2 kernels.
//!
//! Residual tiles cover fewer than 8 rows or columns, so every destination
//! width needs an exact-`n` store that touches no byte past element `n - 1`,
//! and bias/multiplier loads need a matching exact-`n` load that never reads
//! past the slice. 32-bit elements use AVX2 masked moves; narrower elements
//! are packed in-register by byte shuffle and then copied out with a bounded
//! `copy_nonoverlapping`.
//!
//! All functions here require AVX2 to be enabled at the call site.

use std::arch::x86_64::*;

/// Lanes per 256-bit vector at 32 bits each.
pub const LANE_COUNT: usize = 8;

/// Mask with the low `n` lanes enabled, for `_mm256_maskload_*` /
/// `_mm256_maskstore_*`. `n` must be below [`LANE_COUNT`]; full-width
/// accesses take the unmasked fast path instead.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn partial_mask(n: usize) -> __m256i {
    debug_assert!(n < LANE_COUNT);
    match n {
        0 => _mm256_setzero_si256(),
        1 => _mm256_setr_epi32(-1, 0, 0, 0, 0, 0, 0, 0),
        2 => _mm256_setr_epi32(-1, -1, 0, 0, 0, 0, 0, 0),
        3 => _mm256_setr_epi32(-1, -1, -1, 0, 0, 0, 0, 0),
        4 => _mm256_setr_epi32(-1, -1, -1, -1, 0, 0, 0, 0),
        5 => _mm256_setr_epi32(-1, -1, -1, -1, -1, 0, 0, 0),
        6 => _mm256_setr_epi32(-1, -1, -1, -1, -1, -1, 0, 0),
        7 => _mm256_setr_epi32(-1, -1, -1, -1, -1, -1, -1, 0),
        _ => unreachable!(),
    }
}

/// Loads `n` i32 lanes from `src`, zero-filling the rest. Reads exactly
/// `n` elements.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn load_n_epi32(src: *const i32, n: usize) -> __m256i {
    if n == LANE_COUNT {
        _mm256_loadu_si256(src as *const __m256i)
    } else {
        _mm256_maskload_epi32(src, partial_mask(n))
    }
}

/// Loads `n` f32 lanes from `src`, zero-filling the rest.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn load_n_ps(src: *const f32, n: usize) -> __m256 {
    if n == LANE_COUNT {
        _mm256_loadu_ps(src)
    } else {
        _mm256_maskload_ps(src, partial_mask(n))
    }
}

/// Stores the low `n` i32 lanes of `v` to `dst`. Writes exactly `n`
/// elements.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn store_n_epi32(dst: *mut i32, n: usize, v: __m256i) {
    if n == LANE_COUNT {
        _mm256_storeu_si256(dst as *mut __m256i, v);
    } else {
        _mm256_maskstore_epi32(dst, partial_mask(n), v);
    }
}

/// Stores the low `n` f32 lanes of `v` to `dst`.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn store_n_ps(dst: *mut f32, n: usize, v: __m256) {
    if n == LANE_COUNT {
        _mm256_storeu_ps(dst, v);
    } else {
        _mm256_maskstore_ps(dst, partial_mask(n), v);
    }
}

/// Truncates each i32 lane of `v` to its low byte and packs the 8 bytes in
/// lane order.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn pack_epi32_to_bytes(v: __m256i) -> [u8; 8] {
    // Byte 0 of each 32-bit lane, gathered within each 128-bit half.
    let shuffled = _mm256_shuffle_epi8(v, _mm256_set1_epi32(0x0c08_0400));
    let lo = _mm_cvtsi128_si32(_mm256_castsi256_si128(shuffled)) as u32;
    let hi = _mm_cvtsi128_si32(_mm256_extracti128_si256::<1>(shuffled)) as u32;
    ((u64::from(hi) << 32) | u64::from(lo)).to_le_bytes()
}

/// Truncates each i32 lane of `v` to its low 16 bits and packs the 8 values
/// in lane order.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn pack_epi32_to_words(v: __m256i) -> [u8; 16] {
    // Bytes 0..2 of each 32-bit lane, gathered within each 128-bit half.
    let shuffled = _mm256_shuffle_epi8(v, _mm256_set1_epi64x(0x0d0c_0908_0504_0100));
    let lo = _mm_cvtsi128_si64(_mm256_castsi256_si128(shuffled)) as u64;
    let hi = _mm_cvtsi128_si64(_mm256_extracti128_si256::<1>(shuffled)) as u64;
    let mut packed = [0u8; 16];
    packed[..8].copy_from_slice(&lo.to_le_bytes());
    packed[8..].copy_from_slice(&hi.to_le_bytes());
    packed
}

/// Narrows the 8 i32 lanes of `v` to bytes by truncation and stores `n` of
/// them at `dst`. Signedness of the destination is the caller's concern;
/// the bit pattern is the low byte either way.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn store_n_cvtepi32_epi8(dst: *mut u8, n: usize, v: __m256i) {
    debug_assert!(n <= LANE_COUNT);
    let packed = pack_epi32_to_bytes(v);
    std::ptr::copy_nonoverlapping(packed.as_ptr(), dst, n);
}

/// Narrows the 8 i32 lanes of `v` to 16 bits by truncation and stores `n`
/// of them at `dst`.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn store_n_cvtepi32_epi16(dst: *mut i16, n: usize, v: __m256i) {
    debug_assert!(n <= LANE_COUNT);
    let packed = pack_epi32_to_words(v);
    std::ptr::copy_nonoverlapping(packed.as_ptr(), dst as *mut u8, 2 * n);
}

/// Extracts i32 lane `i` of `v`. The extract intrinsic wants a constant
/// lane index, hence the match.
#[inline]
#[target_feature(enable = "avx2")]
pub unsafe fn extract_epi32(v: __m256i, i: usize) -> i32 {
    debug_assert!(i < LANE_COUNT);
    match i {
        0 => _mm256_extract_epi32::<0>(v),
        1 => _mm256_extract_epi32::<1>(v),
        2 => _mm256_extract_epi32::<2>(v),
        3 => _mm256_extract_epi32::<3>(v),
        4 => _mm256_extract_epi32::<4>(v),
        5 => _mm256_extract_epi32::<5>(v),
        6 => _mm256_extract_epi32::<6>(v),
        7 => _mm256_extract_epi32::<7>(v),
        _ => unreachable!(),
    }
}
