//! AVX2 quantized int8 tile kernel.
//!
//! One vector register holds the 8 row accumulators of one destination
//! column; eight registers cover a tile. The depth loop consumes 4 depth
//! values per iteration from both packed panels: the LHS chunk is split into
//! even/odd 16-bit pairs and each RHS column's pair is broadcast against it
//! with `_mm256_madd_epi16`, accumulating two products per 32-bit lane per
//! instruction.
//!
//! Requantization multiplies each accumulator by a Q0.31 fixed-point mantissa
//! in 64-bit halves. AVX2 has no 64-bit arithmetic right shift, so the
//! rounding shift biases values into unsigned range, shifts logically, and
//! subtracts the bias afterwards.

use std::arch::x86_64::*;

use super::lanes;
use crate::params::{DstStorage, Int8KernelParams, Rescale};
use crate::{DEPTH_CHUNK, TILE_COLS, TILE_ROWS};

/// Gathers the even 16-bit pair of each row's 4-byte depth group into the
/// low half of each 128-bit lane and the odd pair into the high half.
const SPLITTER: [i8; 32] = [
    0, 1, 4, 5, 8, 9, 12, 13, 2, 3, 6, 7, 10, 11, 14, 15, //
    0, 1, 4, 5, 8, 9, 12, 13, 2, 3, 6, 7, 10, 11, 14, 15,
];

/// Quantized int8 kernel over the tile range named by `params`.
///
/// # Safety
///
/// AVX2 must be available, and `params` must satisfy
/// [`Int8KernelParams::validate`].
#[target_feature(enable = "avx2")]
pub unsafe fn int8_kernel(params: &mut Int8KernelParams<'_>) {
    let depth = params.depth;
    debug_assert_eq!(depth % DEPTH_CHUNK, 0);
    debug_assert!(depth > 0);
    debug_assert!(params.last_row < params.dst_rows && params.last_col < params.dst_cols);

    let splitter = _mm256_loadu_si256(SPLITTER.as_ptr() as *const __m256i);

    let mut col = params.start_col;
    while col <= params.last_col {
        let residual_cols = (params.dst_cols - col).min(TILE_COLS);
        let rhs_col_ptr = params.rhs.as_ptr().add(col * params.rhs_stride);

        let mut row = params.start_row;
        while row <= params.last_row {
            let residual_rows = (params.dst_rows - row).min(TILE_ROWS);
            let lhs_col_ptr = params.lhs.as_ptr().add(row * params.lhs_stride);

            let initial = match params.bias {
                Some(bias) => lanes::load_n_epi32(bias.as_ptr().add(row), residual_rows),
                None => _mm256_setzero_si256(),
            };
            let mut acc = [initial; TILE_COLS];

            let mut lhs_ptr = lhs_col_ptr;
            let mut rhs_ptr = rhs_col_ptr;
            let mut d = 0;
            while d < depth {
                let lhs_data = _mm256_loadu_si256(lhs_ptr as *const __m256i);
                let mut rhs_data = _mm256_loadu_si256(rhs_ptr as *const __m256i);

                let lhs_split = _mm256_shuffle_epi8(lhs_data, splitter);
                let expand_bottom =
                    _mm256_cvtepi8_epi16(_mm256_extracti128_si256::<0>(lhs_split));
                let expand_top = _mm256_cvtepi8_epi16(_mm256_extracti128_si256::<1>(lhs_split));
                // Even pairs of all 8 rows in one register, odd pairs in the
                // other.
                let lhs_16_low = _mm256_permute2x128_si256::<0x20>(expand_bottom, expand_top);
                let lhs_16_high = _mm256_permute2x128_si256::<0x31>(expand_bottom, expand_top);

                for a in acc.iter_mut() {
                    let dup_low = _mm_broadcastw_epi16(_mm256_castsi256_si128(rhs_data));
                    let dup_high = _mm_set1_epi16(
                        _mm_extract_epi16::<1>(_mm256_castsi256_si128(rhs_data)) as i16,
                    );
                    // Rotate the next column's 4 bytes down, carrying one
                    // 32-bit group across the lane boundary by hand.
                    let between = _mm256_extract_epi32::<4>(rhs_data);
                    rhs_data = _mm256_srli_si256::<4>(rhs_data);
                    rhs_data = _mm256_insert_epi32::<3>(rhs_data, between);

                    let rhs_16_low = _mm256_cvtepi8_epi16(dup_low);
                    let rhs_16_high = _mm256_cvtepi8_epi16(dup_high);
                    *a = _mm256_add_epi32(*a, _mm256_madd_epi16(lhs_16_low, rhs_16_low));
                    *a = _mm256_add_epi32(*a, _mm256_madd_epi16(lhs_16_high, rhs_16_high));
                }

                lhs_ptr = lhs_ptr.add(TILE_ROWS * DEPTH_CHUNK);
                rhs_ptr = rhs_ptr.add(TILE_COLS * DEPTH_CHUNK);
                d += DEPTH_CHUNK;
            }

            if let Some(sums) = params.lhs_sums {
                if params.rhs_zero_point != 0 {
                    // Sums are padded to the tile grid, so a full-width load
                    // is in bounds even on residual tiles.
                    let row_sums =
                        _mm256_loadu_si256(sums.as_ptr().add(row) as *const __m256i);
                    let offset =
                        _mm256_mullo_epi32(_mm256_set1_epi32(params.rhs_zero_point), row_sums);
                    for a in acc.iter_mut() {
                        *a = _mm256_sub_epi32(*a, offset);
                    }
                }
            }
            if (params.lhs_zero_point != 0 && params.rhs_sums.is_some())
                || params.prod_zp_depth != 0
            {
                let col_sums = match params.rhs_sums {
                    Some(sums) => _mm256_loadu_si256(sums.as_ptr().add(col) as *const __m256i),
                    None => _mm256_setzero_si256(),
                };
                let mut offset =
                    _mm256_mullo_epi32(_mm256_set1_epi32(params.lhs_zero_point), col_sums);
                offset = _mm256_sub_epi32(offset, _mm256_set1_epi32(params.prod_zp_depth));
                for (j, a) in acc.iter_mut().enumerate() {
                    *a = _mm256_sub_epi32(*a, _mm256_set1_epi32(lanes::extract_epi32(offset, j)));
                }
            }

            if !params.dst.is_raw_i32() {
                let (m_vector, e_vector) = match params.rescale {
                    Rescale::PerChannel {
                        fixedpoint,
                        exponent,
                    } => (
                        lanes::load_n_epi32(fixedpoint.as_ptr().add(row), residual_rows),
                        lanes::load_n_epi32(exponent.as_ptr().add(row), residual_rows),
                    ),
                    Rescale::PerTensor {
                        fixedpoint,
                        exponent,
                    } => (_mm256_set1_epi32(fixedpoint), _mm256_set1_epi32(exponent)),
                };
                let m_64_low = _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<0>(m_vector));
                let m_64_high = _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<1>(m_vector));

                let zero = _mm256_setzero_si256();
                let left_shift = _mm256_max_epi32(e_vector, zero);
                let right_shift = _mm256_max_epi32(_mm256_sub_epi32(zero, e_vector), zero);
                let final_right_shift = _mm256_add_epi32(right_shift, _mm256_set1_epi32(31));
                let final_right_shift_low =
                    _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<0>(final_right_shift));
                let final_right_shift_high =
                    _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<1>(final_right_shift));

                // Rounding offset plus the sign bias that turns the logical
                // 64-bit shift below into an arithmetic one.
                let convert_to_unsigned = _mm256_set1_epi64x(i64::MIN);
                let rounding = _mm256_slli_epi64::<30>(_mm256_set1_epi64x(1));
                let rounding_low = _mm256_add_epi64(
                    _mm256_sllv_epi64(
                        rounding,
                        _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<0>(right_shift)),
                    ),
                    convert_to_unsigned,
                );
                let rounding_high = _mm256_add_epi64(
                    _mm256_sllv_epi64(
                        rounding,
                        _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<1>(right_shift)),
                    ),
                    convert_to_unsigned,
                );
                // Undoes the sign bias after truncation to 32 bits.
                let convert_to_signed_halved = _mm256_srlv_epi32(
                    _mm256_set1_epi32(0x8000_0000u32 as i32),
                    right_shift,
                );
                let post_scaling_offset =
                    _mm256_add_epi32(convert_to_signed_halved, convert_to_signed_halved);

                let repack_perm = _mm256_setr_epi32(0, 2, 4, 6, 1, 3, 5, 7);

                for a in acc.iter_mut() {
                    let shifted = _mm256_sllv_epi32(*a, left_shift);
                    let mut scaled_low = _mm256_mul_epi32(
                        _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<0>(shifted)),
                        m_64_low,
                    );
                    let mut scaled_high = _mm256_mul_epi32(
                        _mm256_cvtepi32_epi64(_mm256_extracti128_si256::<1>(shifted)),
                        m_64_high,
                    );
                    scaled_low = _mm256_add_epi64(scaled_low, rounding_low);
                    scaled_high = _mm256_add_epi64(scaled_high, rounding_high);
                    scaled_low = _mm256_srlv_epi64(scaled_low, final_right_shift_low);
                    scaled_high = _mm256_srlv_epi64(scaled_high, final_right_shift_high);
                    scaled_high = _mm256_slli_epi64::<32>(scaled_high);
                    let results = _mm256_blend_epi32::<0xaa>(scaled_low, scaled_high);
                    let results = _mm256_permutevar8x32_epi32(results, repack_perm);
                    *a = _mm256_sub_epi32(results, post_scaling_offset);
                }

                if params.dst_zero_point != 0 {
                    let dst_zp = _mm256_set1_epi32(params.dst_zero_point);
                    for a in acc.iter_mut() {
                        *a = _mm256_add_epi32(*a, dst_zp);
                    }
                }
            }

            let clamp_max = _mm256_set1_epi32(params.clamp_max);
            let clamp_min = _mm256_set1_epi32(params.clamp_min);
            for a in acc.iter_mut() {
                *a = _mm256_min_epi32(*a, clamp_max);
                *a = _mm256_max_epi32(*a, clamp_min);
            }

            let dst_stride = params.dst_stride;
            let base = col * dst_stride + row;
            let full = residual_rows == TILE_ROWS && residual_cols == TILE_COLS;
            match &mut params.dst {
                DstStorage::I8(dst) => {
                    let ptr = dst.as_mut_ptr().add(base) as *mut u8;
                    store_narrow_epi8(ptr, dst_stride, residual_rows, residual_cols, full, &acc);
                }
                DstStorage::U8(dst) => {
                    let ptr = dst.as_mut_ptr().add(base);
                    store_narrow_epi8(ptr, dst_stride, residual_rows, residual_cols, full, &acc);
                }
                DstStorage::I16(dst) => {
                    let ptr = dst.as_mut_ptr().add(base);
                    if full {
                        for (j, a) in acc.iter().enumerate() {
                            lanes::store_n_cvtepi32_epi16(ptr.add(j * dst_stride), TILE_ROWS, *a);
                        }
                    } else {
                        for (j, a) in acc.iter().enumerate().take(residual_cols) {
                            lanes::store_n_cvtepi32_epi16(
                                ptr.add(j * dst_stride),
                                residual_rows,
                                *a,
                            );
                        }
                    }
                }
                DstStorage::I32(dst) => {
                    let ptr = dst.as_mut_ptr().add(base);
                    if full {
                        for (j, a) in acc.iter().enumerate() {
                            _mm256_storeu_si256(ptr.add(j * dst_stride) as *mut __m256i, *a);
                        }
                    } else {
                        for (j, a) in acc.iter().enumerate().take(residual_cols) {
                            lanes::store_n_epi32(ptr.add(j * dst_stride), residual_rows, *a);
                        }
                    }
                }
            }

            row += TILE_ROWS;
        }
        col += TILE_COLS;
    }
}

/// Byte-width store shared by the `i8` and `u8` destinations; the bit
/// pattern is the truncated low byte either way.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store_narrow_epi8(
    ptr: *mut u8,
    dst_stride: usize,
    residual_rows: usize,
    residual_cols: usize,
    full: bool,
    acc: &[__m256i; TILE_COLS],
) {
    if full {
        for (j, a) in acc.iter().enumerate() {
            lanes::store_n_cvtepi32_epi8(ptr.add(j * dst_stride), TILE_ROWS, *a);
        }
    } else {
        for (j, a) in acc.iter().enumerate().take(residual_cols) {
            lanes::store_n_cvtepi32_epi8(ptr.add(j * dst_stride), residual_rows, *a);
        }
    }
}
