//! AVX2 f32 tile kernel.
//!
//! The depth loop consumes one depth step per iteration: an 8-wide LHS
//! vector is FMA'd against each RHS lane, broadcast by splitting the RHS
//! vector into its 128-bit halves (`permute2f128`) and replicating one lane
//! of each half (`permute`). Column tiles run full-width for as long as 8
//! columns remain, then a single remainder block covers the rest; rows
//! always run the same body with partial loads/stores on residuals.

use std::arch::x86_64::*;

use super::lanes;
use crate::params::FloatKernelParams;
use crate::{TILE_COLS, TILE_ROWS};

/// f32 kernel over the tile range named by `params`.
///
/// # Safety
///
/// AVX2 and FMA must be available, and `params` must satisfy
/// [`FloatKernelParams::validate`].
#[target_feature(enable = "avx2,fma")]
pub unsafe fn float_kernel(params: &mut FloatKernelParams<'_>) {
    let end_row = params.dst_rows.min(params.last_row + TILE_ROWS);
    let end_col = params.dst_cols.min(params.last_col + TILE_COLS);
    debug_assert!(params.start_row < end_row && params.start_col < end_col);

    let clamp_max = _mm256_set1_ps(params.clamp_max);
    let clamp_min = _mm256_set1_ps(params.clamp_min);

    let mut col = params.start_col;
    while col + TILE_COLS <= end_col {
        col_block(params, col, TILE_COLS, end_row, clamp_min, clamp_max);
        col += TILE_COLS;
    }
    if col < end_col {
        col_block(params, col, end_col - col, end_row, clamp_min, clamp_max);
    }
}

#[target_feature(enable = "avx2,fma")]
unsafe fn col_block(
    params: &mut FloatKernelParams<'_>,
    col: usize,
    residual_cols: usize,
    end_row: usize,
    clamp_min: __m256,
    clamp_max: __m256,
) {
    let rhs_col_ptr = params.rhs.as_ptr().add(col * params.rhs_stride);
    let dst_stride = params.dst_stride;

    let mut row = params.start_row;
    while row < end_row {
        let residual_rows = (end_row - row).min(TILE_ROWS);
        let lhs_col_ptr = params.lhs.as_ptr().add(row * params.lhs_stride);

        let initial = match params.bias {
            Some(bias) => lanes::load_n_ps(bias.as_ptr().add(row), residual_rows),
            None => _mm256_setzero_ps(),
        };
        let mut acc = [initial; TILE_COLS];

        let mut lhs_ptr = lhs_col_ptr;
        let mut rhs_ptr = rhs_col_ptr;
        for _ in 0..params.depth {
            let lhs_data = _mm256_loadu_ps(lhs_ptr);
            let rhs_data = _mm256_loadu_ps(rhs_ptr);

            let rhs_lower = _mm256_permute2f128_ps::<0x00>(rhs_data, rhs_data);
            let rhs_upper = _mm256_permute2f128_ps::<0x11>(rhs_data, rhs_data);

            let b0 = _mm256_permute_ps::<0x00>(rhs_lower);
            let b1 = _mm256_permute_ps::<0x55>(rhs_lower);
            let b2 = _mm256_permute_ps::<0xAA>(rhs_lower);
            let b3 = _mm256_permute_ps::<0xFF>(rhs_lower);
            let b4 = _mm256_permute_ps::<0x00>(rhs_upper);
            let b5 = _mm256_permute_ps::<0x55>(rhs_upper);
            let b6 = _mm256_permute_ps::<0xAA>(rhs_upper);
            let b7 = _mm256_permute_ps::<0xFF>(rhs_upper);

            acc[0] = _mm256_fmadd_ps(lhs_data, b0, acc[0]);
            acc[1] = _mm256_fmadd_ps(lhs_data, b1, acc[1]);
            acc[2] = _mm256_fmadd_ps(lhs_data, b2, acc[2]);
            acc[3] = _mm256_fmadd_ps(lhs_data, b3, acc[3]);
            acc[4] = _mm256_fmadd_ps(lhs_data, b4, acc[4]);
            acc[5] = _mm256_fmadd_ps(lhs_data, b5, acc[5]);
            acc[6] = _mm256_fmadd_ps(lhs_data, b6, acc[6]);
            acc[7] = _mm256_fmadd_ps(lhs_data, b7, acc[7]);

            lhs_ptr = lhs_ptr.add(TILE_ROWS);
            rhs_ptr = rhs_ptr.add(TILE_COLS);
        }

        let dst_ptr = params.dst.as_mut_ptr().add(col * dst_stride + row);
        if residual_rows == TILE_ROWS && residual_cols == TILE_COLS {
            for (j, a) in acc.iter().enumerate() {
                let v = _mm256_max_ps(_mm256_min_ps(*a, clamp_max), clamp_min);
                _mm256_storeu_ps(dst_ptr.add(j * dst_stride), v);
            }
        } else {
            for (j, a) in acc.iter().enumerate().take(residual_cols) {
                let v = _mm256_max_ps(_mm256_min_ps(*a, clamp_max), clamp_min);
                lanes::store_n_ps(dst_ptr.add(j * dst_stride), residual_rows, v);
            }
        }

        row += TILE_ROWS;
    }
}
