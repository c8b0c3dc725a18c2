//! Portable scalar tile kernels.
//!
//! These walk the same tile traversal as the vector kernels and produce
//! bit-for-bit identical output, one element at a time. They serve as the
//! fallback on targets without AVX2 and as the oracle the vector path is
//! tested against.

use crate::params::{DstStorage, FloatKernelParams, Int8KernelParams, Rescale};
use crate::{DEPTH_CHUNK, TILE_COLS, TILE_ROWS};

/// Requantizes one accumulator by the fixed-point multiplier `(m, e)`.
///
/// The value is scaled by `m * 2^(e - 31)` with round-half-up (ties toward
/// positive infinity): a 32-bit wrapping left shift by `max(e, 0)`, a 64-bit
/// widening product with `m`, a rounding offset of `1 << (30 + right_shift)`
/// where `right_shift = max(-e, 0)`, an arithmetic right shift by
/// `31 + right_shift`, and truncation to the low 32 bits.
#[inline]
pub fn rescale(acc: i32, m: i32, e: i32) -> i32 {
    let left_shift = e.max(0) as u32;
    let right_shift = (-e).max(0) as u32;
    let prod = i64::from(acc.wrapping_shl(left_shift)) * i64::from(m);
    let nudge = 1i64 << (30 + right_shift);
    ((prod + nudge) >> (31 + right_shift)) as i32
}

/// `vminps` semantics: returns `b` when either operand is NaN.
#[inline]
fn min_ps(a: f32, b: f32) -> f32 {
    if a < b {
        a
    } else {
        b
    }
}

/// `vmaxps` semantics: returns `b` when either operand is NaN.
#[inline]
fn max_ps(a: f32, b: f32) -> f32 {
    if a > b {
        a
    } else {
        b
    }
}

/// Quantized int8 kernel over the tile range named by `params`.
pub fn int8_kernel(params: &mut Int8KernelParams<'_>) {
    let depth = params.depth;
    debug_assert_eq!(depth % DEPTH_CHUNK, 0);
    debug_assert!(depth > 0);
    debug_assert!(params.last_row < params.dst_rows && params.last_col < params.dst_cols);

    let mut col = params.start_col;
    while col <= params.last_col {
        let residual_cols = (params.dst_cols - col).min(TILE_COLS);
        let rhs_block = &params.rhs[col * params.rhs_stride..];
        let mut row = params.start_row;
        while row <= params.last_row {
            let residual_rows = (params.dst_rows - row).min(TILE_ROWS);
            let lhs_block = &params.lhs[row * params.lhs_stride..];

            // acc[j][r] is the accumulator for destination (row + r, col + j).
            let mut acc = [[0i32; TILE_ROWS]; TILE_COLS];
            if let Some(bias) = params.bias {
                for r in 0..residual_rows {
                    let b = bias[row + r];
                    for column in acc.iter_mut() {
                        column[r] = b;
                    }
                }
            }

            let mut c = 0;
            while c < depth {
                let lhs_chunk = &lhs_block[c * TILE_ROWS..];
                let rhs_chunk = &rhs_block[c * TILE_COLS..];
                for (j, column) in acc.iter_mut().enumerate() {
                    for (r, slot) in column.iter_mut().enumerate() {
                        let mut dot = 0i32;
                        for d in 0..DEPTH_CHUNK {
                            dot += i32::from(lhs_chunk[r * DEPTH_CHUNK + d])
                                * i32::from(rhs_chunk[j * DEPTH_CHUNK + d]);
                        }
                        *slot = slot.wrapping_add(dot);
                    }
                }
                c += DEPTH_CHUNK;
            }

            if let Some(sums) = params.lhs_sums {
                if params.rhs_zero_point != 0 {
                    for r in 0..TILE_ROWS {
                        let offset = params.rhs_zero_point.wrapping_mul(sums[row + r]);
                        for column in acc.iter_mut() {
                            column[r] = column[r].wrapping_sub(offset);
                        }
                    }
                }
            }
            if (params.lhs_zero_point != 0 && params.rhs_sums.is_some())
                || params.prod_zp_depth != 0
            {
                for (j, column) in acc.iter_mut().enumerate() {
                    let col_sum = match params.rhs_sums {
                        Some(sums) => sums[col + j],
                        None => 0,
                    };
                    let offset = params
                        .lhs_zero_point
                        .wrapping_mul(col_sum)
                        .wrapping_sub(params.prod_zp_depth);
                    for slot in column.iter_mut() {
                        *slot = slot.wrapping_sub(offset);
                    }
                }
            }

            if !params.dst.is_raw_i32() {
                for column in acc.iter_mut() {
                    for (r, slot) in column.iter_mut().enumerate().take(residual_rows) {
                        let (m, e) = match params.rescale {
                            Rescale::PerTensor {
                                fixedpoint,
                                exponent,
                            } => (fixedpoint, exponent),
                            Rescale::PerChannel {
                                fixedpoint,
                                exponent,
                            } => (fixedpoint[row + r], exponent[row + r]),
                        };
                        *slot = rescale(*slot, m, e).wrapping_add(params.dst_zero_point);
                    }
                }
            }
            for column in acc.iter_mut() {
                for slot in column.iter_mut() {
                    *slot = (*slot).min(params.clamp_max).max(params.clamp_min);
                }
            }

            let dst_stride = params.dst_stride;
            let base = col * dst_stride + row;
            match &mut params.dst {
                DstStorage::I8(dst) => {
                    for j in 0..residual_cols {
                        for r in 0..residual_rows {
                            dst[base + j * dst_stride + r] = acc[j][r] as i8;
                        }
                    }
                }
                DstStorage::U8(dst) => {
                    for j in 0..residual_cols {
                        for r in 0..residual_rows {
                            dst[base + j * dst_stride + r] = acc[j][r] as u8;
                        }
                    }
                }
                DstStorage::I16(dst) => {
                    for j in 0..residual_cols {
                        for r in 0..residual_rows {
                            dst[base + j * dst_stride + r] = acc[j][r] as i16;
                        }
                    }
                }
                DstStorage::I32(dst) => {
                    for j in 0..residual_cols {
                        for r in 0..residual_rows {
                            dst[base + j * dst_stride + r] = acc[j][r];
                        }
                    }
                }
            }

            row += TILE_ROWS;
        }
        col += TILE_COLS;
    }
}

/// f32 kernel over the tile range named by `params`.
///
/// Accumulation uses `f32::mul_add` so the result matches the vector path's
/// FMA bit-for-bit; the clamp mirrors `vminps`/`vmaxps` operand order.
pub fn float_kernel(params: &mut FloatKernelParams<'_>) {
    let end_row = params.dst_rows.min(params.last_row + TILE_ROWS);
    let end_col = params.dst_cols.min(params.last_col + TILE_COLS);
    debug_assert!(params.start_row < end_row && params.start_col < end_col);

    let mut col = params.start_col;
    while col < end_col {
        let residual_cols = (end_col - col).min(TILE_COLS);
        let rhs_block = &params.rhs[col * params.rhs_stride..];
        let mut row = params.start_row;
        while row < end_row {
            let residual_rows = (end_row - row).min(TILE_ROWS);
            let lhs_block = &params.lhs[row * params.lhs_stride..];

            let mut acc = [[0f32; TILE_ROWS]; TILE_COLS];
            if let Some(bias) = params.bias {
                for r in 0..residual_rows {
                    let b = bias[row + r];
                    for column in acc.iter_mut() {
                        column[r] = b;
                    }
                }
            }

            for d in 0..params.depth {
                let lhs_step = &lhs_block[d * TILE_ROWS..];
                let rhs_step = &rhs_block[d * TILE_COLS..];
                for (j, column) in acc.iter_mut().enumerate() {
                    let b = rhs_step[j];
                    for (r, slot) in column.iter_mut().enumerate() {
                        *slot = lhs_step[r].mul_add(b, *slot);
                    }
                }
            }

            let dst_stride = params.dst_stride;
            let base = col * dst_stride + row;
            for j in 0..residual_cols {
                for r in 0..residual_rows {
                    let v = max_ps(min_ps(acc[j][r], params.clamp_max), params.clamp_min);
                    params.dst[base + j * dst_stride + r] = v;
                }
            }

            row += TILE_ROWS;
        }
        col += TILE_COLS;
    }
}
