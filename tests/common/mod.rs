//! Shared fixtures: panel packers and independent reference math.
//!
//! The packers turn plain row-major matrices into the depth-chunked panel
//! layout the kernels consume, padding rows/columns to the 8-wide tile grid
//! and depth to the 4-wide chunk with zeros. The references compute the same
//! results with ordinary 64-bit arithmetic, independent of any kernel.

// Each integration binary pulls in only the helpers it needs.
#![allow(dead_code)]

use tilemul::{DEPTH_CHUNK, TILE_ROWS};

pub fn pad_to(value: usize, granule: usize) -> usize {
    value.div_ceil(granule) * granule
}

/// Packs a row-major `rows x depth` int8 matrix into the integer panel
/// layout. Returns the panel and its stride (`padded_depth`).
pub fn pack_panel_i8(src: &[i8], rows: usize, depth: usize) -> (Vec<i8>, usize) {
    let padded_rows = pad_to(rows, TILE_ROWS);
    let padded_depth = pad_to(depth.max(1), DEPTH_CHUNK);
    let stride = padded_depth;
    let mut packed = vec![0i8; padded_rows * stride];
    for block in (0..padded_rows).step_by(TILE_ROWS) {
        let base = block * stride;
        for c in (0..padded_depth).step_by(DEPTH_CHUNK) {
            for r in 0..TILE_ROWS {
                for d in 0..DEPTH_CHUNK {
                    let row = block + r;
                    let k = c + d;
                    let v = if row < rows && k < depth {
                        src[row * depth + k]
                    } else {
                        0
                    };
                    packed[base + c * TILE_ROWS + r * DEPTH_CHUNK + d] = v;
                }
            }
        }
    }
    (packed, stride)
}

/// Packs a row-major `rows x depth` f32 matrix into the float panel layout.
/// Returns the panel and its stride (`depth`).
pub fn pack_panel_f32(src: &[f32], rows: usize, depth: usize) -> (Vec<f32>, usize) {
    let padded_rows = pad_to(rows, TILE_ROWS);
    let stride = depth;
    let mut packed = vec![0f32; padded_rows * stride.max(1)];
    for block in (0..padded_rows).step_by(TILE_ROWS) {
        let base = block * stride;
        for d in 0..depth {
            for r in 0..TILE_ROWS {
                let row = block + r;
                let v = if row < rows { src[row * depth + d] } else { 0.0 };
                packed[base + d * TILE_ROWS + r] = v;
            }
        }
    }
    (packed, stride)
}

/// Per-row depth sums, padded to the tile grid as the kernels require.
pub fn depth_sums(src: &[i8], rows: usize, depth: usize) -> Vec<i32> {
    let padded_rows = pad_to(rows, TILE_ROWS);
    let mut sums = vec![0i32; padded_rows];
    for (row, sum) in sums.iter_mut().enumerate().take(rows) {
        *sum = src[row * depth..(row + 1) * depth]
            .iter()
            .map(|&v| i32::from(v))
            .sum();
    }
    sums
}

/// Zero-shifted i64 dot product: the corrected accumulator for destination
/// `(r, c)` before bias and post-processing.
pub fn corrected_dot(
    lhs: &[i8],
    rhs: &[i8],
    depth: usize,
    r: usize,
    c: usize,
    lhs_zero_point: i32,
    rhs_zero_point: i32,
) -> i64 {
    (0..depth)
        .map(|k| {
            let l = i64::from(lhs[r * depth + k]) - i64::from(lhs_zero_point);
            let x = i64::from(rhs[c * depth + k]) - i64::from(rhs_zero_point);
            l * x
        })
        .sum()
}

/// f64 matrix product entry for loose float comparisons.
pub fn f64_dot(lhs: &[f32], rhs: &[f32], depth: usize, r: usize, c: usize) -> f64 {
    (0..depth)
        .map(|k| f64::from(lhs[r * depth + k]) * f64::from(rhs[c * depth + k]))
        .sum()
}
