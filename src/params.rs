//! Kernel parameter blocks.
//!
//! A parameter block describes one batch of 8x8 destination tiles: the packed
//! operand panels, the destination view, the tile range to produce and the
//! per-output post-processing (zero points, requantization, bias, clamp).
//! Blocks are built by the caller (the packer/scheduler layer above this
//! crate) and handed to a kernel; the kernel reads them and writes only the
//! destination region the block names.
//!
//! # Packed panel layout (elements)
//!
//! - **Int8 LHS**: row-block `row` (a multiple of 8) starts at
//!   `row * lhs_stride`. Within a block, depth chunk `c` (a multiple of 4)
//!   occupies 32 bytes holding 8 rows x 4 consecutive depth values, row-major
//!   within the chunk. A tightly packed panel has `lhs_stride == depth`. The
//!   RHS uses the identical layout with columns in place of rows.
//! - **Float panels**: row-block `row` starts at `row * lhs_stride`; each
//!   depth step holds 8 contiguous `f32`, one per row (or column) of the
//!   block.
//! - **Destination**: column-major; element `(r, c)` lives at
//!   `c * dst_stride + r`.

use crate::error::KernelError;
use crate::{DEPTH_CHUNK, TILE_COLS, TILE_ROWS};

/// Destination view for the integer kernel.
///
/// Requantized outputs are narrowed to the storage width by truncation (the
/// clamp bounds are expected to keep values in range); `I32` receives the raw
/// corrected accumulators with requantization and destination zero point
/// skipped.
#[derive(Debug)]
pub enum DstStorage<'a> {
    I8(&'a mut [i8]),
    U8(&'a mut [u8]),
    I16(&'a mut [i16]),
    I32(&'a mut [i32]),
}

impl DstStorage<'_> {
    /// Number of elements in the destination buffer.
    pub fn len(&self) -> usize {
        match self {
            DstStorage::I8(d) => d.len(),
            DstStorage::U8(d) => d.len(),
            DstStorage::I16(d) => d.len(),
            DstStorage::I32(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw `i32` destinations bypass requantization and destination zero
    /// point.
    pub fn is_raw_i32(&self) -> bool {
        matches!(self, DstStorage::I32(_))
    }
}

/// Requantization multiplier: a Q0.31 fixed-point mantissa and a power-of-two
/// exponent, either shared by every output row or given per destination row
/// (indexed by absolute row).
#[derive(Debug, Clone, Copy)]
pub enum Rescale<'a> {
    PerTensor { fixedpoint: i32, exponent: i32 },
    PerChannel {
        fixedpoint: &'a [i32],
        exponent: &'a [i32],
    },
}

/// Parameters for one invocation of the quantized int8 kernel.
///
/// Geometry is in elements. `start_row`/`start_col` and `last_row`/`last_col`
/// are tile origins (multiples of 8), both inclusive; tiles whose origin lies
/// inside the destination but whose far edge does not are clipped to
/// `dst_rows`/`dst_cols`.
#[derive(Debug)]
pub struct Int8KernelParams<'a> {
    /// Packed LHS panel (see module docs for the layout).
    pub lhs: &'a [i8],
    /// Elements between consecutive LHS row blocks, `>= depth`.
    pub lhs_stride: usize,
    /// Packed RHS panel, same layout with columns in place of rows.
    pub rhs: &'a [i8],
    /// Elements between consecutive RHS column blocks, `>= depth`.
    pub rhs_stride: usize,
    /// Shared inner dimension; a positive multiple of [`DEPTH_CHUNK`].
    pub depth: usize,

    pub start_row: usize,
    pub last_row: usize,
    /// Total destination rows; rows past this are never touched.
    pub dst_rows: usize,
    pub start_col: usize,
    pub last_col: usize,
    pub dst_cols: usize,

    /// LHS quantization zero point.
    pub lhs_zero_point: i32,
    /// RHS quantization zero point.
    pub rhs_zero_point: i32,
    /// Precomputed `lhs_zero_point * rhs_zero_point * depth`.
    pub prod_zp_depth: i32,
    /// Per-row depth sums of the packed LHS, padded to the tile grid
    /// (`last_row + 8` entries reachable). Required when `rhs_zero_point`
    /// is nonzero.
    pub lhs_sums: Option<&'a [i32]>,
    /// Per-column depth sums of the packed RHS, padded likewise. Required
    /// when `lhs_zero_point` is nonzero.
    pub rhs_sums: Option<&'a [i32]>,

    /// Per-row bias added to the accumulators, indexed by absolute row.
    pub bias: Option<&'a [i32]>,
    /// Requantization multiplier(s).
    pub rescale: Rescale<'a>,
    /// Added after requantization, before clamping.
    pub dst_zero_point: i32,
    pub clamp_min: i32,
    pub clamp_max: i32,

    pub dst: DstStorage<'a>,
    /// Elements between consecutive destination columns, `>= dst_rows`.
    pub dst_stride: usize,
}

/// Parameters for one invocation of the f32 kernel.
#[derive(Debug)]
pub struct FloatKernelParams<'a> {
    /// Packed LHS panel: 8 contiguous `f32` per depth step per row block.
    pub lhs: &'a [f32],
    pub lhs_stride: usize,
    pub rhs: &'a [f32],
    pub rhs_stride: usize,
    /// Shared inner dimension; zero yields bias-only output.
    pub depth: usize,

    pub start_row: usize,
    pub last_row: usize,
    pub dst_rows: usize,
    pub start_col: usize,
    pub last_col: usize,
    pub dst_cols: usize,

    /// Per-row bias, indexed by absolute row.
    pub bias: Option<&'a [f32]>,
    pub clamp_min: f32,
    pub clamp_max: f32,

    pub dst: &'a mut [f32],
    pub dst_stride: usize,
}

fn check_axis(
    axis: &'static str,
    start: usize,
    last: usize,
    extent: usize,
) -> Result<(), KernelError> {
    if start > last {
        return Err(KernelError::EmptyTileRange { axis, start, last });
    }
    if last >= extent {
        return Err(KernelError::TileOutsideDst { axis, last, extent });
    }
    Ok(())
}

fn check_grid(start_row: usize, start_col: usize, last_row: usize, last_col: usize)
    -> Result<(), KernelError>
{
    if start_row % TILE_ROWS != 0 || start_col % TILE_COLS != 0 {
        return Err(KernelError::UnalignedTileOrigin {
            row: start_row,
            col: start_col,
        });
    }
    // `last` is itself a tile origin, so it must share the start's grid.
    if last_row % TILE_ROWS != 0 || last_col % TILE_COLS != 0 {
        return Err(KernelError::UnalignedTileOrigin {
            row: last_row,
            col: last_col,
        });
    }
    Ok(())
}

fn check_exponent(exponent: i32) -> Result<(), KernelError> {
    // Beyond 31 either direction the 32-bit shifts would need more bits than
    // the accumulator has, and scalar/vector shift semantics part ways.
    if !(-31..=31).contains(&exponent) {
        return Err(KernelError::BadExponent { exponent });
    }
    Ok(())
}

fn check_len(name: &'static str, len: usize, needed: usize) -> Result<(), KernelError> {
    if len < needed {
        return Err(KernelError::ShortBuffer { name, len, needed });
    }
    Ok(())
}

impl Int8KernelParams<'_> {
    /// Checks every precondition the kernel assumes. A block that passes may
    /// be handed to any of the kernel implementations; the kernels only
    /// `debug_assert!` these conditions.
    pub fn validate(&self) -> Result<(), KernelError> {
        check_grid(self.start_row, self.start_col, self.last_row, self.last_col)?;
        check_axis("row", self.start_row, self.last_row, self.dst_rows)?;
        check_axis("col", self.start_col, self.last_col, self.dst_cols)?;

        if self.depth == 0 || self.depth % DEPTH_CHUNK != 0 {
            return Err(KernelError::BadDepth {
                depth: self.depth,
                chunk: DEPTH_CHUNK,
            });
        }
        if self.lhs_stride < self.depth {
            return Err(KernelError::ShortStride {
                name: "lhs",
                stride: self.lhs_stride,
                depth: self.depth,
            });
        }
        if self.rhs_stride < self.depth {
            return Err(KernelError::ShortStride {
                name: "rhs",
                stride: self.rhs_stride,
                depth: self.depth,
            });
        }
        check_len(
            "lhs",
            self.lhs.len(),
            self.last_row * self.lhs_stride + TILE_ROWS * self.depth,
        )?;
        check_len(
            "rhs",
            self.rhs.len(),
            self.last_col * self.rhs_stride + TILE_COLS * self.depth,
        )?;

        if self.dst_stride < self.dst_rows {
            return Err(KernelError::ShortDstStride {
                stride: self.dst_stride,
                dst_rows: self.dst_rows,
            });
        }
        // Extents actually written: tiles are clipped to the destination.
        let max_row = (self.last_row + TILE_ROWS).min(self.dst_rows);
        let max_col = (self.last_col + TILE_COLS).min(self.dst_cols);
        check_len("dst", self.dst.len(), (max_col - 1) * self.dst_stride + max_row)?;

        if let Some(bias) = self.bias {
            check_len("bias", bias.len(), max_row)?;
        }
        // Sums vectors are loaded 8 lanes wide even on residual tiles, so
        // they must be padded to the tile grid.
        match self.lhs_sums {
            Some(sums) => check_len("lhs_sums", sums.len(), self.last_row + TILE_ROWS)?,
            None => {
                if self.rhs_zero_point != 0 {
                    return Err(KernelError::MissingSums { name: "lhs_sums" });
                }
            }
        }
        match self.rhs_sums {
            Some(sums) => check_len("rhs_sums", sums.len(), self.last_col + TILE_COLS)?,
            None => {
                if self.lhs_zero_point != 0 {
                    return Err(KernelError::MissingSums { name: "rhs_sums" });
                }
            }
        }

        match self.rescale {
            Rescale::PerTensor { exponent, .. } => check_exponent(exponent)?,
            Rescale::PerChannel {
                fixedpoint,
                exponent,
            } => {
                check_len("rescale.fixedpoint", fixedpoint.len(), max_row)?;
                check_len("rescale.exponent", exponent.len(), max_row)?;
                for &e in &exponent[..max_row] {
                    check_exponent(e)?;
                }
            }
        }
        if self.clamp_min > self.clamp_max {
            return Err(KernelError::InvertedClamp {
                min: f64::from(self.clamp_min),
                max: f64::from(self.clamp_max),
            });
        }
        Ok(())
    }
}

impl FloatKernelParams<'_> {
    /// Checks every precondition the kernel assumes.
    pub fn validate(&self) -> Result<(), KernelError> {
        check_grid(self.start_row, self.start_col, self.last_row, self.last_col)?;
        check_axis("row", self.start_row, self.last_row, self.dst_rows)?;
        check_axis("col", self.start_col, self.last_col, self.dst_cols)?;

        if self.depth > 0 {
            if self.lhs_stride < self.depth {
                return Err(KernelError::ShortStride {
                    name: "lhs",
                    stride: self.lhs_stride,
                    depth: self.depth,
                });
            }
            if self.rhs_stride < self.depth {
                return Err(KernelError::ShortStride {
                    name: "rhs",
                    stride: self.rhs_stride,
                    depth: self.depth,
                });
            }
            check_len(
                "lhs",
                self.lhs.len(),
                self.last_row * self.lhs_stride + TILE_ROWS * self.depth,
            )?;
            check_len(
                "rhs",
                self.rhs.len(),
                self.last_col * self.rhs_stride + TILE_COLS * self.depth,
            )?;
        }

        if self.dst_stride < self.dst_rows {
            return Err(KernelError::ShortDstStride {
                stride: self.dst_stride,
                dst_rows: self.dst_rows,
            });
        }
        let end_row = (self.last_row + TILE_ROWS).min(self.dst_rows);
        let end_col = (self.last_col + TILE_COLS).min(self.dst_cols);
        check_len("dst", self.dst.len(), (end_col - 1) * self.dst_stride + end_row)?;

        if let Some(bias) = self.bias {
            check_len("bias", bias.len(), end_row)?;
        }
        // Rejects NaN bounds along with inverted ones.
        if !(self.clamp_min <= self.clamp_max) {
            return Err(KernelError::InvertedClamp {
                min: f64::from(self.clamp_min),
                max: f64::from(self.clamp_max),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int8_block<'a>(
        lhs: &'a [i8],
        rhs: &'a [i8],
        dst: &'a mut [i32],
    ) -> Int8KernelParams<'a> {
        Int8KernelParams {
            lhs,
            lhs_stride: 4,
            rhs,
            rhs_stride: 4,
            depth: 4,
            start_row: 0,
            last_row: 0,
            dst_rows: 8,
            start_col: 0,
            last_col: 0,
            dst_cols: 8,
            lhs_zero_point: 0,
            rhs_zero_point: 0,
            prod_zp_depth: 0,
            lhs_sums: None,
            rhs_sums: None,
            bias: None,
            rescale: Rescale::PerTensor {
                fixedpoint: 1 << 30,
                exponent: 1,
            },
            dst_zero_point: 0,
            clamp_min: i32::MIN,
            clamp_max: i32::MAX,
            dst: DstStorage::I32(dst),
            dst_stride: 8,
        }
    }

    #[test]
    fn valid_int8_block_passes() {
        let lhs = [0i8; 32];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        assert!(int8_block(&lhs, &rhs, &mut dst).validate().is_ok());
    }

    #[test]
    fn rejects_unaligned_origin() {
        let lhs = [0i8; 64];
        let rhs = [0i8; 64];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.start_row = 4;
        p.last_row = 4;
        assert!(matches!(
            p.validate(),
            Err(KernelError::UnalignedTileOrigin { row: 4, col: 0 })
        ));
    }

    #[test]
    fn rejects_empty_range() {
        let lhs = [0i8; 96];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.start_row = 8;
        p.last_row = 0;
        assert!(matches!(
            p.validate(),
            Err(KernelError::EmptyTileRange { axis: "row", .. })
        ));
    }

    #[test]
    fn rejects_tile_outside_dst() {
        let lhs = [0i8; 96];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 128];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.last_row = 8;
        assert!(matches!(
            p.validate(),
            Err(KernelError::TileOutsideDst {
                axis: "row",
                last: 8,
                extent: 8
            })
        ));
    }

    #[test]
    fn rejects_bad_depth() {
        let lhs = [0i8; 64];
        let rhs = [0i8; 64];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.depth = 6;
        p.lhs_stride = 6;
        p.rhs_stride = 6;
        assert!(matches!(p.validate(), Err(KernelError::BadDepth { depth: 6, .. })));
    }

    #[test]
    fn rejects_short_panel() {
        let lhs = [0i8; 16];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        let p = int8_block(&lhs, &rhs, &mut dst);
        assert!(matches!(
            p.validate(),
            Err(KernelError::ShortBuffer { name: "lhs", .. })
        ));
    }

    #[test]
    fn rejects_missing_sums() {
        let lhs = [0i8; 32];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.rhs_zero_point = 3;
        assert!(matches!(
            p.validate(),
            Err(KernelError::MissingSums { name: "lhs_sums" })
        ));
        p.rhs_zero_point = 0;
        p.lhs_zero_point = 3;
        assert!(matches!(
            p.validate(),
            Err(KernelError::MissingSums { name: "rhs_sums" })
        ));
    }

    #[test]
    fn rejects_out_of_range_exponent() {
        let lhs = [0i8; 32];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.rescale = Rescale::PerTensor {
            fixedpoint: 1 << 30,
            exponent: 40,
        };
        assert!(matches!(
            p.validate(),
            Err(KernelError::BadExponent { exponent: 40 })
        ));
    }

    #[test]
    fn rejects_inverted_clamp() {
        let lhs = [0i8; 32];
        let rhs = [0i8; 32];
        let mut dst = [0i32; 64];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.clamp_min = 10;
        p.clamp_max = -10;
        assert!(matches!(p.validate(), Err(KernelError::InvertedClamp { .. })));
    }

    #[test]
    fn clipped_tile_needs_smaller_dst() {
        let lhs = [0i8; 32];
        let rhs = [0i8; 32];
        // 5x3 destination, one tile clipped on both axes.
        let mut dst = [0i32; 15];
        let mut p = int8_block(&lhs, &rhs, &mut dst);
        p.dst_rows = 5;
        p.dst_cols = 3;
        p.dst_stride = 5;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn float_rejects_nan_clamp() {
        let lhs = [0.0f32; 64];
        let rhs = [0.0f32; 64];
        let mut dst = [0.0f32; 64];
        let p = FloatKernelParams {
            lhs: &lhs,
            lhs_stride: 8,
            rhs: &rhs,
            rhs_stride: 8,
            depth: 8,
            start_row: 0,
            last_row: 0,
            dst_rows: 8,
            start_col: 0,
            last_col: 0,
            dst_cols: 8,
            bias: None,
            clamp_min: f32::NAN,
            clamp_max: f32::INFINITY,
            dst: &mut dst,
            dst_stride: 8,
        };
        assert!(matches!(p.validate(), Err(KernelError::InvertedClamp { .. })));
    }
}
