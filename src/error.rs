//! Error types for kernel parameter validation.
//!
//! The kernels themselves never return errors: a parameter block that passed
//! [`validate`](crate::params::Int8KernelParams::validate) is a contract, and
//! violations inside the kernels are `debug_assert!`s. This module holds the
//! error the validated entry points surface to callers.

use thiserror::Error;

/// Rejection reasons for a kernel parameter block.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum KernelError {
    /// Tile origin coordinates must sit on the 8x8 tile grid.
    #[error("tile origin ({row}, {col}) is not aligned to the 8x8 tile grid")]
    UnalignedTileOrigin { row: usize, col: usize },

    /// `start` past `last` leaves no tiles to compute.
    #[error("empty {axis} tile range: start {start} is past last {last}")]
    EmptyTileRange {
        axis: &'static str,
        start: usize,
        last: usize,
    },

    /// The last tile origin must lie inside the destination.
    #[error("last {axis} tile origin {last} lies outside destination extent {extent}")]
    TileOutsideDst {
        axis: &'static str,
        last: usize,
        extent: usize,
    },

    /// Integer kernel depth must be a positive multiple of the packing chunk.
    #[error("depth {depth} is not a positive multiple of {chunk}")]
    BadDepth { depth: usize, chunk: usize },

    /// A panel stride shorter than the depth would alias adjacent blocks.
    #[error("{name} stride {stride} is shorter than depth {depth}")]
    ShortStride {
        name: &'static str,
        stride: usize,
        depth: usize,
    },

    /// Destination columns must not overlap.
    #[error("destination stride {stride} is shorter than destination height {dst_rows}")]
    ShortDstStride { stride: usize, dst_rows: usize },

    /// A buffer does not cover every access the kernel will make.
    #[error("{name} holds {len} elements, kernel needs at least {needed}")]
    ShortBuffer {
        name: &'static str,
        len: usize,
        needed: usize,
    },

    /// Requantization exponents outside `[-31, 31]` would shift past the
    /// accumulator width.
    #[error("requantization exponent {exponent} is outside [-31, 31]")]
    BadExponent { exponent: i32 },

    /// Zero-point correction was requested without the sums it needs.
    #[error("{name} required: the matching operand zero point is nonzero")]
    MissingSums { name: &'static str },

    /// Clamp bounds must form a non-empty interval.
    #[error("clamp bounds are inverted: min {min} > max {max}")]
    InvertedClamp { min: f64, max: f64 },
}
