//! 8x8-tile matrix multiplication micro-kernels.
//!
//! This crate provides the innermost compute stage of a blocked GEMM: kernels
//! that produce one or more 8x8 destination tiles from pre-packed operand
//! panels. Two element domains are covered:
//!
//! - **Quantized int8**: signed 8-bit operands accumulated in `i32`, with
//!   affine zero-point correction, fixed-point requantization, destination
//!   zero point and clamping, stored to `i8`, `u8`, `i16` or raw `i32`.
//! - **Float**: `f32` operands accumulated with FMA, plus bias and clamping.
//!
//! Packing the operand panels, partitioning work across tiles and threads,
//! and any higher-level matmul API are the caller's job. The kernels consume
//! [`params::Int8KernelParams`] / [`params::FloatKernelParams`] describing one
//! batch of tiles and touch nothing outside the destination region they own,
//! so disjoint parameter blocks may run concurrently.
//!
//! Kernel selection happens once at runtime: [`dispatch::kernel_table`]
//! probes CPU capabilities and picks the AVX2 implementations when available,
//! falling back to the portable scalar kernels otherwise. The scalar kernels
//! are bit-for-bit equivalent to the vector ones and double as the
//! correctness oracle in the test suite.

pub mod dispatch;
pub mod error;
pub mod kernels;
pub mod params;

pub use dispatch::{kernel_table, run_float, run_int8};
pub use error::KernelError;
pub use params::{DstStorage, FloatKernelParams, Int8KernelParams, Rescale};

/// Destination rows covered by one tile.
pub const TILE_ROWS: usize = 8;

/// Destination columns covered by one tile.
pub const TILE_COLS: usize = 8;

/// Depth values consumed per inner step of the integer kernel. Packed int8
/// panels interleave this many depth entries per row, so `depth` must be a
/// multiple of it (packers pad with zeros).
pub const DEPTH_CHUNK: usize = 4;
