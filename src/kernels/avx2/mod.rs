//! AVX2 tile kernels (256-bit, 8 lanes of 32 bits).
//!
//! The kernels here are compiled with `#[target_feature]` and must only be
//! called after runtime detection confirms `avx2` (and `fma` for the float
//! kernel); [`crate::dispatch`] is the supported way in. Both operate on one
//! column of 8 destination rows per vector register, with 8 such accumulators
//! covering a full 8x8 tile.

pub mod float;
pub mod int8;
pub(crate) mod lanes;
