//! Tile kernel implementations.
//!
//! Each backend exposes the same pair of kernels over the parameter blocks in
//! [`crate::params`]. [`scalar`] is portable and always present; [`avx2`]
//! is compiled on x86-64 and selected at runtime by [`crate::dispatch`] after
//! feature detection.

#[cfg(target_arch = "x86_64")]
pub mod avx2;

pub mod scalar;
