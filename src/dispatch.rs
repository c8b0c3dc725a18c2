//! Runtime kernel selection.
//!
//! Capability probing happens once, on first use: the table below is filled
//! from `is_x86_feature_detected!` and cached in a `OnceLock`. Kernels never
//! probe anything themselves; callers that bypass the table (for tests or
//! benchmarking a specific path) carry the detection burden.

use std::sync::OnceLock;

use crate::error::KernelError;
use crate::kernels;
use crate::params::{FloatKernelParams, Int8KernelParams};

/// Safe entry signature for the int8 kernel.
pub type Int8Kernel = fn(&mut Int8KernelParams<'_>);

/// Safe entry signature for the f32 kernel.
pub type FloatKernel = fn(&mut FloatKernelParams<'_>);

/// The kernel pair picked for this machine.
#[derive(Clone, Copy)]
pub struct KernelTable {
    pub int8: Int8Kernel,
    pub float: FloatKernel,
    /// Name of the selected backend, for logs and tests.
    pub path: &'static str,
}

static TABLE: OnceLock<KernelTable> = OnceLock::new();

/// Returns the kernel table for this machine, probing CPU features on the
/// first call.
pub fn kernel_table() -> &'static KernelTable {
    TABLE.get_or_init(select)
}

fn select() -> KernelTable {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            log::debug!("kernel dispatch: avx2 tile kernels selected");
            return KernelTable {
                int8: int8_avx2,
                float: float_avx2,
                path: "avx2",
            };
        }
    }
    log::debug!("kernel dispatch: scalar tile kernels selected");
    KernelTable {
        int8: kernels::scalar::int8_kernel,
        float: kernels::scalar::float_kernel,
        path: "scalar",
    }
}

#[cfg(target_arch = "x86_64")]
fn int8_avx2(params: &mut Int8KernelParams<'_>) {
    // Reached only through a table built after feature detection.
    unsafe { kernels::avx2::int8::int8_kernel(params) }
}

#[cfg(target_arch = "x86_64")]
fn float_avx2(params: &mut FloatKernelParams<'_>) {
    unsafe { kernels::avx2::float::float_kernel(params) }
}

/// Validates `params` and runs the selected int8 kernel.
pub fn run_int8(params: &mut Int8KernelParams<'_>) -> Result<(), KernelError> {
    params.validate()?;
    (kernel_table().int8)(params);
    Ok(())
}

/// Validates `params` and runs the selected f32 kernel.
pub fn run_float(params: &mut FloatKernelParams<'_>) -> Result<(), KernelError> {
    params.validate()?;
    (kernel_table().float)(params);
    Ok(())
}
