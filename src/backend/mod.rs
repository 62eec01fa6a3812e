//! Backend dispatch shim
//!
//! Temporary operators first offer their work to a [`Backend`]. The shim
//! marshals operands into the backend's descriptors and invokes the routine.
//! When the backend is [`Residency::Device`] the destination is marked
//! resident there, leaving the host copy stale. A backend reports every
//! failure as a [`BackendError`]; [`run_with_fallback`] decides whether the
//! operator's generic loop takes over or the failure reaches the caller.
//!
//! ```text
//! operator.apply
//!   -> run_with_fallback
//!        -> dispatch::{gemm, pool2d_forward}   (descriptor marshalling, rank > 4 recursion)
//!             -> Backend::{gemm, pool2d_forward}
//!        -> generic loop                       (unsupported, or fallback policy says so)
//! ```

pub mod cpu;
mod descriptor;
pub mod dispatch;

pub use cpu::CpuBackend;
pub use descriptor::{FilterDescriptor, PoolMode, PoolingDescriptor, TensorDescriptor};
pub use dispatch::run_with_fallback;

use crate::dtype::{DType, Element};
use crate::error::BackendError;
use std::fmt;

/// Routine a backend may provide
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BackendOp {
    /// General matrix multiply `C = A B`
    Gemm,
    /// Forward 2-D pooling
    Pool2dForward,
}

impl BackendOp {
    /// Operation name used in errors and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gemm => "gemm",
            Self::Pool2dForward => "pool2d_forward",
        }
    }
}

impl fmt::Display for BackendOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a backend keeps the results it produces
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Residency {
    /// Results are written to host memory
    Host,
    /// Results live on a device; the host copy is stale until synchronized
    Device,
}

/// Extents of a matrix product `C[m, n] = A[m, k] B[k, n]`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GemmDims {
    /// Rows of A and C
    pub m: usize,
    /// Columns of A, rows of B
    pub k: usize,
    /// Columns of B and C
    pub n: usize,
}

/// Accelerated routines an operator can dispatch to
///
/// All buffers are dense and row-major (`NCHW` for pooling). Implementations
/// validate the buffers against the descriptors and report problems as
/// [`BackendError`]s; they never panic on bad input.
pub trait Backend: Send + Sync {
    /// Short name used in errors, logs and residency marks
    fn name(&self) -> &'static str;

    /// Largest rank the backend's descriptors accept
    fn max_rank(&self) -> usize {
        4
    }

    /// Where results end up
    fn residency(&self) -> Residency {
        Residency::Host
    }

    /// Whether `op` is implemented for `dtype`
    fn supports(&self, op: BackendOp, dtype: DType) -> bool;

    /// Describe a tensor of `shape`
    fn tensor_descriptor(
        &self,
        shape: &[usize],
        dtype: DType,
    ) -> Result<TensorDescriptor, BackendError> {
        TensorDescriptor::nchw(self.name(), shape, dtype)
    }

    /// Describe a filter of `shape`
    ///
    /// Backend-facing only: offered to implementations that add their own
    /// convolution operators. [`Conv1dFull`](crate::ops::Conv1dFull) always
    /// runs its generic loop and never builds a filter.
    fn filter_descriptor(
        &self,
        shape: &[usize],
        dtype: DType,
    ) -> Result<FilterDescriptor, BackendError> {
        FilterDescriptor::kchw(self.name(), shape, dtype)
    }

    /// `c = a b` for row-major `a` (`m x k`), `b` (`k x n`) and `c` (`m x n`)
    fn gemm<T: Element>(
        &self,
        dims: GemmDims,
        a: &[T],
        b: &[T],
        c: &mut [T],
    ) -> Result<(), BackendError>;

    /// Pool `x` into `y`
    fn pool2d_forward<T: Element>(
        &self,
        pool: &PoolingDescriptor,
        x_desc: &TensorDescriptor,
        x: &[T],
        y_desc: &TensorDescriptor,
        y: &mut [T],
    ) -> Result<(), BackendError>;
}

/// Fail with `UnsupportedOperation` unless `backend` implements `op` for `T`
pub(crate) fn ensure_supported<B: Backend, T: Element>(
    backend: &B,
    op: BackendOp,
) -> Result<(), BackendError> {
    if backend.supports(op, T::DTYPE) {
        Ok(())
    } else {
        Err(BackendError::UnsupportedOperation {
            backend: backend.name(),
            operation: op.as_str(),
            dtype: T::DTYPE,
        })
    }
}
