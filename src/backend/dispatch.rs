//! Dispatch entry points used by temporary operators
//!
//! These functions sit between an operator's `apply` and a [`Backend`]: they
//! check that operands can be handed over, build descriptors, split tensors
//! whose rank exceeds what the backend describes, keep the counters and mark
//! the destination resident when a device backend succeeds.

use super::{Backend, BackendOp, GemmDims, PoolingDescriptor, Residency};
use crate::config::{self, BackendFallback};
use crate::counters::{Counter, bump};
use crate::dtype::Element;
use crate::error::{BackendError, Result};
use crate::expr::Expr;
use crate::tensor::{StorageOrder, Tensor};
use log::{debug, warn};

/// Contiguous row-major memory of `e`, when it has one
///
/// Backends take packed row-major buffers; anything else goes to the generic loop.
pub fn host_operand<E: Expr>(e: &E) -> Option<&[E::Elem]> {
    if E::STORAGE_ORDER == StorageOrder::RowMajor {
        e.memory()
    } else {
        None
    }
}

/// [`host_operand`], or `UnsupportedLayout` naming the backend and operation
pub fn require_host_operand<'e, B: Backend, E: Expr>(
    backend: &B,
    op: BackendOp,
    e: &'e E,
) -> std::result::Result<&'e [E::Elem], BackendError> {
    host_operand(e).ok_or(BackendError::UnsupportedLayout {
        backend: backend.name(),
        operation: op.as_str(),
        required: "contiguous row-major",
    })
}

/// Run `c = a b` on `backend`
pub fn gemm<B: Backend, T: Element>(
    backend: &B,
    dims: GemmDims,
    a: &[T],
    b: &[T],
    c: &mut Tensor<T>,
) -> std::result::Result<(), BackendError> {
    bump(Counter::BackendDispatch);
    debug!(
        "{}: gemm {}x{} * {}x{} ({:?})",
        backend.name(),
        dims.m,
        dims.k,
        dims.k,
        dims.n,
        T::DTYPE
    );
    backend.gemm(dims, a, b, c.as_mut_slice())?;
    mark_if_device(backend, c);
    Ok(())
}

/// Pool `x` (of shape `x_shape`) into `y` on `backend`
///
/// Ranks above [`Backend::max_rank`] are split over their leading dimension
/// and dispatched slice by slice.
pub fn pool2d_forward<B: Backend, T: Element>(
    backend: &B,
    pool: &PoolingDescriptor,
    x: &[T],
    x_shape: &[usize],
    y: &mut Tensor<T>,
) -> std::result::Result<(), BackendError> {
    let y_shape = y.shape().to_vec();
    if y_shape.len() != x_shape.len() {
        return Err(BackendError::DescriptorMismatch {
            backend: backend.name(),
            operation: BackendOp::Pool2dForward.as_str(),
            reason: format!("input rank {} but output rank {}", x_shape.len(), y_shape.len()),
        });
    }
    pool_rec(backend, pool, x, x_shape, y.as_mut_slice(), &y_shape)?;
    mark_if_device(backend, y);
    Ok(())
}

/// A device backend leaves the host copy stale
fn mark_if_device<B: Backend, T: Element>(backend: &B, out: &mut Tensor<T>) {
    if backend.residency() == Residency::Device {
        out.mark_resident(backend.name());
    }
}

fn pool_rec<B: Backend, T: Element>(
    backend: &B,
    pool: &PoolingDescriptor,
    x: &[T],
    x_shape: &[usize],
    y: &mut [T],
    y_shape: &[usize],
) -> std::result::Result<(), BackendError> {
    if x_shape.len() > backend.max_rank() {
        let x_step: usize = x_shape[1..].iter().product();
        let y_step: usize = y_shape[1..].iter().product();
        if x_step == 0 || y_step == 0 {
            return Ok(());
        }
        for (xs, ys) in x.chunks(x_step).zip(y.chunks_mut(y_step)) {
            pool_rec(backend, pool, xs, &x_shape[1..], ys, &y_shape[1..])?;
        }
        return Ok(());
    }

    let x_desc = backend.tensor_descriptor(x_shape, T::DTYPE)?;
    let y_desc = backend.tensor_descriptor(y_shape, T::DTYPE)?;
    bump(Counter::BackendDispatch);
    debug!(
        "{}: {} {x_desc} -> {y_desc}",
        backend.name(),
        pool.mode.as_str()
    );
    backend.pool2d_forward(pool, &x_desc, x, &y_desc, y)
}

/// Try `dispatch`, fall back to `generic` when the backend cannot help
///
/// "Unsupported" failures (rank, dtype, layout) always fall back. Any other
/// failure is logged and then either propagated as `Error::Backend` or
/// replaced by the generic loop, as [`EvalConfig::backend_fallback`] says.
///
/// [`EvalConfig::backend_fallback`]: crate::config::EvalConfig::backend_fallback
pub fn run_with_fallback<T: Element>(
    operation: &'static str,
    out: &mut Tensor<T>,
    dispatch: impl FnOnce(&mut Tensor<T>) -> std::result::Result<(), BackendError>,
    generic: impl FnOnce(&mut Tensor<T>) -> Result<()>,
) -> Result<()> {
    let err = match dispatch(out) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };

    if err.is_unsupported() {
        debug!("{operation}: {err}; using generic loop");
        bump(Counter::BackendFallback);
        return generic(out);
    }

    match config::current().backend_fallback {
        BackendFallback::Generic => {
            warn!("{operation}: {err}; falling back to generic loop");
            bump(Counter::BackendFallback);
            generic(out)
        }
        BackendFallback::Propagate => {
            warn!("{operation}: {err}");
            Err(err.into())
        }
    }
}
