//! Temporary operations
//!
//! Operators whose element `i` depends on more than element `i` of their
//! operands. Each one is a small descriptor implementing
//! [`UnaryTemporaryOp`](crate::expr::UnaryTemporaryOp) or
//! [`BinaryTemporaryOp`](crate::expr::BinaryTemporaryOp); the temporary
//! expression wrapping it owns allocation and evaluation.
//!
//! ```text
//! MatMul        [m, k] x [k, n] -> [m, n]     backend gemm, generic ikj loop
//! OuterProduct  [n] x [m]       -> [n, m]
//! Conv1dFull    [n] x [k]       -> [n + k - 1]
//! Pool2d        [.., h, w]      -> [.., oh, ow] backend pool2d_forward, generic windows
//! Materialize   shape           -> shape      (row-major copy)
//! ```

mod conv;
mod materialize;
mod matmul;
mod outer;
mod pool;

pub use conv::Conv1dFull;
pub use materialize::Materialize;
pub use matmul::MatMul;
pub use outer::OuterProduct;
pub use pool::Pool2d;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::tensor::{StorageOrder, Tensor, unravel_index};

/// Fill a row-major `out` element by element from its coordinates
pub(crate) fn fill_positional<T: Element>(out: &mut Tensor<T>, mut f: impl FnMut(&[usize]) -> T) {
    let shape = out.shape().to_vec();
    let mut coords = vec![0; shape.len()];
    for (flat, v) in out.as_mut_slice().iter_mut().enumerate() {
        unravel_index(&shape, StorageOrder::RowMajor, flat, &mut coords);
        *v = f(&coords);
    }
}

/// Fail with `InvalidArgument` unless `e` has exactly `rank` dimensions
pub(crate) fn require_rank<E: Expr>(arg: &'static str, e: &E, rank: usize) -> Result<()> {
    if e.dimensions() != rank {
        return Err(Error::invalid_argument(
            arg,
            format!("expected {rank}-d operand, got {} ({})", e.dimensions(), e.describe()),
        ));
    }
    Ok(())
}
