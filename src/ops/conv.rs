//! Full 1-D convolution

use super::require_rank;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::expr::{BinaryTemporaryOp, Expr};
use crate::tensor::{Shape, Tensor};

/// `y[i] = sum_j a[j] k[i - j]`, output length `n + k - 1`
#[derive(Copy, Clone, Debug, Default)]
pub struct Conv1dFull;

impl<A, K> BinaryTemporaryOp<A, K> for Conv1dFull
where
    A: Expr,
    K: Expr<Elem = A::Elem>,
{
    fn desc(&self) -> &'static str {
        "conv1d_full"
    }

    fn shape(&self, a: &A, kernel: &K) -> Shape {
        Shape::from([a.dim(0) + kernel.dim(0) - 1])
    }

    fn check(&self, a: &A, kernel: &K) -> Result<()> {
        require_rank("input", a, 1)?;
        require_rank("kernel", kernel, 1)?;
        if a.dim(0) == 0 || kernel.dim(0) == 0 {
            return Err(Error::invalid_argument(
                "kernel",
                "full convolution needs non-empty input and kernel",
            ));
        }
        Ok(())
    }

    fn apply(&self, a: &A, kernel: &K, out: &mut Tensor<A::Elem>) -> Result<()> {
        let n = a.dim(0);
        let k = kernel.dim(0);
        for (i, y) in out.as_mut_slice().iter_mut().enumerate() {
            // j ranges over input positions whose kernel tap i - j exists
            let lo = (i + 1).saturating_sub(k);
            let hi = i.min(n - 1);
            *y = (lo..=hi).fold(A::Elem::zero(), |acc, j| acc + a.at(&[j]) * kernel.at(&[i - j]));
        }
        Ok(())
    }
}
