//! Matrix multiplication

use super::{fill_positional, require_rank};
use crate::backend::{Backend, BackendOp, CpuBackend, GemmDims, dispatch, run_with_fallback};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::expr::{BinaryTemporaryOp, Expr};
use crate::tensor::{Shape, Tensor};

/// `C[m, n] = A[m, k] B[k, n]`
///
/// Row-major direct operands go to the backend's gemm; anything else (and
/// any dtype the backend refuses) runs the generic loop over coordinates.
#[derive(Copy, Clone, Debug, Default)]
pub struct MatMul<K: Backend = CpuBackend> {
    backend: K,
}

impl MatMul {
    /// Multiply on the CPU backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Backend> MatMul<K> {
    /// Multiply on `backend`
    pub fn with_backend(backend: K) -> Self {
        Self { backend }
    }

    /// The backend tried first
    pub fn backend(&self) -> &K {
        &self.backend
    }
}

impl<A, B, K> BinaryTemporaryOp<A, B> for MatMul<K>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    K: Backend,
{
    fn desc(&self) -> &'static str {
        "matmul"
    }

    fn shape(&self, a: &A, b: &B) -> Shape {
        Shape::from([a.dim(0), b.dim(1)])
    }

    fn dimensions(&self, _a: &A, _b: &B) -> usize {
        2
    }

    fn check(&self, a: &A, b: &B) -> Result<()> {
        require_rank("a", a, 2)?;
        require_rank("b", b, 2)?;
        if a.dim(1) != b.dim(0) {
            return Err(Error::shape_mismatch(&[a.dim(1), b.dim(1)], &b.shape()));
        }
        Ok(())
    }

    fn apply(&self, a: &A, b: &B, out: &mut Tensor<A::Elem>) -> Result<()> {
        let dims = GemmDims {
            m: a.dim(0),
            k: a.dim(1),
            n: b.dim(1),
        };
        run_with_fallback(
            "matmul",
            out,
            |out| {
                let lhs = dispatch::require_host_operand(&self.backend, BackendOp::Gemm, a)?;
                let rhs = dispatch::require_host_operand(&self.backend, BackendOp::Gemm, b)?;
                dispatch::gemm(&self.backend, dims, lhs, rhs, out)
            },
            |out| {
                fill_positional(out, |c| {
                    (0..dims.k).fold(A::Elem::zero(), |acc, p| acc + a.at(&[c[0], p]) * b.at(&[p, c[1]]))
                });
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{counters, reset_counters};
    use crate::expr::TemporaryBinaryExpr;
    use crate::tensor::ColumnMajor;

    #[test]
    fn test_matmul_dispatches_for_row_major_floats() {
        reset_counters();
        let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = Tensor::from_slice(&[7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]);
        let mut e = TemporaryBinaryExpr::new(&a, &b, MatMul::new()).unwrap();
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[58.0, 64.0, 139.0, 154.0]);
        assert_eq!(counters().backend_dispatches, 1);
        assert_eq!(counters().backend_fallbacks, 0);
    }

    #[test]
    fn test_matmul_generic_paths() {
        reset_counters();
        // integers are refused by the cpu gemm
        let a = Tensor::from_slice(&[1i64, 2, 3, 4], &[2, 2]);
        let mut e = TemporaryBinaryExpr::new(&a, &a, MatMul::new()).unwrap();
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[7, 10, 15, 22]);

        // column-major operands cannot be handed over
        let cm = Tensor::<f64, ColumnMajor>::from_vec(vec![1.0, 3.0, 2.0, 4.0], &[2, 2]).unwrap();
        let mut e = TemporaryBinaryExpr::new(&cm, &cm, MatMul::new()).unwrap();
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[7.0, 10.0, 15.0, 22.0]);
        assert_eq!(counters().backend_fallbacks, 2);
    }

    #[test]
    fn test_matmul_shape_checks() {
        let a = Tensor::<f32>::zeros(&[2, 3]);
        let v = Tensor::<f32>::zeros(&[3]);
        assert!(matches!(
            TemporaryBinaryExpr::new(&a, &a, MatMul::new()),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            TemporaryBinaryExpr::new(&a, &v, MatMul::new()),
            Err(Error::InvalidArgument { arg: "b", .. })
        ));
    }
}
