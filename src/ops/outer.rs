//! Outer product of two vectors

use super::{fill_positional, require_rank};
use crate::error::Result;
use crate::expr::{BinaryTemporaryOp, Expr};
use crate::tensor::{Shape, Tensor};

/// `C[i, j] = a[i] b[j]`
#[derive(Copy, Clone, Debug, Default)]
pub struct OuterProduct;

impl<A, B> BinaryTemporaryOp<A, B> for OuterProduct
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
{
    fn desc(&self) -> &'static str {
        "outer"
    }

    fn shape(&self, a: &A, b: &B) -> Shape {
        Shape::from([a.dim(0), b.dim(0)])
    }

    fn check(&self, a: &A, b: &B) -> Result<()> {
        require_rank("a", a, 1)?;
        require_rank("b", b, 1)
    }

    fn apply(&self, a: &A, b: &B, out: &mut Tensor<A::Elem>) -> Result<()> {
        fill_positional(out, |c| a.at(&c[..1]) * b.at(&c[1..]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::TemporaryBinaryExpr;

    #[test]
    fn test_outer() {
        let a = Tensor::from_slice(&[1i32, 2, 3], &[3]);
        let b = Tensor::from_slice(&[10i32, 20], &[2]);
        let mut e = TemporaryBinaryExpr::new(&a, &b, OuterProduct).unwrap();
        assert_eq!(e.dimensions(), 2);
        assert_eq!(e.size(), 6);
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[10, 20, 20, 40, 30, 60]);
        assert_eq!(e.describe(), "outer(tensor[3], tensor[2])");
    }

    #[test]
    fn test_outer_rejects_matrices() {
        let m = Tensor::<f32>::zeros(&[2, 2]);
        assert!(TemporaryBinaryExpr::new(&m, &m, OuterProduct).is_err());
    }
}
