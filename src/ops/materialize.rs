//! Identity temporary: force an expression into row-major memory

use super::fill_positional;
use crate::error::Result;
use crate::expr::{Expr, UnaryTemporaryOp};
use crate::tensor::{Shape, StorageOrder, Tensor};

/// Copy of the operand in row-major order
///
/// Useful to read an expensive sub-expression once instead of on every access,
/// and to hand column-major or computed operands to a backend.
#[derive(Copy, Clone, Debug, Default)]
pub struct Materialize;

impl<A: Expr> UnaryTemporaryOp<A> for Materialize {
    fn desc(&self) -> &'static str {
        "materialize"
    }

    fn shape(&self, a: &A) -> Shape {
        a.shape()
    }

    fn apply(&self, a: &A, out: &mut Tensor<A::Elem>) -> Result<()> {
        if A::STORAGE_ORDER == StorageOrder::RowMajor {
            match a.memory() {
                Some(mem) => out.as_mut_slice().copy_from_slice(mem),
                None => {
                    for (i, v) in out.as_mut_slice().iter_mut().enumerate() {
                        *v = a.read_flat(i);
                    }
                }
            }
        } else {
            fill_positional(out, |c| a.at(c));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ExprExt, TemporaryUnaryExpr};
    use crate::tensor::ColumnMajor;

    #[test]
    fn test_materialize_column_major() {
        let cm = Tensor::<i32, ColumnMajor>::from_vec(vec![1, 4, 2, 5, 3, 6], &[2, 3]).unwrap();
        let mut e = TemporaryUnaryExpr::new(&cm, Materialize).unwrap();
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_materialize_computed_operand() {
        let t = Tensor::from_slice(&[1.0f32, -2.0, 3.0], &[3]);
        let mut e = TemporaryUnaryExpr::new((&t).neg(), Materialize).unwrap();
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.result().as_slice(), &[-1.0, 2.0, -3.0]);
        assert_eq!(e.describe(), "materialize(-(tensor[3]))");
    }
}
