//! Element-wise binary node

use super::operators::BinaryOperator;
use super::{Expr, MemoryRegion, Visitor};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::simd::{MAX_LANES, VectorMode};
use crate::tensor::StorageOrder;

/// `op(a, b)` evaluated element by element on every read
///
/// Either operand may be a generator; the node then takes its shape from the
/// other operand. Both operands must share one storage order so that a flat
/// index names the same coordinates on both sides.
#[derive(Clone, Debug)]
pub struct BinaryExpr<A, B, Op> {
    a: A,
    b: B,
    op: Op,
}

impl<A, B, Op> BinaryExpr<A, B, Op>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryOperator<A::Elem>,
{
    /// Combine `a` and `b` with `op`
    ///
    /// Fails with `ShapeMismatch` when neither side is a generator and the
    /// shapes differ, and with `InvalidArgument` when the storage orders
    /// differ.
    pub fn new(a: A, b: B, op: Op) -> Result<Self> {
        if !A::IS_GENERATOR && !B::IS_GENERATOR && a.shape() != b.shape() {
            return Err(Error::shape_mismatch(&a.shape(), &b.shape()));
        }
        if !A::IS_GENERATOR && !B::IS_GENERATOR && A::STORAGE_ORDER != B::STORAGE_ORDER {
            return Err(Error::invalid_argument(
                "rhs",
                format!(
                    "storage order {} does not match {}",
                    B::STORAGE_ORDER.as_str(),
                    A::STORAGE_ORDER.as_str()
                ),
            ));
        }
        Ok(Self { a, b, op })
    }

    /// Left operand
    pub fn lhs(&self) -> &A {
        &self.a
    }

    /// Right operand
    pub fn rhs(&self) -> &B {
        &self.b
    }
}

impl<A, B, Op> Expr for BinaryExpr<A, B, Op>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryOperator<A::Elem>,
{
    type Elem = A::Elem;

    const IS_FAST: bool = A::IS_FAST && B::IS_FAST;
    const IS_LINEAR: bool = Op::LINEAR && A::IS_LINEAR && B::IS_LINEAR;
    const IS_GENERATOR: bool = A::IS_GENERATOR && B::IS_GENERATOR;
    const THREAD_SAFE: bool = Op::THREAD_SAFE && A::THREAD_SAFE && B::THREAD_SAFE;
    const NEEDS_TEMPORARY_VISITOR: bool =
        A::NEEDS_TEMPORARY_VISITOR || B::NEEDS_TEMPORARY_VISITOR;
    const NEEDS_EVALUATOR_VISITOR: bool =
        A::NEEDS_EVALUATOR_VISITOR || B::NEEDS_EVALUATOR_VISITOR;
    const STORAGE_ORDER: StorageOrder = if A::IS_GENERATOR {
        B::STORAGE_ORDER
    } else {
        A::STORAGE_ORDER
    };

    fn vectorizable(mode: VectorMode) -> bool {
        Op::vectorizable(mode) && A::vectorizable(mode) && B::vectorizable(mode)
    }

    fn gpu_computable() -> bool {
        Op::gpu_computable() && A::gpu_computable() && B::gpu_computable()
    }

    fn static_dimensions() -> Option<usize> {
        if !Self::IS_FAST {
            None
        } else if A::IS_GENERATOR {
            B::static_dimensions()
        } else {
            A::static_dimensions()
        }
    }

    fn static_dim(d: usize) -> Option<usize> {
        if !Self::IS_FAST {
            None
        } else if A::IS_GENERATOR {
            B::static_dim(d)
        } else {
            A::static_dim(d)
        }
    }

    fn static_size() -> Option<usize> {
        if !Self::IS_FAST {
            None
        } else if A::IS_GENERATOR {
            B::static_size()
        } else {
            A::static_size()
        }
    }

    #[inline]
    fn dimensions(&self) -> usize {
        if A::IS_GENERATOR {
            self.b.dimensions()
        } else {
            self.a.dimensions()
        }
    }

    #[inline]
    fn dim(&self, d: usize) -> usize {
        if A::IS_GENERATOR {
            self.b.dim(d)
        } else {
            self.a.dim(d)
        }
    }

    #[inline]
    fn size(&self) -> usize {
        if A::IS_GENERATOR {
            self.b.size()
        } else {
            self.a.size()
        }
    }

    #[inline]
    fn read_flat(&self, i: usize) -> Self::Elem {
        self.op.apply(self.a.read_flat(i), self.b.read_flat(i))
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> Self::Elem {
        self.op.apply(self.a.at(coords), self.b.at(coords))
    }

    fn load(&self, i: usize, lanes: &mut [Self::Elem]) {
        let mut scratch = [<Self::Elem as Element>::zero(); MAX_LANES];
        for (k, chunk) in lanes.chunks_mut(MAX_LANES).enumerate() {
            let start = i + k * MAX_LANES;
            let rhs = &mut scratch[..chunk.len()];
            self.a.load(start, chunk);
            self.b.load(start, rhs);
            self.op.load(chunk, rhs);
        }
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        self.a.overlaps(region) || self.b.overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        self.a.for_each_region(f);
        self.b.for_each_region(f);
    }

    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        self.a.visit(visitor)?;
        self.b.visit(visitor)
    }

    fn describe(&self) -> String {
        format!(
            "({} {} {})",
            self.a.describe(),
            self.op.desc(),
            self.b.describe()
        )
    }
}
