//! Element-wise unary node

use super::operators::UnaryOperator;
use super::{Expr, MemoryRegion, Visitor};
use crate::error::Result;
use crate::simd::VectorMode;
use crate::tensor::StorageOrder;

/// `op(a)` evaluated element by element on every read
#[derive(Clone, Debug)]
pub struct UnaryExpr<A, Op> {
    a: A,
    op: Op,
}

impl<A: Expr, Op: UnaryOperator<A::Elem>> UnaryExpr<A, Op> {
    /// Wrap `a` with `op`
    pub fn new(a: A, op: Op) -> Self {
        Self { a, op }
    }

    /// The operand
    pub fn value(&self) -> &A {
        &self.a
    }

    /// The operator
    pub fn op(&self) -> &Op {
        &self.op
    }
}

impl<A: Expr, Op: UnaryOperator<A::Elem>> Expr for UnaryExpr<A, Op> {
    type Elem = A::Elem;

    const IS_FAST: bool = A::IS_FAST;
    const IS_LINEAR: bool = Op::LINEAR && A::IS_LINEAR;
    const IS_GENERATOR: bool = A::IS_GENERATOR;
    const THREAD_SAFE: bool = Op::THREAD_SAFE && A::THREAD_SAFE;
    const NEEDS_TEMPORARY_VISITOR: bool = A::NEEDS_TEMPORARY_VISITOR;
    const NEEDS_EVALUATOR_VISITOR: bool = A::NEEDS_EVALUATOR_VISITOR;
    const STORAGE_ORDER: StorageOrder = A::STORAGE_ORDER;

    fn vectorizable(mode: VectorMode) -> bool {
        Op::vectorizable(mode) && A::vectorizable(mode)
    }

    fn gpu_computable() -> bool {
        Op::gpu_computable() && A::gpu_computable()
    }

    fn static_dimensions() -> Option<usize> {
        A::static_dimensions()
    }

    fn static_dim(d: usize) -> Option<usize> {
        A::static_dim(d)
    }

    fn static_size() -> Option<usize> {
        A::static_size()
    }

    #[inline]
    fn dimensions(&self) -> usize {
        self.a.dimensions()
    }

    #[inline]
    fn dim(&self, d: usize) -> usize {
        self.a.dim(d)
    }

    #[inline]
    fn size(&self) -> usize {
        self.a.size()
    }

    #[inline]
    fn read_flat(&self, i: usize) -> Self::Elem {
        self.op.apply(self.a.read_flat(i))
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> Self::Elem {
        self.op.apply(self.a.at(coords))
    }

    #[inline]
    fn load(&self, i: usize, lanes: &mut [Self::Elem]) {
        self.a.load(i, lanes);
        self.op.load(lanes);
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        self.a.overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        self.a.for_each_region(f)
    }

    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        self.a.visit(visitor)
    }

    fn describe(&self) -> String {
        format!("{}({})", self.op.desc(), self.a.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex64;
    use crate::expr::operators::MinusUnaryOp;
    use crate::tensor::Tensor;

    #[test]
    fn test_minus_reads() {
        let t = Tensor::from_slice(&[1.0f64, -2.0, 3.0, 4.0], &[2, 2]);
        let e = UnaryExpr::new(&t, MinusUnaryOp);
        assert_eq!(e.read_flat(1), 2.0);
        assert_eq!(e.at(&[1, 1]), -4.0);
        assert_eq!(e.size(), 4);
        assert_eq!(e.describe(), "-(tensor[2x2])");

        let mut lanes = [0.0; 3];
        e.load(1, &mut lanes);
        assert_eq!(lanes, [2.0, -3.0, -4.0]);
    }

    #[test]
    fn test_vectorizable_follows_operator() {
        type Real = UnaryExpr<Tensor<f32>, MinusUnaryOp>;
        type Cplx = UnaryExpr<Tensor<Complex64>, MinusUnaryOp>;
        assert!(Real::vectorizable(VectorMode::Avx));
        assert!(!Cplx::vectorizable(VectorMode::Avx));
        assert!(Real::IS_LINEAR);
        assert!(!Real::gpu_computable());
    }
}
