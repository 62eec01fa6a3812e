//! Temporary expression over two operands

use super::{
    BinaryTemporaryOp, ForcedSlot, Lifecycle, ResultSlot, SharedSlot, TemporaryState, apply_direct,
    check_destination, copy_result,
};
use crate::error::Result;
use crate::expr::visitor::{self, TemporaryNode, Visitor};
use crate::expr::{Expr, MemoryRegion};
use crate::simd::VectorMode;
use crate::tensor::{StorageOrder, Tensor, ravel_index};

/// `op(a, b)` materialized into a result before it is read
#[derive(Clone, Debug)]
pub struct TemporaryBinaryExpr<A: Expr, B, Op, S = SharedSlot<<A as Expr>::Elem>> {
    a: A,
    b: B,
    op: Op,
    state: TemporaryState<S>,
}

impl<A, B, Op> TemporaryBinaryExpr<A, B, Op, SharedSlot<A::Elem>>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryTemporaryOp<A, B>,
{
    /// Expression whose result is allocated on demand and shared by clones
    pub fn new(a: A, b: B, op: Op) -> Result<Self> {
        op.check(&a, &b)?;
        let shape = op.shape(&a, &b);
        Ok(Self {
            a,
            b,
            op,
            state: TemporaryState::unforced(SharedSlot::new(), shape),
        })
    }
}

impl<'d, A, B, Op> TemporaryBinaryExpr<A, B, Op, ForcedSlot<'d, A::Elem>>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryTemporaryOp<A, B>,
{
    /// Expression writing its result into `dest`
    ///
    /// The expression starts out allocated; `dest` must have the result shape.
    pub fn forced(a: A, b: B, op: Op, dest: &'d mut Tensor<A::Elem>) -> Result<Self> {
        op.check(&a, &b)?;
        let shape = op.shape(&a, &b);
        check_destination(&shape, dest)?;
        Ok(Self {
            a,
            b,
            op,
            state: TemporaryState::forced(ForcedSlot::new(dest), shape),
        })
    }
}

impl<A, B, Op, S> TemporaryBinaryExpr<A, B, Op, S>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryTemporaryOp<A, B>,
    S: ResultSlot<A::Elem>,
{
    /// Left operand
    pub fn lhs(&self) -> &A {
        &self.a
    }

    /// Right operand
    pub fn rhs(&self) -> &B {
        &self.b
    }

    /// The operator
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Current lifecycle stage
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    /// Result storage exists
    pub fn is_allocated(&self) -> bool {
        self.state.lifecycle() != Lifecycle::Unevaluated
    }

    /// Result computed
    pub fn is_evaluated(&self) -> bool {
        self.state.lifecycle() == Lifecycle::Evaluated
    }

    /// Allocate the result storage unless it exists or the expression is forced
    pub fn allocate_temporary(&mut self) {
        let (a, b, op) = (&self.a, &self.b, &self.op);
        self.state.allocate(
            || op.allocate(a, b),
            &|| format!("{}({}, {})", op.desc(), a.describe(), b.describe()),
        );
    }

    /// Compute the result; no-op once evaluated
    ///
    /// # Panics
    ///
    /// Panics when called before [`allocate_temporary`](Self::allocate_temporary).
    pub fn evaluate(&mut self) -> Result<()> {
        let (a, b, op) = (&self.a, &self.b, &self.op);
        self.state.evaluate(
            |out| op.apply(a, b, out),
            &|| format!("{}({}, {})", op.desc(), a.describe(), b.describe()),
        )
    }

    /// Compute the result into `dest`
    ///
    /// A forced expression applies its operator straight into `dest`. An
    /// unforced one evaluates its own result first and copies it, so later
    /// readers still find it.
    pub fn direct_evaluate(&mut self, dest: &mut Tensor<A::Elem>) -> Result<()> {
        visitor::prepare(&mut self.a)?;
        visitor::prepare(&mut self.b)?;
        if S::FORCED {
            let (a, b, op) = (&self.a, &self.b, &self.op);
            return apply_direct(
                self.state.shape(),
                dest,
                &|| format!("{}({}, {})", op.desc(), a.describe(), b.describe()),
                |out| op.apply(a, b, out),
            );
        }
        self.allocate_temporary();
        self.evaluate()?;
        copy_result(self.result(), dest)
    }

    /// The materialized result
    ///
    /// # Panics
    ///
    /// Panics unless the expression has been evaluated.
    pub fn result(&self) -> &Tensor<A::Elem> {
        let (a, b, op) = (&self.a, &self.b, &self.op);
        self.state
            .result::<A::Elem>(&|| format!("{}({}, {})", op.desc(), a.describe(), b.describe()))
    }

    /// Move the expression out
    ///
    /// The returned expression keeps the lifecycle stage and the result; this
    /// one drops back from `Evaluated` to `Allocated`.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
        B: Clone,
        Op: Clone,
    {
        Self {
            a: self.a.clone(),
            b: self.b.clone(),
            op: self.op.clone(),
            state: self.state.take::<A::Elem>(),
        }
    }
}

impl<A, B, Op, S> TemporaryNode for TemporaryBinaryExpr<A, B, Op, S>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryTemporaryOp<A, B>,
    S: ResultSlot<A::Elem>,
{
    fn allocate_temporary(&mut self) {
        TemporaryBinaryExpr::allocate_temporary(self)
    }

    fn evaluate(&mut self) -> Result<()> {
        TemporaryBinaryExpr::evaluate(self)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    fn label(&self) -> String {
        Expr::describe(self)
    }
}

impl<A, B, Op, S> Expr for TemporaryBinaryExpr<A, B, Op, S>
where
    A: Expr,
    B: Expr<Elem = A::Elem>,
    Op: BinaryTemporaryOp<A, B>,
    S: ResultSlot<A::Elem>,
{
    type Elem = A::Elem;

    const IS_LINEAR: bool = true;
    const IS_DIRECT: bool = true;
    const IS_TEMPORARY: bool = true;
    const EVALUATES_INTO: bool = true;
    const NEEDS_TEMPORARY_VISITOR: bool = true;
    const NEEDS_EVALUATOR_VISITOR: bool = true;
    const STORAGE_ORDER: StorageOrder = StorageOrder::RowMajor;

    fn vectorizable(_mode: VectorMode) -> bool {
        true
    }

    #[inline]
    fn dimensions(&self) -> usize {
        self.state.shape().ndim()
    }

    #[inline]
    fn dim(&self, d: usize) -> usize {
        self.state.shape()[d]
    }

    #[inline]
    fn size(&self) -> usize {
        self.state.shape().elem_count()
    }

    #[inline]
    fn read_flat(&self, i: usize) -> Self::Elem {
        self.result().as_slice()[i]
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> Self::Elem {
        let shape = self.state.shape();
        self.result().as_slice()[ravel_index(shape, StorageOrder::RowMajor, coords)]
    }

    #[inline]
    fn load(&self, i: usize, lanes: &mut [Self::Elem]) {
        lanes.copy_from_slice(&self.result().as_slice()[i..i + lanes.len()]);
    }

    fn memory(&self) -> Option<&[Self::Elem]> {
        self.state.memory::<A::Elem>().map(|t| t.as_slice())
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        self.a.overlaps(region) || self.b.overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        self.a.for_each_region(f);
        self.b.for_each_region(f);
    }

    fn alias<O: Expr>(&self, other: &O) -> bool {
        self.a.alias(other) || self.b.alias(other)
    }

    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        self.a.visit(visitor)?;
        self.b.visit(visitor)?;
        visitor.visit_temporary(self)
    }

    fn evaluate_into(&mut self, dest: &mut Tensor<Self::Elem>) -> Result<()> {
        visitor::prepare(&mut self.a)?;
        visitor::prepare(&mut self.b)?;
        let (a, b, op) = (&self.a, &self.b, &self.op);
        apply_direct(
            self.state.shape(),
            dest,
            &|| format!("{}({}, {})", op.desc(), a.describe(), b.describe()),
            |out| op.apply(a, b, out),
        )
    }

    fn describe(&self) -> String {
        format!(
            "{}({}, {})",
            self.op.desc(),
            self.a.describe(),
            self.b.describe()
        )
    }
}
