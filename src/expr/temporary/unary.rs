//! Temporary expression over one operand

use super::{
    ForcedSlot, Lifecycle, ResultSlot, SharedSlot, TemporaryState, UnaryTemporaryOp, apply_direct,
    check_destination, copy_result,
};
use crate::error::Result;
use crate::expr::visitor::{self, TemporaryNode, Visitor};
use crate::expr::{Expr, MemoryRegion};
use crate::simd::VectorMode;
use crate::tensor::{StorageOrder, Tensor, ravel_index};

/// `op(a)` materialized into a result before it is read
#[derive(Clone, Debug)]
pub struct TemporaryUnaryExpr<A: Expr, Op, S = SharedSlot<<A as Expr>::Elem>> {
    a: A,
    op: Op,
    state: TemporaryState<S>,
}

impl<A, Op> TemporaryUnaryExpr<A, Op, SharedSlot<A::Elem>>
where
    A: Expr,
    Op: UnaryTemporaryOp<A>,
{
    /// Expression whose result is allocated on demand and shared by clones
    pub fn new(a: A, op: Op) -> Result<Self> {
        op.check(&a)?;
        let shape = op.shape(&a);
        Ok(Self {
            a,
            op,
            state: TemporaryState::unforced(SharedSlot::new(), shape),
        })
    }
}

impl<'d, A, Op> TemporaryUnaryExpr<A, Op, ForcedSlot<'d, A::Elem>>
where
    A: Expr,
    Op: UnaryTemporaryOp<A>,
{
    /// Expression writing its result into `dest`
    ///
    /// The expression starts out allocated; `dest` must have the result shape.
    pub fn forced(a: A, op: Op, dest: &'d mut Tensor<A::Elem>) -> Result<Self> {
        op.check(&a)?;
        let shape = op.shape(&a);
        check_destination(&shape, dest)?;
        Ok(Self {
            a,
            op,
            state: TemporaryState::forced(ForcedSlot::new(dest), shape),
        })
    }
}

impl<A, Op, S> TemporaryUnaryExpr<A, Op, S>
where
    A: Expr,
    Op: UnaryTemporaryOp<A>,
    S: ResultSlot<A::Elem>,
{
    /// The operand
    pub fn value(&self) -> &A {
        &self.a
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
        let (a, op) = (&self.a, &self.op);
        self.state
            .allocate(|| op.allocate(a), &|| format!("{}({})", op.desc(), a.describe()));
    }

    /// Compute the result; no-op once evaluated
    ///
    /// # Panics
    ///
    /// Panics when called before [`allocate_temporary`](Self::allocate_temporary).
    pub fn evaluate(&mut self) -> Result<()> {
        let (a, op) = (&self.a, &self.op);
        self.state.evaluate(
            |out| op.apply(a, out),
            &|| format!("{}({})", op.desc(), a.describe()),
        )
    }

    /// Compute the result into `dest`
    ///
    /// A forced expression applies its operator straight into `dest`. An
    /// unforced one evaluates its own result first and copies it, so later
    /// readers still find it.
    pub fn direct_evaluate(&mut self, dest: &mut Tensor<A::Elem>) -> Result<()> {
        visitor::prepare(&mut self.a)?;
        if S::FORCED {
            let (a, op) = (&self.a, &self.op);
            return apply_direct(
                self.state.shape(),
                dest,
                &|| format!("{}({})", op.desc(), a.describe()),
                |out| op.apply(a, out),
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
        self.state
            .result::<A::Elem>(&|| format!("{}({})", self.op.desc(), self.a.describe()))
    }

    /// Move the expression out
    ///
    /// The returned expression keeps the lifecycle stage and the result; this
    /// one drops back from `Evaluated` to `Allocated`.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
        Op: Clone,
    {
        Self {
            a: self.a.clone(),
            op: self.op.clone(),
            state: self.state.take::<A::Elem>(),
        }
    }
}

impl<A, Op, S> TemporaryNode for TemporaryUnaryExpr<A, Op, S>
where
    A: Expr,
    Op: UnaryTemporaryOp<A>,
    S: ResultSlot<A::Elem>,
{
    fn allocate_temporary(&mut self) {
        TemporaryUnaryExpr::allocate_temporary(self)
    }

    fn evaluate(&mut self) -> Result<()> {
        TemporaryUnaryExpr::evaluate(self)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    fn label(&self) -> String {
        Expr::describe(self)
    }
}

impl<A, Op, S> Expr for TemporaryUnaryExpr<A, Op, S>
where
    A: Expr,
    Op: UnaryTemporaryOp<A>,
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
        self.a.overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        self.a.for_each_region(f)
    }

    fn alias<O: Expr>(&self, other: &O) -> bool {
        self.a.alias(other)
    }

    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        self.a.visit(visitor)?;
        visitor.visit_temporary(self)
    }

    fn evaluate_into(&mut self, dest: &mut Tensor<Self::Elem>) -> Result<()> {
        visitor::prepare(&mut self.a)?;
        let (a, op) = (&self.a, &self.op);
        apply_direct(
            self.state.shape(),
            dest,
            &|| format!("{}({})", op.desc(), a.describe()),
            |out| op.apply(a, out),
        )
    }

    fn describe(&self) -> String {
        format!("{}({})", self.op.desc(), self.a.describe())
    }
}
