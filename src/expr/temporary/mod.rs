//! Temporary expressions
//!
//! Some operators (matrix multiply, convolution, pooling, ...) cannot produce
//! element `i` of their result from element `i` of their operands. Their
//! expressions materialize the whole result before anything reads it.
//!
//! # Lifecycle
//!
//! ```text
//! Unevaluated --allocate_temporary()--> Allocated --evaluate()--> Evaluated
//! ```
//!
//! Both transitions are monotonic for an instance. `take()` moves an
//! expression out: the new instance keeps the lifecycle, the moved-from one
//! falls back from `Evaluated` to `Allocated`.
//!
//! # Slots
//!
//! - [`SharedSlot`]: the result is allocated on `allocate_temporary()` and
//!   shared by every clone of the expression; `apply` runs once in total.
//! - [`ForcedSlot`]: the caller supplies the destination up front; the
//!   expression starts `Allocated` and `apply` writes straight into it.
//!
//! Operators only implement [`UnaryTemporaryOp::apply`] (or the binary
//! counterpart) against an output tensor; the expression handles both slot
//! kinds.

mod binary;
mod slot;
mod unary;

pub use binary::TemporaryBinaryExpr;
pub use slot::{ForcedSlot, ResultSlot, SharedSlot};
pub use unary::TemporaryUnaryExpr;

use super::Expr;
use crate::counters::{Counter, bump};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Stage a temporary expression has reached
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    /// Constructed, no result storage yet
    Unevaluated,
    /// Result storage exists but holds no result
    Allocated,
    /// Result computed and readable
    Evaluated,
}

/// Operator of a temporary expression over one operand
pub trait UnaryTemporaryOp<A: Expr>: Sync {
    /// Name used in descriptions
    fn desc(&self) -> &'static str;

    /// Shape of the result for operand `a`
    fn shape(&self, a: &A) -> Shape;

    /// Number of result dimensions
    fn dimensions(&self, a: &A) -> usize {
        self.shape(a).ndim()
    }

    /// Extent of result dimension `d`
    fn dim(&self, a: &A, d: usize) -> usize {
        self.shape(a)[d]
    }

    /// Number of result elements
    fn size(&self, a: &A) -> usize {
        self.shape(a).elem_count()
    }

    /// Validate the operand; called once at construction
    fn check(&self, _a: &A) -> Result<()> {
        Ok(())
    }

    /// Storage for the result of `a`
    fn allocate(&self, a: &A) -> Tensor<A::Elem> {
        Tensor::zeros(&self.shape(a))
    }

    /// Compute the result of `a` into `out`
    ///
    /// `out` has the shape returned by [`shape`](Self::shape). Operands that
    /// are temporaries have been evaluated.
    fn apply(&self, a: &A, out: &mut Tensor<A::Elem>) -> Result<()>;
}

/// Operator of a temporary expression over two operands
pub trait BinaryTemporaryOp<A: Expr, B: Expr<Elem = A::Elem>>: Sync {
    /// Name used in descriptions
    fn desc(&self) -> &'static str;

    /// Shape of the result for operands `a` and `b`
    fn shape(&self, a: &A, b: &B) -> Shape;

    /// Number of result dimensions
    fn dimensions(&self, a: &A, b: &B) -> usize {
        self.shape(a, b).ndim()
    }

    /// Extent of result dimension `d`
    fn dim(&self, a: &A, b: &B, d: usize) -> usize {
        self.shape(a, b)[d]
    }

    /// Number of result elements
    fn size(&self, a: &A, b: &B) -> usize {
        self.shape(a, b).elem_count()
    }

    /// Validate the operands; called once at construction
    fn check(&self, _a: &A, _b: &B) -> Result<()> {
        Ok(())
    }

    /// Storage for the result of `a` and `b`
    fn allocate(&self, a: &A, b: &B) -> Tensor<A::Elem> {
        Tensor::zeros(&self.shape(a, b))
    }

    /// Compute the result of `a` and `b` into `out`
    fn apply(&self, a: &A, b: &B, out: &mut Tensor<A::Elem>) -> Result<()>;
}

/// Slot plus lifecycle bookkeeping shared by unary and binary temporaries
#[derive(Clone, Debug)]
pub(crate) struct TemporaryState<S> {
    slot: S,
    lifecycle: Lifecycle,
    shape: Shape,
}

impl<S> TemporaryState<S> {
    pub(crate) fn unforced(slot: S, shape: Shape) -> Self {
        Self {
            slot,
            lifecycle: Lifecycle::Unevaluated,
            shape,
        }
    }

    /// State of a forced expression; the destination shape is already checked
    pub(crate) fn forced(slot: S, shape: Shape) -> Self {
        Self {
            slot,
            lifecycle: Lifecycle::Allocated,
            shape,
        }
    }

    #[inline]
    pub(crate) fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn allocate<T, F>(&mut self, alloc: F, label: &dyn Fn() -> String)
    where
        T: Element,
        S: ResultSlot<T>,
        F: FnOnce() -> Tensor<T>,
    {
        if !S::FORCED && !self.slot.has_storage() {
            let storage = alloc();
            log::trace!("allocated {:?} result for {}", storage.shape(), label());
            bump(Counter::Temporary);
            self.slot.install(storage);
        }
        if self.lifecycle == Lifecycle::Unevaluated {
            self.lifecycle = Lifecycle::Allocated;
        }
    }

    pub(crate) fn evaluate<T, F>(&mut self, apply: F, label: &dyn Fn() -> String) -> Result<()>
    where
        T: Element,
        S: ResultSlot<T>,
        F: FnOnce(&mut Tensor<T>) -> Result<()>,
    {
        if self.lifecycle == Lifecycle::Evaluated {
            return Ok(());
        }
        assert!(
            self.lifecycle == Lifecycle::Allocated,
            "evaluate() called on {} before allocate_temporary()",
            label()
        );
        if self.slot.compute(apply)? {
            log::trace!("evaluated {}", label());
            bump(Counter::Evaluation);
        }
        self.lifecycle = Lifecycle::Evaluated;
        Ok(())
    }

    pub(crate) fn result<T>(&self, label: &dyn Fn() -> String) -> &Tensor<T>
    where
        T: Element,
        S: ResultSlot<T>,
    {
        assert!(
            self.lifecycle == Lifecycle::Evaluated,
            "result() of {} read before evaluate() ({:?})",
            label(),
            self.lifecycle
        );
        match self.slot.get() {
            Some(result) => result,
            None => panic!("result() of {} has no storage", label()),
        }
    }

    /// Evaluated result, `None` at any earlier stage
    pub(crate) fn memory<T>(&self) -> Option<&Tensor<T>>
    where
        T: Element,
        S: ResultSlot<T>,
    {
        if self.lifecycle == Lifecycle::Evaluated {
            self.slot.get()
        } else {
            None
        }
    }

    pub(crate) fn take<T>(&mut self) -> Self
    where
        T: Element,
        S: ResultSlot<T>,
    {
        let moved = Self {
            slot: self.slot.take(),
            lifecycle: self.lifecycle,
            shape: self.shape.clone(),
        };
        if self.lifecycle == Lifecycle::Evaluated {
            self.lifecycle = Lifecycle::Allocated;
        }
        moved
    }
}

/// Run `apply` into a caller's destination after checking its shape
pub(crate) fn apply_direct<T: Element>(
    shape: &Shape,
    dest: &mut Tensor<T>,
    label: &dyn Fn() -> String,
    apply: impl FnOnce(&mut Tensor<T>) -> Result<()>,
) -> Result<()> {
    check_destination(shape, dest)?;
    apply(dest)?;
    log::trace!("evaluated {} into destination", label());
    bump(Counter::DirectEvaluation);
    Ok(())
}

/// Copy an evaluated result into `dest`, keeping its residency mark
pub(crate) fn copy_result<T: Element>(result: &Tensor<T>, dest: &mut Tensor<T>) -> Result<()> {
    dest.copy_from(result)?;
    if let Some(backend) = result.resident_on() {
        dest.mark_resident(backend);
    }
    Ok(())
}

/// Fail with `ShapeMismatch` unless `dest` has the result shape
pub(crate) fn check_destination<T: Element>(shape: &Shape, dest: &Tensor<T>) -> Result<()> {
    if !shape.matches(dest.shape()) {
        return Err(Error::shape_mismatch(shape, dest.shape()));
    }
    Ok(())
}
