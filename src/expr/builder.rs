//! Fluent construction of expression trees

use super::operators::{
    AbsUnaryOp, AddScalarUnaryOp, DivBinaryOp, MinusBinaryOp, MinusUnaryOp, MulBinaryOp,
    PlusBinaryOp, ScaleUnaryOp,
};
use super::{
    BinaryExpr, DynRepL, DynRepR, Expr, RepL, RepR, RepeatSpec, RepeatTransformer,
    TemporaryBinaryExpr, TemporaryUnaryExpr, UnaryExpr,
};
use crate::backend::PoolingDescriptor;
use crate::error::Result;
use crate::ops::{Conv1dFull, MatMul, Materialize, OuterProduct, Pool2d};

/// Builder methods available on every expression
///
/// Element-wise binary builders check shape and storage-order conformance and
/// therefore return `Result`; so do temporaries, whose operators validate
/// their operands.
///
/// ```
/// use lazr::prelude::*;
///
/// let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
/// let e = (&a).add(&a).unwrap().scale(0.5).rep_r([2]);
/// assert_eq!(e.size(), 8);
/// assert_eq!(e.read_flat(1), 1.0);
/// ```
pub trait ExprExt: Expr + Sized {
    /// `-self`
    fn neg(self) -> UnaryExpr<Self, MinusUnaryOp> {
        UnaryExpr::new(self, MinusUnaryOp)
    }

    /// `|self|`
    fn abs(self) -> UnaryExpr<Self, AbsUnaryOp> {
        UnaryExpr::new(self, AbsUnaryOp)
    }

    /// `self * factor`
    fn scale(self, factor: Self::Elem) -> UnaryExpr<Self, ScaleUnaryOp<Self::Elem>> {
        UnaryExpr::new(self, ScaleUnaryOp { factor })
    }

    /// `self + offset`
    fn add_scalar(self, offset: Self::Elem) -> UnaryExpr<Self, AddScalarUnaryOp<Self::Elem>> {
        UnaryExpr::new(self, AddScalarUnaryOp { offset })
    }

    /// `self + rhs`, element-wise
    fn add<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<BinaryExpr<Self, B, PlusBinaryOp>> {
        BinaryExpr::new(self, rhs, PlusBinaryOp)
    }

    /// `self - rhs`, element-wise
    fn sub<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<BinaryExpr<Self, B, MinusBinaryOp>> {
        BinaryExpr::new(self, rhs, MinusBinaryOp)
    }

    /// `self * rhs`, element-wise
    fn mul<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<BinaryExpr<Self, B, MulBinaryOp>> {
        BinaryExpr::new(self, rhs, MulBinaryOp)
    }

    /// `self / rhs`, element-wise
    fn div<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<BinaryExpr<Self, B, DivBinaryOp>> {
        BinaryExpr::new(self, rhs, DivBinaryOp)
    }

    /// Repeat along new trailing dimensions of extents `reps`
    fn rep_r<const D: usize>(self, reps: [usize; D]) -> DynRepR<Self, D> {
        RepeatTransformer::new(self, reps)
    }

    /// Repeat along new leading dimensions of extents `reps`
    fn rep_l<const D: usize>(self, reps: [usize; D]) -> DynRepL<Self, D> {
        RepeatTransformer::new(self, reps)
    }

    /// [`rep_r`](Self::rep_r) with compile-time extents
    fn rep_r_static<S: RepeatSpec>(self) -> RepR<Self, S> {
        RepeatTransformer::new_static(self)
    }

    /// [`rep_l`](Self::rep_l) with compile-time extents
    fn rep_l_static<S: RepeatSpec>(self) -> RepL<Self, S> {
        RepeatTransformer::new_static(self)
    }

    /// Matrix product `self * rhs` on the CPU backend
    fn matmul<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<TemporaryBinaryExpr<Self, B, MatMul>> {
        TemporaryBinaryExpr::new(self, rhs, MatMul::new())
    }

    /// Outer product of two vectors
    fn outer<B: Expr<Elem = Self::Elem>>(self, rhs: B) -> Result<TemporaryBinaryExpr<Self, B, OuterProduct>> {
        TemporaryBinaryExpr::new(self, rhs, OuterProduct)
    }

    /// Full 1-D convolution with `kernel`
    fn conv1d_full<K: Expr<Elem = Self::Elem>>(self, kernel: K) -> Result<TemporaryBinaryExpr<Self, K, Conv1dFull>> {
        TemporaryBinaryExpr::new(self, kernel, Conv1dFull)
    }

    /// Pooling of the last two dimensions as `desc` describes
    fn pool_2d(self, desc: PoolingDescriptor) -> Result<TemporaryUnaryExpr<Self, Pool2d>> {
        TemporaryUnaryExpr::new(self, Pool2d::new(desc))
    }

    /// Non-overlapping max pooling of the last two dimensions
    fn max_pool_2d(self, window: [usize; 2]) -> Result<TemporaryUnaryExpr<Self, Pool2d>> {
        TemporaryUnaryExpr::new(self, Pool2d::max(window))
    }

    /// Non-overlapping average pooling of the last two dimensions
    fn avg_pool_2d(self, window: [usize; 2]) -> Result<TemporaryUnaryExpr<Self, Pool2d>> {
        TemporaryUnaryExpr::new(self, Pool2d::avg(window))
    }

    /// Row-major copy computed once and read many times
    fn materialize(self) -> Result<TemporaryUnaryExpr<Self, Materialize>> {
        TemporaryUnaryExpr::new(self, Materialize)
    }
}

impl<E: Expr> ExprExt for E {}
