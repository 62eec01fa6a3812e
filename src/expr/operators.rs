//! Scalar operators applied by [`UnaryExpr`](super::UnaryExpr) and
//! [`BinaryExpr`](super::BinaryExpr)
//!
//! Operators are pure: `apply` has no hidden state, so they are evaluated
//! again on every read of the enclosing expression.

use crate::dtype::Element;
use crate::simd::VectorMode;

/// Pointwise transform of one operand
pub trait UnaryOperator<T: Element>: Sync {
    /// Result at index `i` depends only on the operand at index `i`
    const LINEAR: bool = true;
    /// `apply` may run concurrently on disjoint indices
    const THREAD_SAFE: bool = true;

    /// Whether [`load`](Self::load) may run on batches for `mode`
    fn vectorizable(mode: VectorMode) -> bool;

    /// Whether a device backend can run this operator
    fn gpu_computable() -> bool {
        false
    }

    /// Transform one value
    fn apply(&self, x: T) -> T;

    /// Transform a batch in place
    #[inline]
    fn load(&self, lanes: &mut [T]) {
        for x in lanes.iter_mut() {
            *x = self.apply(*x);
        }
    }

    /// Symbol used in descriptions
    fn desc(&self) -> &'static str;
}

/// Pointwise combination of two operands
pub trait BinaryOperator<T: Element>: Sync {
    /// Result at index `i` depends only on the operands at index `i`
    const LINEAR: bool = true;
    /// `apply` may run concurrently on disjoint indices
    const THREAD_SAFE: bool = true;

    /// Whether [`load`](Self::load) may run on batches for `mode`
    fn vectorizable(mode: VectorMode) -> bool;

    /// Whether a device backend can run this operator
    fn gpu_computable() -> bool {
        false
    }

    /// Combine one pair of values
    fn apply(&self, lhs: T, rhs: T) -> T;

    /// Combine a batch: `lhs[k] = apply(lhs[k], rhs[k])`
    #[inline]
    fn load(&self, lhs: &mut [T], rhs: &[T]) {
        for (l, &r) in lhs.iter_mut().zip(rhs) {
            *l = self.apply(*l, r);
        }
    }

    /// Symbol used in descriptions
    fn desc(&self) -> &'static str;
}

// ============================================================================
// Unary operators
// ============================================================================

/// Negation
#[derive(Copy, Clone, Debug, Default)]
pub struct MinusUnaryOp;

impl<T: Element> UnaryOperator<T> for MinusUnaryOp {
    // Interleaved complex lanes do not negate lane-for-lane with the real kernels
    fn vectorizable(_mode: VectorMode) -> bool {
        !T::IS_COMPLEX
    }

    #[inline]
    fn apply(&self, x: T) -> T {
        -x
    }

    fn desc(&self) -> &'static str {
        "-"
    }
}

/// Absolute value (magnitude for complex elements)
#[derive(Copy, Clone, Debug, Default)]
pub struct AbsUnaryOp;

impl<T: Element> UnaryOperator<T> for AbsUnaryOp {
    fn vectorizable(_mode: VectorMode) -> bool {
        !T::IS_COMPLEX
    }

    fn gpu_computable() -> bool {
        true
    }

    #[inline]
    fn apply(&self, x: T) -> T {
        x.abs()
    }

    fn desc(&self) -> &'static str {
        "abs"
    }
}

/// Multiplication by a scalar factor
#[derive(Copy, Clone, Debug)]
pub struct ScaleUnaryOp<T> {
    /// Factor every element is multiplied by
    pub factor: T,
}

impl<T: Element> UnaryOperator<T> for ScaleUnaryOp<T> {
    fn vectorizable(_mode: VectorMode) -> bool {
        true
    }

    fn gpu_computable() -> bool {
        true
    }

    #[inline]
    fn apply(&self, x: T) -> T {
        x * self.factor
    }

    fn desc(&self) -> &'static str {
        "scale"
    }
}

/// Addition of a scalar offset
#[derive(Copy, Clone, Debug)]
pub struct AddScalarUnaryOp<T> {
    /// Offset added to every element
    pub offset: T,
}

impl<T: Element> UnaryOperator<T> for AddScalarUnaryOp<T> {
    fn vectorizable(_mode: VectorMode) -> bool {
        true
    }

    fn gpu_computable() -> bool {
        true
    }

    #[inline]
    fn apply(&self, x: T) -> T {
        x + self.offset
    }

    fn desc(&self) -> &'static str {
        "add_scalar"
    }
}

// ============================================================================
// Binary operators
// ============================================================================

/// Declares an element-wise binary operator backed by an arithmetic trait
macro_rules! binary_operator {
    ($name:ident, $op:tt, $symbol:literal, $doc:literal, complex_lanes = $complex:literal) => {
        paste::paste! {
            #[doc = $doc]
            #[derive(Copy, Clone, Debug, Default)]
            pub struct [<$name BinaryOp>];

            impl<T: Element> BinaryOperator<T> for [<$name BinaryOp>] {
                fn vectorizable(_mode: VectorMode) -> bool {
                    $complex || !T::IS_COMPLEX
                }

                fn gpu_computable() -> bool {
                    true
                }

                #[inline]
                fn apply(&self, lhs: T, rhs: T) -> T {
                    lhs $op rhs
                }

                fn desc(&self) -> &'static str {
                    $symbol
                }
            }
        }
    };
}

binary_operator!(Plus, +, "+", "Element-wise addition", complex_lanes = true);
binary_operator!(Minus, -, "-", "Element-wise subtraction", complex_lanes = true);
binary_operator!(Mul, *, "*", "Element-wise multiplication", complex_lanes = false);
binary_operator!(Div, /, "/", "Element-wise division", complex_lanes = false);
