//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Trait for types that can be elements of an expression
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - values are read from many threads in parallel evaluation
/// - `Pod + Zeroable` - storage can be zero-initialized and viewed as bytes by backends
/// - `Add + Sub + Mul + Div + Neg` - element-wise operators (Output = Self)
/// - `PartialOrd` - comparison for pooling and min/max reductions
///
/// Unsigned integers are not elements: every operator in lazr, starting with
/// unary minus, is defined on the whole element set.
pub trait Element:
    Copy
    + Send
    + Sync
    + Pod
    + Zeroable
    + Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// True for complex element types
    ///
    /// Several operators refuse batch (vectorized) evaluation on complex
    /// elements because the interleaved layout does not map lane-for-lane.
    const IS_COMPLEX: bool = false;

    /// Convert to f64 for generic numeric operations
    ///
    /// For complex types this returns the **magnitude** (|z|), matching the
    /// ordering used by `PartialOrd`.
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    ///
    /// For complex types this creates a real number (imaginary part = 0).
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Absolute value; complex elements return their magnitude as a real value
    fn abs(self) -> Self;
}

macro_rules! impl_float_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn abs(self) -> Self {
                <$t>::abs(self)
            }
        }
    };
}

macro_rules! impl_int_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn abs(self) -> Self {
                self.wrapping_abs()
            }
        }
    };
}

impl_float_element!(f64, DType::F64);
impl_float_element!(f32, DType::F32);
impl_int_element!(i64, DType::I64);
impl_int_element!(i32, DType::I32);

// ============================================================================
// Half-precision floating point types (requires "f16" feature)
// ============================================================================

#[cfg(feature = "f16")]
impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::f16::ONE
    }

    #[inline]
    fn abs(self) -> Self {
        half::f16::from_f64(half::f16::to_f64(self).abs())
    }
}

#[cfg(feature = "f16")]
impl Element for half::bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::bf16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::bf16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::bf16::ONE
    }

    #[inline]
    fn abs(self) -> Self {
        half::bf16::from_f64(half::bf16::to_f64(self).abs())
    }
}

// ============================================================================
// Complex types
// ============================================================================

impl Element for super::complex::Complex64 {
    const DTYPE: DType = DType::Complex64;
    const IS_COMPLEX: bool = true;

    /// Returns magnitude (|z|); for the real part use `.re` directly.
    #[inline]
    fn to_f64(self) -> f64 {
        self.magnitude() as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        Self::new(v as f32, 0.0)
    }

    #[inline]
    fn zero() -> Self {
        Self::ZERO
    }

    #[inline]
    fn one() -> Self {
        Self::ONE
    }

    #[inline]
    fn abs(self) -> Self {
        Self::new(self.magnitude(), 0.0)
    }
}

impl Element for super::complex::Complex128 {
    const DTYPE: DType = DType::Complex128;
    const IS_COMPLEX: bool = true;

    /// Returns magnitude (|z|); for the real part use `.re` directly.
    #[inline]
    fn to_f64(self) -> f64 {
        self.magnitude()
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        Self::new(v, 0.0)
    }

    #[inline]
    fn zero() -> Self {
        Self::ZERO
    }

    #[inline]
    fn one() -> Self {
        Self::ONE
    }

    #[inline]
    fn abs(self) -> Self {
        Self::new(self.magnitude(), 0.0)
    }
}
