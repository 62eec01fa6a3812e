//! Element types for lazr expressions
//!
//! Expressions are generic over their element type; [`DType`] is the runtime
//! tag of that type, used where a backend needs to decide at dispatch time
//! whether it can handle the buffers it is given.

pub mod complex;
mod element;

pub use complex::{Complex64, Complex128};
pub use element::Element;

use std::fmt;

/// Runtime tag for the element types lazr supports
///
/// Backends answer [`supports`](crate::backend::Backend::supports) per tag,
/// so the half-precision variants exist even without the `f16` feature.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DType {
    /// `f64`
    F64,
    /// `f32`
    F32,
    /// IEEE 754 half precision
    F16,
    /// Brain floating point
    BF16,
    /// `i64`
    I64,
    /// `i32`
    I32,
    /// Two f32: re, im
    Complex64,
    /// Two f64: re, im
    Complex128,
}

impl DType {
    /// Real floating point of any width
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32 | Self::F16 | Self::BF16)
    }

    /// Complex of either width
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// Values can be compared, so max pooling is defined
    #[inline]
    pub const fn is_ordered(self) -> bool {
        !self.is_complex()
    }

    /// Name used in descriptors and logs (`f32`, `c128`)
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
