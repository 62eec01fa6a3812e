//! Complex element types
//!
//! `Complex64` and `Complex128` are plain interleaved `(re, im)` pairs so a
//! tensor of them is still a single contiguous `Pod` buffer. They take part in
//! every element-wise operator, but operators that evaluate in lane batches
//! treat them as scalar-only (see `Element::IS_COMPLEX`).
//!
//! Arithmetic follows the usual definitions:
//! - Multiplication: `(a+bi)(c+di) = (ac-bd) + (ad+bc)i`
//! - Division: `(a+bi)/(c+di) = (a+bi)*conj(c+di)/|c+di|²`

use bytemuck::{Pod, Zeroable};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Defines one complex type over the given float component
macro_rules! impl_complex {
    ($name:ident, $float:ty, $doc_bits:literal) => {
        #[doc = concat!($doc_bits, "-bit complex number, interleaved `", stringify!($float), "` components")]
        #[repr(C)]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
        pub struct $name {
            /// Real part
            pub re: $float,
            /// Imaginary part
            pub im: $float,
        }

        impl $name {
            /// Zero complex number
            pub const ZERO: Self = Self { re: 0.0, im: 0.0 };

            /// One (real unit)
            pub const ONE: Self = Self { re: 1.0, im: 0.0 };

            /// Create a new complex number
            #[inline]
            pub const fn new(re: $float, im: $float) -> Self {
                Self { re, im }
            }

            /// Magnitude: |z| = sqrt(re² + im²)
            #[inline]
            pub fn magnitude(self) -> $float {
                self.re.hypot(self.im)
            }

            /// Squared magnitude: |z|² = re² + im²
            #[inline]
            pub fn magnitude_squared(self) -> $float {
                self.re * self.re + self.im * self.im
            }

            /// Complex conjugate
            #[inline]
            pub fn conj(self) -> Self {
                Self::new(self.re, -self.im)
            }
        }

        impl Add for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: Self) -> Self {
                Self::new(self.re + rhs.re, self.im + rhs.im)
            }
        }

        impl Sub for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: Self) -> Self {
                Self::new(self.re - rhs.re, self.im - rhs.im)
            }
        }

        impl Mul for $name {
            type Output = Self;

            #[inline]
            fn mul(self, rhs: Self) -> Self {
                Self::new(
                    self.re * rhs.re - self.im * rhs.im,
                    self.re * rhs.im + self.im * rhs.re,
                )
            }
        }

        impl Div for $name {
            type Output = Self;

            /// Division by zero yields NaN components
            #[inline]
            fn div(self, rhs: Self) -> Self {
                let denom = rhs.magnitude_squared();
                if denom == 0.0 {
                    return Self::new(<$float>::NAN, <$float>::NAN);
                }
                Self::new(
                    (self.re * rhs.re + self.im * rhs.im) / denom,
                    (self.im * rhs.re - self.re * rhs.im) / denom,
                )
            }
        }

        impl Neg for $name {
            type Output = Self;

            #[inline]
            fn neg(self) -> Self {
                Self::new(-self.re, -self.im)
            }
        }

        impl PartialOrd for $name {
            /// Ordered by magnitude, which is what pooling and min/max use.
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                self.magnitude().partial_cmp(&other.magnitude())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.im >= 0.0 {
                    write!(f, "{}+{}i", self.re, self.im)
                } else {
                    write!(f, "{}{}i", self.re, self.im)
                }
            }
        }

        impl From<$float> for $name {
            #[inline]
            fn from(re: $float) -> Self {
                Self::new(re, 0.0)
            }
        }
    };
}

impl_complex!(Complex64, f32, "64");
impl_complex!(Complex128, f64, "128");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Complex64::new(1.0, 2.0);
        let b = Complex64::new(3.0, -1.0);
        assert_eq!(a + b, Complex64::new(4.0, 1.0));
        assert_eq!(a - b, Complex64::new(-2.0, 3.0));
        assert_eq!(a * b, Complex64::new(5.0, 5.0));
        assert_eq!(-a, Complex64::new(-1.0, -2.0));
    }

    #[test]
    fn test_division() {
        let a = Complex128::new(5.0, 5.0);
        let b = Complex128::new(3.0, -1.0);
        let q = a / b;
        assert!((q.re - 1.0).abs() < 1e-12);
        assert!((q.im - 2.0).abs() < 1e-12);
        assert!((a / Complex128::ZERO).re.is_nan());
    }

    #[test]
    fn test_magnitude_ordering() {
        let small = Complex64::new(0.0, 1.0);
        let big = Complex64::new(3.0, 4.0);
        assert_eq!(big.magnitude(), 5.0);
        assert!(small < big);
        assert_eq!(big.to_string(), "3+4i");
        assert_eq!(big.conj().to_string(), "3-4i");
    }

    #[test]
    fn test_complex_pod() {
        let values = [Complex64::new(1.0, 2.0), Complex64::new(3.0, 4.0)];
        let floats: &[f32] = bytemuck::cast_slice(&values);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0]);
    }
}
