//! Vector mode detection
//!
//! Expressions certify whether they can be evaluated in lane batches for a
//! given [`VectorMode`]; the assignment path asks for the mode detected on
//! this CPU (or the one forced through [`EvalConfig`](crate::config::EvalConfig)).
//!
//! | Mode     | Register width | f32 lanes | f64 lanes |
//! |----------|----------------|-----------|-----------|
//! | Avx512   | 512 bits       | 16        | 8         |
//! | Avx      | 256 bits       | 8         | 4         |
//! | Sse3     | 128 bits       | 4         | 2         |
//! | Neon     | 128 bits       | 4         | 2         |
//! | Scalar   | N/A            | 1         | 1         |

use std::sync::OnceLock;

/// Upper bound on lanes per batch over every mode and element type
///
/// Lets callers keep a batch buffer on the stack.
pub const MAX_LANES: usize = 32;

/// Vector instruction class used to size evaluation batches
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VectorMode {
    /// No vector unit, batches of one element
    Scalar = 0,
    /// SSE3, 128-bit registers
    Sse3 = 1,
    /// ARM NEON, 128-bit registers
    Neon = 2,
    /// AVX / AVX2, 256-bit registers
    Avx = 3,
    /// AVX-512F, 512-bit registers
    Avx512 = 4,
}

impl VectorMode {
    /// Width of one vector register in bytes
    #[inline]
    pub const fn register_bytes(self) -> usize {
        match self {
            Self::Scalar => 0,
            Self::Sse3 | Self::Neon => 16,
            Self::Avx => 32,
            Self::Avx512 => 64,
        }
    }

    /// Number of `T` values that fit in one register (at least 1)
    #[inline]
    pub const fn lanes<T>(self) -> usize {
        let width = self.register_bytes();
        let elem = std::mem::size_of::<T>();
        if width == 0 || elem == 0 || elem > width {
            1
        } else {
            width / elem
        }
    }

    /// Returns true when batches hold more than one element
    #[inline]
    pub const fn is_vector(self) -> bool {
        !matches!(self, Self::Scalar)
    }

    /// Returns the name of this mode
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Sse3 => "sse3",
            Self::Neon => "neon",
            Self::Avx => "avx",
            Self::Avx512 => "avx512",
        }
    }

    /// Parse a mode name as written by [`as_str`](Self::as_str)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "scalar" | "none" => Some(Self::Scalar),
            "sse3" => Some(Self::Sse3),
            "neon" => Some(Self::Neon),
            "avx" | "avx2" => Some(Self::Avx),
            "avx512" => Some(Self::Avx512),
            _ => None,
        }
    }
}

impl std::fmt::Display for VectorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static VECTOR_MODE: OnceLock<VectorMode> = OnceLock::new();

/// Detect the best vector mode for the current CPU
///
/// Cached: the first call performs detection, later calls read the cell.
#[inline]
pub fn detect_vector_mode() -> VectorMode {
    *VECTOR_MODE.get_or_init(detect_uncached)
}

#[cold]
fn detect_uncached() -> VectorMode {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx512f") {
            return VectorMode::Avx512;
        }
        if is_x86_feature_detected!("avx") {
            return VectorMode::Avx;
        }
        if is_x86_feature_detected!("sse3") {
            return VectorMode::Sse3;
        }
    }

    // NEON is mandatory on AArch64
    #[cfg(target_arch = "aarch64")]
    {
        return VectorMode::Neon;
    }

    #[allow(unreachable_code)]
    VectorMode::Scalar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex128;

    #[test]
    fn test_detection_is_cached() {
        assert_eq!(detect_vector_mode(), detect_vector_mode());
    }

    #[test]
    fn test_lane_counts() {
        assert_eq!(VectorMode::Avx512.lanes::<f32>(), 16);
        assert_eq!(VectorMode::Avx.lanes::<f32>(), 8);
        assert_eq!(VectorMode::Avx.lanes::<f64>(), 4);
        assert_eq!(VectorMode::Sse3.lanes::<f64>(), 2);
        assert_eq!(VectorMode::Sse3.lanes::<Complex128>(), 1);
        assert_eq!(VectorMode::Scalar.lanes::<f32>(), 1);
    }

    #[test]
    fn test_mode_ordering_and_names() {
        assert!(VectorMode::Avx512 > VectorMode::Avx);
        assert!(VectorMode::Avx > VectorMode::Scalar);
        assert_eq!(VectorMode::parse("AVX2"), Some(VectorMode::Avx));
        assert_eq!(VectorMode::parse("none"), Some(VectorMode::Scalar));
        assert_eq!(VectorMode::parse("mmx"), None);
    }
}
