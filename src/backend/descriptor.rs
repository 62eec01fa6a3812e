//! Descriptors handed to backend routines
//!
//! Backends in the cuDNN mould only understand 4-D `NCHW` tensors. Lower-rank
//! shapes are marshalled by padding leading extents with 1:
//!
//! | rank | shape        | descriptor     |
//! |------|--------------|----------------|
//! | 2    | `[h, w]`     | `(1, 1, h, w)` |
//! | 3    | `[c, h, w]`  | `(1, c, h, w)` |
//! | 4    | `[n, c, h, w]` | `(n, c, h, w)` |

use crate::dtype::DType;
use crate::error::BackendError;
use std::fmt;

/// Packed 4-D tensor description in `NCHW` order
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TensorDescriptor {
    /// Batch extent
    pub n: usize,
    /// Channel extent
    pub c: usize,
    /// Height
    pub h: usize,
    /// Width
    pub w: usize,
    /// Element type
    pub dtype: DType,
}

impl TensorDescriptor {
    /// Marshal a rank 2, 3 or 4 shape
    pub fn nchw(backend: &'static str, shape: &[usize], dtype: DType) -> Result<Self, BackendError> {
        let [n, c, h, w] = match *shape {
            [h, w] => [1, 1, h, w],
            [c, h, w] => [1, c, h, w],
            [n, c, h, w] => [n, c, h, w],
            _ => {
                return Err(BackendError::UnsupportedRank {
                    backend,
                    rank: shape.len(),
                    max: 4,
                });
            }
        };
        Ok(Self { n, c, h, w, dtype })
    }

    /// Extents as `[n, c, h, w]`
    pub fn dims(&self) -> [usize; 4] {
        [self.n, self.c, self.h, self.w]
    }

    /// Strides of the packed layout, in elements
    pub fn strides(&self) -> [usize; 4] {
        [self.c * self.h * self.w, self.h * self.w, self.w, 1]
    }

    /// Number of elements described
    pub fn elem_count(&self) -> usize {
        self.n * self.c * self.h * self.w
    }
}

impl fmt::Display for TensorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}x{}x{}x{}]",
            self.dtype.short_name(),
            self.n,
            self.c,
            self.h,
            self.w
        )
    }
}

/// Filter description in `KCHW` order (output channels, input channels, height, width)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterDescriptor {
    /// Output channels
    pub k: usize,
    /// Input channels
    pub c: usize,
    /// Kernel height
    pub h: usize,
    /// Kernel width
    pub w: usize,
    /// Element type
    pub dtype: DType,
}

impl FilterDescriptor {
    /// Marshal a rank 2 (`[h, w]`) or rank 4 (`[k, c, h, w]`) kernel shape
    pub fn kchw(backend: &'static str, shape: &[usize], dtype: DType) -> Result<Self, BackendError> {
        let [k, c, h, w] = match *shape {
            [h, w] => [1, 1, h, w],
            [k, c, h, w] => [k, c, h, w],
            _ => {
                return Err(BackendError::UnsupportedRank {
                    backend,
                    rank: shape.len(),
                    max: 4,
                });
            }
        };
        Ok(Self { k, c, h, w, dtype })
    }

    /// Extents as `[k, c, h, w]`
    pub fn dims(&self) -> [usize; 4] {
        [self.k, self.c, self.h, self.w]
    }
}

/// Reduction applied over a pooling window
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PoolMode {
    /// Largest element of the window
    Max,
    /// Mean of the window; padding is excluded from the count
    Avg,
}

impl PoolMode {
    /// Name used in descriptions
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max_pool_2d",
            Self::Avg => "avg_pool_2d",
        }
    }
}

/// 2-D pooling parameters over the last two dimensions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolingDescriptor {
    /// Window reduction
    pub mode: PoolMode,
    /// Window extent `(height, width)`
    pub window: [usize; 2],
    /// Step between windows `(height, width)`
    pub stride: [usize; 2],
    /// Implicit padding on both sides `(height, width)`
    pub padding: [usize; 2],
}

impl PoolingDescriptor {
    /// Non-overlapping, unpadded windows
    pub fn new(mode: PoolMode, window: [usize; 2]) -> Self {
        Self {
            mode,
            window,
            stride: window,
            padding: [0, 0],
        }
    }

    /// Set the stride
    pub fn with_stride(mut self, stride: [usize; 2]) -> Self {
        self.stride = stride;
        self
    }

    /// Set the padding
    pub fn with_padding(mut self, padding: [usize; 2]) -> Self {
        self.padding = padding;
        self
    }

    /// Output extent along `axis` (0 = height, 1 = width) for input extent `input`
    ///
    /// `None` when the window does not fit or the stride is zero.
    pub fn output_extent(&self, axis: usize, input: usize) -> Option<usize> {
        let padded = input + 2 * self.padding[axis];
        let window = self.window[axis];
        if window == 0 || self.stride[axis] == 0 || window > padded {
            return None;
        }
        Some((padded - window) / self.stride[axis] + 1)
    }

    /// Output descriptor for input `x`
    pub fn output_descriptor(
        &self,
        backend: &'static str,
        x: &TensorDescriptor,
    ) -> Result<TensorDescriptor, BackendError> {
        let (Some(h), Some(w)) = (self.output_extent(0, x.h), self.output_extent(1, x.w)) else {
            return Err(BackendError::DescriptorMismatch {
                backend,
                operation: "pool2d_forward",
                reason: format!("window {:?} does not fit input {x}", self.window),
            });
        };
        Ok(TensorDescriptor { h, w, ..*x })
    }
}
