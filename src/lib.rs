//! # lazr
//!
//! **Lazy expression-template tensors for Rust.**
//!
//! lazr represents arithmetic over vectors, matrices and higher-order tensors
//! as trees of typed expression nodes. Nothing is computed while a tree is
//! built; elements are produced when the tree is assigned into a concrete
//! container, in a single fused loop chosen from what the tree's types allow.
//!
//! ## Why lazr?
//!
//! - **Fusion**: `-(a + b) * 2` is one loop with no intermediate buffers
//! - **Typed descriptors**: shape staticness, linearity, thread safety and
//!   vectorizability are associated constants resolved at compile time
//! - **Temporaries done once**: matrix products, convolutions and pooling
//!   materialize their result exactly once, in post-order, before anything reads it
//! - **Backends with a way out**: accelerated routines return `BackendError`s;
//!   the configured policy either propagates them or runs the generic loop
//!
//! ## Quick Start
//!
//! ```rust
//! use lazr::prelude::*;
//!
//! # fn main() -> lazr::error::Result<()> {
//! let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
//! let b = Tensor::from_slice(&[5.0f64, 6.0, 7.0, 8.0], &[2, 2]);
//!
//! // fused element-wise tree
//! let mut c = Tensor::<f64>::zeros(&[2, 2]);
//! assign(&mut c, (&a).add(&b)?.neg())?;
//! assert_eq!(c.as_slice(), &[-6.0, -8.0, -10.0, -12.0]);
//!
//! // a temporary feeding an element-wise parent
//! let mut d = Tensor::<f64>::zeros(&[2, 2]);
//! assign(&mut d, (&a).matmul(&b)?.add_scalar(1.0))?;
//! assert_eq!(d.as_slice(), &[20.0, 23.0, 44.0, 51.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel evaluation of large linear expressions
//! - `f16`: half-precision element types (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod assign;
pub mod backend;
pub mod config;
pub mod counters;
pub mod dtype;
pub mod error;
pub mod expr;
pub mod ops;
pub mod simd;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assign::{assign, assign_add, assign_div, assign_mul, assign_sub};
    pub use crate::backend::{Backend, CpuBackend, PoolMode, PoolingDescriptor};
    pub use crate::config::{BackendFallback, EvalConfig};
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{BackendError, Error, Result};
    pub use crate::expr::{ConstantGenerator, Expr, ExprExt, ExprTraits, Lifecycle, RandomGenerator};
    pub use crate::tensor::{ColumnMajor, FastMatrix, FastVector, RowMajor, Shape, StorageOrder, Tensor};
}
