//! Concrete containers
//!
//! Expressions are views; these types own memory. [`Tensor`] has a run-time
//! shape and either storage order, [`FastMatrix`] and [`FastVector`] have
//! compile-time extents so expressions over them resolve their size statically.

use crate::dtype::Element;

mod core;
mod fast;
mod layout;
mod shape;

pub use core::Tensor;
pub use fast::{FastMatrix, FastVector};
pub use layout::{
    ColumnMajor, Layout, Order, RowMajor, StorageOrder, Strides, ravel_index, unravel_index,
};
pub use shape::Shape;
pub(crate) use shape::join_extents;

/// Dense, contiguous storage an expression can be assigned into
pub trait DenseStorage<T: Element> {
    /// Per-axis extents
    fn shape(&self) -> &[usize];

    /// Storage order of the flat buffer
    fn order(&self) -> StorageOrder;

    /// Flat buffer in storage order
    fn as_slice(&self) -> &[T];

    /// Mutable flat buffer in storage order
    fn as_mut_slice(&mut self) -> &mut [T];

    /// The storage as a row-major [`Tensor`], when it is one
    ///
    /// Temporary operators write their results into row-major tensors, so
    /// only such destinations can receive a temporary root without a copy.
    fn as_row_major_tensor(&mut self) -> Option<&mut Tensor<T>> {
        None
    }
}
