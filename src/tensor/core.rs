//! Dense tensor: the concrete container expressions are assigned into

use super::{ColumnMajor, DenseStorage, Layout, Order, RowMajor, StorageOrder};
use crate::dtype::Element;
use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;

/// N-dimensional dense array in host memory
///
/// `Tensor` is the leaf most expressions start from and the destination
/// every assignment ends in. It consists of:
/// - **Data**: an owned, contiguous `Vec<T>`
/// - **Layout**: shape and strides; the storage order is part of the type (`O`)
/// - **Residency**: the backend (if any) holding a valid copy of the data
///
/// # Example
///
/// ```
/// use lazr::tensor::Tensor;
///
/// let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]);
/// assert_eq!(a.get(&[1, 0]), Some(3.0));
/// ```
#[derive(Clone)]
pub struct Tensor<T: Element, O: Order = RowMajor> {
    data: Vec<T>,
    layout: Layout,
    resident_on: Option<&'static str>,
    _order: PhantomData<O>,
}

impl<T: Element> Tensor<T> {
    /// Create a row-major tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape` dimensions.
    /// For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice(data: &[T], shape: &[usize]) -> Self {
        Self::try_from_slice(data, shape)
            .expect("Tensor::from_slice: data length does not match shape")
    }

    /// Create a row-major tensor from a slice of data (fallible version)
    pub fn try_from_slice(data: &[T], shape: &[usize]) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Create a row-major tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self {
        Self::filled(shape, T::zero())
    }

    /// Create a row-major tensor filled with `value`
    pub fn full(shape: &[usize], value: T) -> Self {
        Self::filled(shape, value)
    }
}

impl<T: Element, O: Order> Tensor<T, O> {
    /// Take ownership of `data`, laid out in this tensor's storage order
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let layout = Layout::with_order(shape, O::ORDER);
        if data.len() != layout.elem_count() {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data,
            layout,
            resident_on: None,
            _order: PhantomData,
        })
    }

    /// Create a tensor of this storage order filled with `value`
    pub fn filled(shape: &[usize], value: T) -> Self {
        let layout = Layout::with_order(shape, O::ORDER);
        Self {
            data: vec![value; layout.elem_count()],
            layout,
            resident_on: None,
            _order: PhantomData,
        }
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the storage order
    #[inline]
    pub fn order(&self) -> StorageOrder {
        O::ORDER
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the tensor holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Host data in storage order
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable host data in storage order
    ///
    /// Writing through the host view invalidates any backend-resident copy.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.resident_on = None;
        &mut self.data
    }

    /// Copy the data out in storage order
    pub fn to_vec(&self) -> Vec<T> {
        self.data.clone()
    }

    /// Element at `coords`, `None` when out of bounds
    pub fn get(&self, coords: &[usize]) -> Option<T> {
        self.layout.index(coords).map(|i| self.data[i])
    }

    /// Overwrite the element at `coords`
    pub fn set(&mut self, coords: &[usize], value: T) -> Result<()> {
        let i = self.layout.index(coords).ok_or_else(|| {
            Error::invalid_argument(
                "coords",
                format!("{coords:?} out of bounds for shape {:?}", self.shape()),
            )
        })?;
        self.as_mut_slice()[i] = value;
        Ok(())
    }

    /// Copy `src` into `self`; shapes must match, storage orders may differ
    pub fn copy_from<P: Order>(&mut self, src: &Tensor<T, P>) -> Result<()> {
        if self.shape() != src.shape() {
            return Err(Error::shape_mismatch(self.shape(), src.shape()));
        }
        if O::ORDER == P::ORDER {
            self.as_mut_slice().copy_from_slice(src.as_slice());
            return Ok(());
        }
        let mut coords = vec![0; self.ndim()];
        for (flat, &value) in src.as_slice().iter().enumerate() {
            src.layout.unravel(flat, &mut coords);
            let dst = self.layout.index(&coords).ok_or_else(|| {
                Error::Internal(format!(
                    "coordinates {coords:?} escaped shape {:?}",
                    self.shape()
                ))
            })?;
            self.data[dst] = value;
        }
        self.resident_on = None;
        Ok(())
    }

    /// Record that `backend` holds a valid copy of this data
    pub fn mark_resident(&mut self, backend: &'static str) {
        self.resident_on = Some(backend);
    }

    /// Backend holding a valid copy of the data, if any
    pub fn resident_on(&self) -> Option<&'static str> {
        self.resident_on
    }
}

impl<T: Element> DenseStorage<T> for Tensor<T, RowMajor> {
    fn shape(&self) -> &[usize] {
        Tensor::shape(self)
    }

    fn order(&self) -> StorageOrder {
        StorageOrder::RowMajor
    }

    fn as_slice(&self) -> &[T] {
        Tensor::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        Tensor::as_mut_slice(self)
    }

    fn as_row_major_tensor(&mut self) -> Option<&mut Tensor<T>> {
        Some(self)
    }
}

impl<T: Element> DenseStorage<T> for Tensor<T, ColumnMajor> {
    fn shape(&self) -> &[usize] {
        Tensor::shape(self)
    }

    fn order(&self) -> StorageOrder {
        StorageOrder::ColumnMajor
    }

    fn as_slice(&self) -> &[T] {
        Tensor::as_slice(self)
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        Tensor::as_mut_slice(self)
    }
}

impl<T: Element, O: Order> fmt::Debug for Tensor<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape())
            .field("order", &O::ORDER)
            .field("resident_on", &self.resident_on)
            .finish()
    }
}
