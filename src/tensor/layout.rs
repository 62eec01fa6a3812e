//! Layout: shape, strides and storage order of a dense buffer

use super::shape::{STACK_DIMS, Shape};
use smallvec::SmallVec;
use std::fmt;

/// Strides in elements, one per dimension
pub type Strides = SmallVec<[usize; STACK_DIMS]>;

/// Order in which coordinates map onto a flat index
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StorageOrder {
    /// Last dimension varies fastest (C order)
    #[default]
    RowMajor,
    /// First dimension varies fastest (Fortran order)
    ColumnMajor,
}

impl StorageOrder {
    /// Short name used in descriptions
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RowMajor => "row-major",
            Self::ColumnMajor => "column-major",
        }
    }
}

/// Type-level storage order of a container
pub trait Order: Copy + Default + Send + Sync + 'static {
    /// The order this marker stands for
    const ORDER: StorageOrder;
}

/// Row-major marker
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RowMajor;

/// Column-major marker
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMajor;

impl Order for RowMajor {
    const ORDER: StorageOrder = StorageOrder::RowMajor;
}

impl Order for ColumnMajor {
    const ORDER: StorageOrder = StorageOrder::ColumnMajor;
}

/// Layout of a dense, offset-free buffer
///
/// Address of element at coordinates [i0, i1, ..., in]:
///   i0 * strides[0] + i1 * strides[1] + ... + in * strides[n]
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    order: StorageOrder,
}

impl Layout {
    /// Create a row-major layout from a shape
    ///
    /// # Example
    /// ```
    /// use lazr::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.shape(), &[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        Self::with_order(shape, StorageOrder::RowMajor)
    }

    /// Create a layout with the given storage order
    pub fn with_order(shape: &[usize], order: StorageOrder) -> Self {
        Self {
            shape: Shape::from(shape),
            strides: compute_strides(shape, order),
            order,
        }
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Get the storage order
    #[inline]
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// Get size along a specific dimension
    pub fn dim(&self, d: usize) -> Option<usize> {
        self.shape.get(d).copied()
    }

    /// Compute the flat index for given coordinates, `None` when out of bounds
    pub fn index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.ndim() {
            return None;
        }
        let mut linear = 0;
        for ((&c, &dim), &stride) in coords.iter().zip(self.shape.iter()).zip(&self.strides) {
            if c >= dim {
                return None;
            }
            linear += c * stride;
        }
        Some(linear)
    }

    /// Compute the coordinates of a flat index into `coords`
    pub fn unravel(&self, flat: usize, coords: &mut [usize]) {
        unravel_index(&self.shape, self.order, flat, coords);
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("order", &self.order)
            .finish()
    }
}

fn compute_strides(shape: &[usize], order: StorageOrder) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0, shape.len());
    let mut stride = 1;
    match order {
        StorageOrder::RowMajor => {
            for (d, &dim) in shape.iter().enumerate().rev() {
                strides[d] = stride;
                stride *= dim;
            }
        }
        StorageOrder::ColumnMajor => {
            for (d, &dim) in shape.iter().enumerate() {
                strides[d] = stride;
                stride *= dim;
            }
        }
    }
    strides
}

/// Flat index of `coords` in a dense buffer of `shape` stored in `order`
///
/// Coordinates are not bounds checked.
#[inline]
pub fn ravel_index(shape: &[usize], order: StorageOrder, coords: &[usize]) -> usize {
    debug_assert_eq!(shape.len(), coords.len());
    match order {
        StorageOrder::RowMajor => coords
            .iter()
            .zip(shape)
            .fold(0, |acc, (&c, &dim)| acc * dim + c),
        StorageOrder::ColumnMajor => coords
            .iter()
            .zip(shape)
            .rev()
            .fold(0, |acc, (&c, &dim)| acc * dim + c),
    }
}

/// Inverse of [`ravel_index`]
#[inline]
pub fn unravel_index(shape: &[usize], order: StorageOrder, mut flat: usize, coords: &mut [usize]) {
    debug_assert_eq!(shape.len(), coords.len());
    match order {
        StorageOrder::RowMajor => {
            for d in (0..shape.len()).rev() {
                coords[d] = flat % shape[d];
                flat /= shape[d];
            }
        }
        StorageOrder::ColumnMajor => {
            for d in 0..shape.len() {
                coords[d] = flat % shape[d];
                flat /= shape[d];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_strides() {
        let layout = Layout::contiguous(&[2, 3, 4]);
        assert_eq!(layout.strides(), &[12, 4, 1]);
        assert_eq!(layout.elem_count(), 24);
        assert_eq!(layout.index(&[1, 2, 3]), Some(23));
        assert_eq!(layout.index(&[2, 0, 0]), None);
    }

    #[test]
    fn test_column_major_strides() {
        let layout = Layout::with_order(&[2, 3], StorageOrder::ColumnMajor);
        assert_eq!(layout.strides(), &[1, 2]);
        assert_eq!(layout.index(&[1, 2]), Some(5));
        assert_eq!(layout.index(&[1, 0]), Some(1));
    }

    #[test]
    fn test_ravel_unravel_agree_with_strides() {
        for order in [StorageOrder::RowMajor, StorageOrder::ColumnMajor] {
            let layout = Layout::with_order(&[3, 2, 4], order);
            let mut coords = [0; 3];
            for flat in 0..layout.elem_count() {
                layout.unravel(flat, &mut coords);
                assert_eq!(layout.index(&coords), Some(flat));
                assert_eq!(ravel_index(layout.shape(), order, &coords), flat);
            }
        }
    }

    #[test]
    fn test_scalar_layout() {
        let layout = Layout::contiguous(&[]);
        assert_eq!(layout.ndim(), 0);
        assert_eq!(layout.elem_count(), 1);
        assert_eq!(layout.index(&[]), Some(0));
    }
}
