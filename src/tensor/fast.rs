//! Fixed-shape containers whose extents are known at compile time

use super::{DenseStorage, StorageOrder};
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Row-major `R x C` matrix stored inline
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FastMatrix<T: Element, const R: usize, const C: usize> {
    data: [[T; C]; R],
    shape: [usize; 2],
}

impl<T: Element, const R: usize, const C: usize> FastMatrix<T, R, C> {
    /// Matrix of zeros
    pub fn zeros() -> Self {
        Self::from_rows([[T::zero(); C]; R])
    }

    /// Matrix from its rows
    pub fn from_rows(rows: [[T; C]; R]) -> Self {
        Self {
            data: rows,
            shape: [R, C],
        }
    }

    /// Matrix from a row-major slice of exactly `R * C` values
    pub fn try_from_slice(values: &[T]) -> Result<Self> {
        if values.len() != R * C {
            return Err(Error::ShapeMismatch {
                expected: vec![R, C],
                got: vec![values.len()],
            });
        }
        let mut m = Self::zeros();
        m.as_mut_slice().copy_from_slice(values);
        Ok(m)
    }

    /// Element at row `r`, column `c`
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> T {
        self.data[r][c]
    }
}

impl<T: Element, const R: usize, const C: usize> DenseStorage<T> for FastMatrix<T, R, C> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn order(&self) -> StorageOrder {
        StorageOrder::RowMajor
    }

    fn as_slice(&self) -> &[T] {
        self.data.as_flattened()
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self.data.as_flattened_mut()
    }
}

/// Vector of `N` elements stored inline
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FastVector<T: Element, const N: usize> {
    data: [T; N],
    shape: [usize; 1],
}

impl<T: Element, const N: usize> FastVector<T, N> {
    /// Vector of zeros
    pub fn zeros() -> Self {
        Self::new([T::zero(); N])
    }

    /// Vector holding `values`
    pub fn new(values: [T; N]) -> Self {
        Self {
            data: values,
            shape: [N],
        }
    }

    /// Element `i`
    #[inline]
    pub fn get(&self, i: usize) -> T {
        self.data[i]
    }
}

impl<T: Element, const N: usize> DenseStorage<T> for FastVector<T, N> {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn order(&self) -> StorageOrder {
        StorageOrder::RowMajor
    }

    fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_matrix_flat_view() {
        let m = FastMatrix::from_rows([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(m.shape(), &[2, 3]);
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.get(1, 0), 4.0);
    }

    #[test]
    fn test_fast_matrix_from_slice() {
        assert!(FastMatrix::<i32, 2, 2>::try_from_slice(&[1, 2, 3]).is_err());
        let m = FastMatrix::<i32, 2, 2>::try_from_slice(&[1, 2, 3, 4]).unwrap();
        assert_eq!(m.get(1, 1), 4);
    }

    #[test]
    fn test_fast_vector() {
        let mut v = FastVector::new([1i64, 2, 3]);
        v.as_mut_slice()[2] = 9;
        assert_eq!(v.get(2), 9);
        assert_eq!(v.shape(), &[3]);
    }
}
