//! Containers as expression leaves

use super::{Expr, MemoryRegion, join_extents};
use crate::dtype::Element;
use crate::simd::VectorMode;
use crate::tensor::{DenseStorage, FastMatrix, FastVector, Order, Tensor, ravel_index};

impl<T: Element, O: Order> Expr for Tensor<T, O> {
    type Elem = T;

    const IS_LINEAR: bool = true;
    const IS_DIRECT: bool = true;
    const STORAGE_ORDER: crate::tensor::StorageOrder = O::ORDER;

    fn vectorizable(_mode: VectorMode) -> bool {
        true
    }

    fn gpu_computable() -> bool {
        true
    }

    #[inline]
    fn dimensions(&self) -> usize {
        self.ndim()
    }

    #[inline]
    fn dim(&self, d: usize) -> usize {
        self.shape()[d]
    }

    #[inline]
    fn size(&self) -> usize {
        self.len()
    }

    #[inline]
    fn read_flat(&self, i: usize) -> T {
        self.as_slice()[i]
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> T {
        self.as_slice()[ravel_index(self.shape(), O::ORDER, coords)]
    }

    #[inline]
    fn load(&self, i: usize, lanes: &mut [T]) {
        lanes.copy_from_slice(&self.as_slice()[i..i + lanes.len()]);
    }

    fn memory(&self) -> Option<&[T]> {
        Some(self.as_slice())
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        MemoryRegion::of(self.as_slice()).overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        f(&MemoryRegion::of(self.as_slice()))
    }

    fn describe(&self) -> String {
        format!("tensor[{}]", join_extents(self.shape(), "x"))
    }
}

/// Implements the expression surface shared by the fixed-shape containers
macro_rules! impl_fast_leaf {
    ($ty:ident <$($c:ident),+>, $name:literal, [$($extent:ident),+]) => {
        impl<T: Element, $(const $c: usize),+> Expr for $ty<T, $($c),+> {
            type Elem = T;

            const IS_FAST: bool = true;
            const IS_LINEAR: bool = true;
            const IS_DIRECT: bool = true;

            fn vectorizable(_mode: VectorMode) -> bool {
                true
            }

            fn static_dimensions() -> Option<usize> {
                Some([$($extent),+].len())
            }

            fn static_dim(d: usize) -> Option<usize> {
                [$($extent),+].get(d).copied()
            }

            fn static_size() -> Option<usize> {
                Some(1 $(* $extent)+)
            }

            #[inline]
            fn dimensions(&self) -> usize {
                [$($extent),+].len()
            }

            #[inline]
            fn dim(&self, d: usize) -> usize {
                DenseStorage::shape(self)[d]
            }

            #[inline]
            fn size(&self) -> usize {
                1 $(* $extent)+
            }

            #[inline]
            fn read_flat(&self, i: usize) -> T {
                DenseStorage::as_slice(self)[i]
            }

            #[inline]
            fn at(&self, coords: &[usize]) -> T {
                let shape = DenseStorage::shape(self);
                DenseStorage::as_slice(self)
                    [ravel_index(shape, crate::tensor::StorageOrder::RowMajor, coords)]
            }

            #[inline]
            fn load(&self, i: usize, lanes: &mut [T]) {
                lanes.copy_from_slice(&DenseStorage::as_slice(self)[i..i + lanes.len()]);
            }

            fn memory(&self) -> Option<&[T]> {
                Some(DenseStorage::as_slice(self))
            }

            fn overlaps(&self, region: &MemoryRegion) -> bool {
                MemoryRegion::of(DenseStorage::as_slice(self)).overlaps(region)
            }

            fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
                f(&MemoryRegion::of(DenseStorage::as_slice(self)))
            }

            fn describe(&self) -> String {
                format!(
                    concat!($name, "[{}]"),
                    join_extents(DenseStorage::shape(self), "x")
                )
            }
        }
    };
}

impl_fast_leaf!(FastMatrix<R, C>, "fast_matrix", [R, C]);
impl_fast_leaf!(FastVector<N>, "fast_vector", [N]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprTraits;
    use crate::tensor::{ColumnMajor, StorageOrder};

    #[test]
    fn test_tensor_leaf() {
        let t = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        assert_eq!(t.size(), 6);
        assert_eq!(Expr::dim(&t, 1), 3);
        assert_eq!(t.read_flat(4), 5.0);
        assert_eq!(t.at(&[1, 0]), 4.0);
        assert_eq!(t.describe(), "tensor[2x3]");
        assert_eq!(t.memory().map(<[f64]>::len), Some(6));
    }

    #[test]
    fn test_column_major_leaf_order() {
        let t = Tensor::<i32, ColumnMajor>::from_vec(vec![1, 3, 2, 4], &[2, 2]).unwrap();
        let traits = ExprTraits::of_val(&t, VectorMode::Scalar);
        assert_eq!(traits.storage_order, StorageOrder::ColumnMajor);
        assert_eq!(t.at(&[0, 1]), 2);
        assert_eq!(t.read_flat(1), 3);
    }

    #[test]
    fn test_fast_leaf_static_shape() {
        type M = FastMatrix<f32, 2, 3>;
        assert!(M::IS_FAST);
        assert_eq!(M::static_size(), Some(6));
        assert_eq!(M::static_dim(1), Some(3));
        assert_eq!(M::static_dim(2), None);
        assert_eq!(M::static_dimensions(), Some(2));

        let m = M::from_rows([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(m.at(&[1, 2]), 6.0);
        assert_eq!(m.describe(), "fast_matrix[2x3]");

        let v = FastVector::new([1i64, 2, 3]);
        assert_eq!(Expr::size(&v), 3);
        assert_eq!(v.describe(), "fast_vector[3]");
    }

    #[test]
    fn test_leaf_alias() {
        let a = Tensor::<f64>::zeros(&[4]);
        let b = Tensor::<f64>::zeros(&[4]);
        assert!(a.alias(&a));
        assert!(!a.alias(&b));
        assert!(a.alias(&&a));
    }
}
