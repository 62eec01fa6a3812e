//! Property-based tests for repeat transformers
//!
//! Flat and positional reads of a repeated view must agree with the
//! sub-expression at the coordinates the repeat maps them to.

use lazr::prelude::*;
use lazr::tensor::unravel_index;
use proptest::prelude::*;

// ============================================================================
// Test Utilities
// ============================================================================

/// Strategy for small sub-expression shapes (1 to 3 dimensions)
fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..5, 1..=3)
}

/// Strategy for repeat counts
fn reps_strategy() -> impl Strategy<Value = [usize; 2]> {
    prop::array::uniform2(1usize..4)
}

fn ramp(shape: &[usize]) -> Tensor<i64> {
    let n: usize = shape.iter().product();
    Tensor::from_vec((0..n as i64).collect(), shape).unwrap()
}

// ============================================================================
// Index Properties
// ============================================================================

proptest! {
    /// Property: rep_l flat index k reads sub element k mod N
    #[test]
    fn prop_rep_l_flat_is_modulo(shape in shape_strategy(), reps in reps_strategy()) {
        let sub = ramp(&shape);
        let n = sub.len();
        let view = (&sub).rep_l(reps);
        prop_assert_eq!(view.size(), n * reps[0] * reps[1]);
        for k in 0..view.size() {
            prop_assert_eq!(view.read_flat(k), sub.as_slice()[k % n]);
        }
    }

    /// Property: rep_r flat index k reads sub element k / product(reps)
    #[test]
    fn prop_rep_r_flat_is_quotient(shape in shape_strategy(), reps in reps_strategy()) {
        let sub = ramp(&shape);
        let product = reps[0] * reps[1];
        let view = (&sub).rep_r(reps);
        for k in 0..view.size() {
            prop_assert_eq!(view.read_flat(k), sub.as_slice()[k / product]);
        }
    }

    /// Property: flat and positional reads agree for row-major subs
    #[test]
    fn prop_flat_matches_positional(shape in shape_strategy(), reps in reps_strategy()) {
        let sub = ramp(&shape);
        let left = (&sub).rep_l(reps);
        let right = (&sub).rep_r(reps);

        let mut coords = vec![0; shape.len() + 2];
        let left_shape = left.shape();
        for k in 0..left.size() {
            unravel_index(&left_shape, StorageOrder::RowMajor, k, &mut coords);
            prop_assert_eq!(left.read_flat(k), left.at(&coords));
        }
        let right_shape = right.shape();
        for k in 0..right.size() {
            unravel_index(&right_shape, StorageOrder::RowMajor, k, &mut coords);
            prop_assert_eq!(right.read_flat(k), right.at(&coords));
        }
    }

    /// Property: assigning a repeat of a column-major sub matches the row-major equivalent
    #[test]
    fn prop_column_major_sub_matches_row_major(
        rows in 1usize..5,
        cols in 1usize..5,
        reps in reps_strategy(),
    ) {
        let row_major = ramp(&[rows, cols]);
        let mut col_major = Tensor::<i64, ColumnMajor>::filled(&[rows, cols], 0);
        col_major.copy_from(&row_major).unwrap();

        let shape = [reps[0], reps[1], rows, cols];
        let mut expected = Tensor::<i64>::zeros(&shape);
        let mut actual = Tensor::<i64>::zeros(&shape);
        assign(&mut expected, (&row_major).rep_l(reps)).unwrap();
        assign(&mut actual, (&col_major).rep_l(reps)).unwrap();
        prop_assert_eq!(expected.as_slice(), actual.as_slice());
    }
}
