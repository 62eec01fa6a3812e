//! Assignment: where lazy expressions turn into memory
//!
//! [`assign`] pulls every element of an expression into a dense destination:
//!
//! ```text
//! assign(dest, expr)
//!   1. shape check                (skipped for generators)
//!   2. alias check                (aliasing expression -> scratch tensor, then copy)
//!   3. temporary root             (evaluated straight into a row-major dest)
//!   4. prepare                    (allocate + evaluate visitors, post-order)
//!   5. select_strategy + execute  (direct / positional / parallel / vectorized / scalar)
//! ```
//!
//! Compound assignment ([`assign_add`] and friends) and the reductions in
//! [`reduce`] share steps 1, 2 and 4.

pub mod reduce;

pub use reduce::{max, mean, min, sum};

use crate::config::{self, EvalConfig};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::expr::operators::{
    BinaryOperator, DivBinaryOp, MinusBinaryOp, MulBinaryOp, PlusBinaryOp,
};
use crate::expr::visitor::prepare;
use crate::expr::{Expr, MemoryRegion};
use crate::simd::MAX_LANES;
use crate::tensor::{DenseStorage, Shape, StorageOrder, Tensor, ravel_index, unravel_index};
use log::debug;
use std::fmt;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Elements handed to one rayon task
const CHUNK_SIZE: usize = 4096;

/// How the elements of an expression reach the destination
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Copy the expression's memory in one go
    Direct,
    /// Read by coordinates; storage orders differ
    Positional,
    /// Rayon over chunks of the destination
    Parallel,
    /// Lane batches through [`Expr::load`]
    Vectorized,
    /// One [`Expr::read_flat`] per element
    Scalar,
}

impl Strategy {
    /// Name used in logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Positional => "positional",
            Self::Parallel => "parallel",
            Self::Vectorized => "vectorized",
            Self::Scalar => "scalar",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the loop that moves `expr` into a destination stored in `dest_order`
///
/// The expression must be prepared: `Direct` is only chosen when its memory
/// is readable.
pub fn select_strategy<E: Expr>(expr: &E, dest_order: StorageOrder, cfg: &EvalConfig) -> Strategy {
    let same_order = E::STORAGE_ORDER == dest_order;
    if E::IS_DIRECT && same_order && expr.memory().is_some() {
        return Strategy::Direct;
    }
    if !E::IS_GENERATOR && !same_order && expr.dimensions() > 1 {
        return Strategy::Positional;
    }
    if cfg!(feature = "rayon")
        && cfg.parallel
        && E::IS_LINEAR
        && E::THREAD_SAFE
        && !E::IS_GENERATOR
        && expr.size() >= cfg.parallel_threshold
    {
        return Strategy::Parallel;
    }
    let mode = cfg.effective_vector_mode();
    if E::IS_LINEAR && mode.is_vector() && E::vectorizable(mode) {
        return Strategy::Vectorized;
    }
    Strategy::Scalar
}

/// Evaluate `expr` into `dest`
///
/// # Errors
///
/// `ShapeMismatch` when the shapes differ (generators adapt to any shape),
/// and whatever a temporary's operator or backend reports.
pub fn assign<E, D>(dest: &mut D, mut expr: E) -> Result<()>
where
    E: Expr,
    D: DenseStorage<E::Elem>,
{
    check_shape(dest, &expr)?;

    if aliases(&expr, dest) {
        debug!("{} aliases its destination; assigning through scratch", expr.describe());
        let mut scratch = Tensor::zeros(dest.shape());
        assign(&mut scratch, expr)?;
        copy_into(dest, &scratch);
        return Ok(());
    }

    if E::EVALUATES_INTO && expr.memory().is_none() {
        if let Some(out) = dest.as_row_major_tensor() {
            debug!("evaluating {} into destination", expr.describe());
            return expr.evaluate_into(out);
        }
    }

    prepare(&mut expr)?;
    let cfg = config::current();
    let strategy = select_strategy(&expr, dest.order(), &cfg);
    debug!(
        "assign {} -> {:?} {}: {strategy}",
        expr.describe(),
        dest.shape(),
        dest.order().as_str()
    );
    execute(strategy, dest, &expr, &cfg);
    Ok(())
}

fn check_shape<E: Expr, D: DenseStorage<E::Elem>>(dest: &D, expr: &E) -> Result<()> {
    if E::IS_GENERATOR {
        return Ok(());
    }
    let shape = expr.shape();
    if !shape.matches(dest.shape()) {
        return Err(Error::shape_mismatch(dest.shape(), &shape));
    }
    Ok(())
}

fn aliases<E: Expr, D: DenseStorage<E::Elem>>(expr: &E, dest: &D) -> bool {
    let region = MemoryRegion::of(dest.as_slice());
    expr.overlaps(&region)
}

/// Copy a row-major tensor of the destination's shape into `dest`
fn copy_into<T: Element, D: DenseStorage<T>>(dest: &mut D, src: &Tensor<T>) {
    if dest.order() == StorageOrder::RowMajor {
        dest.as_mut_slice().copy_from_slice(src.as_slice());
        return;
    }
    let shape = Shape::from(dest.shape());
    let order = dest.order();
    let mut coords = vec![0; shape.ndim()];
    for (flat, v) in dest.as_mut_slice().iter_mut().enumerate() {
        unravel_index(&shape, order, flat, &mut coords);
        *v = src.as_slice()[ravel_index(&shape, StorageOrder::RowMajor, &coords)];
    }
}

fn execute<E, D>(strategy: Strategy, dest: &mut D, expr: &E, cfg: &EvalConfig)
where
    E: Expr,
    D: DenseStorage<E::Elem>,
{
    let order = dest.order();
    let shape = Shape::from(dest.shape());
    let out = dest.as_mut_slice();
    match strategy {
        Strategy::Direct => match expr.memory() {
            Some(mem) => out.copy_from_slice(mem),
            None => fill_scalar(out, 0, expr),
        },
        Strategy::Positional => {
            let mut coords = vec![0; shape.ndim()];
            for (flat, v) in out.iter_mut().enumerate() {
                unravel_index(&shape, order, flat, &mut coords);
                *v = expr.at(&coords);
            }
        }
        Strategy::Parallel => fill_parallel(out, expr, cfg),
        Strategy::Vectorized => {
            let lanes = cfg.effective_vector_mode().lanes::<E::Elem>().min(MAX_LANES);
            fill_batched(out, 0, lanes, expr);
        }
        Strategy::Scalar => fill_scalar(out, 0, expr),
    }
}

fn fill_scalar<E: Expr>(out: &mut [E::Elem], base: usize, expr: &E) {
    for (i, v) in out.iter_mut().enumerate() {
        *v = expr.read_flat(base + i);
    }
}

fn fill_batched<E: Expr>(out: &mut [E::Elem], base: usize, lanes: usize, expr: &E) {
    let lanes = lanes.max(1);
    for (c, batch) in out.chunks_mut(lanes).enumerate() {
        expr.load(base + c * lanes, batch);
    }
}

#[cfg(feature = "rayon")]
fn fill_parallel<E: Expr>(out: &mut [E::Elem], expr: &E, cfg: &EvalConfig) {
    let mode = cfg.effective_vector_mode();
    let lanes = if mode.is_vector() && E::vectorizable(mode) {
        mode.lanes::<E::Elem>().min(MAX_LANES)
    } else {
        1
    };
    out.par_chunks_mut(CHUNK_SIZE)
        .enumerate()
        .for_each(|(c, chunk)| {
            if lanes > 1 {
                fill_batched(chunk, c * CHUNK_SIZE, lanes, expr);
            } else {
                fill_scalar(chunk, c * CHUNK_SIZE, expr);
            }
        });
}

#[cfg(not(feature = "rayon"))]
fn fill_parallel<E: Expr>(out: &mut [E::Elem], expr: &E, _cfg: &EvalConfig) {
    fill_scalar(out, 0, expr);
}

// ============================================================================
// Compound assignment
// ============================================================================

/// `dest = op(dest, expr)` element by element
pub fn assign_op<E, D, Op>(dest: &mut D, mut expr: E, op: Op) -> Result<()>
where
    E: Expr,
    D: DenseStorage<E::Elem>,
    Op: BinaryOperator<E::Elem>,
{
    check_shape(dest, &expr)?;

    if aliases(&expr, dest) || (!E::IS_GENERATOR && E::STORAGE_ORDER != dest.order() && expr.dimensions() > 1) {
        let mut scratch = Tensor::zeros(dest.shape());
        assign(&mut scratch, expr)?;
        debug!("assign_{} through row-major scratch", op.desc());
        combine_positional(dest, &scratch, &op);
        return Ok(());
    }

    prepare(&mut expr)?;
    let out = dest.as_mut_slice();
    debug!("assign_{} {}", op.desc(), expr.describe());

    #[cfg(feature = "rayon")]
    {
        let cfg = config::current();
        if cfg.parallel && E::THREAD_SAFE && out.len() >= cfg.parallel_threshold {
            out.par_chunks_mut(CHUNK_SIZE)
                .enumerate()
                .for_each(|(c, chunk)| combine_flat(chunk, c * CHUNK_SIZE, &expr, &op));
            return Ok(());
        }
    }

    combine_flat(out, 0, &expr, &op);
    Ok(())
}

fn combine_flat<E: Expr, Op: BinaryOperator<E::Elem>>(out: &mut [E::Elem], base: usize, expr: &E, op: &Op) {
    for (i, v) in out.iter_mut().enumerate() {
        *v = op.apply(*v, expr.read_flat(base + i));
    }
}

fn combine_positional<T: Element, D: DenseStorage<T>, Op: BinaryOperator<T>>(dest: &mut D, src: &Tensor<T>, op: &Op) {
    let shape = Shape::from(dest.shape());
    let order = dest.order();
    let mut coords = vec![0; shape.ndim()];
    for (flat, v) in dest.as_mut_slice().iter_mut().enumerate() {
        unravel_index(&shape, order, flat, &mut coords);
        *v = op.apply(*v, src.as_slice()[ravel_index(&shape, StorageOrder::RowMajor, &coords)]);
    }
}

/// `dest += expr`
pub fn assign_add<E: Expr, D: DenseStorage<E::Elem>>(dest: &mut D, expr: E) -> Result<()> {
    assign_op(dest, expr, PlusBinaryOp)
}

/// `dest -= expr`
pub fn assign_sub<E: Expr, D: DenseStorage<E::Elem>>(dest: &mut D, expr: E) -> Result<()> {
    assign_op(dest, expr, MinusBinaryOp)
}

/// `dest *= expr`
pub fn assign_mul<E: Expr, D: DenseStorage<E::Elem>>(dest: &mut D, expr: E) -> Result<()> {
    assign_op(dest, expr, MulBinaryOp)
}

/// `dest /= expr`
pub fn assign_div<E: Expr, D: DenseStorage<E::Elem>>(dest: &mut D, expr: E) -> Result<()> {
    assign_op(dest, expr, DivBinaryOp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::with_config;
    use crate::expr::{ConstantGenerator, ExprExt};
    use crate::simd::VectorMode;
    use crate::tensor::ColumnMajor;

    fn scalar_only() -> EvalConfig {
        EvalConfig::default().with_parallel(false).with_vectorize(false)
    }

    #[test]
    fn test_strategy_selection() {
        let cfg = EvalConfig::default()
            .with_parallel(false)
            .with_vector_mode(VectorMode::Avx);
        let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]);
        assert_eq!(select_strategy(&&t, StorageOrder::RowMajor, &cfg), Strategy::Direct);
        assert_eq!(select_strategy(&&t, StorageOrder::ColumnMajor, &cfg), Strategy::Positional);
        assert_eq!(select_strategy(&(&t).neg(), StorageOrder::RowMajor, &cfg), Strategy::Vectorized);
        assert_eq!(select_strategy(&(&t).rep_r([2]), StorageOrder::RowMajor, &cfg), Strategy::Scalar);
        let scalar = cfg.with_vectorize(false);
        assert_eq!(select_strategy(&(&t).neg(), StorageOrder::RowMajor, &scalar), Strategy::Scalar);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_selection_respects_thread_safety() {
        let cfg = EvalConfig::default().with_parallel_threshold(4);
        let t = Tensor::<f64>::zeros(&[8]);
        assert_eq!(select_strategy(&(&t).abs(), StorageOrder::RowMajor, &cfg), Strategy::Parallel);
        let noisy = (&t).add(crate::expr::RandomGenerator::normal().unwrap()).unwrap();
        assert_ne!(select_strategy(&noisy, StorageOrder::RowMajor, &cfg), Strategy::Parallel);
    }

    #[test]
    fn test_assign_elementwise_every_strategy() {
        let a = Tensor::from_slice(&(0..10_000).map(|v| v as f64).collect::<Vec<_>>(), &[100, 100]);
        let expected: Vec<f64> = a.as_slice().iter().map(|v| -v * 2.0).collect();
        let configs = [
            scalar_only(),
            EvalConfig::default().with_parallel(false).with_vector_mode(VectorMode::Avx),
            EvalConfig::default().with_parallel_threshold(16),
        ];
        for cfg in configs {
            let mut out = Tensor::<f64>::zeros(&[100, 100]);
            with_config(cfg, || assign(&mut out, (&a).neg().scale(2.0))).unwrap();
            assert_eq!(out.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn test_assign_into_column_major() {
        let a = Tensor::from_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]);
        let mut out = Tensor::<i32, ColumnMajor>::filled(&[2, 3], 0);
        assign(&mut out, (&a).add_scalar(10)).unwrap();
        assert_eq!(out.as_slice(), &[11, 14, 12, 15, 13, 16]);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Tensor::<f32>::zeros(&[3]);
        let mut out = Tensor::<f32>::zeros(&[4]);
        assert!(matches!(assign(&mut out, &a), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_generator_fills_any_shape() {
        let mut out = Tensor::<f32>::zeros(&[3, 5]);
        assign(&mut out, ConstantGenerator::new(2.5f32)).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 2.5));
    }

    #[test]
    fn test_alias_detection() {
        let t = Tensor::from_slice(&[1i64, 2], &[2]);
        let copy = t.clone();
        assert!(aliases(&(&t).rep_l([2]), &t));
        assert!(aliases(&(&copy).add(&t).unwrap(), &t));
        assert!(!aliases(&(&copy).neg(), &t));
        assert!(!aliases(&ConstantGenerator::new(1i64), &t));
    }

    #[test]
    fn test_compound_assignment() {
        let mut acc = Tensor::from_slice(&[1.0f64, 2.0, 3.0], &[3]);
        let b = Tensor::from_slice(&[1.0f64, 1.0, 1.0], &[3]);
        assign_add(&mut acc, &b).unwrap();
        assign_sub(&mut acc, (&b).scale(0.5)).unwrap();
        assign_div(&mut acc, ConstantGenerator::new(2.0)).unwrap();
        assert_eq!(acc.as_slice(), &[0.75, 1.25, 1.75]);
    }

    #[test]
    fn test_compound_across_orders() {
        let a = Tensor::from_slice(&[1i32, 2, 3, 4], &[2, 2]);
        let mut out = Tensor::<i32, ColumnMajor>::filled(&[2, 2], 1);
        assign_add(&mut out, &a).unwrap();
        assert_eq!(out.get(&[0, 1]), Some(3));
        assert_eq!(out.get(&[1, 0]), Some(4));
    }
}
