//! Whole-expression reductions
//!
//! Reductions prepare the expression like [`assign`](super::assign) does and
//! then fold its elements in flat order. Large linear, thread-safe
//! expressions are folded in parallel chunks.

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::expr::visitor::prepare;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Sum of all elements; zero for an empty expression
pub fn sum<E: Expr>(mut expr: E) -> Result<E::Elem> {
    let n = reducible_len("sum", &mut expr)?;
    Ok(fold(&expr, n, E::Elem::zero(), |a, b| a + b).unwrap_or_else(E::Elem::zero))
}

/// Arithmetic mean of all elements
///
/// Integer elements use integer division.
pub fn mean<E: Expr>(mut expr: E) -> Result<E::Elem> {
    let n = reducible_len("mean", &mut expr)?;
    require_elements("mean", n)?;
    let total = fold(&expr, n, E::Elem::zero(), |a, b| a + b).unwrap_or_else(E::Elem::zero);
    Ok(total / E::Elem::from_f64(n as f64))
}

/// Largest element
pub fn max<E: Expr>(mut expr: E) -> Result<E::Elem> {
    let n = reducible_len("max", &mut expr)?;
    require_elements("max", n)?;
    let first = expr.read_flat(0);
    Ok(fold(&expr, n, first, |a, b| if b > a { b } else { a }).unwrap_or(first))
}

/// Smallest element
pub fn min<E: Expr>(mut expr: E) -> Result<E::Elem> {
    let n = reducible_len("min", &mut expr)?;
    require_elements("min", n)?;
    let first = expr.read_flat(0);
    Ok(fold(&expr, n, first, |a, b| if b < a { b } else { a }).unwrap_or(first))
}

fn reducible_len<E: Expr>(op: &'static str, expr: &mut E) -> Result<usize> {
    if E::IS_GENERATOR {
        return Err(Error::invalid_argument(
            "expr",
            format!("{op} of {} needs a shaped expression", expr.describe()),
        ));
    }
    prepare(expr)?;
    Ok(expr.size())
}

fn require_elements(op: &'static str, n: usize) -> Result<()> {
    if n == 0 {
        return Err(Error::invalid_argument(
            "expr",
            format!("{op} of an empty expression"),
        ));
    }
    Ok(())
}

/// Fold elements `0..n` with `f`, starting every partial fold from `init`
///
/// `f` must be associative and `init` neutral for it.
fn fold<E: Expr>(
    expr: &E,
    n: usize,
    init: E::Elem,
    f: impl Fn(E::Elem, E::Elem) -> E::Elem + Sync + Send,
) -> Option<E::Elem> {
    #[cfg(feature = "rayon")]
    {
        let cfg = crate::config::current();
        if cfg.parallel && E::IS_LINEAR && E::THREAD_SAFE && n >= cfg.parallel_threshold {
            log::debug!("reducing {} in parallel", expr.describe());
            return (0..n)
                .into_par_iter()
                .map(|i| expr.read_flat(i))
                .reduce_with(&f);
        }
    }
    Some((0..n).fold(init, |acc, i| f(acc, expr.read_flat(i))))
}
