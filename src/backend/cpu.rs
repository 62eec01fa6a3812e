//! CPU reference backend
//!
//! Straightforward host loops behind the [`Backend`] interface. Results stay
//! in host memory. Large matrix products split their output rows over rayon
//! when parallel evaluation is enabled.

use super::{Backend, BackendOp, GemmDims, PoolMode, PoolingDescriptor, TensorDescriptor, ensure_supported};
use crate::dtype::{DType, Element};
use crate::error::BackendError;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

const NAME: &str = "cpu";

/// Host backend; always available
#[derive(Copy, Clone, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    fn check_len(operation: &'static str, what: &str, expected: usize, got: usize) -> Result<(), BackendError> {
        if expected != got {
            return Err(BackendError::DescriptorMismatch {
                backend: NAME,
                operation,
                reason: format!("{what} holds {got} elements, descriptor requires {expected}"),
            });
        }
        Ok(())
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, op: BackendOp, dtype: DType) -> bool {
        match op {
            BackendOp::Gemm => dtype.is_float(),
            BackendOp::Pool2dForward => dtype.is_ordered(),
        }
    }

    fn gemm<T: Element>(&self, dims: GemmDims, a: &[T], b: &[T], c: &mut [T]) -> Result<(), BackendError> {
        ensure_supported::<_, T>(self, BackendOp::Gemm)?;
        let GemmDims { m, k, n } = dims;
        let op = BackendOp::Gemm.as_str();
        Self::check_len(op, "a", m * k, a.len())?;
        Self::check_len(op, "b", k * n, b.len())?;
        Self::check_len(op, "c", m * n, c.len())?;
        if n == 0 {
            return Ok(());
        }

        #[cfg(feature = "rayon")]
        {
            let cfg = crate::config::current();
            if cfg.parallel && m * n * k >= cfg.parallel_threshold {
                c.par_chunks_mut(n)
                    .enumerate()
                    .for_each(|(i, row)| gemm_row(&a[i * k..(i + 1) * k], b, row));
                return Ok(());
            }
        }

        for (i, row) in c.chunks_mut(n).enumerate() {
            gemm_row(&a[i * k..(i + 1) * k], b, row);
        }
        Ok(())
    }

    fn pool2d_forward<T: Element>(
        &self,
        pool: &PoolingDescriptor,
        x_desc: &TensorDescriptor,
        x: &[T],
        y_desc: &TensorDescriptor,
        y: &mut [T],
    ) -> Result<(), BackendError> {
        ensure_supported::<_, T>(self, BackendOp::Pool2dForward)?;
        let op = BackendOp::Pool2dForward.as_str();
        Self::check_len(op, "x", x_desc.elem_count(), x.len())?;
        Self::check_len(op, "y", y_desc.elem_count(), y.len())?;
        let expected = pool.output_descriptor(NAME, x_desc)?;
        if expected.dims() != y_desc.dims() {
            return Err(BackendError::DescriptorMismatch {
                backend: NAME,
                operation: op,
                reason: format!("output {y_desc} does not match pooled input {expected}"),
            });
        }

        let (h, w) = (x_desc.h, x_desc.w);
        let planes = x_desc.n * x_desc.c;
        for p in 0..planes {
            let src = &x[p * h * w..(p + 1) * h * w];
            let dst = &mut y[p * y_desc.h * y_desc.w..(p + 1) * y_desc.h * y_desc.w];
            for oy in 0..y_desc.h {
                for ox in 0..y_desc.w {
                    dst[oy * y_desc.w + ox] = pool_window(pool, |iy, ix| src[iy * w + ix], h, w, oy, ox);
                }
            }
        }
        Ok(())
    }
}

/// One output row of `c = a b`: `row += a_row[p] * b[p, ..]`, ikj order
#[inline]
fn gemm_row<T: Element>(a_row: &[T], b: &[T], row: &mut [T]) {
    let n = row.len();
    row.fill(T::zero());
    for (p, &a_ip) in a_row.iter().enumerate() {
        for (out, &b_pj) in row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
            *out = *out + a_ip * b_pj;
        }
    }
}

/// Reduce the window of output element `(oy, ox)` over an `h x w` plane
///
/// `read(iy, ix)` returns the input element at in-bounds coordinates. Padding
/// never contributes: max ignores it and avg excludes it from the count. A
/// window lying entirely in the padding yields zero.
pub(crate) fn pool_window<T: Element>(
    pool: &PoolingDescriptor,
    mut read: impl FnMut(usize, usize) -> T,
    h: usize,
    w: usize,
    oy: usize,
    ox: usize,
) -> T {
    let [wh, ww] = pool.window;
    let [sh, sw] = pool.stride;
    let [ph, pw] = pool.padding;
    let y0 = oy * sh;
    let x0 = ox * sw;

    let mut best: Option<T> = None;
    let mut sum = T::zero();
    let mut count = 0usize;
    for dy in 0..wh {
        let Some(iy) = (y0 + dy).checked_sub(ph).filter(|&iy| iy < h) else {
            continue;
        };
        for dx in 0..ww {
            let Some(ix) = (x0 + dx).checked_sub(pw).filter(|&ix| ix < w) else {
                continue;
            };
            let v = read(iy, ix);
            match pool.mode {
                PoolMode::Max => {
                    if best.is_none_or(|b| v > b) {
                        best = Some(v);
                    }
                }
                PoolMode::Avg => {
                    sum = sum + v;
                    count += 1;
                }
            }
        }
    }

    match pool.mode {
        PoolMode::Max => best.unwrap_or_else(T::zero),
        PoolMode::Avg if count == 0 => T::zero(),
        PoolMode::Avg => sum / T::from_f64(count as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemm_small() {
        let a = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0f64, 8.0, 9.0, 10.0, 11.0, 12.0];
        let mut c = [0.0f64; 4];
        CpuBackend
            .gemm(GemmDims { m: 2, k: 3, n: 2 }, &a, &b, &mut c)
            .unwrap();
        assert_eq!(c, [58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_gemm_rejects_integers_and_bad_lengths() {
        let mut c = [0i32; 1];
        let err = CpuBackend
            .gemm(GemmDims { m: 1, k: 1, n: 1 }, &[1], &[1], &mut c)
            .unwrap_err();
        assert!(err.is_unsupported());

        let mut c = [0.0f32; 4];
        let err = CpuBackend
            .gemm(GemmDims { m: 2, k: 2, n: 2 }, &[1.0; 3], &[1.0; 4], &mut c)
            .unwrap_err();
        assert!(matches!(err, BackendError::DescriptorMismatch { .. }));
    }

    #[test]
    fn test_max_pool_nchw() {
        let x: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let pool = PoolingDescriptor::new(PoolMode::Max, [2, 2]);
        let x_desc = TensorDescriptor::nchw(NAME, &[4, 4], DType::F32).unwrap();
        let y_desc = pool.output_descriptor(NAME, &x_desc).unwrap();
        let mut y = vec![0.0f32; y_desc.elem_count()];
        CpuBackend
            .pool2d_forward(&pool, &x_desc, &x, &y_desc, &mut y)
            .unwrap();
        assert_eq!(y, [5.0, 7.0, 13.0, 15.0]);
    }

    #[test]
    fn test_avg_pool_excludes_padding() {
        let x = [1.0f64, 2.0, 3.0, 4.0];
        let pool = PoolingDescriptor::new(PoolMode::Avg, [2, 2])
            .with_stride([1, 1])
            .with_padding([1, 1]);
        let read = |iy: usize, ix: usize| x[iy * 2 + ix];
        // corner window only covers x[0, 0]
        assert_eq!(pool_window(&pool, read, 2, 2, 0, 0), 1.0);
        // centre window covers the whole input
        assert_eq!(pool_window(&pool, read, 2, 2, 1, 1), 2.5);
    }

    #[test]
    fn test_pool_output_mismatch() {
        let pool = PoolingDescriptor::new(PoolMode::Max, [2, 2]);
        let x_desc = TensorDescriptor::nchw(NAME, &[4, 4], DType::F64).unwrap();
        let y_desc = TensorDescriptor::nchw(NAME, &[3, 3], DType::F64).unwrap();
        let err = CpuBackend
            .pool2d_forward(&pool, &x_desc, &[0.0; 16], &y_desc, &mut [0.0; 9])
            .unwrap_err();
        assert!(matches!(err, BackendError::DescriptorMismatch { .. }));
    }
}
