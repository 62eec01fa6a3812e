//! 2-D pooling over the last two dimensions

use crate::backend::cpu::pool_window;
use crate::backend::{Backend, BackendOp, CpuBackend, PoolMode, PoolingDescriptor, dispatch, run_with_fallback};
use crate::error::{Error, Result};
use crate::expr::{Expr, UnaryTemporaryOp};
use crate::tensor::{Shape, StorageOrder, Tensor, unravel_index};

/// Max or average pooling of every `[h, w]` plane of the operand
///
/// Leading dimensions are batch dimensions and are kept as they are. The
/// backend receives the operand as NCHW; operands of rank above the backend's
/// limit are pooled one leading slice at a time.
#[derive(Copy, Clone, Debug)]
pub struct Pool2d<K: Backend = CpuBackend> {
    desc: PoolingDescriptor,
    backend: K,
}

impl Pool2d {
    /// Pool with `desc` on the CPU backend
    pub fn new(desc: PoolingDescriptor) -> Self {
        Self::with_backend(desc, CpuBackend)
    }

    /// Non-overlapping max pooling with a `window`
    pub fn max(window: [usize; 2]) -> Self {
        Self::new(PoolingDescriptor::new(PoolMode::Max, window))
    }

    /// Non-overlapping average pooling with a `window`
    pub fn avg(window: [usize; 2]) -> Self {
        Self::new(PoolingDescriptor::new(PoolMode::Avg, window))
    }
}

impl<K: Backend> Pool2d<K> {
    /// Pool with `desc` on `backend`
    pub fn with_backend(desc: PoolingDescriptor, backend: K) -> Self {
        Self { desc, backend }
    }

    /// The pooling parameters
    pub fn descriptor(&self) -> &PoolingDescriptor {
        &self.desc
    }

    fn pooled_extent(&self, axis: usize, input: usize) -> Result<usize> {
        self.desc.output_extent(axis, input).ok_or_else(|| {
            Error::invalid_argument(
                "window",
                format!(
                    "window {:?} with stride {:?} does not fit extent {input}",
                    self.desc.window, self.desc.stride
                ),
            )
        })
    }
}

impl<A, K> UnaryTemporaryOp<A> for Pool2d<K>
where
    A: Expr,
    K: Backend,
{
    fn desc(&self) -> &'static str {
        self.desc.mode.as_str()
    }

    fn shape(&self, a: &A) -> Shape {
        let r = a.dimensions();
        let mut shape: Shape = (0..r - 2).map(|d| a.dim(d)).collect();
        // extents were validated by check()
        shape.push(self.desc.output_extent(0, a.dim(r - 2)).unwrap_or(0));
        shape.push(self.desc.output_extent(1, a.dim(r - 1)).unwrap_or(0));
        shape
    }

    fn check(&self, a: &A) -> Result<()> {
        let r = a.dimensions();
        if r < 2 {
            return Err(Error::invalid_argument(
                "input",
                format!("pooling needs at least 2 dimensions, got {r}"),
            ));
        }
        self.pooled_extent(0, a.dim(r - 2))?;
        self.pooled_extent(1, a.dim(r - 1))?;
        Ok(())
    }

    fn apply(&self, a: &A, out: &mut Tensor<A::Elem>) -> Result<()> {
        run_with_fallback(
            "pool2d",
            out,
            |out| {
                let x = dispatch::require_host_operand(&self.backend, BackendOp::Pool2dForward, a)?;
                dispatch::pool2d_forward(&self.backend, &self.desc, x, &a.shape(), out)
            },
            |out| {
                pool_generic(&self.desc, a, out);
                Ok(())
            },
        )
    }
}

fn pool_generic<A: Expr>(desc: &PoolingDescriptor, a: &A, out: &mut Tensor<A::Elem>) {
    let in_shape = a.shape();
    let out_shape = out.shape().to_vec();
    let r = in_shape.len();
    let (h, w) = (in_shape[r - 2], in_shape[r - 1]);
    let (oh, ow) = (out_shape[r - 2], out_shape[r - 1]);
    let lead = &in_shape[..r - 2];
    if oh * ow == 0 {
        return;
    }

    let mut coords = vec![0; r];
    for (plane, dst) in out.as_mut_slice().chunks_mut(oh * ow).enumerate() {
        unravel_index(lead, StorageOrder::RowMajor, plane, &mut coords[..r - 2]);
        for oy in 0..oh {
            for ox in 0..ow {
                dst[oy * ow + ox] = pool_window(
                    desc,
                    |iy, ix| {
                        coords[r - 2] = iy;
                        coords[r - 1] = ix;
                        a.at(&coords)
                    },
                    h,
                    w,
                    oy,
                    ox,
                );
            }
        }
    }
}
