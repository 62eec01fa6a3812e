//! Integration tests for backend dispatch and fallback policies

mod common;

use lazr::backend::{BackendOp, GemmDims, Residency, TensorDescriptor};
use lazr::config::with_config;
use lazr::counters::counters;
use lazr::expr::{TemporaryBinaryExpr, TemporaryUnaryExpr};
use lazr::ops::{MatMul, Pool2d};
use lazr::prelude::*;

/// Backend whose routines claim support and then fail at run time
#[derive(Copy, Clone, Debug, Default)]
struct FailingBackend;

impl Backend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn supports(&self, _op: BackendOp, _dtype: DType) -> bool {
        true
    }

    fn gemm<T: Element>(
        &self,
        _dims: GemmDims,
        _a: &[T],
        _b: &[T],
        _c: &mut [T],
    ) -> std::result::Result<(), BackendError> {
        Err(BackendError::Execution {
            backend: self.name(),
            operation: "gemm",
            status: "EXECUTION_FAILED".into(),
        })
    }

    fn pool2d_forward<T: Element>(
        &self,
        _pool: &PoolingDescriptor,
        _x_desc: &TensorDescriptor,
        _x: &[T],
        _y_desc: &TensorDescriptor,
        _y: &mut [T],
    ) -> std::result::Result<(), BackendError> {
        Err(BackendError::Execution {
            backend: self.name(),
            operation: "pool2d_forward",
            status: "BAD_PARAM".into(),
        })
    }
}

/// Device-resident backend whose descriptors stop at two dimensions
///
/// Computes with the CPU routines; only the residency it reports differs.
#[derive(Copy, Clone, Debug, Default)]
struct PlaneBackend;

impl Backend for PlaneBackend {
    fn name(&self) -> &'static str {
        "plane"
    }

    fn max_rank(&self) -> usize {
        2
    }

    fn residency(&self) -> Residency {
        Residency::Device
    }

    fn supports(&self, op: BackendOp, dtype: DType) -> bool {
        CpuBackend.supports(op, dtype)
    }

    fn gemm<T: Element>(
        &self,
        dims: GemmDims,
        a: &[T],
        b: &[T],
        c: &mut [T],
    ) -> std::result::Result<(), BackendError> {
        CpuBackend.gemm(dims, a, b, c)
    }

    fn pool2d_forward<T: Element>(
        &self,
        pool: &PoolingDescriptor,
        x_desc: &TensorDescriptor,
        x: &[T],
        y_desc: &TensorDescriptor,
        y: &mut [T],
    ) -> std::result::Result<(), BackendError> {
        CpuBackend.pool2d_forward(pool, x_desc, x, y_desc, y)
    }
}

fn propagate() -> EvalConfig {
    EvalConfig::default().with_backend_fallback(BackendFallback::Propagate)
}

fn generic() -> EvalConfig {
    EvalConfig::default().with_backend_fallback(BackendFallback::Generic)
}

// =============================================================================
// Fallback policies
// =============================================================================

#[test]
fn test_failed_gemm_propagates() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let e = TemporaryBinaryExpr::new(&a, &a, MatMul::with_backend(FailingBackend)).unwrap();
    let mut out = Tensor::<f64>::zeros(&[2, 2]);

    let err = with_config(propagate(), || assign(&mut out, e)).unwrap_err();
    let backend = err.as_backend().expect("backend error");
    assert_eq!(backend.backend(), "failing");
    assert!(!backend.is_unsupported());
    assert_eq!(counters().backend_fallbacks, 0);
}

#[test]
fn test_failed_gemm_falls_back_to_generic() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let e = TemporaryBinaryExpr::new(&a, &a, MatMul::with_backend(FailingBackend)).unwrap();
    let mut out = Tensor::<f64>::zeros(&[2, 2]);

    with_config(generic(), || assign(&mut out, e)).unwrap();
    assert_eq!(out.as_slice(), &[7.0, 10.0, 15.0, 22.0]);
    assert_eq!(counters().backend_dispatches, 1);
    assert_eq!(counters().backend_fallbacks, 1);
    assert_eq!(out.resident_on(), None);
}

#[test]
fn test_failed_pool_policies() {
    common::setup();
    let x = common::ramp(&[4, 4]);
    let op = Pool2d::with_backend(PoolingDescriptor::new(PoolMode::Max, [2, 2]), FailingBackend);

    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    let e = TemporaryUnaryExpr::new(&x, op).unwrap();
    assert!(with_config(propagate(), || assign(&mut out, e)).is_err());

    let e = TemporaryUnaryExpr::new(&x, op).unwrap();
    with_config(generic(), || assign(&mut out, e)).unwrap();
    assert_eq!(out.as_slice(), &[5.0, 7.0, 13.0, 15.0]);
}

#[test]
fn test_unsupported_dtype_always_falls_back() {
    common::setup();
    let a = Tensor::from_slice(&[1i32, 2, 3, 4], &[2, 2]);
    let mut out = Tensor::<i32>::zeros(&[2, 2]);
    with_config(propagate(), || assign(&mut out, (&a).matmul(&a)?)).unwrap();
    assert_eq!(out.as_slice(), &[7, 10, 15, 22]);
    assert_eq!(counters().backend_fallbacks, 1);
}

#[test]
fn test_computed_operand_takes_generic_path() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]);
    let mut out = Tensor::<f32>::zeros(&[2, 2]);
    with_config(propagate(), || assign(&mut out, (&a).neg().matmul(&a)?)).unwrap();
    assert_eq!(out.as_slice(), &[-7.0, -10.0, -15.0, -22.0]);
    assert_eq!(counters().backend_fallbacks, 1);
    assert_eq!(counters().backend_dispatches, 0);
}

// =============================================================================
// Descriptors and rank handling
// =============================================================================

#[test]
fn test_rank_above_backend_limit_is_split() {
    common::setup();
    let x = common::ramp(&[2, 4, 4]);
    let op = Pool2d::with_backend(PoolingDescriptor::new(PoolMode::Max, [2, 2]), PlaneBackend);
    let mut out = Tensor::<f64>::zeros(&[2, 2, 2]);
    assign(&mut out, TemporaryUnaryExpr::new(&x, op).unwrap()).unwrap();
    assert_eq!(out.as_slice(), &[5.0, 7.0, 13.0, 15.0, 21.0, 23.0, 29.0, 31.0]);
    assert_eq!(counters().backend_dispatches, 2);
    assert_eq!(counters().backend_fallbacks, 0);
    assert_eq!(out.resident_on(), Some("plane"));
}

#[test]
fn test_rank_five_pooling_on_cpu() {
    common::setup();
    let x = common::ramp(&[2, 1, 1, 4, 4]);
    let mut out = Tensor::<f64>::zeros(&[2, 1, 1, 2, 2]);
    assign(&mut out, (&x).avg_pool_2d([2, 2]).unwrap()).unwrap();
    assert_eq!(&out.as_slice()[..4], &[2.5, 4.5, 10.5, 12.5]);
    assert_eq!(&out.as_slice()[4..], &[18.5, 20.5, 26.5, 28.5]);
    assert_eq!(counters().backend_dispatches, 2);
}

#[test]
fn test_descriptors_are_nchw() {
    let d = CpuBackend.tensor_descriptor(&[3, 8, 8], DType::F32).unwrap();
    assert_eq!(d.dims(), [1, 3, 8, 8]);
    let err = CpuBackend
        .tensor_descriptor(&[1, 2, 3, 4, 5], DType::F32)
        .unwrap_err();
    assert!(err.is_unsupported());
    let f = CpuBackend.filter_descriptor(&[16, 3, 3, 3], DType::F64).unwrap();
    assert_eq!(f.dims(), [16, 3, 3, 3]);
}

// =============================================================================
// Residency
// =============================================================================

#[test]
fn test_host_backend_leaves_destination_host_valid() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    assign(&mut out, (&a).matmul(&a).unwrap()).unwrap();
    assert_eq!(out.as_slice(), &[7.0, 10.0, 15.0, 22.0]);
    assert_eq!(counters().backend_dispatches, 1);
    assert_eq!(out.resident_on(), None);
}

#[test]
fn test_device_backend_marks_destination() {
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    let e = TemporaryBinaryExpr::new(&a, &a, MatMul::with_backend(PlaneBackend)).unwrap();
    assign(&mut out, e).unwrap();
    assert_eq!(out.resident_on(), Some("plane"));

    // host writes invalidate the mark
    assign(&mut out, &a).unwrap();
    assert_eq!(out.resident_on(), None);
}

#[test]
fn test_unforced_direct_evaluate_keeps_device_mark() {
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    let mut e = TemporaryBinaryExpr::new(&a, &a, MatMul::with_backend(PlaneBackend)).unwrap();
    e.direct_evaluate(&mut out).unwrap();
    assert_eq!(out.as_slice(), &[7.0, 10.0, 15.0, 22.0]);
    assert_eq!(e.result().resident_on(), Some("plane"));
    assert_eq!(out.resident_on(), Some("plane"));

    let mut host = TemporaryBinaryExpr::new(&a, &a, MatMul::new()).unwrap();
    host.direct_evaluate(&mut out).unwrap();
    assert_eq!(out.resident_on(), None);
}
