//! Common test utilities
#![allow(dead_code)]

use lazr::counters::reset_counters;
use lazr::tensor::Tensor;

/// Route `log` output through the test harness and zero this thread's counters
pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
    reset_counters();
}

/// Row-major tensor holding `0, 1, 2, ...`
pub fn ramp(shape: &[usize]) -> Tensor<f64> {
    let n: usize = shape.iter().product();
    Tensor::from_vec((0..n).map(|v| v as f64).collect(), shape).unwrap()
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
