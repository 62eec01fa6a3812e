//! Integration tests for temporary expressions and their lifecycle

mod common;

use lazr::counters::counters;
use lazr::expr::{
    BinaryTemporaryOp, TemporaryBinaryExpr, TemporaryNode, TemporaryUnaryExpr, UnaryTemporaryOp,
    Visitor,
};
use lazr::prelude::*;
use lazr::tensor::Shape;

/// Running sum in flat order: element `i` depends on elements `0..=i`
#[derive(Copy, Clone, Debug)]
struct PrefixSum;

impl<A: Expr> UnaryTemporaryOp<A> for PrefixSum {
    fn desc(&self) -> &'static str {
        "prefix_sum"
    }

    fn shape(&self, a: &A) -> Shape {
        a.shape()
    }

    fn apply(&self, a: &A, out: &mut Tensor<A::Elem>) -> Result<()> {
        let mut acc = A::Elem::zero();
        for (i, v) in out.as_mut_slice().iter_mut().enumerate() {
            acc = acc + a.read_flat(i);
            *v = acc;
        }
        Ok(())
    }
}

/// `a[i] * b[i] + 1`
#[derive(Copy, Clone, Debug)]
struct FusedMulInc;

impl<A: Expr, B: Expr<Elem = A::Elem>> BinaryTemporaryOp<A, B> for FusedMulInc {
    fn desc(&self) -> &'static str {
        "fused_mul_inc"
    }

    fn shape(&self, a: &A, _b: &B) -> Shape {
        a.shape()
    }

    fn check(&self, a: &A, b: &B) -> Result<()> {
        if a.shape() != b.shape() {
            return Err(Error::shape_mismatch(a.shape().as_slice(), b.shape().as_slice()));
        }
        Ok(())
    }

    fn apply(&self, a: &A, b: &B, out: &mut Tensor<A::Elem>) -> Result<()> {
        for (i, v) in out.as_mut_slice().iter_mut().enumerate() {
            *v = a.read_flat(i) * b.read_flat(i) + A::Elem::one();
        }
        Ok(())
    }
}

struct Recorder(Vec<String>);

impl Visitor for Recorder {
    fn visit_temporary(&mut self, node: &mut dyn TemporaryNode) -> Result<()> {
        self.0.push(node.label());
        Ok(())
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_lifecycle_transitions() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0], &[3]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    assert_eq!(e.lifecycle(), Lifecycle::Unevaluated);
    assert!(!e.is_allocated());

    e.allocate_temporary();
    assert_eq!(e.lifecycle(), Lifecycle::Allocated);
    assert_eq!(counters().temporaries, 1);

    e.evaluate().unwrap();
    assert!(e.is_evaluated());
    assert_eq!(e.result().as_slice(), &[1.0, 3.0, 6.0]);
}

#[test]
#[should_panic(expected = "read before evaluate")]
fn test_result_before_evaluate_panics() {
    let a = Tensor::from_slice(&[1.0f32, 2.0], &[2]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    e.allocate_temporary();
    let _ = e.result();
}

#[test]
#[should_panic(expected = "before allocate_temporary")]
fn test_evaluate_before_allocate_panics() {
    let a = Tensor::from_slice(&[1i32, 2], &[2]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    let _ = e.evaluate();
}

#[test]
fn test_evaluate_is_idempotent() {
    common::setup();
    let a = Tensor::from_slice(&[1i64, 1, 1, 1], &[4]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    e.allocate_temporary();
    e.evaluate().unwrap();
    e.evaluate().unwrap();
    e.allocate_temporary();
    assert_eq!(e.result().as_slice(), &[1, 2, 3, 4]);
    assert_eq!(counters().evaluations, 1);
    assert_eq!(counters().temporaries, 1);
}

// =============================================================================
// Forced temporaries
// =============================================================================

#[test]
fn test_forced_binary_writes_destination() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0], &[3]);
    let b = Tensor::from_slice(&[4.0f64, 5.0, 6.0], &[3]);
    let mut dest = Tensor::<f64>::zeros(&[3]);
    {
        let mut e = TemporaryBinaryExpr::forced(&a, &b, FusedMulInc, &mut dest).unwrap();
        assert_eq!(e.lifecycle(), Lifecycle::Allocated);
        e.allocate_temporary();
        e.evaluate().unwrap();
        assert_eq!(e.read_flat(2), 19.0);
    }
    assert_eq!(dest.as_slice(), &[5.0, 11.0, 19.0]);
    assert_eq!(counters().temporaries, 0);
    assert_eq!(counters().evaluations, 1);
}

#[test]
fn test_forced_direct_evaluate_skips_allocation() {
    common::setup();
    let a = Tensor::from_slice(&[1i32, 2, 3], &[3]);
    let b = Tensor::from_slice(&[3i32, 2, 1], &[3]);
    let mut bound = Tensor::<i32>::zeros(&[3]);
    let mut dest = Tensor::<i32>::zeros(&[3]);
    {
        let mut e = TemporaryBinaryExpr::forced(&a, &b, FusedMulInc, &mut bound).unwrap();
        e.direct_evaluate(&mut dest).unwrap();
    }
    assert_eq!(dest.as_slice(), &[4, 5, 4]);
    assert_eq!(counters().temporaries, 0);
    assert_eq!(counters().direct_evaluations, 1);
}

#[test]
fn test_unforced_direct_evaluate_keeps_result() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0], &[3]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    let mut dest = Tensor::<f64>::zeros(&[3]);
    e.direct_evaluate(&mut dest).unwrap();
    assert_eq!(dest.as_slice(), &[1.0, 3.0, 6.0]);
    assert!(e.is_evaluated());
    assert_eq!(e.result().as_slice(), dest.as_slice());
    assert_eq!(counters().temporaries, 1);
}

#[test]
fn test_forced_destination_shape_checked() {
    let a = Tensor::from_slice(&[1.0f32, 2.0], &[2]);
    let mut dest = Tensor::<f32>::zeros(&[3]);
    let err = TemporaryBinaryExpr::forced(&a, &a, FusedMulInc, &mut dest).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
}

// =============================================================================
// Moves and sharing
// =============================================================================

#[test]
fn test_take_keeps_result_in_moved_expression() {
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut e = (&a).matmul(&a).unwrap();
    e.allocate_temporary();
    e.evaluate().unwrap();

    let moved = e.take();
    assert_eq!(e.lifecycle(), Lifecycle::Allocated);
    assert_eq!(moved.lifecycle(), Lifecycle::Evaluated);
    assert_eq!(moved.result().as_slice(), &[7.0, 10.0, 15.0, 22.0]);
}

#[test]
fn test_take_before_evaluate_keeps_stage() {
    let a = Tensor::from_slice(&[2i32, 3], &[2]);
    let mut e = TemporaryUnaryExpr::new(&a, PrefixSum).unwrap();
    let mut moved = e.take();
    assert_eq!(e.lifecycle(), Lifecycle::Unevaluated);
    assert_eq!(moved.lifecycle(), Lifecycle::Unevaluated);
    moved.allocate_temporary();
    moved.evaluate().unwrap();
    assert_eq!(moved.result().as_slice(), &[2, 5]);
}

#[test]
fn test_clones_share_one_evaluation() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f32, 2.0], &[2]);
    let b = Tensor::from_slice(&[3.0f32, 4.0], &[2]);
    let e = (&a).outer(&b).unwrap();
    let mut first = e.clone();
    let mut second = e.clone();

    first.allocate_temporary();
    first.evaluate().unwrap();
    second.allocate_temporary();
    second.evaluate().unwrap();

    assert_eq!(second.result().as_slice(), &[3.0, 4.0, 6.0, 8.0]);
    assert_eq!(counters().temporaries, 1);
    assert_eq!(counters().evaluations, 1);
}

// =============================================================================
// Aliasing and traversal
// =============================================================================

#[test]
fn test_binary_alias_is_union_of_operands() {
    let a = Tensor::from_slice(&[1.0f64, 2.0], &[2]);
    let b = Tensor::from_slice(&[3.0f64, 4.0], &[2]);
    let c = Tensor::from_slice(&[5.0f64, 6.0], &[2]);
    let e = TemporaryBinaryExpr::new(&a, &b, FusedMulInc).unwrap();
    assert!(e.alias(&&a));
    assert!(e.alias(&&b));
    assert!(!e.alias(&&c));
    assert!(e.alias(&(&c).add(&b).unwrap()));
}

#[test]
fn test_nested_temporaries_visited_in_post_order() {
    let a = Tensor::from_slice(&[1.0f64, 0.0, 0.0, 1.0], &[2, 2]);
    let b = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let inner = (&a).matmul(&b).unwrap();
    let mut outer = TemporaryUnaryExpr::new(inner.neg(), PrefixSum).unwrap();

    let mut rec = Recorder(Vec::new());
    outer.visit(&mut rec).unwrap();
    assert_eq!(
        rec.0,
        vec![
            "matmul(tensor[2x2], tensor[2x2])".to_string(),
            "prefix_sum(-(matmul(tensor[2x2], tensor[2x2])))".to_string(),
        ]
    );
}

#[test]
fn test_nested_temporaries_evaluate_children_first() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 0.0, 0.0, 1.0], &[2, 2]);
    let b = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let e = TemporaryUnaryExpr::new((&a).matmul(&b).unwrap(), PrefixSum).unwrap();

    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    assign(&mut out, (&a).matmul(&b).unwrap().sub(e).unwrap()).unwrap();
    // b - prefix_sum(b)
    assert_eq!(out.as_slice(), &[0.0, -1.0, -3.0, -6.0]);
    assert_eq!(counters().evaluations, 3);
}

#[test]
fn test_temporary_root_evaluates_into_destination() {
    common::setup();
    let x = Tensor::from_slice(&[1.0f32, 2.0, 3.0], &[3]);
    let k = Tensor::from_slice(&[1.0f32, 1.0], &[2]);
    let mut out = Tensor::<f32>::zeros(&[4]);
    assign(&mut out, (&x).conv1d_full(&k).unwrap()).unwrap();
    assert_eq!(out.as_slice(), &[1.0, 3.0, 5.0, 3.0]);
    assert_eq!(counters().direct_evaluations, 1);
    assert_eq!(counters().temporaries, 0);
}

#[test]
#[should_panic(expected = "read before evaluate")]
fn test_assign_unevaluated_borrowed_temporary_panics() {
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let e = (&a).matmul(&a).unwrap();
    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    let _ = assign(&mut out, &e);
}

#[test]
fn test_assign_evaluated_borrowed_temporary() {
    common::setup();
    let a = Tensor::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[2, 2]);
    let mut e = (&a).matmul(&a).unwrap();
    e.allocate_temporary();
    e.evaluate().unwrap();

    let mut out = Tensor::<f64>::zeros(&[2, 2]);
    assign(&mut out, &e).unwrap();
    assert_eq!(out.as_slice(), &[7.0, 10.0, 15.0, 22.0]);
    assert_eq!(counters().direct_evaluations, 0);
    assert_eq!(counters().evaluations, 1);
}
