//! Visitors over the temporaries of an expression tree
//!
//! [`Expr::visit`] walks the tree in post-order and hands every owned
//! temporary to a [`Visitor`]. Two passes prepare a tree for reading:
//!
//! 1. [`AllocateVisitor`] gives every unforced temporary its result storage
//! 2. [`EvaluateVisitor`] evaluates them, children before parents
//!
//! [`prepare`] runs both passes as required by the tree's descriptor.

use super::Expr;
use super::temporary::Lifecycle;
use crate::error::Result;

/// Object-safe view of a temporary expression used by visitors
pub trait TemporaryNode {
    /// Allocate result storage (no-op when present or forced)
    fn allocate_temporary(&mut self);

    /// Compute the result (no-op when already evaluated)
    fn evaluate(&mut self) -> Result<()>;

    /// Current lifecycle stage
    fn lifecycle(&self) -> Lifecycle;

    /// Description of the node, for diagnostics
    fn label(&self) -> String;
}

/// Callback invoked on every temporary of a tree, in post-order
pub trait Visitor {
    /// Handle one temporary
    fn visit_temporary(&mut self, node: &mut dyn TemporaryNode) -> Result<()>;
}

/// Allocation pass
#[derive(Debug, Default)]
pub struct AllocateVisitor {
    visited: usize,
}

impl AllocateVisitor {
    /// Temporaries seen so far
    pub fn visited(&self) -> usize {
        self.visited
    }
}

impl Visitor for AllocateVisitor {
    fn visit_temporary(&mut self, node: &mut dyn TemporaryNode) -> Result<()> {
        node.allocate_temporary();
        self.visited += 1;
        Ok(())
    }
}

/// Evaluation pass
#[derive(Debug, Default)]
pub struct EvaluateVisitor {
    evaluated: usize,
}

impl EvaluateVisitor {
    /// Temporaries that were not yet evaluated when visited
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }
}

impl Visitor for EvaluateVisitor {
    fn visit_temporary(&mut self, node: &mut dyn TemporaryNode) -> Result<()> {
        if node.lifecycle() != Lifecycle::Evaluated {
            node.evaluate()?;
            self.evaluated += 1;
        }
        Ok(())
    }
}

/// Allocate and evaluate every temporary of `expr`
///
/// Passes the descriptor says are unnecessary are skipped entirely.
pub fn prepare<E: Expr>(expr: &mut E) -> Result<()> {
    if E::NEEDS_TEMPORARY_VISITOR {
        let mut pass = AllocateVisitor::default();
        expr.visit(&mut pass)?;
        log::trace!("allocation pass reached {} temporaries", pass.visited());
    }
    if E::NEEDS_EVALUATOR_VISITOR {
        let mut pass = EvaluateVisitor::default();
        expr.visit(&mut pass)?;
        log::trace!("evaluation pass ran {} temporaries", pass.evaluated());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    struct Recorder(Vec<String>);

    impl Visitor for Recorder {
        fn visit_temporary(&mut self, node: &mut dyn TemporaryNode) -> Result<()> {
            self.0.push(node.label());
            Ok(())
        }
    }

    #[test]
    fn test_leaves_have_no_temporaries() {
        let mut t = Tensor::<f32>::zeros(&[3]);
        let mut rec = Recorder(Vec::new());
        t.visit(&mut rec).unwrap();
        assert!(rec.0.is_empty());
        prepare(&mut t).unwrap();
    }
}
