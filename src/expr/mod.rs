//! Lazy expressions
//!
//! An expression is a value describing a computation over tensor-shaped data.
//! Building one computes nothing; elements are produced on demand through
//! [`Expr::read_flat`] (flat index), [`Expr::at`] (coordinates) or
//! [`Expr::load`] (a batch of consecutive elements). The assignment path in
//! [`crate::assign`] pulls every element exactly once into a destination.
//!
//! # Node kinds
//!
//! ```text
//! leaves        Tensor, FastMatrix, FastVector   (own memory, direct)
//! generators    ConstantGenerator, RandomGenerator (no shape of their own)
//! element-wise  UnaryExpr, BinaryExpr            (pure views, recomputed per read)
//! transformers  RepeatTransformer (RepR/RepL/DynRepR/DynRepL)
//! temporaries   TemporaryUnaryExpr, TemporaryBinaryExpr (materialize a result)
//! ```
//!
//! # Trait descriptor
//!
//! Every expression type carries associated constants (`IS_FAST`,
//! `IS_LINEAR`, `STORAGE_ORDER`, ...) describing it *as a type*. Composite
//! nodes derive theirs from their children at compile time; [`ExprTraits`]
//! collects them into a value for inspection and logging.
//!
//! # Evaluation order
//!
//! Temporaries must be allocated and evaluated before any parent reads them.
//! [`visitor::prepare`] runs the allocation pass and then the evaluation pass
//! over the tree, both in post-order, so inner temporaries always complete
//! before the temporaries that consume them.

mod binary;
mod builder;
mod generator;
mod leaf;
pub mod operators;
mod transform;
pub mod temporary;
pub mod visitor;
mod unary;

pub use binary::BinaryExpr;
pub use builder::ExprExt;
pub use generator::{ConstantGenerator, RandomGenerator, Sampling};
pub use temporary::{
    BinaryTemporaryOp, ForcedSlot, Lifecycle, ResultSlot, SharedSlot, TemporaryBinaryExpr,
    TemporaryUnaryExpr, UnaryTemporaryOp,
};
pub use transform::{
    DynRepL, DynRepR, DynRepeats, Left, R1, R2, R3, RepL, RepR, RepeatSide, RepeatSpec,
    RepeatTransformer, Repeats, Right, StaticRepeats,
};
pub use unary::UnaryExpr;
pub use visitor::{TemporaryNode, Visitor};

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::simd::VectorMode;
pub(crate) use crate::tensor::join_extents;
use crate::tensor::{Shape, StorageOrder, Tensor};
use std::fmt;

/// Capability surface shared by every expression node
///
/// The associated constants form the expression's trait descriptor: they are
/// fixed per type, never per instance. Run-time methods answer shape and
/// element queries for a particular instance.
pub trait Expr: Sync {
    /// Element type produced by the expression
    type Elem: Element;

    /// Shape fully known at compile time
    const IS_FAST: bool = false;
    /// Flat index `i` of the expression is element `i` of a linear traversal;
    /// such expressions may be evaluated in batches and in parallel
    const IS_LINEAR: bool;
    /// No intrinsic shape; the shape comes from a sibling operand
    const IS_GENERATOR: bool = false;
    /// Backed by contiguous memory that [`memory`](Self::memory) exposes
    const IS_DIRECT: bool = false;
    /// Materializes an intermediate result before it can be read
    const IS_TEMPORARY: bool = false;
    /// Implements [`evaluate_into`](Self::evaluate_into)
    const EVALUATES_INTO: bool = false;
    /// Reads from several threads on disjoint indices are safe
    const THREAD_SAFE: bool = true;
    /// Some node needs its result storage allocated before reads
    const NEEDS_TEMPORARY_VISITOR: bool = false;
    /// Some node needs its `evaluate` step run before reads
    const NEEDS_EVALUATOR_VISITOR: bool = false;
    /// Order of the flat index space
    const STORAGE_ORDER: StorageOrder = StorageOrder::RowMajor;

    /// Whether the expression can be evaluated in lane batches for `mode`
    fn vectorizable(mode: VectorMode) -> bool;

    /// Whether every node can run on a device backend
    fn gpu_computable() -> bool {
        false
    }

    /// Compile-time rank, for fast expressions
    fn static_dimensions() -> Option<usize> {
        None
    }

    /// Compile-time extent of dimension `d`, for fast expressions
    fn static_dim(_d: usize) -> Option<usize> {
        None
    }

    /// Compile-time element count, for fast expressions
    fn static_size() -> Option<usize> {
        None
    }

    /// Number of dimensions
    fn dimensions(&self) -> usize;

    /// Extent of dimension `d`
    fn dim(&self, d: usize) -> usize;

    /// Total number of elements
    fn size(&self) -> usize {
        (0..self.dimensions()).map(|d| self.dim(d)).product()
    }

    /// All extents
    fn shape(&self) -> Shape {
        (0..self.dimensions()).map(|d| self.dim(d)).collect()
    }

    /// Element at flat index `i` in [`STORAGE_ORDER`](Self::STORAGE_ORDER)
    fn read_flat(&self, i: usize) -> Self::Elem;

    /// Element at the given coordinates
    fn at(&self, coords: &[usize]) -> Self::Elem;

    /// Fill `lanes` with the elements starting at flat index `i`
    fn load(&self, i: usize, lanes: &mut [Self::Elem]) {
        for (k, v) in lanes.iter_mut().enumerate() {
            *v = self.read_flat(i + k);
        }
    }

    /// Contiguous memory backing the expression, when it is direct
    ///
    /// The slice bounds play the role of `memory_start()`/`memory_end()`.
    fn memory(&self) -> Option<&[Self::Elem]> {
        None
    }

    /// Whether any memory this expression reads overlaps `region`
    fn overlaps(&self, region: &MemoryRegion) -> bool;

    /// Call `f` with every memory region this expression reads
    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion));

    /// Whether this expression and `other` read or write overlapping memory
    fn alias<O: Expr>(&self, other: &O) -> bool
    where
        Self: Sized,
    {
        let mut hit = false;
        other.for_each_region(&mut |r| hit = hit || self.overlaps(r));
        hit
    }

    /// Post-order traversal reaching every owned temporary
    fn visit(&mut self, _visitor: &mut dyn Visitor) -> Result<()> {
        Ok(())
    }

    /// Compute the whole expression straight into `dest`
    ///
    /// Only expressions with [`EVALUATES_INTO`](Self::EVALUATES_INTO) support
    /// this; other expressions are assigned element by element.
    fn evaluate_into(&mut self, _dest: &mut Tensor<Self::Elem>) -> Result<()> {
        Err(Error::Internal(format!(
            "{} cannot be evaluated into a destination directly",
            self.describe()
        )))
    }

    /// Human-readable description of the expression tree
    fn describe(&self) -> String;
}

// ============================================================================
// Borrowed expressions
// ============================================================================

/// Containers are captured by reference: `&tensor` is an expression reading
/// the tensor in place.
///
/// A borrowed temporary cannot be visited (the visitor needs `&mut`) or
/// evaluated into a destination, so it must already be evaluated when the
/// enclosing expression is assigned.
impl<E: Expr> Expr for &E {
    type Elem = E::Elem;

    const IS_FAST: bool = E::IS_FAST;
    const IS_LINEAR: bool = E::IS_LINEAR;
    const IS_GENERATOR: bool = E::IS_GENERATOR;
    const IS_DIRECT: bool = E::IS_DIRECT;
    const IS_TEMPORARY: bool = E::IS_TEMPORARY;
    const THREAD_SAFE: bool = E::THREAD_SAFE;
    const NEEDS_TEMPORARY_VISITOR: bool = E::NEEDS_TEMPORARY_VISITOR;
    const NEEDS_EVALUATOR_VISITOR: bool = E::NEEDS_EVALUATOR_VISITOR;
    const STORAGE_ORDER: StorageOrder = E::STORAGE_ORDER;

    fn vectorizable(mode: VectorMode) -> bool {
        E::vectorizable(mode)
    }

    fn gpu_computable() -> bool {
        E::gpu_computable()
    }

    fn static_dimensions() -> Option<usize> {
        E::static_dimensions()
    }

    fn static_dim(d: usize) -> Option<usize> {
        E::static_dim(d)
    }

    fn static_size() -> Option<usize> {
        E::static_size()
    }

    #[inline]
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    #[inline]
    fn dim(&self, d: usize) -> usize {
        (**self).dim(d)
    }

    #[inline]
    fn size(&self) -> usize {
        (**self).size()
    }

    #[inline]
    fn read_flat(&self, i: usize) -> Self::Elem {
        (**self).read_flat(i)
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> Self::Elem {
        (**self).at(coords)
    }

    #[inline]
    fn load(&self, i: usize, lanes: &mut [Self::Elem]) {
        (**self).load(i, lanes)
    }

    fn memory(&self) -> Option<&[Self::Elem]> {
        (**self).memory()
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        (**self).overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        (**self).for_each_region(f)
    }

    fn alias<O: Expr>(&self, other: &O) -> bool {
        (**self).alias(other)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// Descriptor value
// ============================================================================

/// The trait descriptor of an expression type, as a value
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExprTraits {
    /// Shape known at compile time
    pub is_fast: bool,
    /// Safe to evaluate in batches and in parallel
    pub is_linear: bool,
    /// No intrinsic shape
    pub is_generator: bool,
    /// Backed by contiguous memory
    pub is_direct: bool,
    /// Materializes an intermediate result
    pub is_temporary: bool,
    /// Concurrent reads on disjoint indices are safe
    pub thread_safe: bool,
    /// Needs the allocation pass
    pub needs_temporary_visitor: bool,
    /// Needs the evaluation pass
    pub needs_evaluator_visitor: bool,
    /// Order of the flat index space
    pub storage_order: StorageOrder,
    /// Vectorizable for the mode the descriptor was taken for
    pub vectorizable: bool,
    /// Every node can run on a device backend
    pub gpu_computable: bool,
    /// Compile-time element count
    pub static_size: Option<usize>,
}

impl ExprTraits {
    /// Descriptor of `E`, with vectorizability resolved for `mode`
    pub fn of<E: Expr>(mode: VectorMode) -> Self {
        Self {
            is_fast: E::IS_FAST,
            is_linear: E::IS_LINEAR,
            is_generator: E::IS_GENERATOR,
            is_direct: E::IS_DIRECT,
            is_temporary: E::IS_TEMPORARY,
            thread_safe: E::THREAD_SAFE,
            needs_temporary_visitor: E::NEEDS_TEMPORARY_VISITOR,
            needs_evaluator_visitor: E::NEEDS_EVALUATOR_VISITOR,
            storage_order: E::STORAGE_ORDER,
            vectorizable: E::vectorizable(mode),
            gpu_computable: E::gpu_computable(),
            static_size: E::static_size(),
        }
    }

    /// Descriptor of the type of `expr`
    pub fn of_val<E: Expr>(_expr: &E, mode: VectorMode) -> Self {
        Self::of::<E>(mode)
    }
}

// ============================================================================
// Memory regions
// ============================================================================

/// Address range `[start, end)` of a contiguous buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    start: usize,
    end: usize,
}

impl MemoryRegion {
    /// Region covered by `slice`
    pub fn of<T>(slice: &[T]) -> Self {
        let range = slice.as_ptr_range();
        Self {
            start: range.start as usize,
            end: range.end as usize,
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for zero-length regions, which overlap nothing
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the two regions share at least one byte
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_overlap() {
        let data = [0.0f64; 8];
        let all = MemoryRegion::of(&data[..]);
        let head = MemoryRegion::of(&data[..4]);
        let tail = MemoryRegion::of(&data[4..]);
        assert!(all.overlaps(&head));
        assert!(all.overlaps(&tail));
        assert!(!head.overlaps(&tail));
        assert_eq!(all.len(), 64);
        assert!(!MemoryRegion::of(&data[2..2]).overlaps(&all));
    }
}
