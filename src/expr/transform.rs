//! Repeat transformers
//!
//! A repeat transformer presents its sub-expression repeated along new
//! dimensions without copying it. `rep_l` prepends the new dimensions,
//! `rep_r` appends them:
//!
//! ```text
//! sub shape [2, 2], repeats [3]
//!   rep_l -> [3, 2, 2]   coords (r, i, j) read sub(i, j)
//!   rep_r -> [2, 2, 3]   coords (i, j, r) read sub(i, j)
//! ```
//!
//! In row-major order the prepended dimensions vary slowest, so flat index
//! `i` of a `rep_l` view reads sub element `i % sub_size`, while the appended
//! dimensions of `rep_r` vary fastest and flat index `i` reads sub element
//! `i / product(repeats)`. Column-major subs swap the two rules.
//!
//! Repeat counts are either part of the type ([`StaticRepeats`], which keeps
//! the view fast when the sub is fast) or supplied at construction
//! ([`DynRepeats`], which caches the product of the counts).

use super::{Expr, MemoryRegion, Visitor, join_extents};
use crate::error::Result;
use crate::simd::VectorMode;
use crate::tensor::{Shape, StorageOrder};
use std::marker::PhantomData;

/// Side on which a transformer adds its dimensions
pub trait RepeatSide: Copy + Default + Send + Sync + 'static {
    /// Name used in descriptions
    const NAME: &'static str;
    /// New dimensions come before the sub-expression's dimensions
    const PREPENDS: bool;
}

/// New dimensions are prepended
#[derive(Copy, Clone, Debug, Default)]
pub struct Left;

/// New dimensions are appended
#[derive(Copy, Clone, Debug, Default)]
pub struct Right;

impl RepeatSide for Left {
    const NAME: &'static str = "rep_l";
    const PREPENDS: bool = true;
}

impl RepeatSide for Right {
    const NAME: &'static str = "rep_r";
    const PREPENDS: bool = false;
}

const fn slice_product(values: &[usize]) -> usize {
    let mut product = 1;
    let mut i = 0;
    while i < values.len() {
        product *= values[i];
        i += 1;
    }
    product
}

/// Compile-time list of repeat counts
pub trait RepeatSpec: Send + Sync + 'static {
    /// The repeat counts, outermost first
    const REPEATS: &'static [usize];
    /// Product of the repeat counts
    const PRODUCT: usize = slice_product(Self::REPEATS);
}

/// One repeated dimension
#[derive(Copy, Clone, Debug, Default)]
pub struct R1<const A: usize>;

/// Two repeated dimensions
#[derive(Copy, Clone, Debug, Default)]
pub struct R2<const A: usize, const B: usize>;

/// Three repeated dimensions
#[derive(Copy, Clone, Debug, Default)]
pub struct R3<const A: usize, const B: usize, const C: usize>;

impl<const A: usize> RepeatSpec for R1<A> {
    const REPEATS: &'static [usize] = &[A];
}

impl<const A: usize, const B: usize> RepeatSpec for R2<A, B> {
    const REPEATS: &'static [usize] = &[A, B];
}

impl<const A: usize, const B: usize, const C: usize> RepeatSpec for R3<A, B, C> {
    const REPEATS: &'static [usize] = &[A, B, C];
}

/// Repeat counts held by a transformer
pub trait Repeats: Clone + Send + Sync + 'static {
    /// Counts are known at compile time
    const IS_STATIC: bool;

    /// The counts, when known at compile time
    fn static_repeats() -> Option<&'static [usize]>;

    /// The counts
    fn as_slice(&self) -> &[usize];

    /// Product of the counts
    fn product(&self) -> usize;
}

/// Counts fixed by a [`RepeatSpec`]
#[derive(Debug, Default)]
pub struct StaticRepeats<S>(PhantomData<S>);

impl<S> Clone for StaticRepeats<S> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<S: RepeatSpec> Repeats for StaticRepeats<S> {
    const IS_STATIC: bool = true;

    fn static_repeats() -> Option<&'static [usize]> {
        Some(S::REPEATS)
    }

    #[inline]
    fn as_slice(&self) -> &[usize] {
        S::REPEATS
    }

    #[inline]
    fn product(&self) -> usize {
        S::PRODUCT
    }
}

/// `D` counts supplied at run time
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DynRepeats<const D: usize> {
    reps: [usize; D],
    product: usize,
}

impl<const D: usize> DynRepeats<D> {
    /// Counts `reps`, outermost first
    pub fn new(reps: [usize; D]) -> Self {
        Self {
            reps,
            product: slice_product(&reps),
        }
    }
}

impl<const D: usize> Repeats for DynRepeats<D> {
    const IS_STATIC: bool = false;

    fn static_repeats() -> Option<&'static [usize]> {
        None
    }

    #[inline]
    fn as_slice(&self) -> &[usize] {
        &self.reps
    }

    #[inline]
    fn product(&self) -> usize {
        self.product
    }
}

/// View of `sub` repeated along new dimensions
#[derive(Clone, Debug)]
pub struct RepeatTransformer<E, S, R> {
    sub: E,
    repeats: R,
    _side: PhantomData<S>,
}

/// Appends compile-time repeat dimensions
pub type RepR<E, S> = RepeatTransformer<E, Right, StaticRepeats<S>>;
/// Prepends compile-time repeat dimensions
pub type RepL<E, S> = RepeatTransformer<E, Left, StaticRepeats<S>>;
/// Appends `D` run-time repeat dimensions
pub type DynRepR<E, const D: usize> = RepeatTransformer<E, Right, DynRepeats<D>>;
/// Prepends `D` run-time repeat dimensions
pub type DynRepL<E, const D: usize> = RepeatTransformer<E, Left, DynRepeats<D>>;

impl<E: Expr, S: RepeatSide, Sp: RepeatSpec> RepeatTransformer<E, S, StaticRepeats<Sp>> {
    /// Repeat `sub` by the counts of `Sp`
    pub fn new_static(sub: E) -> Self {
        Self::with_repeats(sub, StaticRepeats(PhantomData))
    }
}

impl<E: Expr, S: RepeatSide, const D: usize> RepeatTransformer<E, S, DynRepeats<D>> {
    /// Repeat `sub` by `reps`
    pub fn new(sub: E, reps: [usize; D]) -> Self {
        Self::with_repeats(sub, DynRepeats::new(reps))
    }
}

impl<E: Expr, S: RepeatSide, R: Repeats> RepeatTransformer<E, S, R> {
    fn with_repeats(sub: E, repeats: R) -> Self {
        Self {
            sub,
            repeats,
            _side: PhantomData,
        }
    }

    /// The repeated expression
    pub fn sub(&self) -> &E {
        &self.sub
    }

    /// The repeat counts
    pub fn repeats(&self) -> &[usize] {
        self.repeats.as_slice()
    }

    /// Flat index of the sub element read at flat index `i`
    ///
    /// Over a row-major sub, `rep_l` reads `i % sub.size()` and `rep_r` reads
    /// `i / product(reps)`. A column-major sub swaps the two rules: its first
    /// axis varies fastest, so the repeated axes added by `rep_l` become the
    /// slowest and those added by `rep_r` the fastest. Flat reads then agree
    /// with [`at`](Expr::at) for either order.
    #[inline]
    pub fn sub_index(&self, i: usize) -> usize {
        debug_assert!(i < self.size(), "index {i} out of range for {}", self.describe());
        let sub_varies_fastest = S::PREPENDS == (E::STORAGE_ORDER == StorageOrder::RowMajor);
        if sub_varies_fastest {
            i % self.sub.size()
        } else {
            i / self.repeats.product()
        }
    }

    #[inline]
    fn sub_coords<'c>(&self, coords: &'c [usize]) -> &'c [usize] {
        debug_assert_eq!(coords.len(), self.dimensions());
        let added = self.repeats.as_slice().len();
        if S::PREPENDS {
            &coords[added..]
        } else {
            &coords[..coords.len() - added]
        }
    }
}

impl<E: Expr, S: RepeatSide, R: Repeats> Expr for RepeatTransformer<E, S, R> {
    type Elem = E::Elem;

    const IS_FAST: bool = E::IS_FAST && R::IS_STATIC;
    const IS_LINEAR: bool = false;
    const IS_GENERATOR: bool = E::IS_GENERATOR;
    const THREAD_SAFE: bool = E::THREAD_SAFE;
    const NEEDS_TEMPORARY_VISITOR: bool = E::NEEDS_TEMPORARY_VISITOR;
    const NEEDS_EVALUATOR_VISITOR: bool = E::NEEDS_EVALUATOR_VISITOR;
    const STORAGE_ORDER: StorageOrder = E::STORAGE_ORDER;

    fn vectorizable(_mode: VectorMode) -> bool {
        false
    }

    fn static_dimensions() -> Option<usize> {
        match (E::static_dimensions(), R::static_repeats()) {
            (Some(d), Some(reps)) if Self::IS_FAST => Some(d + reps.len()),
            _ => None,
        }
    }

    fn static_dim(d: usize) -> Option<usize> {
        let reps = R::static_repeats().filter(|_| Self::IS_FAST)?;
        let sub_dims = E::static_dimensions()?;
        if S::PREPENDS {
            if d < reps.len() {
                Some(reps[d])
            } else {
                E::static_dim(d - reps.len())
            }
        } else if d < sub_dims {
            E::static_dim(d)
        } else {
            reps.get(d - sub_dims).copied()
        }
    }

    fn static_size() -> Option<usize> {
        match (E::static_size(), R::static_repeats()) {
            (Some(n), Some(reps)) if Self::IS_FAST => Some(n * slice_product(reps)),
            _ => None,
        }
    }

    #[inline]
    fn dimensions(&self) -> usize {
        self.sub.dimensions() + self.repeats.as_slice().len()
    }

    fn shape(&self) -> Shape {
        Shape::repeated(&self.sub.shape(), self.repeats.as_slice(), S::PREPENDS)
    }

    fn dim(&self, d: usize) -> usize {
        let reps = self.repeats.as_slice();
        if S::PREPENDS {
            if d < reps.len() {
                reps[d]
            } else {
                self.sub.dim(d - reps.len())
            }
        } else {
            let sub_dims = self.sub.dimensions();
            if d < sub_dims {
                self.sub.dim(d)
            } else {
                reps[d - sub_dims]
            }
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.sub.size() * self.repeats.product()
    }

    #[inline]
    fn read_flat(&self, i: usize) -> Self::Elem {
        self.sub.read_flat(self.sub_index(i))
    }

    #[inline]
    fn at(&self, coords: &[usize]) -> Self::Elem {
        self.sub.at(self.sub_coords(coords))
    }

    fn overlaps(&self, region: &MemoryRegion) -> bool {
        self.sub.overlaps(region)
    }

    fn for_each_region(&self, f: &mut dyn FnMut(&MemoryRegion)) {
        self.sub.for_each_region(f)
    }

    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        self.sub.visit(visitor)
    }

    fn describe(&self) -> String {
        format!(
            "{}[{}]({})",
            S::NAME,
            join_extents(self.repeats.as_slice(), ","),
            self.sub.describe()
        )
    }
}
