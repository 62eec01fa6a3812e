//! Per-axis extents of an expression

use smallvec::SmallVec;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;

/// Ranks up to this stay inline; repeats of a matrix already reach four
pub(crate) const STACK_DIMS: usize = 4;

/// Extents of every axis, outermost first
///
/// `Display` renders the form used in expression descriptions (`2x3x4`).
#[derive(Clone, PartialEq, Eq, Default, Hash)]
pub struct Shape(SmallVec<[usize; STACK_DIMS]>);

impl Shape {
    /// Rank-0 shape (one element)
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Shape of `sub` repeated by `reps`
    ///
    /// `prepend` places the repeat axes before the sub's axes (`rep_l`);
    /// otherwise they follow them (`rep_r`).
    pub fn repeated(sub: &[usize], reps: &[usize], prepend: bool) -> Self {
        let (head, tail) = if prepend { (reps, sub) } else { (sub, reps) };
        head.iter().chain(tail).copied().collect()
    }

    /// Append an innermost axis
    pub fn push(&mut self, dim: usize) {
        self.0.push(dim);
    }

    /// Extents as a slice
    pub fn as_slice(&self) -> &[usize] {
        self.0.as_slice()
    }

    /// Rank
    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements (1 for rank 0)
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Whether `other` names the same extents, whatever its container
    pub fn matches(&self, other: &[usize]) -> bool {
        self.as_slice() == other
    }
}

/// Join extents with `sep` for expression descriptions
pub(crate) fn join_extents(extents: &[usize], sep: &str) -> String {
    extents
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_extents(self, "x"))
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        self.0.as_slice()
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self(value.iter().copied().collect())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.into_iter().collect())
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
