//! Generators: expressions without a shape of their own
//!
//! A generator produces a value for any index it is asked for. Its shape is
//! taken from the sibling operand in a binary node, or from the destination
//! when it is assigned directly.

use super::{Expr, MemoryRegion};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::simd::VectorMode;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::distr::Uniform;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Implements the shape and aliasing part of [`Expr`] common to generators
macro_rules! generator_shape {
    () => {
        fn static_dimensions() -> Option<usize> {
            Some(0)
        }

        fn static_size() -> Option<usize> {
            Some(0)
        }

        #[inline]
        fn dimensions(&self) -> usize {
            0
        }

        #[inline]
        fn dim(&self, _d: usize) -> usize {
            0
        }

        #[inline]
        fn size(&self) -> usize {
            0
        }

        fn overlaps(&self, _region: &MemoryRegion) -> bool {
            false
        }

        fn for_each_region(&self, _f: &mut dyn FnMut(&MemoryRegion)) {}
    };
}

/// Every element equals one value
#[derive(Copy, Clone, Debug)]
pub struct ConstantGenerator<T> {
    value: T,
}

impl<T: Element> ConstantGenerator<T> {
    /// Generator of `value`
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// The generated value
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Element> Expr for ConstantGenerator<T> {
    type Elem = T;

    const IS_FAST: bool = true;
    const IS_LINEAR: bool = true;
    const IS_GENERATOR: bool = true;

    fn vectorizable(_mode: VectorMode) -> bool {
        true
    }

    fn gpu_computable() -> bool {
        true
    }

    generator_shape!();

    #[inline]
    fn read_flat(&self, _i: usize) -> T {
        self.value
    }

    #[inline]
    fn at(&self, _coords: &[usize]) -> T {
        self.value
    }

    #[inline]
    fn load(&self, _i: usize, lanes: &mut [T]) {
        lanes.fill(self.value);
    }

    fn describe(&self) -> String {
        format!("constant({:?})", self.value)
    }
}

/// Distribution drawn by a [`RandomGenerator`]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Sampling {
    /// Normal distribution with the given mean and standard deviation
    Normal {
        /// Mean
        mean: f64,
        /// Standard deviation
        std: f64,
    },
    /// Uniform distribution over `[low, high)`
    Uniform {
        /// Inclusive lower bound
        low: f64,
        /// Exclusive upper bound
        high: f64,
    },
}

#[derive(Clone, Debug)]
enum Sampler {
    Normal(Normal<f64>),
    Uniform(Uniform<f64>),
}

impl Sampler {
    fn new(sampling: Sampling) -> Result<Self> {
        match sampling {
            Sampling::Normal { mean, std } => Normal::new(mean, std)
                .map(Self::Normal)
                .map_err(|e| Error::invalid_argument("std", e.to_string())),
            Sampling::Uniform { low, high } => Uniform::new(low, high)
                .map(Self::Uniform)
                .map_err(|e| Error::invalid_argument("high", e.to_string())),
        }
    }

    #[inline]
    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Normal(d) => d.sample(rng),
            Self::Uniform(d) => d.sample(rng),
        }
    }
}

/// Every read draws a fresh random value
///
/// The generator owns its random state, so reading it mutates hidden state:
/// it is not thread safe (parallel evaluation is never selected for an
/// expression containing one) and not vectorizable. Reads are not
/// repeatable; reading the same index twice yields two draws.
pub struct RandomGenerator<T> {
    sampling: Sampling,
    sampler: Sampler,
    rng: Mutex<StdRng>,
    _elem: std::marker::PhantomData<T>,
}

impl<T: Element> RandomGenerator<T> {
    /// Generator seeded from the thread-local entropy source
    pub fn new(sampling: Sampling) -> Result<Self> {
        Self::with_rng(sampling, StdRng::from_rng(&mut rand::rng()))
    }

    /// Generator with a reproducible sequence
    pub fn seeded(sampling: Sampling, seed: u64) -> Result<Self> {
        Self::with_rng(sampling, StdRng::seed_from_u64(seed))
    }

    /// Standard normal generator
    pub fn normal() -> Result<Self> {
        Self::new(Sampling::Normal {
            mean: 0.0,
            std: 1.0,
        })
    }

    /// Uniform generator over `[low, high)`
    pub fn uniform(low: f64, high: f64) -> Result<Self> {
        Self::new(Sampling::Uniform { low, high })
    }

    fn with_rng(sampling: Sampling, rng: StdRng) -> Result<Self> {
        Ok(Self {
            sampling,
            sampler: Sampler::new(sampling)?,
            rng: Mutex::new(rng),
            _elem: std::marker::PhantomData,
        })
    }

    /// The distribution drawn from
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    #[inline]
    fn draw(&self) -> T {
        let mut rng = self.rng.lock();
        T::from_f64(self.sampler.sample(&mut *rng))
    }
}

impl<T> Clone for RandomGenerator<T> {
    /// The clone continues from the same random state
    fn clone(&self) -> Self {
        Self {
            sampling: self.sampling,
            sampler: self.sampler.clone(),
            rng: Mutex::new(self.rng.lock().clone()),
            _elem: std::marker::PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RandomGenerator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomGenerator")
            .field("sampling", &self.sampling)
            .finish_non_exhaustive()
    }
}

impl<T: Element> Expr for RandomGenerator<T> {
    type Elem = T;

    const IS_FAST: bool = true;
    const IS_LINEAR: bool = true;
    const IS_GENERATOR: bool = true;
    const THREAD_SAFE: bool = false;

    fn vectorizable(_mode: VectorMode) -> bool {
        false
    }

    generator_shape!();

    #[inline]
    fn read_flat(&self, _i: usize) -> T {
        self.draw()
    }

    #[inline]
    fn at(&self, _coords: &[usize]) -> T {
        self.draw()
    }

    fn describe(&self) -> String {
        match self.sampling {
            Sampling::Normal { mean, std } => format!("normal({mean}, {std})"),
            Sampling::Uniform { low, high } => format!("uniform({low}, {high})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let g = ConstantGenerator::new(3i32);
        assert_eq!(g.read_flat(100), 3);
        assert_eq!(g.at(&[1, 2]), 3);
        assert_eq!(g.size(), 0);
        assert_eq!(g.dimensions(), 0);
        let mut lanes = [0; 4];
        g.load(0, &mut lanes);
        assert_eq!(lanes, [3; 4]);
        assert_eq!(g.describe(), "constant(3)");
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let a = RandomGenerator::<f64>::seeded(Sampling::Normal { mean: 1.0, std: 2.0 }, 7).unwrap();
        let b = RandomGenerator::<f64>::seeded(Sampling::Normal { mean: 1.0, std: 2.0 }, 7).unwrap();
        let xs: Vec<f64> = (0..16).map(|i| a.read_flat(i)).collect();
        let ys: Vec<f64> = (0..16).map(|i| b.read_flat(i)).collect();
        assert_eq!(xs, ys);
        assert!(xs.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_uniform_bounds() {
        let g = RandomGenerator::<f32>::seeded(Sampling::Uniform { low: -1.0, high: 1.0 }, 3).unwrap();
        assert!((0..256).map(|i| g.read_flat(i)).all(|v| (-1.0..1.0).contains(&v)));
    }

    #[test]
    fn test_invalid_distribution() {
        assert!(RandomGenerator::<f64>::uniform(1.0, 1.0).is_err());
        assert!(
            RandomGenerator::<f64>::new(Sampling::Normal {
                mean: 0.0,
                std: -1.0
            })
            .is_err()
        );
    }

    #[test]
    fn test_random_descriptor() {
        type G = RandomGenerator<f32>;
        assert!(G::IS_GENERATOR);
        assert!(!G::THREAD_SAFE);
        assert!(!G::vectorizable(VectorMode::Avx));
    }
}
