//! Seedable random source shared by every randomized operation.

use rand::prelude::*;

/// Random number generator wrapper for tree construction and search.
///
/// One instance is threaded `&mut` through building, mutation, crossover,
/// selection and pheromone sampling, so seeding it once reproduces a run.
#[derive(Debug, Clone)]
pub struct GpRng {
    rng: StdRng,
}

impl GpRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create from an optional seed, falling back to entropy.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub(crate) fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform draw in `[0, 1)`.
    pub(crate) fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }
}

impl RngCore for GpRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
