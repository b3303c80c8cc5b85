use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),
}

/// Number of rows drawn per trial: `floor(ratio * population)`, floored at
/// one row whenever the population is non-empty.
pub fn sample_size(population: usize, ratio: f64) -> Result<usize, ResampleError> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
        return Err(ResampleError::InvalidRatio(ratio));
    }
    if population == 0 {
        return Ok(0);
    }

    let size = (population as f64 * ratio).floor() as usize;
    Ok(size.clamp(1, population))
}

/// Draws the index prefix of a fresh uniform permutation on every call.
#[derive(Debug)]
pub struct Resampler {
    rng: StdRng,
    permutation: Vec<usize>,
    sample_size: usize,
}

impl Resampler {
    pub fn new(population: usize, ratio: f64, seed: u64) -> Result<Self, ResampleError> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            permutation: (0..population).collect(),
            sample_size: sample_size(population, ratio)?,
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn next_sample(&mut self) -> &[usize] {
        self.permutation.shuffle(&mut self.rng);
        &self.permutation[..self.sample_size]
    }
}
