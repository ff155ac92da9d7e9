//! Disturbance models that drive closed-loop simulations.

use ndarray::Array1;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Result, SlsError};

/// A source of per-step disturbance vectors.
///
/// Models are stateful streams: [`NoiseModel::next_noise`] yields the
/// disturbance for the current step and advances, while
/// [`NoiseModel::start_at_time`] rewinds or seeks so that a simulation
/// run can be repeated against the same disturbance realization.
pub trait NoiseModel {
    /// The length of each disturbance vector.
    fn dimension(&self) -> usize;

    /// Seek the stream so the next draw corresponds to step `t`.
    fn start_at_time(&mut self, t: usize) -> Result<()>;

    /// Draw the disturbance for the current step and advance.
    fn next_noise(&mut self) -> Result<Array1<f64>>;
}

/// The disturbance-free model: every draw is the zero vector.
#[derive(Clone, Copy, Debug)]
pub struct ZeroNoise {
    dimension: usize,
}

impl ZeroNoise {
    pub fn new(dimension: usize) -> Self {
        ZeroNoise { dimension }
    }
}

impl NoiseModel for ZeroNoise {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn start_at_time(&mut self, _t: usize) -> Result<()> {
        Ok(())
    }

    fn next_noise(&mut self) -> Result<Array1<f64>> {
        Ok(Array1::zeros(self.dimension))
    }
}

/// I.i.d. Gaussian disturbances, $w_i \sim \mathcal{N}(0, \sigma^2)$.
///
/// The generator is seeded so a simulation can be replayed: seeking with
/// [`NoiseModel::start_at_time`] restarts the stream from the seed and
/// skips ahead to the requested step.
#[derive(Clone, Debug)]
pub struct GaussianNoise {
    dimension: usize,
    normal: Normal<f64>,
    seed: u64,
    rng: StdRng,
}

impl GaussianNoise {
    pub fn new(dimension: usize, std_dev: f64, seed: u64) -> Result<Self> {
        let normal = Normal::new(0.0, std_dev).map_err(|e| SlsError::InvalidParameter {
            name: "std_dev",
            reason: e.to_string(),
        })?;
        Ok(GaussianNoise {
            dimension,
            normal,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl NoiseModel for GaussianNoise {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn start_at_time(&mut self, t: usize) -> Result<()> {
        self.rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..t {
            for _ in 0..self.dimension {
                self.normal.sample(&mut self.rng);
            }
        }
        Ok(())
    }

    fn next_noise(&mut self) -> Result<Array1<f64>> {
        Ok(Array1::from_iter(
            (0..self.dimension).map(|_| self.normal.sample(&mut self.rng)),
        ))
    }
}

/// A finite, pre-generated disturbance sequence indexed by time step.
///
/// The stored vectors can be filled from another model with
/// [`FixedNoiseVector::generate_from`] and then edited in place through
/// [`FixedNoiseVector::w_mut`], e.g. to inject an impulse at one state.
/// Draws past the final step are an error rather than a silent wrap.
///
/// # Examples
/// ```
/// use sls_sim::noise::{FixedNoiseVector, NoiseModel, ZeroNoise};
///
/// let mut noise = FixedNoiseVector::new(4, 10);
/// noise.generate_from(&mut ZeroNoise::new(4)).unwrap();
/// noise.w_mut(0)[4 / 2] = 10.0;
///
/// noise.start_at_time(0).unwrap();
/// assert_eq!(noise.next_noise().unwrap()[2], 10.0);
/// assert_eq!(noise.next_noise().unwrap()[2], 0.0);
/// ```
#[derive(Clone, Debug)]
pub struct FixedNoiseVector {
    w: Vec<Array1<f64>>,
    dimension: usize,
    cursor: usize,
}

impl FixedNoiseVector {
    /// Create an all-zero sequence of `horizon` vectors of length `nw`.
    pub fn new(nw: usize, horizon: usize) -> Self {
        FixedNoiseVector {
            w: (0..horizon).map(|_| Array1::zeros(nw)).collect(),
            dimension: nw,
            cursor: 0,
        }
    }

    /// The number of stored steps.
    pub fn horizon(&self) -> usize {
        self.w.len()
    }

    /// Fill every step by sampling `model` from its current position.
    pub fn generate_from(&mut self, model: &mut dyn NoiseModel) -> Result<()> {
        if model.dimension() != self.dimension {
            return Err(SlsError::DimensionMismatch {
                name: "noise source",
                expected: format!("dimension {}", self.dimension),
                actual: format!("dimension {}", model.dimension()),
            });
        }
        for step in self.w.iter_mut() {
            *step = model.next_noise()?;
        }
        Ok(())
    }

    /// The stored disturbance at step `t`.
    pub fn w(&self, t: usize) -> &Array1<f64> {
        &self.w[t]
    }

    /// Mutable access to the stored disturbance at step `t`.
    pub fn w_mut(&mut self, t: usize) -> &mut Array1<f64> {
        &mut self.w[t]
    }
}

impl NoiseModel for FixedNoiseVector {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn start_at_time(&mut self, t: usize) -> Result<()> {
        if t >= self.w.len() {
            return Err(SlsError::NoiseSeekOutOfRange {
                step: t,
                horizon: self.w.len(),
            });
        }
        self.cursor = t;
        Ok(())
    }

    fn next_noise(&mut self) -> Result<Array1<f64>> {
        let step = self.cursor;
        if step >= self.w.len() {
            return Err(SlsError::NoiseExhausted {
                step,
                horizon: self.w.len(),
            });
        }
        self.cursor += 1;
        Ok(self.w[step].clone())
    }
}
