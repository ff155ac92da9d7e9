//! Plant generators: parameterized families of $(A, B_2)$ pairs for
//! feeding [`crate::LtiSystemBuilder::dynamics`].

use ndarray::{Array1, Array2};
use ndarray_linalg::{c64, Eig, Scalar};
use rand::distributions::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};

use crate::error::{Result, SlsError};

/// A bidirectional averaging chain with doubly stochastic structure.
///
/// The dynamics couple each state to its chain neighbors:
/// $$ x\_{1,t+1} = \rho\[(1-\alpha)x\_{1,t} + \alpha x\_{2,t}\] $$
/// $$ x\_{i,t+1} = \rho\[\alpha x\_{i-1,t} + (1-2\alpha)x\_{i,t} + \alpha x\_{i+1,t}\] $$
/// $$ x\_{N,t+1} = \rho\[\alpha x\_{N-1,t} + (1-\alpha)x\_{N,t}\] $$
/// so every row and column of $A$ sums to $\rho$. Actuators are spread
/// along the chain with density `actuator_density`: actuator $k$ drives
/// state $\lfloor k / \text{density} \rfloor$ with unit gain.
///
/// # Examples
/// ```
/// use sls_sim::plant::DoublyStochasticChain;
///
/// let chain = DoublyStochasticChain { rho: 1.0, actuator_density: 1.0, alpha: 0.2 };
/// let (a_mat, b2_mat) = chain.generate(10).unwrap();
/// assert_eq!(a_mat.nrows(), 10);
/// assert_eq!(b2_mat.ncols(), 10);
/// assert!((a_mat.row(4).sum() - 1.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DoublyStochasticChain {
    /// Spectral radius of the generated $A$.
    pub rho: f64,
    /// Fraction of states carrying an actuator, in $(0, 1]$.
    pub actuator_density: f64,
    /// Neighbor coupling strength, in $[0, 1/2]$.
    pub alpha: f64,
}

impl DoublyStochasticChain {
    /// Generate the $(A, B_2)$ pair for an `nx`-state chain.
    pub fn generate(&self, nx: usize) -> Result<(Array2<f64>, Array2<f64>)> {
        validate_chain_size(nx)?;
        validate_density(self.actuator_density)?;
        validate_rho(self.rho)?;
        if !(0.0..=0.5).contains(&self.alpha) {
            return Err(SlsError::InvalidParameter {
                name: "alpha",
                reason: format!("{} not in [0, 1/2]", self.alpha),
            });
        }

        let alpha = self.alpha;
        let mut a_mat = Array2::from_diag(&Array1::from_elem(nx, 1.0 - 2.0 * alpha));
        a_mat[(0, 0)] += alpha;
        a_mat[(nx - 1, nx - 1)] += alpha;
        for i in 0..nx - 1 {
            a_mat[(i, i + 1)] = alpha;
            a_mat[(i + 1, i)] = alpha;
        }
        a_mat.mapv_inplace(|v| v * self.rho);

        Ok((a_mat, actuator_matrix(nx, self.actuator_density)))
    }
}

/// A chain with random neighbor couplings rescaled to spectral radius `rho`.
///
/// Couplings are drawn uniformly from $(0, 1)$ on the diagonal and both
/// off-diagonals, then the whole matrix is scaled by
/// $\rho / \rho(A\_{\text{raw}})$. Actuator placement follows the same
/// density rule as [`DoublyStochasticChain`]. Generation is deterministic
/// in `seed`.
#[derive(Clone, Copy, Debug)]
pub struct RandomChain {
    pub rho: f64,
    pub actuator_density: f64,
    pub seed: u64,
}

impl RandomChain {
    /// Generate the $(A, B_2)$ pair for an `nx`-state chain.
    pub fn generate(&self, nx: usize) -> Result<(Array2<f64>, Array2<f64>)> {
        validate_chain_size(nx)?;
        validate_density(self.actuator_density)?;
        validate_rho(self.rho)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let coupling = Uniform::new(0.0, 1.0);
        let mut a_mat = Array2::zeros((nx, nx));
        for i in 0..nx {
            a_mat[(i, i)] = coupling.sample(&mut rng);
        }
        for i in 0..nx - 1 {
            a_mat[(i, i + 1)] = coupling.sample(&mut rng);
            a_mat[(i + 1, i)] = coupling.sample(&mut rng);
        }

        let (eig_vals, _) = a_mat.eig()?;
        let spectral_radius = eig_vals.iter().map(|v: &c64| v.abs()).fold(0.0, f64::max);
        if spectral_radius == 0.0 {
            return Err(SlsError::InvalidParameter {
                name: "seed",
                reason: "sampled dynamics have zero spectral radius".into(),
            });
        }
        a_mat.mapv_inplace(|v| v * self.rho / spectral_radius);

        Ok((a_mat, actuator_matrix(nx, self.actuator_density)))
    }
}

/// Place `ceil(nx * density)` unit-gain actuators along the chain.
fn actuator_matrix(nx: usize, density: f64) -> Array2<f64> {
    let nu = (nx as f64 * density).ceil() as usize;
    let mut b2_mat = Array2::zeros((nx, nu));
    for k in 0..nu {
        let row = ((k as f64 / density).floor() as usize).min(nx - 1);
        b2_mat[(row, k)] = 1.0;
    }
    b2_mat
}

fn validate_chain_size(nx: usize) -> Result<()> {
    if nx < 2 {
        return Err(SlsError::InvalidParameter {
            name: "nx",
            reason: format!("chain needs at least 2 states, got {nx}"),
        });
    }
    Ok(())
}

fn validate_density(density: f64) -> Result<()> {
    if !(density > 0.0 && density <= 1.0) {
        return Err(SlsError::InvalidParameter {
            name: "actuator_density",
            reason: format!("{density} not in (0, 1]"),
        });
    }
    Ok(())
}

fn validate_rho(rho: f64) -> Result<()> {
    if !(rho.is_finite() && rho > 0.0) {
        return Err(SlsError::InvalidParameter {
            name: "rho",
            reason: format!("{rho} is not a positive finite spectral radius"),
        });
    }
    Ok(())
}
