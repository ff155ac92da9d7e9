//! Discrete-time LTI plant model used for synthesis and simulation.
//!
//! The plant is
//! $$ x\_{t+1} = A x\_t + B\_1 w\_t + B\_2 u\_t $$
//! $$ z\_t = C\_1 x\_t + D\_{12} u\_t $$
//! $$ y\_t = C\_2 x\_t + D\_{21} w\_t $$
//! with state $x$, disturbance $w$, actuation $u$, regulated output $z$,
//! and measurement $y$. All matrices are supplied through
//! [`LtiSystemBuilder`] and validated once at construction.

use ndarray::{Array1, Array2};

use crate::error::{shape_of, Result, SlsError};
use crate::noise::NoiseModel;

/// A discrete-time LTI system with remembered initial state and an
/// optional attached disturbance source.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use sls_sim::LtiSystem;
///
/// let sys = LtiSystem::builder(2, 2)
///     .dynamics(array![[1., 0.1], [0., 1.]], array![[0.], [1.]])
///     .build()
///     .unwrap();
/// assert_eq!(sys.nx(), 2);
/// assert_eq!(sys.nu(), 1);
/// assert_eq!(sys.nz(), 0);
/// ```
pub struct LtiSystem {
    a_mat: Array2<f64>,
    b1_mat: Array2<f64>,
    b2_mat: Array2<f64>,
    c1_mat: Array2<f64>,
    d12_mat: Array2<f64>,
    c2_mat: Array2<f64>,
    d21_mat: Array2<f64>,
    x0: Array1<f64>,
    state: Array1<f64>,
    noise: Option<Box<dyn NoiseModel>>,
}

impl LtiSystem {
    /// Start describing a system with `nx` states and `nw` disturbances.
    pub fn builder(nx: usize, nw: usize) -> LtiSystemBuilder {
        LtiSystemBuilder {
            nx,
            nw,
            a_mat: None,
            b2_mat: None,
            b1_mat: None,
            performance: None,
            measurement: None,
        }
    }

    pub fn nx(&self) -> usize {
        self.a_mat.ncols()
    }

    pub fn nu(&self) -> usize {
        self.b2_mat.ncols()
    }

    pub fn nw(&self) -> usize {
        self.b1_mat.ncols()
    }

    /// Rows of the regulated output $z$.
    pub fn nz(&self) -> usize {
        self.c1_mat.nrows()
    }

    /// Rows of the measurement $y$.
    pub fn ny(&self) -> usize {
        self.c2_mat.nrows()
    }

    pub fn a(&self) -> &Array2<f64> {
        &self.a_mat
    }

    pub fn b1(&self) -> &Array2<f64> {
        &self.b1_mat
    }

    pub fn b2(&self) -> &Array2<f64> {
        &self.b2_mat
    }

    pub fn c1(&self) -> &Array2<f64> {
        &self.c1_mat
    }

    pub fn d12(&self) -> &Array2<f64> {
        &self.d12_mat
    }

    /// The current simulation state.
    pub fn state(&self) -> &Array1<f64> {
        &self.state
    }

    /// Reset the simulation state.
    ///
    /// With `Some(x0)` the initial state is validated, remembered, and
    /// applied; with `None` the previously remembered initial state is
    /// reused (the zero vector if none was ever supplied).
    pub fn initialize(&mut self, x0: Option<&Array1<f64>>) -> Result<()> {
        if let Some(x0) = x0 {
            if x0.len() != self.nx() {
                return Err(SlsError::DimensionMismatch {
                    name: "x0",
                    expected: format!("length {}", self.nx()),
                    actual: format!("length {}", x0.len()),
                });
            }
            self.x0 = x0.clone();
        }
        self.state = self.x0.clone();
        Ok(())
    }

    /// Attach the disturbance source sampled by [`LtiSystem::draw_noise`].
    pub fn use_noise_model(&mut self, noise: Box<dyn NoiseModel>) -> Result<()> {
        if noise.dimension() != self.nw() {
            return Err(SlsError::DimensionMismatch {
                name: "noise model",
                expected: format!("dimension {}", self.nw()),
                actual: format!("dimension {}", noise.dimension()),
            });
        }
        self.noise = Some(noise);
        Ok(())
    }

    /// The attached disturbance source, e.g. for seeking between runs.
    pub fn noise_model_mut(&mut self) -> Option<&mut (dyn NoiseModel + 'static)> {
        self.noise.as_deref_mut()
    }

    /// Draw the disturbance for the current step.
    ///
    /// Zero when no noise model is attached.
    pub fn draw_noise(&mut self) -> Result<Array1<f64>> {
        match &mut self.noise {
            Some(model) => model.next_noise(),
            None => Ok(Array1::zeros(self.nw())),
        }
    }

    /// Evaluate the measurement $y = C_2 x + D_{21} w$ at the current state.
    pub fn measure(&self, w: &Array1<f64>) -> Array1<f64> {
        self.c2_mat.dot(&self.state) + self.d21_mat.dot(w)
    }

    /// Evaluate the regulated output $z = C_1 x + D_{12} u$ at the current state.
    pub fn performance(&self, u: &Array1<f64>) -> Array1<f64> {
        self.c1_mat.dot(&self.state) + self.d12_mat.dot(u)
    }

    /// Advance one sample: $x \gets A x + B_1 w + B_2 u$.
    pub fn step(&mut self, u: &Array1<f64>, w: &Array1<f64>) {
        self.state = self.a_mat.dot(&self.state) + self.b1_mat.dot(w) + self.b2_mat.dot(u);
    }
}

/// Builder validating an [`LtiSystem`] description.
///
/// `dynamics` is mandatory. `disturbance` defaults to $B_1 = I$ when the
/// disturbance and state dimensions agree; `performance` defaults to an
/// empty regulated output; `measurement` defaults to full state
/// observation, $y = x$.
pub struct LtiSystemBuilder {
    nx: usize,
    nw: usize,
    a_mat: Option<Array2<f64>>,
    b2_mat: Option<Array2<f64>>,
    b1_mat: Option<Array2<f64>>,
    performance: Option<(Array2<f64>, Array2<f64>)>,
    measurement: Option<(Array2<f64>, Array2<f64>)>,
}

impl LtiSystemBuilder {
    /// Set the state and actuation matrices $A$ and $B_2$.
    pub fn dynamics(mut self, a_mat: Array2<f64>, b2_mat: Array2<f64>) -> Self {
        self.a_mat = Some(a_mat);
        self.b2_mat = Some(b2_mat);
        self
    }

    /// Set the disturbance matrix $B_1$.
    pub fn disturbance(mut self, b1_mat: Array2<f64>) -> Self {
        self.b1_mat = Some(b1_mat);
        self
    }

    /// Set the regulated output matrices $C_1$ and $D_{12}$.
    pub fn performance(mut self, c1_mat: Array2<f64>, d12_mat: Array2<f64>) -> Self {
        self.performance = Some((c1_mat, d12_mat));
        self
    }

    /// Set the measurement matrices $C_2$ and $D_{21}$.
    pub fn measurement(mut self, c2_mat: Array2<f64>, d21_mat: Array2<f64>) -> Self {
        self.measurement = Some((c2_mat, d21_mat));
        self
    }

    pub fn build(self) -> Result<LtiSystem> {
        let nx = self.nx;
        let nw = self.nw;
        let a_mat = self.a_mat.ok_or(SlsError::MissingSystemData("A"))?;
        let b2_mat = self.b2_mat.ok_or(SlsError::MissingSystemData("B2"))?;
        expect_shape("A", &a_mat, nx, nx)?;
        if b2_mat.nrows() != nx {
            return Err(SlsError::DimensionMismatch {
                name: "B2",
                expected: format!("{nx} rows"),
                actual: format!("{} rows", b2_mat.nrows()),
            });
        }
        let nu = b2_mat.ncols();

        let b1_mat = match self.b1_mat {
            Some(b1_mat) => {
                expect_shape("B1", &b1_mat, nx, nw)?;
                b1_mat
            }
            None if nw == nx => Array2::eye(nx),
            None => return Err(SlsError::MissingSystemData("B1")),
        };

        let (c1_mat, d12_mat) = match self.performance {
            Some((c1_mat, d12_mat)) => {
                let nz = c1_mat.nrows();
                expect_shape("C1", &c1_mat, nz, nx)?;
                expect_shape("D12", &d12_mat, nz, nu)?;
                (c1_mat, d12_mat)
            }
            None => (Array2::zeros((0, nx)), Array2::zeros((0, nu))),
        };

        let (c2_mat, d21_mat) = match self.measurement {
            Some((c2_mat, d21_mat)) => {
                let ny = c2_mat.nrows();
                expect_shape("C2", &c2_mat, ny, nx)?;
                expect_shape("D21", &d21_mat, ny, nw)?;
                (c2_mat, d21_mat)
            }
            None => (Array2::eye(nx), Array2::zeros((nx, nw))),
        };

        Ok(LtiSystem {
            a_mat,
            b1_mat,
            b2_mat,
            c1_mat,
            d12_mat,
            c2_mat,
            d21_mat,
            x0: Array1::zeros(nx),
            state: Array1::zeros(nx),
            noise: None,
        })
    }
}

fn expect_shape(name: &'static str, mat: &Array2<f64>, rows: usize, cols: usize) -> Result<()> {
    if mat.nrows() != rows || mat.ncols() != cols {
        return Err(SlsError::DimensionMismatch {
            name,
            expected: shape_of(rows, cols),
            actual: shape_of(mat.nrows(), mat.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{FixedNoiseVector, NoiseModel, ZeroNoise};
    use ndarray::array;

    fn double_integrator() -> LtiSystem {
        LtiSystem::builder(2, 2)
            .dynamics(array![[1., 0.1], [0., 1.]], array![[0.], [1.]])
            .performance(
                array![[1., 0.], [0., 1.], [0., 0.]],
                array![[0.], [0.], [1.]],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let sys = double_integrator();
        assert_eq!(sys.nx(), 2);
        assert_eq!(sys.nu(), 1);
        assert_eq!(sys.nw(), 2);
        assert_eq!(sys.nz(), 3);
        assert_eq!(sys.ny(), 2);
    }

    #[test]
    fn test_default_b1_is_identity() {
        let sys = double_integrator();
        assert_eq!(sys.b1(), &Array2::eye(2));
    }

    #[test]
    fn test_b1_required_when_not_square() {
        let result = LtiSystem::builder(2, 1)
            .dynamics(array![[1., 0.1], [0., 1.]], array![[0.], [1.]])
            .build();
        assert!(matches!(result, Err(SlsError::MissingSystemData("B1"))));
    }

    #[test]
    fn test_rejects_nonsquare_a() {
        let result = LtiSystem::builder(2, 2)
            .dynamics(array![[1., 0.1]], array![[0.], [1.]])
            .build();
        assert!(matches!(result, Err(SlsError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_rejects_mismatched_performance_rows() {
        let result = LtiSystem::builder(2, 2)
            .dynamics(array![[1., 0.1], [0., 1.]], array![[0.], [1.]])
            .performance(array![[1., 0.]], array![[0.], [1.]])
            .build();
        assert!(matches!(result, Err(SlsError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_step_and_outputs() {
        let mut sys = double_integrator();
        sys.initialize(Some(&array![1., 0.])).unwrap();
        let w = array![0., 0.];
        assert_eq!(sys.measure(&w), array![1., 0.]);
        assert_eq!(sys.performance(&array![2.]), array![1., 0., 2.]);
        sys.step(&array![1.], &array![0.5, 0.]);
        assert_eq!(sys.state(), &array![1.5, 1.]);
    }

    #[test]
    fn test_initialize_reuses_remembered_x0() {
        let mut sys = double_integrator();
        sys.initialize(Some(&array![3., -1.])).unwrap();
        sys.step(&array![1.], &array![0., 0.]);
        assert_ne!(sys.state(), &array![3., -1.]);

        sys.initialize(None).unwrap();
        assert_eq!(sys.state(), &array![3., -1.]);
    }

    #[test]
    fn test_initialize_defaults_to_zero() {
        let mut sys = double_integrator();
        sys.initialize(None).unwrap();
        assert_eq!(sys.state(), &Array1::zeros(2));
    }

    #[test]
    fn test_initialize_rejects_bad_length() {
        let mut sys = double_integrator();
        assert!(sys.initialize(Some(&array![1.])).is_err());
    }

    #[test]
    fn test_noise_model_dimension_check() {
        let mut sys = double_integrator();
        let result = sys.use_noise_model(Box::new(ZeroNoise::new(3)));
        assert!(matches!(result, Err(SlsError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_draw_noise_from_attached_model() {
        let mut sys = double_integrator();
        let mut noise = FixedNoiseVector::new(2, 3);
        noise.w_mut(0)[1] = 4.0;
        sys.use_noise_model(Box::new(noise)).unwrap();
        sys.noise_model_mut().unwrap().start_at_time(0).unwrap();
        assert_eq!(sys.draw_noise().unwrap(), array![0., 4.]);
        assert_eq!(sys.draw_noise().unwrap(), array![0., 0.]);
    }

    #[test]
    fn test_draw_noise_without_model_is_zero() {
        let mut sys = double_integrator();
        assert_eq!(sys.draw_noise().unwrap(), Array1::zeros(2));
    }
}
