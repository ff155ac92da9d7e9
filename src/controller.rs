//! Feedback controllers consumed by the simulator.

use std::collections::VecDeque;

use ndarray::{Array1, Array2};

use crate::error::{shape_of, Result, SlsError};

/// A stateful feedback law mapping measurements to actuation.
///
/// Implementations must be re-armable: [`Controller::initialize`] resets
/// all internal memory so the same controller can drive repeated runs.
pub trait Controller {
    /// Clear internal memory. Must be called before each simulation run.
    fn initialize(&mut self);

    /// Compute the actuation for the current measurement and advance the
    /// internal state.
    fn control(&mut self, y: &Array1<f64>) -> Array1<f64>;
}

/// FIR realization of a synthesized SLS state-feedback response.
///
/// Given the spectral components $\\{\Phi_x\[k\], \Phi_u\[k\]\\}_{k=1}^T$,
/// the controller reconstructs the disturbance from the mismatch between
/// the measured and predicted state and rolls it through the response:
/// $$ \delta\_t = y\_t - \hat{x}\_t $$
/// $$ u\_t = \textstyle\sum\_{k=1}^{T} \Phi\_u\[k\] \delta\_{t-k+1} $$
/// $$ \hat{x}\_{t+1} = \textstyle\sum\_{k=2}^{T} \Phi\_x\[k\] \delta\_{t-k+2} $$
/// Deltas older than the FIR horizon drop out of the window.
pub struct SlsStateFeedbackController {
    phi_x: Vec<Array2<f64>>,
    phi_u: Vec<Array2<f64>>,
    deltas: VecDeque<Array1<f64>>,
    x_hat: Array1<f64>,
}

impl SlsStateFeedbackController {
    /// Wrap validated spectral components, `phi_x[k]` being
    /// $\Phi_x\[k+1\]$ (and likewise for `phi_u`).
    pub fn new(phi_x: Vec<Array2<f64>>, phi_u: Vec<Array2<f64>>) -> Result<Self> {
        if phi_x.is_empty() || phi_x.len() != phi_u.len() {
            return Err(SlsError::InvalidParameter {
                name: "fir_horizon",
                reason: format!(
                    "need matching non-empty responses, got {} state and {} input components",
                    phi_x.len(),
                    phi_u.len()
                ),
            });
        }
        let nx = phi_x[0].ncols();
        let nu = phi_u[0].nrows();
        for component in &phi_x {
            if component.nrows() != nx || component.ncols() != nx {
                return Err(SlsError::DimensionMismatch {
                    name: "phi_x",
                    expected: shape_of(nx, nx),
                    actual: shape_of(component.nrows(), component.ncols()),
                });
            }
        }
        for component in &phi_u {
            if component.nrows() != nu || component.ncols() != nx {
                return Err(SlsError::DimensionMismatch {
                    name: "phi_u",
                    expected: shape_of(nu, nx),
                    actual: shape_of(component.nrows(), component.ncols()),
                });
            }
        }
        Ok(SlsStateFeedbackController {
            x_hat: Array1::zeros(nx),
            deltas: VecDeque::with_capacity(phi_x.len()),
            phi_x,
            phi_u,
        })
    }

    /// The FIR truncation length $T$.
    pub fn fir_horizon(&self) -> usize {
        self.phi_x.len()
    }

    /// The synthesized state response, `[k]` holding $\Phi_x\[k+1\]$.
    pub fn phi_x(&self) -> &[Array2<f64>] {
        &self.phi_x
    }

    /// The synthesized input response, `[k]` holding $\Phi_u\[k+1\]$.
    pub fn phi_u(&self) -> &[Array2<f64>] {
        &self.phi_u
    }
}

impl Controller for SlsStateFeedbackController {
    fn initialize(&mut self) {
        self.deltas.clear();
        self.x_hat = Array1::zeros(self.x_hat.len());
    }

    fn control(&mut self, y: &Array1<f64>) -> Array1<f64> {
        let horizon = self.phi_x.len();
        let delta = y - &self.x_hat;
        self.deltas.push_front(delta);
        self.deltas.truncate(horizon);

        let mut u = Array1::zeros(self.phi_u[0].nrows());
        for (k, delta) in self.deltas.iter().enumerate() {
            u = u + self.phi_u[k].dot(delta);
        }

        let mut x_hat = Array1::zeros(self.x_hat.len());
        for (k, delta) in self.deltas.iter().take(horizon - 1).enumerate() {
            x_hat = x_hat + self.phi_x[k + 1].dot(delta);
        }
        self.x_hat = x_hat;

        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn scalar_controller() -> SlsStateFeedbackController {
        SlsStateFeedbackController::new(
            vec![array![[1.0]], array![[0.5]]],
            vec![array![[2.0]], array![[3.0]]],
        )
        .unwrap()
    }

    #[test]
    fn test_fir_window_arithmetic() {
        let mut controller = scalar_controller();
        controller.initialize();

        // delta = 1, u = 2*1
        assert_eq!(controller.control(&array![1.0]), array![2.0]);
        // x_hat = 0.5, delta = 1.5, u = 2*1.5 + 3*1
        assert_eq!(controller.control(&array![2.0]), array![6.0]);
        // x_hat = 0.75, delta = -0.75, oldest delta dropped
        assert_eq!(controller.control(&array![0.0]), array![3.0]);
    }

    #[test]
    fn test_initialize_rearms() {
        let mut controller = scalar_controller();
        controller.initialize();
        let first: Vec<_> = [1.0, 2.0, 0.0]
            .iter()
            .map(|&y| controller.control(&array![y])[0])
            .collect();

        controller.initialize();
        let second: Vec<_> = [1.0, 2.0, 0.0]
            .iter()
            .map(|&y| controller.control(&array![y])[0])
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_measurements_give_zero_actuation() {
        let mut controller = scalar_controller();
        controller.initialize();
        for _ in 0..5 {
            assert_eq!(controller.control(&array![0.0]), array![0.0]);
        }
    }

    #[test]
    fn test_rejects_mismatched_components() {
        assert!(SlsStateFeedbackController::new(vec![array![[1.0]]], vec![]).is_err());
        assert!(SlsStateFeedbackController::new(
            vec![array![[1.0]], array![[1.0, 0.0]]],
            vec![array![[1.0]], array![[1.0]]],
        )
        .is_err());
    }
}
