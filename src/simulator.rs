//! Closed-loop simulation of a system driven by a feedback controller.

use log::debug;
use ndarray::{Array2, ShapeBuilder};

use crate::controller::Controller;
use crate::error::{Result, SlsError};
use crate::system::LtiSystem;

/// Time histories recorded by a simulation run, one column per step.
///
/// All four histories have exactly `horizon` columns; column `t` of
/// `states` is the state *before* the step-`t` update.
pub struct SimulationLog {
    /// State history $x_t$.
    pub states: Array2<f64>,
    /// Measurement history $y_t$.
    pub measurements: Array2<f64>,
    /// Regulated output history $z_t$.
    pub performance: Array2<f64>,
    /// Actuation history $u_t$.
    pub inputs: Array2<f64>,
}

/// Steps a system against its controller and noise for a fixed horizon.
///
/// The simulator owns the system; [`Simulator::system_mut`] exposes it
/// between runs for re-initialization and noise seeking, and
/// [`Simulator::set_controller`] swaps the feedback law so several
/// controllers can be compared against the same plant and disturbance
/// realization.
pub struct Simulator {
    system: LtiSystem,
    horizon: usize,
    controller: Option<Box<dyn Controller>>,
}

impl Simulator {
    pub fn new(system: LtiSystem, horizon: usize) -> Self {
        Simulator {
            system,
            horizon,
            controller: None,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn system(&self) -> &LtiSystem {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut LtiSystem {
        &mut self.system
    }

    /// Attach the controller used by subsequent runs.
    pub fn set_controller(&mut self, controller: Box<dyn Controller>) {
        self.controller = Some(controller);
    }

    /// Run one closed-loop pass over the horizon.
    ///
    /// Each step draws the disturbance, measures, asks the controller
    /// for the actuation, records all four signals, and advances the
    /// state. The system state and controller memory are left where the
    /// run ends; re-initialize both to repeat a run.
    pub fn run(&mut self) -> Result<SimulationLog> {
        let controller = self
            .controller
            .as_mut()
            .ok_or(SlsError::MissingController)?;

        let nu = self.system.nu();
        let mut states = Array2::zeros((self.system.nx(), self.horizon).f());
        let mut measurements = Array2::zeros((self.system.ny(), self.horizon).f());
        let mut performance = Array2::zeros((self.system.nz(), self.horizon).f());
        let mut inputs = Array2::zeros((nu, self.horizon).f());

        for t in 0..self.horizon {
            let w = self.system.draw_noise()?;
            let y = self.system.measure(&w);
            let u = controller.control(&y);
            if u.len() != nu {
                return Err(SlsError::DimensionMismatch {
                    name: "control input",
                    expected: format!("length {nu}"),
                    actual: format!("length {}", u.len()),
                });
            }
            let z = self.system.performance(&u);

            states.column_mut(t).assign(self.system.state());
            measurements.column_mut(t).assign(&y);
            performance.column_mut(t).assign(&z);
            inputs.column_mut(t).assign(&u);

            self.system.step(&u, &w);
        }
        debug!("simulated {} closed-loop steps", self.horizon);

        Ok(SimulationLog {
            states,
            measurements,
            performance,
            inputs,
        })
    }
}
