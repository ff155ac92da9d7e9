//! A library for system level synthesis (SLS) controller design and
//! closed-loop simulation.
//!
//! The primary uses involve describing a discrete-time LTI plant,
//! synthesizing a state-feedback controller (centralized or d-localized)
//! over a FIR horizon, and then simulating the closed loop against a
//! disturbance model.
//!
//! The system module defines the plant struct and its builder, with the
//! other modules supporting synthesis, simulation, and visualization.
//! The most commonly used functionality is re-exported to the top level
//! for ease-of-use.

pub mod controller;
pub mod error;
pub mod graphs;
pub mod noise;
pub mod plant;
pub mod simulator;
pub mod synthesis;
pub mod system;
pub mod viz;

pub use controller::{Controller, SlsStateFeedbackController};
pub use error::{Result, SlsError};
pub use noise::{FixedNoiseVector, GaussianNoise, NoiseModel, ZeroNoise};
pub use plant::{DoublyStochasticChain, RandomChain};
pub use simulator::{SimulationLog, Simulator};
pub use synthesis::{DLocalizedSls, Objective, SlsSynthesizer, SynthesisAlgorithm};
pub use system::{LtiSystem, LtiSystemBuilder};
