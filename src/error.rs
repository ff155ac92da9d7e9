//! Crate-wide error type.

use thiserror::Error;

/// Errors produced while building systems, synthesizing controllers,
/// or running simulations.
#[derive(Debug, Error)]
pub enum SlsError {
    /// A matrix or vector did not have the shape required by its role.
    #[error("dimension mismatch for {name}: expected {expected}, got {actual}")]
    DimensionMismatch {
        name: &'static str,
        expected: String,
        actual: String,
    },

    /// A required piece of the system description was never supplied.
    #[error("missing system data: {0}")]
    MissingSystemData(&'static str),

    /// A parameter was outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The synthesis constraints admit no solution for the given column.
    #[error("synthesis infeasible for disturbance column {column}: constraint residual {residual:.3e}")]
    Infeasible { column: usize, residual: f64 },

    /// A finite noise sequence was stepped past its end.
    #[error("noise sequence exhausted at step {step} (horizon {horizon})")]
    NoiseExhausted { step: usize, horizon: usize },

    /// A seek target was outside the noise sequence.
    #[error("noise seek to step {step} outside horizon {horizon}")]
    NoiseSeekOutOfRange { step: usize, horizon: usize },

    /// The simulator was run without a controller attached.
    #[error("no controller attached to the simulator")]
    MissingController,

    /// An underlying LAPACK computation failed.
    #[error("linear algebra failure: {0}")]
    Linalg(#[from] ndarray_linalg::error::LinalgError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SlsError>;

pub(crate) fn shape_of(rows: usize, cols: usize) -> String {
    format!("{rows}x{cols}")
}
