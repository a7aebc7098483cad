//! Error types for the Weft engine.
//!
//! All crates return `WeftResult<T>` from fallible operations.

use thiserror::Error;

/// Unified error type for the Weft engine.
#[derive(Debug, Error)]
pub enum WeftError {
    /// Generator output is malformed (bad counts, out-of-range indices).
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An element collapsed or inverted during assembly.
    #[error("Element {element} is degenerate at Gauss point {gauss_point} (area: {area:.3e})")]
    DegenerateElement {
        element: u32,
        gauss_point: u32,
        area: f32,
    },

    /// Solver failed to converge.
    #[error("Solver did not converge after {iterations} iterations (residual: {residual:.2e})")]
    SolverDivergence {
        iterations: u32,
        residual: f64,
    },

    /// The state blew up (non-finite velocities or positions).
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// A simulation invariant was violated.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for `Result<T, WeftError>`.
pub type WeftResult<T> = Result<T, WeftError>;
