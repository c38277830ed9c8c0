//! Error types for the solver

use hines_fvm::FvmError;
use thiserror::Error;

/// Result type for solver operations
pub type Result<T> = std::result::Result<T, SolverError>;

/// Errors that can occur while building or running a solver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Discretization failed
    #[error("Discretization error: {source}")]
    Fvm {
        #[from]
        /// Source discretization error
        source: FvmError,
    },

    /// Per-CV or per-cell arrays disagree in length
    #[error("Size mismatch for {array}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Array name
        array: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Parent index does not precede its CV within the cell
    #[error("Invalid parent {parent} for CV {cv}")]
    InvalidParent {
        /// CV index
        cv: usize,
        /// Offending parent index
        parent: usize,
    },

    /// Mechanism the driver cannot evaluate
    #[error("Unsupported mechanism {mechanism}")]
    UnsupportedMechanism {
        /// Mechanism name
        mechanism: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },
}

impl SolverError {
    /// Create a size mismatch error
    pub fn size_mismatch(array: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            array: array.into(),
            expected,
            actual,
        }
    }

    /// Create an unsupported mechanism error
    pub fn unsupported_mechanism(mechanism: impl Into<String>) -> Self {
        Self::UnsupportedMechanism {
            mechanism: mechanism.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }
}
