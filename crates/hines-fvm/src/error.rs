//! Error types for discretization

use hines_morph::{Location, MorphError};
use thiserror::Error;

/// Result type for discretization operations
pub type Result<T> = std::result::Result<T, FvmError>;

/// Errors that can occur while discretizing cells
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FvmError {
    /// Morphology or geometric query error
    #[error("Morphology error: {source}")]
    Morph {
        #[from]
        /// Source morphology error
        source: MorphError,
    },

    /// CV boundary points cannot describe a discretization
    #[error("Invalid discretization at {location}: {reason}")]
    InvalidDiscretization {
        /// Offending boundary point
        location: Location,
        /// Reason the point is rejected
        reason: String,
    },

    /// Global and cell defaults both lack a value
    #[error("Missing parameter {parameter}: no cell or global default")]
    MissingParameter {
        /// Parameter name
        parameter: String,
    },

    /// Parameter value outside its valid range
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Density mechanism painted with different parameter sets
    #[error("Inconsistent mechanism {mechanism}: {reason}")]
    InconsistentMechanism {
        /// Mechanism name
        mechanism: String,
        /// Description of the inconsistency
        reason: String,
    },
}

impl FvmError {
    /// Create an invalid discretization error
    pub fn invalid_discretization(location: Location, reason: impl Into<String>) -> Self {
        Self::InvalidDiscretization {
            location,
            reason: reason.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter(parameter: impl Into<String>) -> Self {
        Self::MissingParameter {
            parameter: parameter.into(),
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

    /// Create an inconsistent mechanism error
    pub fn inconsistent_mechanism(mechanism: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InconsistentMechanism {
            mechanism: mechanism.into(),
            reason: reason.into(),
        }
    }
}
