//! Error types for morphology construction and geometric queries

use thiserror::Error;

/// Result type for morphology operations
pub type Result<T> = std::result::Result<T, MorphError>;

/// Structural problems detected while building a morphology
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MorphologyError {
    /// Branch 0 must be a top-level branch
    #[error("branch 0 must not have a parent (found parent {parent})")]
    RootHasParent {
        /// Parent given to branch 0
        parent: usize,
    },

    /// Parent index refers to a branch that does not exist
    #[error("branch {branch} has parent {parent}, which does not exist")]
    OrphanBranch {
        /// Offending branch
        branch: usize,
        /// Missing parent
        parent: usize,
    },

    /// Parent chain loops back on itself
    #[error("branch {branch} is part of a parent cycle")]
    Cycle {
        /// A branch on the cycle
        branch: usize,
    },

    /// Branch does not have enough samples
    #[error("branch {branch} has {count} samples (expected at least {expected})")]
    TooFewSamples {
        /// Offending branch
        branch: usize,
        /// Number of samples supplied
        count: usize,
        /// Minimum number required
        expected: usize,
    },

    /// Spherical root described by more than one sample
    #[error("spherical root must be described by exactly one sample (found {count})")]
    InvalidSphericalRoot {
        /// Number of samples supplied
        count: usize,
    },

    /// Non-finite coordinate or non-positive radius
    #[error("branch {branch} sample {sample} is invalid: {reason}")]
    InvalidSample {
        /// Offending branch
        branch: usize,
        /// Sample index within the branch
        sample: usize,
        /// Description of the problem
        reason: String,
    },
}

/// Errors produced by piecewise function construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PiecewiseError {
    /// Pushed interval does not start where the previous one ended
    #[error("interval [{left}, {right}] is not contiguous with upper bound {upper}")]
    NotContiguous {
        /// Left end of the rejected interval
        left: f64,
        /// Right end of the rejected interval
        right: f64,
        /// Current upper bound of the function
        upper: f64,
    },

    /// Interval with right end before left end
    #[error("inverted interval [{left}, {right}]")]
    Inverted {
        /// Left end
        left: f64,
        /// Right end
        right: f64,
    },
}

/// Errors that can occur in morphology queries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MorphError {
    /// Structural morphology error
    #[error("Invalid morphology: {source}")]
    Morphology {
        #[from]
        /// Underlying structural error
        source: MorphologyError,
    },

    /// Piecewise function error
    #[error("Piecewise function error: {source}")]
    Piecewise {
        #[from]
        /// Underlying piecewise error
        source: PiecewiseError,
    },

    /// Location outside the morphology
    #[error("Invalid location (branch {branch}, pos {pos}): {reason}")]
    InvalidLocation {
        /// Branch id
        branch: usize,
        /// Relative position
        pos: f64,
        /// Reason the location is invalid
        reason: String,
    },

    /// Cable outside the morphology or with inverted ends
    #[error("Invalid cable (branch {branch}, [{prox}, {dist}]): {reason}")]
    InvalidCable {
        /// Branch id
        branch: usize,
        /// Proximal position
        prox: f64,
        /// Distal position
        dist: f64,
        /// Reason the cable is invalid
        reason: String,
    },
}

impl MorphError {
    /// Create an invalid location error
    pub fn invalid_location(branch: usize, pos: f64, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            branch,
            pos,
            reason: reason.into(),
        }
    }

    /// Create an invalid cable error
    pub fn invalid_cable(branch: usize, prox: f64, dist: f64, reason: impl Into<String>) -> Self {
        Self::InvalidCable {
            branch,
            prox,
            dist,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MorphError::invalid_location(3, 1.5, "position outside [0, 1]");
        let msg = format!("{}", err);
        assert!(msg.contains("branch 3"));
        assert!(msg.contains("1.5"));

        let err: MorphError = MorphologyError::Cycle { branch: 2 }.into();
        assert!(matches!(err, MorphError::Morphology { .. }));
        assert!(format!("{}", err).contains("cycle"));
    }
}
