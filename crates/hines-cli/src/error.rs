//! Error handling for the hines CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by `hines` commands
#[derive(Error, Debug)]
pub enum CliError {
    /// Morphology in the cell description is invalid
    #[error("Morphology error: {0}")]
    Morphology(#[from] hines_morph::MorphologyError),

    /// Cell could not be discretized
    #[error("Discretization error: {0}")]
    Fvm(#[from] hines_fvm::FvmError),

    /// Cell group could not be built or integrated
    #[error("Solver error: {0}")]
    Solver(#[from] hines_solver::SolverError),

    /// Cell description could not be parsed or is inconsistent
    #[error("Cell description error: {0}")]
    Config(String),

    /// Reading a cell description failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a result failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing a result failed; the message carries the path
    #[error("Output error: {0:#}")]
    Output(#[from] anyhow::Error),

    /// Command arguments out of range
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// Cell description file not found
    #[error("Missing resource: {0}")]
    MissingResource(String),
}

impl CliError {
    /// Create a cell description error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Create a missing resource error
    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::MissingResource(msg.into())
    }
}
