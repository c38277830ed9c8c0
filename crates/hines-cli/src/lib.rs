//! hines CLI crate
//!
//! Commands (see [commands]):
//! - discretize: cell description (TOML) → CV table as text or JSON.
//! - simulate: cell description → passive voltage trace as CSV or JSON.
//! - rc: integration error of a one-compartment RC cell over a range of dt.
//!
//! The binary (src/main.rs) wires up logging and argument parsing, calling
//! [`HinesCli::execute`]. The library surface exposes the commands and the
//! description format for integration tests.

pub mod commands;
pub mod config;
pub mod error;

pub use commands::HinesCli;
pub use config::CellConfig;
pub use error::{CliError, CliResult};
