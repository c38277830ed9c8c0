//! CLI command implementations for hines

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use crate::error::CliResult;

pub mod discretize;
pub mod rc;
pub mod simulate;

/// hines - cable cell discretization and Hines-solver simulation
#[derive(Parser, Debug)]
#[command(
    name = "hines",
    version,
    about = "Cable cell discretization and passive simulation",
    long_about = "Splits cable cell morphologies into control volumes, prints the \
                  resulting geometry, and integrates passive membrane voltage with \
                  the Hines tree solver."
)]
pub struct HinesCli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the control volumes of a cell description
    #[command(alias = "cv")]
    Discretize(discretize::DiscretizeCommand),

    /// Integrate a passive cell and write its voltage trace
    #[command(alias = "sim")]
    Simulate(simulate::SimulateCommand),

    /// Integration error of a one-compartment RC cell over a range of dt
    Rc(rc::RcCommand),
}

/// Output encoding
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
}

impl HinesCli {
    /// Execute the CLI command
    pub fn execute(self) -> CliResult<()> {
        match self.command {
            Commands::Discretize(cmd) => cmd.execute(),
            Commands::Simulate(cmd) => cmd.execute(),
            Commands::Rc(cmd) => cmd.execute(),
        }
    }
}

/// Write to `path`, or stdout when there is none
pub(crate) fn emit(output: Option<&Path>, content: &str) -> CliResult<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating directory {}", parent.display()))?;
                }
            }
            std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;

    #[test]
    fn test_emit_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out").join("trace.csv");
        emit(Some(&path), "t,v0\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "t,v0\n");
    }

    #[test]
    fn test_emit_failure_names_the_path() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let path = blocker.join("trace.csv");
        let err = emit(Some(&path), "t,v0\n").unwrap_err();
        assert!(matches!(err, CliError::Output(_)), "{:?}", err);
        assert!(err.to_string().contains("blocker"), "{}", err);
    }
}
