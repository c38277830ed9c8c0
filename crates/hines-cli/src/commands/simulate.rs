//! Passive simulation of a cell description

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use hines_solver::{PassiveCellGroup, Trace};
use tracing::info;

use super::{emit, OutputFormat};
use crate::config::CellConfig;
use crate::error::{CliError, CliResult};

/// Integrate a passive cell and write its voltage trace
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// Cell description (TOML)
    pub config: PathBuf,

    /// Stop time [ms], overriding the description
    #[arg(short = 'T', long)]
    pub t_end: Option<f64>,

    /// Time step [ms], overriding the description
    #[arg(short, long)]
    pub dt: Option<f64>,

    /// Keep every n-th sample
    #[arg(long, default_value_t = 1)]
    pub every: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn render_csv(trace: &Trace, every: usize) -> String {
    let mut out = String::from("t");
    let n_cv = trace.voltages.first().map_or(0, Vec::len);
    for cv in 0..n_cv {
        let _ = write!(out, ",v{}", cv);
    }
    out.push('\n');

    let last = trace.len().saturating_sub(1);
    for (k, (t, v)) in trace.times.iter().zip(&trace.voltages).enumerate() {
        if k % every != 0 && k != last {
            continue;
        }
        let _ = write!(out, "{}", t);
        for x in v {
            let _ = write!(out, ",{}", x);
        }
        out.push('\n');
    }
    out
}

fn thin(trace: Trace, every: usize) -> Trace {
    let last = trace.len().saturating_sub(1);
    let keep = |k: usize| k % every == 0 || k == last;
    Trace {
        times: trace
            .times
            .into_iter()
            .enumerate()
            .filter(|(k, _)| keep(*k))
            .map(|(_, t)| t)
            .collect(),
        voltages: trace
            .voltages
            .into_iter()
            .enumerate()
            .filter(|(k, _)| keep(*k))
            .map(|(_, v)| v)
            .collect(),
    }
}

impl SimulateCommand {
    pub fn execute(self) -> CliResult<()> {
        if self.every == 0 {
            return Err(CliError::invalid_args("--every must be at least 1"));
        }
        let config = CellConfig::load_from_file(&self.config)?;
        let t_end = self.t_end.unwrap_or(config.run.t_end);
        let dt = self.dt.unwrap_or(config.run.dt);

        let cell = config.cable_cell()?;
        let mut group = PassiveCellGroup::new(&[cell], &config.parameter_set())?;
        info!(
            "Simulating {} ({} CVs) to {} ms with dt {} ms",
            self.config.display(),
            group.discretization().size(),
            t_end,
            dt
        );
        let trace = group.run(t_end, dt)?;

        let content = match self.format {
            OutputFormat::Csv => render_csv(&trace, self.every),
            OutputFormat::Json => serde_json::to_string(&thin(trace, self.every))? + "\n",
            OutputFormat::Text => {
                return Err(CliError::invalid_args("simulate supports csv or json output"))
            }
        };
        emit(self.output.as_deref(), &content)
    }
}
