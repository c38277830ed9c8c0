//! Integration error of a single-compartment RC cell.
//!
//! The cell is one spherical CV with membrane resistance `R`, capacitance
//! `C`, leak reversal `E` and a constant injected current `I`, starting at
//! `E`. The exact voltage is `E + I·R·(1 − exp(−t/RC))`.

use std::fmt::Write as _;
use std::str::FromStr;

use clap::Args;
use hines_fvm::{CableCell, IClamp, MechanismDesc, Paint, ParameterSet, Place};
use hines_morph::{Branch, Location, Morphology, Point, Region};
use hines_solver::{PassiveCellGroup, PAS};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Soma radius of the test cell (µm); results do not depend on it
const SOMA_RADIUS: f64 = 10.0;

/// `MIN[,MAX]` time step range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtRange {
    pub min: f64,
    pub max: f64,
}

impl FromStr for DtRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("bad dt '{}': {}", v, e))
        };
        let range = match s.split_once(',') {
            Some((lo, hi)) => Self { min: parse(lo)?, max: parse(hi)? },
            None => {
                let v = parse(s)?;
                Self { min: v, max: v }
            }
        };
        if !(range.min > 0.0 && range.min.is_finite()) {
            return Err(format!("dt must be positive, got {}", range.min));
        }
        Ok(range)
    }
}

/// Integration error of a one-compartment RC cell over a range of dt
#[derive(Args, Debug)]
pub struct RcCommand {
    /// Total membrane resistance [MΩ]
    #[arg(short = 'R', long, default_value_t = 100.0)]
    pub resistance: f64,

    /// Total membrane capacitance [nF]
    #[arg(short = 'C', long, default_value_t = 0.01)]
    pub capacitance: f64,

    /// Reversal potential [mV]
    #[arg(short = 'E', long, default_value_t = -65.0, allow_hyphen_values = true)]
    pub reversal: f64,

    /// Injected current [nA]
    #[arg(short = 'I', long, default_value_t = 0.1, allow_hyphen_values = true)]
    pub injection: f64,

    /// Integration time step MIN[,MAX] [ms]
    #[arg(short, long, default_value = "0.025")]
    pub dt: DtRange,

    /// Integration stop time [ms]
    #[arg(short = 'T', long, default_value_t = 10.0)]
    pub time: f64,

    /// Number of dt values when a range is given
    #[arg(short, long, default_value_t = 10)]
    pub nsteps: usize,

    /// Show parameter values and exit
    #[arg(short, long)]
    pub show: bool,
}

/// Result of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RcResult {
    pub dt: f64,
    pub v: f64,
    pub v_exact: f64,
}

impl RcCommand {
    fn tau(&self) -> f64 {
        self.resistance * self.capacitance
    }

    /// Time steps, geometrically spaced from `min` to `max`
    pub fn dts(&self) -> Vec<f64> {
        let DtRange { min, max } = self.dt;
        if min >= max || self.nsteps <= 1 {
            return vec![min];
        }
        let ratio = max / min;
        let last = (self.nsteps - 1) as f64;
        (0..self.nsteps)
            .map(|k| min * ratio.powf(k as f64 / last))
            .collect()
    }

    fn validate(&self) -> CliResult<()> {
        if !(self.resistance > 0.0 && self.resistance.is_finite()) {
            return Err(CliError::invalid_args("resistance must be positive"));
        }
        if !(self.capacitance > 0.0 && self.capacitance.is_finite()) {
            return Err(CliError::invalid_args("capacitance must be positive"));
        }
        if !(self.time >= 0.0 && self.time.is_finite()) {
            return Err(CliError::invalid_args("time must be non-negative"));
        }
        Ok(())
    }

    fn cell(&self) -> CliResult<CableCell> {
        let morph = Morphology::new(
            true,
            vec![Branch::new(None, vec![Point::new(0.0, 0.0, 0.0, SOMA_RADIUS)])],
        )?;
        let mut cell = CableCell::new(morph)?;
        let area = cell.embedding().total_area();
        let all = Region::all(cell.morphology());

        // MΩ over µm² to S/cm²; nF over µm² to F/m²
        let g = 100.0 / (self.resistance * area);
        let cm = self.capacitance * 1e3 / area;

        cell.paint(all.clone(), Paint::MembraneCapacitance(cm))?;
        cell.paint(
            all,
            Paint::Density(MechanismDesc::new(PAS).set("g", g).set("e", self.reversal)),
        )?;
        cell.place(
            Location::new(0, 0.5),
            Place::IClamp(IClamp::new(0.0, f64::INFINITY, self.injection)),
        )?;
        Ok(cell)
    }

    /// Integrate the cell once per time step
    pub fn run(&self) -> CliResult<Vec<RcResult>> {
        self.validate()?;
        let cells = [self.cell()?];
        let params = ParameterSet::neuron_defaults().with_init_membrane_potential(self.reversal);
        let v_exact = self.reversal
            + self.injection * self.resistance * (1.0 - (-self.time / self.tau()).exp());

        let mut results = Vec::new();
        for dt in self.dts() {
            let mut group = PassiveCellGroup::new(&cells, &params)?;
            group.run(self.time, dt)?;
            results.push(RcResult {
                dt,
                v: group.voltage()[0],
                v_exact,
            });
        }
        Ok(results)
    }

    fn show_params(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "membrane resistance {} MΩ", self.resistance);
        let _ = writeln!(out, "membrane capacitance {} nF", self.capacitance);
        let _ = writeln!(out, "time constant (τ) {} ms", self.tau());
        let _ = writeln!(out, "reversal potential {} mV", self.reversal);
        let _ = writeln!(out, "injected current {} nA", self.injection);
        let _ = writeln!(out, "min integration time step {} ms", self.dt.min);
        let _ = writeln!(out, "max integration time step {} ms", self.dt.max.max(self.dt.min));
        let _ = writeln!(out, "integration end time {} ms", self.time);
        let _ = writeln!(out, "number of dts {}", self.dts().len());
        out
    }

    pub fn execute(self) -> CliResult<()> {
        if self.show {
            print!("{}", self.show_params());
            return Ok(());
        }

        let results = self.run()?;
        let mut out = String::from("dt, Iinj, t_end, R, C, Erev, v, v_exact, v_err\n");
        for r in &results {
            let _ = writeln!(
                out,
                "{}, {}, {}, {}, {}, {}, {}, {}, {}",
                r.dt,
                self.injection,
                self.time,
                self.resistance,
                self.capacitance,
                self.reversal,
                r.v,
                r.v_exact,
                (r.v - r.v_exact).abs()
            );
        }
        print!("{}", out);
        info!("Completed {} RC runs", results.len());
        Ok(())
    }
}
