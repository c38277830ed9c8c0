//! Control-volume table of a cell description

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use hines_fvm::{fvm_cv_discretize, FvmCvDiscretization};
use serde::Serialize;
use tracing::info;

use super::{emit, OutputFormat};
use crate::config::CellConfig;
use crate::error::{CliError, CliResult};

/// Print the control volumes of a cell description
#[derive(Args, Debug)]
pub struct DiscretizeCommand {
    /// Cell description (TOML)
    pub config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CvRow {
    cv: usize,
    parent: Option<usize>,
    /// `[branch, prox, dist]`
    cables: Vec<(usize, f64, f64)>,
    area_um2: f64,
    capacitance_pf: f64,
    face_conductance_us: f64,
    diam_um: f64,
    axial_resistivity: f64,
    init_membrane_potential: f64,
    temperature_k: f64,
}

fn rows(d: &FvmCvDiscretization) -> Vec<CvRow> {
    (0..d.size())
        .map(|cv| CvRow {
            cv,
            parent: d.geometry.parent(cv),
            cables: d
                .geometry
                .cables(cv)
                .iter()
                .map(|c| (c.branch, c.prox_pos, c.dist_pos))
                .collect(),
            area_um2: d.cv_area[cv],
            capacitance_pf: d.cv_capacitance[cv],
            face_conductance_us: d.face_conductance[cv],
            diam_um: d.diam_um[cv],
            axial_resistivity: d.axial_resistivity[cv],
            init_membrane_potential: d.init_membrane_potential[cv],
            temperature_k: d.temperature_k[cv],
        })
        .collect()
}

fn render_text(rows: &[CvRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>4} {:>6} {:>12} {:>12} {:>12} {:>8}  cables",
        "cv", "parent", "area", "cap", "face_g", "diam"
    );
    for r in rows {
        let parent = r.parent.map_or_else(|| "-".to_string(), |p| p.to_string());
        let cables: Vec<String> = r
            .cables
            .iter()
            .map(|(b, p, d)| format!("({} {} {})", b, p, d))
            .collect();
        let _ = writeln!(
            out,
            "{:>4} {:>6} {:>12.4} {:>12.4} {:>12.4} {:>8.3}  {}",
            r.cv,
            parent,
            r.area_um2,
            r.capacitance_pf,
            r.face_conductance_us,
            r.diam_um,
            cables.join(" ")
        );
    }
    out
}

impl DiscretizeCommand {
    pub fn execute(self) -> CliResult<()> {
        let config = CellConfig::load_from_file(&self.config)?;
        let cell = config.cable_cell()?;
        let d = fvm_cv_discretize(&cell, &config.parameter_set())?;
        info!("Discretized {} into {} CVs", self.config.display(), d.size());

        let rows = rows(&d);
        let content = match self.format {
            OutputFormat::Text => render_text(&rows),
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "source": self.config.display().to_string(),
                    "cvs": rows,
                });
                serde_json::to_string_pretty(&json)? + "\n"
            }
            OutputFormat::Csv => {
                return Err(CliError::invalid_args("discretize supports text or json output"))
            }
        };
        emit(self.output.as_deref(), &content)
    }
}
