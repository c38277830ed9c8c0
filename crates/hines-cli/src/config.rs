//! TOML cell descriptions.
//!
//! ```toml
//! [morphology]
//! spherical_root = true
//! [[morphology.branches]]
//! samples = [[0.0, 0.0, 0.0, 9.0]]
//! [[morphology.branches]]
//! parent = 0
//! samples = [[9.0, 0.0, 0.0, 1.0], [109.0, 0.0, 0.0, 1.0]]
//!
//! [policy]
//! kind = "fixed_per_branch"
//! cv_per_branch = 4
//!
//! [[paint]]
//! pas = { g = 0.001, e = -65.0 }
//!
//! [[stimulus]]
//! branch = 0
//! pos = 0.5
//! amplitude = 0.1
//!
//! [run]
//! t_end = 10.0
//! dt = 0.025
//! ```

use std::path::Path;

use hines_fvm::{
    CableCell, CvPolicy, CvPolicyFlags, IClamp, MechanismDesc, Paint, ParameterSet, Place,
};
use hines_morph::{Branch, Location, Locset, Morphology, Point, Region};
use hines_solver::PAS;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// A cell with its discretization and run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellConfig {
    /// Branch tree
    #[serde(default)]
    pub morphology: MorphologyConfig,

    /// Cell-wide parameter overrides
    #[serde(default)]
    pub parameters: ParametersConfig,

    /// Discretization policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Painted properties, later entries win
    #[serde(default)]
    pub paint: Vec<PaintConfig>,

    /// Current clamps
    #[serde(default)]
    pub stimulus: Vec<StimulusConfig>,

    /// Integration settings
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// Branch 0 is a sphere given by one sample
    #[serde(default)]
    pub spherical_root: bool,

    /// Branches in id order
    #[serde(default)]
    pub branches: Vec<BranchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Parent branch id
    #[serde(default)]
    pub parent: Option<usize>,

    /// Samples as `[x, y, z, radius]` in µm
    pub samples: Vec<[f64; 4]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParametersConfig {
    /// F/m²
    pub membrane_capacitance: Option<f64>,
    /// Ω·cm
    pub axial_resistivity: Option<f64>,
    /// K
    pub temperature_k: Option<f64>,
    /// mV
    pub init_membrane_potential: Option<f64>,
}

/// Discretization policy selected by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    FixedPerBranch {
        cv_per_branch: usize,
        #[serde(default)]
        interior_forks: bool,
        #[serde(default)]
        single_root_cv: bool,
    },
    MaxExtent {
        max_extent: f64,
        #[serde(default)]
        interior_forks: bool,
        #[serde(default)]
        single_root_cv: bool,
    },
    EverySample,
    Single,
    Explicit {
        /// `[branch, pos]` pairs
        #[serde(default)]
        locations: Vec<(usize, f64)>,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::FixedPerBranch {
            cv_per_branch: 1,
            interior_forks: false,
            single_root_cv: false,
        }
    }
}

fn policy_flags(interior_forks: bool, single_root_cv: bool) -> CvPolicyFlags {
    let mut flags = CvPolicyFlags::NONE;
    if interior_forks {
        flags |= CvPolicyFlags::INTERIOR_FORKS;
    }
    if single_root_cv {
        flags |= CvPolicyFlags::SINGLE_ROOT_CV;
    }
    flags
}

impl PolicyConfig {
    /// Library policy for this description
    pub fn to_policy(&self) -> CvPolicy {
        match self {
            Self::FixedPerBranch {
                cv_per_branch,
                interior_forks,
                single_root_cv,
            } => CvPolicy::fixed_per_branch(*cv_per_branch)
                .with_flags(policy_flags(*interior_forks, *single_root_cv)),
            Self::MaxExtent {
                max_extent,
                interior_forks,
                single_root_cv,
            } => CvPolicy::max_extent(*max_extent)
                .with_flags(policy_flags(*interior_forks, *single_root_cv)),
            Self::EverySample => CvPolicy::every_sample(),
            Self::Single => CvPolicy::single(),
            Self::Explicit { locations } => CvPolicy::explicit(Locset::new(
                locations.iter().map(|&(b, p)| Location::new(b, p)).collect(),
            )),
        }
    }
}

/// Properties painted on a branch or a cable of it; no branch means the
/// whole cell
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaintConfig {
    #[serde(default)]
    pub branch: Option<usize>,
    #[serde(default)]
    pub prox: Option<f64>,
    #[serde(default)]
    pub dist: Option<f64>,

    pub membrane_capacitance: Option<f64>,
    pub axial_resistivity: Option<f64>,
    pub temperature_k: Option<f64>,
    pub init_membrane_potential: Option<f64>,

    /// Passive leak; unset parameters take the mechanism defaults
    pub pas: Option<PasConfig>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PasConfig {
    /// S/cm²
    pub g: Option<f64>,
    /// mV
    pub e: Option<f64>,
}

impl PaintConfig {
    fn region(&self, morph: &Morphology) -> CliResult<Region> {
        match (self.branch, self.prox, self.dist) {
            (None, None, None) => Ok(Region::all(morph)),
            (None, _, _) => Err(CliError::config("paint with prox/dist needs a branch")),
            (Some(b), prox, dist) => Ok(Region::cable(b, prox.unwrap_or(0.0), dist.unwrap_or(1.0))),
        }
    }

    fn paints(&self) -> Vec<Paint> {
        let mut paints = Vec::new();
        if let Some(cm) = self.membrane_capacitance {
            paints.push(Paint::MembraneCapacitance(cm));
        }
        if let Some(ra) = self.axial_resistivity {
            paints.push(Paint::AxialResistivity(ra));
        }
        if let Some(t) = self.temperature_k {
            paints.push(Paint::TemperatureK(t));
        }
        if let Some(v) = self.init_membrane_potential {
            paints.push(Paint::InitMembranePotential(v));
        }
        if let Some(pas) = self.pas {
            let mut desc = MechanismDesc::new(PAS);
            if let Some(g) = pas.g {
                desc = desc.set("g", g);
            }
            if let Some(e) = pas.e {
                desc = desc.set("e", e);
            }
            paints.push(Paint::Density(desc));
        }
        paints
    }
}

/// Current clamp at a location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    pub branch: usize,
    pub pos: f64,
    /// ms
    #[serde(default)]
    pub delay: f64,
    /// ms
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// nA
    pub amplitude: f64,
}

fn default_duration() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// ms
    #[serde(default = "default_t_end")]
    pub t_end: f64,
    /// ms
    #[serde(default = "default_dt")]
    pub dt: f64,
}

fn default_t_end() -> f64 {
    10.0
}

fn default_dt() -> f64 {
    0.025
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            t_end: default_t_end(),
            dt: default_dt(),
        }
    }
}

impl CellConfig {
    /// Load a description from file
    pub fn load_from_file(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::missing_resource(format!(
                "cell description {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a description
    pub fn from_toml(content: &str) -> CliResult<Self> {
        toml::from_str(content).map_err(|e| CliError::config(format!("Invalid cell description: {}", e)))
    }

    /// Global parameters: neuron defaults, overrides and the policy
    pub fn parameter_set(&self) -> ParameterSet {
        let p = &self.parameters;
        let mut set = ParameterSet::neuron_defaults().with_discretization(self.policy.to_policy());
        if let Some(cm) = p.membrane_capacitance {
            set = set.with_membrane_capacitance(cm);
        }
        if let Some(ra) = p.axial_resistivity {
            set = set.with_axial_resistivity(ra);
        }
        if let Some(t) = p.temperature_k {
            set = set.with_temperature_k(t);
        }
        if let Some(v) = p.init_membrane_potential {
            set = set.with_init_membrane_potential(v);
        }
        set
    }

    /// Build the morphology
    pub fn morphology(&self) -> CliResult<Morphology> {
        let branches = self
            .morphology
            .branches
            .iter()
            .map(|b| {
                let samples = b
                    .samples
                    .iter()
                    .map(|&[x, y, z, r]| Point::new(x, y, z, r))
                    .collect();
                Branch::new(b.parent, samples)
            })
            .collect();
        Ok(Morphology::new(self.morphology.spherical_root, branches)?)
    }

    /// Build the cable cell with its paints and stimuli
    pub fn cable_cell(&self) -> CliResult<CableCell> {
        let mut cell = CableCell::new(self.morphology()?)?;
        for paint in &self.paint {
            let region = paint.region(cell.morphology())?;
            for p in paint.paints() {
                cell.paint(region.clone(), p)?;
            }
        }
        for s in &self.stimulus {
            let clamp = IClamp::new(s.delay, s.duration, s.amplitude);
            cell.place(Location::new(s.branch, s.pos), Place::IClamp(clamp))?;
        }
        tracing::debug!(
            "Built cell: {} branches, {} paints, {} stimuli",
            cell.morphology().num_branches(),
            cell.paints().len(),
            self.stimulus.len()
        );
        Ok(cell)
    }
}
