//! Passive cell group driver.
//!
//! Integrates the membrane voltage of cells carrying only the `pas` leak
//! mechanism and current clamps: each step evaluates the membrane current
//! density and conductivity per CV, assembles the implicit system and
//! solves it.

use hines_fvm::{
    fvm_build_mechanism_data, fvm_cv_discretize_cells, CableCell, FvmCvDiscretization,
    FvmStimulusConfig, MechanismKind, ParameterSet,
};

use crate::error::{Result, SolverError};
use crate::matrix::MatrixState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the passive leak mechanism
pub const PAS: &str = "pas";

/// Default leak conductance of `pas` (S/cm²)
pub const DEFAULT_PAS_G: f64 = 0.001;

/// Default leak reversal potential of `pas` (mV)
pub const DEFAULT_PAS_E: f64 = -70.0;

/// Defaults for `pas` parameters not set where it is painted
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PassiveParams {
    /// Leak conductance (S/cm²)
    pub g: f64,
    /// Leak reversal potential (mV)
    pub e: f64,
}

impl Default for PassiveParams {
    fn default() -> Self {
        Self {
            g: DEFAULT_PAS_G,
            e: DEFAULT_PAS_E,
        }
    }
}

impl PassiveParams {
    /// Create new parameters with validation
    pub fn new(g: f64, e: f64) -> Result<Self> {
        let params = Self { g, e };
        params.validate()?;
        Ok(params)
    }

    /// Set the leak conductance
    pub fn with_g(mut self, g: f64) -> Self {
        self.g = g;
        self
    }

    /// Set the reversal potential
    pub fn with_e(mut self, e: f64) -> Self {
        self.e = e;
        self
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.g.is_finite() && self.g >= 0.0) {
            return Err(SolverError::invalid_parameter("g", self.g.to_string(), ">= 0"));
        }
        if !self.e.is_finite() {
            return Err(SolverError::invalid_parameter("e", self.e.to_string(), "finite"));
        }
        Ok(())
    }
}

/// Voltage samples of every CV
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trace {
    /// Sample times (ms)
    pub times: Vec<f64>,
    /// Voltage of each CV at each sample time (mV)
    pub voltages: Vec<Vec<f64>>,
}

impl Trace {
    fn push(&mut self, time: f64, voltage: &[f64]) {
        self.times.push(time);
        self.voltages.push(voltage.to_vec());
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// No samples
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Last sample
    pub fn last(&self) -> Option<(f64, &[f64])> {
        let t = *self.times.last()?;
        self.voltages.last().map(|v| (t, v.as_slice()))
    }

    /// Voltage series of one CV
    pub fn cv(&self, cv: usize) -> Vec<f64> {
        self.voltages.iter().filter_map(|v| v.get(cv).copied()).collect()
    }
}

#[derive(Debug, Clone, Default)]
struct PasLayout {
    cv: Vec<usize>,
    norm_area: Vec<f64>,
    g: Vec<f64>,
    e: Vec<f64>,
}

/// A group of passive cells integrated together
#[derive(Debug, Clone)]
pub struct PassiveCellGroup {
    discretization: FvmCvDiscretization,
    matrix: MatrixState,
    pas: PasLayout,
    stimuli: FvmStimulusConfig,
    voltage: Vec<f64>,
    current_density: Vec<f64>,
    conductivity: Vec<f64>,
    cell_dt: Vec<Option<f64>>,
    time: f64,
}

impl PassiveCellGroup {
    /// Discretize `cells` and set up the driver with default `pas` parameters
    pub fn new(cells: &[CableCell], params: &ParameterSet) -> Result<Self> {
        Self::with_passive_params(cells, params, PassiveParams::default())
    }

    /// Discretize `cells` and set up the driver.
    ///
    /// Fails with [`SolverError::UnsupportedMechanism`] if any cell carries a
    /// mechanism other than painted `pas`.
    pub fn with_passive_params(
        cells: &[CableCell],
        params: &ParameterSet,
        pas_defaults: PassiveParams,
    ) -> Result<Self> {
        pas_defaults.validate()?;
        let discretization = fvm_cv_discretize_cells(cells, params)?;
        let data = fvm_build_mechanism_data(cells, &discretization, false)?;

        let mut pas = PasLayout::default();
        for (name, config) in &data.mechanisms {
            if name != PAS || config.kind != MechanismKind::Density {
                return Err(SolverError::unsupported_mechanism(name));
            }
            if let Some(other) = config
                .param_values
                .keys()
                .find(|k| k.as_str() != "g" && k.as_str() != "e")
            {
                return Err(SolverError::unsupported_mechanism(format!("{}/{}", name, other)));
            }
            let n = config.len();
            pas.cv = config.cv.clone();
            pas.norm_area = config.norm_area.clone();
            pas.g = config
                .param_values
                .get("g")
                .cloned()
                .unwrap_or_else(|| vec![pas_defaults.g; n]);
            pas.e = config
                .param_values
                .get("e")
                .cloned()
                .unwrap_or_else(|| vec![pas_defaults.e; n]);
        }

        for &cv in &data.stimuli.cv {
            if discretization.cv_area[cv] <= 0.0 {
                log::warn!("Current clamp on CV {} with zero area is ignored", cv);
            }
        }

        let matrix = MatrixState::from_discretization(&discretization)?;
        let n = discretization.size();
        let voltage = discretization.init_membrane_potential.clone();

        log::info!(
            "Passive cell group: {} cells, {} CVs, {} pas CVs, {} stimuli",
            discretization.n_cell(),
            n,
            pas.cv.len(),
            data.stimuli.cv.len()
        );

        Ok(Self {
            cell_dt: vec![None; discretization.n_cell()],
            discretization,
            matrix,
            pas,
            stimuli: data.stimuli,
            voltage,
            current_density: vec![0.0; n],
            conductivity: vec![0.0; n],
            time: 0.0,
        })
    }

    /// Discretization of the group
    pub fn discretization(&self) -> &FvmCvDiscretization {
        &self.discretization
    }

    /// Matrix state after the last step
    pub fn matrix(&self) -> &MatrixState {
        &self.matrix
    }

    /// Voltage of every CV (mV)
    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    /// Simulated time (ms)
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Membrane current density of the last step (A/m²)
    pub fn current_density(&self) -> &[f64] {
        &self.current_density
    }

    /// Override the time step of one cell; a non-positive step freezes it,
    /// `None` restores the group step
    pub fn set_dt(&mut self, cell: usize, dt: Option<f64>) -> Result<()> {
        let n_cell = self.cell_dt.len();
        let slot = self.cell_dt.get_mut(cell).ok_or_else(|| {
            SolverError::invalid_parameter("cell", cell.to_string(), format!("< {}", n_cell))
        })?;
        *slot = dt;
        Ok(())
    }

    /// Reset voltages to their initial values and time to zero
    pub fn reset(&mut self) {
        self.voltage
            .copy_from_slice(&self.discretization.init_membrane_potential);
        self.time = 0.0;
    }

    fn update_currents(&mut self) {
        self.current_density.fill(0.0);
        self.conductivity.fill(0.0);

        let pas = &self.pas;
        for k in 0..pas.cv.len() {
            let cv = pas.cv[k];
            // S/cm² to kS/m²
            let g = 10.0 * pas.norm_area[k] * pas.g[k];
            self.current_density[cv] += g * (self.voltage[cv] - pas.e[k]);
            self.conductivity[cv] += g;
        }

        for (cv, clamp) in self.stimuli.cv.iter().zip(&self.stimuli.clamps) {
            let area = self.discretization.cv_area[*cv];
            if area > 0.0 {
                // nA over µm² to A/m²
                self.current_density[*cv] -= clamp.current_at(self.time) / (1e-3 * area);
            }
        }
    }

    /// Advance every cell by one implicit step of `dt` (ms)
    pub fn step(&mut self, dt: f64) -> Result<()> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SolverError::invalid_parameter("dt", dt.to_string(), "> 0"));
        }
        self.update_currents();

        let dt_intdom: Vec<f64> = self.cell_dt.iter().map(|o| o.unwrap_or(dt)).collect();
        self.matrix.assemble_implicit(
            1.0,
            &dt_intdom,
            &self.voltage,
            &self.current_density,
            &self.conductivity,
        );
        self.matrix.solve();
        self.voltage.copy_from_slice(self.matrix.solution());
        self.time += dt;
        Ok(())
    }

    /// Integrate up to `t_end` (ms), sampling after every step.
    ///
    /// The final step is shortened to land on `t_end`.
    pub fn run(&mut self, t_end: f64, dt: f64) -> Result<Trace> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SolverError::invalid_parameter("dt", dt.to_string(), "> 0"));
        }
        if !(t_end.is_finite() && t_end >= self.time) {
            return Err(SolverError::invalid_parameter(
                "t_end",
                t_end.to_string(),
                format!(">= {}", self.time),
            ));
        }

        log::info!("Starting passive run: {} ms to {} ms, dt {} ms", self.time, t_end, dt);

        let mut trace = Trace::default();
        trace.push(self.time, &self.voltage);
        let eps = 1e-9 * dt;
        let mut steps = 0usize;
        while t_end - self.time > eps {
            let h = dt.min(t_end - self.time);
            self.step(h)?;
            trace.push(self.time, &self.voltage);
            steps += 1;
        }
        // Absorb rounding in the accumulated time.
        self.time = self.time.max(t_end);

        log::info!("Passive run completed: {} steps", steps);
        Ok(trace)
    }
}
