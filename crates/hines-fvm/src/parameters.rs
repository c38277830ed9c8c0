//! Global and per-cell parameter defaults

use crate::cv_policy::CvPolicy;
use crate::error::{FvmError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default initial membrane potential (mV)
pub const DEFAULT_INIT_MEMBRANE_POTENTIAL: f64 = -65.0;
/// Default temperature (K), 6.3 °C
pub const DEFAULT_TEMPERATURE_K: f64 = 6.3 + 273.15;
/// Default axial resistivity (Ω·cm)
pub const DEFAULT_AXIAL_RESISTIVITY: f64 = 35.4;
/// Default specific membrane capacitance (F/m²)
pub const DEFAULT_MEMBRANE_CAPACITANCE: f64 = 0.01;

/// Parameter defaults; unset fields fall through to the next level
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParameterSet {
    /// Initial membrane potential (mV)
    pub init_membrane_potential: Option<f64>,
    /// Temperature (K)
    pub temperature_k: Option<f64>,
    /// Axial resistivity (Ω·cm)
    pub axial_resistivity: Option<f64>,
    /// Specific membrane capacitance (F/m²)
    pub membrane_capacitance: Option<f64>,
    /// CV discretization policy
    pub discretization: Option<CvPolicy>,
}

/// Fully resolved scalar parameters for one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParameters {
    /// Initial membrane potential (mV)
    pub init_membrane_potential: f64,
    /// Temperature (K)
    pub temperature_k: f64,
    /// Axial resistivity (Ω·cm)
    pub axial_resistivity: f64,
    /// Specific membrane capacitance (F/m²)
    pub membrane_capacitance: f64,
}

impl ParameterSet {
    /// Defaults matching NEURON
    pub fn neuron_defaults() -> Self {
        Self {
            init_membrane_potential: Some(DEFAULT_INIT_MEMBRANE_POTENTIAL),
            temperature_k: Some(DEFAULT_TEMPERATURE_K),
            axial_resistivity: Some(DEFAULT_AXIAL_RESISTIVITY),
            membrane_capacitance: Some(DEFAULT_MEMBRANE_CAPACITANCE),
            discretization: None,
        }
    }

    /// Set the initial membrane potential
    pub fn with_init_membrane_potential(mut self, v: f64) -> Self {
        self.init_membrane_potential = Some(v);
        self
    }

    /// Set the temperature
    pub fn with_temperature_k(mut self, t: f64) -> Self {
        self.temperature_k = Some(t);
        self
    }

    /// Set the axial resistivity
    pub fn with_axial_resistivity(mut self, ra: f64) -> Self {
        self.axial_resistivity = Some(ra);
        self
    }

    /// Set the specific membrane capacitance
    pub fn with_membrane_capacitance(mut self, cm: f64) -> Self {
        self.membrane_capacitance = Some(cm);
        self
    }

    /// Set the discretization policy
    pub fn with_discretization(mut self, policy: CvPolicy) -> Self {
        self.discretization = Some(policy);
        self
    }

    /// Check every set value
    pub fn validate(&self) -> Result<()> {
        fn check(name: &str, v: Option<f64>, ok: fn(f64) -> bool, constraint: &str) -> Result<()> {
            match v {
                Some(x) if !(x.is_finite() && ok(x)) => Err(FvmError::invalid_parameter(
                    name,
                    x.to_string(),
                    constraint,
                )),
                _ => Ok(()),
            }
        }
        check(
            "init_membrane_potential",
            self.init_membrane_potential,
            |_| true,
            "finite",
        )?;
        check("temperature_k", self.temperature_k, |x| x > 0.0, "> 0")?;
        check("axial_resistivity", self.axial_resistivity, |x| x > 0.0, "> 0")?;
        check("membrane_capacitance", self.membrane_capacitance, |x| x >= 0.0, ">= 0")?;
        if let Some(policy) = &self.discretization {
            policy.validate()?;
        }
        Ok(())
    }

    /// Fields of `self` where set, otherwise those of `fallback`
    pub fn overlay(&self, fallback: &ParameterSet) -> ParameterSet {
        ParameterSet {
            init_membrane_potential: self.init_membrane_potential.or(fallback.init_membrane_potential),
            temperature_k: self.temperature_k.or(fallback.temperature_k),
            axial_resistivity: self.axial_resistivity.or(fallback.axial_resistivity),
            membrane_capacitance: self.membrane_capacitance.or(fallback.membrane_capacitance),
            discretization: self
                .discretization
                .clone()
                .or_else(|| fallback.discretization.clone()),
        }
    }

    /// Resolve every scalar, failing on the first missing one
    pub fn resolve(&self) -> Result<ResolvedParameters> {
        self.validate()?;
        let get = |name: &str, v: Option<f64>| v.ok_or_else(|| FvmError::missing_parameter(name));
        Ok(ResolvedParameters {
            init_membrane_potential: get("init_membrane_potential", self.init_membrane_potential)?,
            temperature_k: get("temperature_k", self.temperature_k)?,
            axial_resistivity: get("axial_resistivity", self.axial_resistivity)?,
            membrane_capacitance: get("membrane_capacitance", self.membrane_capacitance)?,
        })
    }
}
