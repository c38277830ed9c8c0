//! Cable cell description: morphology plus painted and placed properties

use std::collections::BTreeMap;

use hines_morph::{Embedding, Location, Morphology, Region};

use crate::error::{FvmError, Result};
use crate::parameters::ParameterSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mechanism name with parameter overrides
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MechanismDesc {
    /// Mechanism name
    pub name: String,
    /// Parameter values by name
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: BTreeMap<String, f64>,
}

impl MechanismDesc {
    /// Mechanism with no parameter overrides
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Set a parameter value
    pub fn set(mut self, param: impl Into<String>, value: f64) -> Self {
        self.params.insert(param.into(), value);
        self
    }

    /// Parameter value, if set
    pub fn get(&self, param: &str) -> Option<f64> {
        self.params.get(param).copied()
    }
}

/// Constant current clamp
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IClamp {
    /// Onset (ms)
    pub delay: f64,
    /// Duration (ms)
    pub duration: f64,
    /// Injected current (nA)
    pub amplitude: f64,
}

impl IClamp {
    /// Create a new current clamp
    pub const fn new(delay: f64, duration: f64, amplitude: f64) -> Self {
        Self {
            delay,
            duration,
            amplitude,
        }
    }

    /// Current delivered at time `t` (nA)
    pub fn current_at(&self, t: f64) -> f64 {
        if t >= self.delay && t < self.delay + self.duration {
            self.amplitude
        } else {
            0.0
        }
    }
}

/// Property painted over a region
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Paint {
    /// Specific membrane capacitance (F/m²)
    MembraneCapacitance(f64),
    /// Axial resistivity (Ω·cm)
    AxialResistivity(f64),
    /// Temperature (K)
    TemperatureK(f64),
    /// Initial membrane potential (mV)
    InitMembranePotential(f64),
    /// Density mechanism
    Density(MechanismDesc),
}

/// Item placed at a location
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Place {
    /// Point mechanism, e.g. a synapse
    Mechanism(MechanismDesc),
    /// Current clamp stimulus
    IClamp(IClamp),
}

/// A cell: morphology, its embedding, and everything painted or placed on it
#[derive(Debug, Clone)]
pub struct CableCell {
    morphology: Morphology,
    embedding: Embedding,
    paints: Vec<(Region, Paint)>,
    placements: Vec<(Location, Place)>,
    defaults: ParameterSet,
}

impl CableCell {
    /// Create a cell with nothing painted or placed
    pub fn new(morphology: Morphology) -> Result<Self> {
        let embedding = Embedding::new(&morphology)?;
        Ok(Self {
            morphology,
            embedding,
            paints: Vec::new(),
            placements: Vec::new(),
            defaults: ParameterSet::default(),
        })
    }

    /// Paint a property over a region; later paints win where regions overlap
    pub fn paint(&mut self, region: Region, paint: Paint) -> Result<()> {
        region.check(&self.morphology)?;
        let value = match &paint {
            Paint::MembraneCapacitance(v) => Some(("membrane_capacitance", *v, *v >= 0.0)),
            Paint::AxialResistivity(v) => Some(("axial_resistivity", *v, *v > 0.0)),
            Paint::TemperatureK(v) => Some(("temperature_k", *v, *v > 0.0)),
            Paint::InitMembranePotential(v) => Some(("init_membrane_potential", *v, true)),
            Paint::Density(_) => None,
        };
        if let Some((name, v, ok)) = value {
            if !(v.is_finite() && ok) {
                return Err(FvmError::invalid_parameter(
                    name,
                    v.to_string(),
                    "finite value in range",
                ));
            }
        }
        self.paints.push((region, paint));
        Ok(())
    }

    /// Place an item at a location; returns its index among placements of the same kind
    pub fn place(&mut self, location: Location, place: Place) -> Result<usize> {
        self.morphology.check_location(location)?;
        if let Place::IClamp(clamp) = &place {
            if !(clamp.duration >= 0.0 && clamp.delay.is_finite() && clamp.amplitude.is_finite()) {
                return Err(FvmError::invalid_parameter(
                    "iclamp",
                    format!("{:?}", clamp),
                    "finite delay and amplitude, non-negative duration",
                ));
            }
        }
        let index = self
            .placements
            .iter()
            .filter(|(_, p)| core::mem::discriminant(p) == core::mem::discriminant(&place))
            .count();
        self.placements.push((location, place));
        Ok(index)
    }

    /// Replace the cell-level parameter defaults
    pub fn set_defaults(&mut self, defaults: ParameterSet) -> Result<()> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(())
    }

    /// Builder form of [`set_defaults`](Self::set_defaults)
    pub fn with_defaults(mut self, defaults: ParameterSet) -> Result<Self> {
        self.set_defaults(defaults)?;
        Ok(self)
    }

    /// The morphology
    pub fn morphology(&self) -> &Morphology {
        &self.morphology
    }

    /// The geometric embedding
    pub fn embedding(&self) -> &Embedding {
        &self.embedding
    }

    /// Painted properties, in paint order
    pub fn paints(&self) -> &[(Region, Paint)] {
        &self.paints
    }

    /// Placed items, in placement order
    pub fn placements(&self) -> &[(Location, Place)] {
        &self.placements
    }

    /// Cell-level defaults, overriding the global set
    pub fn defaults(&self) -> &ParameterSet {
        &self.defaults
    }

    /// Point mechanisms with their locations
    pub fn synapses(&self) -> impl Iterator<Item = (Location, &MechanismDesc)> {
        self.placements.iter().filter_map(|(loc, p)| match p {
            Place::Mechanism(m) => Some((*loc, m)),
            Place::IClamp(_) => None,
        })
    }

    /// Current clamps with their locations
    pub fn stimuli(&self) -> impl Iterator<Item = (Location, &IClamp)> {
        self.placements.iter().filter_map(|(loc, p)| match p {
            Place::IClamp(c) => Some((*loc, c)),
            Place::Mechanism(_) => None,
        })
    }

    /// Density mechanisms with their regions
    pub fn densities(&self) -> impl Iterator<Item = (&Region, &MechanismDesc)> {
        self.paints.iter().filter_map(|(reg, p)| match p {
            Paint::Density(m) => Some((reg, m)),
            _ => None,
        })
    }
}
