//! Finite volume discretization of cable cells.
//!
//! A [`CableCell`] couples a morphology with painted properties and placed
//! items. A [`CvPolicy`] chooses the boundary points of the control volumes,
//! [`CvGeometry`] splits the cell into CVs at those points, and
//! [`fvm_cv_discretize`] computes the per-CV quantities the solver needs.
//!
//! ```
//! use hines_fvm::{fvm_cv_discretize, CableCell, CvPolicy, ParameterSet};
//! use hines_morph::{Branch, Morphology, Point};
//!
//! let morph = Morphology::new(
//!     false,
//!     vec![Branch::new(
//!         None,
//!         vec![Point::new(0.0, 0.0, 0.0, 1.0), Point::new(10.0, 0.0, 0.0, 1.0)],
//!     )],
//! )?;
//! let cell = CableCell::new(morph)?;
//! let params = ParameterSet::neuron_defaults().with_discretization(CvPolicy::fixed_per_branch(4));
//! let d = fvm_cv_discretize(&cell, &params)?;
//! assert_eq!(d.size(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cable_cell;
pub mod cv_geometry;
pub mod cv_policy;
pub mod discretize;
pub mod error;
pub mod mechanisms;
pub mod parameters;

pub use cable_cell::{CableCell, IClamp, MechanismDesc, Paint, Place};
pub use cv_geometry::{CvGeometry, CvPrefer};
pub use cv_policy::{CvPolicy, CvPolicyFlags};
pub use discretize::{fvm_cv_discretize, fvm_cv_discretize_cells, FvmCvDiscretization};
pub use error::{FvmError, Result};
pub use mechanisms::{
    fvm_build_mechanism_data, FvmMechanismConfig, FvmMechanismData, FvmStimulusConfig,
    MechanismKind,
};
pub use parameters::{
    ParameterSet, ResolvedParameters, DEFAULT_AXIAL_RESISTIVITY, DEFAULT_INIT_MEMBRANE_POTENTIAL,
    DEFAULT_MEMBRANE_CAPACITANCE, DEFAULT_TEMPERATURE_K,
};
