//! Implicit voltage integration for discretized cable cells.
//!
//! [`MatrixState`] holds the tree-structured conductance system of a group of
//! cells and solves it with the Hines algorithm. [`PassiveCellGroup`] drives
//! it for cells carrying the `pas` leak and current clamps.
//!
//! ```
//! use hines_fvm::{CableCell, MechanismDesc, Paint, ParameterSet};
//! use hines_morph::{Branch, Morphology, Point, Region};
//! use hines_solver::PassiveCellGroup;
//!
//! let morph = Morphology::new(
//!     false,
//!     vec![Branch::new(
//!         None,
//!         vec![Point::new(0.0, 0.0, 0.0, 1.0), Point::new(10.0, 0.0, 0.0, 1.0)],
//!     )],
//! )?;
//! let mut cell = CableCell::new(morph)?;
//! let all = Region::all(cell.morphology());
//! cell.paint(all, Paint::Density(MechanismDesc::new("pas")))?;
//!
//! let mut group = PassiveCellGroup::new(&[cell], &ParameterSet::neuron_defaults())?;
//! let trace = group.run(10.0, 0.1)?;
//! assert!(trace.cv(0).last().map_or(false, |v| *v < -69.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod matrix;
pub mod passive;

pub use error::{Result, SolverError};
pub use matrix::MatrixState;
pub use passive::{PassiveCellGroup, PassiveParams, Trace, DEFAULT_PAS_E, DEFAULT_PAS_G, PAS};
