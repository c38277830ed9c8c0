//! Cable-cell morphologies and their geometric embedding.
//!
//! A [`Morphology`] is a tree of branches, each a polyline of samples with a
//! radius. Points on it are [`Location`]s and sub-intervals are [`Cable`]s;
//! [`Locset`] and [`Region`] are sorted collections of those. The
//! [`Embedding`] turns a morphology into per-branch piecewise functions of
//! length, radius, membrane area and axial resistance that can be integrated
//! over cables.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod embedding;
pub mod error;
pub mod morphology;
pub mod piecewise;
pub mod primitives;
pub mod ratelem;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use embedding::Embedding;
pub use error::{MorphError, MorphologyError, PiecewiseError, Result};
pub use morphology::{Branch, Morphology, Point};
pub use piecewise::{meet, PwConstant, PwElements};
pub use primitives::{Cable, Location, Locset, Region};
