//! Discretization policies: where CV boundaries go on a cell

use core::ops::{BitAnd, BitOr, BitOrAssign};

use hines_morph::{Locset, Location, Region};

use crate::cable_cell::CableCell;
use crate::error::{FvmError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Composable policy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CvPolicyFlags(u8);

impl CvPolicyFlags {
    /// No flags
    pub const NONE: Self = Self(0);

    /// CVs straddle forks instead of a zero-extent CV sitting on each fork
    pub const INTERIOR_FORKS: Self = Self(1);

    /// Branch 0 forms a single CV regardless of the other parameters
    pub const SINGLE_ROOT_CV: Self = Self(2);

    /// All bits of `other` are set in `self`
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for CvPolicyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CvPolicyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CvPolicyFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Rule mapping a cell to its set of CV boundary points.
///
/// Every variant can be restricted to a `domain`; the boundary of the domain
/// is always part of the result. Without a domain the whole cell is used.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CvPolicy {
    /// Boundary points given verbatim
    Explicit {
        /// Boundary points
        locset: Locset,
        /// Optional restriction
        domain: Option<Region>,
    },
    /// Equal number of CVs on every branch
    FixedPerBranch {
        /// CVs per branch
        cv_per_branch: usize,
        /// Policy flags
        flags: CvPolicyFlags,
        /// Optional restriction
        domain: Option<Region>,
    },
    /// Enough CVs on every branch that none is longer than `max_extent` µm
    MaxExtent {
        /// Maximum CV length (µm)
        max_extent: f64,
        /// Policy flags
        flags: CvPolicyFlags,
        /// Optional restriction
        domain: Option<Region>,
    },
    /// A boundary at every sample point and every branch start
    EverySample {
        /// Optional restriction
        domain: Option<Region>,
    },
    /// One CV per connected component of the domain
    Single {
        /// Optional restriction
        domain: Option<Region>,
    },
}

impl Default for CvPolicy {
    fn default() -> Self {
        Self::fixed_per_branch(1)
    }
}

impl CvPolicy {
    /// Explicit boundary points
    pub fn explicit(locset: Locset) -> Self {
        Self::Explicit {
            locset,
            domain: None,
        }
    }

    /// Fixed number of CVs per branch
    pub fn fixed_per_branch(cv_per_branch: usize) -> Self {
        Self::FixedPerBranch {
            cv_per_branch,
            flags: CvPolicyFlags::NONE,
            domain: None,
        }
    }

    /// Maximum CV extent in µm
    pub fn max_extent(max_extent: f64) -> Self {
        Self::MaxExtent {
            max_extent,
            flags: CvPolicyFlags::NONE,
            domain: None,
        }
    }

    /// Boundary at every sample
    pub fn every_sample() -> Self {
        Self::EverySample { domain: None }
    }

    /// One CV for the whole domain
    pub fn single() -> Self {
        Self::Single { domain: None }
    }

    /// Replace the flags; variants without flags are returned unchanged
    pub fn with_flags(mut self, new_flags: CvPolicyFlags) -> Self {
        match &mut self {
            Self::FixedPerBranch { flags, .. } | Self::MaxExtent { flags, .. } => *flags = new_flags,
            _ => {}
        }
        self
    }

    /// Restrict the policy to a region
    pub fn with_domain(mut self, region: Region) -> Self {
        match &mut self {
            Self::Explicit { domain, .. }
            | Self::FixedPerBranch { domain, .. }
            | Self::MaxExtent { domain, .. }
            | Self::EverySample { domain }
            | Self::Single { domain } => *domain = Some(region),
        }
        self
    }

    /// Restricting region, if any
    pub fn domain(&self) -> Option<&Region> {
        match self {
            Self::Explicit { domain, .. }
            | Self::FixedPerBranch { domain, .. }
            | Self::MaxExtent { domain, .. }
            | Self::EverySample { domain }
            | Self::Single { domain } => domain.as_ref(),
        }
    }

    /// Check numeric parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::FixedPerBranch { cv_per_branch: 0, .. } => Err(FvmError::invalid_parameter(
                "cv_per_branch",
                "0",
                ">= 1",
            )),
            Self::MaxExtent { max_extent, .. } if max_extent.is_nan() => Err(
                FvmError::invalid_parameter("max_extent", "NaN", "a number"),
            ),
            _ => Ok(()),
        }
    }

    /// Compute the CV boundary points for a cell
    pub fn boundary_points(&self, cell: &CableCell) -> Result<Locset> {
        self.validate()?;
        let morph = cell.morphology();

        if let Self::Explicit { locset, domain: None } = self {
            return Ok(locset.clone());
        }
        if morph.is_empty() {
            return Ok(Locset::nil());
        }

        let domain = match self.domain() {
            Some(d) => {
                d.check(morph)?;
                d.clone()
            }
            None => Region::all(morph),
        };
        let boundary = domain.boundary(morph);

        let points = match self {
            Self::Explicit { locset, .. } => locset.restrict(&domain),
            Self::FixedPerBranch {
                cv_per_branch,
                flags,
                ..
            } => spaced_points(cell, &domain, *flags, |_| Ok(*cv_per_branch))?,
            Self::MaxExtent {
                max_extent, flags, ..
            } => {
                if !(*max_extent > 0.0) {
                    return Ok(Locset::nil());
                }
                let oomax = 1.0 / max_extent;
                spaced_points(cell, &domain, *flags, |c| {
                    let len = cell.embedding().integrate_length(c)?;
                    Ok(((len * oomax).ceil() as usize).max(1))
                })?
            }
            Self::EverySample { .. } => {
                let samples = Locset::new(cell.embedding().sample_locations().to_vec()).dedup();
                Locset::on_branches(morph, 0.0)
                    .join(&samples)
                    .restrict(&domain)
            }
            Self::Single { .. } => Locset::nil(),
        };

        let result = points.join(&boundary);
        log::debug!(
            "CV policy {} produced {} boundary points",
            self.name(),
            result.len()
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Explicit { .. } => "explicit",
            Self::FixedPerBranch { .. } => "fixed_per_branch",
            Self::MaxExtent { .. } => "max_extent",
            Self::EverySample { .. } => "every_sample",
            Self::Single { .. } => "single",
        }
    }
}

fn spaced_points(
    cell: &CableCell,
    domain: &Region,
    flags: CvPolicyFlags,
    ncv_of: impl Fn(&hines_morph::Cable) -> Result<usize>,
) -> Result<Locset> {
    let interior_forks = flags.contains(CvPolicyFlags::INTERIOR_FORKS);
    let single_root = flags.contains(CvPolicyFlags::SINGLE_ROOT_CV);

    let mut points = Vec::new();
    for comp in domain.components(cell.morphology()) {
        for c in comp.cables() {
            if single_root && c.branch == 0 {
                points.push(c.prox());
                points.push(c.dist());
                continue;
            }

            let ncv = ncv_of(c)?.max(1);
            let scale = c.extent() / ncv as f64;
            if interior_forks {
                for i in 0..ncv {
                    let pos = c.prox_pos + (1 + 2 * i) as f64 * scale / 2.0;
                    points.push(Location::new(c.branch, pos));
                }
            } else {
                for i in 0..ncv {
                    points.push(Location::new(c.branch, c.prox_pos + i as f64 * scale));
                }
                points.push(c.dist());
            }
        }
    }
    Ok(Locset::new(points).dedup())
}
