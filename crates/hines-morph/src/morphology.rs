//! Branching cable morphologies

use smallvec::SmallVec;

use crate::error::{MorphError, MorphologyError, Result};
use crate::primitives::Location;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sample point on a branch: position and radius in µm
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// x coordinate (µm)
    pub x: f64,
    /// y coordinate (µm)
    pub y: f64,
    /// z coordinate (µm)
    pub z: f64,
    /// Radius (µm)
    pub radius: f64,
}

impl Point {
    /// Create a new sample point
    pub const fn new(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self { x, y, z, radius }
    }

    /// Euclidean distance between the centres of two points
    pub fn distance(&self, other: &Point) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A branch: parent id and the polyline of samples along it
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Branch {
    /// Parent branch, `None` for a top-level branch
    pub parent: Option<usize>,
    /// Samples from proximal to distal end
    pub samples: Vec<Point>,
}

impl Branch {
    /// Create a new branch
    pub fn new(parent: Option<usize>, samples: Vec<Point>) -> Self {
        Self { parent, samples }
    }
}

/// Immutable, validated tree of branches.
///
/// Branch 0 is the root branch and may be spherical, in which case it is
/// described by a single sample (centre and radius). All top-level branches
/// start at the root point.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    branches: Vec<Branch>,
    spherical_root: bool,
    children: Vec<SmallVec<[usize; 4]>>,
    top_level: SmallVec<[usize; 4]>,
}

impl Morphology {
    /// Validate and build a morphology
    pub fn new(spherical_root: bool, branches: Vec<Branch>) -> std::result::Result<Self, MorphologyError> {
        let n = branches.len();

        if let Some(first) = branches.first() {
            if let Some(parent) = first.parent {
                return Err(MorphologyError::RootHasParent { parent });
            }
        }

        for (bid, branch) in branches.iter().enumerate() {
            if let Some(parent) = branch.parent {
                if parent >= n {
                    return Err(MorphologyError::OrphanBranch { branch: bid, parent });
                }
            }

            let spherical = spherical_root && bid == 0;
            if spherical && branch.samples.len() != 1 {
                return Err(MorphologyError::InvalidSphericalRoot {
                    count: branch.samples.len(),
                });
            }
            if !spherical && branch.samples.len() < 2 {
                return Err(MorphologyError::TooFewSamples {
                    branch: bid,
                    count: branch.samples.len(),
                    expected: 2,
                });
            }

            for (i, s) in branch.samples.iter().enumerate() {
                if !(s.x.is_finite() && s.y.is_finite() && s.z.is_finite()) {
                    return Err(MorphologyError::InvalidSample {
                        branch: bid,
                        sample: i,
                        reason: "non-finite coordinate".to_string(),
                    });
                }
                if !(s.radius.is_finite() && s.radius > 0.0) {
                    return Err(MorphologyError::InvalidSample {
                        branch: bid,
                        sample: i,
                        reason: format!("radius {} must be finite and positive", s.radius),
                    });
                }
            }
        }

        // Walk up from every branch; a walk longer than n steps must loop.
        for bid in 0..n {
            let mut steps = 0;
            let mut cur = branches[bid].parent;
            while let Some(p) = cur {
                steps += 1;
                if steps > n {
                    return Err(MorphologyError::Cycle { branch: bid });
                }
                cur = branches[p].parent;
            }
        }

        let mut children: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
        let mut top_level = SmallVec::new();
        for (bid, branch) in branches.iter().enumerate() {
            match branch.parent {
                Some(p) => children[p].push(bid),
                None => top_level.push(bid),
            }
        }

        log::debug!(
            "Built morphology with {} branches ({} top-level, spherical root: {})",
            n,
            top_level.len(),
            spherical_root
        );

        Ok(Self {
            branches,
            spherical_root,
            children,
            top_level,
        })
    }

    /// Morphology with no branches
    pub fn empty() -> Self {
        Self {
            branches: Vec::new(),
            spherical_root: false,
            children: Vec::new(),
            top_level: SmallVec::new(),
        }
    }

    /// Number of branches
    pub fn num_branches(&self) -> usize {
        self.branches.len()
    }

    /// No branches
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Root branch is a sphere
    pub fn spherical_root(&self) -> bool {
        self.spherical_root
    }

    /// Total number of samples over all branches
    pub fn num_samples(&self) -> usize {
        self.branches.iter().map(|b| b.samples.len()).sum()
    }

    /// Branch description
    pub fn branch(&self, bid: usize) -> Option<&Branch> {
        self.branches.get(bid)
    }

    /// All branches in id order
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Samples of a branch
    ///
    /// # Panics
    /// Panics if `bid` is out of range.
    pub fn branch_samples(&self, bid: usize) -> &[Point] {
        &self.branches[bid].samples
    }

    /// Parent of a branch, `None` for top-level or unknown branches
    pub fn branch_parent(&self, bid: usize) -> Option<usize> {
        self.branches.get(bid).and_then(|b| b.parent)
    }

    /// Children of a branch
    pub fn branch_children(&self, bid: usize) -> &[usize] {
        self.children.get(bid).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Branches without a parent
    pub fn top_level_branches(&self) -> &[usize] {
        &self.top_level
    }

    /// Branch has no children
    pub fn is_leaf(&self, bid: usize) -> bool {
        self.branch_children(bid).is_empty()
    }

    /// Branches with no children, in id order
    pub fn terminal_branches(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_branches()).filter(move |&b| self.is_leaf(b))
    }

    /// Fail with `InvalidLocation` if the location is not on this morphology
    pub fn check_location(&self, loc: Location) -> Result<()> {
        if loc.branch >= self.num_branches() {
            return Err(MorphError::invalid_location(
                loc.branch,
                loc.pos,
                format!("morphology has {} branches", self.num_branches()),
            ));
        }
        if !loc.is_valid_pos() {
            return Err(MorphError::invalid_location(
                loc.branch,
                loc.pos,
                "position must be in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Canonical representative of a location.
    ///
    /// The proximal end of a child branch is the distal end of its parent;
    /// the proximal end of any top-level branch is the root `(0, 0)`.
    pub fn canonical(&self, loc: Location) -> Location {
        if loc.pos != 0.0 {
            return loc;
        }
        match self.branch_parent(loc.branch) {
            Some(p) => Location::new(p, 1.0),
            None => Location::new(0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64) -> Point {
        Point::new(x, 0.0, 0.0, 1.0)
    }

    #[test]
    fn test_valid_morphology() {
        let m = Morphology::new(
            true,
            vec![
                Branch::new(None, vec![Point::new(0.0, 0.0, 0.0, 5.0)]),
                Branch::new(Some(0), vec![p(5.0), p(15.0)]),
                Branch::new(Some(0), vec![p(-5.0), p(-15.0)]),
                Branch::new(Some(1), vec![p(15.0), p(25.0), p(35.0)]),
            ],
        )
        .unwrap();

        assert_eq!(m.num_branches(), 4);
        assert_eq!(m.num_samples(), 8);
        assert_eq!(m.branch_children(0), &[1, 2]);
        assert_eq!(m.top_level_branches(), &[0]);
        assert_eq!(m.terminal_branches().collect::<Vec<_>>(), vec![2, 3]);
        assert!(m.spherical_root());
    }

    #[test]
    fn test_structural_errors() {
        let orphan = Morphology::new(
            false,
            vec![
                Branch::new(None, vec![p(0.0), p(1.0)]),
                Branch::new(Some(7), vec![p(1.0), p(2.0)]),
            ],
        );
        assert_eq!(
            orphan.unwrap_err(),
            MorphologyError::OrphanBranch { branch: 1, parent: 7 }
        );

        let cycle = Morphology::new(
            false,
            vec![
                Branch::new(None, vec![p(0.0), p(1.0)]),
                Branch::new(Some(2), vec![p(1.0), p(2.0)]),
                Branch::new(Some(1), vec![p(2.0), p(3.0)]),
            ],
        );
        assert!(matches!(cycle, Err(MorphologyError::Cycle { .. })));

        let short = Morphology::new(false, vec![Branch::new(None, vec![p(0.0)])]);
        assert!(matches!(short, Err(MorphologyError::TooFewSamples { .. })));

        let sphere = Morphology::new(true, vec![Branch::new(None, vec![p(0.0), p(1.0)])]);
        assert!(matches!(
            sphere,
            Err(MorphologyError::InvalidSphericalRoot { count: 2 })
        ));

        let bad_radius = Morphology::new(
            false,
            vec![Branch::new(None, vec![p(0.0), Point::new(1.0, 0.0, 0.0, 0.0)])],
        );
        assert!(matches!(bad_radius, Err(MorphologyError::InvalidSample { sample: 1, .. })));
    }

    #[test]
    fn test_canonical_and_checks() {
        let m = Morphology::new(
            false,
            vec![
                Branch::new(None, vec![p(0.0), p(1.0)]),
                Branch::new(Some(0), vec![p(1.0), p(2.0)]),
                Branch::new(None, vec![p(0.0), p(-1.0)]),
            ],
        )
        .unwrap();

        assert_eq!(m.canonical(Location::new(1, 0.0)), Location::new(0, 1.0));
        assert_eq!(m.canonical(Location::new(2, 0.0)), Location::new(0, 0.0));
        assert_eq!(m.canonical(Location::new(1, 0.3)), Location::new(1, 0.3));

        assert!(m.check_location(Location::new(1, 0.5)).is_ok());
        assert!(m.check_location(Location::new(3, 0.5)).is_err());
        assert!(m.check_location(Location::new(1, 1.5)).is_err());
        assert!(m.check_location(Location::new(1, f64::NAN)).is_err());
    }
}
