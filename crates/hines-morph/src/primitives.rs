//! Locations, cables, location sets and regions on a morphology

use core::cmp::Ordering;
use core::fmt;

use crate::error::{MorphError, Result};
use crate::morphology::Morphology;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point on a branch, given as a relative position in [0, 1]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Branch id
    pub branch: usize,
    /// Relative position along the branch
    pub pos: f64,
}

impl Location {
    /// Create a new location
    pub const fn new(branch: usize, pos: f64) -> Self {
        Self { branch, pos }
    }

    /// Position is finite and inside [0, 1]
    pub fn is_valid_pos(&self) -> bool {
        self.pos.is_finite() && (0.0..=1.0).contains(&self.pos)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Location {}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.branch
            .cmp(&other.branch)
            .then_with(|| self.pos.total_cmp(&other.pos))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(location {} {})", self.branch, self.pos)
    }
}

/// A sub-interval `[prox_pos, dist_pos]` of one branch
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cable {
    /// Branch id
    pub branch: usize,
    /// Proximal relative position
    pub prox_pos: f64,
    /// Distal relative position
    pub dist_pos: f64,
}

impl Cable {
    /// Create a new cable
    pub const fn new(branch: usize, prox_pos: f64, dist_pos: f64) -> Self {
        Self {
            branch,
            prox_pos,
            dist_pos,
        }
    }

    /// Cable covering a whole branch
    pub const fn whole(branch: usize) -> Self {
        Self::new(branch, 0.0, 1.0)
    }

    /// Proximal end
    pub const fn prox(&self) -> Location {
        Location::new(self.branch, self.prox_pos)
    }

    /// Distal end
    pub const fn dist(&self) -> Location {
        Location::new(self.branch, self.dist_pos)
    }

    /// Relative extent along the branch
    pub fn extent(&self) -> f64 {
        self.dist_pos - self.prox_pos
    }

    /// Cable collapses to a single point
    pub fn is_zero_extent(&self) -> bool {
        self.prox_pos == self.dist_pos
    }

    /// Location lies on this cable, ends included
    pub fn contains(&self, loc: Location) -> bool {
        loc.branch == self.branch && self.prox_pos <= loc.pos && loc.pos <= self.dist_pos
    }

    /// Midpoint of the cable
    pub fn midpoint(&self) -> Location {
        Location::new(self.branch, 0.5 * (self.prox_pos + self.dist_pos))
    }

    /// Ends are finite, ordered and inside [0, 1]
    pub fn is_valid(&self) -> bool {
        self.prox_pos.is_finite()
            && self.dist_pos.is_finite()
            && 0.0 <= self.prox_pos
            && self.prox_pos <= self.dist_pos
            && self.dist_pos <= 1.0
    }
}

impl PartialEq for Cable {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cable {}

impl PartialOrd for Cable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.branch
            .cmp(&other.branch)
            .then_with(|| self.prox_pos.total_cmp(&other.prox_pos))
            .then_with(|| self.dist_pos.total_cmp(&other.dist_pos))
    }
}

impl fmt::Display for Cable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(cable {} {} {})", self.branch, self.prox_pos, self.dist_pos)
    }
}

/// Sorted multiset of locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Locset {
    locations: Vec<Location>,
}

impl Locset {
    /// Build from arbitrary locations; the result is sorted
    pub fn new(mut locations: Vec<Location>) -> Self {
        locations.sort();
        Self { locations }
    }

    /// Empty location set
    pub fn nil() -> Self {
        Self::default()
    }

    /// The root of the morphology, `(0, 0)`
    pub fn root() -> Self {
        Self {
            locations: vec![Location::new(0, 0.0)],
        }
    }

    /// Distal end of every leaf branch
    pub fn terminal(morph: &Morphology) -> Self {
        Self::new(
            morph
                .terminal_branches()
                .map(|b| Location::new(b, 1.0))
                .collect(),
        )
    }

    /// The same relative position on every branch
    pub fn on_branches(morph: &Morphology, pos: f64) -> Self {
        Self::new(
            (0..morph.num_branches())
                .map(|b| Location::new(b, pos))
                .collect(),
        )
    }

    /// Sorted locations
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Iterate over the locations in order
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Number of locations, counting repeats
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// No locations
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Set union; a location repeated in both inputs keeps the larger multiplicity
    pub fn join(&self, other: &Locset) -> Locset {
        let (lhs, rhs) = (&self.locations, &other.locations);
        let mut out = Vec::with_capacity(lhs.len() + rhs.len());
        let (mut i, mut j) = (0, 0);
        while i < lhs.len() && j < rhs.len() {
            match lhs[i].cmp(&rhs[j]) {
                Ordering::Less => {
                    out.push(lhs[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(rhs[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(lhs[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&lhs[i..]);
        out.extend_from_slice(&rhs[j..]);
        Locset { locations: out }
    }

    /// Multiset sum, repeats accumulate
    pub fn sum(&self, other: &Locset) -> Locset {
        let mut out = Vec::with_capacity(self.len() + other.len());
        out.extend_from_slice(&self.locations);
        out.extend_from_slice(&other.locations);
        Locset::new(out)
    }

    /// Remove repeated locations
    pub fn dedup(mut self) -> Locset {
        self.locations.dedup();
        self
    }

    /// Keep only the locations that lie on the region
    pub fn restrict(&self, region: &Region) -> Locset {
        Locset {
            locations: self
                .locations
                .iter()
                .copied()
                .filter(|loc| region.contains(*loc))
                .collect(),
        }
    }

    /// Check every location against the morphology
    pub fn check(&self, morph: &Morphology) -> Result<()> {
        self.locations
            .iter()
            .try_for_each(|loc| morph.check_location(*loc))
    }
}

impl From<Location> for Locset {
    fn from(loc: Location) -> Self {
        Self {
            locations: vec![loc],
        }
    }
}

impl FromIterator<Location> for Locset {
    fn from_iter<I: IntoIterator<Item = Location>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Set of disjoint cables, sorted and merged per branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    cables: Vec<Cable>,
}

impl Region {
    /// Build a region; overlapping or abutting cables on a branch are merged
    pub fn new(mut cables: Vec<Cable>) -> Self {
        cables.sort();
        let mut merged: Vec<Cable> = Vec::with_capacity(cables.len());
        for c in cables {
            match merged.last_mut() {
                Some(last) if last.branch == c.branch && c.prox_pos <= last.dist_pos => {
                    if c.dist_pos > last.dist_pos {
                        last.dist_pos = c.dist_pos;
                    }
                }
                _ => merged.push(c),
            }
        }
        Self { cables: merged }
    }

    /// Empty region
    pub fn nil() -> Self {
        Self::default()
    }

    /// Every branch of the morphology
    pub fn all(morph: &Morphology) -> Self {
        Self {
            cables: (0..morph.num_branches()).map(Cable::whole).collect(),
        }
    }

    /// One whole branch
    pub fn branch(branch: usize) -> Self {
        Self {
            cables: vec![Cable::whole(branch)],
        }
    }

    /// A single cable
    pub fn cable(branch: usize, prox_pos: f64, dist_pos: f64) -> Self {
        Self::new(vec![Cable::new(branch, prox_pos, dist_pos)])
    }

    /// Cables in order
    pub fn cables(&self) -> &[Cable] {
        &self.cables
    }

    /// Iterate over the cables
    pub fn iter(&self) -> impl Iterator<Item = &Cable> {
        self.cables.iter()
    }

    /// Number of cables
    pub fn len(&self) -> usize {
        self.cables.len()
    }

    /// No cables
    pub fn is_empty(&self) -> bool {
        self.cables.is_empty()
    }

    /// Location lies on one of the cables, ends included
    pub fn contains(&self, loc: Location) -> bool {
        self.cables.iter().any(|c| c.contains(loc))
    }

    /// Check every cable against the morphology
    pub fn check(&self, morph: &Morphology) -> Result<()> {
        for c in &self.cables {
            if c.branch >= morph.num_branches() {
                return Err(MorphError::invalid_cable(
                    c.branch,
                    c.prox_pos,
                    c.dist_pos,
                    format!("morphology has {} branches", morph.num_branches()),
                ));
            }
            if !c.is_valid() {
                return Err(MorphError::invalid_cable(
                    c.branch,
                    c.prox_pos,
                    c.dist_pos,
                    "ends must satisfy 0 <= prox <= dist <= 1",
                ));
            }
        }
        Ok(())
    }

    /// Split into connected components.
    ///
    /// Cables meeting at a fork (the distal end of a parent and the proximal
    /// ends of its children) are connected, as are cables starting at the
    /// root of different top-level branches. Components are ordered by their
    /// first cable.
    pub fn components(&self, morph: &Morphology) -> Vec<Region> {
        let n = self.cables.len();
        let mut uf = UnionFind::new(n);

        // One representative cable per fork point; `None` is the root.
        let mut fork_owner: std::collections::HashMap<Option<usize>, usize> =
            std::collections::HashMap::new();
        for (i, c) in self.cables.iter().enumerate() {
            if c.prox_pos == 0.0 && c.branch < morph.num_branches() {
                let key = morph.branch_parent(c.branch);
                let owner = *fork_owner.entry(key).or_insert(i);
                uf.union(owner, i);
            }
            if c.dist_pos == 1.0 && c.branch < morph.num_branches() {
                if !morph.branch_children(c.branch).is_empty() {
                    let owner = *fork_owner.entry(Some(c.branch)).or_insert(i);
                    uf.union(owner, i);
                }
            }
        }

        let mut groups: Vec<(usize, Vec<Cable>)> = Vec::new();
        let mut group_of_root: std::collections::HashMap<usize, usize> =
            std::collections::HashMap::new();
        for (i, c) in self.cables.iter().enumerate() {
            let root = uf.find(i);
            let g = *group_of_root.entry(root).or_insert_with(|| {
                groups.push((i, Vec::new()));
                groups.len() - 1
            });
            groups[g].1.push(*c);
        }
        groups
            .into_iter()
            .map(|(_, cables)| Region { cables })
            .collect()
    }

    /// Proximal head and distal ends of every component.
    ///
    /// A head lying on a fork is reported in canonical form.
    pub fn boundary(&self, morph: &Morphology) -> Locset {
        let mut points = Vec::new();
        for comp in self.components(morph) {
            let ends_on = |b: usize| {
                comp.cables
                    .iter()
                    .any(|c| c.branch == b && c.dist_pos == 1.0)
            };
            let starts_on = |b: usize| {
                comp.cables
                    .iter()
                    .any(|c| c.branch == b && c.prox_pos == 0.0)
            };

            for c in &comp.cables {
                let is_head = match morph.branch_parent(c.branch) {
                    _ if c.prox_pos > 0.0 => true,
                    Some(p) => !ends_on(p),
                    None => true,
                };
                if is_head {
                    points.push(morph.canonical(c.prox()));
                }

                let continued = c.dist_pos == 1.0
                    && morph
                        .branch_children(c.branch)
                        .iter()
                        .any(|&child| starts_on(child));
                if !continued {
                    points.push(c.dist());
                }
            }
        }
        Locset::new(points).dedup()
    }
}

impl From<Cable> for Region {
    fn from(cable: Cable) -> Self {
        Self::new(vec![cable])
    }
}

impl FromIterator<Cable> for Region {
    fn from_iter<I: IntoIterator<Item = Cable>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::{Branch, Point};

    fn y_shape() -> Morphology {
        let p = |x: f64| Point::new(x, 0.0, 0.0, 1.0);
        Morphology::new(
            false,
            vec![
                Branch::new(None, vec![p(0.0), p(10.0)]),
                Branch::new(Some(0), vec![p(10.0), p(20.0)]),
                Branch::new(Some(0), vec![p(10.0), p(30.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_location_ordering() {
        let mut locs = vec![
            Location::new(1, 0.5),
            Location::new(0, 1.0),
            Location::new(1, 0.25),
        ];
        locs.sort();
        assert_eq!(
            locs,
            vec![
                Location::new(0, 1.0),
                Location::new(1, 0.25),
                Location::new(1, 0.5)
            ]
        );
    }

    #[test]
    fn test_join_and_sum() {
        let a = Locset::new(vec![Location::new(0, 0.5), Location::new(1, 0.0)]);
        let b = Locset::new(vec![Location::new(0, 0.5), Location::new(2, 1.0)]);

        let joined = a.join(&b);
        assert_eq!(joined.len(), 3);

        let summed = a.sum(&b);
        assert_eq!(summed.len(), 4);
        assert_eq!(summed.locations()[0], Location::new(0, 0.5));
        assert_eq!(summed.locations()[1], Location::new(0, 0.5));
        assert_eq!(summed.dedup().len(), 3);
    }

    #[test]
    fn test_region_merges_cables() {
        let reg = Region::new(vec![
            Cable::new(0, 0.5, 1.0),
            Cable::new(0, 0.0, 0.5),
            Cable::new(1, 0.2, 0.4),
            Cable::new(1, 0.3, 0.6),
        ]);
        assert_eq!(
            reg.cables(),
            &[Cable::new(0, 0.0, 1.0), Cable::new(1, 0.2, 0.6)]
        );
    }

    #[test]
    fn test_components_connect_through_forks() {
        let m = y_shape();

        let all = Region::all(&m);
        assert_eq!(all.components(&m).len(), 1);

        // Siblings share the fork point even without their parent.
        let siblings = Region::new(vec![Cable::new(1, 0.0, 0.5), Cable::new(2, 0.0, 0.5)]);
        assert_eq!(siblings.components(&m).len(), 1);

        let split = Region::new(vec![Cable::new(0, 0.0, 0.5), Cable::new(1, 0.0, 1.0)]);
        assert_eq!(split.components(&m).len(), 2);
    }

    #[test]
    fn test_boundary() {
        let m = y_shape();

        let b = Region::all(&m).boundary(&m);
        assert_eq!(
            b.locations(),
            &[
                Location::new(0, 0.0),
                Location::new(1, 1.0),
                Location::new(2, 1.0)
            ]
        );

        let siblings = Region::new(vec![Cable::new(1, 0.0, 0.5), Cable::new(2, 0.0, 0.5)]);
        let b = siblings.boundary(&m);
        assert_eq!(
            b.locations(),
            &[
                Location::new(0, 1.0),
                Location::new(1, 0.5),
                Location::new(2, 0.5)
            ]
        );
    }

    #[test]
    fn test_restrict() {
        let m = y_shape();
        let ls = Locset::on_branches(&m, 0.5);
        let reg = Region::new(vec![Cable::new(1, 0.0, 1.0)]);
        assert_eq!(ls.restrict(&reg).locations(), &[Location::new(1, 0.5)]);
    }
}
