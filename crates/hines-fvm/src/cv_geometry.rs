//! Partition of cells into control volumes.
//!
//! A [`CvGeometry`] holds, for a batch of cells, the cables making up each
//! CV, the CV tree (parent and children), and the partition of CVs by cell.
//! CV indices within a cell are numbered so that a parent always precedes
//! its children; the first CV of each cell is its root CV.

use core::ops::Range;

use hines_morph::{Cable, Location, Locset, MorphError, Morphology, PwElements};

use crate::error::{FvmError, Result};

/// How to choose between CVs when a location lies on a CV boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CvPrefer {
    /// The most distal CV, ties to zero-extent CVs included
    #[default]
    Distal,
    /// The most proximal CV
    Proximal,
    /// A CV of non-zero extent where there is one
    Nonempty,
    /// A zero-extent CV where there is one
    Empty,
}

/// CV decomposition of one or more cells
#[derive(Debug, Clone, PartialEq)]
pub struct CvGeometry {
    cv_cables: Vec<Cable>,
    cv_cables_divs: Vec<usize>,
    cv_parent: Vec<Option<usize>>,
    cv_children: Vec<usize>,
    cv_children_divs: Vec<usize>,
    cv_to_cell: Vec<usize>,
    cell_cv_divs: Vec<usize>,
    // Per cell, per branch: relative position -> cell-local CV index.
    branch_cv_map: Vec<Vec<PwElements<usize>>>,
}

impl Default for CvGeometry {
    fn default() -> Self {
        Self::new()
    }
}

enum Head {
    Root,
    At(Location),
}

impl CvGeometry {
    /// Geometry with no cells
    pub fn new() -> Self {
        Self {
            cv_cables: Vec::new(),
            cv_cables_divs: vec![0],
            cv_parent: Vec::new(),
            cv_children: Vec::new(),
            cv_children_divs: vec![0],
            cv_to_cell: Vec::new(),
            cell_cv_divs: vec![0],
            branch_cv_map: Vec::new(),
        }
    }

    /// Build the CVs of a single cell from its boundary points.
    ///
    /// The root point and the distal ends of leaf branches never split a CV.
    /// A boundary at both `(p, 1)` and the start of every child of `p` yields
    /// a zero-extent CV on the fork, holding one point cable per branch that
    /// meets there.
    pub fn from_ends(morph: &Morphology, ends: &Locset) -> Result<Self> {
        for w in ends.locations().windows(2) {
            if w[0] == w[1] {
                return Err(FvmError::invalid_discretization(
                    w[0],
                    "duplicate boundary point",
                ));
            }
        }
        for loc in ends.iter() {
            morph
                .check_location(*loc)
                .map_err(|e| FvmError::invalid_discretization(*loc, e.to_string()))?;
        }

        let n_branch = morph.num_branches();
        let mut geom = Self::new();
        if n_branch == 0 {
            geom.cell_cv_divs.push(0);
            geom.branch_cv_map.push(Vec::new());
            return Ok(geom);
        }

        // Boundary positions per branch, already sorted.
        let mut ends_on: Vec<Vec<f64>> = vec![Vec::new(); n_branch];
        for loc in ends.iter() {
            let root_point = loc.pos == 0.0 && morph.branch_parent(loc.branch).is_none();
            let terminal = loc.pos == 1.0 && morph.is_leaf(loc.branch);
            if !root_point && !terminal {
                ends_on[loc.branch].push(loc.pos);
            }
        }

        let mut heads: Vec<(Head, Option<usize>)> = vec![(Head::Root, None)];
        while let Some((head, parent)) = heads.pop() {
            let cv = geom.cv_parent.len();
            geom.cv_parent.push(parent);

            let mut cables = Vec::new();
            let mut next = Vec::new();

            // (branch, start position, whether a boundary at the start counts)
            let mut work: Vec<(usize, f64, bool)> = match head {
                Head::Root => morph
                    .top_level_branches()
                    .iter()
                    .rev()
                    .map(|&b| (b, 0.0, true))
                    .collect(),
                Head::At(loc) => vec![(loc.branch, loc.pos, false)],
            };

            while let Some((b, from, inclusive)) = work.pop() {
                let e = &ends_on[b];
                let k = if inclusive {
                    e.partition_point(|&x| x < from)
                } else {
                    e.partition_point(|&x| x <= from)
                };
                match e.get(k) {
                    Some(&to) => {
                        cables.push(Cable::new(b, from, to));
                        next.push(Location::new(b, to));
                    }
                    None => {
                        cables.push(Cable::new(b, from, 1.0));
                        for &child in morph.branch_children(b).iter().rev() {
                            work.push((child, 0.0, true));
                        }
                    }
                }
            }

            if cables.iter().any(|c| !c.is_zero_extent()) {
                cables.retain(|c| !c.is_zero_extent());
            }
            cables.sort();
            geom.cv_cables.extend(cables);
            geom.cv_cables_divs.push(geom.cv_cables.len());

            next.sort();
            for loc in next.into_iter().rev() {
                heads.push((Head::At(loc), Some(cv)));
            }
        }

        let n_cv = geom.cv_parent.len();
        geom.cv_to_cell = vec![0; n_cv];
        geom.cell_cv_divs.push(n_cv);
        geom.rebuild_children();

        let mut per_branch: Vec<Vec<(Cable, usize)>> = vec![Vec::new(); n_branch];
        for cv in 0..n_cv {
            for c in geom.cables(cv) {
                per_branch[c.branch].push((*c, cv));
            }
        }
        let mut cell_map = Vec::with_capacity(n_branch);
        for mut pieces in per_branch {
            pieces.sort_by(|a, b| a.0.cmp(&b.0));
            let mut pw = PwElements::new();
            for (c, cv) in pieces {
                pw.push(c.prox_pos, c.dist_pos, cv).map_err(MorphError::from)?;
            }
            cell_map.push(pw);
        }
        geom.branch_cv_map.push(cell_map);

        debug_assert!(geom.tiles(morph, 0), "CVs do not tile the morphology");
        log::debug!(
            "Built {} CVs from {} boundary points on {} branches",
            n_cv,
            ends.len(),
            n_branch
        );
        Ok(geom)
    }

    fn rebuild_children(&mut self) {
        let n = self.cv_parent.len();
        let mut counts = vec![0usize; n];
        for p in self.cv_parent.iter().flatten() {
            counts[*p] += 1;
        }
        self.cv_children_divs = Vec::with_capacity(n + 1);
        self.cv_children_divs.push(0);
        for c in &counts {
            let last = self.cv_children_divs[self.cv_children_divs.len() - 1];
            self.cv_children_divs.push(last + c);
        }
        let mut fill = self.cv_children_divs[..n].to_vec();
        self.cv_children = vec![0; self.cv_children_divs[n]];
        for (cv, p) in self.cv_parent.iter().enumerate() {
            if let Some(p) = p {
                self.cv_children[fill[*p]] = cv;
                fill[*p] += 1;
            }
        }
    }

    /// Non-degenerate cables of the cell's CVs cover every branch exactly once
    fn tiles(&self, morph: &Morphology, cell: usize) -> bool {
        let mut per_branch: Vec<Vec<(f64, f64)>> = vec![Vec::new(); morph.num_branches()];
        for cv in self.cell_cv_range(cell) {
            for c in self.cables(cv).iter().filter(|c| !c.is_zero_extent()) {
                match per_branch.get_mut(c.branch) {
                    Some(v) => v.push((c.prox_pos, c.dist_pos)),
                    None => return false,
                }
            }
        }
        per_branch.iter_mut().all(|v| {
            v.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut upper = 0.0;
            for &(lo, hi) in v.iter() {
                if lo != upper {
                    return false;
                }
                upper = hi;
            }
            upper == 1.0
        })
    }

    /// Append the CVs of another batch, re-indexing its CVs and cells
    pub fn append(&mut self, other: &CvGeometry) -> &mut Self {
        let cv_offset = self.size();
        let cable_offset = self.cv_cables.len();
        let cell_offset = self.n_cell();
        let child_offset = self.cv_children.len();

        self.cv_cables.extend_from_slice(&other.cv_cables);
        self.cv_cables_divs
            .extend(other.cv_cables_divs[1..].iter().map(|d| d + cable_offset));
        self.cv_parent
            .extend(other.cv_parent.iter().map(|p| p.map(|p| p + cv_offset)));
        self.cv_children
            .extend(other.cv_children.iter().map(|c| c + cv_offset));
        self.cv_children_divs
            .extend(other.cv_children_divs[1..].iter().map(|d| d + child_offset));
        self.cv_to_cell
            .extend(other.cv_to_cell.iter().map(|c| c + cell_offset));
        self.cell_cv_divs
            .extend(other.cell_cv_divs[1..].iter().map(|d| d + cv_offset));
        self.branch_cv_map.extend(other.branch_cv_map.iter().cloned());
        self
    }

    /// Number of CVs
    pub fn size(&self) -> usize {
        self.cv_parent.len()
    }

    /// No CVs
    pub fn is_empty(&self) -> bool {
        self.cv_parent.is_empty()
    }

    /// Number of cells
    pub fn n_cell(&self) -> usize {
        self.cell_cv_divs.len() - 1
    }

    /// Cables of a CV
    pub fn cables(&self, cv: usize) -> &[Cable] {
        &self.cv_cables[self.cv_cables_divs[cv]..self.cv_cables_divs[cv + 1]]
    }

    /// All cables, partitioned by [`cv_cables_divs`](Self::cv_cables_divs)
    pub fn cv_cables(&self) -> &[Cable] {
        &self.cv_cables
    }

    /// Partition of `cv_cables` by CV
    pub fn cv_cables_divs(&self) -> &[usize] {
        &self.cv_cables_divs
    }

    /// Parent of each CV, `None` for root CVs
    pub fn cv_parent(&self) -> &[Option<usize>] {
        &self.cv_parent
    }

    /// Parent of a CV
    pub fn parent(&self, cv: usize) -> Option<usize> {
        self.cv_parent[cv]
    }

    /// Children of a CV in index order
    pub fn children(&self, cv: usize) -> &[usize] {
        &self.cv_children[self.cv_children_divs[cv]..self.cv_children_divs[cv + 1]]
    }

    /// Cell index of each CV
    pub fn cv_to_cell(&self) -> &[usize] {
        &self.cv_to_cell
    }

    /// Partition of CV indices by cell
    pub fn cell_cv_divs(&self) -> &[usize] {
        &self.cell_cv_divs
    }

    /// CV indices of a cell
    pub fn cell_cv_range(&self, cell: usize) -> Range<usize> {
        self.cell_cv_divs[cell]..self.cell_cv_divs[cell + 1]
    }

    /// Branch position to cell-local CV maps of a cell
    pub fn branch_cv_map(&self, cell: usize) -> &[PwElements<usize>] {
        &self.branch_cv_map[cell]
    }

    /// Parent index array with root CVs pointing at themselves
    pub fn parent_index(&self) -> Vec<usize> {
        self.cv_parent
            .iter()
            .enumerate()
            .map(|(cv, p)| p.unwrap_or(cv))
            .collect()
    }

    /// Global index of the CV holding a location of a cell
    pub fn location_cv(&self, cell: usize, loc: Location, prefer: CvPrefer) -> Result<usize> {
        let not_found = |reason: &str| {
            FvmError::from(MorphError::invalid_location(loc.branch, loc.pos, reason))
        };
        let map = self
            .branch_cv_map
            .get(cell)
            .ok_or_else(|| not_found("no such cell"))?;
        let pw = map
            .get(loc.branch)
            .ok_or_else(|| not_found("no such branch on cell"))?;
        let mut i = pw
            .index_of(loc.pos)
            .ok_or_else(|| not_found("position outside branch"))?;

        let zero_extent = |j: usize| {
            let (lo, hi) = pw.interval(j);
            lo == hi
        };
        let i_max = pw.len() - 1;
        let cv_prox = pw.interval(i).0;

        match prefer {
            CvPrefer::Distal => {}
            CvPrefer::Proximal => {
                if loc.pos == cv_prox && i > 0 {
                    i -= 1;
                }
            }
            CvPrefer::Nonempty => {
                if zero_extent(i) {
                    if i > 0 && !zero_extent(i - 1) {
                        i -= 1;
                    } else if i < i_max && !zero_extent(i + 1) {
                        i += 1;
                    }
                }
            }
            CvPrefer::Empty => {
                if loc.pos == cv_prox && i > 0 && zero_extent(i - 1) {
                    i -= 1;
                }
            }
        }

        Ok(self.cell_cv_divs[cell] + pw.element(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hines_morph::fixtures;

    fn c(b: usize, p: f64, d: f64) -> Cable {
        Cable::new(b, p, d)
    }

    #[test]
    fn test_trivial_locsets_give_one_cv() {
        let m = fixtures::m_reg_b6();
        for ends in [Locset::nil(), Locset::root(), Locset::terminal(&m)] {
            let g = CvGeometry::from_ends(&m, &ends).unwrap();
            assert_eq!(g.size(), 1);
            assert_eq!(g.n_cell(), 1);
            assert_eq!(g.parent(0), None);
            assert_eq!(
                g.cables(0),
                &[c(0, 0., 1.), c(1, 0., 1.), c(2, 0., 1.), c(3, 0., 1.), c(4, 0., 1.), c(5, 0., 1.)]
            );
        }
    }

    #[test]
    fn test_fork_cvs() {
        let m = fixtures::m_sph_b6();
        let ends = Locset::new(
            (0..6)
                .flat_map(|b| [Location::new(b, 0.0), Location::new(b, 1.0)])
                .collect(),
        );
        let g = CvGeometry::from_ends(&m, &ends).unwrap();

        assert_eq!(g.size(), 8);
        assert_eq!(g.cables(0), &[c(0, 0., 1.)]);
        assert_eq!(g.cables(1), &[c(0, 1., 1.), c(1, 0., 0.), c(2, 0., 0.)]);
        assert_eq!(g.cables(2), &[c(1, 0., 1.)]);
        assert_eq!(
            g.cables(3),
            &[c(1, 1., 1.), c(3, 0., 0.), c(4, 0., 0.), c(5, 0., 0.)]
        );
        assert_eq!(g.cables(7), &[c(2, 0., 1.)]);

        assert_eq!(
            g.cv_parent(),
            &[None, Some(0), Some(1), Some(2), Some(3), Some(3), Some(3), Some(1)]
        );
        assert_eq!(g.children(1), &[2, 7]);
        assert_eq!(g.children(3), &[4, 5, 6]);
        assert!(g.children(4).is_empty());
        assert_eq!(g.parent_index(), vec![0, 0, 1, 2, 3, 3, 3, 1]);
    }

    #[test]
    fn test_location_cv_preferences() {
        let m = fixtures::m_sph_b6();
        let ends = Locset::new(
            (0..6)
                .flat_map(|b| [Location::new(b, 0.0), Location::new(b, 1.0)])
                .collect(),
        );
        let g = CvGeometry::from_ends(&m, &ends).unwrap();

        let start = Location::new(1, 0.0);
        assert_eq!(g.location_cv(0, start, CvPrefer::Distal).unwrap(), 2);
        assert_eq!(g.location_cv(0, start, CvPrefer::Proximal).unwrap(), 1);
        assert_eq!(g.location_cv(0, start, CvPrefer::Nonempty).unwrap(), 2);
        assert_eq!(g.location_cv(0, start, CvPrefer::Empty).unwrap(), 1);

        let end = Location::new(1, 1.0);
        assert_eq!(g.location_cv(0, end, CvPrefer::Distal).unwrap(), 3);
        assert_eq!(g.location_cv(0, end, CvPrefer::Proximal).unwrap(), 2);
        assert_eq!(g.location_cv(0, end, CvPrefer::Nonempty).unwrap(), 2);
        assert_eq!(g.location_cv(0, end, CvPrefer::Empty).unwrap(), 3);

        let mid = Location::new(1, 0.5);
        for prefer in [CvPrefer::Distal, CvPrefer::Proximal, CvPrefer::Nonempty, CvPrefer::Empty] {
            assert_eq!(g.location_cv(0, mid, prefer).unwrap(), 2);
        }

        assert!(g.location_cv(1, mid, CvPrefer::Distal).is_err());
        assert!(g.location_cv(0, Location::new(6, 0.5), CvPrefer::Distal).is_err());
    }

    #[test]
    fn test_interior_boundary_on_single_branch() {
        let m = fixtures::m_reg_b1();
        let ends = Locset::new(vec![Location::new(0, 0.25), Location::new(0, 0.5)]);
        let g = CvGeometry::from_ends(&m, &ends).unwrap();

        assert_eq!(g.size(), 3);
        assert_eq!(g.cables(0), &[c(0, 0., 0.25)]);
        assert_eq!(g.cables(1), &[c(0, 0.25, 0.5)]);
        assert_eq!(g.cables(2), &[c(0, 0.5, 1.)]);
        assert_eq!(g.cv_parent(), &[None, Some(0), Some(1)]);
    }

    #[test]
    fn test_multiple_top_level_branches_share_root_cv() {
        let m = fixtures::m_mlt_b6();
        let ends = Locset::new(vec![
            Location::new(0, 0.0),
            Location::new(0, 0.5),
            Location::new(2, 0.0),
            Location::new(2, 0.5),
        ]);
        let g = CvGeometry::from_ends(&m, &ends).unwrap();

        assert_eq!(g.cables(0), &[c(0, 0., 0.5), c(2, 0., 0.5)]);
        assert_eq!(g.size(), 3);
        assert_eq!(g.cables(1), &[c(0, 0.5, 1.), c(1, 0., 1.)]);
        assert_eq!(
            g.cables(2),
            &[c(2, 0.5, 1.), c(3, 0., 1.), c(4, 0., 1.), c(5, 0., 1.)]
        );
    }

    #[test]
    fn test_invalid_boundaries() {
        let m = fixtures::m_reg_b6();

        let dup = Locset::new(vec![Location::new(1, 0.5), Location::new(1, 0.5)]);
        assert!(matches!(
            CvGeometry::from_ends(&m, &dup),
            Err(FvmError::InvalidDiscretization { .. })
        ));

        let off_branch = Locset::from(Location::new(6, 0.5));
        assert!(matches!(
            CvGeometry::from_ends(&m, &off_branch),
            Err(FvmError::InvalidDiscretization { .. })
        ));

        let off_range = Locset::from(Location::new(2, 1.5));
        assert!(CvGeometry::from_ends(&m, &off_range).is_err());
    }

    #[test]
    fn test_empty_morphology() {
        let g = CvGeometry::from_ends(&fixtures::m_empty(), &Locset::nil()).unwrap();
        assert_eq!(g.size(), 0);
        assert_eq!(g.n_cell(), 1);
        assert_eq!(g.cell_cv_range(0), 0..0);
    }

    #[test]
    fn test_append() {
        let m = fixtures::m_reg_b1();
        let two = Locset::from(Location::new(0, 0.5));
        let a = CvGeometry::from_ends(&m, &two).unwrap();
        let b = CvGeometry::from_ends(&fixtures::m_sph_b6(), &Locset::nil()).unwrap();

        let mut batch = CvGeometry::new();
        batch.append(&a).append(&b).append(&a);

        assert_eq!(batch.n_cell(), 3);
        assert_eq!(batch.size(), 5);
        assert_eq!(batch.cell_cv_divs(), &[0, 2, 3, 5]);
        assert_eq!(batch.cv_to_cell(), &[0, 0, 1, 2, 2]);
        assert_eq!(batch.cv_parent(), &[None, Some(0), None, None, Some(3)]);
        assert_eq!(batch.children(3), &[4]);
        assert_eq!(batch.cables(4), &[c(0, 0.5, 1.)]);
        assert_eq!(batch.cv_cables_divs()[5], batch.cv_cables().len());
        assert_eq!(
            batch
                .location_cv(2, Location::new(0, 0.75), CvPrefer::Distal)
                .unwrap(),
            4
        );
    }

    #[test]
    fn test_idempotent() {
        let m = fixtures::m_sph_b6();
        let ends = Locset::on_branches(&m, 0.3).join(&Locset::on_branches(&m, 1.0));
        let a = CvGeometry::from_ends(&m, &ends).unwrap();
        let b = CvGeometry::from_ends(&m, &ends).unwrap();
        assert_eq!(a, b);
    }
}
