//! Finite volume discretization of cable cells.
//!
//! Each CV gets its membrane area, capacitance, initial potential,
//! temperature, diameter and axial resistivity by integrating the painted
//! properties over its cables. Face conductances couple each CV to its
//! parent through the axial resistance between their reference points.

use hines_morph::{meet, Cable, Location, MorphError, Morphology, PwConstant, PwElements};

use crate::cable_cell::{CableCell, Paint};
use crate::cv_geometry::CvGeometry;
use crate::error::{FvmError, Result};
use crate::parameters::ParameterSet;

/// Per-CV physical quantities for a batch of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FvmCvDiscretization {
    /// CV decomposition
    pub geometry: CvGeometry,
    /// Axial conductance to the parent CV (µS), zero for root CVs
    pub face_conductance: Vec<f64>,
    /// Membrane area (µm²)
    pub cv_area: Vec<f64>,
    /// Membrane capacitance (pF)
    pub cv_capacitance: Vec<f64>,
    /// Initial membrane potential (mV)
    pub init_membrane_potential: Vec<f64>,
    /// Temperature (K)
    pub temperature_k: Vec<f64>,
    /// Mean diameter (µm)
    pub diam_um: Vec<f64>,
    /// Length-weighted axial resistivity (Ω·cm)
    pub axial_resistivity: Vec<f64>,
}

impl FvmCvDiscretization {
    /// Number of CVs
    pub fn size(&self) -> usize {
        self.geometry.size()
    }

    /// Number of cells
    pub fn n_cell(&self) -> usize {
        self.geometry.n_cell()
    }

    /// Append another batch after this one
    pub fn append(&mut self, other: &FvmCvDiscretization) -> &mut Self {
        self.geometry.append(&other.geometry);
        self.face_conductance.extend_from_slice(&other.face_conductance);
        self.cv_area.extend_from_slice(&other.cv_area);
        self.cv_capacitance.extend_from_slice(&other.cv_capacitance);
        self.init_membrane_potential
            .extend_from_slice(&other.init_membrane_potential);
        self.temperature_k.extend_from_slice(&other.temperature_k);
        self.diam_um.extend_from_slice(&other.diam_um);
        self.axial_resistivity
            .extend_from_slice(&other.axial_resistivity);
        self
    }

    fn with_capacity(geometry: CvGeometry) -> Self {
        let n = geometry.size();
        Self {
            geometry,
            face_conductance: Vec::with_capacity(n),
            cv_area: Vec::with_capacity(n),
            cv_capacitance: Vec::with_capacity(n),
            init_membrane_potential: Vec::with_capacity(n),
            temperature_k: Vec::with_capacity(n),
            diam_um: Vec::with_capacity(n),
            axial_resistivity: Vec::with_capacity(n),
        }
    }
}

/// Discretize a batch of cells; CV indices follow cell order
pub fn fvm_cv_discretize_cells(
    cells: &[CableCell],
    global: &ParameterSet,
) -> Result<FvmCvDiscretization> {
    let mut combined = FvmCvDiscretization::default();
    for cell in cells {
        combined.append(&fvm_cv_discretize(cell, global)?);
    }
    log::debug!(
        "Discretized {} cells into {} CVs",
        combined.n_cell(),
        combined.size()
    );
    Ok(combined)
}

/// Discretize one cell.
///
/// Cell defaults take precedence over `global`; the CV policy comes from
/// the first of the two that sets one, falling back to one CV per branch.
pub fn fvm_cv_discretize(cell: &CableCell, global: &ParameterSet) -> Result<FvmCvDiscretization> {
    let params = cell.defaults().overlay(global);
    let resolved = params.resolve()?;
    let policy = params.discretization.clone().unwrap_or_default();
    policy.validate()?;

    let morph = cell.morphology();
    let emb = cell.embedding();
    let ends = policy.boundary_points(cell)?;
    let geometry = CvGeometry::from_ends(morph, &ends)?;

    let cm = painted(cell, resolved.membrane_capacitance, |p| match p {
        Paint::MembraneCapacitance(v) => Some(*v),
        _ => None,
    })?;
    let ra = painted(cell, resolved.axial_resistivity, |p| match p {
        Paint::AxialResistivity(v) => Some(*v),
        _ => None,
    })?;
    let temp = painted(cell, resolved.temperature_k, |p| match p {
        Paint::TemperatureK(v) => Some(*v),
        _ => None,
    })?;
    let vinit = painted(cell, resolved.init_membrane_potential, |p| match p {
        Paint::InitMembranePotential(v) => Some(*v),
        _ => None,
    })?;

    let mut d = FvmCvDiscretization::with_capacity(geometry);
    let n_cv = d.geometry.size();

    let mut anchors = Vec::with_capacity(n_cv);
    for cv in 0..n_cv {
        let cables = d.geometry.cables(cv);
        let anchor = Anchor::of(morph, cables);

        let mut area = 0.0;
        let mut length = 0.0;
        let mut capacitance = 0.0;
        let mut v_area = 0.0;
        let mut t_area = 0.0;
        let mut ra_length = 0.0;
        for c in cables {
            area += emb.integrate_area(c)?;
            length += emb.integrate_length(c)?;
            capacitance += emb.integrate_area_weighted(c.branch, &on_cable(&cm[c.branch], c)?)?;
            v_area += emb.integrate_area_weighted(c.branch, &on_cable(&vinit[c.branch], c)?)?;
            t_area += emb.integrate_area_weighted(c.branch, &on_cable(&temp[c.branch], c)?)?;
            ra_length += emb.integrate_length_weighted(c.branch, &on_cable(&ra[c.branch], c)?)?;
        }

        let refpt = anchor.reference_point();
        d.cv_area.push(area);
        d.cv_capacitance.push(capacitance);
        if area > 0.0 {
            d.init_membrane_potential.push(v_area / area);
            d.temperature_k.push(t_area / area);
        } else {
            d.init_membrane_potential.push(resolved.init_membrane_potential);
            d.temperature_k.push(resolved.temperature_k);
        }
        if length > 0.0 {
            d.diam_um.push(area / (core::f64::consts::PI * length));
            d.axial_resistivity.push(ra_length / length);
        } else {
            d.diam_um.push(2.0 * emb.radius(refpt)?);
            d.axial_resistivity.push(
                ra[refpt.branch]
                    .value_at(refpt.pos)
                    .copied()
                    .unwrap_or(resolved.axial_resistivity),
            );
        }
        anchors.push(anchor);
    }

    for cv in 0..n_cv {
        let Some(parent) = d.geometry.parent(cv) else {
            d.face_conductance.push(0.0);
            continue;
        };
        let child = &anchors[cv];
        let mut path = child.segments_from_head();
        path.extend(anchors[parent].segments_to(
            morph,
            d.geometry.cables(parent),
            child.head(),
        )?);

        let mut resistance = 0.0;
        for seg in &path {
            resistance += emb.integrate_ixa_weighted(seg.branch, &on_cable(&ra[seg.branch], seg)?)?;
        }
        if resistance > 0.0 {
            // Ω·cm·µm⁻¹ to µS
            d.face_conductance.push(100.0 / resistance);
        } else {
            log::warn!(
                "CV {} has a zero-resistance face to CV {}; the face conductance is set to 0, \
                 decoupling the subtree at CV {} from its parent",
                cv,
                parent,
                cv
            );
            d.face_conductance.push(0.0);
        }
    }

    log::debug!(
        "Discretized cell: {} branches, {} boundary points, {} CVs, area {:.3} µm²",
        morph.num_branches(),
        ends.len(),
        n_cv,
        d.cv_area.iter().sum::<f64>()
    );
    Ok(d)
}

/// Per-branch piecewise-constant value of a painted property; later paints win
fn painted(
    cell: &CableCell,
    default: f64,
    select: impl Fn(&Paint) -> Option<f64>,
) -> Result<Vec<PwConstant>> {
    let layers: Vec<_> = cell
        .paints()
        .iter()
        .filter_map(|(region, paint)| select(paint).map(|v| (region, v)))
        .collect();

    let n_branch = cell.morphology().num_branches();
    let mut out = Vec::with_capacity(n_branch);
    for b in 0..n_branch {
        let mut cuts = vec![0.0, 1.0];
        for (region, _) in &layers {
            for c in region.iter().filter(|c| c.branch == b) {
                cuts.push(c.prox_pos);
                cuts.push(c.dist_pos);
            }
        }
        cuts.sort_by(f64::total_cmp);
        cuts.dedup();

        let mut pw = PwConstant::new();
        for w in cuts.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            let mut value = default;
            for (region, v) in &layers {
                if region
                    .iter()
                    .any(|c| c.branch == b && c.prox_pos <= lo && hi <= c.dist_pos)
                {
                    value = *v;
                }
            }
            pw.push(lo, hi, value).map_err(MorphError::from)?;
        }
        out.push(pw);
    }
    Ok(out)
}

/// Restriction of a branch function to a cable
fn on_cable(pw: &PwConstant, c: &Cable) -> Result<PwConstant> {
    let span = PwElements::single(c.prox_pos, c.dist_pos, ()).map_err(MorphError::from)?;
    let mut out = PwConstant::new();
    for ((lo, hi), ((), v)) in meet(&span, pw).iter() {
        out.push(lo, hi, *v).map_err(MorphError::from)?;
    }
    Ok(out)
}

/// Where a CV attaches to its parent and where its voltage is taken to act
#[derive(Debug, Clone, Copy)]
enum Anchor {
    /// Unbranched CV: reference point at the cable midpoint
    Single(Cable),
    /// Branched CV entered through one cable: reference point at its distal fork
    Fork(Cable),
    /// Branched CV whose cables all leave one branch point, which is the reference point
    Junction(Location),
}

impl Anchor {
    fn of(morph: &Morphology, cables: &[Cable]) -> Self {
        if let [c] = cables {
            return Anchor::Single(*c);
        }
        let heads: Vec<&Cable> = cables
            .iter()
            .filter(|c| is_head(morph, cables, c))
            .collect();
        match heads.as_slice() {
            [h] => Anchor::Fork(**h),
            [h, ..] => Anchor::Junction(h.prox()),
            [] => Anchor::Single(cables[0]),
        }
    }

    fn head(&self) -> Location {
        match self {
            Anchor::Single(c) | Anchor::Fork(c) => c.prox(),
            Anchor::Junction(loc) => *loc,
        }
    }

    fn reference_point(&self) -> Location {
        match self {
            Anchor::Single(c) => c.midpoint(),
            Anchor::Fork(c) => c.dist(),
            Anchor::Junction(loc) => *loc,
        }
    }

    /// Path from the head of the CV to its reference point
    fn segments_from_head(&self) -> Vec<Cable> {
        match self {
            Anchor::Single(c) => vec![Cable::new(c.branch, c.prox_pos, c.midpoint().pos)],
            Anchor::Fork(c) => vec![*c],
            Anchor::Junction(_) => Vec::new(),
        }
    }

    /// Path from the reference point of this CV down to `to`, a point on
    /// its distal boundary
    fn segments_to(&self, morph: &Morphology, cables: &[Cable], to: Location) -> Result<Vec<Cable>> {
        let detached = || FvmError::invalid_discretization(to, "CV does not meet its parent CV");
        let find = |at: Location| {
            cables
                .iter()
                .find(|k| k.branch == at.branch && k.dist_pos == at.pos)
                .copied()
        };

        let mut at = to;
        let mut k = match find(at) {
            Some(k) => k,
            None if at.pos == 0.0 => {
                let q = morph.branch_parent(at.branch).ok_or_else(detached)?;
                at = Location::new(q, 1.0);
                find(at).ok_or_else(detached)?
            }
            None => return Err(detached()),
        };

        let mut segments = Vec::new();
        for _ in 0..cables.len() {
            match self {
                Anchor::Single(c) => {
                    segments.push(Cable::new(c.branch, c.midpoint().pos, at.pos));
                    return Ok(segments);
                }
                Anchor::Fork(head) if k == *head => return Ok(segments),
                Anchor::Junction(_) if is_head(morph, cables, &k) => {
                    segments.push(Cable::new(k.branch, k.prox_pos, at.pos));
                    return Ok(segments);
                }
                _ => {}
            }
            segments.push(Cable::new(k.branch, k.prox_pos, at.pos));
            let q = morph.branch_parent(k.branch).ok_or_else(detached)?;
            at = Location::new(q, 1.0);
            k = find(at).ok_or_else(detached)?;
        }
        Err(detached())
    }
}

/// A cable of a CV that is not the continuation of another of its cables
fn is_head(morph: &Morphology, cables: &[Cable], c: &Cable) -> bool {
    if c.prox_pos != 0.0 {
        return true;
    }
    match morph.branch_parent(c.branch) {
        Some(q) => !cables.iter().any(|k| k.branch == q && k.dist_pos == 1.0),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv_policy::{CvPolicy, CvPolicyFlags};
    use hines_morph::{fixtures, Branch, Morphology, Point, Region};
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, rel: f64) {
        assert!(
            (a - b).abs() <= rel * b.abs().max(1e-12),
            "{} != {} (rel {})",
            a,
            b,
            rel
        );
    }

    fn area_is_conserved(cell: &CableCell, d: &FvmCvDiscretization, index: usize) -> bool {
        let total = cell.embedding().total_area();
        let cvs: f64 = d.geometry.cell_cv_range(index).map(|cv| d.cv_area[cv]).sum();
        (total - cvs).abs() <= 1e-12 * total
    }

    fn defaults(policy: CvPolicy) -> ParameterSet {
        ParameterSet::neuron_defaults().with_discretization(policy)
    }

    #[test]
    fn test_single_cable_one_cv() {
        let cell = CableCell::new(fixtures::m_reg_b1()).unwrap();
        for policy in [CvPolicy::fixed_per_branch(1), CvPolicy::max_extent(10.0)] {
            let d = fvm_cv_discretize(&cell, &defaults(policy)).unwrap();
            assert_eq!(d.size(), 1);
            // 10 µm cylinder of radius 1 µm
            let area = 2.0 * PI * 10.0;
            assert_close(d.cv_area[0], area, 1e-12);
            assert_close(d.cv_capacitance[0], 0.01 * area, 1e-12);
            assert_close(d.diam_um[0], 2.0, 1e-12);
            assert_eq!(d.face_conductance[0], 0.0);
            assert_eq!(d.init_membrane_potential[0], -65.0);
            assert_close(d.axial_resistivity[0], 35.4, 1e-12);
        }
    }

    #[test]
    fn test_face_conductance_between_halves() {
        let cell = CableCell::new(fixtures::m_reg_b1()).unwrap();
        let d = fvm_cv_discretize(&cell, &defaults(CvPolicy::fixed_per_branch(2))).unwrap();
        assert_eq!(d.size(), 2);

        // Midpoint to midpoint: 5 µm of a cylinder with cross-section π µm².
        let ixa = 5.0 / PI;
        assert_close(d.face_conductance[1], 100.0 / (35.4 * ixa), 1e-12);
        assert_close(d.cv_area[0], d.cv_area[1], 1e-12);
    }

    #[test]
    fn test_painted_overrides() {
        let mut cell = CableCell::new(fixtures::m_reg_b1()).unwrap();
        cell.paint(Region::cable(0, 0.0, 0.5), Paint::MembraneCapacitance(0.02))
            .unwrap();
        cell.paint(Region::cable(0, 0.0, 0.25), Paint::InitMembranePotential(-50.0))
            .unwrap();
        cell.paint(Region::cable(0, 0.5, 1.0), Paint::AxialResistivity(100.0))
            .unwrap();

        let d = fvm_cv_discretize(&cell, &defaults(CvPolicy::fixed_per_branch(1))).unwrap();
        let area = 2.0 * PI * 10.0;
        assert_close(d.cv_capacitance[0], 0.5 * area * 0.02 + 0.5 * area * 0.01, 1e-12);
        assert_close(d.init_membrane_potential[0], 0.25 * -50.0 + 0.75 * -65.0, 1e-12);
        assert_close(d.axial_resistivity[0], 0.5 * 35.4 + 0.5 * 100.0, 1e-12);

        // A later paint replaces an earlier one where they overlap.
        cell.paint(Region::branch(0), Paint::MembraneCapacitance(0.03))
            .unwrap();
        let d = fvm_cv_discretize(&cell, &defaults(CvPolicy::fixed_per_branch(1))).unwrap();
        assert_close(d.cv_capacitance[0], area * 0.03, 1e-12);
    }

    #[test]
    fn test_cell_defaults_override_global() {
        let cell = CableCell::new(fixtures::m_reg_b1())
            .unwrap()
            .with_defaults(ParameterSet::default().with_membrane_capacitance(0.02))
            .unwrap();
        let d = fvm_cv_discretize(&cell, &ParameterSet::neuron_defaults()).unwrap();
        assert_close(d.cv_capacitance[0], 0.02 * 2.0 * PI * 10.0, 1e-12);

        let err = fvm_cv_discretize(&cell, &ParameterSet::default()).unwrap_err();
        assert!(matches!(err, FvmError::MissingParameter { .. }));
    }

    #[test]
    fn test_zero_area_fork_cv() {
        let cell = CableCell::new(fixtures::ball_and_stick(9.0, 10.0, 1.0)).unwrap();
        let d = fvm_cv_discretize(&cell, &defaults(CvPolicy::fixed_per_branch(1))).unwrap();

        assert_eq!(d.size(), 3);
        assert_eq!(d.cv_area[1], 0.0);
        assert_eq!(d.cv_capacitance[1], 0.0);
        assert_eq!(d.init_membrane_potential[1], -65.0);
        assert_close(d.diam_um[1], 2.0 * 9.0, 1e-12);

        // Soma half: a cylinder 9 µm long of radius 9 µm.
        let soma_half = 9.0 / (PI * 81.0);
        assert_close(d.face_conductance[1], 100.0 / (35.4 * soma_half), 1e-12);
        // Dendrite half: 5 µm of radius 1 µm.
        let dend_half = 5.0 / PI;
        assert_close(d.face_conductance[2], 100.0 / (35.4 * dend_half), 1e-12);
        assert!(area_is_conserved(&cell, &d, 0));
    }

    #[test]
    fn test_zero_length_branch_decouples_its_cvs() {
        let morph = Morphology::new(
            false,
            vec![
                Branch::new(None, vec![Point::new(0.0, 0.0, 0.0, 1.0), Point::new(10.0, 0.0, 0.0, 1.0)]),
                Branch::new(Some(0), vec![Point::new(10.0, 0.0, 0.0, 1.0), Point::new(10.0, 0.0, 0.0, 1.0)]),
            ],
        )
        .unwrap();
        let cell = CableCell::new(morph).unwrap();
        let d = fvm_cv_discretize(&cell, &defaults(CvPolicy::fixed_per_branch(2))).unwrap();

        assert!(d.face_conductance.iter().all(|g| g.is_finite() && *g >= 0.0));
        // The two halves of branch 0 stay coupled
        let distal = (0..d.size())
            .find(|&cv| d.geometry.cables(cv).first() == Some(&Cable::new(0, 0.5, 1.0)))
            .unwrap();
        assert_close(d.face_conductance[distal], 100.0 / (35.4 * 5.0 / PI), 1e-12);
        // Reference points on the zero-length branch coincide
        let decoupled = (1..d.size())
            .filter(|&cv| d.geometry.cables(cv).iter().all(|c| c.branch == 1))
            .filter(|&cv| d.face_conductance[cv] == 0.0)
            .count();
        assert!(decoupled >= 1, "{:?}", d.face_conductance);
    }

    #[test]
    fn test_branched_cv_reference_at_fork() {
        let cell = CableCell::new(fixtures::m_reg_b6()).unwrap();
        let policy = CvPolicy::fixed_per_branch(2).with_flags(CvPolicyFlags::INTERIOR_FORKS);
        let d = fvm_cv_discretize(&cell, &defaults(policy)).unwrap();
        let g = &d.geometry;

        // CV spanning the end of branch 0 and the starts of branches 1 and 2.
        let fork = (0..g.size())
            .find(|&cv| g.cables(cv).len() == 3 && g.cables(cv)[0].branch == 0)
            .unwrap();
        let parent = g.parent(fork).unwrap();
        assert_eq!(g.cables(parent), &[Cable::new(0, 0.25, 0.75)]);

        // Parent midpoint (0, 0.5) to the fork at (0, 1): 0.5 µm at radius 0.5 µm.
        let ixa = 0.5 / (PI * 0.25);
        assert_close(d.face_conductance[fork], 100.0 / (35.4 * ixa), 1e-12);

        // Child on branch 1 measures from the fork to its midpoint.
        let child = g
            .children(fork)
            .iter()
            .copied()
            .find(|&cv| g.cables(cv) == [Cable::new(1, 0.25, 0.75)])
            .unwrap();
        let ixa = 0.5 / (PI * 0.25);
        assert_close(d.face_conductance[child], 100.0 / (35.4 * ixa), 1e-12);
    }

    #[test]
    fn test_multiple_cells() {
        let cells = vec![
            CableCell::new(fixtures::m_reg_b1()).unwrap(),
            CableCell::new(fixtures::m_sph_b1()).unwrap(),
        ];
        let d = fvm_cv_discretize_cells(&cells, &defaults(CvPolicy::fixed_per_branch(2))).unwrap();
        assert_eq!(d.n_cell(), 2);
        assert_eq!(d.size(), 4);
        assert_eq!(d.geometry.cell_cv_divs(), &[0, 2, 4]);
        assert_eq!(d.geometry.cv_parent()[2], None);
        assert_eq!(d.face_conductance[2], 0.0);
        assert_close(d.cv_area[2] + d.cv_area[3], 4.0 * PI, 1e-12);
        assert!(area_is_conserved(&cells[1], &d, 1));
    }

    #[test]
    fn test_empty_morphology() {
        let cell = CableCell::new(fixtures::m_empty()).unwrap();
        let d = fvm_cv_discretize(&cell, &ParameterSet::neuron_defaults()).unwrap();
        assert_eq!(d.size(), 0);
        assert_eq!(d.n_cell(), 1);
        assert!(d.face_conductance.is_empty());
    }
}
