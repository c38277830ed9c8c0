//! Mapping of painted and placed mechanisms onto CVs

use std::collections::BTreeMap;

use hines_morph::{Cable, Region};

use crate::cable_cell::{CableCell, IClamp, MechanismDesc};
use crate::cv_geometry::CvPrefer;
use crate::discretize::FvmCvDiscretization;
use crate::error::{FvmError, Result};

/// How a mechanism acts on the membrane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismKind {
    /// Painted over a region, current per unit area
    Density,
    /// Placed at a location, absolute current
    Point,
}

/// CV layout of one mechanism across a batch of cells.
///
/// Instances are ordered by CV. For point mechanisms, the targets of
/// instance `i` are the next `multiplicity[i]` entries of `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct FvmMechanismConfig {
    /// Density or point
    pub kind: MechanismKind,
    /// CV of each instance
    pub cv: Vec<usize>,
    /// Fraction of the CV area covered, one per instance (density only)
    pub norm_area: Vec<f64>,
    /// Number of placements merged into each instance (point only)
    pub multiplicity: Vec<usize>,
    /// Target numbers grouped by instance (point only)
    pub target: Vec<usize>,
    /// Parameter values by name, one per instance
    pub param_values: BTreeMap<String, Vec<f64>>,
}

impl FvmMechanismConfig {
    fn new(kind: MechanismKind, params: impl IntoIterator<Item = String>) -> Self {
        Self {
            kind,
            cv: Vec::new(),
            norm_area: Vec::new(),
            multiplicity: Vec::new(),
            target: Vec::new(),
            param_values: params.into_iter().map(|p| (p, Vec::new())).collect(),
        }
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.cv.len()
    }

    /// No instances
    pub fn is_empty(&self) -> bool {
        self.cv.is_empty()
    }
}

/// Current clamps resolved to CVs, ordered by CV
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FvmStimulusConfig {
    /// CV of each clamp
    pub cv: Vec<usize>,
    /// Clamp parameters
    pub clamps: Vec<IClamp>,
}

/// Mechanism and stimulus layout of a batch of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FvmMechanismData {
    /// Layout per mechanism name
    pub mechanisms: BTreeMap<String, FvmMechanismConfig>,
    /// Current clamps
    pub stimuli: FvmStimulusConfig,
    /// Total number of point mechanism targets
    pub n_target: usize,
}

/// Lay out the mechanisms and stimuli of `cells` on the CVs of `d`.
///
/// With `coalesce_synapses`, point mechanisms with the same name and
/// parameters in the same CV share one instance.
pub fn fvm_build_mechanism_data(
    cells: &[CableCell],
    d: &FvmCvDiscretization,
    coalesce_synapses: bool,
) -> Result<FvmMechanismData> {
    if cells.len() != d.n_cell() {
        return Err(FvmError::invalid_parameter(
            "cells",
            cells.len().to_string(),
            format!("{} cells as discretized", d.n_cell()),
        ));
    }

    let mut data = FvmMechanismData::default();
    build_density(cells, d, &mut data.mechanisms)?;
    data.n_target = build_point(cells, d, coalesce_synapses, &mut data.mechanisms)?;
    data.stimuli = build_stimuli(cells, d)?;

    log::debug!(
        "Mechanism layout: {} mechanisms, {} targets, {} stimuli",
        data.mechanisms.len(),
        data.n_target,
        data.stimuli.cv.len()
    );
    Ok(data)
}

fn overlap<'a>(c: &Cable, region: &'a Region) -> impl Iterator<Item = Cable> + 'a {
    let c = *c;
    region.iter().filter_map(move |r| {
        let lo = c.prox_pos.max(r.prox_pos);
        let hi = c.dist_pos.min(r.dist_pos);
        (r.branch == c.branch && lo <= hi).then(|| Cable::new(c.branch, lo, hi))
    })
}

/// Paints of one density mechanism may touch but not overlap
fn check_disjoint(name: &str, painted: &[(&Region, &MechanismDesc)]) -> Result<()> {
    for (i, (a, _)) in painted.iter().enumerate() {
        for (b, _) in &painted[i + 1..] {
            let shared = a
                .iter()
                .flat_map(|c| overlap(c, b))
                .find(|o| o.dist_pos > o.prox_pos);
            if let Some(o) = shared {
                return Err(FvmError::inconsistent_mechanism(
                    name,
                    format!("painted more than once on {}", o),
                ));
            }
        }
    }
    Ok(())
}

fn build_density(
    cells: &[CableCell],
    d: &FvmCvDiscretization,
    out: &mut BTreeMap<String, FvmMechanismConfig>,
) -> Result<()> {
    // Parameter names first seen for each mechanism.
    let mut names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for cell in cells {
        for (_, desc) in cell.densities() {
            let keys: Vec<&str> = desc.params.keys().map(String::as_str).collect();
            match names.get(desc.name.as_str()) {
                Some(expected) if *expected != keys => {
                    return Err(FvmError::inconsistent_mechanism(
                        &desc.name,
                        format!("parameters {:?} differ from {:?}", keys, expected),
                    ));
                }
                Some(_) => {}
                None => {
                    names.insert(&desc.name, keys);
                }
            }
        }
    }

    for (name, keys) in &names {
        let mut config = FvmMechanismConfig::new(
            MechanismKind::Density,
            keys.iter().map(|k| k.to_string()),
        );

        for (ci, cell) in cells.iter().enumerate() {
            let emb = cell.embedding();
            let painted: Vec<_> = cell
                .densities()
                .filter(|(_, desc)| desc.name == *name)
                .collect();
            if painted.is_empty() {
                continue;
            }
            check_disjoint(name, &painted)?;

            for cv in d.geometry.cell_cv_range(ci) {
                let mut cv_area = 0.0;
                let mut weighted = vec![0.0; keys.len()];
                for (region, desc) in &painted {
                    let mut area = 0.0;
                    for c in d.geometry.cables(cv) {
                        for o in overlap(c, region) {
                            area += emb.integrate_area(&o)?;
                        }
                    }
                    cv_area += area;
                    for (w, key) in weighted.iter_mut().zip(keys.iter()) {
                        *w += area * desc.get(key).unwrap_or(0.0);
                    }
                }
                if cv_area <= 0.0 {
                    continue;
                }

                config.cv.push(cv);
                config.norm_area.push(if d.cv_area[cv] > 0.0 {
                    cv_area / d.cv_area[cv]
                } else {
                    0.0
                });
                for (key, w) in keys.iter().zip(weighted) {
                    if let Some(values) = config.param_values.get_mut(*key) {
                        values.push(w / cv_area);
                    }
                }
            }
        }

        out.insert(name.to_string(), config);
    }
    Ok(())
}

struct PointInstance {
    cv: usize,
    target: usize,
    params: Vec<f64>,
}

fn build_point(
    cells: &[CableCell],
    d: &FvmCvDiscretization,
    coalesce: bool,
    out: &mut BTreeMap<String, FvmMechanismConfig>,
) -> Result<usize> {
    let mut by_name: BTreeMap<String, (Vec<String>, Vec<PointInstance>)> = BTreeMap::new();
    let mut target = 0;

    for (ci, cell) in cells.iter().enumerate() {
        for (loc, desc) in cell.synapses() {
            let cv = d.geometry.location_cv(ci, loc, CvPrefer::Nonempty)?;
            let keys: Vec<String> = desc.params.keys().cloned().collect();
            let entry = by_name
                .entry(desc.name.clone())
                .or_insert_with(|| (keys.clone(), Vec::new()));
            if entry.0 != keys {
                return Err(FvmError::inconsistent_mechanism(
                    &desc.name,
                    format!("parameters {:?} differ from {:?}", keys, entry.0),
                ));
            }
            entry.1.push(PointInstance {
                cv,
                target,
                params: desc.params.values().copied().collect(),
            });
            target += 1;
        }
    }

    for (name, (keys, mut instances)) in by_name {
        if out.contains_key(&name) {
            return Err(FvmError::inconsistent_mechanism(
                name,
                "used both as a density and a point mechanism",
            ));
        }

        let mut config = FvmMechanismConfig::new(MechanismKind::Point, keys.iter().cloned());
        if coalesce {
            instances.sort_by(|a, b| {
                a.cv.cmp(&b.cv)
                    .then_with(|| cmp_params(&a.params, &b.params))
                    .then(a.target.cmp(&b.target))
            });
        } else {
            instances.sort_by_key(|p| p.cv);
        }

        let mut prev: Option<(usize, &[f64])> = None;
        for inst in &instances {
            let merge = coalesce
                && prev.is_some_and(|(cv, params)| cv == inst.cv && params == inst.params.as_slice());
            if merge {
                if let Some(m) = config.multiplicity.last_mut() {
                    *m += 1;
                }
            } else {
                config.cv.push(inst.cv);
                config.multiplicity.push(1);
                for (key, v) in keys.iter().zip(&inst.params) {
                    if let Some(values) = config.param_values.get_mut(key) {
                        values.push(*v);
                    }
                }
            }
            config.target.push(inst.target);
            prev = Some((inst.cv, inst.params.as_slice()));
        }

        out.insert(name, config);
    }
    Ok(target)
}

fn cmp_params(a: &[f64], b: &[f64]) -> core::cmp::Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

fn build_stimuli(cells: &[CableCell], d: &FvmCvDiscretization) -> Result<FvmStimulusConfig> {
    let mut placed = Vec::new();
    for (ci, cell) in cells.iter().enumerate() {
        for (loc, clamp) in cell.stimuli() {
            let cv = d.geometry.location_cv(ci, loc, CvPrefer::Nonempty)?;
            placed.push((cv, *clamp));
        }
    }
    placed.sort_by_key(|(cv, _)| *cv);

    let (cv, clamps) = placed.into_iter().unzip();
    Ok(FvmStimulusConfig { cv, clamps })
}
