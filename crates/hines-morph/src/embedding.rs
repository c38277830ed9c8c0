//! Piecewise-rational embedding of a morphology.
//!
//! Each branch gets four functions of relative position: cumulative length,
//! radius, cumulative membrane area and cumulative ixa (the integral of
//! inverse cross-sectional area along the branch). Segments between samples
//! are conic frustums, so length and radius are linear, area is quadratic and
//! ixa is an order (1, 1) rational function of position.
//!
//! Units: lengths and radii in µm, area in µm², ixa in 1/µm.

use std::f64::consts::PI;

use crate::error::{MorphError, Result};
use crate::morphology::Morphology;
use crate::piecewise::{PwConstant, PwElements};
use crate::primitives::{Cable, Location};
use crate::ratelem::{Linear, Quadratic, RatElement, Rational11};

/// Geometric embedding of a morphology
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    length: Vec<PwElements<Linear>>,
    radius: Vec<PwElements<Linear>>,
    area: Vec<PwElements<Quadratic>>,
    ixa: Vec<PwElements<Rational11>>,
    sample_locations: Vec<Location>,
}

fn interpolate<E: RatElement>(pw: &PwElements<E>, pos: f64) -> Option<f64> {
    let i = pw.index_of(pos)?;
    let (left, right) = pw.interval(i);
    let e = pw.element(i);
    if left == right {
        Some(e.first())
    } else {
        Some(e.eval((pos - left) / (right - left)))
    }
}

impl Embedding {
    /// Build the embedding of a validated morphology
    pub fn new(morph: &Morphology) -> Result<Self> {
        let n_branch = morph.num_branches();
        let mut embed = Self {
            length: Vec::with_capacity(n_branch),
            radius: Vec::with_capacity(n_branch),
            area: Vec::with_capacity(n_branch),
            ixa: Vec::with_capacity(n_branch),
            sample_locations: Vec::with_capacity(morph.num_samples()),
        };

        for bid in 0..n_branch {
            let samples = morph.branch_samples(bid);

            if bid == 0 && morph.spherical_root() {
                // Area-equivalent cylinder: length 2r, radius r.
                let r = samples[0].radius;
                let cyl_area = 4.0 * PI * r * r;
                let cyl_ixa = 2.0 / (PI * r);

                embed.sample_locations.push(Location::new(0, 0.5));
                embed.length.push(PwElements::single(0.0, 1.0, Linear::new(0.0, 2.0 * r))?);
                embed.radius.push(PwElements::single(0.0, 1.0, Linear::new(r, r))?);
                embed.area.push(PwElements::single(
                    0.0,
                    1.0,
                    Quadratic::new(0.0, 0.5 * cyl_area, cyl_area),
                )?);
                embed.ixa.push(PwElements::single(
                    0.0,
                    1.0,
                    Rational11::new(0.0, 0.5 * cyl_ixa, cyl_ixa),
                )?);
                continue;
            }

            let mut distance = Vec::with_capacity(samples.len());
            distance.push(0.0);
            for pair in samples.windows(2) {
                let d = distance[distance.len() - 1] + pair[0].distance(&pair[1]);
                distance.push(d);
            }
            let branch_length = distance[distance.len() - 1];
            let zero_length = !(branch_length > 0.0);

            let mut pos: Vec<f64> = distance
                .iter()
                .map(|d| if zero_length { 0.0 } else { d / branch_length })
                .collect();
            if let Some(last) = pos.last_mut() {
                *last = 1.0;
            }

            // The first sample of a child branch is its parent's fork point.
            let skip_first = morph.branch_parent(bid).is_some();
            for (i, &x) in pos.iter().enumerate() {
                if i == 0 && skip_first {
                    continue;
                }
                embed.sample_locations.push(Location::new(bid, x));
            }

            embed
                .length
                .push(PwElements::single(0.0, 1.0, Linear::new(0.0, branch_length))?);

            if zero_length {
                log::warn!("Branch {} has zero length", bid);
                let r = samples[0].radius;
                embed.radius.push(PwElements::single(0.0, 1.0, Linear::new(r, r))?);
                embed.area.push(PwElements::single(0.0, 1.0, Quadratic::new(0.0, 0.0, 0.0))?);
                embed.ixa.push(PwElements::single(0.0, 1.0, Rational11::new(0.0, 0.0, 0.0))?);
                continue;
            }

            let mut radius = PwElements::new();
            let mut area = PwElements::new();
            let mut ixa = PwElements::new();
            let (mut area_0, mut ixa_0) = (0.0, 0.0);

            for i in 1..samples.len() {
                let (x0, x1) = (pos[i - 1], pos[i]);
                if x0 == x1 {
                    continue;
                }
                let (r0, r1) = (samples[i - 1].radius, samples[i].radius);
                let dx = distance[i] - distance[i - 1];

                radius.push(x0, x1, Linear::new(r0, r1))?;

                let slant = ((r1 - r0) * (r1 - r0) + dx * dx).sqrt();
                let area_half = area_0 + PI * slant * (0.75 * r0 + 0.25 * r1);
                let area_1 = area_0 + PI * slant * (r0 + r1);
                area.push(x0, x1, Quadratic::new(area_0, area_half, area_1))?;

                let ixa_half = ixa_0 + dx / (PI * r0 * (r0 + r1));
                let ixa_1 = ixa_0 + dx / (PI * r0 * r1);
                ixa.push(x0, x1, Rational11::new(ixa_0, ixa_half, ixa_1))?;

                area_0 = area_1;
                ixa_0 = ixa_1;
            }

            debug_assert_eq!(radius.bounds(), Some((0.0, 1.0)));
            embed.radius.push(radius);
            embed.area.push(area);
            embed.ixa.push(ixa);
        }

        Ok(embed)
    }

    /// Number of embedded branches
    pub fn num_branches(&self) -> usize {
        self.length.len()
    }

    /// Locations of the morphology samples.
    ///
    /// A spherical root sample sits at `(0, 0.5)`; the first sample of a
    /// child branch coincides with its parent's distal end and is omitted.
    pub fn sample_locations(&self) -> &[Location] {
        &self.sample_locations
    }

    fn check_branch(&self, bid: usize) -> Result<()> {
        if bid >= self.num_branches() {
            return Err(MorphError::invalid_location(
                bid,
                0.0,
                format!("morphology has {} branches", self.num_branches()),
            ));
        }
        Ok(())
    }

    fn check_location(&self, loc: Location) -> Result<()> {
        self.check_branch(loc.branch)?;
        if !loc.is_valid_pos() {
            return Err(MorphError::invalid_location(
                loc.branch,
                loc.pos,
                "position must be in [0, 1]",
            ));
        }
        Ok(())
    }

    fn check_cable(&self, c: &Cable) -> Result<()> {
        self.check_branch(c.branch)?;
        if !c.is_valid() {
            return Err(MorphError::invalid_location(
                c.branch,
                if c.prox_pos.is_finite() && (0.0..=1.0).contains(&c.prox_pos) {
                    c.dist_pos
                } else {
                    c.prox_pos
                },
                "cable ends must satisfy 0 <= prox <= dist <= 1",
            ));
        }
        Ok(())
    }

    /// Length of a branch (µm)
    pub fn branch_length(&self, bid: usize) -> Result<f64> {
        self.check_branch(bid)?;
        Ok(self.length[bid].element(0).last())
    }

    /// Radius at a location (µm)
    pub fn radius(&self, loc: Location) -> Result<f64> {
        self.check_location(loc)?;
        interpolate(&self.radius[loc.branch], loc.pos)
            .ok_or_else(|| MorphError::invalid_location(loc.branch, loc.pos, "no radius data"))
    }

    fn integrate_cable<E: RatElement>(&self, f: &[PwElements<E>], c: &Cable) -> Result<f64> {
        self.check_cable(c)?;
        let pw = &f[c.branch];
        let lo = interpolate(pw, c.prox_pos).unwrap_or(0.0);
        let hi = interpolate(pw, c.dist_pos).unwrap_or(0.0);
        Ok(hi - lo)
    }

    fn integrate_weighted<E: RatElement>(
        &self,
        f: &[PwElements<E>],
        bid: usize,
        g: &PwConstant,
    ) -> Result<f64> {
        self.check_branch(bid)?;
        let pw = &f[bid];
        let mut accum = 0.0;
        for ((left, right), weight) in g.iter() {
            self.check_cable(&Cable::new(bid, left, right))?;
            let lo = interpolate(pw, left).unwrap_or(0.0);
            let hi = interpolate(pw, right).unwrap_or(0.0);
            accum += weight * (hi - lo);
        }
        Ok(accum)
    }

    /// Length of a cable (µm)
    pub fn integrate_length(&self, c: &Cable) -> Result<f64> {
        self.integrate_cable(&self.length, c)
    }

    /// Membrane area of a cable (µm²)
    pub fn integrate_area(&self, c: &Cable) -> Result<f64> {
        self.integrate_cable(&self.area, c)
    }

    /// Integrated inverse cross-sectional area of a cable (1/µm)
    pub fn integrate_ixa(&self, c: &Cable) -> Result<f64> {
        self.integrate_cable(&self.ixa, c)
    }

    /// Length along a branch weighted by a piecewise-constant function
    pub fn integrate_length_weighted(&self, bid: usize, g: &PwConstant) -> Result<f64> {
        self.integrate_weighted(&self.length, bid, g)
    }

    /// Area along a branch weighted by a piecewise-constant function
    pub fn integrate_area_weighted(&self, bid: usize, g: &PwConstant) -> Result<f64> {
        self.integrate_weighted(&self.area, bid, g)
    }

    /// Ixa along a branch weighted by a piecewise-constant function
    pub fn integrate_ixa_weighted(&self, bid: usize, g: &PwConstant) -> Result<f64> {
        self.integrate_weighted(&self.ixa, bid, g)
    }

    /// Total membrane area (µm²)
    pub fn total_area(&self) -> f64 {
        self.area
            .iter()
            .filter_map(|pw| pw.elements().last().map(|e| e.last()))
            .sum()
    }
}
