//! Tree-structured linear system for implicit membrane voltage updates.
//!
//! Each cell contributes a symmetric matrix whose sparsity follows the CV
//! tree: a diagonal `d` and one off-diagonal entry `u[i]` coupling CV `i` to
//! its parent. Because parents precede children, the system is solved in
//! linear time by one backward and one forward sweep (Hines' method).
//!
//! Units: conductances in µS, capacitance in pF, area in µm², time in ms,
//! voltage in mV, current density in A/m², conductivity in kS/m².

use hines_fvm::FvmCvDiscretization;

use crate::error::{Result, SolverError};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Matrix state of a group of cells
#[derive(Debug, Clone)]
pub struct MatrixState {
    parent_index: Vec<usize>,
    cell_cv_divs: Vec<usize>,

    d: Vec<f64>,
    u: Vec<f64>,
    // nA after assembly, mV after solve
    rhs: Vec<f64>,

    cv_capacitance: Vec<f64>,
    cv_elastance: Vec<f64>,
    face_conductance: Vec<f64>,
    cv_area: Vec<f64>,

    cell_to_intdom: Vec<usize>,
    invariant_d: Vec<f64>,
    assembled: bool,
}

impl MatrixState {
    /// Build the matrix for CVs with the given parents and properties.
    ///
    /// Within each cell, the first CV must be its own parent and every other
    /// CV must have a parent earlier in the same cell.
    pub fn new(
        parent_index: Vec<usize>,
        cell_cv_divs: Vec<usize>,
        cv_capacitance: Vec<f64>,
        face_conductance: Vec<f64>,
        cv_area: Vec<f64>,
        cell_to_intdom: Vec<usize>,
    ) -> Result<Self> {
        let n = parent_index.len();
        for (name, len) in [
            ("cv_capacitance", cv_capacitance.len()),
            ("face_conductance", face_conductance.len()),
            ("cv_area", cv_area.len()),
        ] {
            if len != n {
                return Err(SolverError::size_mismatch(name, n, len));
            }
        }

        let last = cell_cv_divs.last().copied().unwrap_or(0);
        if cell_cv_divs.first() != Some(&0) || last != n {
            return Err(SolverError::size_mismatch("cell_cv_divs", n, last));
        }
        let n_cell = cell_cv_divs.len() - 1;
        if cell_to_intdom.len() != n_cell {
            return Err(SolverError::size_mismatch(
                "cell_to_intdom",
                n_cell,
                cell_to_intdom.len(),
            ));
        }

        for w in cell_cv_divs.windows(2) {
            let (first, end) = (w[0], w[1]);
            if end < first {
                return Err(SolverError::size_mismatch("cell_cv_divs", first, end));
            }
            for i in first..end {
                let p = parent_index[i];
                let ok = if i == first { p == i } else { first <= p && p < i };
                if !ok {
                    return Err(SolverError::InvalidParent { cv: i, parent: p });
                }
            }
        }

        let mut u = vec![0.0; n];
        let mut invariant_d = vec![0.0; n];
        for i in 0..n {
            let p = parent_index[i];
            if p != i {
                let gij = face_conductance[i];
                u[i] = -gij;
                invariant_d[i] += gij;
                invariant_d[p] += gij;
            }
        }

        // [1/nF]
        let cv_elastance = cv_capacitance
            .iter()
            .map(|&c| if c > 0.0 { 1e3 / c } else { 0.0 })
            .collect();

        log::debug!("Matrix state: {} CVs in {} cells", n, n_cell);

        Ok(Self {
            parent_index,
            cell_cv_divs,
            d: vec![0.0; n],
            u,
            rhs: vec![0.0; n],
            cv_capacitance,
            cv_elastance,
            face_conductance,
            cv_area,
            cell_to_intdom,
            invariant_d,
            assembled: false,
        })
    }

    /// Matrix for a discretized cell group, one integration domain per cell
    pub fn from_discretization(d: &FvmCvDiscretization) -> Result<Self> {
        Self::new(
            d.geometry.parent_index(),
            d.geometry.cell_cv_divs().to_vec(),
            d.cv_capacitance.clone(),
            d.face_conductance.clone(),
            d.cv_area.clone(),
            (0..d.n_cell()).collect(),
        )
    }

    /// Number of CVs
    pub fn size(&self) -> usize {
        self.parent_index.len()
    }

    /// Number of cells
    pub fn n_cell(&self) -> usize {
        self.cell_cv_divs.len() - 1
    }

    /// Parent of each CV; root CVs are their own parent
    pub fn parent_index(&self) -> &[usize] {
        &self.parent_index
    }

    /// Partition of CVs by cell
    pub fn cell_cv_divs(&self) -> &[usize] {
        &self.cell_cv_divs
    }

    /// Diagonal (µS)
    pub fn d(&self) -> &[f64] {
        &self.d
    }

    /// Off-diagonal coupling to the parent (µS)
    pub fn u(&self) -> &[f64] {
        &self.u
    }

    /// Right hand side, or the solution once solved
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Time-step independent part of the diagonal (µS)
    pub fn invariant_d(&self) -> &[f64] {
        &self.invariant_d
    }

    /// Inverse capacitance (1/nF), zero where the capacitance is zero
    pub fn cv_elastance(&self) -> &[f64] {
        &self.cv_elastance
    }

    /// Capacitance (pF)
    pub fn cv_capacitance(&self) -> &[f64] {
        &self.cv_capacitance
    }

    /// Face conductance to the parent (µS)
    pub fn face_conductance(&self) -> &[f64] {
        &self.face_conductance
    }

    /// Membrane area (µm²)
    pub fn cv_area(&self) -> &[f64] {
        &self.cv_area
    }

    /// Voltage (mV) after [`solve`](Self::solve) or [`step_explicit`](Self::step_explicit)
    pub fn solution(&self) -> &[f64] {
        &self.rhs
    }

    fn check_cv_array(&self, name: &str, len: usize) {
        assert_eq!(len, self.size(), "{} has the wrong length", name);
    }

    fn check_intdom_array(&self, dt_intdom: &[f64]) {
        let needed = self.cell_to_intdom.iter().map(|&k| k + 1).max().unwrap_or(0);
        assert!(
            dt_intdom.len() >= needed,
            "dt_intdom has {} entries, {} integration domains referenced",
            dt_intdom.len(),
            needed
        );
    }

    /// Set the diagonal and right hand side for one implicit step.
    ///
    /// Cells whose integration domain has a non-positive time step are left
    /// unchanged by the following solve.
    ///
    /// # Panics
    /// Panics if any per-CV slice has the wrong length or `dt_intdom` is too
    /// short for the integration domains.
    pub fn assemble_implicit(
        &mut self,
        dt_coeff: f64,
        dt_intdom: &[f64],
        voltage: &[f64],
        current_density: &[f64],
        conductivity: &[f64],
    ) {
        self.check_cv_array("voltage", voltage.len());
        self.check_cv_array("current_density", current_density.len());
        self.check_cv_array("conductivity", conductivity.len());
        self.check_intdom_array(dt_intdom);

        for m in 0..self.n_cell() {
            let (first, end) = (self.cell_cv_divs[m], self.cell_cv_divs[m + 1]);
            let dt = dt_intdom[self.cell_to_intdom[m]];

            if dt > 0.0 {
                // [1/µs]
                let oodt_factor = 1e-3 / (dt_coeff * dt);
                for i in first..end {
                    // [1e-9·m²]
                    let area_factor = 1e-3 * self.cv_area[i];
                    // [µS]
                    let gi = oodt_factor * self.cv_capacitance[i] + area_factor * conductivity[i];

                    let di = gi + self.invariant_d[i];
                    if di == 0.0 {
                        self.d[i] = 1.0;
                        self.rhs[i] = voltage[i];
                    } else {
                        self.d[i] = di;
                        // [nA]
                        self.rhs[i] = gi * voltage[i] - area_factor * current_density[i];
                    }
                }
            } else {
                for i in first..end {
                    self.d[i] = 0.0;
                    self.rhs[i] = voltage[i];
                }
            }
        }
        self.assembled = true;
    }

    /// Solve the assembled system in place; the result is in [`solution`](Self::solution)
    pub fn solve(&mut self) {
        debug_assert!(self.assembled, "solve called without a fresh assembly");

        #[cfg(feature = "parallel")]
        {
            let divs = &self.cell_cv_divs;
            let d_cells = split_cells(&mut self.d, divs);
            let rhs_cells = split_cells(&mut self.rhs, divs);
            let u = &self.u;
            let parent = &self.parent_index;
            d_cells
                .into_par_iter()
                .zip(rhs_cells)
                .enumerate()
                .for_each(|(m, (d, rhs))| {
                    let (first, end) = (divs[m], divs[m + 1]);
                    solve_cell(first, d, rhs, &u[first..end], &parent[first..end]);
                });
        }

        #[cfg(not(feature = "parallel"))]
        for m in 0..self.n_cell() {
            let (first, end) = (self.cell_cv_divs[m], self.cell_cv_divs[m + 1]);
            solve_cell(
                first,
                &mut self.d[first..end],
                &mut self.rhs[first..end],
                &self.u[first..end],
                &self.parent_index[first..end],
            );
        }

        self.assembled = false;
    }

    /// Forward Euler step: `v' = v - dt/C (A v + I)` with `A` the axial
    /// conductance Laplacian and `I` the membrane current.
    ///
    /// # Panics
    /// Panics if any per-CV slice has the wrong length or `dt_intdom` is too
    /// short for the integration domains.
    pub fn step_explicit(
        &mut self,
        dt_coeff: f64,
        dt_intdom: &[f64],
        voltage: &[f64],
        current_density: &[f64],
    ) {
        self.check_cv_array("voltage", voltage.len());
        self.check_cv_array("current_density", current_density.len());
        self.check_intdom_array(dt_intdom);

        for (i, rhs) in self.rhs.iter_mut().enumerate() {
            // [nA]
            *rhs = current_density[i] * 1e-3 * self.cv_area[i];
        }

        for m in 0..self.n_cell() {
            let (first, end) = (self.cell_cv_divs[m], self.cell_cv_divs[m + 1]);
            // [ms]
            let dt_factor = dt_coeff * dt_intdom[self.cell_to_intdom[m]];

            if dt_factor > 0.0 {
                for i in (first..end).rev() {
                    let p = self.parent_index[i];
                    if p < i {
                        self.rhs[p] += self.u[i] * voltage[i];
                        self.rhs[i] += self.u[i] * voltage[p];
                    }
                    // [mV]
                    self.rhs[i] = voltage[i]
                        - dt_factor
                            * self.cv_elastance[i]
                            * (self.rhs[i] + self.invariant_d[i] * voltage[i]);
                }
            } else {
                self.rhs[first..end].copy_from_slice(&voltage[first..end]);
            }
        }
        self.assembled = false;
    }
}

/// Hines sweeps for one cell; `parent` holds global indices offset by `first`
fn solve_cell(first: usize, d: &mut [f64], rhs: &mut [f64], u: &[f64], parent: &[usize]) {
    let n = d.len();
    if n == 0 || d[0] == 0.0 {
        return;
    }

    for i in (1..n).rev() {
        let p = parent[i] - first;
        let factor = u[i] / d[i];
        d[p] -= factor * u[i];
        rhs[p] -= factor * rhs[i];
    }
    rhs[0] /= d[0];

    for i in 1..n {
        let p = parent[i] - first;
        rhs[i] = (rhs[i] - u[i] * rhs[p]) / d[i];
    }
}

#[cfg(feature = "parallel")]
fn split_cells<'a>(mut values: &'a mut [f64], divs: &[usize]) -> Vec<&'a mut [f64]> {
    let mut cells = Vec::with_capacity(divs.len().saturating_sub(1));
    for w in divs.windows(2) {
        let (head, tail) = core::mem::take(&mut values).split_at_mut(w[1] - w[0]);
        cells.push(head);
        values = tail;
    }
    cells
}
