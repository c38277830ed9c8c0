//! Small reference morphologies used by tests across the workspace.
//!
//! Branch lengths of the six-branch fixtures are 1, 1, 2, 4, 1 and 2 µm.
//! In `m_reg_b6` and `m_sph_b6`, branch 0 forks into branches 1 and 2, and
//! branch 1 forks three ways into branches 3, 4 and 5.

use crate::morphology::{Branch, Morphology, Point};

fn pt(x: f64, y: f64, r: f64) -> Point {
    Point::new(x, y, 0.0, r)
}

fn build(spherical_root: bool, branches: Vec<Branch>) -> Morphology {
    match Morphology::new(spherical_root, branches) {
        Ok(m) => m,
        Err(e) => panic!("fixture morphology is invalid: {}", e),
    }
}

/// No branches at all
pub fn m_empty() -> Morphology {
    Morphology::empty()
}

/// One unbranched cable, 10 µm long, radius 1 µm
pub fn m_reg_b1() -> Morphology {
    build(
        false,
        vec![Branch::new(None, vec![pt(0.0, 0.0, 1.0), pt(10.0, 0.0, 1.0)])],
    )
}

/// A lone spherical root of radius 1 µm
pub fn m_sph_b1() -> Morphology {
    build(true, vec![Branch::new(None, vec![pt(0.0, 0.0, 1.0)])])
}

/// Six branches with an unbranched root cable
pub fn m_reg_b6() -> Morphology {
    let r = 0.5;
    build(
        false,
        vec![
            Branch::new(None, vec![pt(0.0, 0.0, r), pt(1.0, 0.0, r)]),
            Branch::new(Some(0), vec![pt(1.0, 0.0, r), pt(2.0, 0.0, r)]),
            Branch::new(Some(0), vec![pt(1.0, 0.0, r), pt(1.0, 2.0, r)]),
            Branch::new(Some(1), vec![pt(2.0, 0.0, r), pt(3.0, 0.0, r), pt(6.0, 0.0, r)]),
            Branch::new(Some(1), vec![pt(2.0, 0.0, r), pt(2.0, 1.0, r)]),
            Branch::new(Some(1), vec![pt(2.0, 0.0, r), pt(2.0, -2.0, r)]),
        ],
    )
}

/// Six branches with a spherical root of radius 0.5 µm
pub fn m_sph_b6() -> Morphology {
    let r = 0.5;
    build(
        true,
        vec![
            Branch::new(None, vec![pt(0.0, 0.0, r)]),
            Branch::new(Some(0), vec![pt(0.5, 0.0, r), pt(1.5, 0.0, r)]),
            Branch::new(Some(0), vec![pt(0.0, 0.5, r), pt(0.0, 2.5, r)]),
            Branch::new(Some(1), vec![pt(1.5, 0.0, r), pt(2.5, 0.0, r), pt(5.5, 0.0, r)]),
            Branch::new(Some(1), vec![pt(1.5, 0.0, r), pt(1.5, 1.0, r)]),
            Branch::new(Some(1), vec![pt(1.5, 0.0, r), pt(1.5, -2.0, r)]),
        ],
    )
}

/// Six branches with two top-level branches.
///
/// Branch 0 has the single child 1; branch 2 forks three ways into 3, 4 and 5.
pub fn m_mlt_b6() -> Morphology {
    let r = 0.5;
    build(
        false,
        vec![
            Branch::new(None, vec![pt(0.0, 0.0, r), pt(1.0, 0.0, r)]),
            Branch::new(Some(0), vec![pt(1.0, 0.0, r), pt(2.0, 0.0, r)]),
            Branch::new(None, vec![pt(0.0, 0.0, r), pt(-2.0, 0.0, r)]),
            Branch::new(Some(2), vec![pt(-2.0, 0.0, r), pt(-2.0, 4.0, r)]),
            Branch::new(Some(2), vec![pt(-2.0, 0.0, r), pt(-3.0, 0.0, r)]),
            Branch::new(Some(2), vec![pt(-2.0, 0.0, r), pt(-2.0, -2.0, r)]),
        ],
    )
}

/// Spherical soma with one straight dendrite of constant radius
pub fn ball_and_stick(soma_radius: f64, dend_length: f64, dend_radius: f64) -> Morphology {
    build(
        true,
        vec![
            Branch::new(None, vec![pt(0.0, 0.0, soma_radius)]),
            Branch::new(
                Some(0),
                vec![
                    pt(soma_radius, 0.0, dend_radius),
                    pt(soma_radius + dend_length, 0.0, dend_radius),
                ],
            ),
        ],
    )
}

/// All fixtures with a name, for table-driven tests
pub fn all() -> Vec<(&'static str, Morphology)> {
    vec![
        ("m_empty", m_empty()),
        ("m_reg_b1", m_reg_b1()),
        ("m_sph_b1", m_sph_b1()),
        ("m_reg_b6", m_reg_b6()),
        ("m_sph_b6", m_sph_b6()),
        ("m_mlt_b6", m_mlt_b6()),
    ]
}
