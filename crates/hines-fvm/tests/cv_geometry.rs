//! CV geometry properties over the reference morphologies

use hines_fvm::{fvm_cv_discretize, CableCell, CvGeometry, CvPolicy, CvPolicyFlags, ParameterSet};
use hines_morph::{fixtures, Cable, Location, Locset, Morphology, Region};
use proptest::prelude::*;

fn policies() -> Vec<CvPolicy> {
    vec![
        CvPolicy::fixed_per_branch(1),
        CvPolicy::fixed_per_branch(3),
        CvPolicy::fixed_per_branch(2).with_flags(CvPolicyFlags::INTERIOR_FORKS),
        CvPolicy::fixed_per_branch(3).with_flags(CvPolicyFlags::SINGLE_ROOT_CV),
        CvPolicy::max_extent(0.7),
        CvPolicy::every_sample(),
        CvPolicy::single(),
        CvPolicy::explicit(Locset::nil()),
    ]
}

fn domains() -> Vec<Region> {
    vec![
        Region::branch(1),
        Region::new(vec![Cable::whole(1), Cable::whole(2)]),
        Region::new(vec![Cable::new(0, 0.3, 0.8), Cable::new(3, 0.2, 1.0)]),
    ]
}

fn restricted_policies(domain: &Region) -> Vec<CvPolicy> {
    vec![
        CvPolicy::fixed_per_branch(2),
        CvPolicy::fixed_per_branch(2).with_flags(CvPolicyFlags::INTERIOR_FORKS),
        CvPolicy::max_extent(0.7),
        CvPolicy::explicit(Locset::new(vec![Location::new(1, 0.5), Location::new(2, 0.5)])),
        CvPolicy::every_sample(),
        CvPolicy::single(),
    ]
    .into_iter()
    .map(|p| p.with_domain(domain.clone()))
    .collect()
}

/// Some non-root CV begins at `loc`; a fork point may be represented by
/// the child cables leaving it
fn starts_cv(morph: &Morphology, g: &CvGeometry, loc: Location) -> bool {
    let starts_at = |c: &Cable| {
        c.prox() == loc
            || (loc.pos == 1.0 && c.prox_pos == 0.0 && morph.branch_parent(c.branch) == Some(loc.branch))
    };
    (0..g.size()).any(|cv| g.parent(cv).is_some() && g.cables(cv).iter().any(starts_at))
}

fn geometry(morph: &Morphology, policy: &CvPolicy) -> CvGeometry {
    let cell = CableCell::new(morph.clone()).unwrap();
    let ends = policy.boundary_points(&cell).unwrap();
    CvGeometry::from_ends(morph, &ends).unwrap()
}

/// Non-degenerate cables tile each branch, parents precede children
fn check_structure(morph: &Morphology, g: &CvGeometry) -> Result<(), String> {
    let mut per_branch: Vec<Vec<Cable>> = vec![Vec::new(); morph.num_branches()];
    for cv in 0..g.size() {
        let cables = g.cables(cv);
        if cables.is_empty() {
            return Err(format!("CV {} has no cables", cv));
        }
        if cables.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!("CV {} cables not sorted: {:?}", cv, cables));
        }
        match g.parent(cv) {
            None if cv != 0 => return Err(format!("CV {} is a second root", cv)),
            Some(p) if p >= cv => return Err(format!("CV {} has parent {}", cv, p)),
            _ => {}
        }
        for c in cables.iter().filter(|c| !c.is_zero_extent()) {
            per_branch[c.branch].push(*c);
        }
    }
    for (b, mut cables) in per_branch.into_iter().enumerate() {
        cables.sort();
        let mut upper = 0.0;
        for c in &cables {
            if c.prox_pos != upper {
                return Err(format!("gap or overlap on branch {}: {:?}", b, cables));
            }
            upper = c.dist_pos;
        }
        if upper != 1.0 {
            return Err(format!("branch {} not covered: {:?}", b, cables));
        }
    }
    Ok(())
}

#[test]
fn every_policy_tiles_every_fixture() {
    for (name, morph) in fixtures::all() {
        for policy in policies() {
            let g = geometry(&morph, &policy);
            if morph.is_empty() {
                assert_eq!(g.size(), 0, "{}", name);
                continue;
            }
            if let Err(e) = check_structure(&morph, &g) {
                panic!("{} with {:?}: {}", name, policy, e);
            }
            assert_eq!(g, geometry(&morph, &policy), "{} not reproducible", name);
        }
    }
}

#[test]
fn restricted_policies_split_at_the_domain_boundary() {
    for morph in [fixtures::m_reg_b6(), fixtures::m_sph_b6(), fixtures::m_mlt_b6()] {
        let cell = CableCell::new(morph.clone()).unwrap();
        for domain in domains() {
            let boundary = domain.boundary(&morph);
            for policy in restricted_policies(&domain) {
                let ends = policy.boundary_points(&cell).unwrap();
                for loc in boundary.iter() {
                    assert!(ends.iter().any(|l| l == loc), "{:?}: {} missing", policy, loc);
                }

                let g = CvGeometry::from_ends(&morph, &ends).unwrap();
                if let Err(e) = check_structure(&morph, &g) {
                    panic!("{:?}: {}", policy, e);
                }
                for loc in boundary.iter() {
                    let root = loc.pos == 0.0 && morph.branch_parent(loc.branch).is_none();
                    let tip = loc.pos == 1.0 && morph.is_leaf(loc.branch);
                    assert!(root || tip || starts_cv(&morph, &g, *loc), "{:?}: {} inside a CV", policy, loc);
                }
            }
        }
    }
}

#[test]
fn nil_and_terminal_give_the_same_single_cv() {
    for (name, morph) in fixtures::all() {
        let nil = geometry(&morph, &CvPolicy::explicit(Locset::nil()));
        let terminal = geometry(&morph, &CvPolicy::explicit(Locset::terminal(&morph)));
        assert_eq!(nil, terminal, "{}", name);
        if !morph.is_empty() {
            assert_eq!(nil.size(), 1, "{}", name);
        }
    }
}

#[test]
fn single_branch_reduces_to_one_cv() {
    let morph = fixtures::m_reg_b1();
    let cell = CableCell::new(morph).unwrap();
    let full = cell.embedding().integrate_area(&Cable::whole(0)).unwrap();
    let length = cell.embedding().branch_length(0).unwrap();

    for policy in [CvPolicy::fixed_per_branch(1), CvPolicy::max_extent(length)] {
        let params = ParameterSet::neuron_defaults().with_discretization(policy);
        let d = fvm_cv_discretize(&cell, &params).unwrap();
        assert_eq!(d.size(), 1);
        assert_eq!(d.geometry.cables(0), &[Cable::whole(0)]);
        assert!((d.cv_area[0] - full).abs() <= 1e-12 * full);
    }
}

#[test]
fn interior_forks_avoid_zero_length_cvs() {
    let morph = fixtures::m_reg_b6();
    let policy = CvPolicy::fixed_per_branch(2).with_flags(CvPolicyFlags::INTERIOR_FORKS);
    let cell = CableCell::new(morph.clone()).unwrap();

    let points = policy.boundary_points(&cell).unwrap();
    for b in 1..6 {
        let on: Vec<f64> = points
            .iter()
            .filter(|l| l.branch == b)
            .map(|l| l.pos)
            .collect();
        let expected: &[f64] = if morph.is_leaf(b) { &[0.25, 0.75, 1.0] } else { &[0.25, 0.75] };
        assert_eq!(on, expected, "branch {}", b);
    }

    let g = CvGeometry::from_ends(&morph, &points).unwrap();
    assert_eq!(g.size(), 13);
    for cv in 0..g.size() {
        assert!(
            g.cables(cv).iter().any(|c| !c.is_zero_extent()),
            "CV {} has zero length: {:?}",
            cv,
            g.cables(cv)
        );
    }

    // The three-way fork at the end of branch 1 lies inside one CV.
    let fork = (0..g.size())
        .find(|&cv| g.cables(cv).first() == Some(&Cable::new(1, 0.75, 1.0)))
        .unwrap();
    assert_eq!(
        g.cables(fork),
        &[
            Cable::new(1, 0.75, 1.0),
            Cable::new(3, 0.0, 0.25),
            Cable::new(4, 0.0, 0.25),
            Cable::new(5, 0.0, 0.25),
        ]
    );
}

#[test]
fn forks_without_interior_flag_get_zero_extent_cv() {
    let morph = fixtures::m_reg_b6();
    let g = geometry(&morph, &CvPolicy::fixed_per_branch(2));

    let fork = (0..g.size())
        .find(|&cv| g.cables(cv).first() == Some(&Cable::new(1, 1.0, 1.0)))
        .unwrap();
    assert_eq!(
        g.cables(fork),
        &[
            Cable::new(1, 1.0, 1.0),
            Cable::new(3, 0.0, 0.0),
            Cable::new(4, 0.0, 0.0),
            Cable::new(5, 0.0, 0.0),
        ]
    );
    assert_eq!(g.children(fork).len(), 3);
    assert!(check_structure(&morph, &g).is_ok());
}

fn arb_locations() -> impl Strategy<Value = Vec<Location>> {
    let pos = prop_oneof![
        Just(0.0),
        Just(1.0),
        (0u32..=20).prop_map(|k| f64::from(k) / 20.0),
        0.0f64..=1.0,
    ];
    prop::collection::vec((0usize..6, pos).prop_map(|(b, p)| Location::new(b, p)), 0..24)
}

proptest! {
    #[test]
    fn explicit_boundaries_tile(locs in arb_locations(), which in 0usize..3) {
        let morph = match which {
            0 => fixtures::m_reg_b6(),
            1 => fixtures::m_sph_b6(),
            _ => fixtures::m_mlt_b6(),
        };
        let ends = Locset::new(locs).dedup();
        let g = CvGeometry::from_ends(&morph, &ends).unwrap();
        prop_assert!(check_structure(&morph, &g).is_ok(), "{:?}", check_structure(&morph, &g));
        prop_assert_eq!(&g, &CvGeometry::from_ends(&morph, &ends).unwrap());

        // Every boundary point that is not the root or a leaf tip starts a CV.
        for loc in ends.iter() {
            let root = loc.pos == 0.0 && morph.branch_parent(loc.branch).is_none();
            let tip = loc.pos == 1.0 && morph.is_leaf(loc.branch);
            if root || tip {
                continue;
            }
            prop_assert!(starts_cv(&morph, &g, *loc), "{} does not start a CV", loc);
        }
    }
}
