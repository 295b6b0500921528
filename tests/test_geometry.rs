use std::collections::HashSet;

use kra_expand::core::domain::{Cluster, LatticeKind, Params, Site};
use kra_expand::core::spatial::Lattice;
use kra_expand::engine::crystal::CrystalGeometry;
use kra_expand::engine::geometry::GeometryProvider;
use kra_expand::ExpansionError;
use nalgebra::Vector3;

use crate::common::bcc_geometry;

mod common;

#[test]
fn test_bcc_raw_cluster_orbits() {
    let geometry = bcc_geometry();
    let sizes: Vec<(usize, usize)> = geometry
        .clusters()
        .iter()
        .map(|orbit| (orbit[0].order(), orbit.len()))
        .collect();

    // Singlet, NN pair, 2NN pair, NN-NN-2NN triangle
    assert_eq!(sizes, vec![(1, 1), (2, 4), (2, 3), (3, 12)]);
}

#[test]
fn test_raw_orbits_are_symmetry_closed() {
    let geometry = bcc_geometry();
    for orbit in geometry.clusters() {
        let members: HashSet<&Cluster> = orbit.iter().collect();
        assert_eq!(members.len(), orbit.len(), "duplicate member");
        for cl in orbit {
            for g in geometry.symmetry_ops() {
                let image = Cluster::new(cl.sites().iter().map(|s| g.apply_site(s)).collect());
                assert!(members.contains(&image));
            }
        }
    }
}

#[test]
fn test_cluster_pairs_within_cutoff() {
    let geometry = bcc_geometry();
    let cutoff = Params::default().cluster_cutoff;
    for cl in geometry.clusters().iter().flatten() {
        assert_eq!(cl.sites()[0], Site::origin(0));
        for a in cl.sites() {
            for b in cl.sites() {
                assert!(geometry.distance(a, b) <= cutoff + 1e-8);
            }
        }
    }
}

#[test]
fn test_bcc_jump_network() {
    let geometry = bcc_geometry();
    let jumps = geometry.jump_network();
    assert_eq!(jumps.len(), 1, "one symmetry class of NN hops");
    assert_eq!(jumps[0].len(), 8);

    let nn = (3.0f64).sqrt() * 0.2836 / 2.0;
    let mut terminals = HashSet::new();
    for jump in &jumps[0] {
        assert_eq!(jump.initial, geometry.vacancy_site());
        assert!((jump.dx.norm() - nn).abs() < 1e-10);
        let expected = geometry.cartesian(&jump.terminal) - geometry.cartesian(&jump.initial);
        assert!((jump.dx - expected).norm() < 1e-12);
        terminals.insert(jump.terminal);
    }
    assert_eq!(terminals.len(), 8);
}

#[test]
fn test_neighbour_shells() {
    let geometry = bcc_geometry();
    let origin = Site::origin(0);
    // 8 nearest plus 6 second-nearest
    assert_eq!(geometry.neighbours(&origin, Params::default().cluster_cutoff).len(), 14);
    assert_eq!(geometry.neighbours(&origin, Params::default().jump_cutoff).len(), 8);
    assert_eq!(geometry.supercell().num_sites(), 512);
    assert_eq!(geometry.symmetry_ops().len(), 48);
}

#[test]
fn test_fcc_geometry() {
    let params = Params {
        lattice: LatticeKind::FaceCentredCubic,
        lattice_constant: 0.36,
        num_species: 2,
        max_order: 2,
        cluster_cutoff: 0.26,
        jump_cutoff: 0.26,
        supercell: [4, 4, 4],
    };
    let geometry = CrystalGeometry::from_params(&params).unwrap();
    let sizes: Vec<usize> = geometry.clusters().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1, 6]);
    assert_eq!(geometry.jump_network().len(), 1);
    assert_eq!(geometry.jump_network()[0].len(), 12);
}

#[test]
fn test_invalid_geometry_inputs() {
    let lattice = Lattice::cubic(LatticeKind::SimpleCubic, 1.0).unwrap();
    let err = CrystalGeometry::new(lattice, vec![], [2, 2, 2], 1.1, 2, 1.1).unwrap_err();
    assert!(matches!(err, ExpansionError::InvalidParams { .. }));

    let bad = Params {
        supercell: [8, 0, 8],
        ..Default::default()
    };
    assert!(CrystalGeometry::from_params(&bad).is_err());

    let singular = Lattice::new(Vector3::x(), Vector3::x(), Vector3::z());
    assert!(singular.is_none());
}
