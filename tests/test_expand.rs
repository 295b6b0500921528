use kra_expand::expansion::expand::KraCoefficients;
use kra_expand::expansion::IndexStats;
use kra_expand::ExpansionError;
use nalgebra::{DMatrix, DVector};

use crate::common::{
    assert_close, bcc_expander, random_coeffs, random_kra_coeffs, random_occupation,
    with_species, VACANCY,
};

mod common;

const BETA: f64 = 1.0 / (8.617e-5 * 900.0);

#[test]
fn test_index_stats() {
    let expander = bcc_expander();
    let stats = expander.stats();
    assert_eq!(
        stats,
        IndexStats {
            num_sites: 512,
            num_transitions: 16,
            num_transition_orbits: 8 * 21,
            num_decorated_transition_orbits: 16 * 68,
            num_spec_orbits: 26,
            num_spec_clusters: 299,
            num_vector_orbits: 26,
            num_interactions: (3 + 56 * 2 + 240 * 3) * 512,
        }
    );
    assert_eq!(expander.hops().len(), 8);
    assert_eq!(expander.vacancy_site(), 0);
}

#[test]
fn test_energy_change_matches_full_rescan() {
    let expander = bcc_expander();
    let n = expander.spec_clusters().spec_clusters().len();
    let coeffs = random_coeffs(n, 11);

    for seed in 0..3 {
        let occ = random_occupation(expander, seed);
        let before = expander.total_energy(&occ, &coeffs).unwrap();

        for hop in expander.hops() {
            let after = expander
                .total_energy(&occ.swapped(hop.from, hop.to), &coeffs)
                .unwrap();
            let de = expander.energy_change(&occ, hop.from, hop.to, &coeffs).unwrap();
            assert_close(de, after - before, 1e-10);
        }

        // Exchanges between arbitrary sites go through the same index
        for (a, b) in [(5, 77), (130, 131), (0, 300)] {
            let after = expander.total_energy(&occ.swapped(a, b), &coeffs).unwrap();
            let de = expander.energy_change(&occ, a, b, &coeffs).unwrap();
            assert_close(de, after - before, 1e-10);
        }
    }
}

#[test]
fn test_transport_change_matches_full_rescan() {
    let expander = bcc_expander();
    for seed in 10..13 {
        let occ = random_occupation(expander, seed);
        let before = expander.vector_basis_values(&occ).unwrap();
        for hop in expander.hops() {
            let after = expander
                .vector_basis_values(&occ.swapped(hop.from, hop.to))
                .unwrap();
            let dphi = expander.transport_change(&occ, hop.from, hop.to).unwrap();
            assert_eq!(dphi.len(), expander.num_vector_orbits());
            for i in 0..dphi.len() {
                assert!(
                    (dphi[i] - (after[i] - before[i])).norm() < 1e-9,
                    "vector orbit {} on hop {} -> {}",
                    i,
                    hop.from,
                    hop.to
                );
            }
        }
    }
}

#[test]
fn test_unit_rates_reduce_to_rescan_sums() {
    let expander = bcc_expander();
    let n = expander.num_vector_orbits();
    let energy = vec![0.0; expander.spec_clusters().spec_clusters().len()];
    let kra = expander.zero_kra_coefficients();
    let occ = random_occupation(expander, 21);

    let (wbar, bbar) = expander.expand(BETA, &occ, &energy, &kra).unwrap();

    let before = expander.vector_basis_values(&occ).unwrap();
    let mut w = DMatrix::<f64>::zeros(n, n);
    let mut b = DVector::<f64>::zeros(n);
    for hop in expander.hops() {
        let after = expander
            .vector_basis_values(&occ.swapped(hop.from, hop.to))
            .unwrap();
        let dphi: Vec<_> = (0..n).map(|i| after[i] - before[i]).collect();
        for x in 0..n {
            b[x] += dphi[x].dot(&hop.dx);
            for y in 0..n {
                w[(x, y)] += dphi[x].dot(&dphi[y]);
            }
        }
    }
    assert!((wbar - w).abs().max() < 1e-9);
    assert!((bbar - b).abs().max() < 1e-9);
}

#[test]
fn test_expand_combines_rates_and_transport() {
    let expander = bcc_expander();
    let n = expander.num_vector_orbits();
    let energy = random_coeffs(expander.spec_clusters().spec_clusters().len(), 31);
    let kra = random_kra_coeffs(expander, 32);
    let occ = random_occupation(expander, 33);

    // Mild beta keeps the rates of order one
    let beta = 1.0;
    let (wbar, bbar) = expander.expand(beta, &occ, &energy, &kra).unwrap();

    let mut w = DMatrix::<f64>::zeros(n, n);
    let mut b = DVector::<f64>::zeros(n);
    for hop in expander.hops() {
        let key = (hop.from, hop.to, occ.species_at(hop.to));
        let barrier = expander.kra().get_kra(&key, &occ, &kra[&key]).unwrap();
        let de = expander.energy_change(&occ, hop.from, hop.to, &energy).unwrap();
        let rate = (-beta * (barrier + 0.5 * de)).exp();
        let dphi = expander.transport_change(&occ, hop.from, hop.to).unwrap();
        for x in 0..n {
            b[x] += rate * dphi[x].dot(&hop.dx);
            for y in 0..n {
                w[(x, y)] += rate * dphi[x].dot(&dphi[y]);
            }
        }
    }
    let tol = 1e-9 * (1.0 + w.abs().max());
    assert!(w.abs().max() > 0.0);
    assert!((&wbar - &w).abs().max() < tol);
    assert!((&bbar - &b).abs().max() < tol);

    // Symmetric with a non-negative diagonal
    assert!((&wbar - wbar.transpose()).abs().max() == 0.0);
    assert!((0..n).all(|i| wbar[(i, i)] >= 0.0));
}

#[test]
fn test_expand_is_deterministic_and_batch_matches() {
    let expander = bcc_expander();
    let energy = random_coeffs(expander.spec_clusters().spec_clusters().len(), 41);
    let kra = random_kra_coeffs(expander, 42);
    let occupations: Vec<_> = (50..54).map(|s| random_occupation(expander, s)).collect();

    let first = expander.expand(BETA, &occupations[0], &energy, &kra).unwrap();
    let again = expander.expand(BETA, &occupations[0], &energy, &kra).unwrap();
    assert_eq!(first, again, "bit-identical on repeat");

    let batch = expander.expand_batch(BETA, &occupations, &energy, &kra).unwrap();
    assert_eq!(batch.len(), occupations.len());
    for (occ, result) in occupations.iter().zip(&batch) {
        assert_eq!(&expander.expand(BETA, occ, &energy, &kra).unwrap(), result);
    }
}

#[test]
fn test_expand_errors() {
    let expander = bcc_expander();
    let energy = vec![0.0; expander.spec_clusters().spec_clusters().len()];
    let kra = expander.zero_kra_coefficients();
    let occ = random_occupation(expander, 61);
    let a = expander.vacancy_site();

    let no_vacancy = with_species(&occ, a, 0);
    assert_eq!(
        expander.expand(BETA, &no_vacancy, &energy, &kra),
        Err(ExpansionError::VacancyMissing { site: a })
    );

    assert_eq!(
        expander.expand(BETA, &occ, &energy[1..], &kra),
        Err(ExpansionError::CoefficientLength {
            expected: energy.len(),
            found: energy.len() - 1
        })
    );

    let empty = KraCoefficients::new();
    assert!(matches!(
        expander.expand(BETA, &occ, &energy, &empty),
        Err(ExpansionError::UnknownTransition { .. })
    ));

    let target = expander.hops()[0].to;
    let two_vacancies = with_species(&occ, target, VACANCY);
    assert!(matches!(
        expander.expand(BETA, &two_vacancies, &energy, &kra),
        Err(ExpansionError::InvalidOccupation { .. })
    ));

    let small = random_occupation(expander, 62);
    let truncated = kra_expand::core::chemistry::Occupation::from_species(
        (0..10).map(|s| small.species_at(s)).collect(),
        small.num_species(),
    )
    .unwrap();
    assert!(matches!(
        expander.expand(BETA, &truncated, &energy, &kra),
        Err(ExpansionError::SiteCountMismatch { .. })
    ));

    // Not a hop out of the vacancy site
    assert!(matches!(
        expander.transport_change(&occ, a, 300),
        Err(ExpansionError::UnknownTransition { .. })
    ));
}
