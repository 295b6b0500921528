#![allow(dead_code)]

use std::sync::OnceLock;

use kra_expand::core::chemistry::Occupation;
use kra_expand::core::domain::{ClusterSpecies, Params};
use kra_expand::engine::crystal::CrystalGeometry;
use kra_expand::engine::operators::SymOp;
use kra_expand::expansion::expand::{Expander, KraCoefficients};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const NUM_SPECIES: usize = 3;
pub const VACANCY: usize = NUM_SPECIES - 1;

/// BCC Fe-like crystal: NN + 2NN clusters up to triplets, NN hops, 8x8x8 cells.
pub fn bcc_geometry() -> &'static CrystalGeometry {
    static GEOMETRY: OnceLock<CrystalGeometry> = OnceLock::new();
    GEOMETRY.get_or_init(|| {
        CrystalGeometry::from_params(&Params::default()).expect("BCC geometry should build")
    })
}

pub fn bcc_expander() -> &'static Expander {
    static EXPANDER: OnceLock<Expander> = OnceLock::new();
    EXPANDER.get_or_init(|| {
        Expander::new(bcc_geometry(), NUM_SPECIES).expect("BCC expander should build")
    })
}

/// Random mobile species everywhere, vacancy on the expander's vacancy site.
pub fn random_occupation(expander: &Expander, seed: u64) -> Occupation {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Occupation::new_random(
        expander.supercell().num_sites(),
        expander.species_pool(),
        expander.vacancy_site(),
        &mut rng,
    )
    .expect("valid random occupation")
}

pub fn random_coeffs(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-0.2..0.2)).collect()
}

pub fn random_kra_coeffs(expander: &Expander, seed: u64) -> KraCoefficients {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    expander
        .kra()
        .cluster_species_jumps()
        .iter()
        .map(|(key, orbits)| {
            let coeffs: Vec<f64> = (0..orbits.len()).map(|_| rng.gen_range(0.0..0.1)).collect();
            (*key, coeffs)
        })
        .collect()
}

/// Copy of `occ` with `site` set to `species`.
pub fn with_species(occ: &Occupation, site: usize, species: usize) -> Occupation {
    let mut all: Vec<usize> = (0..occ.num_sites()).map(|s| occ.species_at(s)).collect();
    all[site] = species;
    Occupation::from_species(all, occ.num_species()).expect("species in range")
}

pub fn act(cl: &ClusterSpecies, g: &SymOp) -> ClusterSpecies {
    ClusterSpecies::new(
        cl.site_specs()
            .iter()
            .map(|(s, sp)| (g.apply_site(s), *sp))
            .collect(),
    )
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!(
        (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs())),
        "{} != {} (tol {})",
        a,
        b,
        tol
    );
}
