use std::collections::{HashMap, HashSet};

use kra_expand::core::domain::{sub, ClusterSpecies};
use kra_expand::core::spatial::Supercell;
use kra_expand::expansion::interactions::{build_site_spec_interactions, TransportMap};
use kra_expand::expansion::{ClusterRef, SiteSpec};
use kra_expand::ExpansionError;

use crate::common::{bcc_expander, NUM_SPECIES, VACANCY};

mod common;

#[test]
fn test_site_spec_interaction_keys() {
    let expander = bcc_expander();
    let ssi = expander.interactions().site_spec_interactions();
    // 512 sites x 3 species
    assert_eq!(ssi.len(), 1536);

    let spec = expander.spec_clusters().spec_clusters();
    let expected: usize = spec
        .iter()
        .flatten()
        .map(|cl| cl.order() * expander.supercell().num_sites())
        .sum();
    assert_eq!(expander.interactions().num_interactions(), expected);
}

#[test]
fn test_interactions_contain_their_anchor_once() {
    let expander = bcc_expander();
    for (key, list) in expander.interactions().site_spec_interactions() {
        for inter in list {
            assert!(inter.contains(key));
            assert_eq!(inter.ids.iter().filter(|(s, _)| *s == key.0).count(), 1);
            assert!(inter.ids.windows(2).all(|w| w[0].0 < w[1].0), "sorted, distinct sites");
        }
    }
}

#[test]
fn test_interactions_are_translation_invariant() {
    let expander = bcc_expander();
    let index = expander.interactions();
    for spec in 0..NUM_SPECIES {
        let reference = index.interactions(&(0, spec)).len();
        assert!(reference > 0);
        for site in 0..expander.supercell().num_sites() {
            assert_eq!(index.interactions(&(site, spec)).len(), reference);
        }
    }
}

#[test]
fn test_every_placement_listed_under_each_of_its_keys() {
    let expander = bcc_expander();
    let index = expander.interactions();
    for inter in index.interactions(&(100, 1)) {
        for key in &inter.ids {
            let matches = index
                .interactions(key)
                .iter()
                .filter(|other| other.ids == inter.ids)
                .count();
            assert_eq!(matches, 1);
            assert!(index
                .interactions(key)
                .iter()
                .any(|other| other.cluster == inter.cluster && other.ids == inter.ids));
        }
    }
}

#[test]
fn test_on_off_key_sets() {
    let expander = bcc_expander();
    let index = expander.interactions();
    let a = expander.vacancy_site();

    // Off: vacancy leaving A, plus each mobile species leaving each terminal
    assert_eq!(index.clusters_off().len(), 1 + 8 * 2);
    // On: each mobile species arriving at A, plus the vacancy arriving at each terminal
    assert_eq!(index.clusters_on().len(), 2 + 8);

    assert!(index.off(&(a, VACANCY)).is_some());
    for hop in expander.hops() {
        assert!(index.on(&(hop.to, VACANCY)).is_some());
        for s in 0..VACANCY {
            assert!(index.off(&(hop.to, s)).is_some());
        }
    }
    assert!(index.on(&(a, VACANCY)).is_none());
}

#[test]
fn test_on_off_counts_at_vacancy_site() {
    let expander = bcc_expander();
    let index = expander.interactions();
    let set = expander.spec_clusters();
    let a = expander.vacancy_site();

    for spec in 0..NUM_SPECIES {
        let instances = if spec == VACANCY {
            index.off(&(a, spec)).unwrap()
        } else {
            index.on(&(a, spec)).unwrap()
        };

        let mut per_cluster: HashMap<&ClusterSpecies, usize> = HashMap::new();
        for inst in instances {
            let cl = &set.vec_clus()[inst.vec_orbit][inst.member];
            *per_cluster.entry(cl).or_default() += 1;
            assert!(inst.contains(&(a, spec)));
        }

        // c matching entries times the basis dimension
        for members in set.vec_clus() {
            for cl in members {
                let c = cl.site_specs().iter().filter(|(_, sp)| *sp == spec).count();
                let got = per_cluster.get(cl).copied().unwrap_or(0);
                assert_eq!(got, c * set.dim_basis(cl));
            }
        }
    }
}

#[test]
fn test_terminal_keys_skip_vacancy_placements() {
    let expander = bcc_expander();
    let index = expander.interactions();
    let a = expander.vacancy_site();
    for hop in expander.hops() {
        for s in 0..VACANCY {
            for inst in index.off(&(hop.to, s)).unwrap() {
                assert!(!inst.contains(&(a, VACANCY)));
                assert!(inst.contains(&(hop.to, s)));
            }
        }
        // The vacancy arriving at B can only sit in placements without a second vacancy
        for inst in index.on(&(hop.to, VACANCY)).unwrap() {
            assert!(!inst.contains(&(a, VACANCY)));
        }
    }
}

#[test]
fn test_small_supercell_is_rejected() {
    let expander = bcc_expander();
    // A 1x1x1 supercell folds every pair onto one site
    let tiny = Supercell::new([1, 1, 1], 1).unwrap();
    let spec = expander.spec_clusters().spec_clusters();
    let err = build_site_spec_interactions(spec, &tiny, NUM_SPECIES).unwrap_err();
    assert!(matches!(err, ExpansionError::AnchorMultiplicity { .. }));
}

#[test]
fn test_distinct_representatives_match_members() {
    let expander = bcc_expander();
    let index = expander.interactions();

    let mut refs: HashSet<ClusterRef> = HashSet::new();
    let mut owners: HashMap<&[SiteSpec], HashSet<ClusterRef>> = HashMap::new();
    for list in index.site_spec_interactions().values() {
        for inter in list {
            refs.insert(inter.cluster);
            owners.entry(inter.ids.as_slice()).or_default().insert(inter.cluster);
        }
    }
    assert_eq!(refs.len(), expander.spec_clusters().num_members());
    assert_eq!(refs.len(), 299);

    // Each concrete placement comes from exactly one decorated cluster
    for (ids, clusters) in &owners {
        assert_eq!(clusters.len(), 1, "placement {:?}", ids);
    }
}

// Expected instance count per vector-basis cluster under `key`: matching entries
// whose placement keeps clear of the vacancy, times the basis dimension.
fn expected_counts(map: &TransportMap, vacancy_site: usize) -> Vec<(SiteSpec, usize, usize)> {
    let expander = bcc_expander();
    let supercell = expander.supercell();
    let set = expander.spec_clusters();

    let mut out = Vec::new();
    for (&key, instances) in map {
        let anchor = supercell.site(key.0).unwrap();
        let mut per_cluster: HashMap<&ClusterSpecies, usize> = HashMap::new();
        for inst in instances {
            *per_cluster
                .entry(&set.vec_clus()[inst.vec_orbit][inst.member])
                .or_default() += 1;
        }

        let distinct: HashSet<&ClusterSpecies> = set.vec_clus().iter().flatten().collect();
        for cl in distinct {
            let c = cl
                .site_specs()
                .iter()
                .filter(|(site, sp)| site.ci == anchor.ci && *sp == key.1)
                .filter(|(site, _)| {
                    key.0 == vacancy_site
                        || !cl.placed(sub(anchor.r, site.r)).iter().any(|(s, sp)| {
                            supercell.index(s) == vacancy_site && *sp == VACANCY
                        })
                })
                .count();
            let got = per_cluster.get(cl).copied().unwrap_or(0);
            out.push((key, got, c * set.dim_basis(cl)));
        }
    }
    out
}

#[test]
fn test_on_off_counts_for_every_key() {
    let expander = bcc_expander();
    let index = expander.interactions();
    let a = expander.vacancy_site();

    let mut checked = 0;
    for map in [index.clusters_on(), index.clusters_off()] {
        for (key, got, expected) in expected_counts(map, a) {
            assert_eq!(got, expected, "key {:?}", key);
            checked += 1;
        }
    }
    // 27 keys, one check per distinct vector-basis cluster
    assert_eq!(checked % 27, 0);
    assert!(checked > 0);
}
