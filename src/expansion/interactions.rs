//! Supercell-concrete placements of the decorated clusters, keyed by the
//! `(site id, species)` pairs they touch.

use std::collections::HashMap;

use log::{debug, info};

use crate::core::chemistry::SpeciesPool;
use crate::core::domain::{sub, ClusterSpecies, Site};
use crate::core::spatial::Supercell;
use crate::error::{ExpansionError, Result};
use crate::expansion::spec_clusters::SpecClusterSet;
use crate::expansion::{ClusterRef, SiteSpec};

/// One concrete placement of a SpecClusters member.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Sorted `(site id, species)` requirements.
    pub ids: Vec<SiteSpec>,
    pub cluster: ClusterRef,
}

impl Interaction {
    pub fn contains(&self, key: &SiteSpec) -> bool {
        self.ids.binary_search(key).is_ok()
    }
}

/// One concrete placement of a vector-basis member, as stored in the on/off maps.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportInstance {
    /// `i` in `vecClus[i][j]`.
    pub vec_orbit: usize,
    /// `j` in `vecClus[i][j]`.
    pub member: usize,
    pub placement: Vec<(Site, usize)>,
    /// Sorted `(site id, species)` requirements of `placement`.
    pub ids: Vec<SiteSpec>,
}

impl TransportInstance {
    pub fn contains(&self, key: &SiteSpec) -> bool {
        self.ids.binary_search(key).is_ok()
    }
}

pub type SiteSpecInteractions = HashMap<SiteSpec, Vec<Interaction>>;
pub type TransportMap = HashMap<SiteSpec, Vec<TransportInstance>>;

/// `SiteSpecInteractions` plus `clustersOn`/`clustersOff` for the fixed vacancy site.
#[derive(Debug, Clone)]
pub struct InteractionIndex {
    site_spec_interactions: SiteSpecInteractions,
    clusters_on: TransportMap,
    clusters_off: TransportMap,
}

impl InteractionIndex {
    pub fn new(
        set: &SpecClusterSet,
        supercell: &Supercell,
        pool: &SpeciesPool,
        vacancy_site: usize,
        terminals: &[usize],
    ) -> Result<Self> {
        let site_spec_interactions =
            build_site_spec_interactions(set.spec_clusters(), supercell, pool.num_species())?;
        let (clusters_on, clusters_off) =
            build_on_off_maps(set, supercell, pool, vacancy_site, terminals)?;

        info!(
            "Interactions: {} keys, {} placements; on/off maps: {}/{} keys",
            site_spec_interactions.len(),
            site_spec_interactions.values().map(Vec::len).sum::<usize>(),
            clusters_on.len(),
            clusters_off.len()
        );
        Ok(Self {
            site_spec_interactions,
            clusters_on,
            clusters_off,
        })
    }

    pub fn site_spec_interactions(&self) -> &SiteSpecInteractions {
        &self.site_spec_interactions
    }

    pub fn clusters_on(&self) -> &TransportMap {
        &self.clusters_on
    }

    pub fn clusters_off(&self) -> &TransportMap {
        &self.clusters_off
    }

    /// Placements containing `key`; empty for an unknown key.
    pub fn interactions(&self, key: &SiteSpec) -> &[Interaction] {
        self.site_spec_interactions
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn on(&self, key: &SiteSpec) -> Option<&[TransportInstance]> {
        self.clusters_on.get(key).map(Vec::as_slice)
    }

    pub fn off(&self, key: &SiteSpec) -> Option<&[TransportInstance]> {
        self.clusters_off.get(key).map(Vec::as_slice)
    }

    pub fn num_interactions(&self) -> usize {
        self.site_spec_interactions.values().map(Vec::len).sum()
    }
}

/// Sorted supercell requirements of a placement.
pub fn placement_ids(placement: &[(Site, usize)], supercell: &Supercell) -> Vec<SiteSpec> {
    let mut ids: Vec<SiteSpec> = placement
        .iter()
        .map(|(s, sp)| (supercell.index(s), *sp))
        .collect();
    ids.sort_unstable();
    ids
}

// The anchor must be hit once, and no two sites may wrap onto the same id.
fn check_placement(ids: &[SiteSpec], anchor: SiteSpec) -> Result<()> {
    let count = ids.iter().filter(|(s, _)| *s == anchor.0).count();
    if count != 1 {
        return Err(ExpansionError::AnchorMultiplicity {
            site: anchor.0,
            species: anchor.1,
            count,
        });
    }
    if ids.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(ExpansionError::invalid_params(
            "supercell too small: a cluster wraps onto itself",
        ));
    }
    Ok(())
}

/// Places every SpecClusters member on every supercell cell through each of its
/// entries and files the placement under that entry's `(site id, species)`.
///
/// All `num_species * num_sites` keys are present, possibly with empty lists.
pub fn build_site_spec_interactions(
    spec_clusters: &[Vec<ClusterSpecies>],
    supercell: &Supercell,
    num_species: usize,
) -> Result<SiteSpecInteractions> {
    let mut map: SiteSpecInteractions =
        HashMap::with_capacity(num_species * supercell.num_sites());
    for id in 0..supercell.num_sites() {
        for spec in 0..num_species {
            map.insert((id, spec), Vec::new());
        }
    }

    for (orbit, list) in spec_clusters.iter().enumerate() {
        for (member, cl) in list.iter().enumerate() {
            for (site_k, spec_k) in cl.site_specs() {
                if *spec_k >= num_species {
                    return Err(ExpansionError::SpeciesOutOfRange {
                        species: *spec_k,
                        num_species,
                    });
                }
                for cell in supercell.cells() {
                    let key = (supercell.index(&Site::new(site_k.ci, cell)), *spec_k);
                    let ids = placement_ids(&cl.placed(sub(cell, site_k.r)), supercell);
                    check_placement(&ids, key)?;
                    map.entry(key).or_default().push(Interaction {
                        ids,
                        cluster: ClusterRef { orbit, member },
                    });
                }
            }
        }
    }
    Ok(map)
}

/// Builds `(clustersOn, clustersOff)` for hops out of `vacancy_site` to `terminals`.
///
/// Off keys are the occupations a hop removes: the vacancy on its site, and any mobile
/// species on a terminal. On keys are the occupations a hop creates: a mobile species
/// on the vacancy site, and the vacancy on a terminal. Placements holding the vacancy
/// on `vacancy_site` are only filed under keys anchored there.
pub fn build_on_off_maps(
    set: &SpecClusterSet,
    supercell: &Supercell,
    pool: &SpeciesPool,
    vacancy_site: usize,
    terminals: &[usize],
) -> Result<(TransportMap, TransportMap)> {
    let vac = pool.vacancy();

    let mut off_keys = vec![(vacancy_site, vac)];
    let mut on_keys: Vec<SiteSpec> = pool.mobile().map(|s| (vacancy_site, s)).collect();
    for &b in terminals {
        off_keys.extend(pool.mobile().map(|s| (b, s)));
        on_keys.push((b, vac));
    }

    let mut clusters_on = TransportMap::new();
    for key in on_keys {
        let instances = anchored_instances(set, supercell, key, (vacancy_site, vac))?;
        clusters_on.insert(key, instances);
    }
    let mut clusters_off = TransportMap::new();
    for key in off_keys {
        let instances = anchored_instances(set, supercell, key, (vacancy_site, vac))?;
        clusters_off.insert(key, instances);
    }
    Ok((clusters_on, clusters_off))
}

fn anchored_instances(
    set: &SpecClusterSet,
    supercell: &Supercell,
    key: SiteSpec,
    vacancy: SiteSpec,
) -> Result<Vec<TransportInstance>> {
    let anchor = supercell.site(key.0)?;
    let mut out = Vec::new();

    for (vec_orbit, list) in set.vec_clus().iter().enumerate() {
        for (member, cl) in list.iter().enumerate() {
            for (site_k, spec_k) in cl.site_specs() {
                if site_k.ci != anchor.ci || *spec_k != key.1 {
                    continue;
                }
                let placement = cl.placed(sub(anchor.r, site_k.r));
                let ids = placement_ids(&placement, supercell);
                if key.0 != vacancy.0 && ids.binary_search(&vacancy).is_ok() {
                    continue;
                }
                out.push(TransportInstance {
                    vec_orbit,
                    member,
                    placement,
                    ids,
                });
            }
        }
    }
    debug!("Key {:?}: {} transport instances", key, out.len());
    Ok(out)
}
