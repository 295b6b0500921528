//! Transition clusters: clusters attached to a vacancy hop, grouped under the hop's
//! little group, decorated with species, and summed into KRA barriers.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::analysis::orbits::partition_orbits;
use crate::core::chemistry::{Occupation, SpeciesPool};
use crate::core::domain::{sub, Cluster, Site, TransitionCluster};
use crate::core::spatial::Supercell;
use crate::engine::geometry::GeometryProvider;
use crate::engine::operators::{site_point_group, AnchoredOp, SymOp};
use crate::error::{ExpansionError, Result};
use crate::expansion::{HopKey, SiteSpec, TransitionKey};

/// Little-group orbits of transition clusters, per hop.
pub type SymTransClusters = BTreeMap<HopKey, Vec<Vec<TransitionCluster>>>;

/// Decorated orbits per `(hop, final species)`.
pub type ClusterSpeciesJumps = BTreeMap<TransitionKey, Vec<DecoratedTransitionOrbit>>;

/// One scalar transition orbit with a fixed positional species assignment on its
/// free sites.
#[derive(Debug, Clone)]
pub struct DecoratedTransitionOrbit {
    pub species: Vec<usize>,
    /// Index of the parent orbit in `SymTransClusters[hop]`.
    pub scalar_orbit: usize,
    pub clusters: Vec<TransitionCluster>,
    instances: Vec<Vec<SiteSpec>>,
}

impl DecoratedTransitionOrbit {
    pub fn order(&self) -> usize {
        self.species.len()
    }

    /// Free-site requirements of every member, as supercell `(site id, species)`.
    pub fn instances(&self) -> &[Vec<SiteSpec>] {
        &self.instances
    }

    /// Free sites of member `member` with their assigned species.
    pub fn decorated(&self, member: usize) -> Vec<(Site, usize)> {
        self.clusters[member]
            .free
            .iter()
            .copied()
            .zip(self.species.iter().copied())
            .collect()
    }
}

/// The transition-cluster side of the expansion (KRA barriers).
#[derive(Debug, Clone)]
pub struct KraExpander {
    pool: SpeciesPool,
    num_sites: usize,
    sym_trans_clusters: SymTransClusters,
    cluster_species_jumps: ClusterSpeciesJumps,
    little_groups: BTreeMap<HopKey, Vec<usize>>,
}

impl KraExpander {
    pub fn new<P: GeometryProvider + ?Sized>(geometry: &P, num_species: usize) -> Result<Self> {
        let pool = SpeciesPool::new(num_species)?;
        let supercell = geometry.supercell();

        let mut little_groups = BTreeMap::new();
        for jump in geometry.jump_network().iter().flatten() {
            let group = little_group(geometry.symmetry_ops(), &jump.initial, &jump.terminal);
            little_groups.insert(jump.ids(supercell), group.iter().map(|g| g.index).collect());
        }

        let sym_trans_clusters = build_sym_trans_clusters(geometry)?;
        let cluster_species_jumps =
            build_cluster_species_jumps(&sym_trans_clusters, &pool, supercell)?;

        info!(
            "KRA: {} hops, {} transition orbits, {} decorated orbits",
            sym_trans_clusters.len(),
            sym_trans_clusters.values().map(Vec::len).sum::<usize>(),
            cluster_species_jumps.values().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            pool,
            num_sites: supercell.num_sites(),
            sym_trans_clusters,
            cluster_species_jumps,
            little_groups,
        })
    }

    pub fn species_pool(&self) -> &SpeciesPool {
        &self.pool
    }

    pub fn sym_trans_clusters(&self) -> &SymTransClusters {
        &self.sym_trans_clusters
    }

    pub fn cluster_species_jumps(&self) -> &ClusterSpeciesJumps {
        &self.cluster_species_jumps
    }

    /// Indices (into the full operator list) of the hop's little group.
    pub fn little_group(&self, hop: &HopKey) -> Option<&[usize]> {
        self.little_groups.get(hop).map(Vec::as_slice)
    }

    /// KRA barrier of `transition` in `occupation`.
    ///
    /// `coeffs[i]` is added once per member of decorated orbit `i` whose free sites all
    /// carry their assigned species. Only free sites are matched; the occupant of the
    /// final site selects the transition key but does not gate the sum.
    pub fn get_kra(
        &self,
        transition: &TransitionKey,
        occupation: &Occupation,
        coeffs: &[f64],
    ) -> Result<f64> {
        let (from, to, spec_j) = *transition;
        let orbits = self
            .cluster_species_jumps
            .get(transition)
            .ok_or(ExpansionError::UnknownTransition {
                from,
                to,
                species: spec_j,
            })?;
        if coeffs.len() != orbits.len() {
            return Err(ExpansionError::CoefficientLength {
                expected: orbits.len(),
                found: coeffs.len(),
            });
        }
        if occupation.num_sites() != self.num_sites {
            return Err(ExpansionError::SiteCountMismatch {
                expected: self.num_sites,
                found: occupation.num_sites(),
            });
        }
        if !occupation.is_occupied(from, self.pool.vacancy()) {
            return Err(ExpansionError::VacancyMissing { site: from });
        }
        let mut kra = 0.0;
        for (orbit, &coeff) in orbits.iter().zip(coeffs) {
            for instance in orbit.instances() {
                if instance
                    .iter()
                    .all(|&(site, spec)| occupation.is_occupied(site, spec))
                {
                    kra += coeff;
                }
            }
        }
        Ok(kra)
    }
}

/// Operators fixing both `initial` and `terminal`.
pub fn little_group<'a>(
    ops: &'a [SymOp],
    initial: &Site,
    terminal: &Site,
) -> Vec<AnchoredOp<'a>> {
    site_point_group(ops, initial)
        .into_iter()
        .filter(|g| g.apply_site(terminal) == *terminal)
        .collect()
}

/// Groups, for every hop of the jump network, the transition clusters into orbits
/// of the hop's little group.
pub fn build_sym_trans_clusters<P: GeometryProvider + ?Sized>(
    geometry: &P,
) -> Result<SymTransClusters> {
    let supercell = geometry.supercell();
    let mut out = SymTransClusters::new();

    for jump in geometry.jump_network().iter().flatten() {
        let hop = jump.ids(supercell);
        let group = little_group(geometry.symmetry_ops(), &jump.initial, &jump.terminal);
        let candidates = transition_candidates(&jump.initial, &jump.terminal, geometry.clusters());
        let count = candidates.len();

        let orbits = partition_orbits(
            candidates,
            &group,
            |tc: &TransitionCluster, g: &AnchoredOp<'_>| {
                TransitionCluster::new(
                    tc.initial,
                    tc.terminal,
                    tc.free.iter().map(|s| g.apply_site(s)).collect(),
                )
            },
            TransitionCluster::key,
        )?;
        debug!(
            "Hop {:?}: little group of order {}, {} clusters in {} orbits",
            hop,
            group.len(),
            count,
            orbits.len()
        );

        if out.insert(hop, orbits).is_some() {
            return Err(ExpansionError::DuplicateMember {
                member: format!("hop {:?}", hop),
            });
        }
    }
    Ok(out)
}

/// Every translated raw cluster touching `initial` or `terminal`, reduced to the
/// sites other than the two endpoints. Empty remainders are dropped.
fn transition_candidates(
    initial: &Site,
    terminal: &Site,
    clusters: &[Vec<Cluster>],
) -> Vec<TransitionCluster> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cluster in clusters.iter().flatten() {
        for site in cluster.sites() {
            for endpoint in [initial, terminal] {
                if site.ci != endpoint.ci {
                    continue;
                }
                let free: Vec<Site> = cluster
                    .placed(sub(endpoint.r, site.r))
                    .into_iter()
                    .filter(|s| s != initial && s != terminal)
                    .collect();
                if free.is_empty() {
                    continue;
                }
                let tc = TransitionCluster::new(*initial, *terminal, free);
                if seen.insert(tc.key()) {
                    out.push(tc);
                }
            }
        }
    }
    out
}

/// Decorates every little-group orbit with all `(NSpec - 1)^order` mobile-species
/// assignments, for every mobile species on the final site.
pub fn build_cluster_species_jumps(
    sym_trans_clusters: &SymTransClusters,
    pool: &SpeciesPool,
    supercell: &Supercell,
) -> Result<ClusterSpeciesJumps> {
    let mut out = ClusterSpeciesJumps::new();

    for (&(from, to), orbits) in sym_trans_clusters {
        for spec_j in pool.mobile() {
            let mut decorated = Vec::new();
            for (scalar_orbit, orbit) in orbits.iter().enumerate() {
                let order = orbit[0].order();
                let expected = pool.num_mobile().pow(order as u32);
                let before = decorated.len();

                for species in pool.mobile_decorations(order) {
                    let instances: Vec<Vec<SiteSpec>> = orbit
                        .iter()
                        .map(|tc| {
                            tc.free
                                .iter()
                                .zip(&species)
                                .map(|(s, &sp)| (supercell.index(s), sp))
                                .collect::<Vec<SiteSpec>>()
                        })
                        .collect();
                    decorated.push(DecoratedTransitionOrbit {
                        species,
                        scalar_orbit,
                        clusters: orbit.clone(),
                        instances,
                    });
                }

                let found = decorated.len() - before;
                if found != expected {
                    return Err(ExpansionError::DecorationCount {
                        order,
                        expected,
                        found,
                    });
                }
            }
            out.insert((from, to, spec_j), decorated);
        }
    }
    Ok(out)
}
