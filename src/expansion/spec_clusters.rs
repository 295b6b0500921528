//! Species-decorated cluster orbits under the full space group, and the
//! symmetry-equivariant vector basis attached to them.

use std::collections::HashMap;

use log::{debug, info};
use nalgebra::{Matrix3, SymmetricEigen, Vector3};

use crate::analysis::orbits::{mapping_op, partition_orbits, stabilizer};
use crate::core::chemistry::SpeciesPool;
use crate::core::domain::{Cluster, ClusterSpecies};
use crate::engine::geometry::GeometryProvider;
use crate::engine::operators::SymOp;
use crate::error::{ExpansionError, Result};
use crate::expansion::ClusterRef;

const EIGEN_CUT: f64 = 0.5;
const ZERO_TOL: f64 = 1e-10;

/// `vecClus`, `vecVec` and `Vclus2Clus`, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct VectorBasis {
    pub vec_clus: Vec<Vec<ClusterSpecies>>,
    pub vec_vec: Vec<Vec<Vector3<f64>>>,
    pub vclus2clus: Vec<usize>,
}

/// Decorated cluster orbits plus their vector basis and lookup tables.
#[derive(Debug, Clone)]
pub struct SpecClusterSet {
    spec_clusters: Vec<Vec<ClusterSpecies>>,
    clust2spec: HashMap<ClusterSpecies, ClusterRef>,
    basis: VectorBasis,
    clust2vec: HashMap<ClusterSpecies, Vec<(usize, usize)>>,
}

impl SpecClusterSet {
    pub fn new<P: GeometryProvider + ?Sized>(geometry: &P, num_species: usize) -> Result<Self> {
        let pool = SpeciesPool::new(num_species)?;
        let ops = geometry.symmetry_ops();
        let spec_clusters = build_spec_clusters(geometry.clusters(), &pool, ops)?;
        let basis = build_vector_basis(&spec_clusters, ops)?;

        info!(
            "SpecClusters: {} orbits, {} members, {} vector orbits",
            spec_clusters.len(),
            spec_clusters.iter().map(Vec::len).sum::<usize>(),
            basis.vec_clus.len()
        );
        Ok(Self::from_parts(spec_clusters, basis))
    }

    fn from_parts(spec_clusters: Vec<Vec<ClusterSpecies>>, basis: VectorBasis) -> Self {
        let mut clust2spec = HashMap::new();
        for (orbit, list) in spec_clusters.iter().enumerate() {
            for (member, cl) in list.iter().enumerate() {
                clust2spec.insert(cl.clone(), ClusterRef { orbit, member });
            }
        }

        let mut clust2vec: HashMap<ClusterSpecies, Vec<(usize, usize)>> = HashMap::new();
        for (i, list) in basis.vec_clus.iter().enumerate() {
            for (j, cl) in list.iter().enumerate() {
                clust2vec.entry(cl.clone()).or_default().push((i, j));
            }
        }

        Self {
            spec_clusters,
            clust2spec,
            basis,
            clust2vec,
        }
    }

    pub fn spec_clusters(&self) -> &[Vec<ClusterSpecies>] {
        &self.spec_clusters
    }

    pub fn vec_clus(&self) -> &[Vec<ClusterSpecies>] {
        &self.basis.vec_clus
    }

    pub fn vec_vec(&self) -> &[Vec<Vector3<f64>>] {
        &self.basis.vec_vec
    }

    pub fn vclus2clus(&self) -> &[usize] {
        &self.basis.vclus2clus
    }

    pub fn num_vector_orbits(&self) -> usize {
        self.basis.vec_clus.len()
    }

    /// Total `(orbit, member)` pairs.
    pub fn num_members(&self) -> usize {
        self.spec_clusters.iter().map(Vec::len).sum()
    }

    /// Where `cluster` sits in SpecClusters.
    pub fn clust2spec(&self, cluster: &ClusterSpecies) -> Option<ClusterRef> {
        self.clust2spec.get(cluster).copied()
    }

    /// Every `(vector orbit, position)` that `cluster` occupies.
    pub fn clust2vec(&self, cluster: &ClusterSpecies) -> &[(usize, usize)] {
        self.clust2vec
            .get(cluster)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Dimension of the vector basis attached to `cluster`'s orbit.
    pub fn dim_basis(&self, cluster: &ClusterSpecies) -> usize {
        self.clust2vec(cluster).len()
    }
}

fn act(cl: &ClusterSpecies, g: &SymOp) -> ClusterSpecies {
    ClusterSpecies::new(
        cl.site_specs()
            .iter()
            .map(|(s, sp)| (g.apply_site(s), *sp))
            .collect(),
    )
}

fn identity_key(cl: &ClusterSpecies) -> ClusterSpecies {
    cl.clone()
}

/// Decorates every member of every raw orbit with all species assignments holding at
/// most one vacancy, and re-partitions the result under the full group.
pub fn build_spec_clusters(
    clusters: &[Vec<Cluster>],
    pool: &SpeciesPool,
    ops: &[SymOp],
) -> Result<Vec<Vec<ClusterSpecies>>> {
    let mut out = Vec::new();
    for orbit in clusters {
        let Some(first) = orbit.first() else {
            continue;
        };
        let decorations = pool.decorations(first.order());
        let items: Vec<ClusterSpecies> = orbit
            .iter()
            .flat_map(|cl| decorations.iter().map(move |d| ClusterSpecies::decorate(cl, d)))
            .collect();
        let expected = orbit.len() * decorations.len();

        let decorated = partition_orbits(items, ops, act, identity_key)?;
        let found: usize = decorated.iter().map(Vec::len).sum();
        if found != expected {
            return Err(ExpansionError::DecorationCount {
                order: first.order(),
                expected,
                found,
            });
        }
        debug!(
            "Raw orbit of order {} ({} members): {} decorated orbits",
            first.order(),
            orbit.len(),
            decorated.len()
        );
        out.extend(decorated);
    }
    Ok(out)
}

/// For each decorated orbit, the vectors fixed by the representative's stabilizer,
/// carried onto every member by an operator mapping the representative there.
pub fn build_vector_basis(
    spec_clusters: &[Vec<ClusterSpecies>],
    ops: &[SymOp],
) -> Result<VectorBasis> {
    let mut basis = VectorBasis::default();

    for (orbit_index, orbit) in spec_clusters.iter().enumerate() {
        let Some(cl0) = orbit.first() else {
            continue;
        };
        let stab = stabilizer(cl0, ops, act, identity_key);
        let invariant = invariant_subspace(stab.iter().map(|&i| &ops[i].cartrot));
        if invariant.is_empty() {
            continue;
        }

        let carriers = orbit
            .iter()
            .map(|member| {
                mapping_op(cl0, member, ops, act, identity_key).ok_or_else(|| {
                    ExpansionError::OrbitNotClosed {
                        member: format!("{:?}", cl0),
                        image: format!("{:?}", member),
                    }
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        for v0 in invariant {
            basis.vec_clus.push(orbit.clone());
            basis
                .vec_vec
                .push(carriers.iter().map(|&g| ops[g].apply_vector(&v0)).collect());
            basis.vclus2clus.push(orbit_index);
        }
    }
    Ok(basis)
}

/// Orthonormal basis of the Cartesian vectors left unchanged by every rotation.
///
/// The group average of the rotations is the projector onto that subspace; its
/// eigenvectors with eigenvalue one span it.
pub fn invariant_subspace<'a, I>(rotations: I) -> Vec<Vector3<f64>>
where
    I: IntoIterator<Item = &'a Matrix3<f64>>,
{
    let mut sum = Matrix3::<f64>::zeros();
    let mut n = 0usize;
    for r in rotations {
        sum += r;
        n += 1;
    }
    if n == 0 {
        return vec![Vector3::x(), Vector3::y(), Vector3::z()];
    }
    let projector = sum / n as f64;
    let projector = (projector + projector.transpose()) * 0.5;

    let eigen = SymmetricEigen::new(projector);
    let mut out: Vec<Vector3<f64>> = (0..3)
        .filter(|&k| eigen.eigenvalues[k] > EIGEN_CUT)
        .map(|k| eigen.eigenvectors.column(k).into_owned())
        .collect();

    if out.len() == 3 {
        return vec![Vector3::x(), Vector3::y(), Vector3::z()];
    }
    for v in &mut out {
        *v = v.map(|x| if x.abs() < ZERO_TOL { 0.0 } else { x });
        // leading non-zero component positive
        if let Some(&lead) = v.iter().find(|x| x.abs() > ZERO_TOL) {
            if lead < 0.0 {
                *v = -*v;
            }
        }
    }
    out
}
