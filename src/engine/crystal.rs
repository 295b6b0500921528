use std::collections::BTreeSet;

use log::{debug, info};
use nalgebra::Vector3;

use crate::analysis::orbits::partition_orbits;
use crate::core::domain::{add, Cluster, Params, Site};
use crate::core::spatial::{Lattice, Supercell};
use crate::engine::geometry::{GeometryProvider, Jump};
use crate::engine::operators::{generate_space_group, site_point_group, AnchoredOp, SymOp};
use crate::error::{ExpansionError, Result};

const DIST_TOL: f64 = 1e-8;

/// Default [`GeometryProvider`]: a single-chemistry crystal given by its primitive
/// lattice and fractional basis, with clusters and jumps enumerated by distance.
#[derive(Debug, Clone)]
pub struct CrystalGeometry {
    lattice: Lattice,
    basis: Vec<Vector3<f64>>,
    ops: Vec<SymOp>,
    supercell: Supercell,
    clusters: Vec<Vec<Cluster>>,
    jumps: Vec<Vec<Jump>>,
    vacancy_site: Site,
}

impl CrystalGeometry {
    /// Cubic Bravais crystal described by `params`.
    pub fn from_params(params: &Params) -> Result<Self> {
        params.validate()?;
        let lattice = Lattice::cubic(params.lattice, params.lattice_constant)
            .ok_or_else(|| ExpansionError::invalid_params("singular lattice"))?;
        Self::new(
            lattice,
            vec![Vector3::zeros()],
            params.supercell,
            params.cluster_cutoff,
            params.max_order,
            params.jump_cutoff,
        )
    }

    /// Builds the symmetry group, the raw cluster orbits (1..=`max_order` sites, all
    /// pairwise distances within `cluster_cutoff`) and the hops out of basis site 0
    /// of the home cell up to `jump_cutoff`.
    pub fn new(
        lattice: Lattice,
        basis: Vec<Vector3<f64>>,
        extents: [usize; 3],
        cluster_cutoff: f64,
        max_order: usize,
        jump_cutoff: f64,
    ) -> Result<Self> {
        if basis.is_empty() {
            return Err(ExpansionError::invalid_params("empty basis"));
        }
        let ops = generate_space_group(&lattice, &basis);
        if ops.is_empty() {
            return Err(ExpansionError::invalid_params(
                "no symmetry operations found for lattice/basis",
            ));
        }
        let supercell = Supercell::new(extents, basis.len())?;

        let mut geometry = Self {
            lattice,
            basis,
            ops,
            supercell,
            clusters: Vec::new(),
            jumps: Vec::new(),
            vacancy_site: Site::origin(0),
        };
        geometry.clusters = geometry.enumerate_clusters(cluster_cutoff, max_order)?;
        geometry.jumps = geometry.enumerate_jumps(jump_cutoff)?;

        info!(
            "Crystal: {} symmetry ops, {} cluster orbits, {} jump classes, {} sites",
            geometry.ops.len(),
            geometry.clusters.len(),
            geometry.jumps.len(),
            geometry.supercell.num_sites()
        );
        Ok(geometry)
    }

    pub fn distance(&self, a: &Site, b: &Site) -> f64 {
        (self.cartesian(a) - self.cartesian(b)).norm()
    }

    /// Sites within `cutoff` of `center` (excluding `center`), sorted.
    pub fn neighbours(&self, center: &Site, cutoff: f64) -> Vec<Site> {
        let c = self.cartesian(center);
        let reach: Vec<i32> = (0..3)
            .map(|k| (cutoff * self.lattice.inverse.row(k).norm()).ceil() as i32 + 1)
            .collect();

        let mut out = Vec::new();
        for ci in 0..self.basis.len() {
            for i in -reach[0]..=reach[0] {
                for j in -reach[1]..=reach[1] {
                    for k in -reach[2]..=reach[2] {
                        let site = Site::new(ci, add(center.r, [i, j, k]));
                        if site == *center {
                            continue;
                        }
                        if (self.cartesian(&site) - c).norm() <= cutoff + DIST_TOL {
                            out.push(site);
                        }
                    }
                }
            }
        }
        out.sort();
        out
    }

    fn enumerate_clusters(&self, cutoff: f64, max_order: usize) -> Result<Vec<Vec<Cluster>>> {
        let mut orbits = Vec::new();
        for order in 1..=max_order {
            let mut found = BTreeSet::new();
            for ci in 0..self.basis.len() {
                let origin = Site::origin(ci);
                let shell = self.neighbours(&origin, cutoff);
                let mut chosen = vec![origin];
                self.grow(&shell, 0, order, cutoff, &mut chosen, &mut found);
            }
            let count = found.len();
            let partitioned = partition_orbits(
                found.into_iter().collect(),
                &self.ops,
                |cl: &Cluster, g: &SymOp| {
                    Cluster::new(cl.sites().iter().map(|s| g.apply_site(s)).collect())
                },
                |cl: &Cluster| cl.clone(),
            )?;
            debug!(
                "Order {}: {} clusters in {} orbits",
                order,
                count,
                partitioned.len()
            );
            orbits.extend(partitioned);
        }
        Ok(orbits)
    }

    // Depth-first growth over `shell`, keeping every pair within `cutoff`.
    fn grow(
        &self,
        shell: &[Site],
        start: usize,
        order: usize,
        cutoff: f64,
        chosen: &mut Vec<Site>,
        found: &mut BTreeSet<Cluster>,
    ) {
        if chosen.len() == order {
            found.insert(Cluster::new(chosen.clone()));
            return;
        }
        for idx in start..shell.len() {
            let candidate = shell[idx];
            if chosen
                .iter()
                .all(|s| self.distance(s, &candidate) <= cutoff + DIST_TOL)
            {
                chosen.push(candidate);
                self.grow(shell, idx + 1, order, cutoff, chosen, found);
                chosen.pop();
            }
        }
    }

    fn enumerate_jumps(&self, cutoff: f64) -> Result<Vec<Vec<Jump>>> {
        let vac = self.vacancy_site;
        let origin = self.cartesian(&vac);
        let point_group = site_point_group(&self.ops, &vac);

        let jumps: Vec<Jump> = self
            .neighbours(&vac, cutoff)
            .into_iter()
            .map(|terminal| Jump {
                initial: vac,
                terminal,
                dx: self.cartesian(&terminal) - origin,
            })
            .collect();

        partition_orbits(
            jumps,
            &point_group,
            |j: &Jump, g: &AnchoredOp<'_>| Jump {
                initial: g.apply_site(&j.initial),
                terminal: g.apply_site(&j.terminal),
                dx: g.apply_vector(&j.dx),
            },
            |j: &Jump| (j.initial, j.terminal),
        )
    }
}

impl GeometryProvider for CrystalGeometry {
    fn symmetry_ops(&self) -> &[SymOp] {
        &self.ops
    }

    fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    fn supercell(&self) -> &Supercell {
        &self.supercell
    }

    fn cartesian(&self, site: &Site) -> Vector3<f64> {
        self.lattice.site_position(site, &self.basis)
    }

    fn clusters(&self) -> &[Vec<Cluster>] {
        &self.clusters
    }

    fn jump_network(&self) -> &[Vec<Jump>] {
        &self.jumps
    }

    fn vacancy_site(&self) -> Site {
        self.vacancy_site
    }
}
