use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{ExpansionError, Result};

// --- Lattice Translations ---

/// Integer lattice translation (in units of the primitive vectors).
pub type Translation = [i32; 3];

#[inline]
pub fn add(a: Translation, b: Translation) -> Translation {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn sub(a: Translation, b: Translation) -> Translation {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

// --- Sites ---

/// A crystal site: sublattice index plus the translation of its unit cell.
///
/// Ordering is lexicographic on `(ci, r)`, which is what every canonical form in
/// this crate sorts by. Lexicographic order is translation invariant, so sorting and
/// then shifting the first site to the origin gives a translation-free identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Site {
    pub ci: usize,
    pub r: Translation,
}

impl Site {
    pub const fn new(ci: usize, r: Translation) -> Self {
        Self { ci, r }
    }

    /// Site `ci` in the home unit cell.
    pub const fn origin(ci: usize) -> Self {
        Self { ci, r: [0, 0, 0] }
    }

    pub fn translated(&self, t: Translation) -> Self {
        Self {
            ci: self.ci,
            r: add(self.r, t),
        }
    }

    pub fn r_vec(&self) -> Vector3<i32> {
        Vector3::new(self.r[0], self.r[1], self.r[2])
    }
}

// --- Clusters ---

/// A raw (undecorated) cluster, stored translation-canonical: sites sorted and
/// shifted so that the first one sits in the home cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cluster {
    sites: Vec<Site>,
}

impl Cluster {
    pub fn new(mut sites: Vec<Site>) -> Self {
        sites.sort();
        sites.dedup();
        if let Some(first) = sites.first().copied() {
            let shift = sub([0, 0, 0], first.r);
            for s in &mut sites {
                *s = s.translated(shift);
            }
        }
        Self { sites }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Number of sites.
    pub fn order(&self) -> usize {
        self.sites.len()
    }

    /// Concrete placement of this cluster shifted by `t`.
    pub fn placed(&self, t: Translation) -> Vec<Site> {
        self.sites.iter().map(|s| s.translated(t)).collect()
    }
}

/// A decorated cluster: one species label per site, translation-canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterSpecies {
    site_specs: Vec<(Site, usize)>,
}

impl ClusterSpecies {
    pub fn new(mut site_specs: Vec<(Site, usize)>) -> Self {
        site_specs.sort();
        if let Some((first, _)) = site_specs.first().copied() {
            let shift = sub([0, 0, 0], first.r);
            for (s, _) in &mut site_specs {
                *s = s.translated(shift);
            }
        }
        Self { site_specs }
    }

    /// Decorates `cluster` positionally with `species`.
    pub fn decorate(cluster: &Cluster, species: &[usize]) -> Self {
        Self::new(
            cluster
                .sites()
                .iter()
                .copied()
                .zip(species.iter().copied())
                .collect(),
        )
    }

    pub fn site_specs(&self) -> &[(Site, usize)] {
        &self.site_specs
    }

    pub fn order(&self) -> usize {
        self.site_specs.len()
    }

    pub fn count_species(&self, species: usize) -> usize {
        self.site_specs.iter().filter(|(_, sp)| *sp == species).count()
    }

    /// Undecorated shape of this cluster.
    pub fn cluster(&self) -> Cluster {
        Cluster::new(self.site_specs.iter().map(|(s, _)| *s).collect())
    }

    /// Concrete placement shifted by `t`, in canonical entry order.
    pub fn placed(&self, t: Translation) -> Vec<(Site, usize)> {
        self.site_specs
            .iter()
            .map(|(s, sp)| (s.translated(t), *sp))
            .collect()
    }
}

/// A cluster attached to a vacancy hop: the vacancy site and the hop's final site are
/// fixed, the remaining `free` sites are decorated.
///
/// `free` keeps the order in which a symmetry operator produced it, so positional
/// species assignments follow the operator. Identity comparisons go through
/// [`TransitionCluster::key`], which treats `free` as a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionCluster {
    pub initial: Site,
    pub terminal: Site,
    pub free: Vec<Site>,
}

impl TransitionCluster {
    pub fn new(initial: Site, terminal: Site, free: Vec<Site>) -> Self {
        Self {
            initial,
            terminal,
            free,
        }
    }

    /// Number of free (decorated) sites; total sites is `order() + 2`.
    pub fn order(&self) -> usize {
        self.free.len()
    }

    /// All sites, endpoints first.
    pub fn sites(&self) -> impl Iterator<Item = &Site> + '_ {
        std::iter::once(&self.initial)
            .chain(std::iter::once(&self.terminal))
            .chain(self.free.iter())
    }

    pub fn key(&self) -> (Site, Site, Vec<Site>) {
        let mut free = self.free.clone();
        free.sort();
        (self.initial, self.terminal, free)
    }
}

// --- Configuration Types ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LatticeKind {
    SimpleCubic,
    BodyCentredCubic,
    FaceCentredCubic,
}

/// Build parameters for a single-chemistry cubic crystal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Params {
    pub lattice: LatticeKind,
    pub lattice_constant: f64, // conventional cube edge

    // Chemistry: species 0..num_species-1 are mobile, the last index is the vacancy
    pub num_species: usize,

    // Clusters
    pub max_order: usize,
    pub cluster_cutoff: f64,

    // Jumps
    pub jump_cutoff: f64,

    /// Supercell extents along the three primitive vectors.
    pub supercell: [usize; 3],
}

impl Default for Params {
    fn default() -> Self {
        Self {
            lattice: LatticeKind::BodyCentredCubic,
            lattice_constant: 0.2836,
            num_species: 3,
            max_order: 3,
            cluster_cutoff: 0.29,
            jump_cutoff: 0.26,
            supercell: [8, 8, 8],
        }
    }
}

impl Params {
    /// Parses and validates a JSON parameter set.
    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text)
            .map_err(|e| ExpansionError::invalid_params(format!("malformed JSON: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_species < 2 {
            return Err(ExpansionError::invalid_params(
                "need at least one mobile species plus the vacancy",
            ));
        }
        if self.max_order == 0 {
            return Err(ExpansionError::invalid_params("max_order must be positive"));
        }
        if !(self.lattice_constant > 0.0) {
            return Err(ExpansionError::invalid_params(
                "lattice_constant must be positive",
            ));
        }
        if !(self.cluster_cutoff > 0.0) || !(self.jump_cutoff > 0.0) {
            return Err(ExpansionError::invalid_params("cutoffs must be positive"));
        }
        if self.supercell.iter().any(|&n| n == 0) {
            return Err(ExpansionError::invalid_params(
                "supercell extents must be positive",
            ));
        }
        Ok(())
    }
}
