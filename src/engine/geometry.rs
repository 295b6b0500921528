use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::core::domain::{Cluster, Site};
use crate::core::spatial::{Lattice, Supercell};
use crate::engine::operators::SymOp;

/// One concrete vacancy hop between two sites of the infinite lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jump {
    pub initial: Site,
    pub terminal: Site,
    /// Cartesian displacement of the vacancy.
    pub dx: Vector3<f64>,
}

impl Jump {
    /// `(initial id, final id)` in `supercell`.
    pub fn ids(&self, supercell: &Supercell) -> (usize, usize) {
        (supercell.index(&self.initial), supercell.index(&self.terminal))
    }
}

/// Everything the expansion needs from the crystal side.
///
/// Implementations must be immutable once built; the expansion keeps only the data
/// it copies out during construction.
pub trait GeometryProvider: Send + Sync {
    /// Space-group operations, identity first.
    fn symmetry_ops(&self) -> &[SymOp];

    fn lattice(&self) -> &Lattice;

    /// Site indexer for the periodic supercell.
    fn supercell(&self) -> &Supercell;

    /// Cartesian position of a site of the infinite lattice.
    fn cartesian(&self, site: &Site) -> Vector3<f64>;

    /// Raw cluster orbits, grouped by increasing order.
    fn clusters(&self) -> &[Vec<Cluster>];

    /// Symmetry classes of hops out of [`GeometryProvider::vacancy_site`].
    fn jump_network(&self) -> &[Vec<Jump>];

    fn vacancy_site(&self) -> Site;
}
