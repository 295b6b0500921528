use serde::{Deserialize, Serialize};

/// `(site id, species)` in the supercell.
pub type SiteSpec = (usize, usize);

/// `(initial site id, final site id)` of a vacancy hop.
pub type HopKey = (usize, usize);

/// `(initial site id, final site id, species on the final site)`.
pub type TransitionKey = (usize, usize, usize);

/// Stable reference to `SpecClusters[orbit][member]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterRef {
    pub orbit: usize,
    pub member: usize,
}

/// Sizes of the built indices, reported once construction finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_sites: usize,
    pub num_transitions: usize,
    pub num_transition_orbits: usize,
    pub num_decorated_transition_orbits: usize,
    pub num_spec_orbits: usize,
    pub num_spec_clusters: usize,
    pub num_vector_orbits: usize,
    pub num_interactions: usize,
}

pub mod expand;
pub mod interactions;
pub mod spec_clusters;
pub mod transitions;
