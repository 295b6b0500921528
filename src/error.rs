//! Error types shared by every builder and evaluator in the crate.

use thiserror::Error;

/// Everything that can go wrong while building the indices or evaluating them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpansionError {
    /// Rejected configuration values.
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    /// An operator mapped an orbit member outside the input set.
    #[error("Orbit not closed: image {image} of {member} is not part of the input set")]
    OrbitNotClosed { member: String, image: String },

    /// The same object was supplied twice to an orbit partition.
    #[error("Duplicate orbit member: {member}")]
    DuplicateMember { member: String },

    /// The operator set does not act as a group (an orbit leaked into another).
    #[error("Operator set is not a group: {member} reached from two orbits")]
    NotAGroup { member: String },

    #[error("Decoration count mismatch for order {order}: expected {expected}, found {found}")]
    DecorationCount {
        order: usize,
        expected: usize,
        found: usize,
    },

    /// An interaction must contain its anchor exactly once.
    #[error("Interaction anchored at site {site}, species {species} contains the anchor {count} times")]
    AnchorMultiplicity {
        site: usize,
        species: usize,
        count: usize,
    },

    #[error("Occupation is not one-hot at site {site} ({count} species present)")]
    NotOneHot { site: usize, count: usize },

    #[error("Site {site} out of range (supercell has {num_sites} sites)")]
    SiteOutOfRange { site: usize, num_sites: usize },

    #[error("Species {species} out of range ({num_species} species)")]
    SpeciesOutOfRange { species: usize, num_species: usize },

    #[error("Occupation covers {found} sites but the indices were built for {expected}")]
    SiteCountMismatch { expected: usize, found: usize },

    #[error("Vacancy expected at site {site}")]
    VacancyMissing { site: usize },

    #[error("Invalid occupation: {message}")]
    InvalidOccupation { message: String },

    #[error("Unknown transition ({from} -> {to}, species {species})")]
    UnknownTransition {
        from: usize,
        to: usize,
        species: usize,
    },

    #[error("Coefficient count mismatch: expected {expected}, found {found}")]
    CoefficientLength { expected: usize, found: usize },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ExpansionError>;

impl ExpansionError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    pub fn invalid_occupation(message: impl Into<String>) -> Self {
        Self::InvalidOccupation {
            message: message.into(),
        }
    }
}
