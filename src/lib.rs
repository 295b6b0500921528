//! Symmetry-reduced cluster expansion of site energies and kinetically-resolved
//! activation (KRA) barriers for vacancy-mediated multi-species diffusion.
//!
//! Build order: [`engine`] supplies geometry and symmetry, [`analysis`] partitions
//! objects into orbits, and [`expansion`] builds the transition, decorated-cluster and
//! interaction indices and evaluates them for a configuration.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod error;
pub mod expansion;

pub use crate::error::{ExpansionError, Result};
