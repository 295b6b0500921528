//! Kinetic expansion of one configuration: KRA barriers, incremental site-energy
//! changes and vector-basis changes combined into `(Wbar, bbar)`.

use std::collections::HashMap;

use log::info;
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;

use crate::core::chemistry::{Occupation, SpeciesPool};
use crate::core::domain::Params;
use crate::core::spatial::Supercell;
use crate::engine::crystal::CrystalGeometry;
use crate::engine::geometry::GeometryProvider;
use crate::error::{ExpansionError, Result};
use crate::expansion::interactions::{Interaction, InteractionIndex, TransportInstance};
use crate::expansion::spec_clusters::SpecClusterSet;
use crate::expansion::transitions::KraExpander;
use crate::expansion::{IndexStats, SiteSpec, TransitionKey};

/// KRA coefficients per `(from, to, species)`; one entry per decorated orbit.
pub type KraCoefficients = HashMap<TransitionKey, Vec<f64>>;

/// A hop out of the vacancy site, flattened from the jump network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hop {
    pub from: usize,
    pub to: usize,
    /// Cartesian displacement of the vacancy.
    pub dx: Vector3<f64>,
}

/// All indices needed to expand a configuration with the vacancy on one fixed site.
///
/// Built once; every evaluation method takes `&self` and is safe to call from many
/// threads at once.
#[derive(Debug, Clone)]
pub struct Expander {
    pool: SpeciesPool,
    supercell: Supercell,
    vacancy_site: usize,
    hops: Vec<Hop>,
    kra: KraExpander,
    spec: SpecClusterSet,
    interactions: InteractionIndex,
}

impl Expander {
    /// Builds the crystal described by `params` and indexes it.
    pub fn from_params(params: &Params) -> Result<Self> {
        let geometry = CrystalGeometry::from_params(params)?;
        Self::new(&geometry, params.num_species)
    }

    pub fn new<P: GeometryProvider + ?Sized>(geometry: &P, num_species: usize) -> Result<Self> {
        let pool = SpeciesPool::new(num_species)?;
        let supercell = geometry.supercell().clone();
        let vacancy_site = supercell.index(&geometry.vacancy_site());

        let hops: Vec<Hop> = geometry
            .jump_network()
            .iter()
            .flatten()
            .map(|jump| {
                let (from, to) = jump.ids(&supercell);
                Hop {
                    from,
                    to,
                    dx: jump.dx,
                }
            })
            .collect();
        if let Some(hop) = hops.iter().find(|h| h.from != vacancy_site || h.to == vacancy_site) {
            return Err(ExpansionError::invalid_params(format!(
                "hop {} -> {} does not leave the vacancy site {}",
                hop.from, hop.to, vacancy_site
            )));
        }
        let terminals: Vec<usize> = hops.iter().map(|h| h.to).collect();

        let kra = KraExpander::new(geometry, num_species)?;
        let spec = SpecClusterSet::new(geometry, num_species)?;
        let interactions =
            InteractionIndex::new(&spec, &supercell, &pool, vacancy_site, &terminals)?;

        let expander = Self {
            pool,
            supercell,
            vacancy_site,
            hops,
            kra,
            spec,
            interactions,
        };
        info!("Expander ready: {:?}", expander.stats());
        Ok(expander)
    }

    pub fn species_pool(&self) -> &SpeciesPool {
        &self.pool
    }

    pub fn supercell(&self) -> &Supercell {
        &self.supercell
    }

    /// Supercell id of the site the vacancy must occupy.
    pub fn vacancy_site(&self) -> usize {
        self.vacancy_site
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn kra(&self) -> &KraExpander {
        &self.kra
    }

    pub fn spec_clusters(&self) -> &SpecClusterSet {
        &self.spec
    }

    pub fn interactions(&self) -> &InteractionIndex {
        &self.interactions
    }

    pub fn num_vector_orbits(&self) -> usize {
        self.spec.num_vector_orbits()
    }

    pub fn stats(&self) -> IndexStats {
        let jumps = self.kra.cluster_species_jumps();
        IndexStats {
            num_sites: self.supercell.num_sites(),
            num_transitions: jumps.len(),
            num_transition_orbits: self.kra.sym_trans_clusters().values().map(Vec::len).sum(),
            num_decorated_transition_orbits: jumps.values().map(Vec::len).sum(),
            num_spec_orbits: self.spec.spec_clusters().len(),
            num_spec_clusters: self.spec.num_members(),
            num_vector_orbits: self.spec.num_vector_orbits(),
            num_interactions: self.interactions.num_interactions(),
        }
    }

    /// Zero coefficients of the right length for every transition.
    pub fn zero_kra_coefficients(&self) -> KraCoefficients {
        self.kra
            .cluster_species_jumps()
            .iter()
            .map(|(key, orbits)| (*key, vec![0.0; orbits.len()]))
            .collect()
    }

    fn check_occupation(&self, occupation: &Occupation) -> Result<()> {
        if occupation.num_sites() != self.supercell.num_sites() {
            return Err(ExpansionError::SiteCountMismatch {
                expected: self.supercell.num_sites(),
                found: occupation.num_sites(),
            });
        }
        if occupation.num_species() != self.pool.num_species() {
            return Err(ExpansionError::invalid_occupation(format!(
                "{} species rows, expected {}",
                occupation.num_species(),
                self.pool.num_species()
            )));
        }
        Ok(())
    }

    fn check_energy_coeffs(&self, coeffs: &[f64]) -> Result<()> {
        let expected = self.spec.spec_clusters().len();
        if coeffs.len() != expected {
            return Err(ExpansionError::CoefficientLength {
                expected,
                found: coeffs.len(),
            });
        }
        Ok(())
    }

    /// Kinetic expansion `(Wbar, bbar)` of `occupation`.
    ///
    /// For every hop out of the vacancy site the rate is
    /// `exp(-beta * (kra + dE / 2))`, with `dE` the site-energy change of the hop.
    /// `Wbar[a][b]` accumulates `rate * dphi_a . dphi_b` and `bbar[a]` accumulates
    /// `rate * dphi_a . dx`.
    pub fn expand(
        &self,
        beta: f64,
        occupation: &Occupation,
        energy_coeffs: &[f64],
        kra_coeffs: &KraCoefficients,
    ) -> Result<(DMatrix<f64>, DVector<f64>)> {
        self.check_occupation(occupation)?;
        self.check_energy_coeffs(energy_coeffs)?;
        if !occupation.is_occupied(self.vacancy_site, self.pool.vacancy()) {
            return Err(ExpansionError::VacancyMissing {
                site: self.vacancy_site,
            });
        }

        let n = self.num_vector_orbits();
        let mut wbar = DMatrix::<f64>::zeros(n, n);
        let mut bbar = DVector::<f64>::zeros(n);

        for hop in &self.hops {
            let spec_j = occupation.species_at(hop.to);
            if spec_j == self.pool.vacancy() {
                return Err(ExpansionError::invalid_occupation(format!(
                    "second vacancy on hop target {}",
                    hop.to
                )));
            }
            let transition = (hop.from, hop.to, spec_j);
            let coeffs = kra_coeffs
                .get(&transition)
                .ok_or(ExpansionError::UnknownTransition {
                    from: hop.from,
                    to: hop.to,
                    species: spec_j,
                })?;

            let kra = self.kra.get_kra(&transition, occupation, coeffs)?;
            let de = self.swap_energy_change(occupation, hop.from, hop.to, energy_coeffs);
            let rate = (-beta * (kra + 0.5 * de)).exp();
            let dphi = self.hop_transport_change(occupation, hop.from, hop.to, spec_j)?;

            for a in 0..n {
                bbar[a] += rate * dphi[a].dot(&hop.dx);
                for b in a..n {
                    let w = rate * dphi[a].dot(&dphi[b]);
                    wbar[(a, b)] += w;
                    if a != b {
                        wbar[(b, a)] += w;
                    }
                }
            }
        }
        Ok((wbar, bbar))
    }

    /// [`Expander::expand`] over many configurations on the rayon pool.
    pub fn expand_batch(
        &self,
        beta: f64,
        occupations: &[Occupation],
        energy_coeffs: &[f64],
        kra_coeffs: &KraCoefficients,
    ) -> Result<Vec<(DMatrix<f64>, DVector<f64>)>> {
        occupations
            .par_iter()
            .map(|occ| self.expand(beta, occ, energy_coeffs, kra_coeffs))
            .collect()
    }

    /// Site-energy change from exchanging the occupants of `from` and `to`.
    pub fn energy_change(
        &self,
        occupation: &Occupation,
        from: usize,
        to: usize,
        coeffs: &[f64],
    ) -> Result<f64> {
        self.check_occupation(occupation)?;
        self.check_energy_coeffs(coeffs)?;
        for site in [from, to] {
            if site >= occupation.num_sites() {
                return Err(ExpansionError::SiteOutOfRange {
                    site,
                    num_sites: occupation.num_sites(),
                });
            }
        }
        Ok(self.swap_energy_change(occupation, from, to, coeffs))
    }

    // Only interactions containing a touched key can change. Each is counted once:
    // the second key's list skips what the first key's list already holds.
    fn swap_energy_change(&self, occ: &Occupation, a: usize, b: usize, coeffs: &[f64]) -> f64 {
        if a == b {
            return 0.0;
        }
        let sa = occ.species_at(a);
        let sb = occ.species_at(b);
        if sa == sb {
            return 0.0;
        }
        let after = |site: usize| {
            if site == a {
                sb
            } else if site == b {
                sa
            } else {
                occ.species_at(site)
            }
        };

        let mut de = 0.0;
        for inter in self.touched(&(a, sa), &(b, sb)) {
            if inter.ids.iter().all(|&(s, sp)| occ.is_occupied(s, sp)) {
                de -= coeffs[inter.cluster.orbit];
            }
        }
        for inter in self.touched(&(a, sb), &(b, sa)) {
            if inter.ids.iter().all(|&(s, sp)| after(s) == sp) {
                de += coeffs[inter.cluster.orbit];
            }
        }
        de
    }

    fn touched<'a>(
        &'a self,
        first: &'a SiteSpec,
        second: &'a SiteSpec,
    ) -> impl Iterator<Item = &'a Interaction> + 'a {
        self.interactions.interactions(first).iter().chain(
            self.interactions
                .interactions(second)
                .iter()
                .filter(move |inter| !inter.contains(first)),
        )
    }

    /// Change of every vector-basis function when the vacancy hops `from -> to`.
    pub fn transport_change(
        &self,
        occupation: &Occupation,
        from: usize,
        to: usize,
    ) -> Result<Vec<Vector3<f64>>> {
        self.check_occupation(occupation)?;
        if to >= occupation.num_sites() {
            return Err(ExpansionError::SiteOutOfRange {
                site: to,
                num_sites: occupation.num_sites(),
            });
        }
        let spec_j = occupation.species_at(to);
        if from != self.vacancy_site || !self.hops.iter().any(|h| h.to == to) {
            return Err(ExpansionError::UnknownTransition {
                from,
                to,
                species: spec_j,
            });
        }
        if !occupation.is_occupied(from, self.pool.vacancy()) {
            return Err(ExpansionError::VacancyMissing { site: from });
        }
        if spec_j == self.pool.vacancy() {
            return Err(ExpansionError::invalid_occupation(format!(
                "second vacancy on hop target {}",
                to
            )));
        }
        self.hop_transport_change(occupation, from, to, spec_j)
    }

    fn hop_transport_change(
        &self,
        occ: &Occupation,
        a: usize,
        b: usize,
        spec_j: usize,
    ) -> Result<Vec<Vector3<f64>>> {
        let vac = self.pool.vacancy();
        let vec_vec = self.spec.vec_vec();
        let mut dphi = vec![Vector3::<f64>::zeros(); self.num_vector_orbits()];

        let after = |site: usize| {
            if site == a {
                spec_j
            } else if site == b {
                vac
            } else {
                occ.species_at(site)
            }
        };
        let missing = |key: SiteSpec| ExpansionError::UnknownTransition {
            from: a,
            to: b,
            species: key.1,
        };

        let off_vac = self.interactions.off(&(a, vac)).ok_or_else(|| missing((a, vac)))?;
        let off_j = self
            .interactions
            .off(&(b, spec_j))
            .ok_or_else(|| missing((b, spec_j)))?;
        for inst in off_vac.iter().chain(off_j) {
            if inst.ids.iter().all(|&(s, sp)| occ.is_occupied(s, sp)) {
                dphi[inst.vec_orbit] -= vec_vec[inst.vec_orbit][inst.member];
            }
        }

        let on_j = self
            .interactions
            .on(&(a, spec_j))
            .ok_or_else(|| missing((a, spec_j)))?;
        let on_vac = self.interactions.on(&(b, vac)).ok_or_else(|| missing((b, vac)))?;
        let arrivals = on_j.iter().chain(
            on_vac
                .iter()
                .filter(|inst: &&TransportInstance| !inst.contains(&(a, spec_j))),
        );
        for inst in arrivals {
            if inst.ids.iter().all(|&(s, sp)| after(s) == sp) {
                dphi[inst.vec_orbit] += vec_vec[inst.vec_orbit][inst.member];
            }
        }
        Ok(dphi)
    }

    /// Site energy of the whole configuration, by rescanning every placement of
    /// every decorated cluster.
    pub fn total_energy(&self, occupation: &Occupation, coeffs: &[f64]) -> Result<f64> {
        self.check_occupation(occupation)?;
        self.check_energy_coeffs(coeffs)?;

        let mut energy = 0.0;
        for (orbit, list) in self.spec.spec_clusters().iter().enumerate() {
            for cl in list {
                for cell in self.supercell.cells() {
                    let active = cl
                        .placed(cell)
                        .iter()
                        .all(|(s, sp)| occupation.is_occupied(self.supercell.index(s), *sp));
                    if active {
                        energy += coeffs[orbit];
                    }
                }
            }
        }
        Ok(energy)
    }

    /// Every vector-basis function of the configuration, by full rescan.
    pub fn vector_basis_values(&self, occupation: &Occupation) -> Result<Vec<Vector3<f64>>> {
        self.check_occupation(occupation)?;

        let vec_vec = self.spec.vec_vec();
        let mut phi = vec![Vector3::<f64>::zeros(); self.num_vector_orbits()];
        for (i, list) in self.spec.vec_clus().iter().enumerate() {
            for (j, cl) in list.iter().enumerate() {
                for cell in self.supercell.cells() {
                    let active = cl
                        .placed(cell)
                        .iter()
                        .all(|(s, sp)| occupation.is_occupied(self.supercell.index(s), *sp));
                    if active {
                        phi[i] += vec_vec[i][j];
                    }
                }
            }
        }
        Ok(phi)
    }
}
