use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ExpansionError, Result};

/// The species alphabet: indices `0..num_species - 1` are mobile species, the last
/// index is reserved for the vacancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesPool {
    num_species: usize,
}

impl SpeciesPool {
    pub fn new(num_species: usize) -> Result<Self> {
        if num_species < 2 {
            return Err(ExpansionError::invalid_params(
                "need at least one mobile species plus the vacancy",
            ));
        }
        Ok(Self { num_species })
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn vacancy(&self) -> usize {
        self.num_species - 1
    }

    pub fn num_mobile(&self) -> usize {
        self.num_species - 1
    }

    pub fn mobile(&self) -> std::ops::Range<usize> {
        0..self.num_species - 1
    }

    /// All `(num_species - 1)^order` assignments of mobile species, lexicographic
    /// with the last position varying fastest.
    pub fn mobile_decorations(&self, order: usize) -> Vec<Vec<usize>> {
        product(self.num_mobile(), order)
    }

    /// All assignments over the full alphabet holding at most one vacancy.
    pub fn decorations(&self, order: usize) -> Vec<Vec<usize>> {
        let vac = self.vacancy();
        product(self.num_species, order)
            .into_iter()
            .filter(|d| d.iter().filter(|&&s| s == vac).count() <= 1)
            .collect()
    }
}

/// Cartesian power `{0..base}^len` in lexicographic order.
fn product(base: usize, len: usize) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::with_capacity(len)];
    for _ in 0..len {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..base).map(move |s| {
                    let mut next = prefix.clone();
                    next.push(s);
                    next
                })
            })
            .collect();
    }
    out
}

/// A lattice configuration: exactly one species per supercell site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupation {
    num_species: usize,
    species: Vec<usize>,
}

impl Occupation {
    /// Validates a one-hot `[species][site]` array.
    pub fn from_one_hot(occupancies: &[Vec<u8>]) -> Result<Self> {
        let num_species = occupancies.len();
        if num_species == 0 {
            return Err(ExpansionError::invalid_occupation("no species rows"));
        }
        let num_sites = occupancies[0].len();
        if occupancies.iter().any(|row| row.len() != num_sites) {
            return Err(ExpansionError::invalid_occupation(
                "species rows have different lengths",
            ));
        }

        let mut species = Vec::with_capacity(num_sites);
        for site in 0..num_sites {
            let mut count = 0;
            let mut found = 0;
            for (spec, row) in occupancies.iter().enumerate() {
                match row[site] {
                    0 => {}
                    1 => {
                        count += 1;
                        found = spec;
                    }
                    other => {
                        return Err(ExpansionError::invalid_occupation(format!(
                            "entry {} for species {} at site {} is not 0 or 1",
                            other, spec, site
                        )))
                    }
                }
            }
            if count != 1 {
                return Err(ExpansionError::NotOneHot { site, count });
            }
            species.push(found);
        }
        Ok(Self {
            num_species,
            species,
        })
    }

    /// Builds from one species index per site.
    pub fn from_species(species: Vec<usize>, num_species: usize) -> Result<Self> {
        if let Some(&bad) = species.iter().find(|&&s| s >= num_species) {
            return Err(ExpansionError::SpeciesOutOfRange {
                species: bad,
                num_species,
            });
        }
        Ok(Self {
            num_species,
            species,
        })
    }

    /// Random mobile species everywhere except a vacancy at `vacancy_site`.
    pub fn new_random<R: Rng + ?Sized>(
        num_sites: usize,
        pool: &SpeciesPool,
        vacancy_site: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if vacancy_site >= num_sites {
            return Err(ExpansionError::SiteOutOfRange {
                site: vacancy_site,
                num_sites,
            });
        }
        let species = (0..num_sites)
            .map(|site| {
                if site == vacancy_site {
                    pool.vacancy()
                } else {
                    rng.gen_range(pool.mobile())
                }
            })
            .collect();
        Ok(Self {
            num_species: pool.num_species(),
            species,
        })
    }

    pub fn num_sites(&self) -> usize {
        self.species.len()
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    #[inline]
    pub fn species_at(&self, site: usize) -> usize {
        self.species[site]
    }

    #[inline]
    pub fn is_occupied(&self, site: usize, species: usize) -> bool {
        self.species[site] == species
    }

    /// Configuration after exchanging the occupants of `a` and `b`.
    pub fn swapped(&self, a: usize, b: usize) -> Self {
        let mut next = self.clone();
        next.species.swap(a, b);
        next
    }

    pub fn to_one_hot(&self) -> Vec<Vec<u8>> {
        let mut rows = vec![vec![0u8; self.species.len()]; self.num_species];
        for (site, &spec) in self.species.iter().enumerate() {
            rows[spec][site] = 1;
        }
        rows
    }

    pub fn count(&self, species: usize) -> usize {
        self.species.iter().filter(|&&s| s == species).count()
    }
}
