use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::domain::{LatticeKind, Site, Translation};
use crate::error::{ExpansionError, Result};

/// Primitive lattice vectors (columns) with the inverse precomputed for fractional
/// conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    pub vectors: Matrix3<f64>, // Columns are a, b, c
    pub inverse: Matrix3<f64>,
}

impl Lattice {
    pub fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Option<Self> {
        let vectors = Matrix3::from_columns(&[a, b, c]);
        let inverse = vectors.try_inverse()?;
        Some(Self { vectors, inverse })
    }

    /// Primitive cell of a cubic Bravais lattice with conventional edge `a0`.
    pub fn cubic(kind: LatticeKind, a0: f64) -> Option<Self> {
        let h = 0.5 * a0;
        match kind {
            LatticeKind::SimpleCubic => Self::new(
                Vector3::new(a0, 0.0, 0.0),
                Vector3::new(0.0, a0, 0.0),
                Vector3::new(0.0, 0.0, a0),
            ),
            LatticeKind::BodyCentredCubic => Self::new(
                Vector3::new(-h, h, h),
                Vector3::new(h, -h, h),
                Vector3::new(h, h, -h),
            ),
            LatticeKind::FaceCentredCubic => Self::new(
                Vector3::new(0.0, h, h),
                Vector3::new(h, 0.0, h),
                Vector3::new(h, h, 0.0),
            ),
        }
    }

    /// Metric tensor `AᵀA`; a fractional rotation `M` is a lattice symmetry iff
    /// `MᵀGM = G`.
    pub fn metric(&self) -> Matrix3<f64> {
        self.vectors.transpose() * self.vectors
    }

    /// Cartesian position of `site` given fractional basis positions.
    pub fn site_position(&self, site: &Site, basis: &[Vector3<f64>]) -> Vector3<f64> {
        let r = site.r_vec().map(|x| x as f64);
        self.vectors * (r + basis[site.ci])
    }
}

/// Periodic supercell of `extents[0] x extents[1] x extents[2]` primitive cells.
///
/// Dense ids are sublattice-major: `id = ci * num_cells + cell`, with the cell index
/// row-major over the wrapped translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supercell {
    extents: [usize; 3],
    num_sublattices: usize,
}

impl Supercell {
    pub fn new(extents: [usize; 3], num_sublattices: usize) -> Result<Self> {
        if extents.iter().any(|&n| n == 0) || num_sublattices == 0 {
            return Err(ExpansionError::invalid_params(
                "supercell needs positive extents and at least one sublattice",
            ));
        }
        Ok(Self {
            extents,
            num_sublattices,
        })
    }

    pub fn num_cells(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn num_sites(&self) -> usize {
        self.num_cells() * self.num_sublattices
    }

    /// Dense id of `site`, wrapping its translation into the supercell.
    pub fn index(&self, site: &Site) -> usize {
        let [n0, n1, n2] = self.extents.map(|n| n as i32);
        let w0 = site.r[0].rem_euclid(n0) as usize;
        let w1 = site.r[1].rem_euclid(n1) as usize;
        let w2 = site.r[2].rem_euclid(n2) as usize;
        let cell = (w0 * self.extents[1] + w1) * self.extents[2] + w2;
        site.ci * self.num_cells() + cell
    }

    /// Site for a dense id, translation wrapped into `[0, extent)`.
    pub fn site(&self, id: usize) -> Result<Site> {
        if id >= self.num_sites() {
            return Err(ExpansionError::SiteOutOfRange {
                site: id,
                num_sites: self.num_sites(),
            });
        }
        let ci = id / self.num_cells();
        Ok(Site::new(ci, self.cell(id % self.num_cells())))
    }

    fn cell(&self, cell: usize) -> Translation {
        let w2 = cell % self.extents[2];
        let w1 = (cell / self.extents[2]) % self.extents[1];
        let w0 = cell / (self.extents[1] * self.extents[2]);
        [w0 as i32, w1 as i32, w2 as i32]
    }

    /// Every cell translation of the supercell, in id order.
    pub fn cells(&self) -> impl Iterator<Item = Translation> + '_ {
        (0..self.num_cells()).map(move |c| self.cell(c))
    }
}
