use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::domain::{add, sub, Site, Translation};
use crate::core::spatial::Lattice;

const SYM_TOL: f64 = 1e-8;

/// A space-group operation `x -> M x + t` in fractional coordinates.
///
/// Besides the rotation and translation it carries how the operation permutes the
/// basis (`indexmap`) and the integer cell shift each basis site picks up, so that
/// applying it to a [`Site`] is pure integer arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymOp {
    /// Fractional (integer) rotation.
    pub rot: Matrix3<i32>,
    /// The same rotation in Cartesian coordinates (orthogonal).
    pub cartrot: Matrix3<f64>,
    /// Fractional translation, reduced into `[0, 1)`.
    pub trans: Vector3<f64>,
    /// Sublattice permutation: basis site `ci` maps onto basis site `indexmap[ci]`.
    pub indexmap: Vec<usize>,
    shifts: Vec<Translation>,
}

impl SymOp {
    pub fn identity(num_sublattices: usize) -> Self {
        Self {
            rot: Matrix3::identity(),
            cartrot: Matrix3::identity(),
            trans: Vector3::zeros(),
            indexmap: (0..num_sublattices).collect(),
            shifts: vec![[0, 0, 0]; num_sublattices],
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rot == Matrix3::identity()
            && self.trans.norm() < SYM_TOL
            && self.indexmap.iter().enumerate().all(|(i, &j)| i == j)
    }

    #[inline]
    pub fn apply_site(&self, site: &Site) -> Site {
        let r = self.rot * site.r_vec();
        Site::new(
            self.indexmap[site.ci],
            add([r.x, r.y, r.z], self.shifts[site.ci]),
        )
    }

    /// Rotates a Cartesian vector.
    #[inline]
    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.cartrot * v
    }
}

/// A space-group operation followed by the lattice translation that returns the
/// image of `anchor` onto `anchor`; these form the site point group.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredOp<'a> {
    /// Position of `op` in the full operator list.
    pub index: usize,
    pub op: &'a SymOp,
    shift: Translation,
}

impl<'a> AnchoredOp<'a> {
    /// `None` if `op` moves `anchor` onto another sublattice.
    pub fn new(index: usize, op: &'a SymOp, anchor: &Site) -> Option<Self> {
        let image = op.apply_site(anchor);
        (image.ci == anchor.ci).then(|| Self {
            index,
            op,
            shift: sub(anchor.r, image.r),
        })
    }

    #[inline]
    pub fn apply_site(&self, site: &Site) -> Site {
        self.op.apply_site(site).translated(self.shift)
    }

    #[inline]
    pub fn apply_vector(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.op.apply_vector(v)
    }
}

/// Operations (with their re-anchoring translations) that keep `anchor` fixed.
pub fn site_point_group<'a>(ops: &'a [SymOp], anchor: &Site) -> Vec<AnchoredOp<'a>> {
    ops.iter()
        .enumerate()
        .filter_map(|(i, op)| AnchoredOp::new(i, op, anchor))
        .collect()
}

/// Finds every space-group operation of a crystal with a single chemistry.
///
/// Candidate rotations are the integer matrices with entries in {-1, 0, 1} that
/// preserve the metric (enough for reduced primitive cells). For each one, every
/// translation that carries basis site 0 onto some basis site is tried and kept if it
/// maps the whole basis onto itself. The identity is returned first.
pub fn generate_space_group(lattice: &Lattice, basis: &[Vector3<f64>]) -> Vec<SymOp> {
    let metric = lattice.metric();
    let scale = metric.abs().max().max(1.0);
    let mut ops = Vec::new();

    for code in 0..3usize.pow(9) {
        let mut entries = [0i32; 9];
        let mut rest = code;
        for e in entries.iter_mut() {
            *e = (rest % 3) as i32 - 1;
            rest /= 3;
        }
        let rot = Matrix3::from_row_slice(&entries);
        let rot_f = rot.map(|x| x as f64);
        if (rot_f.determinant().abs() - 1.0).abs() > SYM_TOL {
            continue;
        }
        if (rot_f.transpose() * metric * rot_f - metric).abs().max() > SYM_TOL * scale {
            continue;
        }
        let cartrot = lattice.vectors * rot_f * lattice.inverse;

        for target in basis {
            let t = (target - rot_f * basis[0]).map(|x| x - x.floor());
            if let Some((indexmap, shifts)) = basis_permutation(&rot_f, &t, basis) {
                ops.push(SymOp {
                    rot,
                    cartrot,
                    trans: t,
                    indexmap,
                    shifts,
                });
            }
        }
    }

    // stable: the rest keep enumeration order
    ops.sort_by_key(|op| !op.is_identity());
    ops
}

fn basis_permutation(
    rot: &Matrix3<f64>,
    t: &Vector3<f64>,
    basis: &[Vector3<f64>],
) -> Option<(Vec<usize>, Vec<Translation>)> {
    let mut indexmap = Vec::with_capacity(basis.len());
    let mut shifts = Vec::with_capacity(basis.len());
    for u in basis {
        let image = rot * u + t;
        let (k, shift) = basis.iter().enumerate().find_map(|(k, uk)| {
            let d = image - uk;
            let rounded = d.map(|x| x.round());
            ((d - rounded).abs().max() < SYM_TOL).then(|| {
                (
                    k,
                    [rounded.x as i32, rounded.y as i32, rounded.z as i32],
                )
            })
        })?;
        indexmap.push(k);
        shifts.push(shift);
    }
    Some((indexmap, shifts))
}
