//! Linear least squares on the element-count design matrix

use std::fmt::Display;

use nalgebra::SVD;
use rustc_hash::FxHashMap;
use xyz::Configuration;

use crate::{Dmat, Dvec, ElementSet};

/// iteration cap passed to the SVD so a pathological matrix fails instead of
/// spinning forever
const MAX_SVD_ITER: usize = 10_000;

/// build the matrix A where `A[(i, j)]` is the number of atoms of element `j`
/// in configuration `i`. atoms of elements outside `elements` are ignored
pub fn design_matrix<'a>(
    configs: impl ExactSizeIterator<Item = &'a Configuration>,
    elements: &ElementSet,
) -> Dmat {
    let col: FxHashMap<usize, usize> =
        elements.iter().enumerate().map(|(j, &z)| (z, j)).collect();
    let mut a = Dmat::zeros(configs.len(), elements.len());
    for (i, config) in configs.enumerate() {
        for z in config.atomic_numbers() {
            if let Some(&j) = col.get(&z) {
                a[(i, j)] += 1.0;
            }
        }
    }
    a
}

pub fn mean_square(v: &Dvec) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.norm_squared() / v.len() as f64
}

#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub x: Dvec,

    /// the number of singular values above the cutoff
    pub rank: usize,

    /// in descending order
    pub singular_values: Dvec,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SolveError {
    NonFiniteInput,
    NoConvergence,
    NonFiniteSolution,
    Svd(&'static str),
}

impl Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::NonFiniteInput => {
                write!(f, "non-finite value in the least-squares system")
            }
            SolveError::NoConvergence => write!(
                f,
                "singular value decomposition failed to converge in \
                 {MAX_SVD_ITER} iterations"
            ),
            SolveError::NonFiniteSolution => {
                write!(f, "least-squares solution is not finite")
            }
            SolveError::Svd(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SolveError {}

/// Minimize ‖Ax − b‖² using the singular value decomposition of `a`. Singular
/// values not larger than `rcond` times the largest one are treated as zero,
/// which yields the minimum-norm solution when `a` is rank deficient. The
/// number of retained singular values is returned as the rank
pub fn solve(a: &Dmat, b: &Dvec, rcond: f64) -> Result<Solution, SolveError> {
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(SolveError::NonFiniteInput);
    }
    let svd =
        SVD::try_new(a.clone(), true, true, f64::EPSILON, MAX_SVD_ITER);
    let Some(svd) = svd else {
        return Err(SolveError::NoConvergence);
    };
    let smax = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let cutoff = rcond.max(0.0) * smax;
    let rank = svd.rank(cutoff);
    let x = svd.solve(b, cutoff).map_err(SolveError::Svd)?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::NonFiniteSolution);
    }
    let mut singular_values = svd.singular_values;
    singular_values
        .as_mut_slice()
        .sort_by(|a, b| b.total_cmp(a));
    Ok(Solution {
        x,
        rank,
        singular_values,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::{dmatrix, dvector};
    use xyz::Atom;

    use super::*;

    #[test]
    fn design() {
        let water = Configuration::new(vec![
            Atom::new(8, 0.0, 0.0, 0.0),
            Atom::new(1, 0.0, 0.0, 1.0),
            Atom::new(1, 0.0, 1.0, 0.0),
        ]);
        let calcium = Configuration::new(vec![Atom::new(20, 0.0, 0.0, 0.0)]);
        let elements = ElementSet::new(vec![1, 8, 6]).unwrap();
        let got = design_matrix([&water, &calcium].into_iter(), &elements);
        assert_eq!(got, dmatrix![2.0, 1.0, 0.0; 0.0, 0.0, 0.0]);
    }

    #[test]
    fn square() {
        let a = dmatrix![2.0, 1.0; 1.0, 3.0];
        let b = dvector![3.0, 5.0];
        let got = solve(&a, &b, 1e-10).unwrap();
        assert_eq!(got.rank, 2);
        assert_abs_diff_eq!(got.x, dvector![0.8, 1.4], epsilon = 1e-12);
    }

    #[test]
    fn minimum_norm() {
        // x + y = 2 has the minimum-norm solution (1, 1)
        let a = dmatrix![1.0, 1.0; 2.0, 2.0];
        let b = dvector![2.0, 4.0];
        let got = solve(&a, &b, 1e-10).unwrap();
        assert_eq!(got.rank, 1);
        assert_abs_diff_eq!(got.x, dvector![1.0, 1.0], epsilon = 1e-10);
        assert!(got.singular_values[0] > got.singular_values[1]);
    }

    #[test]
    fn zero_matrix() {
        let a = Dmat::zeros(3, 2);
        let b = dvector![1.0, 2.0, 3.0];
        let got = solve(&a, &b, 1e-10).unwrap();
        assert_eq!(got.rank, 0);
        assert_eq!(got.x, dvector![0.0, 0.0]);
    }

    #[test]
    fn non_finite() {
        let a = dmatrix![1.0; 1.0];
        let b = dvector![1.0, f64::NAN];
        assert_eq!(solve(&a, &b, 1e-10), Err(SolveError::NonFiniteInput));
    }

    #[test]
    fn mse() {
        assert_eq!(mean_square(&dvector![1.0, -3.0]), 5.0);
        assert_eq!(mean_square(&Dvec::zeros(0)), 0.0);
    }
}
