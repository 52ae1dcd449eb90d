//! energy error statistics for checking a set of E0s against held-out data

use serde::Serialize;
use xyz::Configuration;

use crate::{E0Error, E0s, EnergyModel, evaluate};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ErrorStats {
    pub n: usize,

    /// root mean squared error, in eV
    pub rmse: f64,

    /// mean absolute error, in eV
    pub mae: f64,

    /// in eV/atom
    pub rmse_per_atom: f64,

    /// in eV/atom
    pub mae_per_atom: f64,
}

impl ErrorStats {
    /// compute the statistics of `residuals`, each paired with the number of
    /// atoms in its configuration. returns `None` for an empty slice
    pub fn new(residuals: &[(f64, usize)]) -> Option<Self> {
        if residuals.is_empty() {
            return None;
        }
        let n = residuals.len() as f64;
        let (mut sq, mut abs, mut sq_atom, mut abs_atom) = (0.0, 0.0, 0.0, 0.0);
        for &(r, natoms) in residuals {
            let ra = r / natoms.max(1) as f64;
            sq += r * r;
            abs += r.abs();
            sq_atom += ra * ra;
            abs_atom += ra.abs();
        }
        Some(Self {
            n: residuals.len(),
            rmse: (sq / n).sqrt(),
            mae: abs / n,
            rmse_per_atom: (sq_atom / n).sqrt(),
            mae_per_atom: abs_atom / n,
        })
    }
}

/// errors of a model before and after swapping its E0s
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Validation {
    pub before: ErrorStats,
    pub after: ErrorStats,
}

/// Compare `model`'s predictions against the reference energies in `configs`,
/// first as is and then with its E0s changed from `foundation` to `corrected`.
/// Changing the E0s shifts each prediction by the sum over its atoms of
/// `corrected[z] - foundation[z]`; elements missing from either map do not
/// shift. Returns `None` if no configuration has a reference energy
pub fn validate<M: EnergyModel + ?Sized>(
    model: &M,
    foundation: &E0s,
    corrected: &E0s,
    configs: &[Configuration],
) -> Result<Option<Validation>, E0Error> {
    let valid: Vec<_> = configs
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.energy.map(|e| (i, c, e)))
        .collect();
    if valid.is_empty() {
        return Ok(None);
    }
    let predicted = evaluate(model, valid.iter().map(|&(i, c, _)| (i, c)))?;
    let shift = |z: usize| match (corrected.get(z), foundation.get(z)) {
        (Some(c), Some(f)) => c - f,
        _ => 0.0,
    };
    let mut before = Vec::with_capacity(valid.len());
    let mut after = Vec::with_capacity(valid.len());
    for (&(_, c, e), p) in valid.iter().zip(predicted) {
        let delta: f64 = c.atomic_numbers().map(&shift).sum();
        before.push((e - p, c.len()));
        after.push((e - p - delta, c.len()));
    }
    Ok(ErrorStats::new(&before)
        .zip(ErrorStats::new(&after))
        .map(|(before, after)| Validation { before, after }))
}
