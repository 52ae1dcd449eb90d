//! Re-estimation of the atomic reference energies (E0s) of a foundation
//! interatomic potential against a labelled training set.
//!
//! Given the foundation model's energy predictions `p` and the reference
//! energies `E` of the training configurations, the corrections `x` to the
//! foundation E0s minimize ‖Ax − (E − p)‖², where `A[(i, j)]` counts the atoms
//! of element `j` in configuration `i`.

use std::{error::Error, fmt::Display};

use log::{debug, error, info, warn};
use nalgebra as na;
use rayon::prelude::*;
use serde::Serialize;
use xyz::Configuration;

pub use e0s::{E0s, E0sParseError};
pub use stats::{ErrorStats, Validation, validate};

mod e0s;
pub mod lstsq;
mod stats;


pub type Dmat = na::DMatrix<f64>;
pub type Dvec = na::DVector<f64>;

/// relative singular-value cutoff used by [Corrector::default]
pub const DEFAULT_RCOND: f64 = 1e-10;

/// A foundation model, or anything else that predicts a potential energy in eV
/// from the geometry of a [Configuration]. Implementations are called once per
/// configuration, possibly from several threads at once
pub trait EnergyModel: Sync {
    fn energy(&self, config: &Configuration) -> Result<f64, ModelError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelError(pub String);

impl Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for ModelError {}

#[derive(Debug, PartialEq)]
pub enum E0Error {
    EmptyElements,
    DuplicateElement(usize),
    InvalidElement(usize),
    /// an element to correct has no foundation E0
    MissingElement(usize),
    /// the model failed on the configuration at `index` in the input
    Model { index: usize, error: ModelError },
}

impl Display for E0Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            E0Error::EmptyElements => write!(f, "no elements to correct"),
            E0Error::DuplicateElement(z) => {
                write!(f, "element {} listed more than once", label(*z))
            }
            E0Error::InvalidElement(z) => {
                write!(f, "{z} is not a valid atomic number")
            }
            E0Error::MissingElement(z) => write!(
                f,
                "no foundation E0 for element {} (Z = {z})",
                label(*z)
            ),
            E0Error::Model { index, error } => {
                write!(f, "model failed on configuration {index}: {error}")
            }
        }
    }
}

impl Error for E0Error {}

fn label(z: usize) -> &'static str {
    xyz::number_to_symbol(z).unwrap_or("X")
}

/// The ordered, non-empty, duplicate-free atomic numbers whose E0s receive
/// independent corrections. The order fixes the column order of the design
/// matrix
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ElementSet(Vec<usize>);

impl ElementSet {
    pub fn new(elements: Vec<usize>) -> Result<Self, E0Error> {
        if elements.is_empty() {
            return Err(E0Error::EmptyElements);
        }
        for (i, &z) in elements.iter().enumerate() {
            if xyz::number_to_symbol(z).is_none() {
                return Err(E0Error::InvalidElement(z));
            }
            if elements[..i].contains(&z) {
                return Err(E0Error::DuplicateElement(z));
            }
        }
        Ok(Self(elements))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl TryFrom<Vec<usize>> for ElementSet {
    type Error = E0Error;

    fn try_from(value: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Non-fatal conditions encountered while re-estimating. Each leaves a usable
/// set of E0s in the result
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Warning {
    /// no configuration carried a reference energy; the foundation E0s were
    /// returned unchanged
    EmptyInput,

    /// some corrections are not independently determined by the data and were
    /// resolved by the minimum-norm solution
    RankDeficient { rank: usize, unknowns: usize },

    /// the solve failed; the foundation E0s were returned unchanged
    NumericalFailure(String),
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::EmptyInput => write!(
                f,
                "no configurations with reference energies, \
                 keeping foundation E0s"
            ),
            Warning::RankDeficient { rank, unknowns } => write!(
                f,
                "design matrix has rank {rank} for {unknowns} unknowns, \
                 some corrections are not independently determined"
            ),
            Warning::NumericalFailure(e) => {
                write!(f, "least-squares solve failed ({e}), keeping foundation E0s")
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// configurations supplied
    pub nconfigs: usize,

    /// configurations with a reference energy, the rows of the system
    pub nvalid: usize,

    pub nunknowns: usize,

    /// numerical rank of the design matrix, if a solve was attempted and
    /// succeeded
    pub rank: Option<usize>,

    pub singular_values: Vec<f64>,

    /// mean of the squared residuals before correction, in eV²
    pub mse_before: Option<f64>,

    /// mean of the squared residuals after correction, in eV²
    pub mse_after: Option<f64>,

    pub warnings: Vec<Warning>,
}

impl Diagnostics {
    /// percentage reduction in the mean squared residual
    pub fn improvement(&self) -> Option<f64> {
        let (before, after) = (self.mse_before?, self.mse_after?);
        if before > 0.0 {
            Some((1.0 - after / before) * 100.0)
        } else {
            Some(0.0)
        }
    }

    pub fn is_rank_deficient(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::RankDeficient { .. }))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reestimate {
    pub e0s: E0s,

    /// the correction for each element in [ElementSet] order, `None` if the
    /// foundation E0s were returned unchanged
    pub correction: Option<Dvec>,

    pub diagnostics: Diagnostics,
}

impl Reestimate {
    fn unchanged(foundation: &E0s, diagnostics: Diagnostics) -> Self {
        Self {
            e0s: foundation.clone(),
            correction: None,
            diagnostics,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corrector {
    /// singular values at or below `rcond` times the largest are treated as
    /// zero in the solve and the rank
    pub rcond: f64,
}

impl Default for Corrector {
    fn default() -> Self {
        Self {
            rcond: DEFAULT_RCOND,
        }
    }
}

impl Corrector {
    pub fn new(rcond: f64) -> Self {
        Self { rcond }
    }

    /// Re-estimate the E0s of `elements` so that `model` plus the corrected
    /// E0s best reproduces the reference energies of `configs` in the least
    /// squares sense. Configurations without a reference energy are skipped.
    /// Every element must have an entry in `foundation`; entries for other
    /// elements are passed through unchanged.
    ///
    /// Only precondition violations and model failures are errors. An empty
    /// training set, a rank-deficient system, or a failed solve are reported in
    /// the returned [Diagnostics] instead
    pub fn run<M: EnergyModel + ?Sized>(
        &self,
        model: &M,
        foundation: &E0s,
        configs: &[Configuration],
        elements: &ElementSet,
    ) -> Result<Reestimate, E0Error> {
        let base = elements
            .iter()
            .map(|&z| foundation.get(z).ok_or(E0Error::MissingElement(z)))
            .collect::<Result<Vec<_>, _>>()?;

        let valid: Vec<_> = configs
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.energy.map(|e| (i, c, e)))
            .collect();
        let mut diagnostics = Diagnostics {
            nconfigs: configs.len(),
            nvalid: valid.len(),
            nunknowns: elements.len(),
            ..Default::default()
        };
        if valid.is_empty() {
            let w = Warning::EmptyInput;
            warn!("{w}");
            diagnostics.warnings.push(w);
            return Ok(Reestimate::unchanged(foundation, diagnostics));
        }

        info!(
            "solving for {} E0 corrections from {} of {} configurations",
            elements.len(),
            valid.len(),
            configs.len()
        );
        let predicted = evaluate(model, valid.iter().map(|&(i, c, _)| (i, c)))?;
        let b = Dvec::from_iterator(
            valid.len(),
            valid.iter().zip(&predicted).map(|(&(_, _, e), p)| e - p),
        );
        let a = lstsq::design_matrix(valid.iter().map(|v| v.1), elements);
        let mse_before = lstsq::mean_square(&b);
        diagnostics.mse_before = Some(mse_before);

        let solution = match lstsq::solve(&a, &b, self.rcond) {
            Ok(s) => s,
            Err(e) => {
                let w = Warning::NumericalFailure(e.to_string());
                error!("{w}");
                diagnostics.warnings.push(w);
                return Ok(Reestimate::unchanged(foundation, diagnostics));
            }
        };
        debug!("singular values: {:?}", solution.singular_values.as_slice());

        let mse_after = lstsq::mean_square(&(&b - &a * &solution.x));
        diagnostics.mse_after = Some(mse_after);
        diagnostics.rank = Some(solution.rank);
        diagnostics.singular_values =
            solution.singular_values.iter().copied().collect();
        if solution.rank < elements.len() {
            let w = Warning::RankDeficient {
                rank: solution.rank,
                unknowns: elements.len(),
            };
            warn!("{w}");
            diagnostics.warnings.push(w);
        }

        let mut e0s = foundation.clone();
        for ((&z, old), dx) in elements.iter().zip(base).zip(&solution.x) {
            let new = old + dx;
            info!("E0 {:>2}: {old:.8} -> {new:.8} ({dx:+.8})", label(z));
            e0s.insert(z, new);
        }
        info!(
            "MSE before correction: {mse_before:.6e} eV², after: \
             {mse_after:.6e} eV², improvement: {:.2}%",
            diagnostics.improvement().unwrap_or_default()
        );

        Ok(Reestimate {
            e0s,
            correction: Some(solution.x),
            diagnostics,
        })
    }
}

/// Re-estimate the E0s with the default [Corrector], discarding the
/// diagnostics. See [Corrector::run]
pub fn reestimate<M: EnergyModel + ?Sized>(
    model: &M,
    foundation: &E0s,
    configs: &[Configuration],
    elements: &ElementSet,
) -> Result<E0s, E0Error> {
    Corrector::default()
        .run(model, foundation, configs, elements)
        .map(|r| r.e0s)
}

/// evaluate `model` on every configuration in parallel, keeping the input
/// order. the paired index is reported if the model fails
pub(crate) fn evaluate<'a, M: EnergyModel + ?Sized>(
    model: &M,
    configs: impl Iterator<Item = (usize, &'a Configuration)>,
) -> Result<Vec<f64>, E0Error> {
    let configs: Vec<_> = configs.collect();
    configs
        .par_iter()
        .map(|&(index, c)| {
            let e = model
                .energy(c)
                .map_err(|error| E0Error::Model { index, error })?;
            debug!("configuration {index} ({}): predicted {e}", c.formula());
            Ok(e)
        })
        .collect()
}

/// call `rayon::ThreadPoolBuilder` to set `num_threads` to `n`. Discards the
/// error returned by `build_global` if the thread pool has already been
/// initialized
pub fn max_threads(n: usize) {
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global();
}
