use std::io::{self, Write};

use e0::{
    Diagnostics, Dvec, E0s, ElementSet, ErrorStats, Reestimate, Validation,
};
use serde::Serialize;

/// everything written by `--output`
#[derive(Serialize)]
pub struct Summary<'a> {
    pub e0s: &'a E0s,
    pub correction: Option<&'a Dvec>,
    pub diagnostics: &'a Diagnostics,
    pub validation: Option<&'a Validation>,
}

impl<'a> Summary<'a> {
    pub fn new(
        result: &'a Reestimate,
        validation: Option<&'a Validation>,
    ) -> Self {
        Self {
            e0s: &result.e0s,
            correction: result.correction.as_ref(),
            diagnostics: &result.diagnostics,
            validation,
        }
    }
}

fn stats_row<W: Write>(
    w: &mut W,
    name: &str,
    s: &ErrorStats,
) -> io::Result<()> {
    writeln!(
        w,
        "{:<8}{:>14.6}{:>14.6}{:>16.6}{:>16.6}",
        name, s.rmse, s.mae, s.rmse_per_atom, s.mae_per_atom
    )
}

/// Write a human-readable summary of `result` to `w`, ending with the
/// `--E0s=` argument for the trainer
pub fn write_report<W: Write>(
    w: &mut W,
    foundation: &E0s,
    elements: &ElementSet,
    result: &Reestimate,
    validation: Option<&Validation>,
) -> io::Result<()> {
    let d = &result.diagnostics;
    writeln!(
        w,
        "configurations: {} ({} with reference energies)",
        d.nconfigs, d.nvalid
    )?;
    writeln!(w, "unknowns: {}", d.nunknowns)?;
    if let Some(rank) = d.rank {
        writeln!(w, "rank: {rank} of {}", d.nunknowns)?;
    }
    writeln!(w)?;

    writeln!(
        w,
        "{:<4}{:>4}{:>20}{:>20}{:>20}",
        "elem", "Z", "foundation", "correction", "corrected"
    )?;
    for (j, &z) in elements.iter().enumerate() {
        let Some(old) = foundation.get(z) else {
            continue;
        };
        let dx = result.correction.as_ref().map_or(0.0, |x| x[j]);
        let new = result.e0s.get(z).unwrap_or(old);
        writeln!(
            w,
            "{:<4}{:>4}{:>20.10}{:>20.10}{:>20.10}",
            xyz::number_to_symbol(z).unwrap_or("X"),
            z,
            old,
            dx,
            new
        )?;
    }
    writeln!(w)?;

    if let Some(before) = d.mse_before {
        writeln!(w, "MSE before correction: {before:.6e} eV²")?;
    }
    if let Some(after) = d.mse_after {
        writeln!(w, "MSE after correction:  {after:.6e} eV²")?;
    }
    if let Some(improvement) = d.improvement() {
        writeln!(w, "improvement: {improvement:.2}%")?;
    }
    for warning in &d.warnings {
        writeln!(w, "warning: {warning}")?;
    }

    if let Some(v) = validation {
        writeln!(w)?;
        writeln!(w, "validation ({} configurations):", v.before.n)?;
        writeln!(
            w,
            "{:<8}{:>14}{:>14}{:>16}{:>16}",
            "", "RMSE/eV", "MAE/eV", "RMSE/eV/atom", "MAE/eV/atom"
        )?;
        stats_row(w, "before", &v.before)?;
        stats_row(w, "after", &v.after)?;
    }

    writeln!(w)?;
    writeln!(w, "--E0s={}", result.e0s)
}

#[cfg(test)]
mod tests {
    use e0::Warning;
    use insta::assert_snapshot;

    use super::*;

    fn report(
        result: &Reestimate,
        validation: Option<&Validation>,
    ) -> String {
        let foundation =
            E0s::from_iter([(1, -13.5), (8, -2042.0), (20, -1000.25)]);
        let elements = ElementSet::new(vec![1, 8]).unwrap();
        let mut buf = Vec::new();
        write_report(&mut buf, &foundation, &elements, result, validation)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn rank_deficient() {
        let result = Reestimate {
            e0s: E0s::from_iter([(1, -13.25), (8, -2043.5), (20, -1000.25)]),
            correction: Some(Dvec::from_vec(vec![0.25, -1.5])),
            diagnostics: Diagnostics {
                nconfigs: 5,
                nvalid: 4,
                nunknowns: 2,
                rank: Some(1),
                singular_values: vec![3.0, 0.0],
                mse_before: Some(4.0),
                mse_after: Some(1.0),
                warnings: vec![Warning::RankDeficient {
                    rank: 1,
                    unknowns: 2,
                }],
            },
        };
        let validation = Validation {
            before: ErrorStats {
                n: 3,
                rmse: 2.0,
                mae: 1.5,
                rmse_per_atom: 0.5,
                mae_per_atom: 0.25,
            },
            after: ErrorStats {
                n: 3,
                rmse: 1.0,
                mae: 0.5,
                rmse_per_atom: 0.25,
                mae_per_atom: 0.125,
            },
        };
        assert_snapshot!(report(&result, Some(&validation)), @r"
        configurations: 5 (4 with reference energies)
        unknowns: 2
        rank: 1 of 2

        elem   Z          foundation          correction           corrected
        H      1      -13.5000000000        0.2500000000      -13.2500000000
        O      8    -2042.0000000000       -1.5000000000    -2043.5000000000

        MSE before correction: 4.000000e0 eV²
        MSE after correction:  1.000000e0 eV²
        improvement: 75.00%
        warning: design matrix has rank 1 for 2 unknowns, some corrections are not independently determined

        validation (3 configurations):
                       RMSE/eV        MAE/eV    RMSE/eV/atom     MAE/eV/atom
        before        2.000000      1.500000        0.500000        0.250000
        after         1.000000      0.500000        0.250000        0.125000

        --E0s={1: -13.25, 8: -2043.5, 20: -1000.25}
        ");
    }

    #[test]
    fn empty_input() {
        let result = Reestimate {
            e0s: E0s::from_iter([(1, -13.5), (8, -2042.0), (20, -1000.25)]),
            correction: None,
            diagnostics: Diagnostics {
                nconfigs: 2,
                nvalid: 0,
                nunknowns: 2,
                warnings: vec![Warning::EmptyInput],
                ..Default::default()
            },
        };
        assert_snapshot!(report(&result, None), @r"
        configurations: 2 (0 with reference energies)
        unknowns: 2

        elem   Z          foundation          correction           corrected
        H      1      -13.5000000000        0.0000000000      -13.5000000000
        O      8    -2042.0000000000        0.0000000000    -2042.0000000000

        warning: no configurations with reference energies, keeping foundation E0s

        --E0s={1: -13.5, 8: -2042.0, 20: -1000.25}
        ");
    }
}
