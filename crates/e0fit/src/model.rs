//! [EnergyModel] implementations selectable from the input file

use std::{
    io::{ErrorKind, Write},
    process::Stdio,
};

use e0::{E0s, EnergyModel, ModelError};
use log::trace;
use xyz::Configuration;

use crate::config::ModelKind;

/// Predictions already stored in each configuration's comment line
pub struct Stored {
    pub key: String,
}

impl EnergyModel for Stored {
    fn energy(&self, config: &Configuration) -> Result<f64, ModelError> {
        config.scalar(&self.key).ok_or_else(|| {
            ModelError(format!(
                "no numeric `{}` field for {}",
                self.key,
                config.formula()
            ))
        })
    }
}

/// An external program that reads one extended XYZ frame on stdin and writes
/// the energy in eV as the last field of its stdout
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

impl EnergyModel for Command {
    fn energy(&self, config: &Configuration) -> Result<f64, ModelError> {
        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ModelError(format!("failed to run {} with {e}", self.program))
            })?;

        // the child may exit without reading its input
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(config.to_string().as_bytes())
            && e.kind() != ErrorKind::BrokenPipe
        {
            return Err(ModelError(format!(
                "failed to write to {} with {e}",
                self.program
            )));
        }

        let output = child.wait_with_output().map_err(|e| {
            ModelError(format!("failed to wait on {} with {e}", self.program))
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("{} output: {stdout}", self.program);
        if !output.status.success() {
            return Err(ModelError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_energy(&stdout).ok_or_else(|| {
            ModelError(format!(
                "failed to read an energy from the output of {}: `{}`",
                self.program,
                stdout.trim()
            ))
        })
    }
}

fn parse_energy(s: &str) -> Option<f64> {
    s.split_whitespace().next_back()?.parse().ok()
}

/// The sum of `e0s` over the atoms, the prediction of a model with no
/// interaction energy
pub struct Baseline {
    pub e0s: E0s,
}

impl EnergyModel for Baseline {
    fn energy(&self, config: &Configuration) -> Result<f64, ModelError> {
        config.atomic_numbers().try_fold(0.0, |sum, z| {
            let e0 = self.e0s.get(z).ok_or_else(|| {
                ModelError(format!(
                    "no E0 for {} in {}",
                    xyz::number_to_symbol(z).unwrap_or("X"),
                    config.formula()
                ))
            })?;
            Ok(sum + e0)
        })
    }
}

/// construct the model described by `kind`. the baseline model sums
/// `foundation`
pub fn build(kind: &ModelKind, foundation: &E0s) -> Box<dyn EnergyModel> {
    match kind {
        ModelKind::Stored { key } => Box::new(Stored { key: key.clone() }),
        ModelKind::Command { program, args } => Box::new(Command {
            program: program.clone(),
            args: args.clone(),
        }),
        ModelKind::Baseline => Box::new(Baseline {
            e0s: foundation.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use xyz::Atom;

    use super::*;

    fn water() -> Configuration {
        let mut ret = Configuration::new(vec![
            Atom::new(8, 0.0, 0.0, 0.1173),
            Atom::new(1, 0.0, 0.7572, -0.4692),
            Atom::new(1, 0.0, -0.7572, -0.4692),
        ]);
        ret.info.insert("MACE_energy".into(), "-14.25".into());
        ret.info.insert("config_type".into(), "molecule".into());
        ret
    }

    fn sh(script: &str) -> Command {
        Command {
            program: String::from("sh"),
            args: vec![String::from("-c"), script.to_owned()],
        }
    }

    #[test]
    fn stored() {
        let model = Stored {
            key: String::from("MACE_energy"),
        };
        assert_eq!(model.energy(&water()), Ok(-14.25));
    }

    #[test_case("config_type"; "not a number")]
    #[test_case("DFT_energy"; "missing")]
    fn stored_error(key: &str) {
        let model = Stored { key: key.into() };
        let got = model.energy(&water()).unwrap_err();
        assert!(got.0.contains(key), "{got}");
        assert!(got.0.contains("OH2"), "{got}");
    }

    #[test]
    fn baseline() {
        let model = Baseline {
            e0s: E0s::from_iter([(1, -1.125), (8, -4.875)]),
        };
        assert_eq!(model.energy(&water()), Ok(-7.125));

        let model = Baseline {
            e0s: E0s::from_iter([(8, -4.875)]),
        };
        let got = model.energy(&water()).unwrap_err();
        assert!(got.0.contains("no E0 for H"), "{got}");
    }

    #[test]
    fn command() {
        let model = sh("cat > /dev/null; echo 'energy: -12.5'");
        assert_eq!(model.energy(&water()), Ok(-12.5));
    }

    /// the first line of the frame on stdin is the atom count
    #[test]
    fn command_input() {
        let model = sh("head -n 1");
        assert_eq!(model.energy(&water()), Ok(3.0));
    }

    #[test]
    fn command_ignores_input() {
        let model = sh("echo -1.0");
        assert_eq!(model.energy(&water()), Ok(-1.0));
    }

    #[test_case("echo oops >&2; exit 3", "oops"; "exit status")]
    #[test_case("echo not-a-number", "not-a-number"; "bad output")]
    #[test_case("true", "failed to read an energy"; "no output")]
    fn command_error(script: &str, want: &str) {
        let got = sh(script).energy(&water()).unwrap_err();
        assert!(got.0.contains(want), "{got}");
    }

    #[test]
    fn missing_program() {
        let model = Command {
            program: String::from("./no-such-program"),
            args: Vec::new(),
        };
        let got = model.energy(&water()).unwrap_err();
        assert!(got.0.starts_with("failed to run ./no-such-program"), "{got}");
    }

    #[test]
    fn parse() {
        assert_eq!(parse_energy("E = -76.4\n"), Some(-76.4));
        assert_eq!(parse_energy("  \n"), None);
    }
}
