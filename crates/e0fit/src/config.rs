//! Configuration settings for an E0 re-estimation run

use std::{
    collections::BTreeMap,
    fmt::{Debug, Display},
    fs::read_to_string,
    path::Path,
    str::FromStr,
};

use e0::{DEFAULT_RCOND, E0Error, E0s, ElementSet};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Foundation E0s can be given as a mapping literal like the one passed to the
/// trainer, as a TOML table keyed by element, or as the name of a file
/// containing a mapping literal
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(untagged)]
enum E0Src {
    Literal(String),
    File { file: String },
    Table(BTreeMap<String, f64>),
}

/// Elements can be given by symbol or by atomic number
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(untagged)]
enum ElementSrc {
    Number(usize),
    Symbol(String),
}

/// The foundation model used to predict the energy of each configuration
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelKind {
    /// read predictions already stored in each configuration's comment line
    /// under `key`, such as the output of an earlier model evaluation
    Stored { key: String },

    /// run `program` with `args` once per configuration, sending the
    /// configuration as extended XYZ on stdin and reading the energy as the
    /// last field of stdout
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },

    /// predict the sum of the foundation E0s over the atoms, so the corrected
    /// E0s are fit to the reference energies alone
    Baseline,
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Stored { key } => write!(f, "stored ({key})"),
            ModelKind::Command { program, .. } => {
                write!(f, "command ({program})")
            }
            ModelKind::Baseline => write!(f, "baseline"),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    /// Extended XYZ file of training configurations. The configurations
    /// lacking a reference energy are skipped.
    training: String,

    /// An optional extended XYZ file of held-out configurations for reporting
    /// energy errors before and after the correction.
    validation: Option<String>,

    /// The comment-line key holding the reference energy in eV. Defaults to
    /// "energy".
    energy_key: Option<String>,

    /// The elements whose E0s should be corrected, as symbols or atomic
    /// numbers. The order determines the order of the unknowns.
    elements: Vec<ElementSrc>,

    /// The foundation model's E0s in eV. Every element in `elements` needs an
    /// entry.
    foundation_e0s: E0Src,

    /// The foundation model to evaluate on each configuration.
    model: ModelKind,

    /// Singular values at or below rcond times the largest are treated as zero
    /// in the least-squares solve. Defaults to 1e-10.
    rcond: Option<f64>,

    /// The number of threads used to evaluate the model. 0, the default, uses
    /// one per CPU.
    threads: Option<usize>,
}

/// Construct a `Config` using [Config::load] on a TOML file or by parsing a
/// TOML string
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// path to the training set
    pub training: String,

    /// optional path to the validation set
    pub validation: Option<String>,

    pub energy_key: String,

    pub elements: ElementSet,

    pub foundation_e0s: E0s,

    pub model: ModelKind,

    pub rcond: f64,

    /// size of the rayon thread pool, 0 for one thread per CPU
    pub threads: usize,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Io(String),
    Toml(String),
    UnknownElement(String),
    Elements(E0Error),
    E0s(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) | ConfigError::Toml(e) => write!(f, "{e}"),
            ConfigError::UnknownElement(s) => {
                write!(f, "unknown element `{s}`")
            }
            ConfigError::Elements(e) => write!(f, "{e}"),
            ConfigError::E0s(e) => write!(f, "foundation_e0s: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn element(src: ElementSrc) -> Result<usize, ConfigError> {
    let s = match src {
        ElementSrc::Number(n) => n.to_string(),
        ElementSrc::Symbol(s) => s,
    };
    xyz::parse_element(&s).ok_or(ConfigError::UnknownElement(s))
}

impl TryFrom<E0Src> for E0s {
    type Error = ConfigError;

    fn try_from(value: E0Src) -> Result<Self, Self::Error> {
        match value {
            E0Src::Literal(s) => {
                s.parse().map_err(|e| ConfigError::E0s(format!("{e}")))
            }
            E0Src::File { file } => {
                let s = read_to_string(&file).map_err(|e| {
                    ConfigError::E0s(format!("failed to read {file} with {e}"))
                })?;
                s.parse().map_err(|e| ConfigError::E0s(format!("{file}: {e}")))
            }
            E0Src::Table(t) => {
                let mut ret = E0s::new();
                for (k, v) in t {
                    let z = element(ElementSrc::Symbol(k))?;
                    if ret.insert(z, v).is_some() {
                        return Err(ConfigError::E0s(format!(
                            "duplicate entry for Z = {z}"
                        )));
                    }
                }
                Ok(ret)
            }
        }
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(rc: RawConfig) -> Result<Self, Self::Error> {
        let elements = rc
            .elements
            .into_iter()
            .map(element)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            training: rc.training,
            validation: rc.validation,
            energy_key: rc.energy_key.unwrap_or_else(|| "energy".to_owned()),
            elements: ElementSet::new(elements).map_err(ConfigError::Elements)?,
            foundation_e0s: rc.foundation_e0s.try_into()?,
            model: rc.model,
            rcond: rc.rcond.unwrap_or(DEFAULT_RCOND),
            threads: rc.threads.unwrap_or(0),
        })
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: RawConfig =
            toml::from_str(s).map_err(|e| ConfigError::Toml(e.to_string()))?;
        raw.try_into()
    }
}

impl Config {
    pub fn load(filename: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let filename = filename.as_ref();
        let contents = read_to_string(filename).map_err(|e| {
            ConfigError::Io(format!(
                "failed to read {} with {e}",
                filename.display()
            ))
        })?;
        contents.parse()
    }
}
