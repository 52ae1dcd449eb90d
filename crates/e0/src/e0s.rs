use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Per-element atomic reference energies in eV, keyed by atomic number
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct E0s(BTreeMap<usize, f64>);

impl E0s {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, z: usize) -> Option<f64> {
        self.0.get(&z).copied()
    }

    pub fn insert(&mut self, z: usize, e0: f64) -> Option<f64> {
        self.0.insert(z, e0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0.iter().map(|(&z, &e)| (z, e))
    }
}

impl FromIterator<(usize, f64)> for E0s {
    fn from_iter<T: IntoIterator<Item = (usize, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<usize, f64>> for E0s {
    fn from(value: BTreeMap<usize, f64>) -> Self {
        Self(value)
    }
}

/// The mapping literal accepted by the trainer, like `{1: -13.66, 8: -2042.1}`.
/// Values are written in their shortest round-trip form, so parsing the output
/// recovers exactly the same floats
impl Display for E0s {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (z, e)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{z}: {e:?}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct E0sParseError(pub String);

impl Display for E0sParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid E0 mapping: {}", self.0)
    }
}

impl std::error::Error for E0sParseError {}

impl FromStr for E0s {
    type Err = E0sParseError;

    /// parse a mapping literal. keys may be atomic numbers or element symbols,
    /// optionally quoted, and a trailing comma is allowed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| {
                E0sParseError("expected braces around mapping".to_owned())
            })?;
        let mut ret = BTreeMap::new();
        for entry in body.split(',').map(str::trim).filter(|e| !e.is_empty())
        {
            let Some((k, v)) = entry.split_once(':') else {
                return Err(E0sParseError(format!("missing `:` in `{entry}`")));
            };
            let k = k.trim().trim_matches(|c: char| c == '\'' || c == '"');
            let z = xyz::parse_element(k).ok_or_else(|| {
                E0sParseError(format!("unknown element `{k}`"))
            })?;
            let v = v.trim();
            let e: f64 = v
                .parse()
                .map_err(|_| E0sParseError(format!("bad energy `{v}`")))?;
            if ret.insert(z, e).is_some() {
                return Err(E0sParseError(format!("duplicate element `{k}`")));
            }
        }
        Ok(Self(ret))
    }
}
