use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{Atom, Mat3};

/// A single atomic structure, optionally periodic, with an optional reference
/// ("true") energy in eV
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub atoms: Vec<Atom>,

    /// lattice vectors as rows, in Å
    pub cell: Option<Mat3>,

    pub pbc: [bool; 3],

    pub energy: Option<f64>,

    /// any other `key=value` fields from the comment line, unparsed
    pub info: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self {
            atoms,
            ..Default::default()
        }
    }

    pub fn with_energy(self, energy: f64) -> Self {
        Self {
            energy: Some(energy),
            ..self
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// the number of atoms with atomic number `z`
    pub fn count(&self, z: usize) -> usize {
        self.atoms.iter().filter(|a| a.atomic_number == z).count()
    }

    pub fn atomic_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.atoms.iter().map(|a| a.atomic_number)
    }

    /// the value of `key` in `info` parsed as an f64, if present and numeric
    pub fn scalar(&self, key: &str) -> Option<f64> {
        self.info.get(key).and_then(|s| s.trim().parse().ok())
    }

    /// chemical formula with elements in order of first appearance, like
    /// `CaCO3` or `OH2`
    pub fn formula(&self) -> String {
        let mut order: Vec<(&str, usize)> = Vec::new();
        for atom in &self.atoms {
            let label = atom.label();
            match order.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => order.push((label, 1)),
            }
        }
        let mut ret = String::new();
        for (label, n) in order {
            ret.push_str(label);
            if n > 1 {
                ret.push_str(&n.to_string());
            }
        }
        ret
    }
}

fn flag(b: bool) -> &'static str {
    if b { "T" } else { "F" }
}

/// write `self` as a single extended XYZ frame
impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.atoms.len())?;
        if let Some(cell) = &self.cell {
            let v: Vec<_> = (0..3)
                .flat_map(|r| (0..3).map(move |c| format!("{:?}", cell[(r, c)])))
                .collect();
            write!(f, "Lattice=\"{}\" ", v.join(" "))?;
        }
        write!(f, "Properties=species:S:1:pos:R:3")?;
        if let Some(e) = self.energy {
            write!(f, " energy={e:?}")?;
        }
        for (k, v) in &self.info {
            if v.contains(char::is_whitespace) {
                write!(f, " {k}=\"{v}\"")?;
            } else {
                write!(f, " {k}={v}")?;
            }
        }
        let [a, b, c] = self.pbc;
        writeln!(f, " pbc=\"{} {} {}\"", flag(a), flag(b), flag(c))?;
        for atom in &self.atoms {
            writeln!(f, "{atom}")?;
        }
        Ok(())
    }
}
