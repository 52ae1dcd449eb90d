use std::{fmt::Display, str::FromStr};

use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Atom {
    pub atomic_number: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }
}

impl AbsDiffEq for Atom {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-8
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < epsilon;
        self.atomic_number == other.atomic_number
            && close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.z, other.z)
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:2} {:15.10} {:15.10} {:15.10}",
            self.label(),
            self.x,
            self.y,
            self.z
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AtomError {
    /// the line had fewer fields than the column layout requires
    Fields { want: usize, got: usize },
    Coord(String),
    Symbol(String),
}

impl Display for AtomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomError::Fields { want, got } => {
                write!(f, "expected at least {want} fields, found {got}")
            }
            AtomError::Coord(s) => {
                write!(f, "failed to parse coordinate `{s}` as f64")
            }
            AtomError::Symbol(s) => write!(f, "unknown element `{s}`"),
        }
    }
}

impl std::error::Error for AtomError {}

impl FromStr for Atom {
    type Err = AtomError;

    /// parse an Atom from a line like
    ///  C 1.0 1.0 1.0
    /// trailing fields are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<_> = s.split_whitespace().collect();
        Self::from_fields(&fields, 0, 1)
    }
}

pub const NUMBER_TO_SYMBOL: [&str; 119] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg",
    "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn",
    "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb",
    "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm",
    "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta",
    "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At",
    "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt",
    "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// look up the atomic number for `s`, ignoring case. the dummy symbol `X` is
/// not an element and is rejected
pub fn symbol_to_number(s: &str) -> Option<usize> {
    NUMBER_TO_SYMBOL
        .iter()
        .skip(1)
        .position(|x| x.eq_ignore_ascii_case(s))
        .map(|i| i + 1)
}

pub fn number_to_symbol(n: usize) -> Option<&'static str> {
    if n == 0 {
        return None;
    }
    NUMBER_TO_SYMBOL.get(n).copied()
}

/// parse an element given either as a symbol or as an atomic number
pub fn parse_element(s: &str) -> Option<usize> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        s.parse()
            .ok()
            .filter(|&n| number_to_symbol(n).is_some())
    } else {
        symbol_to_number(s)
    }
}

impl Atom {
    pub fn new(atomic_number: usize, x: f64, y: f64, z: f64) -> Self {
        Self {
            atomic_number,
            x,
            y,
            z,
        }
    }

    pub fn new_from_label(
        atomic_symbol: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<Self, AtomError> {
        let Some(n) = parse_element(atomic_symbol) else {
            return Err(AtomError::Symbol(atomic_symbol.to_owned()));
        };
        Ok(Self::new(n, x, y, z))
    }

    /// build an Atom from the whitespace-separated `fields` of an atom line,
    /// where the element is in column `species` and the three Cartesian
    /// coordinates start at column `pos`
    pub fn from_fields(
        fields: &[&str],
        species: usize,
        pos: usize,
    ) -> Result<Self, AtomError> {
        let want = species.max(pos + 2) + 1;
        if fields.len() < want {
            return Err(AtomError::Fields {
                want,
                got: fields.len(),
            });
        }
        let mut coord = [0.0; 3];
        for (c, s) in coord.iter_mut().zip(&fields[pos..pos + 3]) {
            *c = s.parse().map_err(|_| AtomError::Coord(s.to_string()))?;
        }
        let [x, y, z] = coord;
        Self::new_from_label(fields[species], x, y, z)
    }

    #[inline]
    pub fn label(&self) -> &str {
        number_to_symbol(self.atomic_number).unwrap_or("X")
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("Ca", Some(20))]
    #[test_case("CA", Some(20))]
    #[test_case("ca", Some(20))]
    #[test_case("h", Some(1))]
    #[test_case("Rn", Some(86))]
    #[test_case("Ac", Some(89))]
    #[test_case("og", Some(118))]
    #[test_case("119", None)]
    #[test_case("8", Some(8))]
    #[test_case("0", None)]
    #[test_case("X", None)]
    #[test_case("Qq", None)]
    fn element(s: &str, want: Option<usize>) {
        assert_eq!(parse_element(s), want);
    }

    #[test]
    fn from_str() {
        let got: Atom = "O 0.0 -0.71603315 0.0 6.59".parse().unwrap();
        assert_eq!(got, Atom::new(8, 0.0, -0.71603315, 0.0));

        assert_eq!(
            "O 0.0 1.0".parse::<Atom>(),
            Err(AtomError::Fields { want: 4, got: 3 })
        );
        assert_eq!(
            "Zz 0.0 1.0 2.0".parse::<Atom>(),
            Err(AtomError::Symbol("Zz".to_owned()))
        );
        assert_eq!(
            "C 0.0 one 2.0".parse::<Atom>(),
            Err(AtomError::Coord("one".to_owned()))
        );
    }

    #[test]
    fn display() {
        let a = Atom::new(20, 1.5, -0.25, 0.0);
        assert_eq!(
            a.to_string(),
            "Ca    1.5000000000   -0.2500000000    0.0000000000"
        );
    }
}
