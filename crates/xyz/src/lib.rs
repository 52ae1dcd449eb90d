use std::{error::Error, fmt::Display};

pub use atom::*;
pub use configuration::Configuration;
pub use extxyz::{load, load_file};

pub mod atom;
mod configuration;
pub mod extxyz;


use nalgebra as na;

pub type Mat3 = na::Matrix3<f64>;

#[derive(Debug, PartialEq)]
pub enum XyzError {
    Io(String),
    AtomCount { line: usize, value: String },
    /// the input ended partway through the frame whose last line is `line`
    Truncated { line: usize },
    Atom { line: usize, error: AtomError },
    Lattice { line: usize },
    Pbc { line: usize },
    Properties { line: usize, value: String },
    Energy { line: usize, value: String },
}

impl Display for XyzError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XyzError::Io(e) => write!(f, "{e}"),
            XyzError::AtomCount { line, value } => {
                write!(f, "line {line}: expected an atom count, found `{value}`")
            }
            XyzError::Truncated { line } => {
                write!(f, "line {line}: unexpected end of input in frame")
            }
            XyzError::Atom { line, error } => write!(f, "line {line}: {error}"),
            XyzError::Lattice { line } => {
                write!(f, "line {line}: Lattice must contain 9 numbers")
            }
            XyzError::Pbc { line } => {
                write!(f, "line {line}: pbc must contain 3 T/F flags")
            }
            XyzError::Properties { line, value } => write!(
                f,
                "line {line}: Properties `{value}` lacks species or pos columns"
            ),
            XyzError::Energy { line, value } => {
                write!(f, "line {line}: failed to parse energy `{value}`")
            }
        }
    }
}

impl Error for XyzError {}

impl From<std::io::Error> for XyzError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
