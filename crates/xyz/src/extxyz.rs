//! Reader for (extended) XYZ trajectories

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, Lines, Read},
    iter::Enumerate,
    path::Path,
    sync::LazyLock,
};

use log::{debug, trace};
use regex::Regex;

use crate::{Atom, Configuration, Mat3, XyzError};

/// matches `key=value` pairs in a comment line, where the value may be bare or
/// wrapped in double quotes, single quotes, or braces
static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    trace!("initializing extxyz comment regex");
    Regex::new(
        r#"([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|\{([^}]*)\}|(\S+))"#,
    )
    .unwrap()
});

/// the column layout and metadata parsed from a comment line
#[derive(Debug, Default)]
struct Header {
    cell: Option<Mat3>,
    pbc: Option<[bool; 3]>,
    species: usize,
    pos: usize,
    info: BTreeMap<String, String>,
}

impl Header {
    fn parse(comment: &str, line: usize) -> Result<Self, XyzError> {
        let mut ret = Self {
            species: 0,
            pos: 1,
            ..Default::default()
        };
        for caps in KEY_VALUE.captures_iter(comment) {
            let key = &caps[1];
            let value = (2..=5)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str())
                .unwrap_or_default();
            if key.eq_ignore_ascii_case("lattice") {
                ret.cell = Some(parse_lattice(value, line)?);
            } else if key.eq_ignore_ascii_case("pbc") {
                ret.pbc = Some(parse_pbc(value, line)?);
            } else if key.eq_ignore_ascii_case("properties") {
                (ret.species, ret.pos) = parse_properties(value, line)?;
            } else {
                ret.info.insert(key.to_owned(), value.to_owned());
            }
        }
        Ok(ret)
    }
}

fn parse_lattice(s: &str, line: usize) -> Result<Mat3, XyzError> {
    let v = s
        .split_whitespace()
        .map(|f| f.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| XyzError::Lattice { line })?;
    if v.len() != 9 {
        return Err(XyzError::Lattice { line });
    }
    Ok(Mat3::from_row_slice(&v))
}

fn parse_pbc(s: &str, line: usize) -> Result<[bool; 3], XyzError> {
    let mut ret = [false; 3];
    let fields: Vec<_> = s.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(XyzError::Pbc { line });
    }
    for (b, f) in ret.iter_mut().zip(fields) {
        *b = match f.to_ascii_lowercase().as_str() {
            "t" | "true" | "1" => true,
            "f" | "false" | "0" => false,
            _ => return Err(XyzError::Pbc { line }),
        };
    }
    Ok(ret)
}

/// locate the species and position columns in a Properties string like
/// `species:S:1:pos:R:3:forces:R:3`
fn parse_properties(
    s: &str,
    line: usize,
) -> Result<(usize, usize), XyzError> {
    let err = || XyzError::Properties {
        line,
        value: s.to_owned(),
    };
    let fields: Vec<_> = s.split(':').collect();
    if fields.len() % 3 != 0 {
        return Err(err());
    }
    let mut species = None;
    let mut pos = None;
    let mut col = 0;
    for prop in fields.chunks(3) {
        let [name, kind, n] = prop else { unreachable!() };
        let n: usize = n.parse().map_err(|_| err())?;
        match (*name, *kind) {
            ("species", "S") | ("Z", "I") if n == 1 => species = Some(col),
            ("pos", "R") if n == 3 => pos = Some(col),
            _ => {}
        }
        col += n;
    }
    match (species, pos) {
        (Some(s), Some(p)) => Ok((s, p)),
        _ => Err(err()),
    }
}

/// load every frame in the file at `path`. see [load]
pub fn load_file(
    path: impl AsRef<Path>,
    energy_key: &str,
) -> Result<Vec<Configuration>, XyzError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| {
        XyzError::Io(format!("failed to open {} with {e}", path.display()))
    })?;
    let ret = load(f, energy_key)?;
    debug!("loaded {} configurations from {}", ret.len(), path.display());
    Ok(ret)
}

/// Load every frame from `r`. Each frame is an atom count line, a comment line,
/// and then one line per atom. Blank lines between frames are skipped. The
/// value of `energy_key` in a comment line, if present, becomes the
/// configuration's energy; every other unrecognized key is kept in `info`
pub fn load(
    r: impl Read,
    energy_key: &str,
) -> Result<Vec<Configuration>, XyzError> {
    let mut lines = BufReader::new(r).lines().enumerate();
    let mut ret = Vec::new();
    loop {
        let (n, count) = loop {
            match next_line(&mut lines)? {
                Some((_, l)) if l.trim().is_empty() => continue,
                Some(pair) => break pair,
                None => return Ok(ret),
            }
        };
        let natoms: usize =
            count.trim().parse().map_err(|_| XyzError::AtomCount {
                line: n,
                value: count.trim().to_owned(),
            })?;
        let Some((n, comment)) = next_line(&mut lines)? else {
            return Err(XyzError::Truncated { line: n });
        };
        let mut header = Header::parse(&comment, n)?;
        let mut atoms = Vec::with_capacity(natoms);
        let mut last = n;
        for _ in 0..natoms {
            let Some((n, l)) = next_line(&mut lines)? else {
                return Err(XyzError::Truncated { line: last });
            };
            let fields: Vec<_> = l.split_whitespace().collect();
            let atom = Atom::from_fields(&fields, header.species, header.pos)
                .map_err(|error| XyzError::Atom { line: n, error })?;
            atoms.push(atom);
            last = n;
        }
        let energy = match header.info.remove(energy_key) {
            Some(v) => Some(v.trim().parse().map_err(|_| XyzError::Energy {
                line: n,
                value: v.clone(),
            })?),
            None => None,
        };
        let pbc = header.pbc.unwrap_or([header.cell.is_some(); 3]);
        ret.push(Configuration {
            atoms,
            cell: header.cell,
            pbc,
            energy,
            info: header.info,
        });
    }
}

/// the next line from `lines` along with its 1-based line number
fn next_line<B: BufRead>(
    lines: &mut Enumerate<Lines<B>>,
) -> Result<Option<(usize, String)>, XyzError> {
    match lines.next() {
        Some((i, Ok(l))) => Ok(Some((i + 1, l))),
        Some((_, Err(e))) => Err(XyzError::from(e)),
        None => Ok(None),
    }
}
