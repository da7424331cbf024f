use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

use csv::ReaderBuilder;

use crate::error::{DemuxError, Result};

/// One configured sample: its name and the expected index pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub index_a: Vec<u8>,
    pub index_b: Vec<u8>,
}

impl IndexEntry {
    pub fn new(name: &str, index_a: &str, index_b: &str) -> Self {
        Self {
            name: name.to_string(),
            index_a: index_a.to_ascii_uppercase().into_bytes(),
            index_b: index_b.to_ascii_uppercase().into_bytes(),
        }
    }

    pub fn tag(&self) -> String {
        format!("{}+{}", String::from_utf8_lossy(&self.index_a), String::from_utf8_lossy(&self.index_b))
    }
}

/// Index entries in file order. Order is match priority.
#[derive(Debug, Clone)]
pub struct IndexTable {
    pub path: String,
    pub entries: Vec<IndexEntry>,
}

impl IndexTable {
    /// Fails if a configured name collides with one of the synthetic buckets, ignoring case.
    pub fn ensure_names_free(&self, reserved: &[&str]) -> Result<()> {
        match self.entries.iter().find(|e| reserved.iter().any(|r| r.eq_ignore_ascii_case(&e.name))) {
            Some(e) => Err(DemuxError::DuplicateBucketName { name: e.name.clone(), path: self.path.clone(), line: 0 }),
            None => Ok(()),
        }
    }
}

/// Allowed edit distance on index A and index B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MismatchBudget {
    pub on_a: usize,
    pub on_b: usize,
}

impl MismatchBudget {
    pub fn new(on_a: usize, on_b: usize) -> Self {
        Self { on_a, on_b }
    }
}

impl Default for MismatchBudget {
    fn default() -> Self {
        Self::new(2, 2)
    }
}

impl FromStr for MismatchBudget {
    type Err = DemuxError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || DemuxError::InvalidMismatch(s.to_string());
        let parse = |v: &str| v.trim().parse::<usize>().map_err(|_| bad());
        match s.split_once(',') {
            Some((a, b)) => Ok(Self::new(parse(a)?, parse(b)?)),
            None => {
                let n = parse(s)?;
                Ok(Self::new(n, n))
            }
        }
    }
}

impl std::fmt::Display for MismatchBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.on_a, self.on_b)
    }
}

/// Loads the index table. `.csv` files are comma separated, anything else is whitespace separated.
pub fn read_index_table(path: &str) -> Result<IndexTable> {
    let rows = if path.to_ascii_lowercase().ends_with(".csv") { read_csv_rows(path)? } else { read_whitespace_rows(path)? };
    let mut entries = Vec::with_capacity(rows.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (line, fields) in rows {
        let entry = parse_entry(path, line, &fields)?;
        if seen.insert(entry.name.to_ascii_lowercase(), line).is_some() {
            return Err(DemuxError::DuplicateBucketName { name: entry.name, path: path.to_string(), line });
        }
        entries.push(entry);
    }
    if entries.is_empty() {
        return Err(config_error(path, 0, "no index entries found"));
    }
    Ok(IndexTable { path: path.to_string(), entries })
}

fn read_whitespace_rows(path: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() { continue; }
        rows.push((i + 1, line.split_whitespace().map(str::to_string).collect()));
    }
    Ok(rows)
}

fn read_csv_rows(path: &str) -> Result<Vec<(usize, Vec<String>)>> {
    let mut rdr = ReaderBuilder::new().has_headers(false).flexible(true).comment(Some(b'#')).from_path(path)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let rec = result?;
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        let fields: Vec<String> = rec.iter().map(|f| f.trim().to_string()).collect();
        if fields.iter().all(|f| f.is_empty()) { continue; }
        rows.push((line, fields));
    }
    Ok(rows)
}

fn parse_entry(path: &str, line: usize, fields: &[String]) -> Result<IndexEntry> {
    if fields.len() < 3 {
        return Err(config_error(path, line, &format!("expected at least 3 fields, found {}", fields.len())));
    }
    let (name, a, b) = (&fields[0], &fields[1], &fields[2]);
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(config_error(path, line, &format!("'{}' is not a usable bucket name", name)));
    }
    if a.is_empty() || b.is_empty() {
        return Err(config_error(path, line, "index sequences must not be empty"));
    }
    Ok(IndexEntry::new(name, a, b))
}

fn config_error(path: &str, line: usize, reason: &str) -> DemuxError {
    DemuxError::Config { path: path.to_string(), line, reason: reason.to_string() }
}
