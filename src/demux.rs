use std::fs::File;
use std::io::{Read, Write};
use std::sync::OnceLock;

use flate2::read::MultiGzDecoder;
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_file;

use crate::align::ApproximateMatcher;
use crate::error::{DemuxError, Result};
use crate::index::{IndexEntry, IndexTable, MismatchBudget};

pub const UNMATCHED: &str = "unmatched";
pub const AMBIGUOUS: &str = "ambiguous";

/// A configured sample with its matcher, built on first use.
#[derive(Debug)]
pub struct Bucket {
    pub entry: IndexEntry,
    matcher: OnceLock<ApproximateMatcher>,
}

impl Bucket {
    pub fn new(entry: IndexEntry) -> Self {
        Self { entry, matcher: OnceLock::new() }
    }

    pub fn matcher(&self, budget: MismatchBudget) -> &ApproximateMatcher {
        self.matcher.get_or_init(|| {
            let matcher = ApproximateMatcher::new(&self.entry.index_a, &self.entry.index_b, budget);
            let (a, b) = matcher.aligners();
            log::debug!(
                "{}: index-a min overlap {} max error rate {:.3}, index-b min overlap {} max error rate {:.3}",
                self.entry.name,
                a.min_overlap(),
                a.max_error_rate(),
                b.min_overlap(),
                b.max_error_rate()
            );
            matcher
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Earliest bucket in table order wins.
    #[default]
    FirstMatch,
    /// Reads accepted by more than one bucket go to the ambiguous bucket.
    Separate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Bucket(usize),
    Unmatched,
    Ambiguous,
}

impl Destination {
    /// Output slot: configured buckets first, then unmatched, then ambiguous.
    pub fn slot(self, n_buckets: usize) -> usize {
        match self {
            Destination::Bucket(i) => i,
            Destination::Unmatched => n_buckets,
            Destination::Ambiguous => n_buckets + 1,
        }
    }
}

/// Splits the last `:` field of a read header into its two index sequences.
pub fn extract_index_pair(identifier: &[u8], separator: u8) -> Result<(&[u8], &[u8])> {
    let malformed = |reason: &str| DemuxError::MalformedIdentifier {
        id: String::from_utf8_lossy(identifier).into_owned(),
        reason: reason.to_string(),
    };
    let tag = identifier.rsplit(|&c| c == b':').next().unwrap_or(identifier);
    let mut parts = tag.split(|&c| c == separator);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        (_, None, _) => Err(malformed(&format!("no '{}' in index tag", separator as char))),
        _ => Err(malformed(&format!("more than one '{}' in index tag", separator as char))),
    }
}

/// Picks one destination per read from the buckets in table order.
#[derive(Debug)]
pub struct BucketRouter {
    buckets: Vec<Bucket>,
    budget: MismatchBudget,
    separator: u8,
    policy: AmbiguityPolicy,
    lenient: bool,
}

impl BucketRouter {
    pub fn new(table: &IndexTable, budget: MismatchBudget) -> Self {
        Self {
            buckets: table.entries.iter().cloned().map(Bucket::new).collect(),
            budget,
            separator: b'+',
            policy: AmbiguityPolicy::FirstMatch,
            lenient: false,
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Malformed identifiers are routed to unmatched instead of failing.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Output names in slot order, synthetic buckets last.
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.iter().map(|b| b.entry.name.clone()).collect();
        names.push(UNMATCHED.to_string());
        if self.policy == AmbiguityPolicy::Separate { names.push(AMBIGUOUS.to_string()); }
        names
    }

    pub fn route(&self, read_a: &[u8], read_b: &[u8]) -> Destination {
        let read_a = read_a.to_ascii_uppercase();
        let read_b = read_b.to_ascii_uppercase();
        let mut hits = self.buckets.iter().enumerate().filter(|(_, b)| b.matcher(self.budget).matches(&read_a, &read_b));
        match (hits.next(), self.policy) {
            (None, _) => Destination::Unmatched,
            (Some((i, _)), AmbiguityPolicy::FirstMatch) => Destination::Bucket(i),
            (Some((i, _)), AmbiguityPolicy::Separate) => {
                if hits.next().is_some() { Destination::Ambiguous } else { Destination::Bucket(i) }
            }
        }
    }

    /// Extracts the index pair from a read header and routes it.
    pub fn classify(&self, identifier: &[u8]) -> Result<Destination> {
        match extract_index_pair(identifier, self.separator) {
            Ok((a, b)) => Ok(self.route(a, b)),
            Err(e) if self.lenient => {
                log::debug!("{}; routing to {}", e, UNMATCHED);
                Ok(Destination::Unmatched)
            }
            Err(e) => Err(e),
        }
    }
}

/// Owned copy of one FASTQ record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub head: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl ReadRecord {
    pub fn from_fastx(rec: &needletail::parser::SequenceRecord, phred: u8) -> Result<Self> {
        let head = rec.id().to_vec();
        let invalid = |reason: String| DemuxError::InvalidRecord { id: String::from_utf8_lossy(&head).into_owned(), reason };
        let qual = match rec.qual() {
            Some(q) => q.to_vec(),
            None => return Err(invalid("no quality string".to_string())),
        };
        if let Some(&q) = qual.iter().find(|&&q| q < phred) {
            return Err(invalid(format!("quality character '{}' is below phred offset {}", q as char, phred)));
        }
        Ok(Self { head, seq: rec.seq().to_vec(), qual })
    }
}

pub fn write_fastq_record(w: &mut dyn Write, name: &[u8], seq: &[u8], qual: &[u8]) -> Result<()> {
    w.write_all(b"@")?;
    w.write_all(name)?;
    w.write_all(b"\n")?;
    w.write_all(seq)?;
    w.write_all(b"\n+\n")?;
    w.write_all(qual)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// `None` when the input holds no records, plain or gzip compressed.
pub fn open_fastx(path: &str) -> Result<Option<Box<dyn needletail::FastxReader>>> {
    match parse_fastx_file(path) {
        Ok(reader) => Ok(Some(reader)),
        Err(e) if e.kind == ParseErrorKind::EmptyFile => Ok(None),
        Err(e) if e.kind == ParseErrorKind::Io && decompresses_to_nothing(path) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn decompresses_to_nothing(path: &str) -> bool {
    let mut first = [0u8; 1];
    File::open(path).map(|f| matches!(MultiGzDecoder::new(f).read(&mut first), Ok(0))).unwrap_or(false)
}
