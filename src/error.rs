use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemuxError>;

#[derive(Error, Debug)]
pub enum DemuxError {
    /// Malformed line or content in the index table
    #[error("Invalid index table '{path}' line {line}: {reason}")]
    Config {
        path: String,
        line: usize,
        reason: String,
    },

    /// Two buckets would write to the same output file
    #[error("Duplicate bucket name '{name}' in '{path}' line {line}")]
    DuplicateBucketName {
        name: String,
        path: String,
        line: usize,
    },

    /// Read header without a usable index tag
    #[error("Malformed read identifier '{id}': {reason}")]
    MalformedIdentifier {
        id: String,
        reason: String,
    },

    /// Output file could not be created
    #[error("Cannot open output '{}': {source}", path.display())]
    OutputOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mismatch spec that is neither `n` nor `a,b`
    #[error("Invalid mismatch spec '{0}': expected a non-negative integer or 'a,b'")]
    InvalidMismatch(String),

    /// FASTQ record the pipeline cannot pass through
    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord {
        id: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FASTQ parse error: {0}")]
    Parse(#[from] needletail::errors::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
