use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};

use crate::demux::{write_fastq_record, ReadRecord};
use crate::error::{DemuxError, Result};

pub enum OutputStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputStream {
    pub fn create(path: &Path, gz: bool) -> io::Result<Self> {
        let f = File::create(path)?;
        Ok(if gz { OutputStream::Gzip(GzEncoder::new(BufWriter::new(f), Compression::default())) } else { OutputStream::Plain(BufWriter::new(f)) })
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputStream::Plain(mut w) => w.flush(),
            OutputStream::Gzip(gz) => gz.finish()?.flush(),
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::Plain(w) => w.write(buf),
            OutputStream::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::Plain(w) => w.flush(),
            OutputStream::Gzip(w) => w.flush(),
        }
    }
}

struct BucketOutput {
    name: String,
    path: PathBuf,
    stream: Option<OutputStream>,
    records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    pub path: PathBuf,
    pub records: u64,
}

/// Owns one output stream per bucket, in slot order.
pub struct OutputBuckets {
    outputs: Vec<BucketOutput>,
}

impl OutputBuckets {
    /// Creates `<dir>/<name><suffix>` for every name, closing what was opened if one fails.
    pub fn open_all(names: &[String], dir: &Path, suffix: &str) -> Result<Self> {
        let gz = suffix.ends_with(".gz");
        let mut buckets = OutputBuckets { outputs: Vec::with_capacity(names.len()) };
        for name in names {
            let path = dir.join(format!("{}{}", name, suffix));
            match OutputStream::create(&path, gz) {
                Ok(stream) => {
                    info!("bucket {} will be written to {}", name, path.display());
                    buckets.outputs.push(BucketOutput { name: name.clone(), path, stream: Some(stream), records: 0 });
                }
                Err(source) => {
                    buckets.close_quietly();
                    return Err(DemuxError::OutputOpen { path, source });
                }
            }
        }
        Ok(buckets)
    }

    pub fn slots(&self) -> usize {
        self.outputs.len()
    }

    pub fn write(&mut self, slot: usize, rec: &ReadRecord) -> Result<()> {
        let out = self.outputs.get_mut(slot).ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no output bucket in slot {}", slot)))?;
        let stream = out.stream.as_mut().ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, format!("output for {} is already closed", out.name)))?;
        write_fastq_record(stream, &rec.head, &rec.seq, &rec.qual)?;
        out.records += 1;
        Ok(())
    }

    /// Finishes every open stream; repeated calls only report counts.
    pub fn close_all(&mut self) -> Result<Vec<BucketSummary>> {
        let mut first_err: Option<DemuxError> = None;
        for out in self.outputs.iter_mut() {
            if let Some(stream) = out.stream.take() {
                if out.records == 0 {
                    warn!("bucket {} did not receive any reads", out.name);
                }
                if let Err(e) = stream.finish() {
                    first_err.get_or_insert(DemuxError::Io(e));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(self.summary()),
        }
    }

    pub fn summary(&self) -> Vec<BucketSummary> {
        self.outputs.iter().map(|o| BucketSummary { name: o.name.clone(), path: o.path.clone(), records: o.records }).collect()
    }

    fn close_quietly(&mut self) {
        for out in self.outputs.iter_mut() {
            if let Some(stream) = out.stream.take() {
                if let Err(e) = stream.finish() { warn!("failed to close {}: {}", out.path.display(), e); }
            }
        }
    }
}

impl Drop for OutputBuckets {
    fn drop(&mut self) {
        self.close_quietly();
    }
}
