use log::warn;
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::demux::{open_fastx, BucketRouter, Destination, ReadRecord};
use crate::error::Result;
use crate::output::OutputBuckets;

pub const CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub total: u64,
    pub per_slot: Vec<u64>,
}

impl PipelineStats {
    fn new(slots: usize) -> Self {
        Self { total: 0, per_slot: vec![0; slots] }
    }
}

/// Reads `input` once and appends every record to the output slot its header routes to.
///
/// Records are classified in chunks on `pool` and written back in input order, so each bucket sees
/// reads in arrival order and only this function ever writes to `outputs`.
pub fn process_all(input: &str, router: &BucketRouter, outputs: &mut OutputBuckets, phred: u8, pool: &ThreadPool) -> Result<PipelineStats> {
    let n_buckets = router.buckets().len();
    let mut stats = PipelineStats::new(outputs.slots());
    let mut reader = match open_fastx(input)? {
        Some(reader) => reader,
        None => {
            warn!("input {} contains no reads", input);
            return Ok(stats);
        }
    };
    let mut chunk: Vec<ReadRecord> = Vec::with_capacity(CHUNK_SIZE);
    while let Some(rec) = reader.next() {
        chunk.push(ReadRecord::from_fastx(&rec?, phred)?);
        if chunk.len() >= CHUNK_SIZE {
            flush_chunk(&chunk, router, outputs, n_buckets, pool, &mut stats)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        flush_chunk(&chunk, router, outputs, n_buckets, pool, &mut stats)?;
    }
    Ok(stats)
}

fn flush_chunk(
    chunk: &[ReadRecord],
    router: &BucketRouter,
    outputs: &mut OutputBuckets,
    n_buckets: usize,
    pool: &ThreadPool,
    stats: &mut PipelineStats,
) -> Result<()> {
    let dests = pool.install(|| chunk.par_iter().map(|r| router.classify(&r.head)).collect::<Result<Vec<Destination>>>())?;
    for (rec, dest) in chunk.iter().zip(dests) {
        let slot = dest.slot(n_buckets);
        outputs.write(slot, rec)?;
        stats.total += 1;
        stats.per_slot[slot] += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexEntry, IndexTable, MismatchBudget};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rayon::ThreadPoolBuilder;
    use std::fs;
    use std::io::Write;

    fn write_reads(path: &std::path::Path, tags: &[&str]) {
        let mut f = fs::File::create(path).unwrap();
        for (i, tag) in tags.iter().enumerate() {
            writeln!(f, "@r{} 1:N:0:{}", i, tag).unwrap();
            writeln!(f, "ACGTACGT").unwrap();
            writeln!(f, "+").unwrap();
            writeln!(f, "IIIIIIII").unwrap();
        }
    }

    fn router() -> BucketRouter {
        let table = IndexTable {
            path: "test".to_string(),
            entries: vec![IndexEntry::new("S1", "AAAA", "CCCC"), IndexEntry::new("S2", "AAAA", "CCCG")],
        };
        BucketRouter::new(&table, MismatchBudget::new(1, 1))
    }

    #[test]
    fn test_process_all_counts_every_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fq");
        let mut tags = vec!["AAAA+CCCC", "AAAA+CCCT", "GGGG+GGGG", "AAAA+CCCG"];
        tags.extend(std::iter::repeat("TTTT+CCCC").take(CHUNK_SIZE));
        write_reads(&input, &tags);
        let router = router();
        let mut outputs = OutputBuckets::open_all(&router.output_names(), dir.path(), ".fq").unwrap();
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let stats = process_all(input.to_str().unwrap(), &router, &mut outputs, 33, &pool).unwrap();
        let summary = outputs.close_all().unwrap();
        assert_eq!(stats.total, tags.len() as u64);
        assert_eq!(stats.per_slot, vec![3, 0, CHUNK_SIZE as u64 + 1]);
        assert_eq!(summary.iter().map(|s| s.records).collect::<Vec<_>>(), stats.per_slot);
        let s1 = fs::read_to_string(dir.path().join("S1.fq")).unwrap();
        let heads: Vec<&str> = s1.lines().step_by(4).collect();
        assert_eq!(heads, vec!["@r0 1:N:0:AAAA+CCCC", "@r1 1:N:0:AAAA+CCCT", "@r3 1:N:0:AAAA+CCCG"]);
    }

    #[test]
    fn test_empty_gzip_input_is_a_normal_pass() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fq.gz");
        GzEncoder::new(fs::File::create(&input).unwrap(), Compression::default()).finish().unwrap();
        let router = router();
        let mut outputs = OutputBuckets::open_all(&router.output_names(), dir.path(), ".fq").unwrap();
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let stats = process_all(input.to_str().unwrap(), &router, &mut outputs, 33, &pool).unwrap();
        assert_eq!(stats, PipelineStats { total: 0, per_slot: vec![0, 0, 0] });
        assert!(outputs.close_all().unwrap().iter().all(|s| s.records == 0));
    }

    #[test]
    fn test_phred_offset_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.fq");
        fs::write(&input, "@r0 1:N:0:AAAA+CCCC\nACGT\n+\nII#I\n").unwrap();
        let router = router();
        let mut outputs = OutputBuckets::open_all(&router.output_names(), dir.path(), ".fq").unwrap();
        let pool = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let err = process_all(input.to_str().unwrap(), &router, &mut outputs, 64, &pool).unwrap_err();
        assert!(matches!(err, crate::error::DemuxError::InvalidRecord { .. }));
    }
}
