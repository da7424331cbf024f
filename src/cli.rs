use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rayon::ThreadPoolBuilder;

use crate::demux::{AmbiguityPolicy, BucketRouter, AMBIGUOUS, UNMATCHED};
use crate::index::{read_index_table, MismatchBudget};
use crate::output::OutputBuckets;
use crate::pipeline::process_all;

/// Split a FASTQ file into one file per sample using the dual index tag at the end of each read
/// header (`...:<index-a>+<index-b>`).
#[derive(Parser, Debug, Clone)]
#[command(name = "dualplex_rs", version)]
pub struct Args {
    /// Input FASTQ, plain or gzip compressed.
    #[arg(short = 'i', long = "input")]
    pub input: String,
    /// Index table: `name index-a index-b` per line, whitespace separated (or comma separated for
    /// `.csv`); lines starting with `#` are skipped. Earlier lines win when budgets overlap.
    #[arg(short = 'x', long = "index-file")]
    pub index_file: String,
    /// Edit distance allowed on index a and b, e.g. `2,3`; a single number applies to both.
    #[arg(short = 'm', long = "mismatch", default_value = "2,2")]
    pub mismatch: MismatchBudget,
    /// Output directory, created if missing.
    #[arg(short = 'O', long = "outdir", default_value = "./")]
    pub outdir: String,
    /// Write gzip compressed `.fq.gz` files.
    #[arg(short = 'z', long = "gzip", default_value_t = false)]
    pub gzip: bool,
    /// Quality encoding offset, 33 or 64.
    #[arg(long = "phred", default_value_t = 33)]
    pub phred: u8,
    /// Separator between index a and index b in the read header.
    #[arg(long = "separator", default_value_t = '+')]
    pub separator: char,
    /// Route reads whose header has no index tag to the unmatched file instead of failing.
    #[arg(long = "lenient", default_value_t = false)]
    pub lenient: bool,
    /// Send reads matching more than one sample to `ambiguous` instead of the first match.
    #[arg(long = "ambiguous-bucket", default_value_t = false)]
    pub ambiguous_bucket: bool,
    /// Threads used to classify reads.
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub threads: usize,
}

pub fn run(args: Args) -> Result<()> {
    if args.phred != 33 && args.phred != 64 { bail!("phred offset must be 33 or 64, got {}", args.phred); }
    if !args.separator.is_ascii() || args.separator == ':' { bail!("separator must be a single ASCII character other than ':'"); }
    let policy = if args.ambiguous_bucket { AmbiguityPolicy::Separate } else { AmbiguityPolicy::FirstMatch };
    info!("mismatch threshold (index-a,index-b): {}", args.mismatch);

    info!("parsing index table {}", args.index_file);
    let table = read_index_table(&args.index_file)?;
    let reserved: &[&str] = if policy == AmbiguityPolicy::Separate { &[UNMATCHED, AMBIGUOUS] } else { &[UNMATCHED] };
    table.ensure_names_free(reserved)?;
    for entry in &table.entries { info!("sample {} uses index {}", entry.name, entry.tag()); }

    let out_dir = PathBuf::from(&args.outdir);
    if !out_dir.exists() { std::fs::create_dir_all(&out_dir).with_context(|| format!("creating output directory {}", out_dir.display()))?; }

    let router = BucketRouter::new(&table, args.mismatch).with_separator(args.separator as u8).with_policy(policy).lenient(args.lenient);
    let pool = ThreadPoolBuilder::new().num_threads(args.threads.max(1)).build()?;
    let suffix = if args.gzip { ".fq.gz" } else { ".fq" };
    let mut outputs = OutputBuckets::open_all(&router.output_names(), &out_dir, suffix)?;

    let processed = process_all(&args.input, &router, &mut outputs, args.phred, &pool);
    let closed = outputs.close_all();
    let stats = processed.with_context(|| format!("demultiplexing {}", args.input))?;
    let summary = closed?;
    info!("processed {} reads", stats.total);
    for bucket in &summary { info!("{}: {} reads -> {}", bucket.name, bucket.records, bucket.path.display()); }
    Ok(())
}
