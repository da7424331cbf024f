use clap::Parser;
use dualplex_rs::cli::{Args, run};
use env_logger::Env;

fn main() -> anyhow::Result<()> { env_logger::Builder::from_env(Env::default().default_filter_or("info")).init(); let args = Args::parse(); run(args) }
