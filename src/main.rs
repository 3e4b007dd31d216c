use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use one_brc::config::{available_workers, DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY};
use one_brc::{run, PipelineConfig, ReadMode};

#[derive(Debug, Parser)]
#[command(version, about = "Min/mean/max per key over a large `key;value` file")]
struct Args {
    /// Input file of `<key>;<value>` lines.
    path: PathBuf,

    /// Bytes per chunk before extending to the next line boundary.
    #[arg(long, env = "BRC_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Chunks buffered between the reader and the workers.
    #[arg(long, env = "BRC_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Parsing threads. Defaults to the available parallelism.
    #[arg(long, env = "BRC_WORKERS")]
    workers: Option<usize>,

    /// `streaming` or `mapped`.
    #[arg(long, env = "BRC_MODE", default_value = "streaming")]
    mode: ReadMode,

    /// Exit with an error if any line was malformed.
    #[arg(long)]
    strict: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = PipelineConfig::default()
        .with_block_size(args.block_size)
        .with_queue_capacity(args.queue_capacity)
        .with_workers(args.workers.unwrap_or_else(available_workers))
        .with_mode(args.mode)
        .with_strict(args.strict);

    let start = Instant::now();
    let report = run(&args.path, &config)
        .with_context(|| format!("aggregating {}", args.path.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    writeln!(out, "{report}")?;
    out.flush()?;
    log::info!("finished in {:.3} seconds", start.elapsed().as_secs_f64());
    Ok(())
}
