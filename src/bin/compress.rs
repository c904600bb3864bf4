//! Command-line compressor: writes the compressed artifact to stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "compress")]
#[command(about = "Compress a file with Context Tree Weighting and arithmetic coding")]
struct Args {
    /// Depth of the context tree.
    #[arg(long, default_value_t = 48)]
    depth: usize,

    /// File to compress; the artifact is written to stdout.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    let stdout = io::stdout().lock();
    let mut sink = io::BufWriter::new(stdout);
    contexture::frame::compress(&mut sink, &args.path, args.depth)
        .with_context(|| format!("compressing {}", args.path.display()))?;
    sink.flush().context("flushing stdout")?;
    Ok(())
}
