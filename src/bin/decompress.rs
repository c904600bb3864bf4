//! Command-line decompressor: reads an artifact from stdin, writes the original
//! bytes to stdout.

use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "decompress")]
#[command(about = "Decompress a Context Tree Weighting artifact from stdin")]
struct Args {
    /// Depth of the context tree; must match the depth used for compression.
    #[arg(long, default_value_t = 48)]
    depth: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let mut sink = io::BufWriter::new(stdout);
    contexture::frame::decompress(&mut sink, io::BufReader::new(stdin), args.depth)
        .context("decompressing stdin")?;
    sink.flush().context("flushing stdout")?;
    Ok(())
}
