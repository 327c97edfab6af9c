use std::path::PathBuf;

use clap::Parser;
use gallery::decode::THUMBNAIL_SIZE;
use splitter::{SplitOptions, split_albums};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory of album folders holding GIFs
    input: PathBuf,

    /// Where the split albums are written
    output: PathBuf,

    #[arg(long, default_value_t = THUMBNAIL_SIZE)]
    thumbnail_size: u32,

    /// Also pack every album into `<output>/<album>.zip`
    #[arg(long)]
    zip: bool,
}

fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let options = SplitOptions {
        thumbnail_size: args.thumbnail_size,
        zip: args.zip,
    };

    split_albums(&args.input, &args.output, &options)?;

    Ok(())
}
