use std::error::Error;
use std::path::PathBuf;
use std::process;

use log::{error, info, LevelFilter};
use structopt::StructOpt;

use diurnal::error::ShardErrorKind;
use diurnal::inout::Metric;
use diurnal::shard::{self, ShardConfig};

#[derive(Clone, Debug, StructOpt)]
#[structopt(
    name = "shard",
    about = "Analyze a bunch of data for diurnal signals.",
    rename_all = "kebab-case"
)]
struct Opt {
    #[structopt(long, parse(from_os_str))]
    /// The input CSV file
    input: PathBuf,
    #[structopt(long, default_value = "24")]
    /// Buckets per day
    size: u32,
    #[structopt(long, default_value = "1")]
    /// Keep one of every COUNT rows
    downsample: usize,
    #[structopt(long, default_value = "8")]
    /// IP mask width
    width: u8,
    #[structopt(long, default_value = "download_mbps")]
    /// Measurement column to score
    metric: Metric,
    #[structopt(long)]
    /// Print one line per block found
    verbose: bool,
}

impl Opt {
    fn config(&self) -> ShardConfig {
        ShardConfig {
            bucket_count: self.size,
            width: self.width,
            downsample: self.downsample,
            metric: self.metric,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opt::from_args();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if opts.verbose {
        builder.filter_level(LevelFilter::Info);
    }
    builder.init();

    match shard::run(&opts.input, &opts.config()) {
        Ok(report) => {
            info!("{} rows in {} blocks", report.rows, report.blocks);
            Ok(())
        }
        Err(e) if e.kind == ShardErrorKind::InputExtension => {
            eprintln!("{}", e.message);
            process::exit(2);
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
