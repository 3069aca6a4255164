use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a pagescope.toml (defaults to ./pagescope.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count accesses per address in a vector database log
    Count {
        /// Server log to mine
        #[arg(short, long)]
        log: PathBuf,

        /// Stop after this many queries
        #[arg(short, long)]
        query_limit: Option<i64>,

        /// Where to write the ranked access table
        #[arg(short, long, default_value = "access_count_sorted.csv")]
        output: PathBuf,
    },

    /// Simulate how the hot addresses pack into memory pages
    Pages {
        /// Access table written by `count`
        #[arg(long)]
        csv: PathBuf,

        /// Minimum number of accesses to consider an address
        #[arg(short, long)]
        access_threshold: Option<i64>,

        /// Size of a single record in bytes
        #[arg(long)]
        record_size: Option<i64>,

        /// Size of a page in bytes
        #[arg(long)]
        page_size: Option<i64>,

        /// Fail on the first malformed address instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Where to write the usage histogram
        #[arg(short, long, default_value = "access_count_page.log")]
        output: PathBuf,

        /// Print the full report as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Summarise the access distribution of an access table
    Cdf {
        /// Access table written by `count`
        #[arg(long)]
        csv: PathBuf,

        /// Percentage of all accesses to find the hottest addresses for
        #[arg(short, long)]
        portion: Option<f64>,

        /// Draw the CDF in the terminal
        #[arg(long)]
        plot: bool,
    },

    /// Generate a Zipf/Poisson query schedule for load replay
    Schedule {
        /// Number of query embeddings in the dataset
        #[arg(short, long)]
        dataset_len: i64,

        /// Target requests per second
        #[arg(short, long)]
        rate: Option<f64>,

        /// Total number of requests
        #[arg(short = 'n', long)]
        requests: Option<i64>,

        /// Number of request generators (defaults to the number of CPUs)
        #[arg(short, long)]
        workers: Option<i64>,

        /// Seed for the request generators, worker n uses seed + n
        #[arg(short, long)]
        seed: Option<u64>,

        /// Exponent of the Zipf rank distribution, must be greater than 1
        #[arg(long)]
        zipf_exponent: Option<f64>,

        /// Where to write the schedule
        #[arg(short, long, default_value = "query_schedule.csv")]
        output: PathBuf,
    },

    /// Write an example pagescope.toml
    Init {
        /// Where to write the example config
        #[arg(short, long, default_value = "pagescope.toml")]
        path: PathBuf,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
