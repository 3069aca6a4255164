pub mod access_log;
pub mod access_table;
pub mod address;
pub mod clap_args;
pub mod config;
pub mod distribution;
pub mod error;
pub mod load_schedule;
pub mod page_usage;
pub mod summary;

use access_log::{AccessLogSummary, LogMiner};
use access_table::AccessTable;
use anyhow::Context;
use distribution::Coverage;
use load_schedule::{ScheduleParams, ScheduledRequest};
use page_usage::{PageUsageSimulator, SimulationParams, SimulationReport};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};
use tracing::info;

/// Mines a server log for record accesses and writes the ranked access table to `output`.
///
/// # Arguments
///
/// * miner - Log miner holding the query marker and limit
/// * log - The server log to read
/// * output - Where to write the CSV
///
/// # Returns
///
/// The summary of everything that was found in the log
pub fn count(miner: &LogMiner, log: &Path, output: &Path) -> anyhow::Result<AccessLogSummary> {
    let file = File::open(log).context(format!("Unable to open log {}", log.to_string_lossy()))?;
    info!("Mining {}", log.to_string_lossy());

    let summary = miner.mine(BufReader::new(file))?;

    let out = File::create(output)
        .context(format!("Unable to create {}", output.to_string_lossy()))?;
    summary.write_csv(BufWriter::new(out))?;
    info!("Results saved to {}", output.to_string_lossy());

    Ok(summary)
}

/// Runs the page usage simulation over an access table and writes the histogram to `output`.
pub fn pages(
    params: SimulationParams,
    csv: &Path,
    output: &Path,
) -> anyhow::Result<SimulationReport> {
    let table = AccessTable::try_from_path(csv)
        .context(format!("Unable to read access table {}", csv.to_string_lossy()))?;

    let simulator = PageUsageSimulator::new(params);
    let report = simulator.run(table.address_counts())?;

    let out = File::create(output)
        .context(format!("Unable to create {}", output.to_string_lossy()))?;
    access_table::write_histogram(&report.histogram, BufWriter::new(out))?;
    info!("Results saved to {}", output.to_string_lossy());

    Ok(report)
}

/// CDF points, coverage and number of rows of an access table.
pub struct DistributionSummary {
    pub cdf: Vec<(f64, f64)>,
    pub coverage: Option<Coverage>,
    pub addresses: usize,
}

pub fn summarise_distribution(csv: &Path, portion: f64) -> anyhow::Result<DistributionSummary> {
    let table = AccessTable::try_from_path(csv)
        .context(format!("Unable to read access table {}", csv.to_string_lossy()))?;
    let counts = table.counts();

    Ok(DistributionSummary {
        cdf: distribution::cdf(&counts),
        coverage: distribution::coverage(&counts, portion)?,
        addresses: table.len(),
    })
}

/// Generates a query schedule and writes it to `output`.
pub fn schedule(params: &ScheduleParams, output: &Path) -> anyhow::Result<Vec<ScheduledRequest>> {
    let schedule = load_schedule::generate(params)?;

    let out = File::create(output)
        .context(format!("Unable to create {}", output.to_string_lossy()))?;
    load_schedule::write_csv(&schedule, BufWriter::new(out))?;
    info!(
        "{} requests scheduled, saved to {}",
        schedule.len(),
        output.to_string_lossy()
    );

    Ok(schedule)
}
