use anyhow::Context;
use colored::Colorize;
use pagescope::{
    access_log::LogMiner,
    clap_args::{self, Commands},
    config::Config,
    distribution,
    page_usage::{MalformedAddressPolicy, SimulationParams},
    summary,
};
use tracing::{subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = clap_args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    init_subscriber(get_subscriber(level.into()))?;

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Commands::Count {
            log,
            query_limit,
            output,
        } => {
            let mut log_conf = config.log.clone();
            if let Some(limit) = query_limit {
                log_conf.query_limit = limit;
            }
            let miner = LogMiner::try_from(&log_conf)?;

            let log_summary = pagescope::count(&miner, &log, &output)?;
            println!("{}", summary::render_log_summary(&log_summary));
        }

        Commands::Pages {
            csv,
            access_threshold,
            record_size,
            page_size,
            strict,
            output,
            json,
        } => {
            let mut sim_conf = config.simulation.clone();
            sim_conf.access_threshold = access_threshold.unwrap_or(sim_conf.access_threshold);
            sim_conf.record_size = record_size.unwrap_or(sim_conf.record_size);
            sim_conf.page_size = page_size.unwrap_or(sim_conf.page_size);
            if strict {
                sim_conf.malformed = MalformedAddressPolicy::Reject;
            }
            let params = SimulationParams::try_from(&sim_conf)?;

            let report = pagescope::pages(params, &csv, &output)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", summary::render_simulation(&report));
            }
        }

        Commands::Cdf { csv, portion, plot } => {
            let portion = portion.unwrap_or(config.distribution.coverage_percent);
            let dist = pagescope::summarise_distribution(&csv, portion)?;

            println!(
                "{}",
                summary::render_coverage(dist.coverage.as_ref(), dist.addresses)
            );
            if plot {
                distribution::plot_cdf(&dist.cdf);
            }
        }

        Commands::Schedule {
            dataset_len,
            rate,
            requests,
            workers,
            seed,
            zipf_exponent,
            output,
        } => {
            let mut sched_conf = config.schedule.clone();
            sched_conf.rate = rate.unwrap_or(sched_conf.rate);
            sched_conf.requests = requests.unwrap_or(sched_conf.requests);
            sched_conf.workers = workers.or(sched_conf.workers);
            sched_conf.seed = seed.unwrap_or(sched_conf.seed);
            sched_conf.zipf_exponent = zipf_exponent.unwrap_or(sched_conf.zipf_exponent);
            let params = sched_conf.params(dataset_len)?;

            let schedule = pagescope::schedule(&params, &output)?;
            println!("{}", summary::render_schedule(&params, &schedule));
        }

        Commands::Init { path } => {
            if let Err(err) = Config::write_example_to_file(&path) {
                eprintln!("{}", "Error creating config.".red());
                return Err(err);
            }
            println!("{}", format!("{} created!", path.to_string_lossy()).green());
        }
    }

    Ok(())
}

fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> anyhow::Result<()> {
    set_global_default(subscriber).context("Failed to set subscriber")
}
