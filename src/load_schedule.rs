use crate::error::ConfigError;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Zeta};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, warn};

pub const ZIPF_EXPONENT: f64 = 1.2;
pub const SEED: u64 = 42;
pub const MAX_REQUESTS: i64 = 100_000_000;

const MAX_RESERVED: usize = 1 << 20;

/// Parameters of a Zipf/Poisson query workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleParams {
    rate: f64,
    requests: u64,
    dataset_len: usize,
    zipf_exponent: f64,
    workers: usize,
    seed: u64,
}
impl ScheduleParams {
    /// # Arguments
    ///
    /// * rate - target requests per second across all workers
    /// * requests - total number of requests across all workers
    /// * dataset_len - number of query embeddings to pick from
    /// * workers - number of independent request generators
    pub fn new(
        rate: f64,
        requests: i64,
        dataset_len: i64,
        zipf_exponent: f64,
        workers: i64,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let positive = |name, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NotPositive { name, value })
            }
        };
        positive("rate", rate)?;
        positive("requests", requests as f64)?;
        positive("dataset length", dataset_len as f64)?;
        positive("workers", workers as f64)?;

        // zeta is only defined for exponents above 1
        if !(zipf_exponent.is_finite() && zipf_exponent > 1.0) {
            return Err(ConfigError::InvalidZipfExponent(zipf_exponent));
        }
        if requests > MAX_REQUESTS {
            return Err(ConfigError::TooManyRequests {
                requests,
                max: MAX_REQUESTS,
            });
        }

        if requests < workers {
            warn!(
                "{} requests can't be shared across {} workers, some workers will stay idle",
                requests, workers
            );
        }

        Ok(Self {
            rate,
            requests: requests as u64,
            dataset_len: dataset_len as usize,
            zipf_exponent,
            workers: workers as usize,
            seed,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn rate_per_worker(&self) -> f64 {
        self.rate / self.workers as f64
    }

    /// Requests are split evenly, any remainder is dropped.
    pub fn requests_per_worker(&self) -> u64 {
        self.requests / self.workers as u64
    }
}

/// A single query in the schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledRequest {
    pub worker: usize,
    pub seq: u64,
    /// Wait before sending, after the previous request of the same worker.
    pub delay_secs: f64,
    /// Time since the worker started.
    pub offset_secs: f64,
    /// Position of the query embedding in the dataset.
    pub index: usize,
}

/// Generates the full schedule, worker by worker. Each worker has its own RNG seeded with
/// `seed + worker`, so the same params always yield the same schedule.
pub fn generate(params: &ScheduleParams) -> Result<Vec<ScheduledRequest>, ConfigError> {
    let zeta = Zeta::new(params.zipf_exponent)
        .map_err(|_| ConfigError::InvalidZipfExponent(params.zipf_exponent))?;

    let rate = params.rate_per_worker();
    let per_worker = params.requests_per_worker();
    let total = (per_worker as usize).saturating_mul(params.workers);
    let mut schedule = Vec::with_capacity(total.min(MAX_RESERVED));

    for worker in 0..params.workers {
        let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(worker as u64));
        let mut offset_secs = 0.0;

        for seq in 0..per_worker {
            let delay_secs = poisson_delay(&mut rng, rate);
            offset_secs += delay_secs;

            // ranks start at 1 and are unbounded, huge ones saturate before the modulo
            let rank: f64 = zeta.sample(&mut rng);
            let index = (rank as u64 % params.dataset_len as u64) as usize;

            schedule.push(ScheduledRequest {
                worker,
                seq,
                delay_secs,
                offset_secs,
                index,
            });
        }
        debug!(
            "Worker {} scheduled {} requests over {:.2}s",
            worker, per_worker, offset_secs
        );
    }

    Ok(schedule)
}

/// Exponentially distributed wait for a Poisson arrival process with the given rate.
fn poisson_delay<R: Rng>(rng: &mut R, rate: f64) -> f64 {
    let u: f64 = rng.gen();
    -(1.0 - u).ln() / rate
}

/// Requests per second actually achieved, given the send time of every request in seconds.
///
/// Returns `None` when there are fewer than two requests to measure between.
pub fn achieved_rps(request_times: &[f64]) -> Option<f64> {
    if request_times.len() < 2 {
        return None;
    }

    let mut times = request_times.to_vec();
    times.sort_by(f64::total_cmp);

    let duration = times[times.len() - 1] - times[0];
    if duration > 0.0 {
        Some(times.len() as f64 / duration)
    } else {
        Some(0.0)
    }
}

pub fn write_csv<W: Write>(schedule: &[ScheduledRequest], writer: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for request in schedule {
        writer.serialize(request)?;
    }
    writer.flush()?;
    Ok(())
}
