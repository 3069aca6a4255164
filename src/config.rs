use crate::{
    access_log::{LogMiner, QUERY_LIMIT, QUERY_MARKER},
    distribution::COVERAGE_PERCENT,
    error::ConfigError,
    load_schedule::{ScheduleParams, SEED, ZIPF_EXPONENT},
    page_usage::{
        MalformedAddressPolicy, SimulationParams, ACCESS_THRESHOLD, PAGE_SIZE, RECORD_SIZE,
    },
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::Path,
};
use tracing::debug;

static EXAMPLE_CONFIG: &str = include_str!("templates/pagescope.toml");

pub const DEFAULT_CONFIG_PATH: &str = "pagescope.toml";

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub log: LogConfig,
    pub distribution: DistributionConfig,
    pub schedule: ScheduleConfig,
}
impl Config {
    pub fn write_example_to_file(path: &Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)
            .context(format!("Unable to create {}", path.to_string_lossy()))?;
        file.write_all(EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let mut config_str = String::new();
        fs::File::open(path)
            .context(format!("Unable to open config {}", path.to_string_lossy()))?
            .read_to_string(&mut config_str)?;
        Config::try_from_str(&config_str)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        toml::from_str::<Config>(conf_str).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))
    }

    /// Loads the config at `path` if one was given, otherwise `pagescope.toml` in the working
    /// directory if it exists, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) => Config::try_from_path(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Config::try_from_path(default_path)
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Ok(Config::default())
                }
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    pub page_size: i64,
    pub record_size: i64,
    pub access_threshold: i64,
    pub malformed: MalformedAddressPolicy,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE as i64,
            record_size: RECORD_SIZE as i64,
            access_threshold: ACCESS_THRESHOLD as i64,
            malformed: MalformedAddressPolicy::Skip,
        }
    }
}
impl TryFrom<&SimulationConfig> for SimulationParams {
    type Error = ConfigError;

    fn try_from(conf: &SimulationConfig) -> Result<Self, Self::Error> {
        Ok(
            SimulationParams::new(conf.page_size, conf.record_size, conf.access_threshold)?
                .with_policy(conf.malformed),
        )
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct LogConfig {
    pub query_limit: i64,
    pub query_marker: String,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self {
            query_limit: QUERY_LIMIT as i64,
            query_marker: QUERY_MARKER.to_string(),
        }
    }
}
impl TryFrom<&LogConfig> for LogMiner {
    type Error = ConfigError;

    fn try_from(conf: &LogConfig) -> Result<Self, Self::Error> {
        LogMiner::new(&conf.query_marker, conf.query_limit)
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DistributionConfig {
    pub coverage_percent: f64,
}
impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            coverage_percent: COVERAGE_PERCENT,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub rate: f64,
    pub requests: i64,
    pub zipf_exponent: f64,
    pub workers: Option<i64>,
    pub seed: u64,
}
impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            rate: 100.0,
            requests: 10_000,
            zipf_exponent: ZIPF_EXPONENT,
            workers: None,
            seed: SEED,
        }
    }
}
impl ScheduleConfig {
    /// Builds schedule params for a dataset of `dataset_len` embeddings. Without an explicit
    /// worker count one worker per CPU is used.
    pub fn params(&self, dataset_len: i64) -> Result<ScheduleParams, ConfigError> {
        let workers = self.workers.unwrap_or(num_cpus::get() as i64);
        ScheduleParams::new(
            self.rate,
            self.requests,
            dataset_len,
            self.zipf_exponent,
            workers,
            self.seed,
        )
    }
}
