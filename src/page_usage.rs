use crate::{
    address::{parse_address, AddressRecord},
    error::{AddressError, ConfigError},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const PAGE_SIZE: u64 = 4096;
pub const RECORD_SIZE: u64 = 1536; // one stored vector entry
pub const ACCESS_THRESHOLD: u64 = 200;

/// What to do with an address that can't be parsed or placed.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MalformedAddressPolicy {
    /// Leave the address out of the simulation and report it in [`SimulationReport::skipped`].
    #[default]
    Skip,
    /// Abort the simulation on the first malformed address.
    Reject,
}
impl std::str::FromStr for MalformedAddressPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(MalformedAddressPolicy::Skip),
            "reject" => Ok(MalformedAddressPolicy::Reject),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Validated simulation parameters. The only way to build one is through [`SimulationParams::new`]
/// (or the `TryFrom` conversion in the config module), so a simulator never sees a record that
/// could span more than two pages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationParams {
    page_size: u64,
    record_size: u64,
    access_threshold: u64,
    malformed: MalformedAddressPolicy,
}
impl SimulationParams {
    pub fn new(
        page_size: i64,
        record_size: i64,
        access_threshold: i64,
    ) -> Result<Self, ConfigError> {
        if page_size <= 0 {
            return Err(ConfigError::InvalidPageSize(page_size));
        }
        if record_size <= 0 {
            return Err(ConfigError::InvalidRecordSize(record_size));
        }
        if access_threshold < 0 {
            return Err(ConfigError::InvalidAccessThreshold(access_threshold));
        }

        let (page_size, record_size) = (page_size as u64, record_size as u64);
        if record_size >= page_size {
            return Err(ConfigError::RecordSpansPages {
                record_size,
                page_size,
            });
        }

        Ok(Self {
            page_size,
            record_size,
            access_threshold: access_threshold as u64,
            malformed: MalformedAddressPolicy::default(),
        })
    }

    pub fn with_policy(mut self, malformed: MalformedAddressPolicy) -> Self {
        self.malformed = malformed;
        self
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn record_size(&self) -> u64 {
        self.record_size
    }

    pub fn access_threshold(&self) -> u64 {
        self.access_threshold
    }

    pub fn malformed(&self) -> MalformedAddressPolicy {
        self.malformed
    }
}
impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            record_size: RECORD_SIZE,
            access_threshold: ACCESS_THRESHOLD,
            malformed: MalformedAddressPolicy::Skip,
        }
    }
}

/// Where the bytes of a single record land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Single {
        page: u64,
        bytes: u64,
    },
    Split {
        start_page: u64,
        start_bytes: u64,
        end_page: u64,
        end_bytes: u64,
    },
}
impl Placement {
    pub fn pages(&self) -> Vec<(u64, u64)> {
        match *self {
            Placement::Single { page, bytes } => vec![(page, bytes)],
            Placement::Split {
                start_page,
                start_bytes,
                end_page,
                end_bytes,
            } => vec![(start_page, start_bytes), (end_page, end_bytes)],
        }
    }
}

/// Bytes occupied per page, keyed by page base address.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct PageUsage(BTreeMap<u64, u64>);
impl PageUsage {
    fn add(&mut self, page: u64, bytes: u64) {
        *self.0.entry(page).or_insert(0) += bytes;
    }

    pub fn get(&self, page: u64) -> Option<u64> {
        self.0.get(&page).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().map(|(page, bytes)| (*page, *bytes))
    }

    pub fn page_count(&self) -> usize {
        self.0.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.0.values().sum()
    }

    /// Groups pages by how many bytes they use.
    pub fn histogram(&self) -> UsageHistogram {
        let counts = self.0.values().copied().counts();
        UsageHistogram(
            counts
                .into_iter()
                .map(|(bytes, pages)| (bytes, pages as u64))
                .collect(),
        )
    }
}

/// Number of pages per bytes-used value, ascending by bytes used.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct UsageHistogram(BTreeMap<u64, u64>);
impl UsageHistogram {
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().map(|(bytes, pages)| (*bytes, *pages))
    }

    pub fn get(&self, bytes_used: u64) -> Option<u64> {
        self.0.get(&bytes_used).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn page_count(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.0.iter().map(|(bytes, pages)| bytes * pages).sum()
    }
}
impl FromIterator<(u64, u64)> for UsageHistogram {
    fn from_iter<T: IntoIterator<Item = (u64, u64)>>(iter: T) -> Self {
        UsageHistogram(iter.into_iter().collect())
    }
}

/// An address that met the access threshold but was left out of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAddress {
    pub text: String,
    pub access_count: u64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub params: SimulationParams,
    pub qualifying: Vec<AddressRecord>,
    pub skipped: Vec<SkippedAddress>,
    pub usage: PageUsage,
    pub histogram: UsageHistogram,
}

/// Packs fixed-size records into fixed-size pages and measures how full each page ends up.
#[derive(Debug, Clone, Default)]
pub struct PageUsageSimulator {
    params: SimulationParams,
}
impl PageUsageSimulator {
    pub fn new(params: SimulationParams) -> Self {
        Self { params }
    }

    /// Works out which page(s) a record starting at `address` occupies.
    pub fn place(&self, address: u64) -> Result<Placement, AddressError> {
        let page_size = self.params.page_size;
        let last_byte = address
            .checked_add(self.params.record_size - 1)
            .ok_or(AddressError::Overflow { address })?;

        let start_page = address / page_size * page_size;
        let end_page = last_byte / page_size * page_size;

        if start_page == end_page {
            Ok(Placement::Single {
                page: start_page,
                bytes: self.params.record_size,
            })
        } else {
            Ok(Placement::Split {
                start_page,
                start_bytes: page_size - (address - start_page),
                end_page,
                end_bytes: last_byte - end_page + 1,
            })
        }
    }

    /// Keeps the entries whose access count reaches the threshold and parses their addresses.
    ///
    /// Entries that fail to parse (or would run off the end of the address space) are handled
    /// according to the configured [`MalformedAddressPolicy`].
    pub fn filter<'a, I>(
        &self,
        entries: I,
    ) -> Result<(Vec<AddressRecord>, Vec<SkippedAddress>), AddressError>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut qualifying = vec![];
        let mut skipped = vec![];

        for (text, access_count) in entries {
            if access_count < self.params.access_threshold {
                continue;
            }

            let parsed = parse_address(text).and_then(|address| {
                self.place(address)?;
                Ok(address)
            });

            match parsed {
                Ok(address) => qualifying.push(AddressRecord::new(address, access_count)),
                Err(err) => match self.params.malformed {
                    MalformedAddressPolicy::Reject => return Err(err),
                    MalformedAddressPolicy::Skip => {
                        warn!("Skipping address {}: {}", text, err);
                        skipped.push(SkippedAddress {
                            text: text.to_string(),
                            access_count,
                            reason: err.to_string(),
                        });
                    }
                },
            }
        }

        Ok((qualifying, skipped))
    }

    /// Accumulates the bytes every record contributes to the page(s) it overlaps.
    pub fn page_usage(&self, records: &[AddressRecord]) -> Result<PageUsage, AddressError> {
        let mut usage = PageUsage::default();
        for record in records {
            for (page, bytes) in self.place(record.address())?.pages() {
                usage.add(page, bytes);
            }
        }

        Ok(usage)
    }

    pub fn run<'a, I>(&self, entries: I) -> Result<SimulationReport, AddressError>
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let (qualifying, skipped) = self.filter(entries)?;
        debug!(
            "{} addresses with access count >= {} ({} skipped)",
            qualifying.len(),
            self.params.access_threshold,
            skipped.len()
        );

        let usage = self.page_usage(&qualifying)?;
        let histogram = usage.histogram();

        Ok(SimulationReport {
            params: self.params,
            qualifying,
            skipped,
            usage,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(threshold: i64) -> anyhow::Result<PageUsageSimulator> {
        Ok(PageUsageSimulator::new(SimulationParams::new(
            4096, 1536, threshold,
        )?))
    }

    #[test]
    fn record_inside_a_page_uses_one_page() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        assert_eq!(
            sim.place(0x0000)?,
            Placement::Single {
                page: 0x0000,
                bytes: 1536
            }
        );

        // ends exactly on the page boundary
        assert_eq!(
            sim.place(4096 - 1536)?,
            Placement::Single {
                page: 0x0000,
                bytes: 1536
            }
        );
        Ok(())
    }

    #[test]
    fn record_across_boundary_is_split() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        assert_eq!(
            sim.place(0x0FFE)?,
            Placement::Split {
                start_page: 0x0000,
                start_bytes: 2,
                end_page: 0x1000,
                end_bytes: 1534,
            }
        );
        Ok(())
    }

    #[test]
    fn split_contributions_always_sum_to_record_size() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        for address in (0..3 * 4096).step_by(97) {
            let pages = sim.place(address)?.pages();
            assert!(pages.len() <= 2);
            assert_eq!(pages.iter().map(|(_, bytes)| bytes).sum::<u64>(), 1536);
        }
        Ok(())
    }

    #[test]
    fn records_in_same_page_accumulate() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        let report = sim.run([("0x0000", 1), ("0x0010", 1)])?;

        assert_eq!(report.usage.get(0x0000), Some(3072));
        assert_eq!(report.histogram.iter().collect::<Vec<_>>(), vec![(3072, 1)]);
        Ok(())
    }

    #[test]
    fn histogram_accounts_for_every_byte() -> anyhow::Result<()> {
        let sim = simulator(200)?;
        let entries = [
            ("0x0FFE", 500),
            ("0x0000", 250),
            ("0x2000", 200),
            ("0x2600", 199), // below threshold
            ("0x5A10", 9000),
        ];
        let report = sim.run(entries)?;

        assert_eq!(report.qualifying.len(), 4);
        assert_eq!(report.histogram.total_bytes(), 1536 * 4);
        assert_eq!(report.usage.total_bytes(), 1536 * 4);
        assert_eq!(report.histogram.page_count(), report.usage.page_count() as u64);
        Ok(())
    }

    #[test]
    fn raising_threshold_never_adds_addresses() -> anyhow::Result<()> {
        let entries = [
            ("0x10", 0),
            ("0x2000", 10),
            ("0x3000", 199),
            ("0x4000", 200),
            ("0x5000", 201),
            ("0x6000", 5000),
        ];

        let mut previous = usize::MAX;
        for threshold in [0, 1, 10, 199, 200, 201, 5000, 5001] {
            let (qualifying, _) = simulator(threshold)?.filter(entries)?;
            assert!(qualifying.len() <= previous);
            previous = qualifying.len();
        }
        assert_eq!(previous, 0);
        Ok(())
    }

    #[test]
    fn malformed_addresses_are_skipped_and_reported() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        let report = sim.run([("0x0000", 3), ("not-an-address", 7), ("0x1000", 1)])?;

        assert_eq!(report.qualifying.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].text, "not-an-address");
        assert_eq!(report.skipped[0].access_count, 7);
        assert_eq!(report.histogram.total_bytes(), 2 * 1536);
        Ok(())
    }

    #[test]
    fn malformed_below_threshold_is_not_reported() -> anyhow::Result<()> {
        let report = simulator(200)?.run([("garbage", 3)])?;
        assert!(report.skipped.is_empty());
        assert!(report.histogram.is_empty());
        Ok(())
    }

    #[test]
    fn reject_policy_aborts() -> anyhow::Result<()> {
        let params =
            SimulationParams::new(4096, 1536, 0)?.with_policy(MalformedAddressPolicy::Reject);
        let res = PageUsageSimulator::new(params).run([("0x0000", 1), ("zz", 1)]);
        assert_eq!(res.unwrap_err(), AddressError::NotHex("zz".to_string()));
        Ok(())
    }

    #[test]
    fn address_at_top_of_address_space_is_malformed() -> anyhow::Result<()> {
        let sim = simulator(0)?;
        assert!(sim.place(u64::MAX - 10).is_err());

        let report = sim.run([("0xffffffffffffffff", 1)])?;
        assert_eq!(report.skipped.len(), 1);
        Ok(())
    }

    #[test]
    fn invalid_params_fail_fast() {
        assert_eq!(
            SimulationParams::new(0, 1536, 200),
            Err(ConfigError::InvalidPageSize(0))
        );
        assert_eq!(
            SimulationParams::new(4096, -1, 200),
            Err(ConfigError::InvalidRecordSize(-1))
        );
        assert_eq!(
            SimulationParams::new(4096, 1536, -5),
            Err(ConfigError::InvalidAccessThreshold(-5))
        );
        assert_eq!(
            SimulationParams::new(4096, 4096, 200),
            Err(ConfigError::RecordSpansPages {
                record_size: 4096,
                page_size: 4096
            })
        );
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(
            "Skip".parse::<MalformedAddressPolicy>(),
            Ok(MalformedAddressPolicy::Skip)
        );
        assert_eq!(
            "REJECT".parse::<MalformedAddressPolicy>(),
            Ok(MalformedAddressPolicy::Reject)
        );
        assert!("ignore".parse::<MalformedAddressPolicy>().is_err());
    }
}
