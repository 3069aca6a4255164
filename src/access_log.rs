use crate::error::ConfigError;
use regex::Regex;
use serde::Serialize;
use std::{
    collections::HashMap,
    io::{BufRead, Write},
};
use tracing::{debug, info};

pub const QUERY_LIMIT: u64 = 10_000;
pub const QUERY_MARKER: &str = "/points/query";

const KEY_ADDRESS_PATTERN: &str = r"Key: (\d+), address: (0x[0-9a-fA-F]+)";
const PROGRESS_EVERY: u64 = 10;

/// Access count for a single (key, address) pair, ranked by popularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedAccess {
    #[serde(rename = "Rank")]
    pub rank: u64,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Access Count")]
    pub access_count: u64,
}

#[derive(Debug, Default)]
pub struct AccessLogSummary {
    pub accesses: Vec<RankedAccess>,
    pub total_lines: u64,
    pub key_lines: u64,
    pub unique_addresses: u64,
    pub query_count: u64,
}
impl AccessLogSummary {
    /// Writes the ranked accesses as CSV with the header `Rank,Key,Address,Access Count`.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for access in self.accesses.iter() {
            writer.serialize(access)?;
        }

        // serialize only emits a header alongside the first record
        if self.accesses.is_empty() {
            writer.write_record(["Rank", "Key", "Address", "Access Count"])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Scans vector database server logs for record accesses.
#[derive(Debug, Clone)]
pub struct LogMiner {
    pattern: Regex,
    query_marker: String,
    query_limit: u64,
}
impl LogMiner {
    pub fn new(query_marker: &str, query_limit: i64) -> Result<Self, ConfigError> {
        if query_limit <= 0 {
            return Err(ConfigError::InvalidQueryLimit(query_limit));
        }

        Ok(Self {
            pattern: Regex::new(KEY_ADDRESS_PATTERN).expect("key/address pattern is valid"),
            query_marker: query_marker.to_string(),
            query_limit: query_limit as u64,
        })
    }

    pub fn query_limit(&self) -> u64 {
        self.query_limit
    }

    /// Counts accesses per (key, address) pair until `query_limit` queries have been seen.
    ///
    /// The line carrying the query that reaches the limit ends the scan before it is checked for
    /// a key.
    pub fn mine<R: BufRead>(&self, reader: R) -> anyhow::Result<AccessLogSummary> {
        // (key, address) -> (count, first seen)
        let mut counts: HashMap<(String, String), (u64, usize)> = HashMap::new();
        let mut summary = AccessLogSummary::default();

        for line in reader.lines() {
            let line = line?;
            summary.total_lines += 1;

            if line.contains(&self.query_marker) {
                summary.query_count += 1;
                if summary.query_count % PROGRESS_EVERY == 0 {
                    debug!("Processed {} queries so far", summary.query_count);
                }

                if summary.query_count >= self.query_limit {
                    info!("Query limit of {} reached, stopping", self.query_limit);
                    break;
                }
            }

            if let Some(caps) = self.pattern.captures(&line) {
                summary.key_lines += 1;
                let next = counts.len();
                counts
                    .entry((caps[1].to_string(), caps[2].to_string()))
                    .and_modify(|(count, _)| *count += 1)
                    .or_insert((1, next));
            }
        }

        summary.unique_addresses = counts.len() as u64;

        let mut ranked = counts.into_iter().collect::<Vec<_>>();
        ranked.sort_by(|(_, (a_count, a_seen)), (_, (b_count, b_seen))| {
            b_count.cmp(a_count).then(a_seen.cmp(b_seen))
        });

        summary.accesses = ranked
            .into_iter()
            .enumerate()
            .map(|(i, ((key, address), (access_count, _)))| RankedAccess {
                rank: i as u64 + 1,
                key,
                address,
                access_count,
            })
            .collect();

        Ok(summary)
    }
}
impl Default for LogMiner {
    fn default() -> Self {
        Self {
            pattern: Regex::new(KEY_ADDRESS_PATTERN).expect("key/address pattern is valid"),
            query_marker: QUERY_MARKER.to_string(),
            query_limit: QUERY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = "\
INFO actix_web: POST /collections/wiki/points/query 200
DEBUG segment: Key: 12, address: 0x7f0000001000
DEBUG segment: Key: 7, address: 0x7f0000002600
DEBUG segment: Key: 12, address: 0x7f0000001000
INFO actix_web: POST /collections/wiki/points/query 200
DEBUG segment: Key: 7, address: 0x7f0000002600
DEBUG segment: Key: 3, address: 0x7f0000003C00
DEBUG segment: Key: 12, address: 0x7f0000001000
something unrelated
";

    #[test]
    fn counts_and_ranks_accesses() -> anyhow::Result<()> {
        let summary = LogMiner::default().mine(Cursor::new(LOG))?;

        assert_eq!(summary.total_lines, 9);
        assert_eq!(summary.key_lines, 6);
        assert_eq!(summary.query_count, 2);
        assert_eq!(summary.unique_addresses, 3);

        let ranked = summary
            .accesses
            .iter()
            .map(|a| (a.rank, a.key.as_str(), a.access_count))
            .collect::<Vec<_>>();
        assert_eq!(ranked, vec![(1, "12", 3), (2, "7", 2), (3, "3", 1)]);
        Ok(())
    }

    #[test]
    fn stops_at_query_limit() -> anyhow::Result<()> {
        let summary = LogMiner::new(QUERY_MARKER, 2)?.mine(Cursor::new(LOG))?;

        // the second query line ends the scan
        assert_eq!(summary.query_count, 2);
        assert_eq!(summary.total_lines, 5);
        assert_eq!(summary.key_lines, 3);
        assert_eq!(summary.accesses[0].access_count, 2);
        Ok(())
    }

    #[test]
    fn ties_keep_first_seen_order() -> anyhow::Result<()> {
        let log = "Key: 5, address: 0xB\nKey: 1, address: 0xA\nKey: 9, address: 0xC\n";
        let summary = LogMiner::default().mine(Cursor::new(log))?;

        let keys = summary
            .accesses
            .iter()
            .map(|a| a.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["5", "1", "9"]);
        Ok(())
    }

    #[test]
    fn same_address_under_different_keys_is_counted_separately() -> anyhow::Result<()> {
        let log = "Key: 1, address: 0xA\nKey: 2, address: 0xA\n";
        let summary = LogMiner::default().mine(Cursor::new(log))?;
        assert_eq!(summary.unique_addresses, 2);
        Ok(())
    }

    #[test]
    fn writes_csv_with_header() -> anyhow::Result<()> {
        let summary = LogMiner::default().mine(Cursor::new(LOG))?;
        let mut out = vec![];
        summary.write_csv(&mut out)?;

        let text = String::from_utf8(out)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Rank,Key,Address,Access Count"));
        assert_eq!(lines.next(), Some("1,12,0x7f0000001000,3"));
        Ok(())
    }

    #[test]
    fn empty_summary_still_has_header() -> anyhow::Result<()> {
        let mut out = vec![];
        AccessLogSummary::default().write_csv(&mut out)?;
        assert_eq!(String::from_utf8(out)?, "Rank,Key,Address,Access Count\n");
        Ok(())
    }

    #[test]
    fn zero_query_limit_is_rejected() {
        assert_eq!(
            LogMiner::new(QUERY_MARKER, 0).unwrap_err(),
            ConfigError::InvalidQueryLimit(0)
        );
    }
}
