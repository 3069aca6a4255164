use crate::{error::TableError, page_usage::UsageHistogram};
use serde::Deserialize;
use std::{
    collections::{hash_map::Entry, HashMap},
    fs::File,
    io::{Read, Write},
    path::Path,
};
use tracing::debug;

const ADDRESS: &str = "Address";
const ACCESS_COUNT: &str = "Access Count";

/// One row of an access count table, as written by `pagescope count`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AccessEntry {
    #[serde(rename = "Rank", default)]
    pub rank: Option<u64>,
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Access Count")]
    pub access_count: u64,
}

/// Access count table in file order.
#[derive(Debug, Default)]
pub struct AccessTable {
    entries: Vec<AccessEntry>,
}
impl AccessTable {
    pub fn try_from_path(path: &Path) -> Result<Self, TableError> {
        AccessTable::try_from_reader(File::open(path)?)
    }

    pub fn try_from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in [ADDRESS, ACCESS_COUNT] {
            if !headers.iter().any(|h| h == column) {
                return Err(TableError::MissingColumn(column));
            }
        }

        let mut entries = vec![];
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            let entry = record
                .deserialize::<AccessEntry>(Some(&headers))
                .map_err(|source| TableError::BadRow { line, source })?;
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Access counts in file order.
    pub fn counts(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.access_count).collect()
    }

    /// Collapses the table into one count per address text. A later row for the same address
    /// replaces the count of an earlier one but keeps its position.
    pub fn address_counts(&self) -> Vec<(&str, u64)> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, u64)> = vec![];

        for entry in self.entries.iter() {
            match positions.entry(entry.address.as_str()) {
                Entry::Occupied(pos) => {
                    debug!(
                        "Address {} appears more than once, keeping count {}",
                        entry.address, entry.access_count
                    );
                    counts[*pos.get()].1 = entry.access_count;
                }
                Entry::Vacant(pos) => {
                    pos.insert(counts.len());
                    counts.push((entry.address.as_str(), entry.access_count));
                }
            }
        }

        counts
    }
}

/// Writes a usage histogram as tab separated `Bytes Used`, `Number of Pages` rows, ascending by
/// bytes used.
pub fn write_histogram<W: Write>(histogram: &UsageHistogram, writer: W) -> Result<(), TableError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    writer.write_record(["Bytes Used", "Number of Pages"])?;
    for (bytes_used, pages) in histogram.iter() {
        writer.write_record([bytes_used.to_string(), pages.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_table_written_by_count() -> anyhow::Result<()> {
        let csv = "Rank,Key,Address,Access Count\n1,12,0x1000,300\n2,7,0x2600,20\n";
        let table = AccessTable::try_from_reader(Cursor::new(csv))?;

        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[0].key.as_deref(), Some("12"));
        assert_eq!(table.counts(), vec![300, 20]);
        Ok(())
    }

    #[test]
    fn rank_and_key_are_optional() -> anyhow::Result<()> {
        let csv = "Address,Access Count\n0x10,5\n";
        let table = AccessTable::try_from_reader(Cursor::new(csv))?;

        assert_eq!(table.entries()[0].rank, None);
        assert_eq!(table.address_counts(), vec![("0x10", 5)]);
        Ok(())
    }

    #[test]
    fn later_duplicate_replaces_count() -> anyhow::Result<()> {
        let csv = "Address,Access Count\n0xA,5\n0xB,4\n0xA,1\n";
        let table = AccessTable::try_from_reader(Cursor::new(csv))?;

        assert_eq!(table.address_counts(), vec![("0xA", 1), ("0xB", 4)]);
        Ok(())
    }

    #[test]
    fn missing_column_is_an_error() {
        let res = AccessTable::try_from_reader(Cursor::new("Rank,Address\n1,0x10\n"));
        assert!(matches!(res, Err(TableError::MissingColumn("Access Count"))));
    }

    #[test]
    fn negative_count_reports_line() {
        let csv = "Address,Access Count\n0x10,5\n0x20,-3\n";
        let res = AccessTable::try_from_reader(Cursor::new(csv));
        assert!(matches!(res, Err(TableError::BadRow { line: 3, .. })));
    }

    #[test]
    fn histogram_is_written_ascending() -> anyhow::Result<()> {
        let histogram = [(3072, 1), (2, 4), (1534, 4)]
            .into_iter()
            .collect::<UsageHistogram>();
        let mut out = vec![];
        write_histogram(&histogram, &mut out)?;

        assert_eq!(
            String::from_utf8(out)?,
            "Bytes Used\tNumber of Pages\n2\t4\n1534\t4\n3072\t1\n"
        );
        Ok(())
    }
}
