use thiserror::Error;

/// Raised before any processing starts when a parameter can't be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("page size must be positive, got {0}")]
    InvalidPageSize(i64),

    #[error("record size must be positive, got {0}")]
    InvalidRecordSize(i64),

    #[error("access threshold must not be negative, got {0}")]
    InvalidAccessThreshold(i64),

    #[error("record size {record_size} must be smaller than page size {page_size}")]
    RecordSpansPages { record_size: u64, page_size: u64 },

    #[error("query limit must be positive, got {0}")]
    InvalidQueryLimit(i64),

    #[error("coverage portion must be in (0, 100], got {0}")]
    InvalidPortion(f64),

    #[error("zipf exponent must be greater than 1, got {0}")]
    InvalidZipfExponent(f64),

    #[error("at most {max} requests can be scheduled, got {requests}")]
    TooManyRequests { requests: i64, max: i64 },

    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("unknown malformed address policy \"{0}\", expected \"skip\" or \"reject\"")]
    UnknownPolicy(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("\"{0}\" is not a hexadecimal address")]
    NotHex(String),

    #[error("record at {address:#x} runs past the end of the address space")]
    Overflow { address: u64 },
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("access table is missing the \"{0}\" column")]
    MissingColumn(&'static str),

    #[error("bad row at line {line}: {source}")]
    BadRow { line: u64, source: csv::Error },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
