use crate::error::AddressError;
use serde::Serialize;

/// A memory address together with the number of times it was accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AddressRecord {
    address: u64,
    access_count: u64,
}
impl AddressRecord {
    pub fn new(address: u64, access_count: u64) -> Self {
        Self {
            address,
            access_count,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }
}

/// Parses a hexadecimal address as it appears in the server logs, e.g. `0x7f3a2c001000`.
///
/// Leading and trailing whitespace is ignored and the `0x` prefix is optional.
pub fn parse_address(text: &str) -> Result<u64, AddressError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    // from_str_radix accepts a leading sign, addresses never have one
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(AddressError::NotHex(text.to_string()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| AddressError::NotHex(text.to_string()))
}
