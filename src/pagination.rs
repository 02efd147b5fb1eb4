//! Page/limit arithmetic for the post listing.
//!
//! Absent, empty, non-numeric and zero values fall back to the defaults
//! (`page=1`, `limit=10`). Negative or fractional values are rejected, as is
//! a page whose offset does not fit the store's 64-bit signed range.

use serde::Serialize;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid pagination parameters")]
pub struct InvalidPagination;

/// A validated window into a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u64,
    limit: u64,
    offset: u64,
}

impl Page {
    pub fn new(number: u64, limit: u64) -> Result<Self, InvalidPagination> {
        if number == 0 || limit == 0 {
            return Err(InvalidPagination);
        }
        let offset = (number - 1).checked_mul(limit).ok_or(InvalidPagination)?;
        if offset > i64::MAX as u64 || limit > i64::MAX as u64 {
            return Err(InvalidPagination);
        }
        Ok(Self { number, limit, offset })
    }

    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Self, InvalidPagination> {
        Self::new(number_or(page, DEFAULT_PAGE)?, number_or(limit, DEFAULT_LIMIT)?)
    }

    pub fn number(&self) -> u64 { self.number }
    pub fn limit(&self) -> u64 { self.limit }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 { self.offset }

    pub fn meta(&self, total: u64) -> PaginationMeta {
        PaginationMeta {
            page: self.number,
            limit: self.limit,
            total,
            total_pages: total.div_ceil(self.limit),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { number: DEFAULT_PAGE, limit: DEFAULT_LIMIT, offset: 0 }
    }
}

/// The `pagination` object of the listing envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

// Largest integer an f64 represents exactly.
const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

fn number_or(raw: Option<&str>, default: u64) -> Result<u64, InvalidPagination> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let value = match raw.parse::<f64>() {
        Ok(v) if v.is_nan() || v == 0.0 => return Ok(default),
        Ok(v) => v,
        Err(_) => return Ok(default),
    };
    if value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT {
        return Err(InvalidPagination);
    }
    Ok(value as u64)
}
