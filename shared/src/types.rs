//! Common types used across the platform

use serde::{Deserialize, Deserializer, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// Upper bound on page size accepted from callers
pub const MAX_PER_PAGE: u32 = 200;

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.normalized()
    }

    /// Clamp page to >= 1 and page size to 1..=MAX_PER_PAGE
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.normalized().per_page)
    }

    pub fn offset(&self) -> i64 {
        let p = self.normalized();
        i64::from(p.page - 1) * i64::from(p.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total_items: u64) -> Self {
        let p = pagination.normalized();
        let total_pages = total_items.div_ceil(u64::from(p.per_page)) as u32;
        Self {
            data,
            pagination: PaginationMeta {
                page: p.page,
                per_page: p.per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Deserialize an optional value treating `""` as absent.
///
/// Form posts send blank inputs as empty strings; numeric readings must be stored
/// as null in that case rather than coerced to zero.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Bool(bool),
    }

    let raw: Option<Raw> = Option::deserialize(deserializer)?;
    let text = match raw {
        None => return Ok(None),
        Some(Raw::Text(s)) => s,
        Some(Raw::Number(n)) => n.to_string(),
        Some(Raw::Bool(b)) => b.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[derive(Deserialize)]
    struct Reading {
        #[serde(default, deserialize_with = "empty_as_none")]
        value: Option<Decimal>,
        #[serde(default, deserialize_with = "empty_as_none")]
        flag: Option<bool>,
    }

    #[test]
    fn test_empty_string_is_null() {
        let r: Reading = serde_json::from_str(r#"{"value": "", "flag": ""}"#).unwrap();
        assert_eq!(r.value, None);
        assert_eq!(r.flag, None);
    }

    #[test]
    fn test_zero_is_kept() {
        let r: Reading = serde_json::from_str(r#"{"value": "0", "flag": false}"#).unwrap();
        assert_eq!(r.value, Some(Decimal::ZERO));
        assert_eq!(r.flag, Some(false));
    }

    #[test]
    fn test_numbers_and_missing_fields() {
        let r: Reading = serde_json::from_str(r#"{"value": 12.5}"#).unwrap();
        assert_eq!(r.value, Some(Decimal::new(125, 1)));
        assert_eq!(r.flag, None);

        let r: Reading = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(r.value, None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let r: Result<Reading, _> = serde_json::from_str(r#"{"value": "abc"}"#);
        assert!(r.is_err());
    }

    #[test]
    fn test_pagination_offsets() {
        let p = Pagination::new(3, 25);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);

        let p = Pagination { page: 0, per_page: 10_000 }.normalized();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);
    }

    #[test]
    fn test_paginated_response_pages() {
        let resp = PaginatedResponse::new(vec![1, 2, 3], Pagination::new(1, 3), 7);
        assert_eq!(resp.pagination.total_pages, 3);

        let empty: PaginatedResponse<i32> = PaginatedResponse::new(vec![], Pagination::default(), 0);
        assert_eq!(empty.pagination.total_pages, 0);
    }
}
