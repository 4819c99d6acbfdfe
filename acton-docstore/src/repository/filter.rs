//! Common filter inputs
//!
//! Every entity filter carries the same sort, range and pagination inputs.
//! Concrete filters embed [`FilterParams`] (usually with `#[serde(flatten)]`)
//! and implement [`Filter`] to expose it.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::{Filter, FilterParams};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct UserFilter {
//!     name: Option<String>,
//!     #[serde(flatten)]
//!     params: FilterParams,
//! }
//!
//! impl Filter for UserFilter {
//!     fn params(&self) -> &FilterParams {
//!         &self.params
//!     }
//! }
//!
//! let filter: UserFilter =
//!     serde_json::from_str(r#"{ "name": "alice", "pageIndex": 2, "sort": "name-asc" }"#).unwrap();
//! assert_eq!(filter.params().page_index, 2);
//! assert_eq!(filter.params().page_size, 10);
//! ```

use serde::{Deserialize, Serialize};

use super::pagination::Pagination;

/// Default page size when a filter does not specify one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Sort, range and pagination inputs shared by all filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    /// Sort token such as `name-asc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// Field the `[from, to)` range applies to, overriding the entity default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_to_key: Option<String>,

    /// Inclusive lower bound of the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,

    /// Exclusive upper bound of the range
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,

    /// Page number (1-indexed)
    #[serde(default = "default_page_index")]
    pub page_index: i64,

    /// Rows per page
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            sort: None,
            from_to_key: None,
            from: None,
            to: None,
            page_index: default_page_index(),
            page_size: default_page_size(),
        }
    }
}

impl FilterParams {
    /// Create filter params for one page
    #[must_use]
    pub fn page(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    /// Set the sort token
    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Set the `[from, to)` range, optionally on a specific field
    #[must_use]
    pub fn with_range(mut self, key: Option<&str>, from: Option<i64>, to: Option<i64>) -> Self {
        self.from_to_key = key.map(str::to_string);
        self.from = from;
        self.to = to;
        self
    }

    /// Page index clamped to at least 1
    #[must_use]
    pub fn page_number(&self) -> i64 {
        self.page_index.max(1)
    }

    /// Page size clamped to at least 1
    #[must_use]
    pub fn items_per_page(&self) -> i64 {
        self.page_size.max(1)
    }

    /// Skip/limit for the requested page
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::page(self.page_index, self.page_size)
    }

    /// Whether a range bound is present
    #[must_use]
    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

fn default_page_index() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// A typed filter object accepted by repository operations
pub trait Filter: Send + Sync {
    /// The shared sort, range and pagination inputs
    fn params(&self) -> &FilterParams;
}

impl Filter for FilterParams {
    fn params(&self) -> &FilterParams {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = FilterParams::default();
        assert_eq!(params.page_index, 1);
        assert_eq!(params.page_size, 10);
        assert!(params.sort.is_none());
        assert!(!params.has_range());
    }

    #[test]
    fn test_deserialize_defaults_and_camel_case() {
        let params: FilterParams =
            serde_json::from_str(r#"{ "fromToKey": "age", "from": 5, "to": 9 }"#).unwrap();
        assert_eq!(params.from_to_key.as_deref(), Some("age"));
        assert_eq!(params.from, Some(5));
        assert_eq!(params.to, Some(9));
        assert_eq!(params.page_index, 1);
        assert_eq!(params.page_size, 10);
    }

    #[test]
    fn test_clamped_accessors() {
        let params = FilterParams::page(0, -3);
        assert_eq!(params.page_number(), 1);
        assert_eq!(params.items_per_page(), 1);
        assert_eq!(params.pagination(), Pagination::page(1, 1));
    }

    #[test]
    fn test_builders() {
        let params = FilterParams::page(3, 10)
            .with_sort("name-asc")
            .with_range(Some("age"), Some(50), None);
        assert_eq!(params.sort.as_deref(), Some("name-asc"));
        assert_eq!(params.from_to_key.as_deref(), Some("age"));
        assert!(params.has_range());
        assert_eq!(params.pagination().offset, 20);
    }

    #[test]
    fn test_serialize_skips_absent_fields() {
        let json = serde_json::to_value(FilterParams::default()).unwrap();
        assert!(json.get("sort").is_none());
        assert_eq!(json["pageIndex"], 1);
        assert_eq!(json["pageSize"], 10);
    }
}
