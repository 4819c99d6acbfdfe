//! Pagination bookkeeping for repository queries
//!
//! [`MetaPagination::new`] is a pure function of `(page_index, page_size,
//! total_count)`. Both page inputs are clamped to a minimum of 1 before any
//! arithmetic, so callers may forward raw request values.
//!
//! # Example
//!
//! ```rust
//! use acton_docstore::repository::MetaPagination;
//!
//! let meta = MetaPagination::new(3, 10, 25);
//! assert_eq!(meta.page_count, 3);
//! assert_eq!(meta.data_count, 5);
//! assert_eq!(meta.info, "Data 21 ~ 25 of 25");
//! ```

use serde::{Deserialize, Serialize};

/// Skip/limit pair derived from a page index and size
///
/// # Example
///
/// ```rust
/// use acton_docstore::repository::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of documents to skip
    pub offset: u64,
    /// Maximum number of documents to return
    pub limit: i64,
}

impl Pagination {
    /// Create pagination for a specific page number (1-indexed)
    ///
    /// Page numbers and sizes below 1 are treated as 1.
    #[must_use]
    pub fn page(page_index: i64, page_size: i64) -> Self {
        let page_index = page_index.max(1);
        let page_size = page_size.max(1);
        let offset = (page_index - 1).saturating_mul(page_size);
        Self {
            offset: u64::try_from(offset).unwrap_or(u64::MAX),
            limit: page_size,
        }
    }
}

/// Page metadata for one paginated query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPagination {
    /// Requested page (1-indexed, clamped to at least 1)
    pub page_index: i64,
    /// Requested page size (clamped to at least 1)
    pub page_size: i64,
    /// Total number of pages: `ceil(total_count / page_size)`
    pub page_count: i64,
    /// Number of rows actually present on the requested page
    pub data_count: i64,
    /// Human-readable range, e.g. `"Data 21 ~ 25 of 25"`
    pub info: String,
}

impl MetaPagination {
    /// Compute page metadata
    ///
    /// When the requested page starts beyond `total_count` the range in
    /// [`info`](Self::info) reads `0 ~ 0`; `page_index` and `page_size` are
    /// still reported as requested.
    #[must_use]
    pub fn new(page_index: i64, page_size: i64, total_count: u64) -> Self {
        let page_index = page_index.max(1);
        let page_size = page_size.max(1);
        let total = i64::try_from(total_count).unwrap_or(i64::MAX);

        let page_count = total / page_size + i64::from(total % page_size != 0);
        let offset = (page_index - 1).saturating_mul(page_size);
        let data_count = total.saturating_sub(offset).clamp(0, page_size);

        let (first, last) = if offset >= total {
            (0, 0)
        } else {
            (offset + 1, offset + data_count)
        };

        Self {
            page_index,
            page_size,
            page_count,
            data_count,
            info: format!("Data {} ~ {} of {}", first, last, total),
        }
    }

    /// Skip/limit pair for the page this metadata describes
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::page(self.page_index, self.page_size)
    }
}

/// One page of rows paired with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T> {
    /// Rows on the requested page, in query order
    pub rows: Vec<T>,
    /// Page metadata
    #[serde(flatten)]
    pub meta: MetaPagination,
}

impl<T> PaginationResult<T> {
    /// Pair rows with metadata computed from the page inputs and total count
    pub fn new(rows: Vec<T>, page_index: i64, page_size: i64, total_count: u64) -> Self {
        Self {
            rows,
            meta: MetaPagination::new(page_index, page_size, total_count),
        }
    }

    /// Map each row, keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginationResult<U> {
        PaginationResult {
            rows: self.rows.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_page() {
        let pagination = Pagination::page(3, 10);
        assert_eq!(pagination.offset, 20);
        assert_eq!(pagination.limit, 10);
    }

    #[test]
    fn test_pagination_page_clamps_inputs() {
        assert_eq!(Pagination::page(0, 10), Pagination::page(1, 10));
        assert_eq!(Pagination::page(-4, 0).limit, 1);
        assert_eq!(Pagination::page(-4, 0).offset, 0);
    }

    #[test]
    fn test_meta_last_partial_page() {
        let meta = MetaPagination::new(3, 10, 25);
        assert_eq!(meta.page_index, 3);
        assert_eq!(meta.page_size, 10);
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.data_count, 5);
        assert_eq!(meta.info, "Data 21 ~ 25 of 25");
    }

    #[test]
    fn test_meta_full_page() {
        let meta = MetaPagination::new(1, 10, 25);
        assert_eq!(meta.data_count, 10);
        assert_eq!(meta.info, "Data 1 ~ 10 of 25");
    }

    #[test]
    fn test_meta_exact_multiple() {
        let meta = MetaPagination::new(2, 10, 20);
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.data_count, 10);
        assert_eq!(meta.info, "Data 11 ~ 20 of 20");
    }

    #[test]
    fn test_meta_empty_collection() {
        let meta = MetaPagination::new(1, 10, 0);
        assert_eq!(meta.page_count, 0);
        assert_eq!(meta.data_count, 0);
        assert_eq!(meta.info, "Data 0 ~ 0 of 0");
    }

    #[test]
    fn test_meta_page_beyond_total() {
        let meta = MetaPagination::new(7, 10, 25);
        assert_eq!(meta.page_index, 7);
        assert_eq!(meta.page_size, 10);
        assert_eq!(meta.data_count, 0);
        assert_eq!(meta.info, "Data 0 ~ 0 of 25");
    }

    #[test]
    fn test_meta_clamps_non_positive_inputs() {
        let meta = MetaPagination::new(0, -5, 3);
        assert_eq!(meta.page_index, 1);
        assert_eq!(meta.page_size, 1);
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.data_count, 1);
        assert_eq!(meta.info, "Data 1 ~ 1 of 3");
    }

    #[test]
    fn test_meta_invariants_hold_across_inputs() {
        for total in 0..60_u64 {
            for size in 1..12_i64 {
                for index in 1..10_i64 {
                    let meta = MetaPagination::new(index, size, total);
                    let expected_pages = (total as i64 + size - 1) / size;
                    assert_eq!(meta.page_count, expected_pages);
                    assert!(meta.data_count >= 0);
                    assert!(meta.data_count <= size);
                }
            }
        }
    }

    #[test]
    fn test_meta_huge_page_index_does_not_overflow() {
        let meta = MetaPagination::new(i64::MAX, i64::MAX, 10);
        assert_eq!(meta.data_count, 0);
        assert_eq!(meta.page_count, 1);
    }

    #[test]
    fn test_pagination_result_serializes_flat() {
        let result = PaginationResult::new(vec![1, 2], 1, 2, 2);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows"], serde_json::json!([1, 2]));
        assert_eq!(json["pageIndex"], 1);
        assert_eq!(json["pageCount"], 1);
        assert_eq!(json["dataCount"], 2);
        assert_eq!(json["info"], "Data 1 ~ 2 of 2");
    }

    #[test]
    fn test_pagination_result_map_keeps_meta() {
        let result = PaginationResult::new(vec![1, 2, 3], 1, 10, 3).map(|n| n * 2);
        assert_eq!(result.rows, vec![2, 4, 6]);
        assert_eq!(result.meta.data_count, 3);
    }
}
