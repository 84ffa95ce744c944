//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.per_page.max(1);
        let total_pages = (total_items as u32 + per_page - 1) / per_page;
        Self {
            page: pagination.page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

/// Date range for queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: chrono::NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::default();
        assert_eq!(p.offset(), 0);
        let p = Pagination {
            page: 3,
            per_page: 25,
        };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn test_pagination_meta_rounds_up() {
        let p = Pagination {
            page: 1,
            per_page: 20,
        };
        let meta = PaginationMeta::new(&p, 41);
        assert_eq!(meta.total_pages, 3);
        let meta = PaginationMeta::new(&p, 40);
        assert_eq!(meta.total_pages, 2);
        let meta = PaginationMeta::new(&p, 0);
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn test_date_range_contains_is_inclusive() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        };
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()));
    }
}
