//! # 服务层共享工具
//!
//! 分页与活动 / 套票列表共用的查询参数。

use serde::Deserialize;

use crate::config::PaginationTuning;
use crate::error::{Result, TicketingError};
use crate::web::Pagination;

/// 分页参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 当前页码（>= 1）
    pub page: u64,
    /// 每页条数（>= 1，超过上限时截断）
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, per_page: Option<u64>, tuning: &PaginationTuning) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(TicketingError::invalid_field("page", "page must be at least 1"));
        }
        let per_page = per_page.unwrap_or(tuning.default_per_page);
        if per_page == 0 {
            return Err(TicketingError::invalid_field(
                "per_page",
                "per_page must be at least 1",
            ));
        }
        let per_page = per_page.min(tuning.max_per_page.max(1));
        // 偏移量必须能放进数据库的 BIGINT
        let offset = (page - 1).checked_mul(per_page);
        if offset.is_none_or(|offset| offset > i64::MAX as u64) {
            return Err(TicketingError::invalid_field(
                "page",
                format!("page {page} is out of range"),
            ));
        }
        Ok(Self { page, per_page })
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }

    #[must_use]
    pub const fn pagination(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total,
            pages: total.div_ceil(self.per_page),
        }
    }
}

/// 列表排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrder {
    NameAsc,
    NameDesc,
    SeatsAsc,
    SeatsDesc,
}

/// 活动与套票列表的查询参数，未知参数返回 400
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogQuery {
    pub location: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_seats: Option<i32>,
    pub max_seats: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub order_by: Option<CatalogOrder>,
}

impl CatalogQuery {
    pub fn page_request(&self, tuning: &PaginationTuning) -> Result<PageRequest> {
        if let (Some(min), Some(max)) = (self.min_seats, self.max_seats) {
            if min > max {
                return Err(TicketingError::invalid_field(
                    "min_seats",
                    "min_seats must not exceed max_seats",
                ));
            }
        }
        PageRequest::new(self.page, self.per_page, tuning)
    }
}

/// 把 `NaiveDateTime` 作为 UTC 时间输出
#[must_use]
pub fn utc(naive: chrono::NaiveDateTime) -> chrono::DateTime<chrono::Utc> {
    naive.and_utc()
}

/// 数据库计数转为规则引擎使用的 `i64`
#[must_use]
pub fn as_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 10)]
    #[case(Some(3), Some(25), 3, 25)]
    #[case(Some(2), Some(1000), 2, 100)]
    fn page_defaults_and_caps(
        #[case] page: Option<u64>,
        #[case] per_page: Option<u64>,
        #[case] expected_page: u64,
        #[case] expected_per_page: u64,
    ) {
        let request = PageRequest::new(page, per_page, &PaginationTuning::default()).unwrap();
        assert_eq!(request.page, expected_page);
        assert_eq!(request.per_page, expected_per_page);
    }

    #[test]
    fn zero_values_are_rejected_with_field() {
        let err = PageRequest::new(Some(0), None, &PaginationTuning::default()).unwrap_err();
        assert_eq!(err.field(), Some("page"));
        let err = PageRequest::new(None, Some(0), &PaginationTuning::default()).unwrap_err();
        assert_eq!(err.field(), Some("per_page"));
    }

    #[test]
    fn out_of_range_page_is_rejected_with_field() {
        let err = PageRequest::new(Some(u64::MAX), None, &PaginationTuning::default()).unwrap_err();
        assert_eq!(err.field(), Some("page"));
        let err = PageRequest::new(Some(u64::MAX / 10), Some(10), &PaginationTuning::default())
            .unwrap_err();
        assert_eq!(err.field(), Some("page"));

        let last = i64::MAX as u64 / 10 + 1;
        let request = PageRequest::new(Some(last), Some(10), &PaginationTuning::default()).unwrap();
        assert!(request.offset() <= i64::MAX as u64);
    }

    #[test]
    fn pagination_counts_pages() {
        let request = PageRequest::new(Some(2), Some(10), &PaginationTuning::default()).unwrap();
        assert_eq!(request.offset(), 10);
        let pagination = request.pagination(21);
        assert_eq!(pagination.pages, 3);
        assert_eq!(request.pagination(0).pages, 0);
    }

    #[test]
    fn order_by_uses_snake_case() {
        let query: CatalogQuery =
            serde_json::from_value(serde_json::json!({ "order_by": "seats_desc" })).unwrap();
        assert_eq!(query.order_by, Some(CatalogOrder::SeatsDesc));
    }
}
