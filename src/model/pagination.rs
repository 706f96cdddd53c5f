use std::ops::Range;

use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// A requested page, read from the `page_num` and `page_size` query
/// parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    /// `None` if `page_size` is zero.
    pub fn new(page_num: usize, page_size: usize) -> Option<Self> {
        (page_size > 0).then_some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> u64 {
        self.page_num
            .saturating_sub(1)
            .saturating_mul(self.page_size) as u64
    }

    /// The slice of `total` items on this page, clamped to the items that exist.
    ///
    /// Page numbers below 1 behave as page 1, and pages past the end are empty.
    pub fn bounds(&self, total: usize) -> Range<usize> {
        let start = (self.skip() as usize).min(total);
        let end = start.saturating_add(self.page_size).min(total);
        start..end
    }

    /// Number of pages needed for `total` items.
    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.page_size)
    }

    pub fn result(self, total: usize) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
            total_pages: self.total_pages(total),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = &'static str;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let Ok(page_num) = req.query_value::<usize>("page_num").unwrap_or(Ok(1)) else {
            return request::Outcome::Failure((Status::BadRequest, "invalid page_num"));
        };
        let Ok(page_size) = req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(DEFAULT_PAGE_SIZE))
        else {
            return request::Outcome::Failure((Status::BadRequest, "invalid page_size"));
        };
        match Self::new(page_num, page_size) {
            Some(pagination) => request::Outcome::Success(pagination),
            None => request::Outcome::Failure((Status::BadRequest, "page_size must be positive")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}
