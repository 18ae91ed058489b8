//! Query parameter types shared across handler modules.

use innerai_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::Deserialize;

/// `?limit=&offset=`. Clamped with `innerai_core::pagination`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn limit(&self) -> i64 {
        clamp_limit(self.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        clamp_offset(self.offset)
    }
}

/// `?at_period_end=true` keeps the plan until the paid period runs out.
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    #[serde(default)]
    pub at_period_end: bool,
}
