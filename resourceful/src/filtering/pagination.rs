use crate::errors::ApiError;
use crate::models::QueryParams;

pub const LIMIT_KEY: &str = "limit";
pub const OFFSET_KEY: &str = "offset";

/// Window of rows a list request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

/// Read `limit` and `offset` from the query.
///
/// A missing `limit` falls back to `default_take`. Limits are clamped to `1..=max_take`.
///
/// # Errors
///
/// Returns `InvalidQueryKey` when either value is not a non-negative integer.
pub fn parse_page(query: &QueryParams, default_take: u64, max_take: u64) -> Result<Page, ApiError> {
    let limit = read_count(query, LIMIT_KEY)?.unwrap_or(default_take);
    let offset = read_count(query, OFFSET_KEY)?.unwrap_or(0);
    Ok(Page {
        offset,
        limit: clamp_limit(limit, max_take),
    })
}

#[must_use]
pub fn clamp_limit(limit: u64, max_take: u64) -> u64 {
    limit.clamp(1, max_take.max(1))
}

fn read_count(query: &QueryParams, key: &str) -> Result<Option<u64>, ApiError> {
    query
        .get_first(key)
        .map(|raw| {
            // Parsed as i64 so the value stays bindable on every backend
            raw.trim()
                .parse::<i64>()
                .ok()
                .and_then(|count| u64::try_from(count).ok())
                .ok_or_else(|| ApiError::invalid_query_key(key, "must be a non-negative integer"))
        })
        .transpose()
}
