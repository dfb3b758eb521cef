use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::filtering::pagination::OFFSET_KEY;
use crate::models::QueryParams;

/// Pagination metadata of a list response
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListMeta {
    /// Rows in this page
    pub count: u64,
    pub offset: u64,
    pub limit: u64,
    /// Rows matching the filters across all pages
    pub total: u64,
    /// Link to the following page, when there is one
    pub next: Option<String>,
    /// Link to the preceding page, when this one does not start at 0
    pub prev: Option<String>,
}

/// Body of a list response: `{meta, objects}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListResponse {
    pub meta: ListMeta,
    #[schema(value_type = Vec<Object>)]
    pub objects: Vec<Value>,
}

impl ListResponse {
    /// Wrap a page of rows.
    ///
    /// `endpoint` is the URL the links point at; `query` is the request's query string, which
    /// the links repeat with only `offset` changed.
    #[must_use]
    pub fn new(
        objects: Vec<Value>,
        offset: u64,
        limit: u64,
        total: u64,
        endpoint: &str,
        query: &QueryParams,
    ) -> Self {
        let next = (limit > 0 && total > offset.saturating_add(limit))
            .then(|| page_link(endpoint, query, offset + limit));
        let prev = (offset > 0).then(|| page_link(endpoint, query, offset.saturating_sub(limit)));

        Self {
            meta: ListMeta {
                count: objects.len() as u64,
                offset,
                limit,
                total,
                next,
                prev,
            },
            objects,
        }
    }
}

fn page_link(endpoint: &str, query: &QueryParams, offset: u64) -> String {
    let mut query = query.clone();
    query.set(OFFSET_KEY, offset.to_string());
    format!("{endpoint}?{}", query.to_query_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": i })).collect()
    }

    #[test]
    fn test_first_page_links_to_second() {
        let query = QueryParams::parse("title=a&limit=10");
        let page = ListResponse::new(rows(10), 0, 10, 25, "/posts", &query);
        assert_eq!(page.meta.count, 10);
        assert_eq!(page.meta.next.as_deref(), Some("/posts?title=a&limit=10&offset=10"));
        assert_eq!(page.meta.prev, None);
    }

    #[test]
    fn test_last_page_has_no_next() {
        let query = QueryParams::parse("offset=20&limit=10");
        let page = ListResponse::new(rows(5), 20, 10, 25, "/posts", &query);
        assert_eq!(page.meta.next, None);
        assert_eq!(page.meta.prev.as_deref(), Some("/posts?offset=10&limit=10"));
    }

    #[test]
    fn test_absent_links_are_not_serialized() {
        let page = ListResponse::new(rows(1), 0, 10, 1, "/posts", &QueryParams::new());
        let body = serde_json::to_value(&page).unwrap();
        assert_eq!(
            body,
            json!({
                "meta": { "count": 1, "offset": 0, "limit": 10, "total": 1 },
                "objects": [{ "id": 0 }]
            })
        );
    }

    #[test]
    fn test_repeated_filters_survive_in_links() {
        let query = QueryParams::parse("id=1&id=2&id=3");
        let page = ListResponse::new(rows(1), 0, 1, 3, "https://api.test/posts", &query);
        assert_eq!(
            page.meta.next.as_deref(),
            Some("https://api.test/posts?id=1&id=2&id=3&offset=1")
        );
    }
}
