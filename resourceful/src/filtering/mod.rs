//! # Filtering, Ordering & Pagination
//!
//! Translates the query string of a list or detail request into a query plan.
//!
//! ## Filter keys
//!
//! Every query key that is not reserved is a filter of the form
//! `field[__relationField][__modifier]=value`. Filters combine with AND.
//!
//! ```text
//! GET /posts?title=hello                 title = 'hello'
//! GET /posts?views__gte=10               views >= 10
//! GET /posts?id=1&id=2                   id IN (1, 2)
//! GET /posts?id__in=1,2                  id IN (1, 2)
//! GET /posts?status__not=draft           status <> 'draft'
//! GET /posts?author__name=ann            joins author, author.name = 'ann'
//! GET /posts?author=3                    joins author, author.id = 3
//! GET /posts?tags__name__in=rust,sql     joins tags through the junction table
//! ```
//!
//! Unknown keys are rejected with `InvalidQueryKey` instead of being ignored.
//!
//! ## Reserved keys
//!
//! - `limit`, `offset`: page window, clamped to the resource's `max_take`
//! - `order_by`: `field` or `-field` (descending), comma-separated for several terms
//!
//! Values are always bound as parameters, typed after the column they compare against.

pub mod joined;
pub mod pagination;
pub mod predicate;
pub mod query_key;
pub mod sort;

pub use joined::JoinRegistry;
pub use pagination::{Page, parse_page};
pub use predicate::{FilterOperator, apply_filter, build_predicate, coerce};
pub use query_key::{KEY_DELIMITER, Modifier, QueryKey, SPECIAL_QUERY_KEYS};
pub use sort::{OrderTerm, parse_order_term, parse_ordering};
