use sea_orm::{EntityTrait, Order};

use crate::errors::ApiError;
use crate::metadata::FieldIndex;

/// Prefix that turns an ordering term descending
const DESCENDING_PREFIX: char = '-';

/// One `ORDER BY` term on a column of the resource's entity
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: Order,
}

impl OrderTerm {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Order::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Order::Desc,
        }
    }
}

/// Split `-field` / `field` into the column name and its direction
#[must_use]
pub fn parse_order_term(term: &str) -> (String, Order) {
    let term = term.trim();
    term.strip_prefix(DESCENDING_PREFIX).map_or_else(
        || (term.to_string(), Order::Asc),
        |column| (column.to_string(), Order::Desc),
    )
}

/// Parse a comma-separated ordering (`-views,title`) against the entity's columns.
///
/// # Errors
///
/// Returns `InvalidQueryKey` for `key` when a term is empty or does not name a plain column.
pub fn parse_ordering<E: EntityTrait>(
    raw: &str,
    fields: &FieldIndex<E>,
    key: &str,
) -> Result<Vec<OrderTerm>, ApiError> {
    raw.split(',')
        .map(|term| {
            let (column, direction) = parse_order_term(term);
            if column.is_empty() {
                return Err(ApiError::invalid_query_key(key, "empty ordering term"));
            }
            if fields.column(&column).is_none() {
                return Err(ApiError::invalid_query_key(
                    key,
                    &format!("'{column}' is not a sortable field"),
                ));
            }
            Ok(OrderTerm { column, direction })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_term() {
        assert_eq!(parse_order_term("title"), ("title".to_string(), Order::Asc));
        assert_eq!(parse_order_term("-views"), ("views".to_string(), Order::Desc));
        assert_eq!(parse_order_term(" -id "), ("id".to_string(), Order::Desc));
    }

    #[test]
    fn test_constructors() {
        assert_eq!(OrderTerm::desc("views").direction, Order::Desc);
        assert_eq!(OrderTerm::asc("id").column, "id");
    }
}
