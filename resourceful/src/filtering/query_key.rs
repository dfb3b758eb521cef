//! Filter key parsing.
//!
//! A filter key has the shape `field[__relationField][__modifier]`:
//!
//! - `title=hello` → `title = 'hello'`
//! - `views__gte=10` → `views >= 10`
//! - `author__name=ann` → `author.name = 'ann'` (through a join)
//! - `author__name__in=ann,bob` → `author.name IN ('ann', 'bob')`

use crate::models::QueryValue;

/// Separator between the segments of a filter key
pub const KEY_DELIMITER: &str = "__";

/// Query keys that drive pagination and ordering and are never filters
pub const SPECIAL_QUERY_KEYS: [&str; 3] = ["limit", "offset", "order_by"];

/// Comparison selected by the last segment of a filter key. Equality has no token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Not,
}

impl Modifier {
    pub const ALL: [Self; 7] = [
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Not,
    ];

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            "not" => Some(Self::Not),
            _ => None,
        }
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Not => "not",
        }
    }

    /// `in` and `not_in` compare against a list of values
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// Whether `name` collides with a modifier token
#[must_use]
pub fn is_modifier_token(name: &str) -> bool {
    Modifier::from_token(name).is_some()
}

/// A filter key split into its parts, together with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    /// The key as it appeared in the query string
    pub raw: String,
    /// First segment: a field of the resource's entity
    pub base: String,
    /// Middle segments: the field addressed on the related entity
    pub path: Vec<String>,
    pub modification: Option<Modifier>,
    pub value: QueryValue,
}

impl QueryKey {
    /// Split `raw` on `__`; never fails.
    ///
    /// A trailing segment that is not a modifier token stays part of `path`. For `in` and
    /// `not_in`, a single value is split on commas.
    #[must_use]
    pub fn parse(raw: &str, value: QueryValue) -> Self {
        let mut segments: Vec<String> = raw.split(KEY_DELIMITER).map(str::to_string).collect();
        let base = segments.remove(0);

        let modification = match segments.last() {
            Some(last) => Modifier::from_token(last),
            None => None,
        };
        if modification.is_some() {
            segments.pop();
        }

        let value = match (modification, value) {
            (Some(modifier), QueryValue::Single(single)) if modifier.takes_list() => {
                QueryValue::Many(split_list(&single))
            }
            (Some(modifier), QueryValue::Many(items)) if modifier.takes_list() => {
                QueryValue::Many(items.iter().flat_map(|item| split_list(item)).collect())
            }
            (_, value) => value,
        };

        Self {
            raw: raw.to_string(),
            base,
            path: segments,
            modification,
            value,
        }
    }

    /// Whether the key addresses a field on a related entity
    #[must_use]
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
