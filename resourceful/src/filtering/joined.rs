//! Bookkeeping for relation joins.
//!
//! Filters on related fields (`author__name=ann`) join the related table once under a fixed
//! alias. Later keys on the same relation find the join here and reuse it.

/// A join already added to a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRelation {
    /// `table.relation`, unique per query
    pub path: String,
    /// Alias the related table is joined under
    pub alias: String,
    /// Whether the join can repeat rows of the main table
    pub to_many: bool,
}

/// Joins of one query, keyed by property path.
#[derive(Debug, Clone, Default)]
pub struct JoinRegistry {
    joins: Vec<JoinedRelation>,
}

impl JoinRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&JoinedRelation> {
        self.joins.iter().find(|join| join.path == path)
    }

    /// Record a join; a path that is already registered keeps its first alias.
    pub fn register(&mut self, path: String, alias: String, to_many: bool) -> &JoinedRelation {
        let position = match self.joins.iter().position(|join| join.path == path) {
            Some(position) => position,
            None => {
                self.joins.push(JoinedRelation {
                    path,
                    alias,
                    to_many,
                });
                self.joins.len() - 1
            }
        };
        &self.joins[position]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Any join that can repeat rows, which makes the query need `DISTINCT`
    #[must_use]
    pub fn has_to_many(&self) -> bool {
        self.joins.iter().any(|join| join.to_many)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinedRelation> {
        self.joins.iter()
    }
}

/// Property path of `relation` on `table`
#[must_use]
pub fn property_path(table: &str, relation: &str) -> String {
    format!("{table}.{relation}")
}

/// Alias the related table of `relation` is joined under
#[must_use]
pub fn join_alias(relation: &str) -> String {
    format!("j_{relation}")
}

/// Alias of the junction table of a many-to-many `relation`
#[must_use]
pub fn junction_alias(relation: &str) -> String {
    format!("j_{relation}_via")
}
