//! The query plan handed to `pre_list`/`pre_detail` hooks.
//!
//! A plan is a Sea-ORM [`Select`] plus the parts that stay editable until execution: ordering,
//! the page window, eager relations and the response projection. Hooks may add filters
//! (`plan.filter(...)`), reorder, or change the page before anything runs.

use sea_orm::{
    ConnectionTrait, DbBackend, DbErr, EntityTrait, JoinType, Order, PaginatorTrait,
    QueryOrder, QuerySelect, QueryTrait, Select,
    sea_query::{Alias, Expr, IntoIden, SimpleExpr, TableRef},
};
use std::mem;

use crate::filtering::joined::{JoinRegistry, join_alias, junction_alias, property_path};
use crate::filtering::sort::OrderTerm;
use crate::metadata::RelationField;

pub struct QueryPlan<E: EntityTrait> {
    table: String,
    primary_key: String,
    select: Select<E>,
    joins: JoinRegistry,
    relations: Vec<String>,
    projection: Vec<String>,
    order: Vec<OrderTerm>,
    skip: u64,
    take: Option<u64>,
}

impl<E: EntityTrait> QueryPlan<E> {
    /// Unfiltered plan over `table`, ordered by `primary_key` unless told otherwise
    #[must_use]
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            select: E::find(),
            joins: JoinRegistry::new(),
            relations: Vec::new(),
            projection: Vec::new(),
            order: Vec::new(),
            skip: 0,
            take: None,
        }
    }

    /// AND a condition onto the plan
    pub fn filter(&mut self, predicate: SimpleExpr) {
        QueryTrait::query(&mut self.select).and_where(predicate);
    }

    /// Join `relation` unless the plan already did; returns the alias its table is joined
    /// under.
    pub fn join(&mut self, relation: &RelationField<E>) -> String {
        let path = property_path(&self.table, &relation.name);
        if let Some(existing) = self.joins.get(&path) {
            return existing.alias.clone();
        }

        let alias = join_alias(&relation.name);
        let mut defs = relation.join_defs().into_iter();
        let select = mem::replace(&mut self.select, E::find());
        self.select = match (defs.next(), defs.next()) {
            (Some(via), Some(mut to)) => {
                let junction = junction_alias(&relation.name);
                to.from_tbl = TableRef::Table(Alias::new(&junction).into_iden());
                select
                    .join_as(JoinType::LeftJoin, via, Alias::new(&junction))
                    .join_as(JoinType::LeftJoin, to, Alias::new(&alias))
            }
            (Some(to), None) => select.join_as(JoinType::LeftJoin, to, Alias::new(&alias)),
            (None, _) => select,
        };

        tracing::trace!(relation = %relation.name, alias = %alias, "joined relation");
        self.joins
            .register(path, alias, relation.kind.is_to_many())
            .alias
            .clone()
    }

    #[must_use]
    pub fn joins(&self) -> &JoinRegistry {
        &self.joins
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Relations loaded into every returned row
    #[must_use]
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    pub fn set_relations(&mut self, relations: Vec<String>) {
        self.relations = relations;
    }

    /// Fields kept in the response; empty keeps all of them
    #[must_use]
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: Vec<String>) {
        self.projection = projection;
    }

    #[must_use]
    pub fn order(&self) -> &[OrderTerm] {
        &self.order
    }

    pub fn set_order(&mut self, order: Vec<OrderTerm>) {
        self.order = order;
    }

    #[must_use]
    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn set_skip(&mut self, skip: u64) {
        self.skip = skip;
    }

    #[must_use]
    pub fn take(&self) -> Option<u64> {
        self.take
    }

    pub fn set_take(&mut self, take: Option<u64>) {
        self.take = take;
    }

    /// Filters and joins, without ordering or the page window
    fn filtered(&self) -> Select<E> {
        let select = self.select.clone();
        if self.joins.has_to_many() {
            select.distinct()
        } else {
            select
        }
    }

    fn paged(&self) -> Select<E> {
        let mut select = self.filtered();
        if self.order.is_empty() {
            select = select.order_by(self.column(&self.primary_key), Order::Asc);
        }
        for term in &self.order {
            select = select.order_by(self.column(&term.column), term.direction.clone());
        }
        select.offset(self.skip).limit(self.take)
    }

    fn column(&self, name: &str) -> SimpleExpr {
        Expr::col((Alias::new(&self.table), Alias::new(name))).into()
    }

    /// The page query as SQL with its values inlined
    #[must_use]
    pub fn to_sql(&self, backend: DbBackend) -> String {
        self.paged().build(backend).to_string()
    }

    /// Rows of the page plus the number of rows matching the filters
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub async fn fetch_page<C>(&self, db: &C) -> Result<(Vec<E::Model>, u64), DbErr>
    where
        C: ConnectionTrait,
        E::Model: Sync,
    {
        let total = self.filtered().count(db).await?;
        let rows = self.paged().all(db).await?;
        Ok((rows, total))
    }

    /// First row matching the filters
    ///
    /// # Errors
    ///
    /// Propagates database errors.
    pub async fn fetch_one<C>(&self, db: &C) -> Result<Option<E::Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        self.filtered().one(db).await
    }
}

impl<E: EntityTrait> std::fmt::Debug for QueryPlan<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlan")
            .field("table", &self.table)
            .field("joins", &self.joins)
            .field("relations", &self.relations)
            .field("projection", &self.projection)
            .field("order", &self.order)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish_non_exhaustive()
    }
}
