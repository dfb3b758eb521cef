use sea_orm::{
    EntityTrait,
    sea_query::{Alias, Expr},
};

use crate::core::options::ResourceOptions;
use crate::core::plan::QueryPlan;
use crate::errors::ApiError;
use crate::filtering::sort::OrderTerm;
use crate::filtering::{QueryKey, apply_filter, parse_ordering, parse_page};
use crate::metadata::FieldIndex;
use crate::models::QueryParams;

const ORDER_BY_KEY: &str = "order_by";

/// Builds list and detail plans from a request's query string
pub struct QueryAssembler<'a, E: EntityTrait> {
    fields: &'a FieldIndex<E>,
    options: &'a ResourceOptions,
    default_order: &'a [OrderTerm],
}

impl<'a, E: EntityTrait> QueryAssembler<'a, E> {
    #[must_use]
    pub fn new(
        fields: &'a FieldIndex<E>,
        options: &'a ResourceOptions,
        default_order: &'a [OrderTerm],
    ) -> Self {
        Self {
            fields,
            options,
            default_order,
        }
    }

    /// Relations, filters, ordering, then the page window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryKey` for any key that cannot be applied.
    pub fn list(&self, query: &QueryParams) -> Result<QueryPlan<E>, ApiError> {
        let mut plan = self.seeded();
        self.apply_filters(&mut plan, query)?;

        let order = match query.get_first(ORDER_BY_KEY) {
            Some(raw) => parse_ordering(raw, self.fields, ORDER_BY_KEY)?,
            None => self.default_order.to_vec(),
        };
        plan.set_order(order);

        let page = parse_page(query, self.options.take, self.options.max_take)?;
        plan.set_skip(page.offset);
        plan.set_take(Some(page.limit));

        tracing::debug!(
            table = %plan.table(),
            joins = plan.joins().len(),
            skip = page.offset,
            take = page.limit,
            "assembled list plan"
        );
        Ok(plan)
    }

    /// Relations and filters, narrowed to the row with primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryKey` for any filter key that cannot be applied.
    pub fn detail(&self, query: &QueryParams, id: i64) -> Result<QueryPlan<E>, ApiError> {
        let mut plan = self.seeded();
        let primary_key = Expr::col((
            Alias::new(self.fields.table()),
            Alias::new(&self.fields.primary_key().info.name),
        ));
        plan.filter(primary_key.eq(id));
        self.apply_filters(&mut plan, query)?;

        tracing::debug!(table = %plan.table(), id, "assembled detail plan");
        Ok(plan)
    }

    fn seeded(&self) -> QueryPlan<E> {
        let mut plan = QueryPlan::new(
            self.fields.table(),
            self.fields.primary_key().info.name.clone(),
        );
        plan.set_relations(self.options.relations.clone());
        plan.set_projection(self.options.select.clone());
        plan
    }

    fn apply_filters(&self, plan: &mut QueryPlan<E>, query: &QueryParams) -> Result<(), ApiError> {
        for (key, value) in query.iter() {
            if self.options.is_special_key(key) {
                continue;
            }
            let key = QueryKey::parse(key, value.clone());
            apply_filter(plan, self.fields, &key)?;
        }
        Ok(())
    }
}
