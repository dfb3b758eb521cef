//! # Resource Controller
//!
//! A [`Resource`] serves one Sea-ORM entity: list, detail, create, patch and delete, with query
//! keys translated into filters and relations resolved through the entity's `Related` impls.
//!
//! ```rust,ignore
//! use resourceful::{FieldDef, Resource, ResourceOptions};
//!
//! let db = Arc::new(Database::connect(url).await?);
//! let posts = Resource::<post::Entity>::new(
//!     db.clone(),
//!     vec![
//!         FieldDef::many_to_one::<author::Entity>("author"),
//!         FieldDef::one_to_many::<comment::Entity>("comments"),
//!         FieldDef::many_to_many::<tag::Entity, post_tag::Entity>("tags"),
//!     ],
//!     ResourceOptions {
//!         relations: vec!["author".into()],
//!         order: vec!["-created_at".into()],
//!         ..ResourceOptions::default()
//!     },
//! )?
//! .with_hooks(PostHooks);
//!
//! let app = axum::Router::new().nest("/posts", posts.router());
//! ```
//!
//! Every operation checks the allowed methods, then the shape of the id and body, then the
//! access hook, before touching storage.

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, TransactionTrait, TryIntoModel,
    sea_query::{Alias, Expr, SimpleExpr},
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::assembler::QueryAssembler;
use crate::core::hooks::{NoHooks, ResourceHooks};
use crate::core::options::{Operation, ResourceOptions};
use crate::core::plan::QueryPlan;
use crate::core::transform::{apply_deferred, transform_body};
use crate::errors::{ApiError, ConfigError};
use crate::filtering::{OrderTerm, parse_order_term};
use crate::metadata::{FieldDef, FieldIndex, FieldKind, JsonModel, to_json};
use crate::models::RequestContext;
use crate::response::ListResponse;
use crate::validation::{AcceptAll, Validator};

/// REST resource over entity `E`
pub struct Resource<E>
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
    name: String,
    db: Arc<DatabaseConnection>,
    fields: FieldIndex<E>,
    options: ResourceOptions,
    default_order: Vec<OrderTerm>,
    hooks: Arc<dyn ResourceHooks<E>>,
    validator: Arc<dyn Validator<E>>,
}

impl<E> std::fmt::Debug for Resource<E>
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<E> Resource<E>
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
    /// Build a resource from its relation declarations and options.
    ///
    /// Every column of `E` is exposed automatically; `fields` only needs the relations (and
    /// may redeclare columns). The connection may be shared with other resources through an
    /// `Arc`.
    ///
    /// # Errors
    ///
    /// Fails when a field name is reserved, when a relation cannot be addressed, or when an
    /// option names a field `E` does not have (or one of the wrong kind).
    pub fn new(
        db: impl Into<Arc<DatabaseConnection>>,
        fields: Vec<FieldDef<E>>,
        options: ResourceOptions,
    ) -> Result<Self, ConfigError> {
        let fields = FieldIndex::build(fields)?;
        check_options(&fields, &options)?;

        let default_order = options
            .order
            .iter()
            .map(|term| {
                let (column, direction) = parse_order_term(term);
                match fields.resolve(&column) {
                    Some(FieldKind::Plain(_)) => Ok(OrderTerm { column, direction }),
                    Some(_) => Err(ConfigError::WrongFieldKind {
                        option: "order",
                        name: column,
                    }),
                    None => Err(ConfigError::UnknownField {
                        option: "order",
                        name: column,
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let name = options
            .resource_name
            .clone()
            .unwrap_or_else(|| fields.table().to_string());

        tracing::debug!(
            resource = %name,
            relations = fields.relations().count(),
            "resource configured"
        );

        Ok(Self {
            name,
            db: db.into(),
            fields,
            options,
            default_order,
            hooks: Arc::new(NoHooks),
            validator: Arc::new(AcceptAll),
        })
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl ResourceHooks<E> + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validator: impl Validator<E> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Name used in logs, errors and the `OpenAPI` document
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    #[must_use]
    pub fn fields(&self) -> &FieldIndex<E> {
        &self.fields
    }

    fn assembler(&self) -> QueryAssembler<'_, E> {
        QueryAssembler::new(&self.fields, &self.options, &self.default_order)
    }
}

impl<E> Resource<E>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    /// `GET /`: one page of rows matching the query keys.
    ///
    /// # Errors
    ///
    /// `BadMethod`, `Unauthorized`, `InvalidQueryKey`, or a database error.
    pub async fn list(&self, ctx: &RequestContext) -> Result<ListResponse, ApiError> {
        self.allow(ctx, Operation::List)?;
        self.check_access(ctx, Operation::List).await?;

        let plan = self.assembler().list(&ctx.query)?;
        let plan = self.hooks.pre_list(ctx, plan).await?;
        let (rows, total) = plan.fetch_page(self.db.as_ref()).await?;
        let rows = self.hooks.after_list(ctx, rows).await?;
        let objects = self.render(&plan, &rows).await?;

        let endpoint = format!("{}{}", self.options.base_url, ctx.path);
        Ok(ListResponse::new(
            objects,
            plan.skip(),
            plan.take().unwrap_or(total),
            total,
            &endpoint,
            &ctx.query,
        ))
    }

    /// `GET /{id}`
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id, `NotFound` when no row matches, plus the list errors.
    pub async fn detail(&self, ctx: &RequestContext) -> Result<Value, ApiError> {
        self.allow(ctx, Operation::Detail)?;
        let id = parse_id(ctx)?;
        self.check_access(ctx, Operation::Detail).await?;

        let plan = self.assembler().detail(&ctx.query, id)?;
        let plan = self.hooks.pre_detail(ctx, plan).await?;
        let row = plan
            .fetch_one(self.db.as_ref())
            .await?
            .ok_or_else(|| self.not_found(id))?;
        let row = self.hooks.after_detail(ctx, row).await?;

        self.render_one(plan.relations(), plan.projection(), row).await
    }

    /// `POST /`: insert the body, with its relation values, in one transaction.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a non-object body or a dangling relation id, `ValidationFailed` when
    /// the validator objects, and the fixed persistence error when the insert fails.
    pub async fn create(&self, ctx: &RequestContext) -> Result<Value, ApiError> {
        self.allow(ctx, Operation::Create)?;
        let mut body = object_body(ctx)?;
        self.check_access(ctx, Operation::Create).await?;
        // Keys are assigned by the database
        body.remove(&self.fields.primary_key().info.name);

        let txn = self.db.begin().await?;
        let transformed = transform_body(&self.fields, body, &txn).await?;

        let candidate = E::ActiveModel::from_json(Value::Object(transformed.columns))
            .map_err(|e| ApiError::bad_request(format!("Invalid body: {e}")))?;
        let errors = self.validator.validate(&candidate);
        if !errors.is_empty() {
            tracing::warn!(
                resource = %self.name,
                fields = ?errors.field_names(),
                "create rejected by validator"
            );
            return Err(errors.into());
        }

        let candidate = self.hooks.pre_post(ctx, candidate).await?;
        let row = candidate
            .insert(&txn)
            .await
            .map_err(|e| self.persistence_failure(&e))?;
        apply_deferred(transformed.deferred, &to_json(&row)?, &txn).await?;
        txn.commit()
            .await
            .map_err(|e| self.persistence_failure(&e))?;

        tracing::debug!(resource = %self.name, "row created");
        let row = self.hooks.after_post(ctx, row).await?;
        self.render_one(&self.options.relations, &self.options.select, row)
            .await
    }

    /// `PATCH /{id}`: merge the updatable body keys onto the row.
    ///
    /// Keys outside `updatable_fields`, or listed in `read_only_fields`, are dropped silently.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id or body, `NotFound` when no row matches, and the fixed
    /// persistence error when the update fails.
    pub async fn patch(&self, ctx: &RequestContext) -> Result<Value, ApiError> {
        self.allow(ctx, Operation::Patch)?;
        let id = parse_id(ctx)?;
        let body = object_body(ctx)?;
        self.check_access(ctx, Operation::Patch).await?;

        let primary_key = &self.fields.primary_key().info.name;
        let body: Map<String, Value> = body
            .into_iter()
            .filter(|(key, _)| key != primary_key && self.options.is_updatable(key))
            .collect();

        let txn = self.db.begin().await?;
        let existing = E::find()
            .filter(self.primary_key_eq(id))
            .one(&txn)
            .await?
            .ok_or_else(|| self.not_found(id))?;

        let transformed = transform_body(&self.fields, body, &txn).await?;
        // Overlay onto the stored row so partial bodies still deserialize into a full model
        let mut merged = match to_json(&existing)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(transformed.columns);
        let mut candidate = existing.into_active_model();
        candidate
            .set_from_json(Value::Object(merged))
            .map_err(|e| ApiError::bad_request(format!("Invalid body: {e}")))?;

        let candidate = self.hooks.pre_patch(ctx, candidate).await?;
        let row = candidate
            .update(&txn)
            .await
            .map_err(|e| self.persistence_failure(&e))?;
        apply_deferred(transformed.deferred, &to_json(&row)?, &txn).await?;
        txn.commit()
            .await
            .map_err(|e| self.persistence_failure(&e))?;

        tracing::debug!(resource = %self.name, id, "row patched");
        let row = self.hooks.after_patch(ctx, row).await?;
        self.render_one(&self.options.relations, &self.options.select, row)
            .await
    }

    /// `DELETE /{id}`. A missing row is not an error; `after_delete` sees zero affected rows.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a malformed id, or a database error.
    pub async fn delete(&self, ctx: &RequestContext) -> Result<(), ApiError> {
        self.allow(ctx, Operation::Delete)?;
        let id = parse_id(ctx)?;
        self.check_access(ctx, Operation::Delete).await?;

        let result = E::delete_many()
            .filter(self.primary_key_eq(id))
            .exec(self.db.as_ref())
            .await?;
        tracing::debug!(
            resource = %self.name,
            id,
            rows_affected = result.rows_affected,
            "delete executed"
        );
        self.hooks.after_delete(ctx, &result).await
    }

    fn allow(&self, ctx: &RequestContext, operation: Operation) -> Result<(), ApiError> {
        if self.options.allows(operation) {
            Ok(())
        } else {
            Err(ApiError::bad_method(ctx.method.as_str()))
        }
    }

    async fn check_access(
        &self,
        ctx: &RequestContext,
        operation: Operation,
    ) -> Result<(), ApiError> {
        if !self.hooks.has_access(ctx).await {
            tracing::debug!(resource = %self.name, ?operation, "access denied");
            return Err(ApiError::unauthorized("Unauthorized"));
        }
        Ok(())
    }

    async fn render(&self, plan: &QueryPlan<E>, rows: &[E::Model]) -> Result<Vec<Value>, ApiError> {
        self.serialize(plan.relations(), plan.projection(), rows)
            .await
    }

    async fn render_one(
        &self,
        relations: &[String],
        projection: &[String],
        row: E::Model,
    ) -> Result<Value, ApiError> {
        self.serialize(relations, projection, std::slice::from_ref(&row))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::internal("Row vanished during serialization", None))
    }

    /// Rows to JSON, with eager relations nested under their names and the projection applied
    async fn serialize(
        &self,
        relations: &[String],
        projection: &[String],
        rows: &[E::Model],
    ) -> Result<Vec<Value>, ApiError> {
        let mut objects = rows.iter().map(to_json).collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(objects);
        }

        for name in relations {
            let relation = self.fields.relation(name).ok_or_else(|| {
                ApiError::internal("Unknown eager relation", Some(name.clone()))
            })?;
            let loaded = relation.loader().load(rows, self.db.as_ref()).await?;
            for (object, related) in objects.iter_mut().zip(loaded) {
                if let Value::Object(map) = object {
                    map.insert(name.clone(), related);
                }
            }
        }

        if !projection.is_empty() {
            for object in &mut objects {
                if let Value::Object(map) = object {
                    map.retain(|key, _| projection.contains(key) || relations.contains(key));
                }
            }
        }
        Ok(objects)
    }

    fn primary_key_eq(&self, id: i64) -> SimpleExpr {
        Expr::col((
            Alias::new(self.fields.table()),
            Alias::new(&self.fields.primary_key().info.name),
        ))
        .eq(id)
    }

    fn not_found(&self, id: i64) -> ApiError {
        ApiError::not_found(&self.name, Some(id.to_string()))
    }

    fn persistence_failure(&self, err: &DbErr) -> ApiError {
        tracing::error!(resource = %self.name, error = %err, "could not persist row");
        ApiError::persistence(err)
    }
}

fn parse_id(ctx: &RequestContext) -> Result<i64, ApiError> {
    ctx.param("id")
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request("Id must be a positive integer"))
}

fn object_body(ctx: &RequestContext) -> Result<Map<String, Value>, ApiError> {
    match &ctx.body {
        Some(Value::Object(map)) => Ok(map.clone()),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

/// Every name an option refers to must exist, with the kind the option needs
fn check_options<E: EntityTrait>(
    fields: &FieldIndex<E>,
    options: &ResourceOptions,
) -> Result<(), ConfigError> {
    for name in &options.relations {
        match fields.resolve(name) {
            None => {
                return Err(ConfigError::UnknownField {
                    option: "relations",
                    name: name.clone(),
                });
            }
            Some(kind) if kind.is_plain() => {
                return Err(ConfigError::WrongFieldKind {
                    option: "relations",
                    name: name.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let named = [
        ("select", &options.select),
        ("updatable_fields", &options.updatable_fields),
        ("read_only_fields", &options.read_only_fields),
    ];
    for (option, names) in named {
        if let Some(name) = names.iter().find(|name| fields.resolve(name).is_none()) {
            return Err(ConfigError::UnknownField {
                option,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_parse_id() {
        let ctx = |id: &str| RequestContext::new(Method::GET, "/").with_param("id", id);
        assert_eq!(parse_id(&ctx("42")).unwrap(), 42);
        for bad in ["0", "-3", "abc", "1.5", ""] {
            assert!(parse_id(&ctx(bad)).is_err(), "{bad}");
        }
        assert!(parse_id(&RequestContext::new(Method::GET, "/")).is_err());
    }

    #[test]
    fn test_object_body() {
        let ctx = RequestContext::new(Method::POST, "/").with_body(serde_json::json!({"a": 1}));
        assert_eq!(object_body(&ctx).unwrap().len(), 1);

        let ctx = RequestContext::new(Method::POST, "/").with_body(serde_json::json!([1, 2]));
        assert!(object_body(&ctx).is_err());
        assert!(object_body(&RequestContext::new(Method::POST, "/")).is_err());
    }
}
