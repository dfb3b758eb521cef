//! Relation values in create and patch bodies.
//!
//! A body may carry relations in several shapes:
//!
//! ```json
//! {
//!   "title": "Hello",
//!   "author": 3,                          // many-to-one: existing row by id
//!   "profile": {"bio": "..."},            // one-to-one: new row, linked after the parent
//!   "comments": [{"text": "first!"}, 12], // one-to-many: new child, existing child re-pointed
//!   "tags": [1, 2]                        // many-to-many: junction rows
//! }
//! ```
//!
//! Foreign keys held by the parent are resolved before it is written. Everything that needs
//! the parent's key is deferred until the parent exists, inside the same transaction.

use sea_orm::{
    ConnectionTrait, DatabaseTransaction, EntityTrait,
    sea_query::{Alias, Expr, Query, SimpleExpr},
};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::errors::ApiError;
use crate::metadata::{FieldIndex, RelationField, RelationKind};

/// A write that needs the parent's key
pub(crate) enum DeferredWrite<E: EntityTrait> {
    /// Insert a new related row pointing at the parent
    InsertChild {
        relation: Arc<RelationField<E>>,
        record: Map<String, Value>,
    },
    /// Re-point an existing related row at the parent
    AdoptChild {
        relation: Arc<RelationField<E>>,
        id: Value,
    },
    /// Make the junction rows of the parent exactly these related ids
    ReplaceLinks {
        relation: Arc<RelationField<E>>,
        ids: Vec<Value>,
    },
}

/// A body split into the parent's own columns and the deferred relation writes
pub(crate) struct TransformedBody<E: EntityTrait> {
    pub columns: Map<String, Value>,
    pub deferred: Vec<DeferredWrite<E>>,
}

enum Resolved {
    /// Store this value under the given column instead of the relation key
    Column(String, Value),
    Deferred,
    /// Leave the key as it was sent
    PassThrough(Value),
}

/// Resolve every relation key of `body`.
///
/// # Errors
///
/// Returns `BadRequest` when a referenced related row does not exist or an array item has an
/// unusable shape, and a database error when a lookup or insert fails.
pub(crate) async fn transform_body<E: EntityTrait>(
    fields: &FieldIndex<E>,
    body: Map<String, Value>,
    txn: &DatabaseTransaction,
) -> Result<TransformedBody<E>, ApiError> {
    let mut columns = Map::new();
    let mut deferred = Vec::new();

    for (key, value) in body {
        let Some(relation) = fields.relation(&key) else {
            columns.insert(key, value);
            continue;
        };

        let resolved = match relation.kind {
            RelationKind::ManyToOne | RelationKind::OneToOne if relation.keys.owns_foreign_key => {
                resolve_owned(relation, value, txn).await?
            }
            RelationKind::OneToOne => defer_single(relation, value, &mut deferred),
            RelationKind::OneToMany => defer_children(relation, value, &mut deferred)?,
            RelationKind::ManyToMany => defer_links(relation, value, &mut deferred)?,
            RelationKind::ManyToOne => Resolved::PassThrough(value),
        };

        match resolved {
            Resolved::Column(column, value) => {
                columns.insert(column, value);
            }
            Resolved::Deferred => {}
            Resolved::PassThrough(value) => {
                columns.insert(key, value);
            }
        }
    }

    Ok(TransformedBody { columns, deferred })
}

/// Run the deferred writes once the parent row (as JSON) exists.
///
/// # Errors
///
/// Returns `BadRequest` when a referenced related row does not exist, and a database error
/// when a write fails.
pub(crate) async fn apply_deferred<E: EntityTrait>(
    deferred: Vec<DeferredWrite<E>>,
    parent: &Value,
    txn: &DatabaseTransaction,
) -> Result<(), ApiError> {
    for write in deferred {
        match write {
            DeferredWrite::InsertChild {
                relation,
                mut record,
            } => {
                let parent_key = parent_key(&relation, parent)?;
                record.insert(relation.keys.remote.clone(), parent_key);
                relation
                    .rows()
                    .insert(Value::Object(record), txn)
                    .await
                    .map_err(ApiError::database)?;
            }
            DeferredWrite::AdoptChild { relation, id } => {
                let parent_key = scalar(&parent_key(&relation, parent)?)?;
                let affected = relation
                    .rows()
                    .set_column(
                        &relation.target.primary_key,
                        scalar(&id)?,
                        &relation.keys.remote,
                        parent_key,
                        txn,
                    )
                    .await
                    .map_err(ApiError::database)?;
                if affected == 0 {
                    return Err(missing_related(&relation, &id));
                }
            }
            DeferredWrite::ReplaceLinks { relation, ids } => {
                replace_links(&relation, parent, &ids, txn).await?;
            }
        }
    }
    Ok(())
}

async fn resolve_owned<E: EntityTrait>(
    relation: &RelationField<E>,
    value: Value,
    txn: &DatabaseTransaction,
) -> Result<Resolved, ApiError> {
    let column = relation.keys.local.clone();
    if value.is_null() {
        return Ok(Resolved::Column(column, Value::Null));
    }
    if let Some(id) = reference_id(relation, &value) {
        let related = find_related(relation, &id, txn).await?;
        let key = related.get(&relation.keys.remote).cloned().unwrap_or(id);
        return Ok(Resolved::Column(column, key));
    }
    match value {
        Value::Object(record) => {
            let inserted = relation
                .rows()
                .insert(Value::Object(record), txn)
                .await
                .map_err(ApiError::database)?;
            let key = inserted
                .get(&relation.keys.remote)
                .cloned()
                .unwrap_or(Value::Null);
            Ok(Resolved::Column(column, key))
        }
        other => Ok(Resolved::PassThrough(other)),
    }
}

fn defer_single<E: EntityTrait>(
    relation: &Arc<RelationField<E>>,
    value: Value,
    deferred: &mut Vec<DeferredWrite<E>>,
) -> Resolved {
    match child_write(relation, value) {
        Ok(write) => {
            deferred.push(write);
            Resolved::Deferred
        }
        Err(value) => Resolved::PassThrough(value),
    }
}

fn defer_children<E: EntityTrait>(
    relation: &Arc<RelationField<E>>,
    value: Value,
    deferred: &mut Vec<DeferredWrite<E>>,
) -> Result<Resolved, ApiError> {
    let Value::Array(items) = value else {
        return Ok(Resolved::PassThrough(value));
    };
    for item in items {
        let write = child_write(relation, item).map_err(|item| invalid_item(relation, &item))?;
        deferred.push(write);
    }
    Ok(Resolved::Deferred)
}

fn defer_links<E: EntityTrait>(
    relation: &Arc<RelationField<E>>,
    value: Value,
    deferred: &mut Vec<DeferredWrite<E>>,
) -> Result<Resolved, ApiError> {
    let Value::Array(items) = value else {
        return Ok(Resolved::PassThrough(value));
    };
    let ids = items
        .iter()
        .map(|item| reference_id(relation, item).ok_or_else(|| invalid_item(relation, item)))
        .collect::<Result<Vec<_>, _>>()?;
    deferred.push(DeferredWrite::ReplaceLinks {
        relation: Arc::clone(relation),
        ids,
    });
    Ok(Resolved::Deferred)
}

/// New object → insert, reference → adopt; anything else is handed back
fn child_write<E: EntityTrait>(
    relation: &Arc<RelationField<E>>,
    value: Value,
) -> Result<DeferredWrite<E>, Value> {
    if let Some(id) = reference_id(relation, &value) {
        return Ok(DeferredWrite::AdoptChild {
            relation: Arc::clone(relation),
            id,
        });
    }
    match value {
        Value::Object(record) => Ok(DeferredWrite::InsertChild {
            relation: Arc::clone(relation),
            record,
        }),
        other => Err(other),
    }
}

/// Id of an existing related row: an integer, or an object carrying its primary key
fn reference_id<E: EntityTrait>(relation: &RelationField<E>, value: &Value) -> Option<Value> {
    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(value.clone()),
        Value::Object(record) => record
            .get(&relation.target.primary_key)
            .filter(|id| !id.is_null())
            .cloned(),
        _ => None,
    }
}

async fn find_related<E: EntityTrait>(
    relation: &RelationField<E>,
    id: &Value,
    txn: &DatabaseTransaction,
) -> Result<Value, ApiError> {
    relation
        .rows()
        .find(&relation.target.primary_key, scalar(id)?, txn)
        .await
        .map_err(ApiError::database)?
        .ok_or_else(|| missing_related(relation, id))
}

async fn replace_links<E: EntityTrait>(
    relation: &RelationField<E>,
    parent: &Value,
    ids: &[Value],
    txn: &DatabaseTransaction,
) -> Result<(), ApiError> {
    let Some(junction) = &relation.keys.junction else {
        return Err(ApiError::internal(
            "Relation is missing its junction table",
            Some(relation.name.clone()),
        ));
    };
    let parent_key = scalar(&parent_key(relation, parent)?)?;
    let backend = txn.get_database_backend();

    let mut clear = Query::delete();
    clear
        .from_table(Alias::new(&junction.table))
        .and_where(Expr::col(Alias::new(&junction.local)).eq(parent_key.clone()));
    txn.execute(backend.build(&clear))
        .await
        .map_err(ApiError::database)?;

    for id in ids {
        let related = find_related(relation, id, txn).await?;
        let related_key = related.get(&relation.keys.remote).unwrap_or(id);

        let mut link = Query::insert();
        link.into_table(Alias::new(&junction.table))
            .columns([Alias::new(&junction.local), Alias::new(&junction.remote)])
            .values([
                SimpleExpr::Value(parent_key.clone()),
                SimpleExpr::Value(scalar(related_key)?),
            ])
            .map_err(|e| ApiError::internal("Could not build junction insert", Some(e.to_string())))?;
        txn.execute(backend.build(&link))
            .await
            .map_err(ApiError::database)?;
    }

    tracing::debug!(relation = %relation.name, links = ids.len(), "replaced junction rows");
    Ok(())
}

fn parent_key<E: EntityTrait>(relation: &RelationField<E>, parent: &Value) -> Result<Value, ApiError> {
    parent
        .get(&relation.keys.local)
        .filter(|key| !key.is_null())
        .cloned()
        .ok_or_else(|| {
            ApiError::internal(
                "Parent row has no key for relation",
                Some(format!("{}: {}", relation.name, relation.keys.local)),
            )
        })
}

/// JSON scalar → bindable value
fn scalar(value: &Value) -> Result<sea_orm::Value, ApiError> {
    match value {
        // Unsigned values past i64::MAX cannot be bound by every backend
        Value::Number(number) if number.is_u64() && number.as_i64().is_none() => {
            Err(ApiError::bad_request(format!("Key {number} is out of range")))
        }
        Value::Number(number) => number
            .as_i64()
            .map(sea_orm::Value::from)
            .or_else(|| number.as_f64().map(sea_orm::Value::from))
            .ok_or_else(|| ApiError::bad_request(format!("Unsupported number {number}"))),
        Value::String(text) => Ok(sea_orm::Value::from(text.clone())),
        Value::Bool(flag) => Ok(sea_orm::Value::from(*flag)),
        other => Err(ApiError::bad_request(format!("Expected a scalar key, got {other}"))),
    }
}

fn missing_related<E: EntityTrait>(relation: &RelationField<E>, id: &Value) -> ApiError {
    ApiError::bad_request(format!("{}: no related row with id {id}", relation.name))
}

fn invalid_item<E: EntityTrait>(relation: &RelationField<E>, item: &Value) -> ApiError {
    ApiError::bad_request(format!("{}: cannot link {item}", relation.name))
}
