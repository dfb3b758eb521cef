use async_trait::async_trait;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, LoaderTrait, QueryFilter, TryIntoModel,
    sea_query::{Alias, Expr, SimpleExpr},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::marker::PhantomData;

/// Models that convert to and from JSON and into their active model.
///
/// Every `DeriveEntityModel` model that also derives `Serialize` and `Deserialize` qualifies.
pub trait JsonModel<A: ActiveModelTrait>:
    Serialize + DeserializeOwned + IntoActiveModel<A> + Send + Sync
{
}

impl<M, A> JsonModel<A> for M
where
    A: ActiveModelTrait,
    M: Serialize + DeserializeOwned + IntoActiveModel<A> + Send + Sync,
{
}

/// Loads the related rows of a batch of parent models.
///
/// Implemented once per relation shape; the relation field keeps it as a trait object so a
/// resource can hold relations to any number of entity types.
#[async_trait]
pub trait RelationLoader<E: EntityTrait>: Send + Sync {
    /// Related rows of each parent, in parent order: an object or `null` for to-one relations,
    /// an array for to-many ones.
    async fn load(&self, parents: &[E::Model], db: &DatabaseConnection)
    -> Result<Vec<Value>, DbErr>;
}

/// Reads and writes rows of a related entity inside a transaction
#[async_trait]
pub trait RelatedRows: Send + Sync {
    /// First row whose `column` equals `value`
    async fn find(
        &self,
        column: &str,
        value: sea_orm::Value,
        txn: &DatabaseTransaction,
    ) -> Result<Option<Value>, DbErr>;

    /// Insert a row built from a JSON object and return it as stored
    async fn insert(&self, record: Value, txn: &DatabaseTransaction) -> Result<Value, DbErr>;

    /// Set `column` to `value` on rows whose `key_column` equals `key`; returns rows affected
    async fn set_column(
        &self,
        key_column: &str,
        key: sea_orm::Value,
        column: &str,
        value: sea_orm::Value,
        txn: &DatabaseTransaction,
    ) -> Result<u64, DbErr>;
}

/// Typed access to the rows of entity `R`
pub(super) struct Rows<R>(PhantomData<R>);

impl<R> Rows<R> {
    pub(super) fn new() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<R> RelatedRows for Rows<R>
where
    R: EntityTrait,
    R::Model: JsonModel<R::ActiveModel>,
    R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
{
    async fn find(
        &self,
        column: &str,
        value: sea_orm::Value,
        txn: &DatabaseTransaction,
    ) -> Result<Option<Value>, DbErr> {
        let found = R::find()
            .filter(Expr::col((R::default(), Alias::new(column))).eq(value))
            .one(txn)
            .await?;
        found.as_ref().map(to_json).transpose()
    }

    async fn insert(&self, record: Value, txn: &DatabaseTransaction) -> Result<Value, DbErr> {
        let active = <R::ActiveModel as ActiveModelTrait>::from_json(record)?;
        let model = active.insert(txn).await?;
        to_json(&model)
    }

    async fn set_column(
        &self,
        key_column: &str,
        key: sea_orm::Value,
        column: &str,
        value: sea_orm::Value,
        txn: &DatabaseTransaction,
    ) -> Result<u64, DbErr> {
        let result = R::update_many()
            .col_expr(Alias::new(column), SimpleExpr::Value(value))
            .filter(Expr::col((R::default(), Alias::new(key_column))).eq(key))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// One related row per parent (many-to-one, one-to-one)
pub(super) struct SingleLoader<R>(PhantomData<R>);

/// Many related rows per parent, keyed on the related side (one-to-many)
pub(super) struct ManyLoader<R>(PhantomData<R>);

/// Many related rows per parent through junction `V` (many-to-many)
pub(super) struct JunctionLoader<R, V>(PhantomData<(R, V)>);

impl<R> SingleLoader<R> {
    pub(super) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R> ManyLoader<R> {
    pub(super) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<R, V> JunctionLoader<R, V> {
    pub(super) fn new() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<E, R> RelationLoader<E> for SingleLoader<R>
where
    E: EntityTrait + sea_orm::Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: Serialize + Sync,
{
    async fn load(
        &self,
        parents: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<Value>, DbErr> {
        let related = parents.load_one(R::default(), db).await?;
        related
            .iter()
            .map(|row| row.as_ref().map_or(Ok(Value::Null), to_json))
            .collect()
    }
}

#[async_trait]
impl<E, R> RelationLoader<E> for ManyLoader<R>
where
    E: EntityTrait + sea_orm::Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: Serialize + Sync,
{
    async fn load(
        &self,
        parents: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<Value>, DbErr> {
        let related = parents.load_many(R::default(), db).await?;
        related.iter().map(|rows| to_json_array(rows.as_slice())).collect()
    }
}

#[async_trait]
impl<E, R, V> RelationLoader<E> for JunctionLoader<R, V>
where
    E: EntityTrait + sea_orm::Related<R>,
    E::Model: Sync,
    R: EntityTrait,
    R::Model: JsonModel<R::ActiveModel>,
    R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
    V: EntityTrait,
    V::Model: Sync,
{
    async fn load(
        &self,
        parents: &[E::Model],
        db: &DatabaseConnection,
    ) -> Result<Vec<Value>, DbErr> {
        let related = parents
            .load_many_to_many(R::default(), V::default(), db)
            .await?;
        related.iter().map(|rows| to_json_array(rows.as_slice())).collect()
    }
}

pub(crate) fn to_json<M: Serialize>(model: &M) -> Result<Value, DbErr> {
    serde_json::to_value(model).map_err(|e| DbErr::Json(e.to_string()))
}

fn to_json_array<M: Serialize>(models: &[M]) -> Result<Value, DbErr> {
    models
        .iter()
        .map(to_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}
