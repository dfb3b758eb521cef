//! Field metadata of an exposed entity.
//!
//! Every name a request can use (filter keys, `order_by`, body keys) resolves through a
//! [`FieldIndex`] built once per resource. Plain columns come straight from the entity's
//! `Column` enum; relations are declared with the [`FieldDef`] constructors, which read the
//! foreign keys out of Sea-ORM's `Related` impls.

mod related;

use sea_orm::{
    ActiveModelBehavior, ColumnTrait, ColumnType, EntityTrait, IdenStatic, Identity, Iterable,
    PrimaryKeyToColumn, Related, RelationDef, TryIntoModel,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ConfigError;
use crate::filtering::query_key::{KEY_DELIMITER, is_modifier_token};

pub use related::JsonModel;
pub use related::{RelatedRows, RelationLoader};
pub(crate) use related::to_json;
use related::{JunctionLoader, ManyLoader, Rows, SingleLoader};

/// Column name and SQL type, as needed to coerce filter values
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

/// Table seen on the far side of a relation
#[derive(Debug, Clone)]
pub struct RelatedTable {
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnInfo>,
}

impl RelatedTable {
    fn of<R: EntityTrait>() -> Self {
        Self {
            table: R::default().table_name().to_string(),
            primary_key: primary_key_name::<R>(),
            columns: column_infos::<R>(),
        }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Joins over these can repeat the parent row
    #[must_use]
    pub const fn is_to_many(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }

    /// Rank used when the same name is declared twice; the higher one wins
    const fn priority(self) -> u8 {
        match self {
            Self::ManyToMany => 4,
            Self::OneToMany => 3,
            Self::ManyToOne => 2,
            Self::OneToOne => 1,
        }
    }
}

/// Junction table columns of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionKeys {
    pub table: String,
    /// Junction column pointing at this entity
    pub local: String,
    /// Junction column pointing at the related entity
    pub remote: String,
}

/// Key columns a relation joins on.
///
/// `local` lives on this entity and `remote` on the related one. When `owns_foreign_key` is
/// set, `local` is the foreign key (many-to-one, owning one-to-one); otherwise `remote` is.
/// Many-to-many relations go through `junction` and join `local` to `junction.local` and
/// `junction.remote` to `remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationKeys {
    pub local: String,
    pub remote: String,
    pub owns_foreign_key: bool,
    pub junction: Option<JunctionKeys>,
}

#[derive(Clone, Copy)]
enum JoinPath {
    Direct(fn() -> RelationDef),
    Junction {
        via: fn() -> Option<RelationDef>,
        to: fn() -> RelationDef,
    },
}

/// A relation field of entity `E`
pub struct RelationField<E: EntityTrait> {
    pub name: String,
    pub kind: RelationKind,
    pub target: RelatedTable,
    pub keys: RelationKeys,
    path: JoinPath,
    loader: Arc<dyn RelationLoader<E>>,
    rows: Arc<dyn RelatedRows>,
}

impl<E: EntityTrait> RelationField<E> {
    /// Relation definitions to join, in order, starting at `E`.
    ///
    /// Many-to-many relations yield the junction hop first.
    #[must_use]
    pub fn join_defs(&self) -> Vec<RelationDef> {
        match self.path {
            JoinPath::Direct(to) => vec![to()],
            JoinPath::Junction { via, to } => via().into_iter().chain([to()]).collect(),
        }
    }

    #[must_use]
    pub fn loader(&self) -> &dyn RelationLoader<E> {
        self.loader.as_ref()
    }

    /// Reads and writes on the related table
    #[must_use]
    pub fn rows(&self) -> &dyn RelatedRows {
        self.rows.as_ref()
    }
}

impl<E: EntityTrait> fmt::Debug for RelationField<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("target", &self.target.table)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// A plain column of entity `E`
#[derive(Debug, Clone)]
pub struct ColumnField<E: EntityTrait> {
    pub column: E::Column,
    pub info: ColumnInfo,
}

/// What a field name resolves to
#[derive(Debug)]
pub enum FieldKind<E: EntityTrait> {
    Plain(ColumnField<E>),
    OneToOne(Arc<RelationField<E>>),
    OneToMany(Arc<RelationField<E>>),
    ManyToOne(Arc<RelationField<E>>),
    ManyToMany(Arc<RelationField<E>>),
}

impl<E: EntityTrait> Clone for FieldKind<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(column) => Self::Plain(column.clone()),
            Self::OneToOne(relation) => Self::OneToOne(Arc::clone(relation)),
            Self::OneToMany(relation) => Self::OneToMany(Arc::clone(relation)),
            Self::ManyToOne(relation) => Self::ManyToOne(Arc::clone(relation)),
            Self::ManyToMany(relation) => Self::ManyToMany(Arc::clone(relation)),
        }
    }
}

impl<E: EntityTrait> FieldKind<E> {
    fn from_relation(relation: RelationField<E>) -> Self {
        let kind = relation.kind;
        let relation = Arc::new(relation);
        match kind {
            RelationKind::OneToOne => Self::OneToOne(relation),
            RelationKind::OneToMany => Self::OneToMany(relation),
            RelationKind::ManyToOne => Self::ManyToOne(relation),
            RelationKind::ManyToMany => Self::ManyToMany(relation),
        }
    }

    #[must_use]
    pub fn relation(&self) -> Option<&Arc<RelationField<E>>> {
        match self {
            Self::Plain(_) => None,
            Self::OneToOne(relation)
            | Self::OneToMany(relation)
            | Self::ManyToOne(relation)
            | Self::ManyToMany(relation) => Some(relation),
        }
    }

    #[must_use]
    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain(_))
    }

    fn priority(&self) -> u8 {
        self.relation().map_or(0, |relation| relation.kind.priority())
    }
}

/// Declaration of one field, handed to the resource builder
pub struct FieldDef<E: EntityTrait> {
    name: String,
    kind: Result<FieldKind<E>, ConfigError>,
}

impl<E: EntityTrait> FieldDef<E> {
    /// A plain column, under its column name
    #[must_use]
    pub fn column(column: E::Column) -> Self {
        let info = column_info(column);
        Self {
            name: info.name.clone(),
            kind: Ok(FieldKind::Plain(ColumnField { column, info })),
        }
    }

    /// Relation whose foreign key sits on `E` when `E` belongs to `R`, on `R` otherwise
    #[must_use]
    pub fn one_to_one<R>(name: &str) -> Self
    where
        E: Related<R>,
        E::Model: Sync,
        R: EntityTrait,
        R::Model: JsonModel<R::ActiveModel>,
        R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
    {
        Self::direct::<R>(
            name,
            RelationKind::OneToOne,
            Arc::new(SingleLoader::<R>::new()),
            Arc::new(Rows::<R>::new()),
        )
    }

    #[must_use]
    pub fn many_to_one<R>(name: &str) -> Self
    where
        E: Related<R>,
        E::Model: Sync,
        R: EntityTrait,
        R::Model: JsonModel<R::ActiveModel>,
        R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
    {
        Self::direct::<R>(
            name,
            RelationKind::ManyToOne,
            Arc::new(SingleLoader::<R>::new()),
            Arc::new(Rows::<R>::new()),
        )
    }

    #[must_use]
    pub fn one_to_many<R>(name: &str) -> Self
    where
        E: Related<R>,
        E::Model: Sync,
        R: EntityTrait,
        R::Model: JsonModel<R::ActiveModel>,
        R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
    {
        Self::direct::<R>(
            name,
            RelationKind::OneToMany,
            Arc::new(ManyLoader::<R>::new()),
            Arc::new(Rows::<R>::new()),
        )
    }

    /// Relation through junction entity `V`, as declared by `E`'s `Related<R>::via`
    #[must_use]
    pub fn many_to_many<R, V>(name: &str) -> Self
    where
        E: Related<R>,
        E::Model: Sync,
        R: EntityTrait,
        R::Model: JsonModel<R::ActiveModel>,
        R::ActiveModel: TryIntoModel<R::Model> + ActiveModelBehavior + Send + Sync,
        V: EntityTrait,
        V::Model: Sync,
    {
        let to = <E as Related<R>>::to();
        let kind = match <E as Related<R>>::via() {
            None => Err(ConfigError::MissingJunction(name.to_string())),
            Some(via) => match (
                identity_name(&via.from_col),
                identity_name(&via.to_col),
                identity_name(&to.from_col),
                identity_name(&to.to_col),
            ) {
                (Some(local), Some(junction_local), Some(junction_remote), Some(remote)) => {
                    Ok(FieldKind::from_relation(RelationField {
                        name: name.to_string(),
                        kind: RelationKind::ManyToMany,
                        target: RelatedTable::of::<R>(),
                        keys: RelationKeys {
                            local,
                            remote,
                            owns_foreign_key: false,
                            junction: Some(JunctionKeys {
                                table: V::default().table_name().to_string(),
                                local: junction_local,
                                remote: junction_remote,
                            }),
                        },
                        path: JoinPath::Junction {
                            via: <E as Related<R>>::via,
                            to: <E as Related<R>>::to,
                        },
                        loader: Arc::new(JunctionLoader::<R, V>::new()),
                        rows: Arc::new(Rows::<R>::new()),
                    }))
                }
                _ => Err(ConfigError::CompositeKey(name.to_string())),
            },
        };
        Self {
            name: name.to_string(),
            kind,
        }
    }

    fn direct<R>(
        name: &str,
        kind: RelationKind,
        loader: Arc<dyn RelationLoader<E>>,
        rows: Arc<dyn RelatedRows>,
    ) -> Self
    where
        E: Related<R>,
        R: EntityTrait,
    {
        let def = <E as Related<R>>::to();
        let field = match (identity_name(&def.from_col), identity_name(&def.to_col)) {
            (Some(local), Some(remote)) => Ok(FieldKind::from_relation(RelationField {
                name: name.to_string(),
                kind,
                target: RelatedTable::of::<R>(),
                keys: RelationKeys {
                    local,
                    remote,
                    owns_foreign_key: !def.is_owner,
                    junction: None,
                },
                path: JoinPath::Direct(<E as Related<R>>::to),
                loader,
                rows,
            })),
            _ => Err(ConfigError::CompositeKey(name.to_string())),
        };
        Self {
            name: name.to_string(),
            kind: field,
        }
    }
}

/// Name → field lookup for one entity
#[derive(Debug)]
pub struct FieldIndex<E: EntityTrait> {
    table: String,
    primary_key: ColumnField<E>,
    fields: HashMap<String, FieldKind<E>>,
}

impl<E: EntityTrait> FieldIndex<E> {
    /// Index every column of `E` plus the declared relations.
    ///
    /// # Errors
    ///
    /// Fails when a name is a modifier token or contains `__`, when a relation cannot be
    /// addressed through single-column keys, or when `E` has no primary key.
    pub fn build(declared: Vec<FieldDef<E>>) -> Result<Self, ConfigError> {
        let primary_key = E::PrimaryKey::iter()
            .next()
            .map(|key| {
                let column = key.into_column();
                ColumnField {
                    column,
                    info: column_info(column),
                }
            })
            .ok_or_else(|| ConfigError::UnknownField {
                option: "primary_key",
                name: E::default().table_name().to_string(),
            })?;

        let mut fields: HashMap<String, FieldKind<E>> = HashMap::new();
        let defs = E::Column::iter().map(FieldDef::column).chain(declared);
        for def in defs {
            check_name(&def.name)?;
            let kind = def.kind?;
            match fields.get(&def.name) {
                Some(existing) if existing.priority() > kind.priority() => {}
                _ => {
                    fields.insert(def.name, kind);
                }
            }
        }

        Ok(Self {
            table: E::default().table_name().to_string(),
            primary_key,
            fields,
        })
    }

    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&FieldKind<E>> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&Arc<RelationField<E>>> {
        self.resolve(name).and_then(FieldKind::relation)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnField<E>> {
        match self.resolve(name) {
            Some(FieldKind::Plain(column)) => Some(column),
            _ => None,
        }
    }

    /// Table name of `E`
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn primary_key(&self) -> &ColumnField<E> {
        &self.primary_key
    }

    pub fn relations(&self) -> impl Iterator<Item = &Arc<RelationField<E>>> {
        self.fields.values().filter_map(FieldKind::relation)
    }

    /// Every addressable field name, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn check_name(name: &str) -> Result<(), ConfigError> {
    if is_modifier_token(name) {
        return Err(ConfigError::ReservedName(name.to_string()));
    }
    if name.contains(KEY_DELIMITER) {
        return Err(ConfigError::DelimiterInName(name.to_string()));
    }
    Ok(())
}

fn column_info<C: ColumnTrait>(column: C) -> ColumnInfo {
    ColumnInfo {
        name: column.as_str().to_string(),
        column_type: column.def().get_column_type().clone(),
    }
}

fn column_infos<R: EntityTrait>() -> Vec<ColumnInfo> {
    R::Column::iter().map(column_info).collect()
}

fn primary_key_name<R: EntityTrait>() -> String {
    R::PrimaryKey::iter()
        .next()
        .map(|key| key.into_column().as_str().to_string())
        .unwrap_or_default()
}

/// Column name of a single-column identity
fn identity_name(identity: &Identity) -> Option<String> {
    match identity {
        Identity::Unary(iden) => Some(iden.to_string()),
        _ => None,
    }
}
