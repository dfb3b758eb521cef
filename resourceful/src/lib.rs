//! # resourceful
//!
//! REST resources for Sea-ORM entities, served with Axum.
//!
//! A [`Resource`] exposes one entity under five routes and translates query strings into
//! filtered, ordered, paginated queries:
//!
//! ```text
//! GET    /posts?author__name=ann&views__gte=10&order_by=-created_at&limit=20
//! GET    /posts/3
//! POST   /posts        {"title": "Hello", "author": 1, "tags": [2, 5]}
//! PATCH  /posts/3      {"title": "Hello again"}
//! DELETE /posts/3
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use resourceful::{FieldDef, Resource, ResourceOptions};
//!
//! // A plain `DatabaseConnection` works too; an `Arc` lets resources share it
//! let db = Arc::new(Database::connect("sqlite::memory:").await?);
//! let posts = Resource::<post::Entity>::new(
//!     db.clone(),
//!     vec![FieldDef::many_to_one::<author::Entity>("author")],
//!     ResourceOptions::default(),
//! )?;
//!
//! let app = axum::Router::new().nest("/posts", posts.router());
//! ```
//!
//! Entities need `Serialize` and `Deserialize` on their model, and the relations used must
//! be declared through Sea-ORM's `Related` trait.
//!
//! ## Modules
//!
//! - [`filtering`]: query-key grammar, predicates, joins, ordering, pagination
//! - [`metadata`]: the field index built from the entity and its relations
//! - [`core`]: the resource controller, its options, hooks and query plans
//! - [`routes`], [`openapi`]: the HTTP surface
//! - [`errors`], [`validation`]: error mapping and candidate validation

pub mod core;
pub mod errors;
pub mod filtering;
pub mod metadata;
pub mod models;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod validation;

pub use core::{
    DEFAULT_MAX_TAKE, DEFAULT_TAKE, NoHooks, Operation, QueryAssembler, QueryPlan, Resource,
    ResourceHooks, ResourceOptions,
};
pub use errors::{ApiError, ConfigError};
pub use filtering::{Modifier, QueryKey};
pub use metadata::{FieldDef, FieldIndex, JsonModel, RelationKind};
pub use models::{ListParams, QueryParams, QueryValue, RequestContext};
pub use response::{ListMeta, ListResponse};
pub use routes::request_context;
pub use validation::{AcceptAll, ValidationError, ValidationErrors, Validator};

// Re-exported so hook implementations need no direct dependency
pub use async_trait::async_trait;
