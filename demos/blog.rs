//! Small blog API: authors, posts and tags, with relation filters and eager loading
//!
//! ```bash
//! cargo run --example blog
//! ```
//!
//! Then try:
//! - <http://localhost:3000/posts?author__name=ann&order_by=-views>
//! - <http://localhost:3000/posts/1?tags__name=rust>
//! - <http://localhost:3000/authors?posts__published=false>
//! - <http://localhost:3000/openapi/posts.json>
//!
//! Writes need the `x-api-key: demo` header:
//!
//! ```bash
//! curl -X POST localhost:3000/posts -H 'x-api-key: demo' -H 'content-type: application/json' \
//!   -d '{"title": "Hello", "views": 0, "published": true, "author": 1, "tags": [1, 2]}'
//! ```

use axum::{Json, Router, http::Method, routing::get};
use resourceful::{
    FieldDef, RequestContext, Resource, ResourceHooks, ResourceOptions, ValidationErrors,
    async_trait, validation::validators,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, Schema, Set,
};
use std::env;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod author {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "authors")]
    pub struct Model {
        #[sea_orm(primary_key)]
        #[serde(skip_deserializing)]
        pub id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::post::Entity")]
        Posts,
    }

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Posts.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

mod post {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "posts")]
    pub struct Model {
        #[sea_orm(primary_key)]
        #[serde(skip_deserializing)]
        pub id: i32,
        pub title: String,
        pub views: i32,
        pub published: bool,
        pub author_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::author::Entity",
            from = "Column::AuthorId",
            to = "super::author::Column::Id"
        )]
        Author,
    }

    impl Related<super::author::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Author.def()
        }
    }

    impl Related<super::tag::Entity> for Entity {
        fn to() -> RelationDef {
            super::post_tag::Relation::Tag.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::post_tag::Relation::Post.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

mod tag {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "tags")]
    pub struct Model {
        #[sea_orm(primary_key)]
        #[serde(skip_deserializing)]
        pub id: i32,
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

mod post_tag {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "post_tags")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub post_id: i32,
        #[sea_orm(primary_key, auto_increment = false)]
        pub tag_id: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::post::Entity",
            from = "Column::PostId",
            to = "super::post::Column::Id"
        )]
        Post,
        #[sea_orm(
            belongs_to = "super::tag::Entity",
            from = "Column::TagId",
            to = "super::tag::Column::Id"
        )]
        Tag,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// Reads are public, writes need the demo key
struct ApiKey;

#[async_trait]
impl ResourceHooks<post::Entity> for ApiKey {
    async fn has_access(&self, ctx: &RequestContext) -> bool {
        ctx.method == Method::GET
            || ctx
                .headers
                .get("x-api-key")
                .is_some_and(|key| *key == "demo")
    }
}

async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(author::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(post::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(tag::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(post_tag::Entity)))
        .await?;
    Ok(())
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    if author::Entity::find().one(db).await?.is_some() {
        return Ok(());
    }
    for name in ["ann", "bob"] {
        author::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    for name in ["rust", "sql"] {
        tag::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    for (title, views, author_id) in [("Hello", 10, 1), ("Rust tips", 50, 1), ("Joins", 25, 2)] {
        post::ActiveModel {
            title: Set(title.to_string()),
            views: Set(views),
            published: Set(true),
            author_id: Set(Some(author_id)),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    post_tag::ActiveModel {
        post_id: Set(2),
        tag_id: Set(1),
    }
    .insert(db)
    .await?;
    Ok(())
}

fn validate_post(candidate: &post::ActiveModel) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if let ActiveValue::Set(title) = &candidate.title {
        errors.check(validators::validate_required("title", title));
        errors.check(validators::validate_length("title", title, None, Some(200)));
    }
    if let ActiveValue::Set(views) = &candidate.views {
        errors.check(validators::validate_range("views", *views, Some(0), None));
    }
    errors
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resourceful=debug,tower_http=info")),
        )
        .init();

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let db = Arc::new(Database::connect(&database_url).await?);
    create_schema(&db).await?;
    seed(&db).await?;

    let posts = Resource::<post::Entity>::new(
        db.clone(),
        vec![
            FieldDef::many_to_one::<author::Entity>("author"),
            FieldDef::many_to_many::<tag::Entity, post_tag::Entity>("tags"),
        ],
        ResourceOptions {
            relations: vec!["author".into(), "tags".into()],
            order: vec!["-views".into()],
            read_only_fields: vec!["views".into()],
            ..ResourceOptions::default()
        },
    )?
    .with_hooks(ApiKey)
    .with_validator(validate_post);

    let authors = Resource::<author::Entity>::new(
        db.clone(),
        vec![FieldDef::one_to_many::<post::Entity>("posts")],
        ResourceOptions::default(),
    )?;

    let posts_doc = posts.openapi("/posts");
    let authors_doc = authors.openapi("/authors");

    let app = Router::new()
        .nest("/posts", posts.router())
        .nest("/authors", authors.router())
        .route("/openapi/posts.json", get(move || async move { Json(posts_doc) }))
        .route(
            "/openapi/authors.json",
            get(move || async move { Json(authors_doc) }),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("API: http://0.0.0.0:3000/posts");
    axum::serve(listener, app).await?;
    Ok(())
}
