#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use resourceful::{FieldDef, Resource, ResourceOptions};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Set,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub mod author {
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
        #[sea_orm(has_one = "super::profile::Entity")]
        Profile,
    }

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Posts.def()
        }
    }

    impl Related<super::profile::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Profile.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod profile {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "profiles")]
    pub struct Model {
        #[sea_orm(primary_key)]
        #[serde(skip_deserializing)]
        pub id: i32,
        pub bio: String,
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

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod post {
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
        #[sea_orm(has_many = "super::comment::Entity")]
        Comments,
    }

    impl Related<super::author::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Author.def()
        }
    }

    impl Related<super::comment::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Comments.def()
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

pub mod comment {
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "comments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        #[serde(skip_deserializing)]
        pub id: i32,
        pub text: String,
        pub post_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::post::Entity",
            from = "Column::PostId",
            to = "super::post::Column::Id"
        )]
        Post,
    }

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Post.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod tag {
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

    impl Related<super::post::Entity> for Entity {
        fn to() -> RelationDef {
            super::post_tag::Relation::Post.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::post_tag::Relation::Tag.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod post_tag {
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

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    db.execute(backend.build(&schema.create_table_from_entity(entity)))
        .await?;
    Ok(())
}

async fn connect_with_schema() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    create_table(&db, author::Entity).await?;
    create_table(&db, profile::Entity).await?;
    create_table(&db, post::Entity).await?;
    create_table(&db, comment::Entity).await?;
    create_table(&db, tag::Entity).await?;
    create_table(&db, post_tag::Entity).await?;
    Ok(db)
}

/// Empty in-memory database with the blog schema
pub async fn setup_db() -> Result<Arc<DatabaseConnection>, DbErr> {
    connect_with_schema().await.map(Arc::new)
}

/// Blog schema with fixed rows:
///
/// | post | title | views | published | author | tags | comments |
/// |------|-------|-------|-----------|--------|------|----------|
/// | 1 | Hello | 10 | yes | ann | | first, nice |
/// | 2 | Rust tips | 50 | yes | ann | rust | great |
/// | 3 | Draft | 0 | no | bob | | |
/// | 4 | SQL joins | 25 | yes | bob | rust, sql | |
/// | 5 | Misc | 5 | no | ann | misc | |
pub async fn setup_seeded_db() -> Result<Arc<DatabaseConnection>, DbErr> {
    let db = connect_with_schema().await?;

    for name in ["ann", "bob"] {
        author::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    let posts = [
        ("Hello", 10, true, 1),
        ("Rust tips", 50, true, 1),
        ("Draft", 0, false, 2),
        ("SQL joins", 25, true, 2),
        ("Misc", 5, false, 1),
    ];
    for (title, views, published, author_id) in posts {
        post::ActiveModel {
            title: Set(title.to_string()),
            views: Set(views),
            published: Set(published),
            author_id: Set(Some(author_id)),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    for name in ["rust", "sql", "misc"] {
        tag::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    for (post_id, tag_id) in [(2, 1), (4, 1), (4, 2), (5, 3)] {
        post_tag::ActiveModel {
            post_id: Set(post_id),
            tag_id: Set(tag_id),
        }
        .insert(&db)
        .await?;
    }

    for (post_id, text) in [(1, "first"), (1, "nice"), (2, "great")] {
        comment::ActiveModel {
            text: Set(text.to_string()),
            post_id: Set(Some(post_id)),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    Ok(Arc::new(db))
}

pub fn post_fields() -> Vec<FieldDef<post::Entity>> {
    vec![
        FieldDef::many_to_one::<author::Entity>("author"),
        FieldDef::one_to_many::<comment::Entity>("comments"),
        FieldDef::many_to_many::<tag::Entity, post_tag::Entity>("tags"),
    ]
}

pub fn author_fields() -> Vec<FieldDef<author::Entity>> {
    vec![
        FieldDef::one_to_many::<post::Entity>("posts"),
        FieldDef::one_to_one::<profile::Entity>("profile"),
    ]
}

pub fn post_resource(
    db: &Arc<DatabaseConnection>,
    options: ResourceOptions,
) -> Resource<post::Entity> {
    Resource::new(db.clone(), post_fields(), options).expect("post resource should build")
}

pub fn author_resource(
    db: &Arc<DatabaseConnection>,
    options: ResourceOptions,
) -> Resource<author::Entity> {
    Resource::new(db.clone(), author_fields(), options).expect("author resource should build")
}

/// `/posts` and `/authors` with default options
pub fn setup_app(db: &Arc<DatabaseConnection>) -> Router {
    setup_app_with(db, ResourceOptions::default())
}

pub fn setup_app_with(db: &Arc<DatabaseConnection>, post_options: ResourceOptions) -> Router {
    Router::new()
        .nest("/posts", post_resource(db, post_options).router())
        .nest(
            "/authors",
            author_resource(db, ResourceOptions::default()).router(),
        )
}

/// Send one request and return the status with the JSON body (`Null` when empty)
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!("non-JSON response body: {}", String::from_utf8_lossy(&bytes))
        })
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

/// Ids of the rows in a list envelope, in response order
pub fn ids(body: &Value) -> Vec<i64> {
    body["objects"]
        .as_array()
        .expect("list envelope has objects")
        .iter()
        .map(|row| row["id"].as_i64().expect("row has an id"))
        .collect()
}
