// Create, read, patch and delete through the router, plus the controller's gatekeeping:
// allowed methods, id parsing, body shape, validation and hooks

use axum::http::{Method, StatusCode};
use resourceful::validation::validators;
use resourceful::{
    ApiError, Operation, QueryPlan, RequestContext, ResourceHooks, ResourceOptions,
    ValidationErrors, async_trait,
};
use sea_orm::{ActiveValue, ColumnTrait, DeleteResult};
use serde_json::json;
use std::sync::{Arc, Mutex};

mod common;
use common::{get, ids, post, post_resource, send, setup_app, setup_app_with, setup_seeded_db};

#[tokio::test]
async fn test_create_then_detail_round_trips() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, created) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "New post", "views": 3, "published": false, "author_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(
        created,
        json!({ "id": 6, "title": "New post", "views": 3, "published": false, "author_id": null })
    );

    let (status, fetched) = get(&app, "/posts/6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_create_ignores_a_client_supplied_id() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, created) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "id": 1, "title": "Again", "views": 0, "published": true, "author_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["id"], 6);
}

#[tokio::test]
async fn test_patch_changes_only_sent_fields() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, patched) =
        send(&app, Method::PATCH, "/posts/1", Some(json!({ "title": "Hello again" }))).await;
    assert_eq!(status, StatusCode::CREATED, "{patched}");
    assert_eq!(
        patched,
        json!({ "id": 1, "title": "Hello again", "views": 10, "published": true, "author_id": 1 })
    );

    let (_, fetched) = get(&app, "/posts/1").await;
    assert_eq!(fetched, patched);
}

#[tokio::test]
async fn test_patch_honours_updatable_and_read_only_fields() {
    let db = setup_seeded_db().await.expect("seeded database");
    let options = ResourceOptions {
        updatable_fields: vec!["title".into(), "views".into()],
        read_only_fields: vec!["views".into()],
        ..ResourceOptions::default()
    };
    let app = setup_app_with(&db, options);

    let (status, patched) = send(
        &app,
        Method::PATCH,
        "/posts/2",
        Some(json!({ "title": "Rust tricks", "views": 999, "published": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(patched["title"], "Rust tricks");
    assert_eq!(patched["views"], 50);
    assert_eq!(patched["published"], true);
}

#[tokio::test]
async fn test_patch_missing_row_is_not_found() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, body) =
        send(&app, Method::PATCH, "/posts/99", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "posts with ID '99' not found");
}

#[tokio::test]
async fn test_delete_answers_no_content() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, body) = send(&app, Method::DELETE, "/posts/3", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = get(&app, "/posts/3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting again is not an error
    let (status, _) = send(&app, Method::DELETE, "/posts/3", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = get(&app, "/posts").await;
    assert_eq!(ids(&list), vec![1, 2, 4, 5]);
}

#[tokio::test]
async fn test_malformed_ids_are_bad_requests() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    for uri in ["/posts/abc", "/posts/0", "/posts/-4", "/posts/1.5"] {
        let (status, _) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    let (status, _) = send(&app, Method::DELETE, "/posts/zero", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bodies_must_be_json_objects() {
    let db = setup_seeded_db().await.expect("seeded database");
    let app = setup_app(&db);

    let (status, _) = send(&app, Method::POST, "/posts", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/posts", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::PATCH, "/posts/1", Some(json!("title"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_methods_outside_the_allowed_set() {
    let db = setup_seeded_db().await.expect("seeded database");
    let options = ResourceOptions {
        methods: vec![Operation::List, Operation::Detail],
        ..ResourceOptions::default()
    };
    let app = setup_app_with(&db, options);

    let (status, _) = get(&app, "/posts").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "x", "views": 0, "published": true, "author_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Method POST is not allowed");

    let (status, _) = send(&app, Method::DELETE, "/posts/1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app, "/posts/1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validator_rejects_with_field_names() {
    let db = setup_seeded_db().await.expect("seeded database");
    let resource = post_resource(&db, ResourceOptions::default()).with_validator(
        |candidate: &post::ActiveModel| {
            let mut errors = ValidationErrors::new();
            if let ActiveValue::Set(title) = &candidate.title {
                errors.check(validators::validate_length("title", title, Some(3), None));
            }
            if let ActiveValue::Set(views) = &candidate.views {
                errors.check(validators::validate_range("views", *views, Some(0), None));
            }
            errors
        },
    );
    let app = axum::Router::new().nest("/posts", resource.router());

    let (status, body) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "ab", "views": -1, "published": true, "author_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Validation failed", "details": ["title", "views"] }));

    let (_, list) = get(&app, "/posts").await;
    assert_eq!(list["meta"]["total"], 5);

    let (status, _) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "long enough", "views": 1, "published": true, "author_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

struct GuardedPosts {
    deletes: Arc<Mutex<Vec<u64>>>,
}

#[async_trait]
impl ResourceHooks<post::Entity> for GuardedPosts {
    async fn has_access(&self, ctx: &RequestContext) -> bool {
        ctx.headers
            .get("x-api-key")
            .is_some_and(|key| *key == "secret")
    }

    async fn pre_list(
        &self,
        _ctx: &RequestContext,
        mut plan: QueryPlan<post::Entity>,
    ) -> Result<QueryPlan<post::Entity>, ApiError> {
        plan.filter(post::Column::Published.eq(true));
        Ok(plan)
    }

    async fn after_detail(
        &self,
        _ctx: &RequestContext,
        mut row: post::Model,
    ) -> Result<post::Model, ApiError> {
        row.title = row.title.to_uppercase();
        Ok(row)
    }

    async fn pre_post(
        &self,
        _ctx: &RequestContext,
        mut candidate: post::ActiveModel,
    ) -> Result<post::ActiveModel, ApiError> {
        candidate.published = ActiveValue::Set(false);
        Ok(candidate)
    }

    async fn after_delete(
        &self,
        _ctx: &RequestContext,
        result: &DeleteResult,
    ) -> Result<(), ApiError> {
        self.deletes
            .lock()
            .expect("delete log")
            .push(result.rows_affected);
        Ok(())
    }
}

fn authorized(method: Method, path: &str) -> RequestContext {
    RequestContext::new(method, path).with_header("x-api-key", "secret")
}

#[tokio::test]
async fn test_hooks_shape_every_operation() {
    let db = setup_seeded_db().await.expect("seeded database");
    let deletes = Arc::new(Mutex::new(Vec::new()));
    let resource = post_resource(&db, ResourceOptions::default()).with_hooks(GuardedPosts {
        deletes: Arc::clone(&deletes),
    });

    let denied = resource
        .list(&RequestContext::new(Method::GET, "/posts"))
        .await
        .unwrap_err();
    assert!(matches!(denied, ApiError::Unauthorized { .. }));

    let page = resource.list(&authorized(Method::GET, "/posts")).await.unwrap();
    let listed: Vec<i64> = page.objects.iter().map(|row| row["id"].as_i64().unwrap()).collect();
    assert_eq!(listed, vec![1, 2, 4]);
    assert_eq!(page.meta.total, 3);

    let row = resource
        .detail(&authorized(Method::GET, "/posts/2").with_param("id", "2"))
        .await
        .unwrap();
    assert_eq!(row["title"], "RUST TIPS");

    let created = resource
        .create(&authorized(Method::POST, "/posts").with_body(json!({
            "title": "Forced draft", "views": 0, "published": true, "author_id": null
        })))
        .await
        .unwrap();
    assert_eq!(created["published"], false);

    for id in ["3", "3"] {
        resource
            .delete(&authorized(Method::DELETE, "/posts/3").with_param("id", id))
            .await
            .unwrap();
    }
    assert_eq!(*deletes.lock().unwrap(), vec![1, 0]);
}

#[tokio::test]
async fn test_malformed_id_is_rejected_before_the_access_check() {
    let db = setup_seeded_db().await.expect("seeded database");
    let resource = post_resource(&db, ResourceOptions::default()).with_hooks(GuardedPosts {
        deletes: Arc::default(),
    });

    let err = resource
        .detail(&RequestContext::new(Method::GET, "/posts/abc").with_param("id", "abc"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let err = resource
        .create(&RequestContext::new(Method::POST, "/posts").with_body(json!([1, 2])))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    // A well-formed request still needs the key
    let err = resource
        .detail(&RequestContext::new(Method::GET, "/posts/2").with_param("id", "2"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}
