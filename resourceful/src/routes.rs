//! Axum routes of a [`Resource`].
//!
//! | Route | Operation | Success |
//! |-------|-----------|---------|
//! | `GET /` | list | 200 + envelope |
//! | `POST /` | create | 201 + row |
//! | `GET /{id}` | detail | 200 + row |
//! | `PATCH /{id}` | patch | 201 + row |
//! | `DELETE /{id}` | delete | 204 |
//!
//! The router is meant to be nested (`Router::new().nest("/posts", posts.router())`); list
//! links are built from the full request path, prefix included.

use axum::{
    Json, Router,
    body::to_bytes,
    extract::{OriginalUri, Path, Request, State},
    http::StatusCode,
    routing::get,
};
use sea_orm::{ActiveModelBehavior, EntityTrait, TryIntoModel};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::Resource;
use crate::errors::ApiError;
use crate::metadata::JsonModel;
use crate::models::{QueryParams, RequestContext};
use crate::response::ListResponse;

/// Largest request body read into a context
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

impl<E> Resource<E>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    /// Routes for the five operations, with the resource as state
    #[must_use]
    pub fn router(self) -> Router {
        Arc::new(self).into_router()
    }

    /// Same as [`Resource::router`], for a resource that is shared elsewhere too
    pub fn into_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(list_handler::<E>).post(create_handler::<E>))
            .route(
                "/{id}",
                get(detail_handler::<E>)
                    .patch(patch_handler::<E>)
                    .delete(delete_handler::<E>),
            )
            .with_state(self)
    }
}

async fn list_handler<E>(
    State(resource): State<Arc<Resource<E>>>,
    request: Request,
) -> Result<Json<ListResponse>, ApiError>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    let ctx = request_context(request, None).await?;
    resource.list(&ctx).await.map(Json)
}

async fn detail_handler<E>(
    State(resource): State<Arc<Resource<E>>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    let ctx = request_context(request, Some(id)).await?;
    resource.detail(&ctx).await.map(Json)
}

async fn create_handler<E>(
    State(resource): State<Arc<Resource<E>>>,
    request: Request,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    let ctx = request_context(request, None).await?;
    let row = resource.create(&ctx).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn patch_handler<E>(
    State(resource): State<Arc<Resource<E>>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<(StatusCode, Json<Value>), ApiError>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    let ctx = request_context(request, Some(id)).await?;
    let row = resource.patch(&ctx).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn delete_handler<E>(
    State(resource): State<Arc<Resource<E>>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<StatusCode, ApiError>
where
    E: EntityTrait,
    E::Model: JsonModel<E::ActiveModel>,
    E::ActiveModel: TryIntoModel<E::Model> + ActiveModelBehavior + Send + Sync,
{
    let ctx = request_context(request, Some(id)).await?;
    resource.delete(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Normalize an axum request into a [`RequestContext`].
///
/// # Errors
///
/// Returns `BadRequest` when the body is too large or is not valid JSON.
pub async fn request_context(request: Request, id: Option<String>) -> Result<RequestContext, ApiError> {
    let (parts, body) = request.into_parts();

    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path().to_string(), |uri| uri.path().to_string());
    let query = QueryParams::parse(parts.uri.query().unwrap_or_default());

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::bad_request(format!("Could not read request body: {e}")))?;
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&bytes)
                .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?,
        )
    };

    let params: HashMap<String, String> = id.into_iter().map(|id| ("id".to_string(), id)).collect();

    Ok(RequestContext {
        method: parts.method,
        path,
        params,
        headers: parts.headers,
        query,
        body,
        extensions: parts.extensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;

    #[tokio::test]
    async fn test_request_context_from_request() {
        let request = Request::builder()
            .method(Method::PATCH)
            .uri("/posts/7?title__in=a,b&limit=5")
            .header("x-user", "alice")
            .body(Body::from(r#"{"title": "new"}"#))
            .unwrap();

        let ctx = request_context(request, Some("7".to_string())).await.unwrap();
        assert_eq!(ctx.method, Method::PATCH);
        assert_eq!(ctx.path, "/posts/7");
        assert_eq!(ctx.param("id"), Some("7"));
        assert_eq!(ctx.query.get_first("title__in"), Some("a,b"));
        assert_eq!(ctx.headers.get("x-user").unwrap(), "alice");
        assert_eq!(ctx.body, Some(serde_json::json!({"title": "new"})));
    }

    #[tokio::test]
    async fn test_empty_body_is_none() {
        let request = Request::builder().uri("/posts").body(Body::empty()).unwrap();
        let ctx = request_context(request, None).await.unwrap();
        assert!(ctx.body.is_none());
        assert!(ctx.query.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/posts")
            .body(Body::from("{not json"))
            .unwrap();
        let err = request_context(request, None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
