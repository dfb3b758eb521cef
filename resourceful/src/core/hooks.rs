//! # Resource Hooks
//!
//! Every operation of a [`Resource`](crate::Resource) passes through the hooks below. Each one
//! has an identity default, so an implementation only overrides what it needs:
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use resourceful::{ApiError, QueryPlan, RequestContext, ResourceHooks};
//!
//! struct PostHooks;
//!
//! #[async_trait]
//! impl ResourceHooks<post::Entity> for PostHooks {
//!     async fn has_access(&self, ctx: &RequestContext) -> bool {
//!         ctx.headers.contains_key("x-api-key")
//!     }
//!
//!     // Only published posts are listed
//!     async fn pre_list(
//!         &self,
//!         _ctx: &RequestContext,
//!         mut plan: QueryPlan<post::Entity>,
//!     ) -> Result<QueryPlan<post::Entity>, ApiError> {
//!         plan.filter(post::Column::Published.eq(true));
//!         Ok(plan)
//!     }
//! }
//! ```
//!
//! Hooks run in this order: access check, `pre_*` (plans or active models), the database call,
//! `after_*` (models). Returning an error from any hook aborts the request with that error.

use async_trait::async_trait;
use sea_orm::{DeleteResult, EntityTrait};

use crate::core::plan::QueryPlan;
use crate::errors::ApiError;
use crate::models::RequestContext;

#[async_trait]
pub trait ResourceHooks<E>: Send + Sync
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
    /// Access predicate checked before any data access; `false` answers 401
    async fn has_access(&self, _ctx: &RequestContext) -> bool {
        true
    }

    // ==========================================
    // READS
    // ==========================================

    /// Adjust the list plan after the query string was applied
    async fn pre_list(
        &self,
        _ctx: &RequestContext,
        plan: QueryPlan<E>,
    ) -> Result<QueryPlan<E>, ApiError> {
        Ok(plan)
    }

    /// Adjust the detail plan; it is already narrowed to the requested id
    async fn pre_detail(
        &self,
        _ctx: &RequestContext,
        plan: QueryPlan<E>,
    ) -> Result<QueryPlan<E>, ApiError> {
        Ok(plan)
    }

    /// Rewrite or drop listed rows before they are serialized
    async fn after_list(
        &self,
        _ctx: &RequestContext,
        rows: Vec<E::Model>,
    ) -> Result<Vec<E::Model>, ApiError> {
        Ok(rows)
    }

    async fn after_detail(
        &self,
        _ctx: &RequestContext,
        row: E::Model,
    ) -> Result<E::Model, ApiError> {
        Ok(row)
    }

    // ==========================================
    // WRITES
    // ==========================================

    /// Last chance to change a validated candidate before it is inserted
    async fn pre_post(
        &self,
        _ctx: &RequestContext,
        candidate: E::ActiveModel,
    ) -> Result<E::ActiveModel, ApiError> {
        Ok(candidate)
    }

    /// Last chance to change a patched row before it is saved
    async fn pre_patch(
        &self,
        _ctx: &RequestContext,
        candidate: E::ActiveModel,
    ) -> Result<E::ActiveModel, ApiError> {
        Ok(candidate)
    }

    async fn after_post(&self, _ctx: &RequestContext, row: E::Model) -> Result<E::Model, ApiError> {
        Ok(row)
    }

    async fn after_patch(
        &self,
        _ctx: &RequestContext,
        row: E::Model,
    ) -> Result<E::Model, ApiError> {
        Ok(row)
    }

    /// Called with the outcome of a delete, including deletes that matched no row
    async fn after_delete(
        &self,
        _ctx: &RequestContext,
        _result: &DeleteResult,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<E> ResourceHooks<E> for NoHooks
where
    E: EntityTrait,
    E::ActiveModel: Send,
{
}
