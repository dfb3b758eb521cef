//! # Error Handling for REST resources
//!
//! Every failure a resource can produce maps onto one [`ApiError`] variant, and every variant
//! maps onto exactly one HTTP status code:
//!
//! | Variant | Status |
//! |---------|--------|
//! | `BadRequest`, `BadMethod`, `InvalidQueryKey`, `ValidationFailed` | 400 |
//! | `Unauthorized` | 401 |
//! | `NotFound` | 404 |
//! | `Database`, `Internal` | 500 |
//!
//! Internal details (database errors, persistence failures) are logged through `tracing`
//! when the error is turned into a response and never sent to the client.
//!
//! Problems in the resource *declaration* (unknown eager relation, reserved field name, ...)
//! are reported separately as [`ConfigError`] when the resource is built.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// Fixed message returned when a row could not be persisted.
pub const PERSISTENCE_FAILURE_MESSAGE: &str = "INTERNAL_SERVER_ERROR";

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - no row for the requested id
    NotFound {
        /// Resource type (e.g., "post")
        resource: String,
        /// Optional ID that wasn't found
        id: Option<String>,
    },

    /// 400 Bad Request - malformed id or body
    BadRequest {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - the HTTP verb is not in the resource's allowed set
    BadMethod {
        /// The rejected method
        method: String,
    },

    /// 401 Unauthorized - the access hook refused the request
    Unauthorized {
        /// User-facing error message
        message: String,
    },

    /// 400 Bad Request - a query key does not resolve to a field, or its value
    /// does not fit the modifier or the column type
    InvalidQueryKey {
        /// The raw query key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// 400 Bad Request - the validator rejected the candidate record
    ValidationFailed {
        /// Names of the offending fields
        fields: Vec<String>,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a 404 Not Found error
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a 400 error for a verb outside the allowed set
    pub fn bad_method(method: impl Into<String>) -> Self {
        Self::BadMethod {
            method: method.into(),
        }
    }

    /// Create a 401 Unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a 400 error for a filter, ordering or pagination key that cannot be applied
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::invalid_query_key("nonexistent_field", "unknown field"));
    /// ```
    pub fn invalid_query_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQueryKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a 400 validation error listing the offending field names
    pub fn validation_failed(fields: Vec<String>) -> Self {
        Self::ValidationFailed { fields }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Create a 500 Internal Server Error with optional details
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Create the fixed 500 error used when a row could not be saved
    pub fn persistence(err: &DbErr) -> Self {
        Self::Internal {
            message: PERSISTENCE_FAILURE_MESSAGE.to_string(),
            internal: Some(err.to_string()),
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. }
            | Self::BadMethod { .. }
            | Self::InvalidQueryKey { .. }
            | Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => {
                if let Some(id) = id {
                    format!("{resource} with ID '{id}' not found")
                } else {
                    format!("{resource} not found")
                }
            }
            Self::BadMethod { method } => format!("Method {method} is not allowed"),
            Self::InvalidQueryKey { .. } => "InvalidQueryKey".to_string(),
            Self::ValidationFailed { .. } => "Validation failed".to_string(),
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                message,
            } => {
                tracing::error!(details = %details, message = %message, "Internal error occurred");
            }
            Self::InvalidQueryKey { key, reason } => {
                tracing::debug!(key = %key, reason = %reason, "Rejected query key");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let details = match &self {
            Self::ValidationFailed { fields } => Some(fields.clone()),
            Self::InvalidQueryKey { key, reason } => Some(vec![format!("{key}: {reason}")]),
            _ => None,
        };
        let response = ErrorResponse {
            error: self.user_message(),
            details,
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQueryKey { key, reason } => write!(f, "InvalidQueryKey: {key}: {reason}"),
            _ => write!(f, "{}", self.user_message()),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert `SeaORM` `DbErr` to `ApiError`
///
/// - `DbErr::RecordNotFound` → 404 Not Found
/// - All other `DbErr` variants → 500 Internal Server Error (logged, sanitized)
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::NotFound {
                    resource: resource.to_string(),
                    id: None,
                }
            }
            _ => Self::database(err),
        }
    }
}

/// A resource declaration that cannot be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field or remote column is named after a query-key modifier (`in`, `gt`, ...)
    ReservedName(String),
    /// A field name contains the `__` key delimiter
    DelimiterInName(String),
    /// An option references a field the entity does not declare
    UnknownField {
        /// Which option referenced it (e.g. "relations", "order")
        option: &'static str,
        /// The unknown name
        name: String,
    },
    /// An option expects a relation but names a plain column, or the reverse
    WrongFieldKind {
        /// Which option referenced it
        option: &'static str,
        /// The offending name
        name: String,
    },
    /// A relation joins on a composite key, which filters and relation writes cannot address
    CompositeKey(String),
    /// A many-to-many relation whose `Related` impl declares no junction (`via`)
    MissingJunction(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedName(name) => {
                write!(f, "field name '{name}' is reserved as a query-key modifier")
            }
            Self::DelimiterInName(name) => {
                write!(f, "field name '{name}' contains the '__' key delimiter")
            }
            Self::UnknownField { option, name } => {
                write!(f, "option '{option}' references unknown field '{name}'")
            }
            Self::WrongFieldKind { option, name } => {
                write!(f, "option '{option}' cannot use field '{name}' of this kind")
            }
            Self::CompositeKey(name) => {
                write!(f, "relation '{name}' uses a composite key")
            }
            Self::MissingJunction(name) => {
                write!(f, "many-to-many relation '{name}' has no junction (Related::via)")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
