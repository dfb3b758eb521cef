//! Validation Support
//!
//! Create requests run the candidate record through a [`Validator`] before anything is written.
//! A failed validation is answered with HTTP 400 and the list of offending field names.
//!
//! # Example
//!
//! ```rust,ignore
//! use resourceful::validation::{ValidationError, ValidationErrors, Validator, validators};
//! use sea_orm::ActiveValue;
//!
//! struct PostValidator;
//!
//! impl Validator<post::Entity> for PostValidator {
//!     fn validate(&self, candidate: &post::ActiveModel) -> ValidationErrors {
//!         let mut errors = ValidationErrors::new();
//!         if let ActiveValue::Set(title) = &candidate.title {
//!             if let Err(e) = validators::validate_length("title", title, Some(3), None) {
//!                 errors.add(e);
//!             }
//!         }
//!         errors
//!     }
//! }
//! ```

use sea_orm::EntityTrait;
use serde::Serialize;
use std::fmt;

use crate::errors::ApiError;

/// Validation error with field name and message
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Create a new empty validation errors collection
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add a validation error
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a field check, if any
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.add(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Offending field names, in the order they were reported, without duplicates
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.errors.len());
        for error in &self.errors {
            if !names.contains(&error.field) {
                names.push(error.field.clone());
            }
        }
        names
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation_failed(errors.field_names())
    }
}

/// Validates a candidate record before it is persisted.
///
/// Closures of the form `Fn(&E::ActiveModel) -> ValidationErrors` implement this trait.
pub trait Validator<E: EntityTrait>: Send + Sync {
    /// Return every problem found on the candidate; an empty collection accepts it.
    fn validate(&self, candidate: &E::ActiveModel) -> ValidationErrors;
}

impl<E, F> Validator<E> for F
where
    E: EntityTrait,
    F: Fn(&E::ActiveModel) -> ValidationErrors + Send + Sync,
{
    fn validate(&self, candidate: &E::ActiveModel) -> ValidationErrors {
        self(candidate)
    }
}

/// Validator used when a resource declares none.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<E: EntityTrait> Validator<E> for AcceptAll {
    fn validate(&self, _candidate: &E::ActiveModel) -> ValidationErrors {
        ValidationErrors::new()
    }
}

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// Validate string length is within range
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `field` when the length is out of range.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();
        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }
        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }
        Ok(())
    }

    /// Validate number is within range
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `field` when the value is out of range.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }
        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }
        Ok(())
    }

    /// Validate value is not blank
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `field` when the value is empty or whitespace.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }
}
