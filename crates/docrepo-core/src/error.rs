//! # Error Types
//!
//! Error types for docrepo-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  docrepo-core errors (this file)                                       │
//! │  └── CoreError        - Bad descriptors, bad document shapes           │
//! │                                                                         │
//! │  docrepo-db errors (separate crate)                                    │
//! │  ├── DbError          - Storage driver failures (wraps CoreError)      │
//! │  └── RepositoryError  - NotFound | Storage(DbError)                    │
//! │                                                                         │
//! │  Flow: CoreError → DbError → RepositoryError → service layer           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while evaluating descriptors or shaping documents.
///
/// Drivers surface these unchanged inside `DbError::Query`, so a malformed
/// filter looks the same whichever backend evaluated it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Filter descriptor uses an unknown operator or a malformed operand.
    ///
    /// ## When This Occurs
    /// - `{"age": {"$between": [1, 2]}}` (unknown operator)
    /// - `{"$or": {"a": 1}}` (logical operator without an array)
    /// - `{"tag": {"$in": "x"}}` (`$in` without an array)
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Update descriptor is malformed or cannot be applied.
    ///
    /// ## When This Occurs
    /// - Empty update
    /// - Unknown update operator
    /// - `$inc` on a non-numeric field
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    /// Update tried to modify the identifier or a storage metadata field.
    #[error("Field '{0}' is immutable")]
    ImmutableField(String),

    /// A value that must be a JSON object was something else.
    #[error("Expected a JSON object for {context}, found {found}")]
    NotAnObject { context: String, found: String },

    /// A document draft could not be serialized into a JSON object.
    #[error("Document serialization failed: {0}")]
    Serialization(String),

    /// Raw document could not be shaped into the requested document type.
    #[error("Normalization failed: {0}")]
    Normalization(String),
}

impl CoreError {
    /// Creates a NotAnObject error describing the offending value.
    pub fn not_an_object(context: impl Into<String>, value: &serde_json::Value) -> Self {
        let found = match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        CoreError::NotAnObject {
            context: context.into(),
            found: found.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
