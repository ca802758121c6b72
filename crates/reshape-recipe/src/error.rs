//! Error types for recipe operations.
//!
//! Only import failures, serialization failures, and programmer-facing
//! recorder errors surface as `RecipeError`. Replay-time problems (missing
//! transforms, unresolvable parents, failed conditions) are recoverable by
//! design: the offending delta is skipped with a warning and replay
//! continues.

use thiserror::Error;

/// Result type alias for recipe operations.
pub type RecipeResult<T> = Result<T, RecipeError>;

/// Errors that can occur during recipe operations.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Recipe import failed: malformed JSON or wrong shape.
    #[error("recipe import failed: {reason}")]
    Import {
        /// What was wrong with the imported text.
        reason: String,
    },

    /// A parameter update referenced a transform that was never recorded.
    #[error("no recorded transform for key {key:?} at index {transform_index}")]
    TransformNotRecorded {
        /// Key the update targeted.
        key: String,
        /// Index of the transform among those recorded for the key.
        transform_index: usize,
    },

    /// The requested feature is not implemented.
    #[error("unsupported: {feature}")]
    Unsupported {
        /// Name of the missing feature.
        feature: String,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecipeError {
    /// Create an import error.
    #[inline]
    pub fn import(reason: impl Into<String>) -> Self {
        RecipeError::Import {
            reason: reason.into(),
        }
    }

    /// Create a transform-not-recorded error.
    #[inline]
    pub fn transform_not_recorded(key: impl Into<String>, transform_index: usize) -> Self {
        RecipeError::TransformNotRecorded {
            key: key.into(),
            transform_index,
        }
    }

    /// Create an unsupported-feature error.
    #[inline]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        RecipeError::Unsupported {
            feature: feature.into(),
        }
    }
}

/// Get the type name of a JSON value, for error messages.
#[inline]
pub fn value_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
