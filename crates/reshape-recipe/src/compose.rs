//! Concurrent delta reconciliation (not implemented).
//!
//! Operational-transform-style composition of concurrent edit sequences is
//! explicitly out of scope: the intended reconciliation semantics are an
//! open product question. These entry points exist so callers can feature-
//! detect the capability; both currently return
//! [`RecipeError::Unsupported`](crate::RecipeError).

use crate::{DeltaOp, RecipeError, RecipeResult};

/// Compose two sequential delta lists into one equivalent list.
pub fn compose_deltas(_first: &[DeltaOp], _second: &[DeltaOp]) -> RecipeResult<Vec<DeltaOp>> {
    Err(RecipeError::unsupported("compose_deltas"))
}

/// Transform a delta list against a concurrent delta list.
pub fn transform_deltas(_ours: &[DeltaOp], _theirs: &[DeltaOp]) -> RecipeResult<Vec<DeltaOp>> {
    Err(RecipeError::unsupported("transform_deltas"))
}
