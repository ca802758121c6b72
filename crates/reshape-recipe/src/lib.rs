//! Delta-based recording and replay of edits to JSON-shaped data.
//!
//! `reshape-recipe` captures a sequence of user-authored edits to a
//! semi-structured document — insert, delete, rename, transform, including
//! edits that change the document's *shape* — and deterministically
//! re-applies that sequence to new or original data.
//!
//! # Core Concepts
//!
//! - **DeltaOp**: one atomic operation transforming the document.
//! - **Recipe**: an ordered, serializable list of deltas plus metadata.
//! - **DeltaRecorder**: appends deltas as edits occur, minting opIds.
//! - **TransformRegistry**: name → function table supplied by the caller.
//! - **apply_recipe**: the interpreter replaying a recipe over a snapshot.
//!
//! # Identity that survives renames
//!
//! Edits are recorded against a live tree whose keys can be renamed or
//! multiplied after the edit was recorded. Operations therefore address
//! their parent by the opId of the operation that *created* it; at replay
//! the resolver reconstructs the current key path by walking the chain of
//! opIds against a live opId → key map.
//!
//! # Quick Start
//!
//! ```
//! use reshape_recipe::{apply_recipe, DeltaOp, Recipe, RootType, TransformEntry, TransformRegistry};
//! use serde_json::{json, Value};
//!
//! let mut registry = TransformRegistry::new();
//! registry.register(TransformEntry::new("Uppercase", |v: &Value, _: &[Value]| {
//!     v.as_str().map(|s| json!(s.to_uppercase())).unwrap_or_else(|| v.clone())
//! }));
//!
//! let mut recipe = Recipe::new(RootType::Object);
//! recipe.push(DeltaOp::rename("firstName", "name"));
//! recipe.push(DeltaOp::transform("name", "Uppercase", vec![]));
//!
//! let out = apply_recipe(&json!({"firstName": "Ana"}), &recipe, &registry, None);
//! assert_eq!(out, json!({"name": "ANA"}));
//! ```
//!
//! # Template mode
//!
//! A recipe recorded against one representative element of an array can be
//! replayed against every element: pass the array to [`apply_recipe`] and
//! each element is normalized against the template shape and transformed
//! independently.
//!
//! # Error model
//!
//! Replay never fails: a delta that cannot apply (missing transform,
//! unresolvable parent, failed condition, unknown operation kind) is
//! skipped with a warning and replay continues. Only import and
//! serialization surface errors.

mod apply;
mod compose;
mod delta;
mod error;
mod recipe;
mod recorder;
mod registry;
mod resolver;
mod structural;
mod template;

// Core types
pub use delta::{Condition, CreatedBy, DeltaOp};
pub use error::{value_type_name, RecipeError, RecipeResult};
pub use recipe::{export_recipe, import_recipe, Recipe, RecipeMetadata, RootType, RECIPE_VERSION};

// Recording
pub use recorder::{DeleteEdit, DeltaRecorder, InsertEdit, RenameEdit, TransformEdit};

// Replay
pub use apply::{apply_deltas, apply_recipe, apply_recipe_with_handlers};
pub use compose::{compose_deltas, transform_deltas};
pub use resolver::resolve_parent_path;
pub use template::normalize_against;

// Registries
pub use registry::{
    ConditionFn, StructuralResult, TransformEntry, TransformFn, TransformRegistry,
    STRUCTURAL_CHANGE_MARKER,
};
pub use structural::{StructuralHandlerFn, StructuralHandlerRegistry};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
