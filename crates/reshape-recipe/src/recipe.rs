//! Recipe container: an ordered, serializable record of edits.
//!
//! A recipe holds the delta list plus metadata and is a pure value: it never
//! touches the live tree it was recorded against. It grows monotonically
//! during recording, exports to JSON text for storage or transfer, and is
//! later imported and replayed against a data snapshot.

use crate::{value_type_name, DeltaOp, RecipeError, RecipeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// The recipe wire-format version this crate reads and writes.
pub const RECIPE_VERSION: &str = "4.0.0";

/// Shape of the document a recipe was recorded against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootType {
    /// A single object document.
    Object,
    /// An array document; the recipe was recorded against one element.
    Array,
}

/// Recipe metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeMetadata {
    /// Shape of the document the recipe was recorded against.
    pub root_type: RootType,

    /// Creation time, Unix epoch millis.
    pub created_at: u64,

    /// Last-modification time, Unix epoch millis.
    pub updated_at: u64,
}

/// An ordered, replayable record of edits plus metadata.
///
/// Invariants:
/// - Deltas are applied strictly in list order.
/// - `op_id` values are unique within a recipe.
/// - Any `parent_op_id` references an earlier Insert or Rename (the only
///   operations that establish a key).
///
/// # Examples
///
/// ```
/// use reshape_recipe::{DeltaOp, Recipe, RootType};
/// use serde_json::json;
///
/// let mut recipe = Recipe::new(RootType::Object);
/// recipe.push(DeltaOp::insert("name", json!("Ana")));
/// assert_eq!(recipe.deltas().len(), 1);
/// assert!(recipe.validate().is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    version: String,
    deltas: Vec<DeltaOp>,
    metadata: RecipeMetadata,
}

impl Recipe {
    /// Create an empty recipe stamped with the current time.
    pub fn new(root_type: RootType) -> Self {
        let now = epoch_millis();
        Self {
            version: RECIPE_VERSION.to_owned(),
            deltas: Vec::new(),
            metadata: RecipeMetadata {
                root_type,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Get the wire-format version.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the recorded deltas.
    #[inline]
    pub fn deltas(&self) -> &[DeltaOp] {
        &self.deltas
    }

    /// Get mutable access to the recorded deltas.
    ///
    /// Callers that restructure the list are responsible for calling
    /// [`Recipe::touch`] afterwards.
    #[inline]
    pub fn deltas_mut(&mut self) -> &mut Vec<DeltaOp> {
        &mut self.deltas
    }

    /// Get the recipe metadata.
    #[inline]
    pub fn metadata(&self) -> &RecipeMetadata {
        &self.metadata
    }

    /// Append a delta and refresh `updated_at`.
    pub fn push(&mut self, delta: DeltaOp) {
        self.deltas.push(delta);
        self.touch();
    }

    /// Check if the recipe has no deltas.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Refresh `updated_at` to the current time.
    #[inline]
    pub fn touch(&mut self) {
        self.metadata.updated_at = epoch_millis();
    }

    /// Validate the recipe, returning human-readable problems.
    ///
    /// Checks the version, per-variant required fields, opId uniqueness,
    /// and that every `parent_op_id` references an earlier Insert or
    /// Rename. Does not mutate the recipe; an empty result means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version != RECIPE_VERSION {
            errors.push(format!(
                "version mismatch: expected {RECIPE_VERSION}, found {}",
                self.version
            ));
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        // opIds minted so far by key-establishing deltas.
        let mut establishers: HashSet<&str> = HashSet::new();

        for (i, delta) in self.deltas.iter().enumerate() {
            match delta {
                DeltaOp::Insert { key, .. } => {
                    if key.is_empty() {
                        errors.push(format!("delta {i}: insert requires a non-empty key"));
                    }
                }
                DeltaOp::Delete { key, .. } => {
                    if key.is_empty() {
                        errors.push(format!("delta {i}: delete requires a non-empty key"));
                    }
                }
                DeltaOp::Transform {
                    key,
                    transform_name,
                    ..
                } => {
                    if key.is_empty() {
                        errors.push(format!("delta {i}: transform requires a non-empty key"));
                    }
                    if transform_name.is_empty() {
                        errors.push(format!(
                            "delta {i}: transform requires a non-empty transform name"
                        ));
                    }
                }
                DeltaOp::Rename { from, to, .. } => {
                    if from.is_empty() || to.is_empty() {
                        errors.push(format!(
                            "delta {i}: rename requires non-empty 'from' and 'to'"
                        ));
                    }
                }
                DeltaOp::UpdateParams { key, .. } => {
                    if key.is_empty() {
                        errors.push(format!("delta {i}: updateParams requires a non-empty key"));
                    }
                }
                DeltaOp::Retain { .. } | DeltaOp::Unknown => {}
            }

            if let Some(parent) = delta.parent_op_id() {
                if !establishers.contains(parent) {
                    errors.push(format!(
                        "delta {i}: parentOpId {parent:?} does not reference an earlier \
                         insert or rename"
                    ));
                }
            }

            if let Some(id) = delta.op_id() {
                if !seen_ids.insert(id) {
                    errors.push(format!("delta {i}: duplicate opId {id:?}"));
                }
                if delta.establishes_key() {
                    establishers.insert(id);
                }
            }
        }

        errors
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Export a recipe to its JSON text form.
pub fn export_recipe(recipe: &Recipe) -> RecipeResult<String> {
    Ok(serde_json::to_string_pretty(recipe)?)
}

/// Import a recipe from JSON text.
///
/// Shape problems are hard errors: malformed JSON, a missing or
/// non-string `version`, or a non-array `deltas` reject the import. A
/// version mismatch is accepted with a warning (no migration is
/// implemented).
pub fn import_recipe(text: &str) -> RecipeResult<Recipe> {
    let raw: Value = serde_json::from_str(text)
        .map_err(|e| RecipeError::import(format!("malformed JSON: {e}")))?;

    let version = match raw.get("version") {
        Some(Value::String(v)) => v.clone(),
        Some(other) => {
            return Err(RecipeError::import(format!(
                "'version' must be a string, found {}",
                value_type_name(other)
            )))
        }
        None => return Err(RecipeError::import("missing 'version'")),
    };

    match raw.get("deltas") {
        Some(Value::Array(_)) => {}
        Some(other) => {
            return Err(RecipeError::import(format!(
                "'deltas' must be an array, found {}",
                value_type_name(other)
            )))
        }
        None => return Err(RecipeError::import("missing 'deltas'")),
    }

    if version != RECIPE_VERSION {
        tracing::warn!(
            found = %version,
            expected = %RECIPE_VERSION,
            "importing recipe with mismatched version; no migration applied"
        );
    }

    let recipe: Recipe = serde_json::from_value(raw)
        .map_err(|e| RecipeError::import(format!("invalid recipe shape: {e}")))?;

    Ok(recipe)
}
