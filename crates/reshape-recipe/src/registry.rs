//! Transform and condition function registry.
//!
//! The registry is supplied by the embedding application; the engine only
//! looks functions up by name. A transform maps a value (plus parameters)
//! to a new value, or to a [`StructuralResult`] when the result changes the
//! document's shape. A condition is a named boolean predicate used in
//! condition stacks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A transform function: `(value, params) -> value`.
///
/// A shape-changing transform returns a [`StructuralResult`] encoded as a
/// `Value` via [`StructuralResult::into_value`]; the engine detects the
/// marker with [`StructuralResult::from_value`].
pub type TransformFn = Arc<dyn Fn(&Value, &[Value]) -> Value + Send + Sync>;

/// A condition predicate: `(value, params) -> bool`.
pub type ConditionFn = Arc<dyn Fn(&Value, &[Value]) -> bool + Send + Sync>;

/// One named entry of the transform registry.
#[derive(Clone)]
pub struct TransformEntry {
    /// Registry name, as referenced by deltas.
    pub name: String,

    /// The transform function.
    pub transform: TransformFn,

    /// Optional predicate, used when the name appears in a condition stack.
    pub condition: Option<ConditionFn>,
}

impl TransformEntry {
    /// Create an entry with a transform function only.
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
            condition: None,
        }
    }

    /// Attach a condition predicate (builder pattern).
    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

/// Name → function table for transforms and conditions.
///
/// # Examples
///
/// ```
/// use reshape_recipe::{TransformEntry, TransformRegistry};
/// use serde_json::{json, Value};
///
/// let mut registry = TransformRegistry::new();
/// registry.register(TransformEntry::new("Uppercase", |v: &Value, _: &[Value]| {
///     v.as_str().map(|s| json!(s.to_uppercase())).unwrap_or_else(|| v.clone())
/// }));
///
/// assert!(registry.contains("Uppercase"));
/// ```
#[derive(Clone, Default)]
pub struct TransformRegistry {
    entries: HashMap<String, TransformEntry>,
}

impl TransformRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry, replacing any previous entry with the same name.
    pub fn register(&mut self, entry: TransformEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Look up an entry by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&TransformEntry> {
        self.entries.get(name)
    }

    /// Look up a transform function by name.
    #[inline]
    pub fn transform(&self, name: &str) -> Option<&TransformFn> {
        self.entries.get(name).map(|e| &e.transform)
    }

    /// Look up a condition predicate by name.
    #[inline]
    pub fn condition(&self, name: &str) -> Option<&ConditionFn> {
        self.entries.get(name).and_then(|e| e.condition.as_ref())
    }

    /// Check whether a name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate over registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Get the number of registered entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("TransformRegistry")
            .field("entries", &names)
            .finish()
    }
}

/// Marker field identifying a structural result on the wire.
pub const STRUCTURAL_CHANGE_MARKER: &str = "__structuralChange";

/// Result of a shape-changing transform.
///
/// A transform returns this (encoded as a `Value`) instead of a plain value
/// when one source value expands into several sibling properties. `parts`
/// (indexed expansion, e.g. a string split) and `object` (named expansion,
/// e.g. string → fields) are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralResult {
    /// Handler name in the structural handler registry.
    pub action: String,

    /// Indexed expansion: one new `<key>_<i>` sibling per part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Value>>,

    /// Named expansion: one new `<key>_<child>` sibling per entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Map<String, Value>>,

    /// Whether the source property is removed after expansion.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remove_source: bool,
}

impl StructuralResult {
    /// Create an indexed (`parts`) expansion.
    pub fn parts(action: impl Into<String>, parts: Vec<Value>) -> Self {
        Self {
            action: action.into(),
            parts: Some(parts),
            object: None,
            remove_source: false,
        }
    }

    /// Create a named (`object`) expansion.
    pub fn object(action: impl Into<String>, object: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            parts: None,
            object: Some(object),
            remove_source: false,
        }
    }

    /// Mark the source property for removal (builder pattern).
    #[inline]
    pub fn with_remove_source(mut self) -> Self {
        self.remove_source = true;
        self
    }

    /// Encode as a `Value` carrying the `__structuralChange` marker, for
    /// returning from a [`TransformFn`].
    pub fn into_value(self) -> Value {
        // Serialization of this struct cannot fail.
        let mut value = serde_json::to_value(&self).unwrap_or(Value::Null);
        if let Some(obj) = value.as_object_mut() {
            obj.insert(STRUCTURAL_CHANGE_MARKER.to_owned(), Value::Bool(true));
        }
        value
    }

    /// Decode a transform result if it carries the structural marker.
    ///
    /// Returns `None` for plain (non-shape-changing) results.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get(STRUCTURAL_CHANGE_MARKER) != Some(&Value::Bool(true)) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}
