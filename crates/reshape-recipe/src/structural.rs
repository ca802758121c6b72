//! Structural transform handlers: expansion of one value into siblings.
//!
//! When a transform returns a [`StructuralResult`], the engine hands it to
//! the handler registered for the result's `action`. The handler writes the
//! new sibling keys onto the parent object and, when `remove_source` is set,
//! deletes the original key. A missing handler is a non-fatal warning; the
//! data is left unchanged for that operation.

use crate::StructuralResult;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A structural handler: writes an expansion onto a parent object.
///
/// Receives the parent map, the source key, and the structural result.
pub type StructuralHandlerFn =
    Arc<dyn Fn(&mut Map<String, Value>, &str, &StructuralResult) + Send + Sync>;

/// Action name → handler table for structural expansions.
#[derive(Clone, Default)]
pub struct StructuralHandlerRegistry {
    handlers: HashMap<String, StructuralHandlerFn>,
}

impl StructuralHandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the built-in handlers
    /// (`split`, `arrayToProperties`, `toObject`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("split", indexed_expansion);
        registry.register("arrayToProperties", indexed_expansion);
        registry.register("toObject", named_expansion);
        registry
    }

    /// Register a handler for an action name.
    pub fn register<F>(&mut self, action: impl Into<String>, handler: F)
    where
        F: Fn(&mut Map<String, Value>, &str, &StructuralResult) + Send + Sync + 'static,
    {
        self.handlers.insert(action.into(), Arc::new(handler));
    }

    /// Check whether an action has a handler.
    #[inline]
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Apply the handler for `result.action` to the parent object.
    ///
    /// Returns `true` if a handler ran, `false` (after a warning) if none
    /// is registered for the action.
    pub fn apply(
        &self,
        parent: &mut Map<String, Value>,
        source_key: &str,
        result: &StructuralResult,
    ) -> bool {
        match self.handlers.get(&result.action) {
            Some(handler) => {
                handler(parent, source_key, result);
                true
            }
            None => {
                tracing::warn!(
                    action = %result.action,
                    source_key = %source_key,
                    "no structural handler for action; data left unchanged"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for StructuralHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<&String> = self.handlers.keys().collect();
        actions.sort_unstable();
        f.debug_struct("StructuralHandlerRegistry")
            .field("actions", &actions)
            .finish()
    }
}

/// Indexed expansion: `parts` become `<sourceKey>_<i>` siblings.
fn indexed_expansion(parent: &mut Map<String, Value>, source_key: &str, result: &StructuralResult) {
    let Some(parts) = &result.parts else {
        tracing::warn!(
            action = %result.action,
            "structural result has no parts; nothing to expand"
        );
        return;
    };

    for (i, part) in parts.iter().enumerate() {
        parent.insert(format!("{source_key}_{i}"), part.clone());
    }

    if result.remove_source {
        parent.shift_remove(source_key);
    }
}

/// Named expansion: `object` entries become `<sourceKey>_<child>` siblings.
fn named_expansion(parent: &mut Map<String, Value>, source_key: &str, result: &StructuralResult) {
    let Some(object) = &result.object else {
        tracing::warn!(
            action = %result.action,
            "structural result has no object; nothing to expand"
        );
        return;
    };

    for (child, value) in object {
        parent.insert(format!("{source_key}_{child}"), value.clone());
    }

    if result.remove_source {
        parent.shift_remove(source_key);
    }
}
