//! Recipe replay: the delta interpreter.
//!
//! Replays an ordered delta list against a data snapshot, producing the
//! transformed output. Replay is deterministic and infallible by design:
//! a delta that cannot apply (missing transform, unresolvable parent,
//! failed condition, unknown operation) is skipped with a warning and
//! replay continues, because later deltas may still be valid — e.g. when
//! the parent itself was conditionally created.
//!
//! The input is deep-cloned once up front; every operation then mutates
//! that working copy in place. Per-call state (the opId → current-key map,
//! the structural-insert dedup set, the condition cache) is scoped to one
//! replay and never reused across calls.

use crate::{
    normalize_against, resolve_parent_path, Condition, CreatedBy, DeltaOp, Recipe,
    StructuralHandlerRegistry, StructuralResult, TransformRegistry,
};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Replay a recipe against a data snapshot.
///
/// When `data` is an array, the recipe is applied template-style: each
/// element is normalized against the template shape and the full delta
/// list is replayed on it independently, pairing element `i` with
/// `source_data[i]` when the source snapshot is itself an array.
///
/// `source_data` is the original (pre-edit) snapshot; restores and
/// condition evaluation prefer it over the current value.
///
/// # Examples
///
/// ```
/// use reshape_recipe::{apply_recipe, DeltaOp, Recipe, RootType, TransformEntry, TransformRegistry};
/// use serde_json::{json, Value};
///
/// let mut registry = TransformRegistry::new();
/// registry.register(TransformEntry::new("Uppercase", |v: &Value, _: &[Value]| {
///     v.as_str().map(|s| json!(s.to_uppercase())).unwrap_or_else(|| v.clone())
/// }));
///
/// let mut recipe = Recipe::new(RootType::Object);
/// recipe.push(DeltaOp::rename("firstName", "name"));
/// recipe.push(DeltaOp::transform("name", "Uppercase", vec![]));
///
/// let out = apply_recipe(&json!({"firstName": "Ana"}), &recipe, &registry, None);
/// assert_eq!(out, json!({"name": "ANA"}));
/// ```
pub fn apply_recipe(
    data: &Value,
    recipe: &Recipe,
    transforms: &TransformRegistry,
    source_data: Option<&Value>,
) -> Value {
    let handlers = StructuralHandlerRegistry::with_builtins();
    apply_recipe_with_handlers(data, recipe, transforms, &handlers, source_data)
}

/// Replay a recipe with a caller-supplied structural handler registry.
pub fn apply_recipe_with_handlers(
    data: &Value,
    recipe: &Recipe,
    transforms: &TransformRegistry,
    handlers: &StructuralHandlerRegistry,
    source_data: Option<&Value>,
) -> Value {
    // Array input replays template-style regardless of whether the recipe
    // was recorded against an object or an array element.
    let Some(elements) = data.as_array() else {
        return apply_deltas(data, recipe.deltas(), transforms, handlers, source_data);
    };
    let source_elements = source_data.and_then(Value::as_array);

    // Template shape: the first source element when available, else the
    // first data element.
    let template = source_elements
        .and_then(|s| s.first())
        .or_else(|| elements.first())
        .cloned()
        .unwrap_or(Value::Null);

    let transformed: Vec<Value> = elements
        .iter()
        .enumerate()
        .map(|(i, element)| {
            let normalized = normalize_against(element, &template);
            let element_source = match source_elements {
                Some(s) => s.get(i),
                None => source_data,
            };
            apply_deltas(
                &normalized,
                recipe.deltas(),
                transforms,
                handlers,
                element_source,
            )
        })
        .collect();

    Value::Array(transformed)
}

/// Replay a delta list against a single document.
pub fn apply_deltas(
    data: &Value,
    deltas: &[DeltaOp],
    transforms: &TransformRegistry,
    handlers: &StructuralHandlerRegistry,
    source_data: Option<&Value>,
) -> Value {
    let mut result = data.clone();
    let mut state = ApplyState::new(deltas, transforms, handlers);

    for delta in deltas {
        match delta {
            DeltaOp::Insert {
                key,
                value,
                op_id,
                parent_key,
                parent_op_id,
                source_key,
                created_by,
                condition_stack,
            } => {
                state.apply_insert(
                    &mut result,
                    key,
                    value,
                    op_id.as_deref(),
                    parent_key.as_deref(),
                    parent_op_id.as_deref(),
                    source_key.as_deref(),
                    created_by.as_ref(),
                    condition_stack.as_deref(),
                    source_data,
                );
            }
            DeltaOp::Delete {
                key,
                parent_key,
                parent_op_id,
                condition_stack,
                ..
            } => {
                state.apply_delete(
                    &mut result,
                    key,
                    parent_key.as_deref(),
                    parent_op_id.as_deref(),
                    condition_stack.as_deref(),
                    source_data,
                );
            }
            DeltaOp::Transform {
                key,
                transform_name,
                params,
                parent_key,
                parent_op_id,
                is_condition,
                condition_stack,
                ..
            } => {
                state.apply_transform(
                    &mut result,
                    key,
                    transform_name,
                    params,
                    parent_key.as_deref(),
                    parent_op_id.as_deref(),
                    is_condition.unwrap_or(false),
                    condition_stack.as_deref(),
                    source_data,
                );
            }
            DeltaOp::Rename {
                from,
                to,
                op_id,
                parent_key,
                parent_op_id,
                ..
            } => {
                state.apply_rename(
                    &mut result,
                    from,
                    to,
                    op_id.as_deref(),
                    parent_key.as_deref(),
                    parent_op_id.as_deref(),
                );
            }
            // Replay no-ops: Retain is positional only; UpdateParams was
            // already folded into its transform at record time.
            DeltaOp::Retain { .. } => {}
            DeltaOp::UpdateParams { .. } => {
                tracing::trace!("updateParams delta is a replay no-op");
            }
            DeltaOp::Unknown => {
                tracing::warn!("unknown delta operation; skipping");
            }
        }
    }

    result
}

/// Per-replay mutable state. Never reused across calls.
struct ApplyState<'a> {
    deltas: &'a [DeltaOp],
    transforms: &'a TransformRegistry,
    handlers: &'a StructuralHandlerRegistry,
    /// Current key for each applied Insert/Rename opId.
    op_id_to_key: HashMap<String, String>,
    /// Dedup keys of structural expansions already applied in this pass.
    applied_structural: HashSet<String>,
    /// Memoized condition evaluations, keyed by
    /// `(key, condition, observed value, params)`.
    condition_cache: HashMap<String, bool>,
}

impl<'a> ApplyState<'a> {
    fn new(
        deltas: &'a [DeltaOp],
        transforms: &'a TransformRegistry,
        handlers: &'a StructuralHandlerRegistry,
    ) -> Self {
        Self {
            deltas,
            transforms,
            handlers,
            op_id_to_key: HashMap::new(),
            applied_structural: HashSet::new(),
            condition_cache: HashMap::new(),
        }
    }

    fn resolve(&self, parent_op_id: Option<&str>, parent_key: Option<&str>) -> Vec<String> {
        resolve_parent_path(parent_op_id, parent_key, &self.op_id_to_key, self.deltas)
    }

    /// Evaluate a condition stack against the observed value.
    ///
    /// The observed value is the source snapshot's value when available,
    /// the current value otherwise. Any predicate missing from the
    /// registry, or any predicate returning false, gates the operation
    /// off — silently, because conditions gate rather than fail.
    fn conditions_pass(&mut self, key: &str, stack: &[Condition], observed: &Value) -> bool {
        for condition in stack {
            let cache_key = format!(
                "{key}|{}|{}|{}",
                condition.condition_name,
                observed,
                Value::Array(condition.condition_params.clone()),
            );

            let pass = match self.condition_cache.get(&cache_key) {
                Some(cached) => *cached,
                None => {
                    let outcome = match self.transforms.condition(&condition.condition_name) {
                        Some(predicate) => predicate(observed, &condition.condition_params),
                        None => {
                            tracing::warn!(
                                condition = %condition.condition_name,
                                key = %key,
                                "condition predicate not in registry; skipping operation"
                            );
                            false
                        }
                    };
                    self.condition_cache.insert(cache_key, outcome);
                    outcome
                }
            };

            if !pass {
                tracing::debug!(
                    condition = %condition.condition_name,
                    key = %key,
                    "condition gated operation off"
                );
                return false;
            }
        }
        true
    }

    /// The value conditions are evaluated against: source first, then the
    /// current value under the resolved parent.
    fn observed_value(
        &self,
        root: &Value,
        parent_path: &[String],
        key: &str,
        source_data: Option<&Value>,
    ) -> Value {
        if let Some(source) = source_data {
            if let Some(v) = source.get(key) {
                return v.clone();
            }
        }
        object_at_path(root, parent_path)
            .and_then(|parent| parent.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_insert(
        &mut self,
        root: &mut Value,
        key: &str,
        recorded_value: &Value,
        op_id: Option<&str>,
        parent_key: Option<&str>,
        parent_op_id: Option<&str>,
        source_key: Option<&str>,
        created_by: Option<&CreatedBy>,
        condition_stack: Option<&[Condition]>,
        source_data: Option<&Value>,
    ) {
        let parent_path = self.resolve(parent_op_id, parent_key);

        if let Some(stack) = condition_stack {
            let observed_key = source_key.unwrap_or(key);
            let observed = self.observed_value(root, &parent_path, observed_key, source_data);
            if !self.conditions_pass(observed_key, stack, &observed) {
                return;
            }
        }

        // Structural inserts are deduplicated per pass: one expansion can
        // legitimately be recorded as several Insert deltas, but must
        // apply exactly once.
        if let (Some(cb), Some(sk)) = (created_by, source_key) {
            let dedup_key = op_id
                .map(str::to_owned)
                .unwrap_or_else(|| format!("{sk}:{}", cb.transform_name));
            if !self.applied_structural.insert(dedup_key) {
                tracing::debug!(key = %key, source_key = %sk, "structural insert already applied");
                self.record_key(op_id, key);
                return;
            }
        }

        // Read the source value before borrowing the parent mutably.
        let structural_source = match (created_by, source_key) {
            (Some(_), Some(sk)) => {
                Some(self.observed_value(root, &parent_path, sk, source_data))
            }
            _ => None,
        };

        let Some(parent) = object_at_path_mut(root, &parent_path) else {
            tracing::warn!(
                key = %key,
                path = ?parent_path,
                "unresolvable parent path; skipping insert"
            );
            return;
        };

        match (created_by, source_key) {
            (Some(cb), Some(sk)) => {
                let source_value = structural_source.unwrap_or(Value::Null);
                self.insert_structural(parent, key, sk, cb, &source_value);
            }
            _ => {
                // Restore: prefer the source snapshot's value, else the
                // recorded literal.
                let value = source_data
                    .and_then(|s| s.get(source_key.unwrap_or(key)))
                    .cloned()
                    .unwrap_or_else(|| recorded_value.clone());
                parent.insert(key.to_owned(), value);
            }
        }

        self.record_key(op_id, key);
    }

    /// Re-run the structural transform behind a `created_by` insert and
    /// write its (possibly multi-sibling) expansion onto the parent.
    fn insert_structural(
        &mut self,
        parent: &mut Map<String, Value>,
        key: &str,
        source_key: &str,
        created_by: &CreatedBy,
        source_value: &Value,
    ) {
        let Some(transform) = self.transforms.transform(&created_by.transform_name) else {
            tracing::warn!(
                transform = %created_by.transform_name,
                key = %key,
                "transform not in registry; skipping structural insert"
            );
            return;
        };

        let result = transform(source_value, &created_by.params);

        let Some(structural) = StructuralResult::from_value(&result) else {
            // The transform no longer expands; treat its output as the value.
            parent.insert(key.to_owned(), result);
            return;
        };

        if let Some(result_key) = &created_by.result_key {
            // Nested expansion: extract a single child value instead of
            // spreading siblings.
            let extracted = structural
                .object
                .as_ref()
                .and_then(|o| o.get(result_key))
                .cloned();
            match extracted {
                Some(value) => {
                    parent.insert(key.to_owned(), value);
                }
                None => {
                    tracing::warn!(
                        result_key = %result_key,
                        transform = %created_by.transform_name,
                        "structural result has no value for resultKey; skipping insert"
                    );
                }
            }
            return;
        }

        // Root-level expansion: all siblings inserted atomically by the
        // registered handler.
        self.handlers.apply(parent, source_key, &structural);
    }

    fn apply_delete(
        &mut self,
        root: &mut Value,
        key: &str,
        parent_key: Option<&str>,
        parent_op_id: Option<&str>,
        condition_stack: Option<&[Condition]>,
        source_data: Option<&Value>,
    ) {
        let parent_path = self.resolve(parent_op_id, parent_key);

        if let Some(stack) = condition_stack {
            let observed = self.observed_value(root, &parent_path, key, source_data);
            if !self.conditions_pass(key, stack, &observed) {
                return;
            }
        }

        let Some(parent) = object_at_path_mut(root, &parent_path) else {
            tracing::warn!(
                key = %key,
                path = ?parent_path,
                "unresolvable parent path; skipping delete"
            );
            return;
        };

        parent.shift_remove(key);
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_transform(
        &mut self,
        root: &mut Value,
        key: &str,
        transform_name: &str,
        params: &[Value],
        parent_key: Option<&str>,
        parent_op_id: Option<&str>,
        is_condition: bool,
        condition_stack: Option<&[Condition]>,
        source_data: Option<&Value>,
    ) {
        let parent_path = self.resolve(parent_op_id, parent_key);

        if let Some(stack) = condition_stack {
            let observed = self.observed_value(root, &parent_path, key, source_data);
            if !self.conditions_pass(key, stack, &observed) {
                return;
            }
        }

        let Some(transform) = self.transforms.transform(transform_name) else {
            tracing::warn!(
                transform = %transform_name,
                key = %key,
                "transform not in registry; skipping"
            );
            return;
        };
        let transform = transform.clone();

        // Condition-style transforms observe the original value; ordinary
        // transforms observe whatever earlier deltas produced.
        let input = if is_condition {
            self.observed_value(root, &parent_path, key, source_data)
        } else {
            match object_at_path(root, &parent_path).and_then(|p| p.get(key)) {
                Some(v) => v.clone(),
                None => {
                    tracing::debug!(key = %key, "transform target absent; skipping");
                    return;
                }
            }
        };

        let output = transform(&input, params);

        let Some(parent) = object_at_path_mut(root, &parent_path) else {
            tracing::warn!(
                key = %key,
                path = ?parent_path,
                "unresolvable parent path; skipping transform"
            );
            return;
        };

        match StructuralResult::from_value(&output) {
            Some(structural) => {
                self.handlers.apply(parent, key, &structural);
            }
            None => {
                parent.insert(key.to_owned(), output);
            }
        }
    }

    fn apply_rename(
        &mut self,
        root: &mut Value,
        from: &str,
        to: &str,
        op_id: Option<&str>,
        parent_key: Option<&str>,
        parent_op_id: Option<&str>,
    ) {
        let parent_path = self.resolve(parent_op_id, parent_key);

        let Some(parent) = object_at_path_mut(root, &parent_path) else {
            tracing::warn!(
                from = %from,
                path = ?parent_path,
                "unresolvable parent path; skipping rename"
            );
            return;
        };

        if !parent.contains_key(from) {
            tracing::debug!(from = %from, "rename source absent; skipping");
            return;
        }

        // Rebuild the map so the renamed key keeps its position and all
        // other keys keep theirs.
        let entries = std::mem::take(parent);
        for (k, v) in entries {
            let k = if k == from { to.to_owned() } else { k };
            parent.insert(k, v);
        }

        // Later deltas addressing ancestors by opId must see the new key.
        for current in self.op_id_to_key.values_mut() {
            if current == from {
                *current = to.to_owned();
            }
        }
        self.record_key(op_id, to);
    }

    fn record_key(&mut self, op_id: Option<&str>, key: &str) {
        if let Some(id) = op_id {
            self.op_id_to_key.insert(id.to_owned(), key.to_owned());
        }
    }
}

/// Navigate to the object at a key path (read-only).
fn object_at_path<'v>(root: &'v Value, path: &[String]) -> Option<&'v Map<String, Value>> {
    let mut current = root;
    for key in path {
        current = current.get(key)?;
    }
    current.as_object()
}

/// Navigate to the object at a key path (mutable).
fn object_at_path_mut<'v>(root: &'v mut Value, path: &[String]) -> Option<&'v mut Map<String, Value>> {
    let mut current = root;
    for key in path {
        current = current.get_mut(key)?;
    }
    current.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RootType, TransformEntry};
    use serde_json::json;

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        registry.register(TransformEntry::new("Uppercase", |v: &Value, _: &[Value]| {
            v.as_str()
                .map(|s| json!(s.to_uppercase()))
                .unwrap_or_else(|| v.clone())
        }));
        registry.register(TransformEntry::new("Add", |v: &Value, params: &[Value]| {
            let base = v.as_i64().unwrap_or(0);
            let amount = params.first().and_then(Value::as_i64).unwrap_or(0);
            json!(base + amount)
        }));
        registry
    }

    fn recipe_of(deltas: Vec<DeltaOp>) -> Recipe {
        let mut recipe = Recipe::new(RootType::Object);
        for delta in deltas {
            recipe.push(delta);
        }
        recipe
    }

    #[test]
    fn test_insert_literal_value() {
        let recipe = recipe_of(vec![DeltaOp::insert("city", json!("Paris"))]);
        let out = apply_recipe(&json!({}), &recipe, &registry(), None);
        assert_eq!(out, json!({"city": "Paris"}));
    }

    #[test]
    fn test_insert_prefers_source_value() {
        let recipe = recipe_of(vec![DeltaOp::insert("city", json!("Paris"))]);
        let source = json!({"city": "Berlin"});
        let out = apply_recipe(&json!({}), &recipe, &registry(), Some(&source));
        assert_eq!(out, json!({"city": "Berlin"}));
    }

    #[test]
    fn test_transform_reads_current_value() {
        let recipe = recipe_of(vec![
            DeltaOp::insert("n", json!(1)),
            DeltaOp::transform("n", "Add", vec![json!(10)]),
            DeltaOp::transform("n", "Add", vec![json!(10)]),
        ]);
        let out = apply_recipe(&json!({}), &recipe, &registry(), None);
        assert_eq!(out, json!({"n": 21}));
    }

    #[test]
    fn test_transform_on_absent_key_is_skipped() {
        let recipe = recipe_of(vec![DeltaOp::transform("ghost", "Add", vec![json!(1)])]);
        let out = apply_recipe(&json!({"x": 1}), &recipe, &registry(), None);
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn test_rename_preserves_key_order() {
        let recipe = recipe_of(vec![DeltaOp::rename("b", "renamed")]);
        let out = apply_recipe(&json!({"a": 1, "b": 2, "c": 3}), &recipe, &registry(), None);

        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "renamed", "c"]);
        assert_eq!(out["renamed"], 2);
    }

    #[test]
    fn test_rename_of_absent_key_is_skipped() {
        let recipe = recipe_of(vec![DeltaOp::rename("ghost", "spirit")]);
        let out = apply_recipe(&json!({"a": 1}), &recipe, &registry(), None);
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_delete_removes_key() {
        let recipe = recipe_of(vec![DeltaOp::delete("b")]);
        let out = apply_recipe(&json!({"a": 1, "b": 2}), &recipe, &registry(), None);
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_unknown_delta_is_skipped() {
        let recipe = recipe_of(vec![DeltaOp::Unknown, DeltaOp::insert("a", json!(1))]);
        let out = apply_recipe(&json!({}), &recipe, &registry(), None);
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_retain_and_update_params_are_no_ops() {
        let recipe = recipe_of(vec![
            DeltaOp::retain(3),
            DeltaOp::update_params("x", 0, vec![json!(1)]),
        ]);
        let out = apply_recipe(&json!({"x": 1}), &recipe, &registry(), None);
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let data = json!({"firstName": "Ana"});
        let recipe = recipe_of(vec![DeltaOp::rename("firstName", "name")]);
        let _ = apply_recipe(&data, &recipe, &registry(), None);
        assert_eq!(data, json!({"firstName": "Ana"}));
    }

    #[test]
    fn test_rename_updates_op_id_currency() {
        // Insert creates "address" (op_1), rename moves it to "location",
        // then a nested insert addresses the parent by op_1.
        let mut ins = DeltaOp::insert("address", json!({}));
        ins.set_op_id("op_1");
        let mut zip = DeltaOp::insert("zip", json!("75001"));
        zip.set_op_id("op_3");
        if let DeltaOp::Insert { parent_op_id, .. } = &mut zip {
            *parent_op_id = Some("op_1".into());
        }
        let recipe = recipe_of(vec![ins, DeltaOp::rename("address", "location"), zip]);

        let out = apply_recipe(&json!({}), &recipe, &registry(), None);
        assert_eq!(out, json!({"location": {"zip": "75001"}}));
    }
}
