//! Delta operations: the atomic edits a recipe records and replays.
//!
//! Each operation describes one change to a JSON document. Operations are
//! recorded against a live tree whose keys may later be renamed or expanded,
//! so addressing goes through optional operation identifiers (`op_id`) in
//! addition to plain keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provenance marker for a property produced by a structural transform.
///
/// An insert carrying `CreatedBy` was not authored directly by the user; it
/// was synthesized when a transform expanded one source value into several
/// sibling properties. At replay time the named transform is re-run against
/// the source value to regenerate the expansion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBy {
    /// Name of the structural transform that produced this property.
    pub transform_name: String,

    /// Parameters the transform was invoked with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,

    /// For object-shaped expansions feeding a nested insert: the child key
    /// to extract from the expansion result instead of spreading siblings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_key: Option<String>,
}

impl CreatedBy {
    /// Create a provenance marker for the named transform.
    #[inline]
    pub fn new(transform_name: impl Into<String>) -> Self {
        Self {
            transform_name: transform_name.into(),
            params: Vec::new(),
            result_key: None,
        }
    }

    /// Set the transform parameters (builder pattern).
    #[inline]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Set the result key for nested extraction (builder pattern).
    #[inline]
    pub fn with_result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }
}

/// One entry of a condition stack: a named predicate plus its parameters.
///
/// All entries of a stack must pass for the gated operation to take effect.
/// Conditions gate rather than fail: a missing or false predicate skips the
/// operation silently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Name of the predicate in the transform registry.
    pub condition_name: String,

    /// Parameters passed to the predicate after the observed value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition_params: Vec<Value>,
}

impl Condition {
    /// Create a condition with no parameters.
    #[inline]
    pub fn new(condition_name: impl Into<String>) -> Self {
        Self {
            condition_name: condition_name.into(),
            condition_params: Vec::new(),
        }
    }

    /// Set the condition parameters (builder pattern).
    #[inline]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.condition_params = params;
        self
    }
}

/// A single recorded edit.
///
/// The variant set is closed on the Rust side but open on the wire: an
/// unrecognized `op` discriminant deserializes to [`DeltaOp::Unknown`] so
/// that recipes written by newer versions still import; the applier logs
/// and skips unknown operations instead of failing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeltaOp {
    /// Positional no-op, reserved for future delta composition.
    Retain {
        /// Number of positions to skip.
        count: usize,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,
    },

    /// Add a property to an object.
    Insert {
        /// Key of the property to add.
        key: String,

        /// Recorded value, used when no source snapshot provides one.
        value: Value,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,

        /// Key of the parent property (shallow addressing).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,

        /// Identifier of the operation that created the parent property
        /// (rename-safe addressing).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_op_id: Option<String>,

        /// Key of the source property this value was derived from.
        #[serde(skip_serializing_if = "Option::is_none")]
        source_key: Option<String>,

        /// Set when this insert was synthesized by a structural transform.
        #[serde(skip_serializing_if = "Option::is_none")]
        created_by: Option<CreatedBy>,

        /// Predicates that must all pass for the insert to apply.
        #[serde(skip_serializing_if = "Option::is_none")]
        condition_stack: Option<Vec<Condition>>,
    },

    /// Remove a property. Recorded, not destructive to history.
    Delete {
        /// Key of the property to remove.
        key: String,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,

        /// Key of the parent property (shallow addressing).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,

        /// Identifier of the operation that created the parent property.
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_op_id: Option<String>,

        /// Predicates that must all pass for the delete to apply.
        #[serde(skip_serializing_if = "Option::is_none")]
        condition_stack: Option<Vec<Condition>>,
    },

    /// Apply a named, non-shape-changing function to a property's value.
    Transform {
        /// Key of the property to transform.
        key: String,

        /// Name of the function in the transform registry.
        transform_name: String,

        /// Parameters passed to the function after the value.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<Value>,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,

        /// Key of the parent property (shallow addressing).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,

        /// Identifier of the operation that created the parent property.
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_op_id: Option<String>,

        /// When set, the function reads the source value instead of the
        /// current value.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_condition: Option<bool>,

        /// Predicates that must all pass for the transform to apply.
        #[serde(skip_serializing_if = "Option::is_none")]
        condition_stack: Option<Vec<Condition>>,
    },

    /// Change a property's key.
    Rename {
        /// Current key.
        from: String,

        /// New key.
        to: String,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,

        /// Key of the parent property (shallow addressing).
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,

        /// Identifier of the operation that created the parent property.
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_op_id: Option<String>,

        /// Set when the rename was generated to avoid a key collision
        /// rather than authored by the user.
        #[serde(skip_serializing_if = "Option::is_none")]
        auto_renamed: Option<bool>,
    },

    /// Metadata-only edit to an already-recorded transform's parameters.
    ///
    /// The referenced transform delta is mutated in place at record time,
    /// so this delta is an audit entry and a replay no-op.
    UpdateParams {
        /// Key of the transformed property.
        key: String,

        /// Index of the transform among those recorded for `key`.
        transform_index: usize,

        /// The new parameters.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<Value>,

        /// Unique operation identifier.
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<String>,
    },

    /// Operation kind this version does not know about.
    ///
    /// Produced by deserializing a recipe written by a newer version.
    #[serde(other)]
    Unknown,
}

impl DeltaOp {
    // Convenience constructors; optional fields start unset.

    /// Create a Retain operation.
    #[inline]
    pub fn retain(count: usize) -> Self {
        DeltaOp::Retain { count, op_id: None }
    }

    /// Create an Insert operation.
    #[inline]
    pub fn insert(key: impl Into<String>, value: impl Into<Value>) -> Self {
        DeltaOp::Insert {
            key: key.into(),
            value: value.into(),
            op_id: None,
            parent_key: None,
            parent_op_id: None,
            source_key: None,
            created_by: None,
            condition_stack: None,
        }
    }

    /// Create a Delete operation.
    #[inline]
    pub fn delete(key: impl Into<String>) -> Self {
        DeltaOp::Delete {
            key: key.into(),
            op_id: None,
            parent_key: None,
            parent_op_id: None,
            condition_stack: None,
        }
    }

    /// Create a Transform operation.
    #[inline]
    pub fn transform(
        key: impl Into<String>,
        transform_name: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        DeltaOp::Transform {
            key: key.into(),
            transform_name: transform_name.into(),
            params,
            op_id: None,
            parent_key: None,
            parent_op_id: None,
            is_condition: None,
            condition_stack: None,
        }
    }

    /// Create a Rename operation.
    #[inline]
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        DeltaOp::Rename {
            from: from.into(),
            to: to.into(),
            op_id: None,
            parent_key: None,
            parent_op_id: None,
            auto_renamed: None,
        }
    }

    /// Create an UpdateParams operation.
    #[inline]
    pub fn update_params(
        key: impl Into<String>,
        transform_index: usize,
        params: Vec<Value>,
    ) -> Self {
        DeltaOp::UpdateParams {
            key: key.into(),
            transform_index,
            params,
            op_id: None,
        }
    }

    /// Get the operation identifier, if assigned.
    #[inline]
    pub fn op_id(&self) -> Option<&str> {
        match self {
            DeltaOp::Retain { op_id, .. }
            | DeltaOp::Insert { op_id, .. }
            | DeltaOp::Delete { op_id, .. }
            | DeltaOp::Transform { op_id, .. }
            | DeltaOp::Rename { op_id, .. }
            | DeltaOp::UpdateParams { op_id, .. } => op_id.as_deref(),
            DeltaOp::Unknown => None,
        }
    }

    /// Set the operation identifier.
    #[inline]
    pub fn set_op_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        match self {
            DeltaOp::Retain { op_id, .. }
            | DeltaOp::Insert { op_id, .. }
            | DeltaOp::Delete { op_id, .. }
            | DeltaOp::Transform { op_id, .. }
            | DeltaOp::Rename { op_id, .. }
            | DeltaOp::UpdateParams { op_id, .. } => *op_id = Some(id),
            DeltaOp::Unknown => {}
        }
    }

    /// Get the key this operation establishes or targets.
    ///
    /// For renames this is the new key, since that is the key the property
    /// carries after the operation applies.
    #[inline]
    pub fn key(&self) -> Option<&str> {
        match self {
            DeltaOp::Insert { key, .. }
            | DeltaOp::Delete { key, .. }
            | DeltaOp::Transform { key, .. }
            | DeltaOp::UpdateParams { key, .. } => Some(key),
            DeltaOp::Rename { to, .. } => Some(to),
            DeltaOp::Retain { .. } | DeltaOp::Unknown => None,
        }
    }

    /// Get the parent operation identifier, if any.
    #[inline]
    pub fn parent_op_id(&self) -> Option<&str> {
        match self {
            DeltaOp::Insert { parent_op_id, .. }
            | DeltaOp::Delete { parent_op_id, .. }
            | DeltaOp::Transform { parent_op_id, .. }
            | DeltaOp::Rename { parent_op_id, .. } => parent_op_id.as_deref(),
            _ => None,
        }
    }

    /// Get the parent key, if any.
    #[inline]
    pub fn parent_key(&self) -> Option<&str> {
        match self {
            DeltaOp::Insert { parent_key, .. }
            | DeltaOp::Delete { parent_key, .. }
            | DeltaOp::Transform { parent_key, .. }
            | DeltaOp::Rename { parent_key, .. } => parent_key.as_deref(),
            _ => None,
        }
    }

    /// Get the condition stack, if any.
    #[inline]
    pub fn condition_stack(&self) -> Option<&[Condition]> {
        match self {
            DeltaOp::Insert {
                condition_stack, ..
            }
            | DeltaOp::Delete {
                condition_stack, ..
            }
            | DeltaOp::Transform {
                condition_stack, ..
            } => condition_stack.as_deref(),
            _ => None,
        }
    }

    /// True for operations that establish a key (Insert and Rename), the
    /// only operations a `parent_op_id` may reference.
    #[inline]
    pub fn establishes_key(&self) -> bool {
        matches!(self, DeltaOp::Insert { .. } | DeltaOp::Rename { .. })
    }

    /// Get the operation name as it appears on the wire.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            DeltaOp::Retain { .. } => "retain",
            DeltaOp::Insert { .. } => "insert",
            DeltaOp::Delete { .. } => "delete",
            DeltaOp::Transform { .. } => "transform",
            DeltaOp::Rename { .. } => "rename",
            DeltaOp::UpdateParams { .. } => "updateParams",
            DeltaOp::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_constructors() {
        let ins = DeltaOp::insert("name", json!("john"));
        assert_eq!(ins.name(), "insert");
        assert_eq!(ins.key(), Some("name"));
        assert_eq!(ins.op_id(), None);

        let ren = DeltaOp::rename("firstName", "name");
        assert_eq!(ren.name(), "rename");
        assert_eq!(ren.key(), Some("name"));
        assert!(ren.establishes_key());

        let tr = DeltaOp::transform("age", "Add", vec![json!(1)]);
        assert_eq!(tr.name(), "transform");
        assert!(!tr.establishes_key());
    }

    #[test]
    fn test_op_serde_round_trip() {
        let mut op = DeltaOp::insert("zip", json!("75001"));
        op.set_op_id("op_2");
        if let DeltaOp::Insert { parent_op_id, .. } = &mut op {
            *parent_op_id = Some("op_1".into());
        }

        let text = serde_json::to_string(&op).unwrap();
        let parsed: DeltaOp = serde_json::from_str(&text).unwrap();
        assert_eq!(op, parsed);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let op = DeltaOp::Transform {
            key: "name".into(),
            transform_name: "Uppercase".into(),
            params: vec![],
            op_id: Some("op_1".into()),
            parent_key: None,
            parent_op_id: None,
            is_condition: None,
            condition_stack: None,
        };

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["op"], "transform");
        assert_eq!(value["transformName"], "Uppercase");
        assert_eq!(value["opId"], "op_1");
        assert!(value.get("parentKey").is_none());
    }

    #[test]
    fn test_unknown_op_discriminant_deserializes() {
        let text = r#"{"op": "teleport", "key": "x"}"#;
        let parsed: DeltaOp = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, DeltaOp::Unknown);
    }

    #[test]
    fn test_condition_builder() {
        let cond = Condition::new("isTrue").with_params(vec![json!(1)]);
        assert_eq!(cond.condition_name, "isTrue");
        assert_eq!(cond.condition_params, vec![json!(1)]);
    }

    #[test]
    fn test_created_by_serde() {
        let cb = CreatedBy::new("split")
            .with_params(vec![json!(" ")])
            .with_result_key("part_0");
        let value = serde_json::to_value(&cb).unwrap();
        assert_eq!(value["transformName"], "split");
        assert_eq!(value["resultKey"], "part_0");
    }
}
