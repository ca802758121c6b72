//! Delta recorder: appends operations to a recipe as edits occur.
//!
//! The recorder observes edits made to a live document tree and turns each
//! one into a delta. It mints unique operation identifiers (`op_<n>`) and
//! keeps a map from live node identifiers to the opId that created each
//! node, so later edits on the same node carry the correct `parent_op_id`
//! without the caller tracking identifiers itself.

use crate::{Condition, CreatedBy, DeltaOp, Recipe, RecipeResult, RootType};
use serde_json::Value;
use std::collections::HashMap;

/// Descriptor for recording an insert.
#[derive(Clone, Debug)]
pub struct InsertEdit {
    key: String,
    value: Value,
    parent_key: Option<String>,
    parent_op_id: Option<String>,
    parent_node: Option<String>,
    source_key: Option<String>,
    created_by: Option<CreatedBy>,
    condition_stack: Option<Vec<Condition>>,
    node: Option<String>,
}

impl InsertEdit {
    /// Create an insert descriptor for `key` with the given value.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            parent_key: None,
            parent_op_id: None,
            parent_node: None,
            source_key: None,
            created_by: None,
            condition_stack: None,
            node: None,
        }
    }

    /// Address the parent by key (builder pattern).
    #[inline]
    pub fn with_parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = Some(key.into());
        self
    }

    /// Address the parent by the opId that created it (builder pattern).
    #[inline]
    pub fn with_parent_op_id(mut self, op_id: impl Into<String>) -> Self {
        self.parent_op_id = Some(op_id.into());
        self
    }

    /// Address the parent by live node id; the recorder resolves it to the
    /// opId that created that node (builder pattern).
    #[inline]
    pub fn with_parent_node(mut self, node_id: impl Into<String>) -> Self {
        self.parent_node = Some(node_id.into());
        self
    }

    /// Set the source key this value derives from (builder pattern).
    #[inline]
    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    /// Mark this insert as produced by a structural transform (builder
    /// pattern).
    #[inline]
    pub fn with_created_by(mut self, created_by: CreatedBy) -> Self {
        self.created_by = Some(created_by);
        self
    }

    /// Gate this insert on a condition stack (builder pattern).
    #[inline]
    pub fn with_conditions(mut self, stack: Vec<Condition>) -> Self {
        self.condition_stack = Some(stack);
        self
    }

    /// Bind the minted opId to a live node id so later edits on that node
    /// resolve their parent automatically (builder pattern).
    #[inline]
    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node = Some(node_id.into());
        self
    }
}

/// Descriptor for recording a delete.
#[derive(Clone, Debug)]
pub struct DeleteEdit {
    key: String,
    parent_key: Option<String>,
    parent_op_id: Option<String>,
    parent_node: Option<String>,
    condition_stack: Option<Vec<Condition>>,
}

impl DeleteEdit {
    /// Create a delete descriptor for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parent_key: None,
            parent_op_id: None,
            parent_node: None,
            condition_stack: None,
        }
    }

    /// Address the parent by key (builder pattern).
    #[inline]
    pub fn with_parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = Some(key.into());
        self
    }

    /// Address the parent by the opId that created it (builder pattern).
    #[inline]
    pub fn with_parent_op_id(mut self, op_id: impl Into<String>) -> Self {
        self.parent_op_id = Some(op_id.into());
        self
    }

    /// Address the parent by live node id (builder pattern).
    #[inline]
    pub fn with_parent_node(mut self, node_id: impl Into<String>) -> Self {
        self.parent_node = Some(node_id.into());
        self
    }

    /// Gate this delete on a condition stack (builder pattern).
    #[inline]
    pub fn with_conditions(mut self, stack: Vec<Condition>) -> Self {
        self.condition_stack = Some(stack);
        self
    }
}

/// Descriptor for recording a transform.
#[derive(Clone, Debug)]
pub struct TransformEdit {
    key: String,
    transform_name: String,
    params: Vec<Value>,
    parent_key: Option<String>,
    parent_op_id: Option<String>,
    parent_node: Option<String>,
    is_condition: bool,
    condition_stack: Option<Vec<Condition>>,
}

impl TransformEdit {
    /// Create a transform descriptor for `key` using the named function.
    pub fn new(key: impl Into<String>, transform_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transform_name: transform_name.into(),
            params: Vec::new(),
            parent_key: None,
            parent_op_id: None,
            parent_node: None,
            is_condition: false,
            condition_stack: None,
        }
    }

    /// Set the transform parameters (builder pattern).
    #[inline]
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Address the parent by key (builder pattern).
    #[inline]
    pub fn with_parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = Some(key.into());
        self
    }

    /// Address the parent by the opId that created it (builder pattern).
    #[inline]
    pub fn with_parent_op_id(mut self, op_id: impl Into<String>) -> Self {
        self.parent_op_id = Some(op_id.into());
        self
    }

    /// Address the parent by live node id (builder pattern).
    #[inline]
    pub fn with_parent_node(mut self, node_id: impl Into<String>) -> Self {
        self.parent_node = Some(node_id.into());
        self
    }

    /// Make the transform read the source value at replay instead of the
    /// current value (builder pattern).
    #[inline]
    pub fn as_condition(mut self) -> Self {
        self.is_condition = true;
        self
    }

    /// Gate this transform on a condition stack (builder pattern).
    #[inline]
    pub fn with_conditions(mut self, stack: Vec<Condition>) -> Self {
        self.condition_stack = Some(stack);
        self
    }
}

/// Descriptor for recording a rename.
#[derive(Clone, Debug)]
pub struct RenameEdit {
    from: String,
    to: String,
    parent_key: Option<String>,
    parent_op_id: Option<String>,
    parent_node: Option<String>,
    auto_renamed: bool,
    node: Option<String>,
}

impl RenameEdit {
    /// Create a rename descriptor.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            parent_key: None,
            parent_op_id: None,
            parent_node: None,
            auto_renamed: false,
            node: None,
        }
    }

    /// Address the parent by key (builder pattern).
    #[inline]
    pub fn with_parent_key(mut self, key: impl Into<String>) -> Self {
        self.parent_key = Some(key.into());
        self
    }

    /// Address the parent by the opId that created it (builder pattern).
    #[inline]
    pub fn with_parent_op_id(mut self, op_id: impl Into<String>) -> Self {
        self.parent_op_id = Some(op_id.into());
        self
    }

    /// Address the parent by live node id (builder pattern).
    #[inline]
    pub fn with_parent_node(mut self, node_id: impl Into<String>) -> Self {
        self.parent_node = Some(node_id.into());
        self
    }

    /// Mark the rename as collision-avoidance rather than user-authored
    /// (builder pattern).
    #[inline]
    pub fn auto(mut self) -> Self {
        self.auto_renamed = true;
        self
    }

    /// Bind the minted opId to a live node id (builder pattern).
    #[inline]
    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node = Some(node_id.into());
        self
    }
}

/// Records edits into a [`Recipe`], minting operation identifiers.
///
/// # Examples
///
/// ```
/// use reshape_recipe::{DeltaRecorder, InsertEdit, RootType};
/// use serde_json::json;
///
/// let mut recorder = DeltaRecorder::new(RootType::Object);
/// let address = recorder.record_insert(InsertEdit::new("address", json!({})).with_node("n1"));
/// let zip = recorder.record_insert(InsertEdit::new("zip", json!("75001")).with_parent_node("n1"));
///
/// let recipe = recorder.into_recipe();
/// assert_eq!(recipe.deltas()[1].parent_op_id(), Some(address.as_str()));
/// assert_eq!(zip, "op_2");
/// ```
#[derive(Debug)]
pub struct DeltaRecorder {
    recipe: Recipe,
    next_op: u64,
    node_ops: HashMap<String, String>,
}

impl DeltaRecorder {
    /// Create a recorder over a fresh recipe.
    pub fn new(root_type: RootType) -> Self {
        Self::with_recipe(Recipe::new(root_type))
    }

    /// Create a recorder that continues an existing recipe.
    ///
    /// The opId counter resumes past the highest `op_<n>` already present
    /// so continued recording never reuses an identifier.
    pub fn with_recipe(recipe: Recipe) -> Self {
        let next_op = recipe
            .deltas()
            .iter()
            .filter_map(|d| d.op_id()?.strip_prefix("op_")?.parse::<u64>().ok())
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);

        Self {
            recipe,
            next_op,
            node_ops: HashMap::new(),
        }
    }

    /// Get the recipe recorded so far.
    #[inline]
    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Consume the recorder and return the recipe.
    #[inline]
    pub fn into_recipe(self) -> Recipe {
        self.recipe
    }

    /// Look up the opId that created a live node, if recorded here.
    #[inline]
    pub fn op_for_node(&self, node_id: &str) -> Option<&str> {
        self.node_ops.get(node_id).map(String::as_str)
    }

    fn mint(&mut self) -> String {
        let id = format!("op_{}", self.next_op);
        self.next_op += 1;
        id
    }

    fn resolve_parent(
        &self,
        parent_op_id: Option<String>,
        parent_node: Option<&str>,
    ) -> Option<String> {
        parent_op_id.or_else(|| parent_node.and_then(|n| self.node_ops.get(n).cloned()))
    }

    /// Record an insert. Returns the minted opId.
    pub fn record_insert(&mut self, edit: InsertEdit) -> String {
        let op_id = self.mint();
        let parent_op_id = self.resolve_parent(edit.parent_op_id, edit.parent_node.as_deref());

        if let Some(node) = edit.node {
            self.node_ops.insert(node, op_id.clone());
        }

        self.recipe.push(DeltaOp::Insert {
            key: edit.key,
            value: edit.value,
            op_id: Some(op_id.clone()),
            parent_key: edit.parent_key,
            parent_op_id,
            source_key: edit.source_key,
            created_by: edit.created_by,
            condition_stack: edit.condition_stack,
        });
        op_id
    }

    /// Record a delete. Returns the minted opId.
    pub fn record_delete(&mut self, edit: DeleteEdit) -> String {
        let op_id = self.mint();
        let parent_op_id = self.resolve_parent(edit.parent_op_id, edit.parent_node.as_deref());

        self.recipe.push(DeltaOp::Delete {
            key: edit.key,
            op_id: Some(op_id.clone()),
            parent_key: edit.parent_key,
            parent_op_id,
            condition_stack: edit.condition_stack,
        });
        op_id
    }

    /// Record a transform. Returns the minted opId.
    pub fn record_transform(&mut self, edit: TransformEdit) -> String {
        let op_id = self.mint();
        let parent_op_id = self.resolve_parent(edit.parent_op_id, edit.parent_node.as_deref());

        self.recipe.push(DeltaOp::Transform {
            key: edit.key,
            transform_name: edit.transform_name,
            params: edit.params,
            op_id: Some(op_id.clone()),
            parent_key: edit.parent_key,
            parent_op_id,
            is_condition: edit.is_condition.then_some(true),
            condition_stack: edit.condition_stack,
        });
        op_id
    }

    /// Record a rename. Returns the minted opId.
    pub fn record_rename(&mut self, edit: RenameEdit) -> String {
        let op_id = self.mint();
        let parent_op_id = self.resolve_parent(edit.parent_op_id, edit.parent_node.as_deref());

        if let Some(node) = edit.node {
            self.node_ops.insert(node, op_id.clone());
        }

        self.recipe.push(DeltaOp::Rename {
            from: edit.from,
            to: edit.to,
            op_id: Some(op_id.clone()),
            parent_key: edit.parent_key,
            parent_op_id,
            auto_renamed: edit.auto_renamed.then_some(true),
        });
        op_id
    }

    /// Update the parameters of an already-recorded transform.
    ///
    /// Locates the `transform_index`-th Transform recorded for `key`,
    /// mutates its params in place (so replay picks up the new values),
    /// and appends an UpdateParams delta for audit only. Returns the
    /// minted opId of the audit delta.
    pub fn record_update_params(
        &mut self,
        key: &str,
        transform_index: usize,
        params: Vec<Value>,
    ) -> RecipeResult<String> {
        let target = self
            .recipe
            .deltas_mut()
            .iter_mut()
            .filter(|d| matches!(d, DeltaOp::Transform { key: k, .. } if k == key))
            .nth(transform_index);

        let Some(DeltaOp::Transform { params: p, .. }) = target else {
            return Err(crate::RecipeError::transform_not_recorded(
                key,
                transform_index,
            ));
        };
        *p = params.clone();

        let op_id = self.mint();
        self.recipe.push(DeltaOp::UpdateParams {
            key: key.to_owned(),
            transform_index,
            params,
            op_id: Some(op_id.clone()),
        });
        Ok(op_id)
    }

    /// Strip all inserts produced by a structural expansion of
    /// `source_key`, optionally restricted to one transform name.
    ///
    /// Used when the user replaces one structural transform with another:
    /// the old expansion must not leak into replay. Returns the number of
    /// removed deltas.
    pub fn remove_structural_inserts(
        &mut self,
        source_key: &str,
        transform_name: Option<&str>,
    ) -> usize {
        let before = self.recipe.deltas().len();
        self.recipe.deltas_mut().retain(|d| {
            let DeltaOp::Insert {
                source_key: sk,
                created_by: Some(cb),
                ..
            } = d
            else {
                return true;
            };
            let source_matches = sk.as_deref() == Some(source_key);
            let name_matches = transform_name.is_none_or(|n| cb.transform_name == n);
            !(source_matches && name_matches)
        });

        let removed = before - self.recipe.deltas().len();
        if removed > 0 {
            self.recipe.touch();
        }
        removed
    }

    /// Strip all Transform deltas for `key`, optionally restricted to one
    /// transform name. Returns the number of removed deltas.
    pub fn remove_transforms_by_key(&mut self, key: &str, transform_name: Option<&str>) -> usize {
        let before = self.recipe.deltas().len();
        self.recipe.deltas_mut().retain(|d| {
            let DeltaOp::Transform {
                key: k,
                transform_name: tn,
                ..
            } = d
            else {
                return true;
            };
            !(k == key && transform_name.is_none_or(|n| tn == n))
        });

        let removed = before - self.recipe.deltas().len();
        if removed > 0 {
            self.recipe.touch();
        }
        removed
    }
}
