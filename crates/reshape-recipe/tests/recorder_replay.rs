//! Record-then-replay integration tests: the recorder produces recipes the
//! applier replays faithfully.

use reshape_recipe::{
    apply_recipe, export_recipe, import_recipe, CreatedBy, DeltaRecorder, DeleteEdit, InsertEdit,
    RenameEdit, RootType, StructuralResult, TransformEdit, TransformEntry, TransformRegistry,
    Value,
};
use serde_json::json;

fn registry() -> TransformRegistry {
    let mut registry = TransformRegistry::new();

    registry.register(TransformEntry::new("Split", |v: &Value, params: &[Value]| {
        let sep = params.first().and_then(Value::as_str).unwrap_or(" ");
        let parts: Vec<Value> = v
            .as_str()
            .map(|s| s.split(sep).map(|p| json!(p)).collect())
            .unwrap_or_default();
        StructuralResult::parts("split", parts)
            .with_remove_source()
            .into_value()
    }));

    registry.register(TransformEntry::new("Add", |v: &Value, params: &[Value]| {
        let base = v.as_i64().unwrap_or(0);
        let amount = params.first().and_then(Value::as_i64).unwrap_or(0);
        json!(base + amount)
    }));

    registry.register(TransformEntry::new("Uppercase", |v: &Value, _: &[Value]| {
        v.as_str()
            .map(|s| json!(s.to_uppercase()))
            .unwrap_or_else(|| v.clone())
    }));

    registry
}

#[test]
fn recorded_rename_and_transform_replay() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_rename(RenameEdit::new("firstName", "name"));
    recorder.record_transform(TransformEdit::new("name", "Uppercase"));

    let recipe = recorder.into_recipe();
    assert!(recipe.validate().is_empty());

    let out = apply_recipe(&json!({"firstName": "Ana"}), &recipe, &registry(), None);
    assert_eq!(out, json!({"name": "ANA"}));
}

#[test]
fn recorded_nested_inserts_replay_through_node_bindings() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_insert(InsertEdit::new("address", json!({})).with_node("node-address"));
    recorder.record_insert(
        InsertEdit::new("geo", json!({}))
            .with_parent_node("node-address")
            .with_node("node-geo"),
    );
    recorder.record_insert(InsertEdit::new("lat", json!(48.85)).with_parent_node("node-geo"));

    let recipe = recorder.into_recipe();
    assert!(recipe.validate().is_empty());

    let out = apply_recipe(&json!({}), &recipe, &registry(), None);
    assert_eq!(out, json!({"address": {"geo": {"lat": 48.85}}}));
}

#[test]
fn recorded_nested_insert_survives_parent_rename() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_insert(InsertEdit::new("address", json!({})).with_node("n1"));
    recorder.record_rename(RenameEdit::new("address", "location"));
    recorder.record_insert(InsertEdit::new("zip", json!("75001")).with_parent_node("n1"));

    let recipe = recorder.into_recipe();
    let out = apply_recipe(&json!({}), &recipe, &registry(), None);
    assert_eq!(out, json!({"location": {"zip": "75001"}}));
}

#[test]
fn recorded_split_replays_on_fresh_data() {
    // The user applied Split to "name"; the recorder captured the
    // synthesized inserts and the source delete.
    let mut recorder = DeltaRecorder::new(RootType::Object);
    let created = CreatedBy::new("Split").with_params(vec![json!(" ")]);
    recorder.record_insert(
        InsertEdit::new("name_0", json!("john"))
            .with_source_key("name")
            .with_created_by(created.clone()),
    );
    recorder.record_insert(
        InsertEdit::new("name_1", json!("doe"))
            .with_source_key("name")
            .with_created_by(created),
    );
    recorder.record_delete(DeleteEdit::new("name"));

    let recipe = recorder.into_recipe();
    assert!(recipe.validate().is_empty());

    // Replay against different data re-runs the split on the new value.
    let source = json!({"name": "ada lovelace"});
    let out = apply_recipe(&json!({"name": "ada lovelace"}), &recipe, &registry(), Some(&source));
    assert_eq!(out, json!({"name_0": "ada", "name_1": "lovelace"}));
}

#[test]
fn replaced_structural_transform_does_not_leak() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_insert(
        InsertEdit::new("name_0", json!("john"))
            .with_source_key("name")
            .with_created_by(CreatedBy::new("Split").with_params(vec![json!(" ")])),
    );
    recorder.record_insert(
        InsertEdit::new("name_1", json!("doe"))
            .with_source_key("name")
            .with_created_by(CreatedBy::new("Split").with_params(vec![json!(" ")])),
    );

    // The user switches to a comma split; the old expansion is stripped
    // before the new one is recorded.
    let removed = recorder.remove_structural_inserts("name", Some("Split"));
    assert_eq!(removed, 2);
    recorder.record_insert(
        InsertEdit::new("name_0", json!("john doe"))
            .with_source_key("name")
            .with_created_by(CreatedBy::new("Split").with_params(vec![json!(",")])),
    );

    let recipe = recorder.into_recipe();
    let out = apply_recipe(&json!({"name": "a,b"}), &recipe, &registry(), None);
    assert_eq!(out, json!({"name_0": "a", "name_1": "b"}));
}

#[test]
fn updated_params_take_effect_at_replay() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_transform(TransformEdit::new("age", "Add").with_params(vec![json!(1)]));
    recorder.record_update_params("age", 0, vec![json!(5)]).unwrap();

    let recipe = recorder.into_recipe();
    let out = apply_recipe(&json!({"age": 30}), &recipe, &registry(), None);
    assert_eq!(out, json!({"age": 35}));
}

#[test]
fn recorded_recipe_survives_export_import() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_insert(InsertEdit::new("address", json!({})).with_node("n1"));
    recorder.record_insert(InsertEdit::new("zip", json!("75001")).with_parent_node("n1"));
    recorder.record_transform(TransformEdit::new("zip", "Uppercase").with_parent_node("n1"));

    let recipe = recorder.into_recipe();
    let imported = import_recipe(&export_recipe(&recipe).unwrap()).unwrap();
    assert_eq!(imported, recipe);

    let out = apply_recipe(&json!({}), &imported, &registry(), None);
    assert_eq!(out, json!({"address": {"zip": "75001"}}));
}

#[test]
fn template_replay_of_recorded_recipe() {
    let mut recorder = DeltaRecorder::new(RootType::Object);
    recorder.record_transform(TransformEdit::new("age", "Add").with_params(vec![json!(1)]));

    let recipe = recorder.into_recipe();
    let out = apply_recipe(
        &json!([{"age": 30}, {"age": 40}]),
        &recipe,
        &registry(),
        None,
    );
    assert_eq!(out, json!([{"age": 31}, {"age": 41}]));
}
