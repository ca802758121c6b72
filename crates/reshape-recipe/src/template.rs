//! Template mode: structural normalization of array elements.
//!
//! A recipe recorded against one representative element of an array can be
//! replayed against every element. Elements are first normalized against
//! the template shape so deltas referencing properties absent on a given
//! element degrade gracefully (conditions and parent resolution fail to
//! match instead of throwing).

use serde_json::{Map, Value};

/// Fill an element with placeholders for every template property it lacks.
///
/// Placeholders are type-appropriate: an empty array for array-valued
/// template properties, a recursively normalized empty object for
/// object-valued ones, and `null` otherwise. Properties present on the
/// element keep their values; object-valued ones are normalized
/// recursively. Non-object elements pass through untouched.
pub fn normalize_against(element: &Value, template: &Value) -> Value {
    let (Some(elem_obj), Some(tmpl_obj)) = (element.as_object(), template.as_object()) else {
        return element.clone();
    };

    let mut result: Map<String, Value> = elem_obj.clone();
    for (key, tmpl_value) in tmpl_obj {
        match result.get(key) {
            Some(existing) => {
                if existing.is_object() && tmpl_value.is_object() {
                    let normalized = normalize_against(existing, tmpl_value);
                    result.insert(key.clone(), normalized);
                }
            }
            None => {
                result.insert(key.clone(), placeholder_for(tmpl_value));
            }
        }
    }

    Value::Object(result)
}

fn placeholder_for(template_value: &Value) -> Value {
    match template_value {
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Object(_) => normalize_against(&Value::Object(Map::new()), template_value),
        _ => Value::Null,
    }
}
