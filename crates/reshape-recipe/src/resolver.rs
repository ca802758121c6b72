//! Parent-path resolution through operation-identifier chains.
//!
//! A delta may address its parent by a plain key (shallow, backward
//! compatible) or by the opId of the operation that created the parent.
//! The opId form survives renames: the resolver asks the live
//! `op_id_to_key` map for the *current* key of each ancestor, not the key
//! recorded at creation time, and walks the chain of `parent_op_id`
//! references until it reaches the document root.

use crate::DeltaOp;
use std::collections::HashMap;

/// Resolve the key path from the document root to an operation's parent.
///
/// - Neither reference given: empty path (the parent is the root).
/// - Only `parent_key`: `[parent_key]` (shallow case).
/// - `parent_op_id`: walk backwards through the deltas that minted each
///   ancestor opId, prepending the current key for each. A chain that
///   bottoms out on a delta with only a `parent_key` prepends that key
///   too, so the result is always rooted at the document root.
///
/// An opId with no matching delta terminates the walk; resolution
/// degrades rather than fails, matching the engine's skip-and-continue
/// error model.
pub fn resolve_parent_path(
    parent_op_id: Option<&str>,
    parent_key: Option<&str>,
    op_id_to_key: &HashMap<String, String>,
    deltas: &[DeltaOp],
) -> Vec<String> {
    let Some(start) = parent_op_id else {
        return parent_key.map(|k| vec![k.to_owned()]).unwrap_or_default();
    };

    let mut path: Vec<String> = Vec::new();
    let mut current = Some(start.to_owned());

    while let Some(op_id) = current.take() {
        let minting = deltas
            .iter()
            .find(|d| d.establishes_key() && d.op_id() == Some(op_id.as_str()));

        // Current key first; fall back to the key recorded at creation.
        let key = op_id_to_key
            .get(&op_id)
            .map(String::as_str)
            .or_else(|| minting.and_then(DeltaOp::key));

        let Some(key) = key else {
            tracing::warn!(op_id = %op_id, "unresolvable opId in parent chain");
            break;
        };
        path.insert(0, key.to_owned());

        match minting {
            Some(delta) => match delta.parent_op_id() {
                Some(next) => current = Some(next.to_owned()),
                None => {
                    if let Some(pk) = delta.parent_key() {
                        path.insert(0, pk.to_owned());
                    }
                }
            },
            None => break,
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert_with(key: &str, op_id: &str, parent_op_id: Option<&str>) -> DeltaOp {
        let mut op = DeltaOp::insert(key, json!({}));
        op.set_op_id(op_id);
        if let DeltaOp::Insert {
            parent_op_id: p, ..
        } = &mut op
        {
            *p = parent_op_id.map(str::to_owned);
        }
        op
    }

    #[test]
    fn test_no_parent_resolves_to_root() {
        let path = resolve_parent_path(None, None, &HashMap::new(), &[]);
        assert!(path.is_empty());
    }

    #[test]
    fn test_shallow_parent_key() {
        let path = resolve_parent_path(None, Some("address"), &HashMap::new(), &[]);
        assert_eq!(path, vec!["address"]);
    }

    #[test]
    fn test_single_op_chain() {
        let deltas = vec![insert_with("address", "op_1", None)];
        let map = HashMap::from([("op_1".to_owned(), "address".to_owned())]);

        let path = resolve_parent_path(Some("op_1"), None, &map, &deltas);
        assert_eq!(path, vec!["address"]);
    }

    #[test]
    fn test_chain_through_multiple_ancestors() {
        let deltas = vec![
            insert_with("address", "op_1", None),
            insert_with("geo", "op_2", Some("op_1")),
        ];
        let map = HashMap::from([
            ("op_1".to_owned(), "address".to_owned()),
            ("op_2".to_owned(), "geo".to_owned()),
        ]);

        let path = resolve_parent_path(Some("op_2"), None, &map, &deltas);
        assert_eq!(path, vec!["address", "geo"]);
    }

    #[test]
    fn test_resolver_uses_current_key_after_rename() {
        let deltas = vec![insert_with("address", "op_1", None)];
        // The property was renamed since op_1 was recorded.
        let map = HashMap::from([("op_1".to_owned(), "location".to_owned())]);

        let path = resolve_parent_path(Some("op_1"), None, &map, &deltas);
        assert_eq!(path, vec!["location"]);
    }

    #[test]
    fn test_chain_bottoming_out_on_parent_key() {
        let mut root = insert_with("geo", "op_1", None);
        if let DeltaOp::Insert { parent_key, .. } = &mut root {
            *parent_key = Some("address".to_owned());
        }
        let deltas = vec![root];
        let map = HashMap::from([("op_1".to_owned(), "geo".to_owned())]);

        let path = resolve_parent_path(Some("op_1"), None, &map, &deltas);
        assert_eq!(path, vec!["address", "geo"]);
    }

    #[test]
    fn test_unknown_op_id_degrades() {
        let path = resolve_parent_path(Some("op_9"), None, &HashMap::new(), &[]);
        assert!(path.is_empty());
    }

    #[test]
    fn test_rename_establishes_key_for_chain() {
        let mut ren = DeltaOp::rename("addr", "address");
        ren.set_op_id("op_1");
        let deltas = vec![ren];
        // No live mapping yet; falls back to the recorded target key.
        let path = resolve_parent_path(Some("op_1"), None, &HashMap::new(), &deltas);
        assert_eq!(path, vec!["address"]);
    }
}
