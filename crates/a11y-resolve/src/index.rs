//! Snapshot tree walking and synthetic id assignment.

use serde_json::Value;

use crate::types::{AxNodeInfo, NodeIndex};

/// Read a node field that engines report either as a plain scalar or as a
/// `{value: ...}` wrapper object.
fn field_str(node: &Value, key: &str) -> String {
    match node.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => match obj.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => String::new(),
        },
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Index a raw accessibility tree, assigning dotted depth-first ids:
/// root `n0`, its children `n0.0`, `n0.1`, and so on.
pub fn index_tree(raw: &Value) -> NodeIndex {
    let mut index = NodeIndex::default();
    walk(raw, "n0".to_string(), &mut index);
    index
}

fn walk(node: &Value, id: String, index: &mut NodeIndex) {
    if !node.is_object() {
        return;
    }
    index.insert(AxNodeInfo {
        id: id.clone(),
        role: field_str(node, "role"),
        name: field_str(node, "name"),
        description: field_str(node, "description"),
        value: field_str(node, "value"),
    });
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for (i, child) in children.iter().enumerate() {
            walk(child, format!("{id}.{i}"), index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assigns_dotted_depth_first_ids() {
        let tree = json!({
            "role": "WebArea",
            "name": "Doc",
            "children": [
                {"role": "button", "name": "Save"},
                {"role": "navigation", "name": "Main", "children": [
                    {"role": "link", "name": "Home"}
                ]}
            ]
        });
        let index = index_tree(&tree);
        assert_eq!(index.len(), 4);
        assert_eq!(index.get("n0").unwrap().role, "WebArea");
        assert_eq!(index.get("n0.0").unwrap().name, "Save");
        assert_eq!(index.get("n0.1.0").unwrap().name, "Home");
    }

    #[test]
    fn same_tree_indexes_identically() {
        let tree = json!({
            "role": "WebArea",
            "children": [{"role": "button", "name": "A"}, {"role": "button", "name": "B"}]
        });
        let first: Vec<String> = index_tree(&tree).iter().map(|n| n.id.clone()).collect();
        let second: Vec<String> = index_tree(&tree).iter().map(|n| n.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unwraps_value_objects() {
        let tree = json!({
            "role": {"type": "role", "value": "checkbox"},
            "name": {"type": "computedString", "value": "Accept"},
        });
        let index = index_tree(&tree);
        let node = index.get("n0").unwrap();
        assert_eq!(node.role, "checkbox");
        assert_eq!(node.name, "Accept");
    }
}
