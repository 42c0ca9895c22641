//! Layered merge of the global and project documents.
//!
//! Project values win. Objects merge recursively; everything else, arrays
//! included, replaces the global value wholesale.

use serde_json::{Map, Value};

/// Keys every merged view must carry as objects.
const REQUIRED_OBJECT_KEYS: [&str; 2] = ["env", "mcpServers"];

/// Deep-merge `project` over `global`. Pure; neither input is modified.
pub fn deep_merge(global: &Map<String, Value>, project: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = global.clone();
    for (key, value) in project {
        let next = match value {
            Value::Object(overlay) => {
                let merged_child = match merged.get(key) {
                    Some(Value::Object(base)) => deep_merge(base, overlay),
                    _ => deep_merge(&Map::new(), overlay),
                };
                Value::Object(merged_child)
            }
            other => other.clone(),
        };
        // Existing keys keep their position in the ordered map.
        merged.insert(key.clone(), next);
    }
    merged
}

/// The caller-facing merged configuration: [`deep_merge`] plus guaranteed
/// `env` and `mcpServers` objects.
pub fn merged_view(global: &Map<String, Value>, project: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = deep_merge(global, project);
    for key in REQUIRED_OBJECT_KEYS {
        if !merged.get(key).is_some_and(Value::is_object) {
            merged.insert(key.to_string(), Value::Object(Map::new()));
        }
    }
    merged
}
