use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::registry::{Context, Registry};

pub const CONTRACT_KIND: &str = "lcod://contract/core/value/kind@1";
pub const CONTRACT_LENGTH: &str = "lcod://contract/core/value/length@1";

pub fn register_value(registry: &Registry) {
    registry.register(CONTRACT_KIND, kind_contract);
    registry.register(CONTRACT_LENGTH, length_contract);
}

fn kind_contract(_ctx: &mut Context, input: Value, _meta: Option<Value>) -> Result<Value> {
    let kind = match input.get("value").unwrap_or(&Value::Null) {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    Ok(json!({ "kind": kind }))
}

/// Element count of arrays and objects, character count of strings.
fn length_contract(_ctx: &mut Context, input: Value, _meta: Option<Value>) -> Result<Value> {
    let length = match input.get("value") {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        Some(Value::String(text)) => text.chars().count(),
        Some(other) => return Err(anyhow!("`value` has no length: {other}")),
        None => return Err(anyhow!("`value` is required")),
    };
    Ok(json!({ "length": length }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_counts_containers_and_strings() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let res = length_contract(&mut ctx, json!({ "value": [1, 2, 3] }), None).unwrap();
        assert_eq!(res["length"], json!(3));
        let res = length_contract(&mut ctx, json!({ "value": "héllo" }), None).unwrap();
        assert_eq!(res["length"], json!(5));
        assert!(length_contract(&mut ctx, json!({ "value": 4 }), None).is_err());
    }

    #[test]
    fn kind_names_json_types() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let res = kind_contract(&mut ctx, json!({ "value": { "a": 1 } }), None).unwrap();
        assert_eq!(res["kind"], json!("object"));
    }
}
