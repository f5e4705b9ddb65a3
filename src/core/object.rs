use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::registry::{Context, Registry};

pub const CONTRACT_GET: &str = "lcod://contract/core/object/get@1";

pub fn register_object(registry: &Registry) {
    registry.register(CONTRACT_GET, object_get_contract);
}

#[derive(Clone, Debug)]
enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(path_value: &Value) -> Result<Vec<PathSegment>> {
    let segments = match path_value {
        Value::String(dotted) => dotted
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Array(array) => array.clone(),
        _ => return Err(anyhow!("`path` must be an array or a dotted string")),
    };
    segments
        .iter()
        .map(|segment| match segment {
            Value::String(s) => Ok(s
                .parse::<usize>()
                .map(PathSegment::Index)
                .unwrap_or_else(|_| PathSegment::Key(s.clone()))),
            Value::Number(num) => num
                .as_u64()
                .map(|index| PathSegment::Index(index as usize))
                .ok_or_else(|| anyhow!("numeric path segment must be an unsigned integer")),
            _ => Err(anyhow!("path segments must be strings or integers")),
        })
        .collect()
}

fn resolve_path<'a>(mut current: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(index), Value::Array(vec)) => vec.get(*index)?,
            // numeric-looking keys on objects
            (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

fn object_get_contract(_ctx: &mut Context, input: Value, _meta: Option<Value>) -> Result<Value> {
    let object = input
        .get("object")
        .ok_or_else(|| anyhow!("`object` is required"))?;
    let segments = parse_path(
        input
            .get("path")
            .ok_or_else(|| anyhow!("`path` is required"))?,
    )?;
    let (value, found) = match resolve_path(object, &segments) {
        Some(value) => (value.clone(), true),
        None => (input.get("default").cloned().unwrap_or(Value::Null), false),
    };
    Ok(json!({ "value": value, "found": found }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_value_and_flag() {
        let registry = Registry::new();
        register_object(&registry);
        let mut ctx = registry.context();
        let res = object_get_contract(
            &mut ctx,
            json!({ "object": { "foo": { "bar": [10, 20] } }, "path": "foo.bar.1" }),
            None,
        )
        .unwrap();
        assert_eq!(res["value"], json!(20));
        assert!(res["found"].as_bool().unwrap());
    }

    #[test]
    fn get_falls_back_to_default() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let res = object_get_contract(
            &mut ctx,
            json!({ "object": { "foo": 1 }, "path": ["bar"], "default": 0 }),
            None,
        )
        .unwrap();
        assert_eq!(res["value"], json!(0));
        assert!(!res["found"].as_bool().unwrap());
    }
}
