//! Step lists and the runner that evaluates them.
//!
//! A running list sees two roots: `$` is the state the previous steps built,
//! `$slot` holds the variables of the caller (for local traversals, the
//! candidate under `$slot.item`). String inputs of the form `$...` are
//! looked up there; anything that does not resolve is passed literally.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::registry::Context;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Step {
    pub call: String,
    #[serde(default, rename = "in", skip_serializing_if = "Map::is_empty")]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub out: Map<String, Value>,
    /// Nested block handed to the called contract through `meta`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Step>,
}

impl Step {
    pub fn call(name: impl Into<String>) -> Self {
        Self {
            call: name.into(),
            inputs: Map::new(),
            out: Map::new(),
            children: Vec::new(),
        }
    }

    /// Adds an input binding. Strings starting with `$.` or `$slot.` are
    /// resolved against the running state or the slot variables.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Copies `key` of the step output into the state as `alias` (`"$"` copies
    /// the whole output).
    pub fn with_output(mut self, alias: impl Into<String>, key: impl Into<String>) -> Self {
        self.out.insert(alias.into(), Value::String(key.into()));
        self
    }

    fn output_value(output: &Value, key: &Value) -> Value {
        match key.as_str() {
            Some("$") => output.clone(),
            Some(field) => output.get(field).cloned().unwrap_or(Value::Null),
            None => key.clone(),
        }
    }
}

/// The two variable roots visible while a step list runs.
struct Scope<'a> {
    state: &'a Map<String, Value>,
    slot: &'a Map<String, Value>,
}

impl Scope<'_> {
    fn lookup(&self, path: &str) -> Option<Value> {
        let (root, rest) = match path.split_once('.') {
            Some((root, rest)) => (root, Some(rest)),
            None => (path, None),
        };
        let vars = match root {
            "$" => self.state,
            "$slot" => self.slot,
            _ => return None,
        };
        let Some(rest) = rest else {
            return Some(Value::Object(vars.clone()));
        };
        let mut parts = rest.split('.');
        let mut current = vars.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(list) => list.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    fn resolve(&self, value: &Value) -> Value {
        match value.as_str() {
            Some(path) if path.starts_with('$') => {
                self.lookup(path).unwrap_or_else(|| value.clone())
            }
            _ => value.clone(),
        }
    }
}

/// `meta` of a step with children: the block plus the variables it runs with.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NestedBlock {
    children: Vec<Step>,
    state: Map<String, Value>,
    slot: Map<String, Value>,
}

fn run_steps(
    ctx: &mut Context,
    steps: &[Step],
    mut state: Map<String, Value>,
    slot: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    for step in steps {
        let scope = Scope { state: &state, slot };
        let input: Map<String, Value> = step
            .inputs
            .iter()
            .map(|(key, value)| (key.clone(), scope.resolve(value)))
            .collect();
        let meta = (!step.children.is_empty()).then(|| {
            json!({ "children": step.children, "state": state, "slot": slot })
        });

        let output = ctx.call(&step.call, Value::Object(input), meta)?;
        for (alias, key) in &step.out {
            state.insert(alias.clone(), Step::output_value(&output, key));
        }
    }
    Ok(state)
}

pub fn run_compose(ctx: &mut Context, steps: &[Step], initial_state: Value) -> Result<Value> {
    let state = initial_state.as_object().cloned().unwrap_or_default();
    run_steps(ctx, steps, state, &Map::new()).map(Value::Object)
}

/// Runs `steps` from an empty state with the given slot variables and returns
/// the final state. Used to evaluate nested sub-computations per element.
pub fn run_local(
    ctx: &mut Context,
    steps: &[Step],
    slot: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    run_steps(ctx, steps, Map::new(), slot)
}

/// Runs the children a contract received through `meta`, continuing from the
/// caller's state. Returns that state untouched when there are no children.
pub fn run_children(ctx: &mut Context, meta: Option<Value>) -> Result<Value> {
    let block: NestedBlock = match meta {
        Some(meta) => serde_json::from_value(meta).context("invalid nested step block")?,
        None => NestedBlock::default(),
    };
    run_steps(ctx, &block.children, block.state, &block.slot).map(Value::Object)
}

/// Resolves a `$`/`$slot` path against a final state and its slot variables.
pub fn collect_value(
    path: &str,
    state: &Map<String, Value>,
    slot: &Map<String, Value>,
) -> Option<Value> {
    Scope { state, slot }.lookup(path)
}

pub fn parse_compose(value: &Value) -> Result<Vec<Step>> {
    let steps: Vec<Step> = serde_json::from_value(value.clone())?;
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn echo_registry() -> Registry {
        let registry = Registry::new();
        registry.register(
            "lcod://impl/echo@1",
            |_ctx: &mut Context, input: Value, _meta: Option<Value>| {
                Ok(json!({ "val": input.get("value").cloned().unwrap_or(Value::Null) }))
            },
        );
        registry.register(
            "lcod://impl/block@1",
            |ctx: &mut Context, _input: Value, meta: Option<Value>| run_children(ctx, meta),
        );
        registry
    }

    #[test]
    fn slot_variables_feed_step_inputs() {
        let registry = echo_registry();
        let mut ctx = registry.context();
        let steps = vec![Step::call("lcod://impl/echo@1")
            .with_input("value", "$slot.item.name")
            .with_output("key", "val")];
        let slot = Map::from_iter([("item".to_string(), json!({ "name": "marko" }))]);
        let state = run_local(&mut ctx, &steps, &slot).unwrap();
        assert_eq!(state.get("key"), Some(&json!("marko")));
    }

    #[test]
    fn unresolved_inputs_pass_literally() {
        let registry = echo_registry();
        let mut ctx = registry.context();
        let steps = vec![Step::call("lcod://impl/echo@1")
            .with_input("value", "$.missing")
            .with_output("key", "val")];
        let state = run_local(&mut ctx, &steps, &Map::new()).unwrap();
        assert_eq!(state.get("key"), Some(&json!("$.missing")));
    }

    #[test]
    fn collect_reads_state_and_slot_roots() {
        let state = Map::from_iter([("key".to_string(), json!(3))]);
        let slot = Map::from_iter([("item".to_string(), json!({ "key": "a", "list": [4, 5] }))]);
        assert_eq!(collect_value("$.key", &state, &slot), Some(json!(3)));
        assert_eq!(collect_value("$slot.item.key", &state, &slot), Some(json!("a")));
        assert_eq!(collect_value("$slot.item.list.1", &state, &slot), Some(json!(5)));
        assert_eq!(collect_value("$", &state, &slot), Some(json!({ "key": 3 })));
        assert_eq!(collect_value("$.missing", &state, &slot), None);
    }

    #[test]
    fn children_continue_from_the_caller_state() -> Result<()> {
        let registry = echo_registry();
        let mut ctx = registry.context();
        let steps = parse_compose(&json!([
            {
                "call": "lcod://impl/block@1",
                "children": [
                    { "call": "lcod://impl/echo@1", "in": { "value": "$.seed" }, "out": { "echoed": "val" } }
                ],
                "out": { "inner": "echoed" }
            }
        ]))?;
        let state = run_compose(&mut ctx, &steps, json!({ "seed": "s" }))?;
        assert_eq!(state["inner"], json!("s"));
        Ok(())
    }
}
