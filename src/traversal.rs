//! Nested sub-computations evaluated against a single candidate element.
//!
//! A [`LocalTraversal`] is a small compose: its steps run from an empty state
//! with the candidate bound to `$slot.item`, and the `collect` path picks the
//! derived value out of `{"$": state, "$slot": slots}`. With no steps the
//! collect path reads the candidate directly, which is how the column
//! projections (`keys`, `values`) are expressed.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compose::{collect_value, run_local, Step};
use crate::registry::Context;
use crate::step::Requirement;

const ITEM_PATH: &str = "$slot.item";

fn default_collect() -> String {
    ITEM_PATH.to_string()
}

fn is_default_collect(path: &String) -> bool {
    path == ITEM_PATH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalTraversal {
    #[serde(default, rename = "compose", skip_serializing_if = "Vec::is_empty")]
    steps: Vec<Step>,
    #[serde(default = "default_collect", skip_serializing_if = "is_default_collect")]
    collect: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    requirements: BTreeSet<Requirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<LocalTraversal>,
}

impl Default for LocalTraversal {
    fn default() -> Self {
        Self::identity()
    }
}

impl LocalTraversal {
    /// The candidate itself.
    pub fn identity() -> Self {
        Self::collecting(ITEM_PATH)
    }

    /// Key side of a mapping entry.
    pub fn keys() -> Self {
        Self::collecting("$slot.item.key")
    }

    /// Value side of a mapping entry.
    pub fn values() -> Self {
        Self::collecting("$slot.item.value")
    }

    /// A named property of an object candidate; missing properties yield `null`.
    pub fn property(name: &str) -> Self {
        Self::collecting(format!("{ITEM_PATH}.{name}"))
    }

    pub fn compose(steps: Vec<Step>, collect: impl Into<String>) -> Self {
        Self {
            steps,
            collect: collect.into(),
            requirements: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    fn collecting(path: impl Into<String>) -> Self {
        Self::compose(Vec::new(), path)
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.insert(requirement);
        self
    }

    pub fn with_child(mut self, child: LocalTraversal) -> Self {
        self.children.push(child);
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn collect_path(&self) -> &str {
        &self.collect
    }

    pub fn children(&self) -> &[LocalTraversal] {
        &self.children
    }

    /// Declared requirements of this traversal and, recursively, of its children.
    pub fn requirements(&self) -> BTreeSet<Requirement> {
        let mut all = self.requirements.clone();
        for child in &self.children {
            all.extend(child.requirements());
        }
        all
    }

    /// Derives the value for `candidate`. Runs on every call; nothing is cached.
    pub fn evaluate(&self, ctx: &mut Context, candidate: &Value) -> Result<Value> {
        let mut slot = Map::new();
        slot.insert("item".to_string(), candidate.clone());
        let state = if self.steps.is_empty() {
            Map::new()
        } else {
            run_local(ctx, &self.steps, &slot)
                .with_context(|| format!("local traversal {self} failed"))?
        };
        Ok(collect_value(&self.collect, &state, &slot).unwrap_or(Value::Null))
    }

    /// Canonical JSON form, stable across runs.
    pub fn signature(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for LocalTraversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.collect.as_str() {
            "$slot.item" if self.steps.is_empty() => return f.write_str("identity"),
            "$slot.item.key" if self.steps.is_empty() => return f.write_str("keys"),
            "$slot.item.value" if self.steps.is_empty() => return f.write_str("values"),
            _ => {}
        }
        if self.steps.is_empty() {
            return f.write_str(&self.collect);
        }
        let calls: Vec<&str> = self.steps.iter().map(|step| step.call.as_str()).collect();
        write!(f, "compose({})->{}", calls.join(","), self.collect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    #[test]
    fn column_projections_read_entry_sides() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let entry = json!({ "key": "b", "value": 2 });
        assert_eq!(LocalTraversal::keys().evaluate(&mut ctx, &entry).unwrap(), json!("b"));
        assert_eq!(LocalTraversal::values().evaluate(&mut ctx, &entry).unwrap(), json!(2));
        assert_eq!(LocalTraversal::identity().evaluate(&mut ctx, &entry).unwrap(), entry);
    }

    #[test]
    fn missing_property_yields_null() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let key = LocalTraversal::property("age")
            .evaluate(&mut ctx, &json!({ "name": "vadas" }))
            .unwrap();
        assert_eq!(key, Value::Null);
    }

    #[test]
    fn requirements_include_nested_children() {
        let traversal = LocalTraversal::identity()
            .with_requirement(Requirement::Path)
            .with_child(LocalTraversal::keys().with_requirement(Requirement::SideEffects));
        let requirements = traversal.requirements();
        assert!(requirements.contains(&Requirement::Path));
        assert!(requirements.contains(&Requirement::SideEffects));
    }

    #[test]
    fn deserializes_compose_form_and_rejects_unknown_fields() {
        let traversal: LocalTraversal = serde_json::from_value(json!({
            "compose": [ { "call": "lcod://contract/core/value/length@1", "in": { "value": "$slot.item" }, "out": { "key": "length" } } ],
            "collect": "$.key"
        }))
        .unwrap();
        assert_eq!(traversal.steps().len(), 1);
        assert_eq!(traversal.collect_path(), "$.key");
        assert!(serde_json::from_value::<LocalTraversal>(json!({ "column": "keys" })).is_err());
    }
}
