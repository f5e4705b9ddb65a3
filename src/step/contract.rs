use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{process_all, LocalStep, OrderLocalStep};
use crate::order::{Order, OrderRule, TraversalComparator};
use crate::registry::{Context, Registry};
use crate::traversal::LocalTraversal;

pub const CONTRACT_ORDER_LOCAL: &str = "lcod://query/order_local@1";

pub fn register_order_local(registry: &Registry) {
    registry.register(CONTRACT_ORDER_LOCAL, order_local_contract);
}

/// Declarative form of an order rule, as found under `by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Order(Order),
    By(ByRule),
}

/// `{"by": <key>, "order": <order>}`; a misspelled field is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ByRule {
    pub by: KeySpec,
    #[serde(default)]
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySpec {
    Column(Column),
    Property { property: String },
    Traversal(LocalTraversal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Identity,
    Keys,
    Values,
}

impl KeySpec {
    fn into_traversal(self) -> LocalTraversal {
        match self {
            KeySpec::Column(Column::Identity) => LocalTraversal::identity(),
            KeySpec::Column(Column::Keys) => LocalTraversal::keys(),
            KeySpec::Column(Column::Values) => LocalTraversal::values(),
            KeySpec::Property { property } => LocalTraversal::property(&property),
            KeySpec::Traversal(traversal) => traversal,
        }
    }
}

impl From<RuleSpec> for OrderRule {
    fn from(spec: RuleSpec) -> Self {
        match spec {
            RuleSpec::Order(order) => OrderRule::Natural(order),
            RuleSpec::By(ByRule { by, order }) => {
                OrderRule::Traversal(TraversalComparator::with_delegate(by.into_traversal(), order))
            }
        }
    }
}

/// Accepts a single rule spec or an array of them.
pub fn parse_rules(value: &Value) -> Result<Vec<RuleSpec>> {
    let specs = match value {
        Value::Array(list) => list.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    };
    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| {
            serde_json::from_value::<RuleSpec>(spec.clone())
                .with_context(|| format!("invalid order rule at by[{index}]: {spec}"))
        })
        .collect()
}

pub fn build_step(specs: Vec<RuleSpec>) -> OrderLocalStep {
    let mut step = OrderLocalStep::new();
    for spec in specs {
        step.add_comparator(spec);
    }
    step
}

fn order_local_contract(ctx: &mut Context, input: Value, _meta: Option<Value>) -> Result<Value> {
    let mut input = match input {
        Value::Object(map) => map,
        other => return Err(anyhow!("order_local input must be an object, got {other}")),
    };
    let specs = match input.remove("by") {
        Some(by) => parse_rules(&by)?,
        None => Vec::new(),
    };
    let mut step = build_step(specs);

    if let Some(items) = input.remove("items") {
        let Value::Array(items) = items else {
            return Err(anyhow!("`items` must be an array"));
        };
        let results = process_all(ctx, &mut step, items)?;
        return Ok(json!({ "items": results }));
    }

    let item = input
        .remove("item")
        .ok_or_else(|| anyhow!("`item` or `items` is required"))?;
    let result = step.process(ctx, item)?;
    Ok(json!({ "item": result }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tokens_columns_and_properties() {
        let specs = parse_rules(&json!([
            "desc",
            { "by": "keys" },
            { "by": { "property": "age" }, "order": "shuffle" }
        ]))
        .unwrap();
        assert_eq!(specs[0], RuleSpec::Order(Order::Desc));
        assert_eq!(
            specs[1],
            RuleSpec::By(ByRule { by: KeySpec::Column(Column::Keys), order: Order::Asc })
        );
        assert!(matches!(
            &specs[2],
            RuleSpec::By(ByRule { by: KeySpec::Property { property }, order: Order::Shuffle })
                if property == "age"
        ));
    }

    #[test]
    fn single_spec_is_accepted() {
        let specs = parse_rules(&json!("incr")).unwrap();
        assert_eq!(specs, vec![RuleSpec::Order(Order::Asc)]);
    }

    #[test]
    fn misspelled_rule_field_is_rejected() {
        let err = parse_rules(&json!([{ "by": "keys", "ordr": "desc" }])).unwrap_err();
        assert!(err.to_string().contains("by[0]"));
    }

    #[test]
    fn unknown_spec_reports_position() {
        let err = parse_rules(&json!(["asc", "sideways"])).unwrap_err();
        assert!(err.to_string().contains("by[1]"));
    }
}
