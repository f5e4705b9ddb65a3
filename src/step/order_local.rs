//! Local ordering: reorders the inside of each item, never the item stream.
//!
//! Arrays are sorted in place. Objects are rebuilt as a fresh map whose
//! insertion order is the sorted entry order; rules see each entry as
//! `{"key": <key>, "value": <value>}`. Every other value passes through.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use rand::seq::SliceRandom;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{LocalStep, Requirement};
use crate::config::LogLevel;
use crate::order::{ChainedComparator, Order, OrderRule, TraversalComparator};
use crate::registry::Context;
use crate::tooling::logging::kernel_log;
use crate::traversal::LocalTraversal;

pub const STEP_NAME: &str = "OrderLocalStep";

/// Runtime shape of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShape {
    Sequence(Vec<Value>),
    Mapping(Map<String, Value>),
    Other(Value),
}

impl From<Value> for ItemShape {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(values) => ItemShape::Sequence(values),
            Value::Object(map) => ItemShape::Mapping(map),
            other => ItemShape::Other(other),
        }
    }
}

impl ItemShape {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemShape::Sequence(_) => "sequence",
            ItemShape::Mapping(_) => "mapping",
            ItemShape::Other(_) => "other",
        }
    }
}

#[derive(Debug, Default)]
pub struct OrderLocalStep {
    rules: Vec<OrderRule>,
    chain: Option<ChainedComparator>,
}

impl OrderLocalStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_comparator(&mut self, rule: impl Into<OrderRule>) {
        self.rules.push(rule.into());
        self.chain = None;
    }

    /// Orders by the keys `traversal` derives, ascending.
    pub fn modulate_by(&mut self, traversal: LocalTraversal) {
        self.add_comparator(TraversalComparator::new(traversal));
    }

    pub fn modulate_by_with(&mut self, traversal: LocalTraversal, delegate: impl Into<OrderRule>) {
        self.add_comparator(TraversalComparator::with_delegate(traversal, delegate));
    }

    /// Registered rules, in registration order.
    pub fn comparators(&self) -> &[OrderRule] {
        &self.rules
    }

    /// Rules the chain is built from: the registered ones, or ascending
    /// natural order when none are registered.
    pub fn effective_comparators(&self) -> Vec<OrderRule> {
        if self.rules.is_empty() {
            vec![OrderRule::Natural(Order::Asc)]
        } else {
            self.rules.clone()
        }
    }

    pub fn is_comparator_built(&self) -> bool {
        self.chain.is_some()
    }

    fn build_chain(&self, ctx: &mut Context) -> ChainedComparator {
        let chain = ChainedComparator::new(&self.rules);
        let _ = kernel_log(
            ctx,
            LogLevel::Debug,
            "order local comparator built",
            json!({
                "step": self.to_string(),
                "rules": chain.rules().len(),
                "shuffle": chain.is_shuffle()
            }),
        );
        chain
    }
}

impl Clone for OrderLocalStep {
    /// Re-registers every rule on a fresh step. Traversal rules are deep
    /// copied, custom comparators are shared, the chain is rebuilt lazily.
    fn clone(&self) -> Self {
        let mut clone = OrderLocalStep::new();
        for rule in &self.rules {
            clone.add_comparator(rule.clone());
        }
        clone
    }
}

impl LocalStep for OrderLocalStep {
    fn process(&mut self, ctx: &mut Context, item: Value) -> Result<Value> {
        let chain = match self.chain.take() {
            Some(chain) => chain,
            None => self.build_chain(ctx),
        };
        let result = reorder(ctx, &chain, item);
        self.chain = Some(chain);
        result
    }

    fn requirements(&self) -> BTreeSet<Requirement> {
        let mut requirements = BTreeSet::from([Requirement::Object]);
        for child in self.local_children() {
            requirements.extend(child.requirements());
        }
        requirements
    }

    fn local_children(&self) -> Vec<&LocalTraversal> {
        self.rules.iter().filter_map(OrderRule::local_child).collect()
    }

    fn add_local_child(&mut self, child: LocalTraversal) {
        self.modulate_by(child);
    }

    /// SHA-256 over the step name and each rule signature in registration
    /// order; the same rules registered in another order hash differently.
    fn signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(STEP_NAME.as_bytes());
        for rule in &self.rules {
            hasher.update([0x1f_u8]);
            hasher.update(rule.signature().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for OrderLocalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(ToString::to_string).collect();
        write!(f, "{STEP_NAME}([{}])", rules.join(", "))
    }
}

fn reorder(ctx: &mut Context, chain: &ChainedComparator, item: Value) -> Result<Value> {
    match ItemShape::from(item) {
        ItemShape::Sequence(mut values) => {
            sort_values(ctx, chain, &mut values)?;
            Ok(Value::Array(values))
        }
        ItemShape::Mapping(map) => sort_map(ctx, chain, map).map(Value::Object),
        ItemShape::Other(value) => Ok(value),
    }
}

/// Stable sort by the chain, or a uniform shuffle for shuffle chains.
///
/// Rules may be inconsistent (a derived key can change between calls), so the
/// chain only ever drives a merge sort: any answer yields a permutation and
/// the first comparison error stops the sort.
fn sort_values(ctx: &mut Context, chain: &ChainedComparator, values: &mut Vec<Value>) -> Result<()> {
    if chain.is_shuffle() {
        values.shuffle(ctx.rng_mut());
        return Ok(());
    }
    let unsorted = std::mem::take(values);
    *values = merge_sort(unsorted, &mut |a: &Value, b: &Value| chain.compare(ctx, a, b))?;
    Ok(())
}

fn merge_sort<F>(mut values: Vec<Value>, compare: &mut F) -> Result<Vec<Value>>
where
    F: FnMut(&Value, &Value) -> Result<Ordering>,
{
    if values.len() < 2 {
        return Ok(values);
    }
    let right = values.split_off(values.len() / 2);
    let left = merge_sort(values, compare)?;
    let right = merge_sort(right, compare)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        // ties keep the left run first
        if compare(l, r)? == Ordering::Greater {
            out.extend(right.next());
        } else {
            out.extend(left.next());
        }
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

fn sort_map(
    ctx: &mut Context,
    chain: &ChainedComparator,
    map: Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut entries: Vec<Value> = map
        .into_iter()
        .map(|(key, value)| {
            let mut entry = Map::new();
            entry.insert("key".to_string(), Value::String(key));
            entry.insert("value".to_string(), value);
            Value::Object(entry)
        })
        .collect();
    sort_values(ctx, chain, &mut entries)?;

    let mut sorted = Map::with_capacity(entries.len());
    for entry in entries {
        if let Value::Object(mut pair) = entry {
            if let Some(Value::String(key)) = pair.remove("key") {
                let value = pair.remove("value").unwrap_or(Value::Null);
                sorted.insert(key, value);
            }
        }
    }
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn item_shape_dispatch() {
        assert_eq!(ItemShape::from(json!([1])).kind(), "sequence");
        assert_eq!(ItemShape::from(json!({ "a": 1 })).kind(), "mapping");
        assert_eq!(ItemShape::from(json!("x")).kind(), "other");
    }

    #[test]
    fn adding_a_rule_invalidates_the_chain() {
        let registry = Registry::new();
        let mut ctx = registry.context();
        let mut step = OrderLocalStep::new();
        assert!(!step.is_comparator_built());
        step.process(&mut ctx, json!([2, 1])).unwrap();
        assert!(step.is_comparator_built());
        step.add_comparator(Order::Desc);
        assert!(!step.is_comparator_built());
        assert_eq!(step.process(&mut ctx, json!([1, 2])).unwrap(), json!([2, 1]));
    }

    #[test]
    fn merge_sort_is_stable_and_stops_on_error() {
        let input = vec![json!([1, "a"]), json!([0, "b"]), json!([1, "c"]), json!([0, "d"])];
        let sorted = merge_sort(input.clone(), &mut |a: &Value, b: &Value| {
            Ok(a[0].as_i64().cmp(&b[0].as_i64()))
        })
            .unwrap();
        assert_eq!(
            sorted,
            vec![json!([0, "b"]), json!([0, "d"]), json!([1, "a"]), json!([1, "c"])]
        );

        let mut calls = 0;
        let err = merge_sort(input, &mut |_: &Value, _: &Value| {
            calls += 1;
            Err(anyhow::anyhow!("no key"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "no key");
        assert_eq!(calls, 1);
    }

    #[test]
    fn descriptor_lists_registered_rules() {
        let mut step = OrderLocalStep::new();
        assert_eq!(step.to_string(), "OrderLocalStep([])");
        step.modulate_by_with(LocalTraversal::keys(), Order::Desc);
        step.add_comparator(Order::Asc);
        assert_eq!(step.to_string(), "OrderLocalStep([[keys, desc], asc])");
    }
}
