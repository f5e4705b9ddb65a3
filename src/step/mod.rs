pub mod contract;
pub mod order_local;

use std::collections::BTreeSet;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::Context;
use crate::traversal::LocalTraversal;

pub use contract::{register_order_local, RuleSpec};
pub use order_local::{ItemShape, OrderLocalStep};

/// What a step needs the runtime to track for each item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Object,
    Bulk,
    Path,
    LabeledPath,
    SideEffects,
    Sack,
    SingleLoop,
    NestedLoop,
}

/// A one-in, one-out step that can own nested local traversals.
pub trait LocalStep: fmt::Display {
    fn process(&mut self, ctx: &mut Context, item: Value) -> Result<Value>;

    fn requirements(&self) -> BTreeSet<Requirement>;

    fn local_children(&self) -> Vec<&LocalTraversal>;

    fn add_local_child(&mut self, child: LocalTraversal);

    fn signature(&self) -> String;
}

/// Feeds `items` through `step` one at a time, in order. Stops before the next
/// item once the context is cancelled.
pub fn process_all<S>(
    ctx: &mut Context,
    step: &mut S,
    items: impl IntoIterator<Item = Value>,
) -> Result<Vec<Value>>
where
    S: LocalStep + ?Sized,
{
    let mut results = Vec::new();
    for item in items {
        ctx.ensure_not_cancelled()?;
        results.push(step.process(ctx, item)?);
    }
    Ok(results)
}
