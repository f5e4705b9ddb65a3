//! Comparator rules for local ordering.
//!
//! A rule is either a natural [`Order`] token, a key-extracting
//! [`TraversalComparator`], or a caller supplied [`Comparator`]. The shuffle
//! token is a marker: it is recognized structurally by [`OrderRule::is_shuffle`]
//! and never used to compare two values.

mod chained;
mod natural;
mod traversal;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::Context;
use crate::traversal::LocalTraversal;

pub use chained::{ChainedComparator, ShuffleCompareError};
pub use natural::compare_values;
pub use traversal::TraversalComparator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    #[serde(alias = "incr")]
    Asc,
    #[serde(alias = "decr")]
    Desc,
    Shuffle,
}

impl Order {
    pub fn is_shuffle(self) -> bool {
        matches!(self, Order::Shuffle)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
            Order::Shuffle => "shuffle",
        }
    }

    /// Natural comparison in this direction.
    pub fn compare(self, a: &Value, b: &Value) -> Result<Ordering> {
        match self {
            Order::Asc => Ok(compare_values(a, b)),
            Order::Desc => Ok(compare_values(b, a)),
            Order::Shuffle => Err(ShuffleCompareError.into()),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller supplied ordering between two candidates.
pub trait Comparator: fmt::Debug + Send + Sync {
    fn compare(&self, ctx: &mut Context, a: &Value, b: &Value) -> Result<Ordering>;

    /// Stable identity used when hashing the owning step.
    fn signature(&self) -> String;
}

#[derive(Debug, Clone)]
pub enum OrderRule {
    Natural(Order),
    Traversal(TraversalComparator),
    Custom(Arc<dyn Comparator>),
}

impl OrderRule {
    pub fn custom(comparator: impl Comparator + 'static) -> Self {
        OrderRule::Custom(Arc::new(comparator))
    }

    /// True for the shuffle marker, including a traversal rule whose
    /// delegate is the marker (the derived key plays no role then).
    pub fn is_shuffle(&self) -> bool {
        match self {
            OrderRule::Natural(order) => order.is_shuffle(),
            OrderRule::Traversal(rule) => rule.delegate().is_shuffle(),
            OrderRule::Custom(_) => false,
        }
    }

    pub fn compare(&self, ctx: &mut Context, a: &Value, b: &Value) -> Result<Ordering> {
        match self {
            OrderRule::Natural(order) => order.compare(a, b),
            OrderRule::Traversal(rule) => rule.compare(ctx, a, b),
            OrderRule::Custom(comparator) => comparator.compare(ctx, a, b),
        }
    }

    pub fn signature(&self) -> String {
        match self {
            OrderRule::Natural(order) => order.as_str().to_string(),
            OrderRule::Traversal(rule) => rule.signature(),
            OrderRule::Custom(comparator) => format!("custom:{}", comparator.signature()),
        }
    }

    /// The nested sub-computation owned by this rule, if any.
    pub fn local_child(&self) -> Option<&LocalTraversal> {
        match self {
            OrderRule::Traversal(rule) => Some(rule.traversal()),
            _ => None,
        }
    }
}

impl From<Order> for OrderRule {
    fn from(order: Order) -> Self {
        OrderRule::Natural(order)
    }
}

impl From<TraversalComparator> for OrderRule {
    fn from(rule: TraversalComparator) -> Self {
        OrderRule::Traversal(rule)
    }
}

impl fmt::Display for OrderRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderRule::Natural(order) => write!(f, "{order}"),
            OrderRule::Traversal(rule) => write!(f, "{rule}"),
            OrderRule::Custom(comparator) => f.write_str(&comparator.signature()),
        }
    }
}
