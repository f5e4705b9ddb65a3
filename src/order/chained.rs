use std::cmp::Ordering;
use std::fmt;

use anyhow::Result;
use serde_json::Value;

use super::{Order, OrderRule};
use crate::registry::Context;

/// Raised when a shuffle chain is asked to compare two values.
#[derive(Debug)]
pub struct ShuffleCompareError;

impl fmt::Display for ShuffleCompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shuffle ordering cannot compare values")
    }
}

impl std::error::Error for ShuffleCompareError {}

/// Lexicographic composition of order rules.
///
/// Shuffle markers mixed with other rules are skipped, so ordinary rules win.
/// The chain only shuffles when every rule is a marker.
#[derive(Debug, Clone)]
pub struct ChainedComparator {
    rules: Vec<OrderRule>,
    shuffle: bool,
}

impl ChainedComparator {
    /// An empty rule list means natural ascending order.
    pub fn new(rules: &[OrderRule]) -> Self {
        let rules = if rules.is_empty() {
            vec![OrderRule::Natural(Order::Asc)]
        } else {
            rules.to_vec()
        };
        let shuffle = rules.iter().all(OrderRule::is_shuffle);
        Self { rules, shuffle }
    }

    pub fn is_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn rules(&self) -> &[OrderRule] {
        &self.rules
    }

    pub fn compare(&self, ctx: &mut Context, a: &Value, b: &Value) -> Result<Ordering> {
        if self.shuffle {
            return Err(ShuffleCompareError.into());
        }
        for rule in self.rules.iter().filter(|rule| !rule.is_shuffle()) {
            let ord = rule.compare(ctx, a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }
}
