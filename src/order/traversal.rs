use std::cmp::Ordering;
use std::fmt;

use anyhow::Result;
use serde_json::Value;

use super::{Order, OrderRule};
use crate::registry::Context;
use crate::traversal::LocalTraversal;

/// Orders candidates by the keys a [`LocalTraversal`] derives for them.
///
/// The traversal runs for both sides on every comparison; derived keys are
/// not cached because a traversal may read state that changes between calls.
#[derive(Debug, Clone)]
pub struct TraversalComparator {
    traversal: LocalTraversal,
    delegate: Box<OrderRule>,
}

impl TraversalComparator {
    /// Keys compared in natural ascending order.
    pub fn new(traversal: LocalTraversal) -> Self {
        Self::with_delegate(traversal, Order::Asc)
    }

    pub fn with_delegate(traversal: LocalTraversal, delegate: impl Into<OrderRule>) -> Self {
        Self {
            traversal,
            delegate: Box::new(delegate.into()),
        }
    }

    pub fn traversal(&self) -> &LocalTraversal {
        &self.traversal
    }

    pub fn delegate(&self) -> &OrderRule {
        &self.delegate
    }

    pub fn compare(&self, ctx: &mut Context, a: &Value, b: &Value) -> Result<Ordering> {
        let key_a = self.traversal.evaluate(ctx, a)?;
        let key_b = self.traversal.evaluate(ctx, b)?;
        self.delegate.compare(ctx, &key_a, &key_b)
    }

    pub fn signature(&self) -> String {
        format!(
            "by({},{})",
            self.traversal.signature(),
            self.delegate.signature()
        )
    }
}

impl fmt::Display for TraversalComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.traversal, self.delegate)
    }
}
