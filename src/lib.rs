pub mod compose;
pub mod config;
pub mod core;
pub mod order;
pub mod registry;
pub mod step;
pub mod tooling;
pub mod traversal;

pub use compose::{parse_compose, run_compose, Step};
pub use config::{KernelConfig, LogLevel};
pub use crate::core::register_core;
pub use order::{
    ChainedComparator, Comparator, Order, OrderRule, ShuffleCompareError, TraversalComparator,
};
pub use registry::{CancelledError, Context, Registry};
pub use step::{process_all, register_order_local, LocalStep, OrderLocalStep, Requirement};
pub use tooling::register_tooling;
pub use traversal::LocalTraversal;

/// Registry with every contract this crate provides.
pub fn default_registry(config: KernelConfig) -> Registry {
    let registry = Registry::with_config(config);
    register_core(&registry);
    register_tooling(&registry);
    register_order_local(&registry);
    registry
}
