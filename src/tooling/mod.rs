pub mod document;
pub mod logging;

use crate::registry::Registry;

pub use document::load_document;
pub use logging::{kernel_log, register_logging, route_logs_to_stderr};

pub fn register_tooling(registry: &Registry) {
    register_logging(registry);
}
