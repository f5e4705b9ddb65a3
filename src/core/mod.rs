pub mod object;
pub mod value;

use crate::registry::Registry;

/// Register the contracts local traversals use to derive sort keys.
pub fn register_core(registry: &Registry) {
    object::register_object(registry);
    value::register_value(registry);
}
