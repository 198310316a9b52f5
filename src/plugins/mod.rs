//! Built-in burst backends.

pub mod container;

use crate::registry::PluginRegistry;

/// Register every built-in plugin kind on a registry.
pub fn register_builtin_kinds(registry: &mut PluginRegistry) {
    registry.register_kind(container::KIND, container::ContainerBurst::factory);
}
