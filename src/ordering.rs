use crate::registry::PluginRegistry;

/// Produces the plugin iteration order for one dispatch cycle.
///
/// Implementations must return a deterministic permutation of the
/// registered plugin names, each exactly once. The strategy is re-evaluated
/// at the start of every cycle, so a dynamic implementation may reorder
/// between cycles; within a cycle the same order is used for both the
/// matching and the execution phase.
pub trait OrderingStrategy: Send + Sync {
    fn order(&self, registry: &PluginRegistry) -> Vec<String>;
}

/// Default strategy: plugins in registration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertionOrder;

impl OrderingStrategy for InsertionOrder {
    fn order(&self, registry: &PluginRegistry) -> Vec<String> {
        registry.names().map(str::to_string).collect()
    }
}
