use std::collections::HashMap;

use crate::config::PluginParams;
use crate::error::{BurstError, Result};
use crate::plugin::{BurstPlugin, PluginFactory};

/// Ordered mapping of named, validated burst plugins, plus the table of
/// loadable plugin kinds.
///
/// The kind table is populated explicitly by the caller at startup
/// (`register_kind`); there is no filesystem or module-path discovery.
/// Insertion order of loaded plugins is preserved and doubles as the
/// default dispatch order.
pub struct PluginRegistry {
    kinds: HashMap<String, PluginFactory>,
    plugins: Vec<(String, Box<dyn BurstPlugin>)>,
    self_validation: bool,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
            plugins: Vec::new(),
            self_validation: true,
        }
    }

    /// Make a plugin kind loadable under `name`.
    pub fn register_kind(
        &mut self,
        name: &str,
        factory: impl Fn() -> Result<Box<dyn BurstPlugin>> + Send + Sync + 'static,
    ) {
        self.kinds.insert(name.to_string(), Box::new(factory));
    }

    /// Loadable kind names, joined for error messages.
    pub fn choices(&self) -> String {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join("|")
    }

    /// Enable or disable backend self-validation at load time. Enabled by
    /// default.
    pub fn set_self_validation(&mut self, enabled: bool) {
        self.self_validation = enabled;
    }

    /// Construct, validate, and register a plugin of the given kind.
    ///
    /// Returns `Ok(true)` when the plugin was registered and `Ok(false)`
    /// when it failed self-validation and was skipped - a cycle can proceed
    /// with fewer plugins, so that outcome is not an error. Load-time
    /// failures (`UnknownPluginKind`, `MalformedPluginModule`,
    /// `InvalidPlugin`) are raised to the caller and leave the registry
    /// unchanged. Loading a duplicate name overwrites the previous plugin
    /// in place, keeping its dispatch position.
    pub fn load(&mut self, name: &str, params: &PluginParams) -> Result<bool> {
        let factory = self
            .kinds
            .get(name)
            .ok_or_else(|| BurstError::UnknownPluginKind(name.to_string(), self.choices()))?;

        let mut plugin = factory()
            .map_err(|e| BurstError::MalformedPluginModule(name.to_string(), e.to_string()))?;

        // The registry's name is authoritative.
        plugin.set_name(name);

        Self::validate_structure(name, plugin.as_ref(), params)?;

        plugin
            .set_params(params)
            .map_err(|e| BurstError::InvalidPlugin(name.to_string(), e.to_string()))?;

        if self.self_validation && !plugin.validate() {
            tracing::warn!(plugin = name, "Plugin failed self-validation, skipping");
            return Ok(false);
        }

        match self.plugins.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = plugin,
            None => self.plugins.push((name.to_string(), plugin)),
        }
        tracing::info!(plugin = name, "Plugin registered");
        Ok(true)
    }

    /// Structural check run before a plugin can ever be offered a job. The
    /// operation surface is enforced by the trait; what remains checkable
    /// at runtime is the declared parameter type.
    fn validate_structure(
        name: &str,
        plugin: &dyn BurstPlugin,
        params: &PluginParams,
    ) -> Result<()> {
        if plugin.param_kind().is_empty() {
            return Err(BurstError::InvalidPlugin(
                name.to_string(),
                "missing parameter type declaration".to_string(),
            ));
        }
        if plugin.param_kind() != params.kind() {
            return Err(BurstError::InvalidPlugin(
                name.to_string(),
                format!(
                    "expects '{}' parameters, got '{}'",
                    plugin.param_kind(),
                    params.kind()
                ),
            ));
        }
        Ok(())
    }

    /// Remove all registered plugins. The kind table is untouched.
    pub fn reset(&mut self) {
        self.plugins.clear();
    }

    /// Registered plugin names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&dyn BurstPlugin> {
        self.plugins
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, plugin)| plugin.as_ref())
    }

    pub fn get_mut<'a>(&'a mut self, name: &str) -> Option<&'a mut (dyn BurstPlugin + 'a)> {
        self.plugins
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(move |(_, plugin)| plugin.as_mut() as &mut (dyn BurstPlugin + 'a))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .field("plugins", &self.names().collect::<Vec<_>>())
            .field("self_validation", &self.self_validation)
            .finish()
    }
}
