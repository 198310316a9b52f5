use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Prefix for environment variables that override plugin parameters.
///
/// `BURST_IMAGE=busybox` overrides the `image` field of the active parameter
/// object, provided the field appears in its override allow-list.
pub const ENV_PREFIX: &str = "BURST_";

/// Backend-specific configuration handed to a plugin at load time.
///
/// The envelope pairs a kind tag with a JSON payload; each plugin
/// deserializes the payload into its own typed parameter struct via
/// [`PluginParams::typed`]. The registry checks the kind tag against the
/// plugin's declared parameter type before the payload is ever decoded.
#[derive(Debug, Clone)]
pub struct PluginParams {
    kind: String,
    values: Value,
}

impl PluginParams {
    pub fn new(kind: impl Into<String>, values: Value) -> Self {
        Self {
            kind: kind.into(),
            values,
        }
    }

    /// Parameters with an empty payload; every field takes its default.
    pub fn empty(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Object(serde_json::Map::new()))
    }

    /// Build the envelope from a typed parameter struct.
    pub fn from_typed<T: Serialize>(kind: impl Into<String>, params: &T) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(params)?))
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Decode the payload into the plugin's parameter struct.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.values.clone())?)
    }
}

/// Declared override surface of a parameter struct.
///
/// Plugins absorb environment overrides through an explicit allow-list
/// rather than by scanning attributes: only the keys named by
/// `override_keys` are looked up, everything else in the environment is
/// ignored.
pub trait BurstParams {
    /// Field names that may be overridden from the environment.
    fn override_keys() -> &'static [&'static str];

    /// Apply a single override. Unknown keys are ignored.
    fn apply_override(&mut self, key: &str, value: &str);
}

/// Snapshot of `BURST_`-prefixed process environment variables.
///
/// Keys are stored with the prefix stripped and lowercased, matching the
/// field names declared by [`BurstParams::override_keys`].
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    values: HashMap<String, String>,
}

impl EnvOverrides {
    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a snapshot from explicit key/value pairs (primarily for tests).
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let values = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|field| (field.to_lowercase(), value))
            })
            .collect();
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge the snapshot into a parameter struct. Only fields in the
    /// struct's allow-list are touched; environment values take precedence
    /// over the loaded configuration.
    pub fn apply<T: BurstParams>(&self, params: &mut T) {
        for &key in T::override_keys() {
            if let Some(value) = self.values.get(key) {
                tracing::debug!(key, value = %value, "Applying environment override");
                params.apply_override(key, value);
            }
        }
    }
}
