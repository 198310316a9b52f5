use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PluginParams;
use crate::error::Result;
use crate::job::JobRecord;

/// Out-of-band request to provision burst capacity directly, independent of
/// any matched jobs. Passed through the dispatch cycle to every plugin's
/// execution phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstRequest {
    pub nnodes: u32,
    pub ntasks: u32,
    /// Command to run on the provisioned capacity; backends supply their
    /// own placeholder when absent.
    pub command: Option<Vec<String>>,
}

impl BurstRequest {
    pub fn new(nnodes: u32, ntasks: u32) -> Self {
        Self {
            nnodes,
            ntasks,
            command: None,
        }
    }
}

/// Capability contract implemented by every burst backend.
///
/// A plugin is constructed by its registered factory, named by the registry
/// (the registry's name is authoritative and overrides any self-report),
/// bound to its parameter object, and only then eligible for dispatch
/// offers. During a cycle the engine offers candidate jobs to `schedule`
/// one plugin at a time and invokes `run` once all candidates are
/// processed.
#[async_trait]
pub trait BurstPlugin: Send {
    fn name(&self) -> &str;

    /// Called by the registry at load time; the assigned name wins over
    /// anything the plugin reports about itself.
    fn set_name(&mut self, name: &str);

    /// Kind tag of the parameter object this plugin expects.
    fn param_kind(&self) -> &'static str;

    /// Validate and bind backend configuration, absorbing environment
    /// overrides declared by the parameter struct's allow-list.
    fn set_params(&mut self, params: &PluginParams) -> Result<()>;

    /// Accept or reject a candidate job. Accepting records the job into the
    /// plugin's working set; no other side effects are permitted. Matching
    /// logic is opaque to the engine and may be arbitrarily involved
    /// (capacity checks, node-count thresholds).
    fn schedule(&mut self, job: &JobRecord) -> bool;

    /// Execute all accepted work, plus any out-of-band request. Invoked once
    /// per cycle even when the working set is empty, so standing requests
    /// still execute; that case is expected to no-op cheaply.
    async fn run(&mut self, request: Option<&BurstRequest>) -> Result<()>;

    /// Ids of the jobs currently in this plugin's working set.
    fn assigned_jobs(&self) -> Vec<Uuid>;

    /// Backend-defined precondition check, invoked once at load time when
    /// the caller has self-validation enabled. Rejection discards the
    /// plugin with a warning rather than an error.
    fn validate(&self) -> bool {
        true
    }

    /// Tear down provisioned capacity, optionally limited to one resource.
    async fn cleanup(&mut self, _name: Option<&str>) -> Result<()> {
        Ok(())
    }
}

/// Constructor for a plugin kind, held in the registry's kind table.
pub type PluginFactory = Box<dyn Fn() -> Result<Box<dyn BurstPlugin>> + Send + Sync>;
