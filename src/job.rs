use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// System attribute marking a job as a candidate for bursting.
pub const ATTR_BURSTABLE: &str = "burstable";

/// System attribute recording the name of the plugin that claimed the job.
pub const ATTR_BURST_SCHEDULED: &str = "burst-scheduled";

/// Resource payload of a job, passed through to burst plugins unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub command: Vec<String>,
    pub nnodes: u32,
    pub ntasks: u32,
    pub cwd: Option<String>,
}

impl JobSpec {
    pub fn new(command: Vec<String>, nnodes: u32, ntasks: u32) -> Self {
        Self {
            command,
            nnodes,
            ntasks,
            cwd: None,
        }
    }
}

/// A job as seen by the dispatch engine.
///
/// The engine only touches the id and the system attributes; the spec is
/// carried for the plugins. A job holds at most one of the burstable marker
/// and the claim attribute - claiming removes the marker in the same update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    /// String-keyed system attributes sourced from the queue backend.
    pub system: BTreeMap<String, String>,
    pub spec: JobSpec,
    pub submitted_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(spec: JobSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            system: BTreeMap::new(),
            spec,
            submitted_at: Utc::now(),
        }
    }

    /// Create a job already flagged as burstable.
    pub fn burstable(spec: JobSpec) -> Self {
        let mut job = Self::new(spec);
        job.system
            .insert(ATTR_BURSTABLE.to_string(), "1".to_string());
        job
    }

    pub fn is_burstable(&self) -> bool {
        self.system.contains_key(ATTR_BURSTABLE)
    }

    /// Name of the plugin that claimed this job, if any.
    pub fn claimed_by(&self) -> Option<&str> {
        self.system.get(ATTR_BURST_SCHEDULED).map(String::as_str)
    }

    /// Record a claim: set the claiming plugin's name and drop the burstable
    /// marker so the job cannot be offered to another plugin.
    pub fn mark_claimed(&mut self, plugin_name: &str) {
        self.system
            .insert(ATTR_BURST_SCHEDULED.to_string(), plugin_name.to_string());
        self.system.remove(ATTR_BURSTABLE);
    }
}
