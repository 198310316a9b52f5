use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::{BurstParams, EnvOverrides, PluginParams};
use crate::error::{BurstError, Result};
use crate::job::JobRecord;
use crate::plugin::{BurstPlugin, BurstRequest};

/// Kind name this backend is registered under.
pub const KIND: &str = "container";

/// Configuration for container-based bursting.
///
/// Burst capacity is provisioned as detached containers through the local
/// container runtime CLI, with the same isolation flags used for sandboxed
/// job execution: no network, dropped capabilities, read-only root,
/// memory and CPU limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerParams {
    /// Container image providing the burst environment
    pub image: String,
    /// Container runtime binary (docker or podman)
    pub runtime: String,
    /// Disable network access in burst containers
    pub network_disabled: bool,
    /// Memory limit per container (e.g., "256m")
    pub memory_limit: Option<String>,
    /// CPU limit per container (e.g., "0.5" for half a CPU)
    pub cpu_limit: Option<String>,
    /// Reject jobs requesting more than this many nodes (0 = no limit)
    pub max_nodes: u32,
}

impl Default for ContainerParams {
    fn default() -> Self {
        Self {
            image: "alpine:latest".to_string(),
            runtime: "docker".to_string(),
            network_disabled: true,
            memory_limit: Some("256m".to_string()),
            cpu_limit: Some("0.5".to_string()),
            max_nodes: 0,
        }
    }
}

impl BurstParams for ContainerParams {
    fn override_keys() -> &'static [&'static str] {
        &["image", "runtime", "memory_limit", "cpu_limit", "max_nodes"]
    }

    fn apply_override(&mut self, key: &str, value: &str) {
        match key {
            "image" => self.image = value.to_string(),
            "runtime" => self.runtime = value.to_string(),
            "memory_limit" => self.memory_limit = Some(value.to_string()),
            "cpu_limit" => self.cpu_limit = Some(value.to_string()),
            "max_nodes" => match value.parse() {
                Ok(parsed) => self.max_nodes = parsed,
                Err(_) => {
                    tracing::warn!(value, "Ignoring unparseable max_nodes override");
                }
            },
            _ => {}
        }
    }
}

/// Burst backend that launches one sandboxed container per accepted job.
///
/// Accepted jobs stay in the working set across the cycle; containers
/// already provisioned in an earlier execution phase are not re-launched.
#[derive(Debug, Default)]
pub struct ContainerBurst {
    name: String,
    params: ContainerParams,
    jobs: HashMap<Uuid, JobRecord>,
    /// Provisioned containers: burst name -> runtime container id.
    containers: HashMap<String, String>,
}

impl ContainerBurst {
    pub fn factory() -> Result<Box<dyn BurstPlugin>> {
        Ok(Box::new(Self::default()))
    }

    /// Containers provisioned so far, keyed by burst name.
    pub fn containers(&self) -> &HashMap<String, String> {
        &self.containers
    }

    fn burst_name(job_id: Uuid) -> String {
        format!("burst-{job_id}")
    }

    /// Build the runtime argument vector for one burst container.
    fn container_args(&self, name: &str, command: &[String]) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--detach".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];

        if self.params.network_disabled {
            args.push("--network=none".to_string());
        }
        if let Some(ref limit) = self.params.memory_limit {
            args.push(format!("--memory={}", limit));
        }
        if let Some(ref limit) = self.params.cpu_limit {
            args.push(format!("--cpus={}", limit));
        }

        args.push("--cap-drop=ALL".to_string());
        args.push("--security-opt=no-new-privileges".to_string());
        args.push("--read-only".to_string());

        args.push(self.params.image.clone());
        if command.is_empty() {
            // Placeholder workload keeps the capacity alive.
            args.push("sleep".to_string());
            args.push("infinity".to_string());
        } else {
            args.extend(command.iter().cloned());
        }
        args
    }

    async fn launch(&mut self, name: &str, command: &[String]) -> Result<()> {
        let args = self.container_args(name, command);
        tracing::info!(
            plugin = %self.name,
            container = name,
            image = %self.params.image,
            "Provisioning burst container"
        );

        let output = Command::new(&self.params.runtime)
            .args(&args)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BurstError::Execution(format!(
                "container '{name}' failed to start: {stderr}"
            )));
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        self.containers.insert(name.to_string(), container_id);
        Ok(())
    }

    async fn remove(&self, name: &str, container_id: &str) -> Result<()> {
        let output = Command::new(&self.params.runtime)
            .args(["rm", "--force", container_id])
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BurstError::Execution(format!(
                "failed to remove container '{name}': {stderr}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BurstPlugin for ContainerBurst {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn param_kind(&self) -> &'static str {
        KIND
    }

    fn set_params(&mut self, params: &PluginParams) -> Result<()> {
        let mut typed: ContainerParams = params.typed()?;
        EnvOverrides::from_env().apply(&mut typed);
        self.params = typed;
        Ok(())
    }

    fn schedule(&mut self, job: &JobRecord) -> bool {
        if self.params.max_nodes > 0 && job.spec.nnodes > self.params.max_nodes {
            tracing::debug!(
                job_id = %job.id,
                nnodes = job.spec.nnodes,
                max_nodes = self.params.max_nodes,
                "Job exceeds node budget, rejecting"
            );
            return false;
        }
        self.jobs.insert(job.id, job.clone());
        true
    }

    async fn run(&mut self, request: Option<&BurstRequest>) -> Result<()> {
        if self.jobs.is_empty() && request.is_none() {
            tracing::info!(plugin = %self.name, "No jobs to burst");
            return Ok(());
        }

        if let Some(req) = request {
            let name = format!("burst-request-{}", Uuid::new_v4());
            let command = req.command.clone().unwrap_or_default();
            self.launch(&name, &command).await?;
        }

        let pending: Vec<(String, Vec<String>)> = self
            .jobs
            .values()
            .map(|job| (Self::burst_name(job.id), job.spec.command.clone()))
            .filter(|(name, _)| !self.containers.contains_key(name))
            .collect();

        for (name, command) in pending {
            self.launch(&name, &command).await?;
        }
        Ok(())
    }

    fn assigned_jobs(&self) -> Vec<Uuid> {
        self.jobs.keys().copied().collect()
    }

    fn validate(&self) -> bool {
        if self.params.image.is_empty() {
            tracing::warn!(plugin = %self.name, "No container image configured");
            return false;
        }
        if self.params.runtime.is_empty() {
            tracing::warn!(plugin = %self.name, "No container runtime configured");
            return false;
        }
        true
    }

    async fn cleanup(&mut self, name: Option<&str>) -> Result<()> {
        let targets: Vec<(String, String)> = self
            .containers
            .iter()
            .filter(|(n, _)| name.is_none() || name == Some(n.as_str()))
            .map(|(n, id)| (n.clone(), id.clone()))
            .collect();

        for (n, id) in targets {
            tracing::info!(plugin = %self.name, container = %n, "Removing burst container");
            self.remove(&n, &id).await?;
            self.containers.remove(&n);
        }
        Ok(())
    }
}
