use std::sync::Arc;

use uuid::Uuid;

use crate::error::{BurstError, Result};
use crate::job::JobRecord;
use crate::ordering::{InsertionOrder, OrderingStrategy};
use crate::plugin::BurstRequest;
use crate::queue::JobQueue;
use crate::registry::PluginRegistry;
use crate::selector::{default_selector, Selector};

/// A claim that could not be persisted back to the queue. The plugin still
/// holds the job in its working set for this cycle; the caller decides the
/// retry policy.
#[derive(Debug)]
pub struct ClaimFailure {
    pub job_id: Uuid,
    pub plugin: String,
    pub error: BurstError,
}

/// Result of one dispatch cycle. Claimed jobs are implicit in the plugins'
/// working sets; this carries what the caller must act on.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Candidates no plugin accepted, in queue listing order.
    pub unmatched: Vec<JobRecord>,
    /// Claims the queue backend failed to persist.
    pub claim_failures: Vec<ClaimFailure>,
}

/// Routes burstable jobs from a workload queue to registered burst plugins.
///
/// One dispatch cycle runs to completion before another may start; callers
/// serialize cycles (typically one per polling interval). Plugins are
/// offered each candidate strictly one at a time, in the ordering
/// strategy's order, so the first accept is unambiguous.
pub struct BurstDispatcher {
    queue: Arc<dyn JobQueue>,
    registry: PluginRegistry,
    selector: Selector,
    ordering: Box<dyn OrderingStrategy>,
}

impl BurstDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self::with_registry(queue, PluginRegistry::new())
    }

    pub fn with_registry(queue: Arc<dyn JobQueue>, registry: PluginRegistry) -> Self {
        Self {
            queue,
            registry,
            selector: default_selector(),
            ordering: Box::new(InsertionOrder),
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// Substitute the candidate predicate. Any deterministic, side-effect
    /// free function over a job record is accepted.
    pub fn set_selector(
        &mut self,
        selector: impl Fn(&JobRecord) -> bool + Send + Sync + 'static,
    ) {
        self.selector = Box::new(selector);
    }

    /// Restore the default burstable-marker selector.
    pub fn reset_selector(&mut self) {
        self.selector = default_selector();
    }

    /// Substitute the plugin iteration order for subsequent cycles.
    pub fn set_ordering(&mut self, ordering: impl OrderingStrategy + 'static) {
        self.ordering = Box::new(ordering);
    }

    /// Restore insertion-order iteration.
    pub fn reset_ordering(&mut self) {
        self.ordering = Box::new(InsertionOrder);
    }

    /// Run one dispatch cycle.
    ///
    /// 1. Snapshot the queue and retain jobs passing the selector, in the
    ///    queue's listing order.
    /// 2. Offer each candidate to the plugins in ordering-strategy order;
    ///    the first plugin whose `schedule` accepts claims the job and the
    ///    remaining plugins are not consulted. Unaccepted jobs are collected
    ///    as unmatched.
    /// 3. Persist each claim to the queue. A persistence failure is
    ///    reported through the outcome but does not unwind the in-memory
    ///    claim.
    /// 4. Invoke every plugin's execution phase in the same order, passing
    ///    `request` through; this happens even when there were no
    ///    candidates, so standing burst requests still execute.
    ///
    /// A plugin `run` fault is not caught here: it propagates and aborts
    /// the remainder of the cycle.
    pub async fn process_queue(
        &mut self,
        request: Option<&BurstRequest>,
    ) -> Result<DispatchOutcome> {
        // One order per cycle, shared by the matching and execution phases.
        let order = self.ordering.order(&self.registry);
        let candidates = self.select_jobs().await?;

        let mut outcome = DispatchOutcome::default();
        for mut job in candidates {
            let mut accepted = None;
            for name in &order {
                if let Some(plugin) = self.registry.get_mut(name) {
                    if plugin.schedule(&job) {
                        accepted = Some(name.clone());
                        break;
                    }
                }
            }

            match accepted {
                Some(plugin_name) => {
                    job.mark_claimed(&plugin_name);
                    tracing::info!(job_id = %job.id, plugin = %plugin_name, "Job claimed for bursting");
                    if let Err(e) = self.queue.update_job(&job).await {
                        tracing::error!(
                            job_id = %job.id,
                            plugin = %plugin_name,
                            error = %e,
                            "Failed to persist claim"
                        );
                        outcome.claim_failures.push(ClaimFailure {
                            job_id: job.id,
                            plugin: plugin_name,
                            error: e,
                        });
                    }
                }
                None => outcome.unmatched.push(job),
            }
        }

        if !outcome.unmatched.is_empty() {
            tracing::warn!(
                count = outcome.unmatched.len(),
                "Jobs could not be bursted"
            );
        }

        for name in &order {
            if let Some(plugin) = self.registry.get_mut(name) {
                plugin.run(request).await?;
            }
        }

        Ok(outcome)
    }

    /// Convenience wrapper for a cycle with no out-of-band request.
    pub async fn run_burst(&mut self) -> Result<DispatchOutcome> {
        self.process_queue(None).await
    }

    /// Apply the selector across a queue snapshot. Candidate order is the
    /// queue's listing order; the engine does not re-sort.
    async fn select_jobs(&self) -> Result<Vec<JobRecord>> {
        let ids = self.queue.list_jobs().await?;
        let mut selected = Vec::new();
        for id in ids {
            let info = self.queue.job_info(id).await?;
            if !(self.selector)(&info) {
                continue;
            }
            tracing::debug!(job_id = %id, "Job marked for bursting");
            selected.push(info);
        }
        Ok(selected)
    }
}
