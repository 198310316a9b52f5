use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{BurstError, Result};
use crate::job::JobRecord;

/// Interface the dispatch engine requires of a workload queue backend.
///
/// Implementations may talk to a remote workload manager; every operation is
/// awaited in sequence by the engine, one cycle at a time. The engine's only
/// mutation is [`update_job`](JobQueue::update_job) for claimed jobs. There
/// is no compare-and-swap: a concurrent external mutation of the same job
/// between listing and claiming is a lost-update race this layer accepts.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Snapshot of job ids in the backend's listing order. May be empty.
    async fn list_jobs(&self) -> Result<Vec<Uuid>>;

    /// Fully resolved record for one job, including system attributes.
    async fn job_info(&self, id: Uuid) -> Result<JobRecord>;

    /// Persist an attribute update (a claim). Failure must be reported to
    /// the caller, never silently swallowed.
    async fn update_job(&self, job: &JobRecord) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryQueueInner {
    jobs: HashMap<Uuid, JobRecord>,
    order: Vec<Uuid>,
}

/// In-memory queue backend with stable submission order.
///
/// Stands in for a real workload manager in tests and embeddings that do
/// not have one.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: RwLock<MemoryQueueInner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job to the queue, returning its id.
    pub async fn submit(&self, job: JobRecord) -> Uuid {
        let id = job.id;
        let mut inner = self.inner.write().await;
        if inner.jobs.insert(id, job).is_none() {
            inner.order.push(id);
        }
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.inner.read().await.jobs.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.jobs.is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn list_jobs(&self) -> Result<Vec<Uuid>> {
        Ok(self.inner.read().await.order.clone())
    }

    async fn job_info(&self, id: Uuid) -> Result<JobRecord> {
        self.inner
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or(BurstError::JobNotFound(id))
    }

    async fn update_job(&self, job: &JobRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(BurstError::JobNotFound(job.id)),
        }
    }
}
