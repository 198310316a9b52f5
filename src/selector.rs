use crate::job::JobRecord;

/// Predicate deciding whether a job is a bursting candidate.
///
/// Selectors must be deterministic, side-effect free, and total: a job
/// missing expected attributes is a non-candidate, never a panic.
pub type Selector = Box<dyn Fn(&JobRecord) -> bool + Send + Sync>;

/// Default selector: a job is a candidate iff it carries the burstable
/// marker in its system attributes.
pub fn is_burstable(job: &JobRecord) -> bool {
    job.is_burstable()
}

pub(crate) fn default_selector() -> Selector {
    Box::new(is_burstable)
}
