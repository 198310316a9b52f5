
use std::sync::Arc;

use cloudburst::dispatch::BurstDispatcher;
use cloudburst::plugin::BurstRequest;
use cloudburst::queue::MemoryQueue;
use cloudburst::registry::PluginRegistry;

use test_harness::{
    burstable_job, init_tracing, load_test_plugin, plain_job, probe, FlakyQueue, Reversed,
};

#[tokio::test]
async fn test_burstable_job_routed_to_accepting_plugin() {
    init_tracing();
    let queue = Arc::new(MemoryQueue::new());
    let burstable = queue.submit(burstable_job("hostname", 4)).await;
    let plain = queue.submit(plain_job("echo skip", 1)).await;

    let offers = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &offers);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    assert!(outcome.unmatched.is_empty());
    assert!(outcome.claim_failures.is_empty());

    // The accepting plugin holds exactly the burstable job.
    let plugin = dispatcher.registry().get("p1").unwrap();
    assert_eq!(plugin.assigned_jobs(), vec![burstable]);

    // Claim persisted: attribute set, burstable marker gone.
    let claimed = queue.get(burstable).await.unwrap();
    assert_eq!(claimed.claimed_by(), Some("p1"));
    assert!(!claimed.is_burstable());

    // The non-candidate is untouched.
    let untouched = queue.get(plain).await.unwrap();
    assert!(untouched.system.is_empty());
}

#[tokio::test]
async fn test_non_candidates_are_never_considered() {
    let queue = Arc::new(MemoryQueue::new());
    let plain = queue.submit(plain_job("echo skip", 1)).await;

    let offers = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &offers);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    // Not offered, not claimed, not unmatched - simply not considered.
    assert!(offers.lock().unwrap().offers.is_empty());
    assert!(outcome.unmatched.is_empty());
    assert!(dispatcher
        .registry()
        .get("p1")
        .unwrap()
        .assigned_jobs()
        .is_empty());
    assert!(queue.get(plain).await.unwrap().system.is_empty());
}

#[tokio::test]
async fn test_first_accept_wins_in_registration_order() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", false, &shared);
    load_test_plugin(&mut registry, "p2", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    assert!(outcome.unmatched.is_empty());

    // Offered strictly in order, claim recorded for the first accepter.
    let observed = shared.lock().unwrap();
    assert_eq!(
        observed.offers,
        vec![("p1".to_string(), job_id), ("p2".to_string(), job_id)]
    );
    assert_eq!(queue.get(job_id).await.unwrap().claimed_by(), Some("p2"));
}

#[tokio::test]
async fn test_first_accepting_plugin_stops_iteration() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);
    load_test_plugin(&mut registry, "p2", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    dispatcher.run_burst().await.unwrap();

    // p2 never sees the job; exactly one working set contains it.
    assert_eq!(
        shared.lock().unwrap().offers,
        vec![("p1".to_string(), job_id)]
    );
    assert_eq!(
        dispatcher.registry().get("p1").unwrap().assigned_jobs(),
        vec![job_id]
    );
    assert!(dispatcher
        .registry()
        .get("p2")
        .unwrap()
        .assigned_jobs()
        .is_empty());
    assert_eq!(queue.get(job_id).await.unwrap().claimed_by(), Some("p1"));
}

#[tokio::test]
async fn test_ordering_strategy_overrides_registration_order() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", false, &shared);
    load_test_plugin(&mut registry, "p2", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    dispatcher.set_ordering(Reversed);
    dispatcher.run_burst().await.unwrap();

    // With [p2, p1] iteration, p2 accepts first and p1 is never consulted.
    assert_eq!(
        shared.lock().unwrap().offers,
        vec![("p2".to_string(), job_id)]
    );
    assert_eq!(queue.get(job_id).await.unwrap().claimed_by(), Some("p2"));
}

#[tokio::test]
async fn test_execution_phase_follows_matching_order() {
    let queue = Arc::new(MemoryQueue::new());

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);
    load_test_plugin(&mut registry, "p2", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    dispatcher.run_burst().await.unwrap();
    assert_eq!(
        shared.lock().unwrap().runs,
        vec!["p1".to_string(), "p2".to_string()]
    );

    dispatcher.set_ordering(Reversed);
    dispatcher.run_burst().await.unwrap();
    assert_eq!(
        shared.lock().unwrap().runs,
        vec![
            "p1".to_string(),
            "p2".to_string(),
            "p2".to_string(),
            "p1".to_string()
        ]
    );
}

#[tokio::test]
async fn test_candidates_processed_in_listing_order() {
    let queue = Arc::new(MemoryQueue::new());
    let first = queue.submit(burstable_job("echo 1", 1)).await;
    let second = queue.submit(burstable_job("echo 2", 1)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", false, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    assert_eq!(
        shared.lock().unwrap().offers,
        vec![("p1".to_string(), first), ("p1".to_string(), second)]
    );
    let unmatched_ids: Vec<_> = outcome.unmatched.iter().map(|j| j.id).collect();
    assert_eq!(unmatched_ids, vec![first, second]);
}

#[tokio::test]
async fn test_unmatched_job_remains_burstable() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", false, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    assert_eq!(outcome.unmatched.len(), 1);
    assert_eq!(outcome.unmatched[0].id, job_id);

    // No claim was written back.
    let stored = queue.get(job_id).await.unwrap();
    assert!(stored.is_burstable());
    assert!(stored.claimed_by().is_none());
}

#[tokio::test]
async fn test_zero_plugins_leaves_every_candidate_unmatched() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let mut dispatcher = BurstDispatcher::new(queue.clone());
    let outcome = dispatcher.run_burst().await.unwrap();

    assert_eq!(outcome.unmatched.len(), 1);
    assert_eq!(outcome.unmatched[0].id, job_id);
    assert!(queue.get(job_id).await.unwrap().is_burstable());
}

#[tokio::test]
async fn test_run_invoked_even_with_zero_candidates() {
    let queue = Arc::new(MemoryQueue::new());

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    // Standing burst requests would still execute here.
    assert!(outcome.unmatched.is_empty());
    assert_eq!(shared.lock().unwrap().runs, vec!["p1".to_string()]);
}

#[tokio::test]
async fn test_burst_request_passed_to_every_plugin() {
    let queue = Arc::new(MemoryQueue::new());

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);
    load_test_plugin(&mut registry, "p2", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    let request = BurstRequest::new(8, 8);
    dispatcher.process_queue(Some(&request)).await.unwrap();

    assert_eq!(shared.lock().unwrap().requests, 2);
}

/// Running a second cycle over an unchanged queue must not re-claim: the
/// first cycle removed the burstable marker, so the default selector no
/// longer sees the job.
#[tokio::test]
async fn test_repeated_cycles_do_not_reclaim() {
    let queue = Arc::new(MemoryQueue::new());
    let job_id = queue.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    dispatcher.run_burst().await.unwrap();
    let outcome = dispatcher.run_burst().await.unwrap();

    assert!(outcome.unmatched.is_empty());
    // Exactly one offer across both cycles, and the working set holds the
    // job exactly once.
    assert_eq!(
        shared.lock().unwrap().offers,
        vec![("p1".to_string(), job_id)]
    );
    assert_eq!(
        dispatcher.registry().get("p1").unwrap().assigned_jobs(),
        vec![job_id]
    );
    assert_eq!(queue.get(job_id).await.unwrap().claimed_by(), Some("p1"));
}

#[tokio::test]
async fn test_claim_persistence_failure_surfaces_in_outcome() {
    let flaky = Arc::new(FlakyQueue::default());
    let job_id = flaky.inner.submit(burstable_job("hostname", 2)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(flaky.clone(), registry);
    let outcome = dispatcher.run_burst().await.unwrap();

    // The persistence failure is reported, but the in-memory claim stands.
    assert!(outcome.unmatched.is_empty());
    assert_eq!(outcome.claim_failures.len(), 1);
    assert_eq!(outcome.claim_failures[0].job_id, job_id);
    assert_eq!(outcome.claim_failures[0].plugin, "p1");
    assert_eq!(
        dispatcher.registry().get("p1").unwrap().assigned_jobs(),
        vec![job_id]
    );
}

#[tokio::test]
async fn test_custom_selector_replaces_burstable_marker() {
    let queue = Arc::new(MemoryQueue::new());
    let small = queue.submit(burstable_job("echo small", 2)).await;
    let large = queue.submit(plain_job("echo large", 8)).await;

    let shared = probe();
    let mut registry = PluginRegistry::new();
    load_test_plugin(&mut registry, "p1", true, &shared);

    let mut dispatcher = BurstDispatcher::with_registry(queue.clone(), registry);
    dispatcher.set_selector(|job| job.spec.nnodes >= 4);
    dispatcher.run_burst().await.unwrap();

    // Only the large job qualifies under the substituted predicate.
    assert_eq!(
        dispatcher.registry().get("p1").unwrap().assigned_jobs(),
        vec![large]
    );
    assert!(queue.get(small).await.unwrap().is_burstable());

    // Restoring the default picks the flagged job back up.
    dispatcher.reset_selector();
    dispatcher.run_burst().await.unwrap();
    let mut assigned = dispatcher.registry().get("p1").unwrap().assigned_jobs();
    assigned.sort();
    let mut expected = vec![small, large];
    expected.sort();
    assert_eq!(assigned, expected);
}
