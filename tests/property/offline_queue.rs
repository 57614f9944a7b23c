//! Property tests for the offline queue.
//!
//! Invariants tested:
//! - Pruning keeps at most `max_size` jobs, all younger than `max_age`
//! - Survivors keep their relative order and are the newest ones
//! - The persisted queue never exceeds its bound

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_lifeline_offline::{
    Connectivity, Job, MemoryStore, NewJob, OfflineQueue, OfflineQueueConfig, prune,
};

const NOW: u64 = 1_700_000_000_000;

fn job(index: usize, age_ms: u64) -> Job {
    Job {
        url: format!("/jobs/{index}"),
        method: String::from("POST"),
        body: None,
        headers: BTreeMap::new(),
        timestamp: NOW - age_ms,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: prune enforces both bounds and keeps the newest in order
    #[test]
    fn prune_enforces_age_and_size(
        ages in prop::collection::vec(0u64..=200_000, 0..80),
        max_age_ms in 1u64..=150_000,
        max_size in 1usize..=40,
    ) {
        let mut jobs: Vec<Job> = ages.iter().enumerate().map(|(i, age)| job(i, *age)).collect();
        let fresh: Vec<String> = jobs
            .iter()
            .filter(|j| NOW - j.timestamp < max_age_ms)
            .map(|j| j.url.clone())
            .collect();

        let stats = prune(&mut jobs, NOW, Duration::from_millis(max_age_ms), max_size);

        prop_assert!(jobs.len() <= max_size);
        prop_assert!(jobs.iter().all(|j| NOW - j.timestamp < max_age_ms));
        prop_assert_eq!(stats.expired, ages.len() - fresh.len());
        prop_assert_eq!(stats.evicted, fresh.len().saturating_sub(max_size));

        let kept: Vec<String> = jobs.iter().map(|j| j.url.clone()).collect();
        let expected = &fresh[fresh.len().saturating_sub(max_size)..];
        prop_assert_eq!(kept.as_slice(), expected);
    }

    /// Property: enqueueing any number of jobs never exceeds the bound
    #[test]
    fn queue_size_is_bounded(
        max_size in 1usize..=20,
        enqueued in 0usize..=50,
    ) {
        let queue = OfflineQueue::new(
            OfflineQueueConfig::builder().max_queue_size(max_size).build(),
            Arc::new(MemoryStore::new()),
            tower::service_fn(|_req: http::Request<String>| async {
                Ok::<_, Infallible>(http::StatusCode::OK)
            }),
            Connectivity::offline(),
        );

        for i in 0..enqueued {
            queue.enqueue(NewJob::post(format!("/jobs/{i}")));
        }

        let pending = queue.pending_jobs();
        prop_assert_eq!(pending.len(), enqueued.min(max_size));
        if let Some(last) = pending.last() {
            prop_assert_eq!(last.url.clone(), format!("/jobs/{}", enqueued - 1));
        }
    }
}
