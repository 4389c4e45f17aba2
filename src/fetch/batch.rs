//! Bounded-parallel retrieval of many resources
//!
//! The coordinator fans a list of fetch inputs out over a worker pool capped
//! by a semaphore, waits for every unit to finish, and aggregates the
//! per-input outcomes. One input exhausting its retries is one failed entry
//! among possibly many successes; it never aborts the batch.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::types::{BatchFetchResult, FetchFailure, FetchRequest, FetchResult};

use super::RetryingFetcher;

/// Coordinates many [`RetryingFetcher`] calls under a worker cap
#[derive(Clone)]
pub struct BatchFetchCoordinator {
    fetcher: Arc<RetryingFetcher>,
}

impl BatchFetchCoordinator {
    /// Create a coordinator around a shared fetcher
    pub fn new(fetcher: Arc<RetryingFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch every input concurrently, capped at `max_workers` in flight
    ///
    /// Inputs are admitted to the pool in submission order; results are
    /// collected in completion order. The call returns only once every
    /// submitted unit has finished; there is no partial or streaming result.
    /// Inter-call pacing is disabled for batch fetches since the parallelism
    /// already amortizes latency.
    pub async fn fetch_batch(
        &self,
        items: Vec<FetchRequest>,
        max_workers: usize,
    ) -> BatchFetchResult {
        let total_count = items.len();
        if total_count == 0 {
            return BatchFetchResult::default();
        }

        let limit = Arc::new(Semaphore::new(max_workers.max(1)));
        let mut workers = JoinSet::new();

        tracing::info!(
            total = total_count,
            max_workers = max_workers.max(1),
            "starting batch fetch"
        );

        for request in items {
            let fetcher = Arc::clone(&self.fetcher);
            let limit = Arc::clone(&limit);
            workers.spawn(async move {
                // The semaphore is never closed while workers hold it, so a
                // failed acquire can only mean teardown, so proceed unthrottled.
                let _permit = limit.acquire_owned().await.ok();
                fetcher
                    .fetch_with_policy(
                        &request.url,
                        &request.destination,
                        request.display_name.as_deref(),
                        false,
                    )
                    .await
            });
        }

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(result) => {
                    if result.success {
                        successes.push(result);
                    } else {
                        failures.push(result);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "batch fetch worker did not complete");
                    failures.push(FetchResult {
                        success: false,
                        path: std::path::PathBuf::new(),
                        display_name: "unknown".to_string(),
                        attempts: 0,
                        error: Some(FetchFailure::Other {
                            message: format!("worker did not complete: {e}"),
                        }),
                    });
                }
            }
        }

        let result = BatchFetchResult {
            success_count: successes.len(),
            failed_count: failures.len(),
            total_count,
            successes,
            failures,
        };
        tracing::info!(
            total = result.total_count,
            succeeded = result.success_count,
            failed = result.failed_count,
            "batch fetch complete"
        );
        result
    }
}
