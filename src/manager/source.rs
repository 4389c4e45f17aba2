//! Injected platform dependency for scanning, executing, and querying tasks.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PlatformSummary, TaskDetail, TaskId};

/// One pending unit of work surfaced by a scan
#[derive(Clone, Debug)]
pub struct PendingTask {
    /// The platform task identifier
    pub id: TaskId,
    /// Human-readable task name for status displays
    pub display_name: String,
}

impl PendingTask {
    /// Create a pending task
    pub fn new(id: impl Into<TaskId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Platform-specific scan/execute/query logic injected into a
/// [`TaskManager`](super::TaskManager)
///
/// The manager owns scheduling, concurrency, fault recovery, and statistics;
/// implementations own what a task *is*. How a job is submitted or rendered
/// is entirely up to the implementation; typically it materializes outputs
/// through [`RetryingFetcher`](crate::fetch::RetryingFetcher) or
/// [`BatchFetchCoordinator`](crate::fetch::BatchFetchCoordinator).
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Return up to `limit` pending tasks ready for dispatch
    ///
    /// `limit` is the number of free execution slots this cycle; returning
    /// more than `limit` tasks is tolerated but the excess is dropped until
    /// a later scan rediscovers it.
    async fn scan_pending(&self, limit: usize) -> Result<Vec<PendingTask>>;

    /// Execute one task to completion
    ///
    /// `Ok` counts as successful, `Err` as failed; either way the manager
    /// records the completion and frees the slot.
    async fn execute(&self, task: &PendingTask) -> Result<()>;

    /// Aggregate task counts for this platform's store
    async fn summary(&self) -> Result<PlatformSummary> {
        Ok(PlatformSummary::default())
    }

    /// One page of stored tasks plus the total matching row count
    async fn detailed_tasks(
        &self,
        status: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<TaskDetail>, u64)> {
        let _ = (status, page, page_size);
        Ok((Vec::new(), 0))
    }
}
