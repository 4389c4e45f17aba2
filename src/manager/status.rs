//! Snapshot and read-only query surface.

use chrono::Utc;

use crate::types::{
    ApiResponse, ManagerState, Pagination, PlatformSummary, StatusSnapshot, TaskDetail,
};

use super::TaskManager;

/// Upper bound on rows per page for task listings
const MAX_PAGE_SIZE: u32 = 100;

impl TaskManager {
    /// Take a consistent snapshot of the manager
    ///
    /// State, in-flight IDs, and statistics are read under the single shared
    /// lock, so the snapshot can never observe a stats update mid-write.
    pub async fn get_status(&self) -> StatusSnapshot {
        let shared = self.state.shared.lock().await;

        let uptime_secs = match (shared.state, shared.stats.start_time) {
            (ManagerState::Stopped, _) | (_, None) => None,
            (_, Some(start)) => Some((Utc::now() - start).num_seconds().max(0) as u64),
        };

        let mut in_flight_ids: Vec<_> = shared.in_flight.keys().cloned().collect();
        in_flight_ids.sort();

        StatusSnapshot {
            platform: self.platform.as_ref().clone(),
            state: shared.state,
            in_flight: shared.in_flight.len(),
            in_flight_ids,
            stats: shared.stats.clone(),
            uptime_secs,
            max_concurrent_tasks: self.config.max_concurrent_tasks,
            consecutive_faults: shared.consecutive_faults,
        }
    }

    /// Aggregate task counts from the platform store
    ///
    /// A failing store query is logged and answered with the well-formed
    /// empty summary; it never propagates to the caller.
    pub async fn get_summary(&self) -> ApiResponse<PlatformSummary> {
        match self.source.summary().await {
            Ok(summary) => ApiResponse::ok(summary),
            Err(e) => {
                tracing::warn!(
                    platform = %self.platform,
                    error = %e,
                    "summary query failed; returning empty summary"
                );
                ApiResponse::ok_with_message(PlatformSummary::default(), "summary unavailable")
            }
        }
    }

    /// One page of stored tasks, optionally filtered by status
    ///
    /// `page` is 1-indexed and clamped to at least 1; `page_size` is clamped
    /// to `1..=100`. A failing store query is logged and answered with a
    /// well-formed empty page.
    pub async fn get_detailed_tasks(
        &self,
        status: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> ApiResponse<Vec<TaskDetail>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        match self.source.detailed_tasks(status, page, page_size).await {
            Ok((tasks, total)) => {
                ApiResponse::paginated(tasks, Pagination::new(total, page, page_size))
            }
            Err(e) => {
                tracing::warn!(
                    platform = %self.platform,
                    error = %e,
                    "task listing query failed; returning empty page"
                );
                let mut response =
                    ApiResponse::paginated(Vec::new(), Pagination::new(0, page, page_size));
                response.message = "task listing unavailable".to_string();
                response
            }
        }
    }
}
