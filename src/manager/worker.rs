//! The cancellable background scan loop.
//!
//! One loop runs per started manager. Each cycle records the scan time,
//! honors pause, performs one scan-and-dispatch step, and idles until the
//! next cycle. A faulted cycle counts the error, parks the manager in
//! `Error` for a cooldown, then transitions back to `Running` on its own;
//! a single bad cycle never requires manual intervention.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::types::{Event, InFlightTask, ManagerState};

use super::{PendingTask, TaskManager};

/// Run the scan loop until cancellation is signaled
pub(crate) async fn run(manager: TaskManager, cancel: CancellationToken) {
    tracing::info!(platform = %manager.platform, "scan loop started");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        // Register the resume wakeup before reading state so a resume racing
        // this check is never missed.
        let resumed = manager.state.pause_notify.notified();

        let state = {
            let mut shared = manager.state.shared.lock().await;
            shared.stats.last_scan_time = Some(Utc::now());
            shared.state
        };

        match state {
            ManagerState::Stopped => break,
            ManagerState::Paused => {
                tokio::select! {
                    _ = resumed => {}
                    _ = tokio::time::sleep(manager.config.pause_poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
                continue;
            }
            ManagerState::Running | ManagerState::Error => {}
        }
        drop(resumed);

        match manager.scan_cycle().await {
            Ok(dispatched) => {
                {
                    let mut shared = manager.state.shared.lock().await;
                    shared.consecutive_faults = 0;
                }
                manager.emit_event(Event::ScanCompleted {
                    platform: manager.platform.as_ref().clone(),
                    dispatched,
                });
            }
            Err(e) => {
                let faults = {
                    let mut shared = manager.state.shared.lock().await;
                    shared.stats.error_count += 1;
                    shared.consecutive_faults += 1;
                    if shared.state == ManagerState::Running {
                        shared.state = ManagerState::Error;
                    }
                    shared.consecutive_faults
                };
                manager.emit_event(Event::ScanFaulted {
                    platform: manager.platform.as_ref().clone(),
                    error: e.to_string(),
                });

                if faults >= manager.config.fault_alert_threshold {
                    tracing::error!(
                        platform = %manager.platform,
                        error = %e,
                        consecutive_faults = faults,
                        "scan cycle keeps faulting; supervisor attention needed"
                    );
                } else {
                    tracing::warn!(
                        platform = %manager.platform,
                        error = %e,
                        consecutive_faults = faults,
                        cooldown = ?manager.config.fault_cooldown,
                        "scan cycle faulted; cooling down"
                    );
                }

                tokio::select! {
                    _ = tokio::time::sleep(manager.config.fault_cooldown) => {}
                    _ = cancel.cancelled() => break,
                }

                {
                    let mut shared = manager.state.shared.lock().await;
                    // stop() may have intervened during the cooldown
                    if shared.state == ManagerState::Error {
                        shared.state = ManagerState::Running;
                    }
                }
                manager.emit_event(Event::Recovered {
                    platform: manager.platform.as_ref().clone(),
                });
                continue;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(manager.config.scan_interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!(platform = %manager.platform, "scan loop stopped");
}

impl TaskManager {
    /// One scan-and-dispatch step
    ///
    /// Scans for at most as many tasks as there are free execution slots and
    /// spawns each under the concurrency semaphore. Returns the number of
    /// tasks dispatched.
    pub(crate) async fn scan_cycle(&self) -> crate::error::Result<usize> {
        let free_slots = {
            let shared = self.state.shared.lock().await;
            self.config
                .max_concurrent_tasks
                .saturating_sub(shared.in_flight.len())
        };
        if free_slots == 0 {
            tracing::debug!(platform = %self.platform, "all task slots busy; skipping scan");
            return Ok(0);
        }

        let pending = self.source.scan_pending(free_slots).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let mut dispatched = 0usize;
        for task in pending.into_iter().take(free_slots) {
            {
                let mut shared = self.state.shared.lock().await;
                if shared.in_flight.contains_key(&task.id) {
                    tracing::debug!(
                        platform = %self.platform,
                        task_id = %task.id,
                        "task already in flight; skipping"
                    );
                    continue;
                }
                shared.in_flight.insert(
                    task.id.clone(),
                    InFlightTask {
                        task_id: task.id.clone(),
                        display_name: task.display_name.clone(),
                        dispatched_at: Utc::now(),
                    },
                );
            }

            let Ok(permit) = self.state.dispatch_limit.clone().acquire_owned().await else {
                // Semaphore closure only happens at teardown
                let mut shared = self.state.shared.lock().await;
                shared.in_flight.remove(&task.id);
                break;
            };

            let manager = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                manager.execute_task(task).await;
            });
            dispatched += 1;
        }

        if dispatched > 0 {
            tracing::debug!(platform = %self.platform, dispatched, "scan cycle dispatched tasks");
        }
        Ok(dispatched)
    }

    /// Execute one dispatched task and record its completion
    async fn execute_task(&self, task: PendingTask) {
        tracing::debug!(platform = %self.platform, task_id = %task.id, "executing task");
        let result = self.source.execute(&task).await;
        let success = result.is_ok();
        if let Err(e) = &result {
            tracing::warn!(
                platform = %self.platform,
                task_id = %task.id,
                error = %e,
                "task execution failed"
            );
        }

        {
            let mut shared = self.state.shared.lock().await;
            shared.in_flight.remove(&task.id);
            shared.stats.total_processed += 1;
            if success {
                shared.stats.successful += 1;
            } else {
                shared.stats.failed += 1;
            }
        }

        self.emit_event(Event::TaskCompleted {
            platform: self.platform.as_ref().clone(),
            task_id: task.id,
            success,
        });
    }
}
