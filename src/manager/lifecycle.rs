//! Lifecycle state machine — start, stop, pause, resume.
//!
//! All four operations report their outcome as a boolean and never raise;
//! lifecycle misuse (starting a running manager, pausing a stopped one) is a
//! no-op returning `false` with a warning, not an error.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::types::{Event, ManagerState};

use super::{TaskManager, worker};

impl TaskManager {
    /// Start the background scan loop
    ///
    /// No-op returning `false` unless the manager is currently
    /// [`ManagerState::Stopped`]. Otherwise records the start time, resets
    /// the cancellation signal, transitions to `Running`, and spawns the
    /// loop as an independent task.
    pub async fn start(&self) -> bool {
        let mut worker_handle = self.worker.lock().await;
        {
            let mut shared = self.state.shared.lock().await;
            if shared.state != ManagerState::Stopped {
                tracing::warn!(
                    platform = %self.platform,
                    state = %shared.state,
                    "start ignored; manager is not stopped"
                );
                return false;
            }
            shared.state = ManagerState::Running;
            shared.stats.start_time = Some(Utc::now());
            shared.stats.last_scan_time = None;
            shared.consecutive_faults = 0;
        }

        if worker_handle.handle.take().is_some() {
            // A previous loop outlived its stop timeout; it exits on its own
            // cancelled token and is safe to detach.
            tracing::debug!(platform = %self.platform, "detached stale worker handle");
        }

        let cancel = CancellationToken::new();
        worker_handle.cancel = cancel.clone();
        worker_handle.handle = Some(tokio::spawn(worker::run(self.clone(), cancel)));

        tracing::info!(platform = %self.platform, "manager started");
        self.emit_event(Event::Started {
            platform: self.platform.as_ref().clone(),
        });
        true
    }

    /// Stop the background scan loop
    ///
    /// No-op returning `false` if already stopped. Otherwise signals
    /// cancellation, transitions to `Stopped`, and waits for the loop to
    /// exit up to the configured `stop_timeout`. Cancellation is cooperative
    /// at cycle granularity, so a slow scan can outlive the wait; the
    /// timeout is tolerated with a warning, never escalated, and the manager
    /// can be started again afterwards.
    pub async fn stop(&self) -> bool {
        let mut worker_handle = self.worker.lock().await;
        {
            let mut shared = self.state.shared.lock().await;
            if shared.state == ManagerState::Stopped {
                tracing::warn!(platform = %self.platform, "stop ignored; manager is not running");
                return false;
            }
            shared.state = ManagerState::Stopped;
        }

        worker_handle.cancel.cancel();
        self.state.pause_notify.notify_waiters();

        if let Some(handle) = worker_handle.handle.take() {
            match tokio::time::timeout(self.config.stop_timeout, handle).await {
                Ok(Ok(())) => {
                    tracing::info!(platform = %self.platform, "worker loop exited cleanly");
                }
                Ok(Err(e)) => {
                    tracing::warn!(platform = %self.platform, error = %e, "worker loop ended abnormally");
                }
                Err(_) => {
                    tracing::warn!(
                        platform = %self.platform,
                        timeout = ?self.config.stop_timeout,
                        "timed out waiting for worker loop; proceeding with stop"
                    );
                }
            }
        }

        tracing::info!(platform = %self.platform, "manager stopped");
        self.emit_event(Event::Stopped {
            platform: self.platform.as_ref().clone(),
        });
        true
    }

    /// Pause scanning without stopping the loop
    ///
    /// Legal only from `Running`. The loop keeps waking on its schedule but
    /// idles instead of scanning; an in-progress scan cycle is not
    /// interrupted, and in-flight task executions run to completion.
    pub async fn pause(&self) -> bool {
        {
            let mut shared = self.state.shared.lock().await;
            if shared.state != ManagerState::Running {
                tracing::warn!(
                    platform = %self.platform,
                    state = %shared.state,
                    "pause ignored; manager is not running"
                );
                return false;
            }
            shared.state = ManagerState::Paused;
        }
        tracing::info!(platform = %self.platform, "manager paused");
        self.emit_event(Event::Paused {
            platform: self.platform.as_ref().clone(),
        });
        true
    }

    /// Resume scanning after a pause
    ///
    /// Legal only from `Paused`. The idle loop is woken immediately rather
    /// than sleeping out its poll interval.
    pub async fn resume(&self) -> bool {
        {
            let mut shared = self.state.shared.lock().await;
            if shared.state != ManagerState::Paused {
                tracing::warn!(
                    platform = %self.platform,
                    state = %shared.state,
                    "resume ignored; manager is not paused"
                );
                return false;
            }
            shared.state = ManagerState::Running;
        }
        self.state.pause_notify.notify_one();
        tracing::info!(platform = %self.platform, "manager resumed");
        self.emit_event(Event::Resumed {
            platform: self.platform.as_ref().clone(),
        });
        true
    }
}
