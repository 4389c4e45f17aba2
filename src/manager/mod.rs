//! Platform task supervision split into focused submodules.
//!
//! The `TaskManager` struct and its methods are organized by domain:
//! - [`source`] - the injected platform scan/execute dependency
//! - [`lifecycle`] - start/stop/pause/resume state machine
//! - [`worker`] - the cancellable background scan loop
//! - [`status`] - snapshot and read-only query surface

mod lifecycle;
mod source;
mod status;
mod worker;


pub use source::{PendingTask, TaskSource};

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ManagerConfig;
use crate::error::Result;
use crate::types::{Event, InFlightTask, ManagerState, ManagerStats, TaskId};

/// Mutable manager state guarded by one mutex
///
/// State, statistics, and the in-flight registry share a single lock so a
/// status snapshot can never observe one of them mid-update relative to the
/// others.
pub(crate) struct Shared {
    pub(crate) state: ManagerState,
    pub(crate) stats: ManagerStats,
    pub(crate) in_flight: HashMap<TaskId, InFlightTask>,
    pub(crate) consecutive_faults: u32,
}

/// Shared-state handles cloned into the worker loop and execution tasks
#[derive(Clone)]
pub(crate) struct SharedState {
    /// Single mutex guarding state, stats, and the in-flight registry
    pub(crate) shared: Arc<tokio::sync::Mutex<Shared>>,
    /// Wakes a paused loop promptly on resume
    pub(crate) pause_notify: Arc<tokio::sync::Notify>,
    /// Concurrency ceiling for dispatched task executions
    pub(crate) dispatch_limit: Arc<tokio::sync::Semaphore>,
}

/// Cancellation signal and join handle for the current worker loop
pub(crate) struct WorkerHandle {
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    pub(crate) handle: Option<tokio::task::JoinHandle<()>>,
}

/// Supervises one platform's background scan loop (cloneable - all shared
/// fields are Arc-wrapped)
///
/// A manager is created once per platform with an injected [`TaskSource`]
/// and persists for the process lifetime. It owns the lifecycle state
/// machine, runs a cancellable loop that periodically scans for pending
/// work, tracks in-flight task IDs and aggregate statistics, and answers
/// status queries with consistent snapshots. Multiple independent instances
/// are safe to construct; there is no hidden module-level state.
#[derive(Clone)]
pub struct TaskManager {
    /// Platform name this manager supervises
    pub(crate) platform: Arc<String>,
    /// Loop and lifecycle settings
    pub(crate) config: Arc<ManagerConfig>,
    /// Injected platform scan/execute dependency
    pub(crate) source: Arc<dyn TaskSource>,
    /// Shared mutable state
    pub(crate) state: SharedState,
    /// Current worker loop handle (replaced on each start)
    pub(crate) worker: Arc<tokio::sync::Mutex<WorkerHandle>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl TaskManager {
    /// Create a manager for one platform
    ///
    /// The manager starts in [`ManagerState::Stopped`]; call
    /// [`start`](TaskManager::start) to spawn the scan loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        platform: impl Into<String>,
        config: ManagerConfig,
        source: Arc<dyn TaskSource>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(256);

        let shared = Shared {
            state: ManagerState::Stopped,
            stats: ManagerStats::default(),
            in_flight: HashMap::new(),
            consecutive_faults: 0,
        };

        let state = SharedState {
            shared: Arc::new(tokio::sync::Mutex::new(shared)),
            pause_notify: Arc::new(tokio::sync::Notify::new()),
            dispatch_limit: Arc::new(tokio::sync::Semaphore::new(config.max_concurrent_tasks)),
        };

        Ok(Self {
            platform: Arc::new(platform.into()),
            config: Arc::new(config),
            source,
            state,
            worker: Arc::new(tokio::sync::Mutex::new(WorkerHandle {
                cancel: tokio_util::sync::CancellationToken::new(),
                handle: None,
            })),
            event_tx,
        })
    }

    /// The platform name this manager supervises
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Subscribe to manager events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. Slow subscribers that fall behind the channel buffer
    /// receive a `Lagged` error and continue from the newest events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// supervision continues even when no one is listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
