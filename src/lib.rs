//! # taskfleet
//!
//! Backend library for supervising per-platform background task runners with
//! resilient media retrieval.
//!
//! ## Design Philosophy
//!
//! taskfleet is designed to be:
//! - **Injected, not global** - every manager holds its own scan/execute
//!   dependency; multiple instances coexist safely
//! - **Self-healing** - a faulted scan cycle is counted, cooled down, and
//!   recovered from automatically
//! - **Result-first** - lifecycle misuse and exhausted downloads are reported
//!   as structured results, never raised across component boundaries
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskfleet::{ManagerConfig, PendingTask, TaskManager, TaskSource};
//!
//! struct DemoSource;
//!
//! #[async_trait::async_trait]
//! impl TaskSource for DemoSource {
//!     async fn scan_pending(&self, _limit: usize) -> taskfleet::Result<Vec<PendingTask>> {
//!         Ok(vec![])
//!     }
//!
//!     async fn execute(&self, _task: &PendingTask) -> taskfleet::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TaskManager::new("demo", ManagerConfig::default(), Arc::new(DemoSource))?;
//!     manager.start().await;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     taskfleet::run_with_shutdown(manager).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Resilient media retrieval (decomposed into focused submodules)
pub mod fetch;
/// Task manager lifecycle and worker loop (decomposed into focused submodules)
pub mod manager;
/// Platform session credentials
pub mod session;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, FetchConfig, ManagerConfig};
pub use error::{Error, Result};
pub use fetch::{BatchFetchCoordinator, RetryingFetcher};
pub use manager::{PendingTask, TaskManager, TaskSource};
pub use session::{LoginResponse, LoginStatus, SessionArtifact};
pub use types::{
    ApiResponse, BatchFetchResult, Event, FetchFailure, FetchRequest, FetchResult, InFlightTask,
    ManagerState, ManagerStats, Pagination, PlatformSummary, StatusSnapshot, TaskDetail, TaskId,
};

/// Helper function to run a manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `stop()`
/// method, returning its result.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskfleet::{ManagerConfig, TaskManager, run_with_shutdown};
/// # struct S;
/// # #[async_trait::async_trait]
/// # impl taskfleet::TaskSource for S {
/// #     async fn scan_pending(&self, _l: usize) -> taskfleet::Result<Vec<taskfleet::PendingTask>> { Ok(vec![]) }
/// #     async fn execute(&self, _t: &taskfleet::PendingTask) -> taskfleet::Result<()> { Ok(()) }
/// # }
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = TaskManager::new("demo", ManagerConfig::default(), Arc::new(S))?;
///     manager.start().await;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: TaskManager) -> bool {
    wait_for_signal().await;
    manager.stop().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal handlers may fail to register in restricted environments
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
