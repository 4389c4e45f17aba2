//! Core types for taskfleet

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a platform task
///
/// Platforms assign their own identifiers; the manager treats them as opaque
/// strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a [`TaskManager`](crate::manager::TaskManager)
///
/// Exactly one state holds at any instant. Transitions happen only via the
/// lifecycle calls (`start`/`stop`/`pause`/`resume`) or internal fault
/// handling in the worker loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    /// Not running; the initial state, and the state after `stop()`
    Stopped,
    /// Worker loop active and scanning
    Running,
    /// Worker loop active but idling without scanning
    Paused,
    /// A scan cycle faulted; the loop is in its recovery cooldown
    Error,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ManagerState::Stopped => "stopped",
            ManagerState::Running => "running",
            ManagerState::Paused => "paused",
            ManagerState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Aggregate statistics for one manager instance
///
/// Mutated only by the worker loop under the shared lock; callers always
/// receive a copy via [`StatusSnapshot`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ManagerStats {
    /// When the manager was last started (None before first start)
    pub start_time: Option<DateTime<Utc>>,
    /// Total tasks dispatched to completion (successful + failed)
    pub total_processed: u64,
    /// Tasks that completed successfully
    pub successful: u64,
    /// Tasks whose execution returned an error
    pub failed: u64,
    /// When the worker loop last began a cycle (None before first cycle)
    pub last_scan_time: Option<DateTime<Utc>>,
    /// Number of faulted scan cycles since construction
    pub error_count: u64,
}

/// Lightweight metadata for a task currently being executed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InFlightTask {
    /// The task identifier
    pub task_id: TaskId,
    /// Human-readable task name for status displays
    pub display_name: String,
    /// When the worker loop dispatched the task
    pub dispatched_at: DateTime<Utc>,
}

/// Consistent point-in-time view of a manager, taken under the shared lock
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    /// Platform name this manager supervises
    pub platform: String,
    /// Current lifecycle state
    pub state: ManagerState,
    /// Number of tasks currently executing
    pub in_flight: usize,
    /// Identifiers of tasks currently executing
    pub in_flight_ids: Vec<TaskId>,
    /// Copy of the aggregate statistics
    pub stats: ManagerStats,
    /// Seconds since `start_time`, None while stopped
    pub uptime_secs: Option<u64>,
    /// Concurrency ceiling for dispatched work
    pub max_concurrent_tasks: usize,
    /// Faulted scan cycles since the last successful one
    pub consecutive_faults: u32,
}

/// Classified cause of a failed fetch attempt
///
/// The classification, not the raw error text, drives logging and the final
/// reported cause of an exhausted fetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Certificate or transport-security failure
    Certificate,
    /// The attempt exceeded its timeout
    Timeout,
    /// TCP/DNS-level connection failure
    Connection,
    /// The server answered with a non-success HTTP status
    HttpStatus {
        /// The status code returned
        status: u16,
    },
    /// Reading the body or writing the destination file failed
    Io {
        /// The underlying I/O error text
        message: String,
    },
    /// Anything that did not match a known failure class
    Other {
        /// The underlying error text
        message: String,
    },
}

/// HTTP status codes treated as transient for logging purposes
///
/// Every failure class consumes the same retry budget; this set only marks
/// which status failures are expected to clear on their own.
pub const TRANSIENT_HTTP_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

impl FetchFailure {
    /// Whether this failure is expected to be transient
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Timeout | FetchFailure::Connection => true,
            FetchFailure::HttpStatus { status } => TRANSIENT_HTTP_STATUSES.contains(status),
            FetchFailure::Certificate | FetchFailure::Io { .. } | FetchFailure::Other { .. } => {
                false
            }
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Certificate => write!(f, "certificate validation failed"),
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Connection => write!(f, "connection failed"),
            FetchFailure::HttpStatus { status } => write!(f, "HTTP status {status}"),
            FetchFailure::Io { message } => write!(f, "I/O failure: {message}"),
            FetchFailure::Other { message } => write!(f, "{message}"),
        }
    }
}

/// Outcome of a single fetch call, immutable after return
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchResult {
    /// Whether the file was fully retrieved
    pub success: bool,
    /// Destination path the file was (or would have been) written to
    pub path: PathBuf,
    /// Human-readable name for the fetched resource
    pub display_name: String,
    /// Number of attempts consumed
    pub attempts: u32,
    /// Classified cause of the last failed attempt, None on success
    pub error: Option<FetchFailure>,
}

/// One input to a batch fetch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Source URL
    pub url: String,
    /// Local destination path
    pub destination: PathBuf,
    /// Optional display name; derived from the response or URL when absent
    pub display_name: Option<String>,
}

impl FetchRequest {
    /// Create a batch fetch input
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            display_name: None,
        }
    }

    /// Attach a display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Aggregated outcome of a batch fetch
///
/// Invariant: `success_count + failed_count == total_count == inputs.len()`.
/// Ordering within each list is completion order, not input order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchFetchResult {
    /// Number of inputs fetched successfully
    pub success_count: usize,
    /// Number of inputs that exhausted their retries
    pub failed_count: usize,
    /// Number of inputs submitted
    pub total_count: usize,
    /// Successful fetches in completion order
    pub successes: Vec<FetchResult>,
    /// Failed fetches in completion order
    pub failures: Vec<FetchResult>,
}

/// Aggregate task counts for one platform
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlatformSummary {
    /// Total tasks known to the platform store
    pub total: u64,
    /// Tasks waiting to be dispatched
    pub pending: u64,
    /// Tasks currently executing
    pub running: u64,
    /// Tasks that completed successfully
    pub succeeded: u64,
    /// Tasks that failed
    pub failed: u64,
}

/// Detailed view of one stored task for paginated listings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDetail {
    /// The task identifier
    pub task_id: TaskId,
    /// Platform-specific status string
    pub status: String,
    /// Human-readable task name
    pub display_name: String,
    /// When the task was created, if the store tracks it
    pub created_at: Option<DateTime<Utc>>,
    /// When the task last changed, if the store tracks it
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pagination metadata for listing responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Total matching rows
    pub total: u64,
    /// 1-indexed page number
    pub page: u32,
    /// Rows per page
    pub page_size: u32,
    /// Total pages (0 when there are no rows)
    pub total_pages: u64,
}

impl Pagination {
    /// Compute pagination metadata for a query result
    pub fn new(total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64)
        };
        Self {
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Response envelope returned by the manager's read surface
///
/// Mirrors the shape the API layer forwards to its own callers:
/// `{success, message, data?, pagination?}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable outcome message
    pub message: String,
    /// Payload, omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Pagination metadata for listing responses, omitted otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    /// Successful response with a payload
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            data: Some(data),
            pagination: None,
        }
    }

    /// Successful response with a payload and a custom message
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
        }
    }

    /// Successful paginated response
    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            data: Some(data),
            pagination: Some(pagination),
        }
    }

    /// Failed response with no payload
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            pagination: None,
        }
    }
}

/// Events broadcast by a manager to its subscribers
#[derive(Clone, Debug)]
pub enum Event {
    /// The manager started its worker loop
    Started {
        /// Platform name
        platform: String,
    },
    /// The manager stopped
    Stopped {
        /// Platform name
        platform: String,
    },
    /// The manager was paused
    Paused {
        /// Platform name
        platform: String,
    },
    /// The manager resumed from pause
    Resumed {
        /// Platform name
        platform: String,
    },
    /// A scan cycle completed
    ScanCompleted {
        /// Platform name
        platform: String,
        /// Tasks dispatched this cycle
        dispatched: usize,
    },
    /// A scan cycle faulted
    ScanFaulted {
        /// Platform name
        platform: String,
        /// The fault description
        error: String,
    },
    /// The manager recovered from a faulted cycle
    Recovered {
        /// Platform name
        platform: String,
    },
    /// A dispatched task finished
    TaskCompleted {
        /// Platform name
        platform: String,
        /// The task identifier
        task_id: TaskId,
        /// Whether execution succeeded
        success: bool,
    },
}
