//! Configuration types for taskfleet

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level configuration
///
/// Groups the manager loop settings and the fetch retry policy. Every field
/// has a sensible default; a zero-configuration instance works out of the box.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker loop and lifecycle settings
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Fetch retry and transport settings
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Validate all nested settings
    pub fn validate(&self) -> Result<()> {
        self.manager.validate()?;
        self.fetch.validate()
    }
}

/// Worker loop and lifecycle configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Interval between scan cycles (default: 5 seconds)
    #[serde(default = "default_scan_interval", with = "duration_serde")]
    pub scan_interval: Duration,

    /// How long a paused loop idles before re-checking state (default: 5 seconds)
    ///
    /// Resume wakes the loop immediately; this only bounds the wait when the
    /// wakeup is missed.
    #[serde(default = "default_pause_poll_interval", with = "duration_serde")]
    pub pause_poll_interval: Duration,

    /// Cooldown after a faulted scan cycle before resuming (default: 10 seconds)
    #[serde(default = "default_fault_cooldown", with = "duration_serde")]
    pub fault_cooldown: Duration,

    /// Maximum time `stop()` waits for the worker loop to exit (default: 10 seconds)
    #[serde(default = "default_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,

    /// Maximum tasks executing concurrently (default: 3)
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Consecutive faulted cycles before escalating log severity (default: 5)
    ///
    /// The loop keeps auto-recovering past this point; the threshold only
    /// marks where an outside supervisor should be paying attention.
    #[serde(default = "default_fault_alert_threshold")]
    pub fault_alert_threshold: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scan_interval: default_scan_interval(),
            pause_poll_interval: default_pause_poll_interval(),
            fault_cooldown: default_fault_cooldown(),
            stop_timeout: default_stop_timeout(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            fault_alert_threshold: default_fault_alert_threshold(),
        }
    }
}

impl ManagerConfig {
    /// Validate loop settings
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(Error::config(
                "max_concurrent_tasks",
                "must be at least 1",
            ));
        }
        if self.scan_interval.is_zero() {
            return Err(Error::config("scan_interval", "must be non-zero"));
        }
        Ok(())
    }
}

/// Fetch retry and transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum attempts per fetch, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Ceiling for the exponential inter-attempt backoff (default: 10 seconds)
    #[serde(default = "default_backoff_cap", with = "duration_serde")]
    pub backoff_cap: Duration,

    /// Per-attempt request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Fixed delay after each successful single fetch (default: none)
    ///
    /// Applied only outside batch mode; batch parallelism already amortizes
    /// inter-call latency.
    #[serde(default, with = "optional_duration_serde")]
    pub inter_call_delay: Option<Duration>,

    /// Accept invalid TLS certificates (default: true)
    ///
    /// Source platforms routinely serve media from misconfigured endpoints.
    /// Relaxed validation is an explicit trust decision here, not an
    /// incidental default. Set to false when every endpoint is known good.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_cap: default_backoff_cap(),
            request_timeout: default_request_timeout(),
            inter_call_delay: None,
            accept_invalid_certs: true,
        }
    }
}

impl FetchConfig {
    /// Validate fetch settings
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts", "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("request_timeout", "must be non-zero"));
        }
        Ok(())
    }
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_fault_cooldown() -> Duration {
    Duration::from_secs(10)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_fault_alert_threshold() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_cap() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (seconds as u64)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.manager.scan_interval, Duration::from_secs(5));
        assert_eq!(config.manager.fault_cooldown, Duration::from_secs(10));
        assert_eq!(config.manager.max_concurrent_tasks, 3);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff_cap, Duration::from_secs(10));
        assert!(config.fetch.accept_invalid_certs);
        assert!(config.fetch.inter_call_delay.is_none());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.manager.scan_interval, Duration::from_secs(5));
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"manager": {"max_concurrent_tasks": 8}, "fetch": {"max_attempts": 5, "inter_call_delay": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.manager.max_concurrent_tasks, 8);
        assert_eq!(config.manager.scan_interval, Duration::from_secs(5));
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.inter_call_delay, Some(Duration::from_secs(2)));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["manager"]["scan_interval"], 5);
        assert_eq!(json["manager"]["stop_timeout"], 10);
        assert_eq!(json["fetch"]["backoff_cap"], 10);
        assert_eq!(json["fetch"]["inter_call_delay"], serde_json::Value::Null);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = ManagerConfig {
            max_concurrent_tasks: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be at least 1"));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = FetchConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
