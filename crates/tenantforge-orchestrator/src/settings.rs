//! Orchestrator settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantforge_core::DEFAULT_REGION;
use tenantforge_providers::{PollPolicy, secs};

/// Retries for provider `create` calls.
///
/// Only throttling and unavailability are retried; rejections never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    #[serde(with = "secs")]
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Region written into every new tenant record.
    pub region: String,
    /// Deadline for the whole forward path; exceeding it unwinds.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    /// Polling while a new resource becomes ready.
    pub ready_poll: PollPolicy,
    /// Polling while an async resource is disabled and removed.
    pub delete_poll: PollPolicy,
    pub create_retry: RetryPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            request_timeout: Duration::from_secs(900),
            ready_poll: PollPolicy::new(12, Duration::from_secs(10)),
            delete_poll: PollPolicy::new(12, Duration::from_secs(10)),
            create_retry: RetryPolicy::none(),
        }
    }
}

impl OrchestratorSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.region.trim().is_empty() {
            return Err("provisioning.region must not be empty".into());
        }
        if self.request_timeout.is_zero() {
            return Err("provisioning.request_timeout must be greater than zero".into());
        }
        for (name, poll) in [("ready_poll", self.ready_poll), ("delete_poll", self.delete_poll)] {
            if poll.attempts == 0 {
                return Err(format!("provisioning.{name}.attempts must be at least 1"));
            }
        }
        Ok(())
    }
}
