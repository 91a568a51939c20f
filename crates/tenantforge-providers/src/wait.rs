//! Bounded polling for asynchronous state transitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tenantforge_core::ResourceHandle;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::types::{ResourceState, TargetState};

/// Fixed attempt count and fixed interval between describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub attempts: u32,
    #[serde(with = "secs")]
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(12, Duration::from_secs(10))
    }
}

/// Result of a bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    /// Waiting for `Ready` but the resource no longer exists.
    Vanished,
    TimedOut { last: ResourceState },
}

/// Describes the resource until it satisfies `target` or the attempts run out.
///
/// A `Failed` state ends the wait with an error.
pub async fn await_state(
    provider: &dyn ResourceProvider,
    handle: &ResourceHandle,
    target: TargetState,
    policy: PollPolicy,
) -> Result<WaitOutcome, ProviderError> {
    let attempts = policy.attempts.max(1);
    let mut last = ResourceState::Pending;

    for attempt in 1..=attempts {
        last = provider.describe(handle).await?;
        debug!(
            kind = %provider.kind(),
            handle = %handle,
            attempt,
            attempts,
            state = ?last,
            "Polled resource state"
        );

        if last.satisfies(target) {
            return Ok(WaitOutcome::Reached);
        }
        match &last {
            ResourceState::Failed(reason) => {
                return Err(ProviderError::rejected(format!(
                    "{} '{handle}' entered a failed state: {reason}",
                    provider.kind()
                )));
            }
            ResourceState::NotFound if target == TargetState::Ready => {
                return Ok(WaitOutcome::Vanished);
            }
            _ => {}
        }

        if attempt < attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Ok(WaitOutcome::TimedOut { last })
}

/// Serde helper storing durations as whole seconds.
pub mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
