//! Provider error classification.

use std::fmt;

use tenantforge_core::ResourceHandle;

/// How a provider call failed, as seen by the orchestrator.
///
/// Not-found and already-exists outcomes never show up here: adapters turn
/// them into [`Deleted::AlreadyAbsent`](crate::Deleted::AlreadyAbsent) and
/// [`Created::reused`](crate::Created) respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The service refused the request.
    Rejected,
    /// The service asked us to slow down.
    Throttled,
    /// The call or a readiness wait ran out of time.
    Timeout,
    /// The service could not be reached or failed internally.
    Unavailable,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "rejected"),
            Self::Throttled => write!(f, "throttled"),
            Self::Timeout => write!(f, "timeout"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    /// A resource the failed call created and could not remove again.
    pub orphan: Option<ResourceHandle>,
}

impl ProviderError {
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            orphan: None,
        }
    }

    /// Marks `handle` as left behind by this failure; the caller owns its cleanup.
    #[must_use]
    pub fn with_orphan(mut self, handle: impl Into<ResourceHandle>) -> Self {
        self.orphan = Some(handle.into());
        self
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Rejected, message)
    }

    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Throttled, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Throttled | ProviderErrorKind::Unavailable
        )
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == ProviderErrorKind::Timeout
    }
}
