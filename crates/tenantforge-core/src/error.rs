//! Error taxonomy for provisioning and teardown.

use std::fmt;

use crate::resource::ResourceKind;

/// Errors surfaced by the provisioning orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// The tenant identifier violates the naming policy.
    #[error("Invalid tenant identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: String,
    },

    /// A provider rejected or failed a create call.
    #[error("Failed to create {kind}: {message}")]
    ProviderCreateFailed { kind: ResourceKind, message: String },

    /// A create call or readiness wait exceeded its time budget.
    #[error("Timed out provisioning {kind}: {message}")]
    ProviderTimeout { kind: ResourceKind, message: String },

    /// A provider rejected or failed a delete call.
    #[error("Failed to delete {kind} '{handle}': {message}")]
    ProviderDeleteFailed {
        kind: ResourceKind,
        handle: String,
        message: String,
    },

    /// The configuration record could not be read or written.
    #[error("Config store unavailable: {message}")]
    ConfigStoreUnavailable { message: String },

    /// No configuration record exists for the tenant.
    #[error("No configuration found for tenant '{tenant}'")]
    NotFound { tenant: String },
}

impl ProvisionError {
    #[must_use]
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn create_failed(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::ProviderCreateFailed {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn delete_failed(
        kind: ResourceKind,
        handle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ProviderDeleteFailed {
            kind,
            handle: handle.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::ConfigStoreUnavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(tenant: impl Into<String>) -> Self {
        Self::NotFound {
            tenant: tenant.into(),
        }
    }

    #[must_use]
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(self, Self::InvalidIdentifier { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProviderTimeout { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The resource kind the error concerns, if any.
    #[must_use]
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::ProviderCreateFailed { kind, .. }
            | Self::ProviderTimeout { kind, .. }
            | Self::ProviderDeleteFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns the error category for logging and response mapping.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidIdentifier { .. } => ErrorCategory::Validation,
            Self::ProviderCreateFailed { .. } | Self::ProviderDeleteFailed { .. } => {
                ErrorCategory::Provider
            }
            Self::ProviderTimeout { .. } => ErrorCategory::Timeout,
            Self::ConfigStoreUnavailable { .. } => ErrorCategory::Storage,
            Self::NotFound { .. } => ErrorCategory::NotFound,
        }
    }
}

/// Categories of provisioning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Provider,
    Timeout,
    Storage,
    NotFound,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Provider => write!(f, "provider"),
            Self::Timeout => write!(f, "timeout"),
            Self::Storage => write!(f, "storage"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}
