//! Store error types.

use std::fmt;

/// Errors that can occur while reading or writing tenant records.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Record not found: {key}")]
    NotFound {
        /// Key of the missing record.
        key: String,
    },

    /// The backing store cannot be reached.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the connection problem.
        message: String,
    },

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the encoding problem.
        message: String,
    },

    /// An internal store error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the store could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of store errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Infrastructure,
    Serialization,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Serialization => write!(f, "serialization"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
