//! Maps AWS SDK errors onto provider outcomes.
//!
//! Every adapter funnels service errors through [`classify`] so the rules for
//! not-found, already-exists, conflict and throttling live in one place.

use std::error::Error as StdError;
use std::fmt;

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorClass {
    NotFound,
    /// The resource exists and belongs to the caller.
    AlreadyOwned,
    /// The request conflicts with existing state (name taken, update in
    /// progress, permission already granted).
    Conflict,
    Throttled,
    Unavailable,
    Timeout,
    Other,
}

#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub class: ErrorClass,
    pub message: String,
}

impl Classified {
    pub fn is_not_found(&self) -> bool {
        self.class == ErrorClass::NotFound
    }

    /// Converts into the error the orchestrator sees, prefixed with the
    /// operation that failed.
    pub fn into_provider_error(self, operation: &str) -> ProviderError {
        let message = format!("{operation}: {}", self.message);
        match self.class {
            ErrorClass::Throttled => ProviderError::throttled(message),
            ErrorClass::Unavailable => ProviderError::unavailable(message),
            ErrorClass::Timeout => ProviderError::timeout(message),
            _ => ProviderError::rejected(message),
        }
    }
}

const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchEntity",
    "NotFound",
    "NotFoundException",
    "ResourceNotFoundException",
];

const ALREADY_OWNED_CODES: &[&str] = &["BucketAlreadyOwnedByYou", "EntityAlreadyExists"];

const CONFLICT_CODES: &[&str] = &[
    "BucketAlreadyExists",
    "ConflictException",
    "ResourceConflictException",
];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

const UNAVAILABLE_CODES: &[&str] = &[
    "InternalError",
    "InternalFailure",
    "ServiceException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
];

/// Classifies a service error code and message.
///
/// Batch reports missing and duplicate objects as a generic `ClientException`,
/// so its message text is inspected as well.
pub(crate) fn classify_code(code: Option<&str>, message: &str) -> ErrorClass {
    let Some(code) = code else {
        return ErrorClass::Other;
    };
    let lower = message.to_ascii_lowercase();

    if NOT_FOUND_CODES.contains(&code) {
        ErrorClass::NotFound
    } else if ALREADY_OWNED_CODES.contains(&code) {
        ErrorClass::AlreadyOwned
    } else if CONFLICT_CODES.contains(&code) {
        ErrorClass::Conflict
    } else if THROTTLING_CODES.contains(&code) {
        ErrorClass::Throttled
    } else if UNAVAILABLE_CODES.contains(&code) {
        ErrorClass::Unavailable
    } else if code == "ClientException" && (lower.contains("not found") || lower.contains("does not exist")) {
        ErrorClass::NotFound
    } else if code == "ClientException" && lower.contains("already exists") {
        ErrorClass::AlreadyOwned
    } else {
        ErrorClass::Other
    }
}

/// Classifies any SDK error.
pub(crate) fn classify<E, R>(err: &SdkError<E, R>) -> Classified
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            Classified {
                class: classify_code(inner.code(), inner.message().unwrap_or_default()),
                message,
            }
        }
        SdkError::TimeoutError(_) => Classified {
            class: ErrorClass::Timeout,
            message,
        },
        SdkError::DispatchFailure(failure) => Classified {
            class: if failure.is_timeout() {
                ErrorClass::Timeout
            } else {
                ErrorClass::Unavailable
            },
            message,
        },
        _ => Classified {
            class: ErrorClass::Other,
            message,
        },
    }
}

/// Classifies the error of a sent request, if any.
pub(crate) fn sdk_result<T, E, R>(
    result: Result<T, SdkError<E, R>>,
    operation: &str,
) -> Result<T, ProviderError>
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    result.map_err(|err| classify(&err).into_provider_error(operation))
}

/// Like [`sdk_result`], but a not-found error becomes `Ok(None)`.
pub(crate) fn sdk_optional<T, E, R>(
    result: Result<T, SdkError<E, R>>,
    operation: &str,
) -> Result<Option<T>, ProviderError>
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: fmt::Debug,
{
    match result {
        Ok(output) => Ok(Some(output)),
        Err(err) => {
            let classified = classify(&err);
            if classified.is_not_found() {
                Ok(None)
            } else {
                Err(classified.into_provider_error(operation))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_codes() {
        assert_eq!(classify_code(Some("NoSuchBucket"), ""), ErrorClass::NotFound);
        assert_eq!(classify_code(Some("NoSuchEntity"), ""), ErrorClass::NotFound);
        assert_eq!(
            classify_code(Some("BucketAlreadyOwnedByYou"), ""),
            ErrorClass::AlreadyOwned
        );
        assert_eq!(
            classify_code(Some("BucketAlreadyExists"), ""),
            ErrorClass::Conflict
        );
        assert_eq!(
            classify_code(Some("ResourceConflictException"), "exists"),
            ErrorClass::Conflict
        );
        assert_eq!(
            classify_code(Some("TooManyRequestsException"), ""),
            ErrorClass::Throttled
        );
        assert_eq!(classify_code(Some("ServiceException"), ""), ErrorClass::Unavailable);
        assert_eq!(classify_code(Some("AccessDenied"), ""), ErrorClass::Other);
        assert_eq!(classify_code(None, "whatever"), ErrorClass::Other);
    }

    #[test]
    fn batch_client_exceptions_are_read_from_the_message() {
        assert_eq!(
            classify_code(Some("ClientException"), "Job queue acme1_q Not Found"),
            ErrorClass::NotFound
        );
        assert_eq!(
            classify_code(Some("ClientException"), "computeEnvironment does not exist"),
            ErrorClass::NotFound
        );
        assert_eq!(
            classify_code(Some("ClientException"), "Object already exists"),
            ErrorClass::AlreadyOwned
        );
        assert_eq!(
            classify_code(Some("ClientException"), "maxvCpus must be positive"),
            ErrorClass::Other
        );
    }

    #[test]
    fn provider_error_kind_follows_class() {
        let classified = Classified {
            class: ErrorClass::Throttled,
            message: "Rate exceeded".into(),
        };
        let err = classified.into_provider_error("CreateBucket");
        assert!(err.is_retryable());
        assert_eq!(err.message, "CreateBucket: Rate exceeded");
    }
}
