//! Mapping of provisioning results onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tenantforge_core::{ErrorCategory, ProvisionError};
use tenantforge_orchestrator::ProvisionFailure;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Rejected before any resource was touched.
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    /// A provisioning run that was unwound.
    #[error(transparent)]
    Failure(#[from] Box<ProvisionFailure>),
}

impl From<ProvisionFailure> for ApiError {
    fn from(failure: ProvisionFailure) -> Self {
        Self::Failure(Box::new(failure))
    }
}

impl ApiError {
    fn cause(&self) -> &ProvisionError {
        match self {
            Self::Provision(err) => err,
            Self::Failure(failure) => &failure.cause,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.cause().category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Storage => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Provider | ErrorCategory::Timeout => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> Value {
        let cause = self.cause();
        let error = json!({
            "category": cause.category().to_string(),
            "kind": cause.kind(),
            "message": cause.to_string(),
        });
        match self {
            Self::Provision(_) => json!({ "error": error }),
            Self::Failure(failure) => json!({
                "error": error,
                "failed_step": failure.failed_step,
                "compensations": failure.compensations,
                "cleanup_errors": failure.cleanup_errors,
                "fully_compensated": failure.fully_compensated(),
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
