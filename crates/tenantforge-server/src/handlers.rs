use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tenantforge_orchestrator::TeardownOutcome;

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Query string shared by both infrastructure endpoints.
#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    #[serde(default)]
    pub client_store: String,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ready" })),
        Err(err) => {
            tracing::warn!(backend = state.store.backend_name(), error = %err, "config store not ready");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

pub async fn create_client_infrastructure(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> Result<Response, ApiError> {
    let provisioned = state.orchestrator.provision(&query.client_store).await?;
    let body = json!({
        "message": format!("Infrastructure created for '{}'", provisioned.config.tenant_id),
        "tenant": provisioned.config.tenant_id,
        "gateway_url": provisioned.gateway_url,
        "replaced": provisioned.replaced,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub async fn delete_infrastructure(
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> Result<Response, ApiError> {
    let outcome = state.orchestrator.deprovision(&query.client_store).await?;
    let status = match &outcome {
        TeardownOutcome::NotFound => StatusCode::OK,
        TeardownOutcome::Completed(report) if report.is_complete() => StatusCode::OK,
        TeardownOutcome::Completed(_) => StatusCode::MULTI_STATUS,
    };
    Ok((status, Json(outcome)).into_response())
}
