//! Deterministic resource names derived from a tenant identifier.
//!
//! Every function here is pure: provisioning and teardown must compute exactly
//! the same names for the same tenant.

use thiserror::Error;

use crate::id::TenantId;

pub fn namespace(tenant: &TenantId) -> String {
    tenant.as_str().to_string()
}

pub fn product_collection(tenant: &TenantId) -> String {
    format!("{tenant}_Shopify_Product")
}

pub fn logs_collection(tenant: &TenantId) -> String {
    format!("{tenant}_Shopify_Logs")
}

pub fn bucket(tenant: &TenantId) -> String {
    format!("{tenant}-bucket")
}

pub fn compute_environment(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_compute_environment")
}

pub fn job_queue(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_job_queue")
}

pub fn job_definition(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_job_definition")
}

pub fn job(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_job")
}

pub fn function(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_lambda_function")
}

pub fn role(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_role")
}

/// Name of the inline policy attached to an execution role.
pub fn role_policy(role_name: &str) -> String {
    format!("{role_name}-policy")
}

pub fn gateway(tenant: &TenantId) -> String {
    format!("{tenant}_shopify_api")
}

/// Reasons a bucket name is rejected by object storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketNameError {
    #[error("bucket name must be between 3 and 63 characters long, got {0}")]
    Length(usize),

    #[error("bucket name may only contain lowercase letters, numbers, hyphens and periods")]
    Charset,

    #[error("bucket name must not start or end with a period or hyphen")]
    Edge,

    #[error("bucket name must not contain consecutive periods")]
    ConsecutivePeriods,
}

/// Checks a bucket name against the object-storage naming rules.
pub fn validate_bucket_name(name: &str) -> Result<(), BucketNameError> {
    let len = name.len();
    if !(3..=63).contains(&len) {
        return Err(BucketNameError::Length(len));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(BucketNameError::Charset);
    }
    let edge = |c: char| c == '.' || c == '-';
    if name.starts_with(edge) || name.ends_with(edge) {
        return Err(BucketNameError::Edge);
    }
    if name.contains("..") {
        return Err(BucketNameError::ConsecutivePeriods);
    }
    Ok(())
}
