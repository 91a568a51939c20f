//! Core types for TenantForge.
//!
//! This crate holds the pieces every other crate agrees on: validated tenant
//! identifiers, the deterministic naming policy, the per-tenant configuration
//! record and the provisioning error taxonomy.

pub mod error;
pub mod id;
pub mod naming;
pub mod resource;
pub mod tenant;

pub use error::{ErrorCategory, ProvisionError};
pub use id::{TENANT_ID_PATTERN, TenantId};
pub use resource::{ConfigField, ResourceHandle, ResourceKind};
pub use tenant::{DEFAULT_REGION, IntegrationSecrets, TenantConfig};
