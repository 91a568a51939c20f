//! Store traits implemented by every backend.

use async_trait::async_trait;
use tenantforge_core::{TenantConfig, TenantId};

use crate::error::StoreError;

/// Persistence for per-tenant configuration records and data namespaces.
///
/// One record per tenant, keyed by tenant identifier. Implementations must be
/// thread-safe (`Send + Sync`).
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Reads the tenant's record.
    ///
    /// Returns `None` if no record exists. Errors are reserved for
    /// infrastructure problems.
    async fn get(&self, tenant: &TenantId) -> Result<Option<TenantConfig>, StoreError>;

    /// Creates or replaces the tenant's record.
    async fn upsert(&self, config: &TenantConfig) -> Result<(), StoreError>;

    /// Deletes the tenant's record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if there is nothing to delete.
    async fn delete(&self, tenant: &TenantId) -> Result<(), StoreError>;

    /// Creates the tenant's data namespace with the given collections.
    /// Creating an existing namespace is not an error.
    async fn create_namespace(
        &self,
        namespace: &str,
        collections: &[String],
    ) -> Result<(), StoreError>;

    /// Drops the tenant's data namespace and everything in it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the namespace does not exist.
    async fn drop_namespace(&self, namespace: &str) -> Result<(), StoreError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Name of the backend, used in logs.
    fn backend_name(&self) -> &'static str;
}

/// The shared directory record mapping tenant identifiers to namespaces.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn set_mapping(&self, tenant: &TenantId, namespace: &str) -> Result<(), StoreError>;

    /// Removes the tenant's entry. Removing an absent entry is not an error.
    async fn unset_mapping(&self, tenant: &TenantId) -> Result<(), StoreError>;

    async fn get_mapping(&self, tenant: &TenantId) -> Result<Option<String>, StoreError>;
}
