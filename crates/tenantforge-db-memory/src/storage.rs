use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tenantforge_core::{TenantConfig, TenantId};
use tenantforge_store::{ConfigStore, DirectoryStore, StoreError};
use tokio::sync::RwLock;

/// In-memory config and directory store.
///
/// Supports simple fault injection so callers can exercise their
/// store-failure paths:
/// - [`set_unavailable`](Self::set_unavailable) fails every operation
/// - [`fail_upsert_at`](Self::fail_upsert_at) fails exactly one future upsert
#[derive(Debug, Default)]
pub struct InMemoryStore {
    configs: DashMap<TenantId, TenantConfig>,
    /// namespace -> collections
    namespaces: DashMap<String, Vec<String>>,
    /// The single shared directory record.
    directory: RwLock<BTreeMap<String, String>>,
    unavailable: AtomicBool,
    upserts: AtomicU64,
    /// 1-based index of the upsert that should fail; 0 disables.
    fail_upsert: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails the `n`th upsert counted from store creation (1-based).
    pub fn fail_upsert_at(&self, n: u64) {
        self.fail_upsert.store(n, Ordering::SeqCst);
    }

    /// Number of upserts attempted so far.
    pub fn upsert_count(&self) -> u64 {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn namespace_collections(&self, namespace: &str) -> Option<Vec<String>> {
        self.namespaces.get(namespace).map(|c| c.value().clone())
    }

    pub fn record_count(&self) -> usize {
        self.configs.len()
    }

    /// Snapshot of the directory record.
    pub async fn directory_snapshot(&self) -> BTreeMap<String, String> {
        self.directory.read().await.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("in-memory store marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn get(&self, tenant: &TenantId) -> Result<Option<TenantConfig>, StoreError> {
        self.check_available()?;
        Ok(self.configs.get(tenant).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, config: &TenantConfig) -> Result<(), StoreError> {
        self.check_available()?;
        let n = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(format!("injected failure on upsert #{n}")));
        }
        self.configs.insert(config.tenant_id.clone(), config.clone());
        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), StoreError> {
        self.check_available()?;
        self.configs
            .remove(tenant)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(tenant.as_str()))
    }

    async fn create_namespace(
        &self,
        namespace: &str,
        collections: &[String],
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut entry = self.namespaces.entry(namespace.to_string()).or_default();
        for collection in collections {
            if !entry.contains(collection) {
                entry.push(collection.clone());
            }
        }
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.namespaces
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(namespace))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn set_mapping(&self, tenant: &TenantId, namespace: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.directory
            .write()
            .await
            .insert(tenant.to_string(), namespace.to_string());
        Ok(())
    }

    async fn unset_mapping(&self, tenant: &TenantId) -> Result<(), StoreError> {
        self.check_available()?;
        self.directory.write().await.remove(tenant.as_str());
        Ok(())
    }

    async fn get_mapping(&self, tenant: &TenantId) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.directory.read().await.get(tenant.as_str()).cloned())
    }
}
