//! In-memory store backend for TenantForge.
//!
//! Used by tests and local development. Records live in `dashmap` maps and
//! vanish with the process.
//!
//! # Example
//!
//! ```ignore
//! use tenantforge_db_memory::InMemoryStore;
//! use tenantforge_store::ConfigStore;
//!
//! let store = InMemoryStore::new();
//! store.upsert(&config).await?;
//! ```

pub mod storage;

pub use storage::InMemoryStore;
pub use tenantforge_store::{ConfigStore, DirectoryStore, StoreError};

/// Creates a shared in-memory store usable as both config and directory store.
pub fn create_memory_store() -> std::sync::Arc<InMemoryStore> {
    std::sync::Arc::new(InMemoryStore::new())
}
