//! # tenantforge-store
//!
//! Persistence contracts for TenantForge.
//!
//! This crate only defines traits and errors; backends live in
//! `tenantforge-db-memory` and `tenantforge-db-postgres`.
//!
//! ```ignore
//! use tenantforge_store::{ConfigStore, StoreError};
//!
//! async fn region_of(store: &dyn ConfigStore, tenant: &TenantId) -> Result<Option<String>, StoreError> {
//!     Ok(store.get(tenant).await?.map(|config| config.region))
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StoreError};
pub use traits::{ConfigStore, DirectoryStore};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a config store.
pub type DynConfigStore = std::sync::Arc<dyn ConfigStore>;

/// Shared handle to a directory store.
pub type DynDirectoryStore = std::sync::Arc<dyn DirectoryStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ConfigStore, DirectoryStore, DynConfigStore, DynDirectoryStore, StoreError, StoreResult,
    };
}
