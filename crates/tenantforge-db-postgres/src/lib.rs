//! PostgreSQL store backend for TenantForge.
//!
//! Implements [`ConfigStore`](tenantforge_store::ConfigStore) and
//! [`DirectoryStore`](tenantforge_store::DirectoryStore) with sqlx.
//!
//! # Example
//!
//! ```ignore
//! use tenantforge_db_postgres::{PostgresConfig, PostgresStore};
//!
//! let store = PostgresStore::connect(&PostgresConfig::new("postgres://localhost/tenantforge")).await?;
//! ```

pub mod config;
pub mod error;
pub mod schema;
pub mod storage;

pub use config::PostgresConfig;
pub use error::{PostgresError, Result};
pub use storage::PostgresStore;
