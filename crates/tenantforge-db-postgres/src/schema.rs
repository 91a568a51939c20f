//! Schema management for the PostgreSQL store.
//!
//! Bookkeeping lives in the `tenantforge` schema: one table of config records
//! and one directory table holding a single `clients` row. Each tenant's data
//! namespace is its own PostgreSQL schema, named with [`TENANT_SCHEMA_PREFIX`]
//! so no tenant can address `tenantforge`, `public` or the system schemas.

use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// Schema holding the bookkeeping tables.
pub const META_SCHEMA: &str = "tenantforge";

/// Prefix of every tenant namespace schema.
pub const TENANT_SCHEMA_PREFIX: &str = "tenant_";

/// Key of the single directory row.
pub const DIRECTORY_ROW: &str = "clients";

const BOOTSTRAP: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS tenantforge",
    r#"
    CREATE TABLE IF NOT EXISTS tenantforge.tenant_config (
        tenant_id TEXT PRIMARY KEY,
        record JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenantforge.directory (
        id TEXT PRIMARY KEY,
        mapping JSONB NOT NULL DEFAULT '{}'::jsonb
    )
    "#,
];

/// Quotes an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Creates the bookkeeping schema and tables if they are missing.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in BOOTSTRAP {
        sqlx_core::query::query(statement)
            .execute(pool)
            .await
            .map_err(PostgresError::from)?;
    }
    info!(schema = META_SCHEMA, "Bookkeeping schema ready");
    Ok(())
}

/// Schema backing a tenant namespace.
pub fn tenant_schema(namespace: &str) -> String {
    format!("{TENANT_SCHEMA_PREFIX}{namespace}")
}

/// DDL creating a tenant namespace and its collection tables.
pub fn namespace_ddl(namespace: &str, collections: &[String]) -> Vec<String> {
    let schema = quote_ident(&tenant_schema(namespace));
    let mut statements = vec![format!("CREATE SCHEMA IF NOT EXISTS {schema}")];
    statements.extend(collections.iter().map(|collection| {
        format!(
            "CREATE TABLE IF NOT EXISTS {schema}.{} (\
             id TEXT PRIMARY KEY, \
             document JSONB NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT NOW())",
            quote_ident(collection)
        )
    }));
    statements
}

pub fn drop_namespace_sql(namespace: &str) -> String {
    format!("DROP SCHEMA {} CASCADE", quote_ident(&tenant_schema(namespace)))
}
