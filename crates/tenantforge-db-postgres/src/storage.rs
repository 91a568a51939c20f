//! [`ConfigStore`] and [`DirectoryStore`] on top of PostgreSQL.

use std::time::Duration;

use async_trait::async_trait;
use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tenantforge_core::{TenantConfig, TenantId};
use tenantforge_store::{ConfigStore, DirectoryStore, StoreError};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PG_INVALID_SCHEMA_NAME, PostgresError, Result, has_pg_error_code};
use crate::schema;
use crate::schema::DIRECTORY_ROW;

/// PostgreSQL-backed store.
///
/// Config records are stored as JSONB keyed by tenant identifier.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool and, if configured, bootstraps the bookkeeping schema.
    #[instrument(name = "postgres.connect", skip(config), fields(url = %config.redacted_url()))]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(PostgresError::config("pool_size must be greater than zero"));
        }

        let mut options = PoolOptions::<Postgres>::new()
            .max_connections(config.pool_size)
            .min_connections(1)
            .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));
        if let Some(idle) = config.idle_timeout_ms {
            options = options.idle_timeout(Duration::from_millis(idle));
        }
        let pool = options.connect(&config.url).await?;
        info!(pool_size = config.pool_size, "Connected to PostgreSQL");

        if config.ensure_schema {
            schema::ensure_schema(&pool).await?;
        }
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, tenant: &TenantId) -> Result<Option<TenantConfig>> {
        let row: Option<(serde_json::Value,)> = sqlx_core::query_as::query_as(
            "SELECT record FROM tenantforge.tenant_config WHERE tenant_id = $1",
        )
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(record,)| serde_json::from_value(record).map_err(PostgresError::from))
            .transpose()
    }

    async fn store(&self, config: &TenantConfig) -> Result<()> {
        let record = serde_json::to_value(config)?;
        sqlx_core::query::query(
            "INSERT INTO tenantforge.tenant_config (tenant_id, record, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (tenant_id) DO UPDATE
             SET record = EXCLUDED.record, updated_at = NOW()",
        )
        .bind(config.tenant_id.as_str())
        .bind(record)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for PostgresStore {
    #[instrument(skip(self), fields(tenant = %tenant))]
    async fn get(&self, tenant: &TenantId) -> std::result::Result<Option<TenantConfig>, StoreError> {
        Ok(self.fetch(tenant).await?)
    }

    #[instrument(skip(self, config), fields(tenant = %config.tenant_id))]
    async fn upsert(&self, config: &TenantConfig) -> std::result::Result<(), StoreError> {
        self.store(config).await?;
        debug!("Config record stored");
        Ok(())
    }

    #[instrument(skip(self), fields(tenant = %tenant))]
    async fn delete(&self, tenant: &TenantId) -> std::result::Result<(), StoreError> {
        let result = sqlx_core::query::query(
            "DELETE FROM tenantforge.tenant_config WHERE tenant_id = $1",
        )
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(tenant.as_str()));
        }
        Ok(())
    }

    #[instrument(skip(self, collections))]
    async fn create_namespace(
        &self,
        namespace: &str,
        collections: &[String],
    ) -> std::result::Result<(), StoreError> {
        for statement in schema::namespace_ddl(namespace, collections) {
            sqlx_core::query::query(&statement)
                .execute(&self.pool)
                .await
                .map_err(PostgresError::from)?;
        }
        info!(
            namespace,
            schema = %schema::tenant_schema(namespace),
            collections = collections.len(),
            "Namespace created"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn drop_namespace(&self, namespace: &str) -> std::result::Result<(), StoreError> {
        let sql = schema::drop_namespace_sql(namespace);
        match sqlx_core::query::query(&sql).execute(&self.pool).await {
            Ok(_) => {}
            Err(e) if has_pg_error_code(&e, PG_INVALID_SCHEMA_NAME) => {
                return Err(StoreError::not_found(namespace));
            }
            Err(e) => return Err(PostgresError::from(e).into()),
        }
        info!(namespace, schema = %schema::tenant_schema(namespace), "Namespace dropped");
        Ok(())
    }

    async fn ping(&self) -> std::result::Result<(), StoreError> {
        sqlx_core::query::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(PostgresError::from)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl DirectoryStore for PostgresStore {
    #[instrument(skip(self), fields(tenant = %tenant))]
    async fn set_mapping(
        &self,
        tenant: &TenantId,
        namespace: &str,
    ) -> std::result::Result<(), StoreError> {
        sqlx_core::query::query(
            "INSERT INTO tenantforge.directory (id, mapping)
             VALUES ($1, jsonb_build_object($2::text, $3::text))
             ON CONFLICT (id) DO UPDATE
             SET mapping = tenantforge.directory.mapping || EXCLUDED.mapping",
        )
        .bind(DIRECTORY_ROW)
        .bind(tenant.as_str())
        .bind(namespace)
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant = %tenant))]
    async fn unset_mapping(&self, tenant: &TenantId) -> std::result::Result<(), StoreError> {
        sqlx_core::query::query(
            "UPDATE tenantforge.directory SET mapping = mapping - $2::text WHERE id = $1",
        )
        .bind(DIRECTORY_ROW)
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await
        .map_err(PostgresError::from)?;
        Ok(())
    }

    async fn get_mapping(&self, tenant: &TenantId) -> std::result::Result<Option<String>, StoreError> {
        let row: Option<(Option<String>,)> = sqlx_core::query_as::query_as(
            "SELECT mapping ->> $2::text FROM tenantforge.directory WHERE id = $1",
        )
        .bind(DIRECTORY_ROW)
        .bind(tenant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(row.and_then(|(namespace,)| namespace))
    }
}
