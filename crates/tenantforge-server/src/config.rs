use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};
use tenantforge_db_postgres::PostgresConfig;
use tenantforge_orchestrator::{OrchestratorSettings, RetryPolicy};
use tenantforge_providers::{PollPolicy, aws::AwsSettings, secs};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Settings for the AWS adapters; the region also applies to new tenants.
    #[serde(default)]
    pub aws: AwsSettings,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.storage.backend == StorageBackend::Postgres {
            let Some(pg) = &self.storage.postgres else {
                return Err("storage.backend = \"postgres\" requires [storage.postgres]".into());
            };
            if pg.url.trim().is_empty() {
                return Err("storage.postgres.url must not be empty".into());
            }
            if pg.pool_size == 0 {
                return Err("storage.postgres.pool_size must be > 0".into());
            }
        }
        if self.provisioning.provider == ProviderBackend::Aws {
            self.aws.validate()?;
        }
        self.orchestrator_settings().validate()
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Orchestrator settings; new tenants are placed in the AWS region.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let p = &self.provisioning;
        OrchestratorSettings {
            region: self.aws.region.clone(),
            request_timeout: p.request_timeout,
            ready_poll: p.ready_poll,
            delete_poll: p.delete_poll,
            create_retry: p.create_retry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests handled at once; provisioning runs are long-lived.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_max_concurrent_requests() -> usize {
    16
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

/// Where resources are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderBackend {
    #[default]
    Aws,
    /// In-process fake cloud, for local dry runs.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    pub provider: ProviderBackend,
    /// Overall deadline for one provisioning run, in seconds.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    pub ready_poll: PollPolicy,
    pub delete_poll: PollPolicy,
    pub create_retry: RetryPolicy,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        let defaults = OrchestratorSettings::default();
        Self {
            provider: ProviderBackend::default(),
            request_timeout: defaults.request_timeout,
            ready_poll: defaults.ready_poll,
            delete_poll: defaults.delete_poll,
            create_retry: defaults.create_retry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("tenantforge.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TENANTFORGE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TENANTFORGE")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("aws.compute.subnets")
                .with_list_parse_key("aws.compute.security_group_ids"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> AppConfig {
        AppConfig {
            provisioning: ProvisioningConfig {
                provider: ProviderBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn memory_backends_need_no_cloud_settings() {
        assert_eq!(memory_config().validate(), Ok(()));
    }

    #[test]
    fn aws_backend_requires_cloud_settings() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(err.contains("aws.compute.subnets"), "{err}");
    }

    #[test]
    fn postgres_backend_requires_its_section() {
        let mut cfg = memory_config();
        cfg.storage.backend = StorageBackend::Postgres;
        assert!(cfg.validate().unwrap_err().contains("[storage.postgres]"));

        cfg.storage.postgres = Some(PostgresConfig::new("postgres://db/tenantforge"));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn orchestrator_takes_region_from_aws() {
        let mut cfg = memory_config();
        cfg.aws.region = "eu-west-1".into();
        cfg.provisioning.create_retry.max_retries = 2;

        let settings = cfg.orchestrator_settings();
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.create_retry.max_retries, 2);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = memory_config();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().unwrap_err().starts_with("logging.level"));
    }
}
