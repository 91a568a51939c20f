use std::{env, fs, time::Duration};

use tenantforge_server::config::loader::load_config;
use tenantforge_server::config::{ProviderBackend, StorageBackend};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("tenantforge.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[storage]
backend = "memory"

[aws]
region = "eu-west-1"

[aws.compute]
subnets = ["subnet-1", "subnet-2"]
security_group_ids = ["sg-1"]
max_vcpus = 4

[aws.job]
image = "123456789012.dkr.ecr.eu-west-1.amazonaws.com/poster:latest"
execution_role_arn = "arn:aws:iam::123456789012:role/ecsTaskExecutionRole"

[provisioning]
provider = "aws"
request_timeout = 600

[provisioning.ready_poll]
attempts = 6
interval = 5

[provisioning.create_retry]
max_retries = 2
backoff = 3

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.storage.backend, StorageBackend::Memory);
    assert_eq!(cfg.provisioning.provider, ProviderBackend::Aws);
    assert_eq!(cfg.aws.compute.subnets, vec!["subnet-1", "subnet-2"]);
    assert_eq!(cfg.aws.stage, "prod");
    assert_eq!(cfg.logging.level, "debug");

    let settings = cfg.orchestrator_settings();
    assert_eq!(settings.region, "eu-west-1");
    assert_eq!(settings.request_timeout, Duration::from_secs(600));
    assert_eq!(settings.ready_poll.attempts, 6);
    assert_eq!(settings.ready_poll.interval, Duration::from_secs(5));
    assert_eq!(settings.delete_poll.attempts, 12);
    assert_eq!(settings.create_retry.max_retries, 2);
    assert_eq!(settings.create_retry.backoff, Duration::from_secs(3));

    // 2) Env overrides win over the file
    unsafe {
        env::set_var("TENANTFORGE__PROVISIONING__CREATE_RETRY__MAX_RETRIES", "5");
        env::set_var("TENANTFORGE__AWS__COMPUTE__SUBNETS", "subnet-a,subnet-b,subnet-c");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.provisioning.create_retry.max_retries, 5);
    assert_eq!(cfg_env.aws.compute.subnets.len(), 3);
    unsafe {
        env::remove_var("TENANTFORGE__PROVISIONING__CREATE_RETRY__MAX_RETRIES");
        env::remove_var("TENANTFORGE__AWS__COMPUTE__SUBNETS");
    }

    // 3) AWS provider without network settings is rejected
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[provisioning]
provider = "aws"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("aws.compute.subnets"), "{err}");

    // 4) Postgres backend needs its section
    let pg_path = dir.path().join("postgres.toml");
    let pg_toml = r#"
[storage]
backend = "postgres"

[provisioning]
provider = "memory"
"#;
    fs::write(&pg_path, pg_toml).expect("write postgres toml");
    let err = load_config(pg_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("[storage.postgres]"), "{err}");

    fs::write(
        &pg_path,
        format!("{pg_toml}\n[storage.postgres]\nurl = \"postgres://db/tenantforge\"\npool_size = 3\n"),
    )
    .expect("write postgres toml");
    let cfg = load_config(pg_path.to_str()).expect("postgres config");
    let pg = cfg.storage.postgres.expect("postgres section");
    assert_eq!(pg.pool_size, 3);
    assert!(pg.ensure_schema);
}
