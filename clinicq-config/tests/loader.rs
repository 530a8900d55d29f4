use std::fs;

use clinicq_config::{ConfigLoadError, ConfigLoader};
use clinicq_core::UnassignedDoctorPolicy;
use once_cell::sync::Lazy;
use tempfile::tempdir;

static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> =
    Lazy::new(|| tokio::sync::Mutex::new(()));

const MANAGED_VARS: &[&str] = &[
    "CLINICQ_CONFIG_PATH",
    "DATABASE_URL",
    "DATABASE_URL_FILE",
    "DATABASE_MAX_CONNECTIONS",
    "CLINICQ_POLL_INTERVAL",
    "CLINICQ_FULL_PASS_INTERVAL",
    "CLINICQ_ERROR_BACKOFF",
    "CLINICQ_DEFAULT_ETA_MINUTES",
    "CLINICQ_MAX_INFLIGHT_STORE_CALLS",
    "CLINICQ_UTC_OFFSET_MINUTES",
    "CLINICQ_UNASSIGNED_DOCTOR_POLICY",
];

fn clear_env() {
    for key in MANAGED_VARS {
        unsafe { std::env::remove_var(key) };
    }
}

const SAMPLE_TOML: &str = r#"
[database]
url = "postgres://queue@localhost:5432/clinic"
max_connections = 8

[scheduler]
poll_interval = "20s"
full_pass_interval = "10m"
default_eta_minutes = 25
utc_offset_minutes = 120
unassigned_doctor_policy = "least_loaded"
"#;

#[tokio::test]
async fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");

    let load = ConfigLoader::new()
        .with_env_file(dir.path().join("missing.env"))
        .load()
        .expect("load config");

    let scheduler = &load.config.scheduler;
    assert_eq!(scheduler.poll_interval_ms, 30_000);
    assert_eq!(scheduler.full_pass_interval_ms, 900_000);
    assert_eq!(scheduler.error_backoff_ms, 10_000);
    assert_eq!(scheduler.default_eta_minutes, 30);
    assert_eq!(scheduler.max_inflight_store_calls, 4);
    assert_eq!(load.config.database.max_connections, 5);
    assert!(load.config.database.url.is_none());
    assert!(!load.config.metadata.env_file_loaded);
    assert_eq!(load.warnings.len(), 2);
}

#[tokio::test]
async fn toml_file_values_are_used() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("clinicq.toml");
    fs::write(&path, SAMPLE_TOML).expect("write toml");

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .with_env_file(dir.path().join("missing.env"))
        .load()
        .expect("load config");

    let config = load.config;
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://queue@localhost:5432/clinic")
    );
    assert_eq!(config.database.max_connections, 8);
    assert_eq!(config.scheduler.poll_interval_ms, 20_000);
    assert_eq!(config.scheduler.full_pass_interval_ms, 600_000);
    assert_eq!(config.scheduler.error_backoff_ms, 10_000);
    assert_eq!(config.scheduler.default_eta_minutes, 25);
    assert_eq!(config.scheduler.utc_offset_minutes, 120);
    assert_eq!(
        config.scheduler.unassigned_doctor_policy,
        UnassignedDoctorPolicy::LeastLoaded
    );
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(load.warnings.is_empty());
}

#[tokio::test]
async fn environment_overrides_file() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("clinicq.toml");
    fs::write(&path, SAMPLE_TOML).expect("write toml");

    unsafe {
        std::env::set_var("CLINICQ_CONFIG_PATH", &path);
        std::env::set_var("CLINICQ_POLL_INTERVAL", "5s");
        std::env::set_var("CLINICQ_UNASSIGNED_DOCTOR_POLICY", "first_doctor");
        std::env::set_var("DATABASE_URL", "postgresql://env@db/clinic");
    }

    let load = ConfigLoader::new()
        .with_env_file(dir.path().join("missing.env"))
        .load()
        .expect("load config");
    clear_env();

    let config = load.config;
    assert_eq!(config.scheduler.poll_interval_ms, 5_000);
    assert_eq!(config.scheduler.full_pass_interval_ms, 600_000);
    assert_eq!(
        config.scheduler.unassigned_doctor_policy,
        UnassignedDoctorPolicy::FirstDoctor
    );
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgresql://env@db/clinic")
    );
}

#[tokio::test]
async fn env_file_and_secret_file_are_read() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");
    let secret = dir.path().join("database_url");
    fs::write(&secret, "postgres://secret@db/clinic\n").expect("write secret");
    let env_file = dir.path().join(".env");
    fs::write(
        &env_file,
        format!(
            "DATABASE_URL_FILE={}\nCLINICQ_ERROR_BACKOFF=2s\n",
            secret.display()
        ),
    )
    .expect("write env file");

    let load = ConfigLoader::new()
        .with_env_file(&env_file)
        .load()
        .expect("load config");
    clear_env();

    assert!(load.config.metadata.env_file_loaded);
    assert_eq!(
        load.config.database.url.as_deref(),
        Some("postgres://secret@db/clinic")
    );
    assert_eq!(load.config.scheduler.error_backoff_ms, 2_000);
}

#[tokio::test]
async fn explicit_missing_file_is_an_error() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");

    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .with_env_file(dir.path().join("missing.env"))
        .load()
        .expect_err("missing config must fail");
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[tokio::test]
async fn malformed_values_are_rejected() {
    let _guard = ENV_LOCK.lock().await;
    clear_env();
    let dir = tempdir().expect("tempdir");
    let missing_env = dir.path().join("missing.env");

    unsafe { std::env::set_var("CLINICQ_FULL_PASS_INTERVAL", "every so often") };
    let err = ConfigLoader::new()
        .with_env_file(&missing_env)
        .load()
        .expect_err("bad duration");
    assert!(matches!(
        err,
        ConfigLoadError::InvalidDuration {
            key: "CLINICQ_FULL_PASS_INTERVAL",
            ..
        }
    ));
    clear_env();

    unsafe { std::env::set_var("CLINICQ_DEFAULT_ETA_MINUTES", "-3") };
    let err = ConfigLoader::new()
        .with_env_file(&missing_env)
        .load()
        .expect_err("bad number");
    assert!(matches!(err, ConfigLoadError::InvalidValue { .. }));
    clear_env();

    unsafe { std::env::set_var("CLINICQ_POLL_INTERVAL", "0s") };
    let err = ConfigLoader::new()
        .with_env_file(&missing_env)
        .load()
        .expect_err("zero poll interval");
    assert!(matches!(err, ConfigLoadError::GuardRail(_)));
    clear_env();

    unsafe { std::env::set_var("DATABASE_URL", "mysql://db/clinic") };
    let err = ConfigLoader::new()
        .with_env_file(&missing_env)
        .load()
        .expect_err("wrong scheme");
    assert!(matches!(
        err,
        ConfigLoadError::UnsupportedDatabaseScheme { .. }
    ));
    clear_env();
}
