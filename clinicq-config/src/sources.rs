use std::path::PathBuf;

use clinicq_core::UnassignedDoctorPolicy;
use serde::{Deserialize, Serialize};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub scheduler: FileSchedulerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

/// Durations are humantime strings such as `"30s"` or `"15m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSchedulerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_pass_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_backoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_eta_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_inflight_store_calls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_doctor_policy: Option<UnassignedDoctorPolicy>,
}

/// Environment-derived configuration values, kept raw so the loader can
/// report which variable failed to parse.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub database_url_file: Option<PathBuf>,
    pub database_max_connections: Option<String>,
    pub poll_interval: Option<String>,
    pub full_pass_interval: Option<String>,
    pub error_backoff: Option<String>,
    pub default_eta_minutes: Option<String>,
    pub max_inflight_store_calls: Option<String>,
    pub utc_offset_minutes: Option<String>,
    pub unassigned_doctor_policy: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("CLINICQ_CONFIG_PATH").map(PathBuf::from),
            database_url: non_empty_var("DATABASE_URL"),
            database_url_file: non_empty_var("DATABASE_URL_FILE")
                .map(PathBuf::from),
            database_max_connections: non_empty_var("DATABASE_MAX_CONNECTIONS"),
            poll_interval: non_empty_var("CLINICQ_POLL_INTERVAL"),
            full_pass_interval: non_empty_var("CLINICQ_FULL_PASS_INTERVAL"),
            error_backoff: non_empty_var("CLINICQ_ERROR_BACKOFF"),
            default_eta_minutes: non_empty_var("CLINICQ_DEFAULT_ETA_MINUTES"),
            max_inflight_store_calls: non_empty_var(
                "CLINICQ_MAX_INFLIGHT_STORE_CALLS",
            ),
            utc_offset_minutes: non_empty_var("CLINICQ_UTC_OFFSET_MINUTES"),
            unassigned_doctor_policy: non_empty_var(
                "CLINICQ_UNASSIGNED_DOCTOR_POLICY",
            ),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
