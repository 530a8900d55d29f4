use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use clinicq_core::{SchedulerConfig, UnassignedDoctorPolicy};

use super::{
    models::{Config, ConfigMetadata, DEFAULT_MAX_CONNECTIONS, DatabaseConfig},
    sources::{EnvConfig, FileConfig, FileSchedulerConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("clinicq.toml"),
        PathBuf::from("config/clinicq.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

/// Composes [`Config`] from environment variables, an optional TOML file and
/// defaults, in that order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) =
            self.compose_config(file_config, env_config, config_path, env_file_loaded)?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        debug!(path = %path.display(), "configuration file loaded");
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No clinicq.toml detected; falling back to environment variables",
                "Create clinicq.toml or pass --config to pin scheduler settings",
            );
        }

        let FileConfig {
            database: file_database,
            scheduler: file_scheduler,
        } = file_config.unwrap_or_default();

        let database = DatabaseConfig {
            url: self.resolve_database_url(&env, file_database.url.as_deref())?,
            max_connections: parse_env_value(
                "DATABASE_MAX_CONNECTIONS",
                env.database_max_connections.as_deref(),
            )?
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };

        let scheduler = compose_scheduler(&env, file_scheduler)?;

        let config = Config {
            database,
            scheduler,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }

    fn resolve_database_url(
        &self,
        env: &EnvConfig,
        file_url: Option<&str>,
    ) -> Result<Option<String>, ConfigLoadError> {
        let candidate = if let Some(url) = env.database_url.clone() {
            Some(url)
        } else if let Some(path) = env.database_url_file.as_ref() {
            Self::read_secret_file(path)?
        } else {
            file_url
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        match candidate {
            Some(raw) => {
                let parsed = Url::parse(&raw).map_err(|source| {
                    ConfigLoadError::InvalidDatabaseUrl { source }
                })?;
                if !matches!(parsed.scheme(), "postgres" | "postgresql") {
                    return Err(ConfigLoadError::UnsupportedDatabaseScheme {
                        scheme: parsed.scheme().to_string(),
                    });
                }
                Ok(Some(raw))
            }
            None => Ok(None),
        }
    }

    fn read_secret_file(
        path: &Path,
    ) -> Result<Option<String>, ConfigLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            ConfigLoadError::SecretFileIo {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn compose_scheduler(
    env: &EnvConfig,
    file: FileSchedulerConfig,
) -> Result<SchedulerConfig, ConfigLoadError> {
    let defaults = SchedulerConfig::default();

    let poll_interval = resolve_duration(
        "CLINICQ_POLL_INTERVAL",
        env.poll_interval.as_deref(),
        "scheduler.poll_interval",
        file.poll_interval.as_deref(),
    )?;
    let full_pass_interval = resolve_duration(
        "CLINICQ_FULL_PASS_INTERVAL",
        env.full_pass_interval.as_deref(),
        "scheduler.full_pass_interval",
        file.full_pass_interval.as_deref(),
    )?;
    let error_backoff = resolve_duration(
        "CLINICQ_ERROR_BACKOFF",
        env.error_backoff.as_deref(),
        "scheduler.error_backoff",
        file.error_backoff.as_deref(),
    )?;

    let unassigned_doctor_policy = match env.unassigned_doctor_policy.as_deref()
    {
        Some(raw) => parse_policy(raw)?,
        None => file
            .unassigned_doctor_policy
            .unwrap_or(defaults.unassigned_doctor_policy),
    };

    Ok(SchedulerConfig {
        poll_interval_ms: poll_interval
            .map(duration_ms)
            .unwrap_or(defaults.poll_interval_ms),
        full_pass_interval_ms: full_pass_interval
            .map(duration_ms)
            .unwrap_or(defaults.full_pass_interval_ms),
        error_backoff_ms: error_backoff
            .map(duration_ms)
            .unwrap_or(defaults.error_backoff_ms),
        default_eta_minutes: parse_env_value(
            "CLINICQ_DEFAULT_ETA_MINUTES",
            env.default_eta_minutes.as_deref(),
        )?
        .or(file.default_eta_minutes)
        .unwrap_or(defaults.default_eta_minutes),
        max_inflight_store_calls: parse_env_value(
            "CLINICQ_MAX_INFLIGHT_STORE_CALLS",
            env.max_inflight_store_calls.as_deref(),
        )?
        .or(file.max_inflight_store_calls)
        .unwrap_or(defaults.max_inflight_store_calls),
        utc_offset_minutes: parse_env_value(
            "CLINICQ_UTC_OFFSET_MINUTES",
            env.utc_offset_minutes.as_deref(),
        )?
        .or(file.utc_offset_minutes)
        .unwrap_or(defaults.utc_offset_minutes),
        unassigned_doctor_policy,
    })
}

fn resolve_duration(
    env_key: &'static str,
    env_value: Option<&str>,
    file_key: &'static str,
    file_value: Option<&str>,
) -> Result<Option<Duration>, ConfigLoadError> {
    let (key, raw) = match (env_value, file_value) {
        (Some(raw), _) => (env_key, raw),
        (None, Some(raw)) => (file_key, raw),
        (None, None) => return Ok(None),
    };
    humantime::parse_duration(raw.trim())
        .map(Some)
        .map_err(|source| ConfigLoadError::InvalidDuration {
            key,
            value: raw.to_string(),
            source,
        })
}

fn parse_env_value<T: FromStr>(
    key: &'static str,
    raw: Option<&str>,
) -> Result<Option<T>, ConfigLoadError> {
    raw.map(|value| {
        value.parse().map_err(|_| ConfigLoadError::InvalidValue {
            key,
            value: value.to_string(),
        })
    })
    .transpose()
}

fn parse_policy(raw: &str) -> Result<UnassignedDoctorPolicy, ConfigLoadError> {
    match raw.to_ascii_lowercase().replace('-', "_").as_str() {
        "first_doctor" => Ok(UnassignedDoctorPolicy::FirstDoctor),
        "least_loaded" => Ok(UnassignedDoctorPolicy::LeastLoaded),
        _ => Err(ConfigLoadError::InvalidValue {
            key: "CLINICQ_UNASSIGNED_DOCTOR_POLICY",
            value: raw.to_string(),
        }),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {key}: '{value}'")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported database scheme '{scheme}', expected postgres")]
    UnsupportedDatabaseScheme { scheme: String },
    #[error("failed to read secret file {path}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
