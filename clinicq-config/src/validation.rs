use thiserror::Error;

use super::models::Config;

/// Longest offset chrono accepts for a fixed-offset time zone.
const MAX_UTC_OFFSET_MINUTES: i32 = 24 * 60 - 1;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("utc offset of {minutes} minutes is outside +/-1439")]
    UtcOffsetOutOfRange { minutes: i32 },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let scheduler = &config.scheduler;

    if scheduler.poll_interval_ms == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "scheduler.poll_interval",
        });
    }
    if scheduler.full_pass_interval_ms == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "scheduler.full_pass_interval",
        });
    }
    if scheduler.default_eta_minutes == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "scheduler.default_eta_minutes",
        });
    }
    if config.database.max_connections == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "database.max_connections",
        });
    }
    if scheduler.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(ConfigGuardRailError::UtcOffsetOutOfRange {
            minutes: scheduler.utc_offset_minutes,
        });
    }

    if scheduler.full_pass_interval_ms < scheduler.poll_interval_ms {
        warnings.push_with_hint(
            "full pass interval is shorter than the poll interval; every tick will run a full pass",
            "Raise CLINICQ_FULL_PASS_INTERVAL or lower CLINICQ_POLL_INTERVAL",
        );
    }

    if scheduler.max_inflight_store_calls == 0 {
        warnings.push(
            "max_inflight_store_calls is 0; the worker will allow one store call at a time",
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured",
            "Set DATABASE_URL, DATABASE_URL_FILE or database.url in clinicq.toml",
        );
    }

    Ok(warnings)
}
