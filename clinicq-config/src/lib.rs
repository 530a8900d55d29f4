//! Configuration loading for the clinicq worker.
//!
//! Values come from environment variables (a `.env` file is read first when
//! present), then an optional `clinicq.toml`, then built-in defaults.

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{Config, ConfigMetadata, DatabaseConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
