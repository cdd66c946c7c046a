//! Configuration loading and credential resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Hosted store endpoint variable
pub const STORE_URL_ENV: &str = "SUPABASE_URL";
/// Hosted store access key variable
pub const STORE_KEY_ENV: &str = "SUPABASE_KEY";
/// Overrides the TOML config file location
pub const CONFIG_PATH_ENV: &str = "LBCRM_CONFIG";

/// Optional settings read from `config.toml`
///
/// Every field is optional; absent values fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub data_dir: Option<PathBuf>,
    pub sales_file: Option<String>,
    pub customers_file: Option<String>,
    pub batch_size: Option<usize>,
    pub inactivity_days: Option<i64>,
    pub sample_size: Option<usize>,
    pub sqlite_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub backend: Option<String>,
}

impl TomlConfig {
    /// Parse TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load configuration following priority order:
    /// 1. Explicit path (command-line argument)
    /// 2. `LBCRM_CONFIG` environment variable
    /// 3. Platform config directory (`<config_dir>/lbcrm/config.toml`)
    ///
    /// An explicit file that is missing or malformed is an error. When no
    /// file is found at all, defaults are returned.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load_file(Path::new(&path));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load_file(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }
}

/// Default configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lbcrm").join("config.toml"))
}

/// Resolve one setting following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. Compiled default (fallback)
///
/// Environment values that fail to parse are ignored.
pub fn resolve_setting<T: FromStr>(
    cli_arg: Option<T>,
    env_var_name: &str,
    file_value: Option<T>,
    default: T,
) -> T {
    if let Some(value) = cli_arg {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var_name) {
        match raw.parse::<T>() {
            Ok(value) => return value,
            Err(_) => debug!("Ignoring unparseable {}={:?}", env_var_name, raw),
        }
    }

    file_value.unwrap_or(default)
}

/// Endpoint and access key of the hosted store
#[derive(Clone, PartialEq)]
pub struct StoreCredentials {
    pub url: String,
    pub key: String,
}

impl StoreCredentials {
    /// Read `SUPABASE_URL` and `SUPABASE_KEY` from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_values(
            std::env::var(STORE_URL_ENV).ok(),
            std::env::var(STORE_KEY_ENV).ok(),
        )
    }

    /// Validate raw values; blank counts as missing
    pub fn from_values(url: Option<String>, key: Option<String>) -> Result<Self> {
        let url = url.map(|u| u.trim().trim_end_matches('/').to_string());
        let key = key.map(|k| k.trim().to_string());

        match (url, key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Ok(Self { url, key }),
            _ => Err(Error::Config(format!(
                "{} and {} must be set",
                STORE_URL_ENV, STORE_KEY_ENV
            ))),
        }
    }
}

impl fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}
