//! Resolved run settings
//!
//! Each value is taken from the command line, then the environment, then
//! the TOML file, then the compiled default.

use crate::store::DEFAULT_BATCH_SIZE;
use lbcrm_common::config::{resolve_setting, TomlConfig};
use lbcrm_common::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DATA_DIR_ENV: &str = "LBCRM_DATA_DIR";
pub const BACKEND_ENV: &str = "LBCRM_BACKEND";
pub const SQLITE_PATH_ENV: &str = "LBCRM_SQLITE_PATH";
pub const BATCH_SIZE_ENV: &str = "LBCRM_BATCH_SIZE";
pub const INACTIVITY_DAYS_ENV: &str = "LBCRM_INACTIVITY_DAYS";
pub const SAMPLE_SIZE_ENV: &str = "LBCRM_SAMPLE_SIZE";
pub const LOG_LEVEL_ENV: &str = "LBCRM_LOG_LEVEL";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SALES_FILE: &str = "vendas.xlsx";
pub const DEFAULT_CUSTOMERS_FILE: &str = "pessoas.xlsx";
pub const DEFAULT_INACTIVITY_DAYS: i64 = 90;
pub const DEFAULT_SAMPLE_SIZE: usize = 10;
pub const DEFAULT_SQLITE_FILE: &str = "lbcrm.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where records are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Hosted PostgREST store
    #[default]
    Remote,
    /// Local SQLite mirror
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Remote => f.write_str("remote"),
            Backend::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "supabase" | "postgrest" => Ok(Backend::Remote),
            "sqlite" | "local" => Ok(Backend::Sqlite),
            other => Err(Error::InvalidInput(format!("Unknown backend: {}", other))),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub data_dir: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub sqlite_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub sales_path: PathBuf,
    pub customers_path: PathBuf,
    pub batch_size: usize,
    pub inactivity_days: i64,
    pub sample_size: usize,
    pub backend: Backend,
    pub sqlite_path: PathBuf,
    pub log_level: String,
}

impl Settings {
    pub fn resolve(cli: &CliOverrides, file: &TomlConfig) -> Self {
        let data_dir = resolve_setting(
            cli.data_dir.clone(),
            DATA_DIR_ENV,
            file.data_dir.clone(),
            PathBuf::from(DEFAULT_DATA_DIR),
        );

        let backend_from_file = file.backend.as_deref().and_then(|b| b.parse().ok());
        let backend = resolve_setting(cli.backend, BACKEND_ENV, backend_from_file, Backend::default());

        let sqlite_path = resolve_setting(
            cli.sqlite_path.clone(),
            SQLITE_PATH_ENV,
            file.sqlite_path.clone(),
            data_dir.join(DEFAULT_SQLITE_FILE),
        );

        let batch_size = resolve_setting(
            cli.batch_size,
            BATCH_SIZE_ENV,
            file.batch_size,
            DEFAULT_BATCH_SIZE,
        )
        .max(1);

        let sales_file = file.sales_file.as_deref().unwrap_or(DEFAULT_SALES_FILE);
        let customers_file = file
            .customers_file
            .as_deref()
            .unwrap_or(DEFAULT_CUSTOMERS_FILE);

        Self {
            sales_path: data_dir.join(sales_file),
            customers_path: data_dir.join(customers_file),
            batch_size,
            inactivity_days: resolve_setting(
                None,
                INACTIVITY_DAYS_ENV,
                file.inactivity_days,
                DEFAULT_INACTIVITY_DAYS,
            ),
            sample_size: resolve_setting(
                None,
                SAMPLE_SIZE_ENV,
                file.sample_size,
                DEFAULT_SAMPLE_SIZE,
            ),
            backend,
            sqlite_path,
            log_level: resolve_setting(
                None,
                LOG_LEVEL_ENV,
                file.log_level.clone(),
                DEFAULT_LOG_LEVEL.to_string(),
            ),
            data_dir,
        }
    }

    /// Local output file under the data directory
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            DATA_DIR_ENV,
            BACKEND_ENV,
            SQLITE_PATH_ENV,
            BATCH_SIZE_ENV,
            INACTIVITY_DAYS_ENV,
            SAMPLE_SIZE_ENV,
            LOG_LEVEL_ENV,
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let settings = Settings::resolve(&CliOverrides::default(), &TomlConfig::default());

        assert_eq!(settings.data_dir, PathBuf::from("./data"));
        assert_eq!(settings.sales_path, PathBuf::from("./data/vendas.xlsx"));
        assert_eq!(settings.customers_path, PathBuf::from("./data/pessoas.xlsx"));
        assert_eq!(settings.sqlite_path, PathBuf::from("./data/lbcrm.db"));
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.inactivity_days, 90);
        assert_eq!(settings.sample_size, 10);
        assert_eq!(settings.backend, Backend::Remote);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    #[serial]
    fn test_cli_beats_env_beats_file() {
        clear_env();
        std::env::set_var(BATCH_SIZE_ENV, "50");
        std::env::set_var(BACKEND_ENV, "sqlite");
        let file = TomlConfig {
            batch_size: Some(25),
            inactivity_days: Some(120),
            backend: Some("remote".to_string()),
            data_dir: Some(PathBuf::from("/srv/lb")),
            ..Default::default()
        };
        let cli = CliOverrides {
            batch_size: Some(10),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, &file);

        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.backend, Backend::Sqlite);
        assert_eq!(settings.inactivity_days, 120);
        assert_eq!(settings.sqlite_path, PathBuf::from("/srv/lb/lbcrm.db"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_batch_size_clamped() {
        clear_env();
        let cli = CliOverrides {
            batch_size: Some(0),
            ..Default::default()
        };

        let settings = Settings::resolve(&cli, &TomlConfig::default());

        assert_eq!(settings.batch_size, 1);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("SQLite".parse::<Backend>().unwrap(), Backend::Sqlite);
        assert_eq!("supabase".parse::<Backend>().unwrap(), Backend::Remote);
        assert!("mysql".parse::<Backend>().is_err());
    }
}
