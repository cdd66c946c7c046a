//! Tests for configuration loading and priority resolution
//!
//! Tests that manipulate process environment variables are marked with
//! #[serial] so they never run in parallel.

use lbcrm_common::config::{
    resolve_setting, StoreCredentials, TomlConfig, CONFIG_PATH_ENV, STORE_KEY_ENV, STORE_URL_ENV,
};
use lbcrm_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    env::set_var("LBCRM_TEST_BATCH", "25");

    let value = resolve_setting(Some(10usize), "LBCRM_TEST_BATCH", Some(50), 100);
    assert_eq!(value, 10);

    env::remove_var("LBCRM_TEST_BATCH");
}

#[test]
#[serial]
fn test_environment_beats_file() {
    env::set_var("LBCRM_TEST_BATCH", "25");

    let value = resolve_setting(None, "LBCRM_TEST_BATCH", Some(50usize), 100);
    assert_eq!(value, 25);

    env::remove_var("LBCRM_TEST_BATCH");
}

#[test]
#[serial]
fn test_file_beats_default() {
    env::remove_var("LBCRM_TEST_BATCH");

    assert_eq!(resolve_setting(None, "LBCRM_TEST_BATCH", Some(50usize), 100), 50);
    assert_eq!(resolve_setting(None, "LBCRM_TEST_BATCH", None, 100usize), 100);
}

#[test]
#[serial]
fn test_unparseable_environment_falls_through() {
    env::set_var("LBCRM_TEST_BATCH", "lots");

    let value = resolve_setting(None, "LBCRM_TEST_BATCH", Some(50usize), 100);
    assert_eq!(value, 50);

    env::remove_var("LBCRM_TEST_BATCH");
}

#[test]
#[serial]
fn test_load_from_env_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "data_dir = \"/srv/lbcrm\"\ninactivity_days = 120\nbackend = \"sqlite\"").unwrap();

    env::set_var(CONFIG_PATH_ENV, file.path());
    let config = TomlConfig::load(None).unwrap();
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.data_dir, Some(PathBuf::from("/srv/lbcrm")));
    assert_eq!(config.inactivity_days, Some(120));
    assert_eq!(config.backend.as_deref(), Some("sqlite"));
}

#[test]
#[serial]
fn test_explicit_path_beats_env_path() {
    let mut env_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(env_file, "batch_size = 7").unwrap();
    let mut explicit_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(explicit_file, "batch_size = 3").unwrap();

    env::set_var(CONFIG_PATH_ENV, env_file.path());
    let config = TomlConfig::load(Some(explicit_file.path())).unwrap();
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(config.batch_size, Some(3));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_PATH_ENV);

    let result = TomlConfig::load(Some(&PathBuf::from("/nonexistent/lbcrm/config.toml")));
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
#[serial]
fn test_credentials_from_env() {
    env::set_var(STORE_URL_ENV, "https://example.supabase.co/");
    env::set_var(STORE_KEY_ENV, "service-key");

    let creds = StoreCredentials::from_env().unwrap();

    env::remove_var(STORE_URL_ENV);
    env::remove_var(STORE_KEY_ENV);

    assert_eq!(creds.url, "https://example.supabase.co");
    assert_eq!(creds.key, "service-key");
}

#[test]
#[serial]
fn test_credentials_missing_from_env() {
    env::remove_var(STORE_URL_ENV);
    env::remove_var(STORE_KEY_ENV);

    assert!(matches!(StoreCredentials::from_env(), Err(Error::Config(_))));
}
