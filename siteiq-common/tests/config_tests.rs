//! Configuration precedence tests
//!
//! Environment-variable tests mutate process state and run serially.

use serial_test::serial;
use siteiq_common::config::{
    load_config, resolve_database_path, ServiceConfig, CONFIG_ENV_VAR, DATABASE_ENV_VAR,
};
use siteiq_common::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_cli_config_path_takes_priority_over_env() {
    // Given: both a CLI file and an ENV file
    let cli_file = write_config("[scoring]\nmax_retries = 7\n");
    let env_file = write_config("[scoring]\nmax_retries = 1\n");
    std::env::set_var(CONFIG_ENV_VAR, env_file.path());

    // When: loading with a CLI path
    let config = load_config(Some(cli_file.path())).unwrap();

    // Then: the CLI file wins
    assert_eq!(config.scoring.max_retries, 7);

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_config_path_used_without_cli() {
    let env_file = write_config("[server]\nbind_address = \"0.0.0.0:9000\"\n");
    std::env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = load_config(None).unwrap();
    assert_eq!(config.server.bind_address, "0.0.0.0:9000");

    std::env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    std::env::remove_var(CONFIG_ENV_VAR);

    let result = load_config(Some(Path::new("/nonexistent/siteiq.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_database_env_overrides_toml() {
    // Given: TOML names one database, ENV another
    let mut config = ServiceConfig::default();
    config.database.path = Some(PathBuf::from("/toml/siteiq.db"));
    std::env::set_var(DATABASE_ENV_VAR, "/env/siteiq.db");

    // When: no CLI argument
    let path = resolve_database_path(None, &config);

    // Then: ENV wins over TOML
    assert_eq!(path, PathBuf::from("/env/siteiq.db"));

    std::env::remove_var(DATABASE_ENV_VAR);
}

#[test]
#[serial]
fn test_database_toml_used_without_env() {
    std::env::remove_var(DATABASE_ENV_VAR);

    let mut config = ServiceConfig::default();
    config.database.path = Some(PathBuf::from("/toml/siteiq.db"));

    assert_eq!(
        resolve_database_path(None, &config),
        PathBuf::from("/toml/siteiq.db")
    );
}

#[test]
#[serial]
fn test_database_default_is_named_siteiq_db() {
    std::env::remove_var(DATABASE_ENV_VAR);

    let path = resolve_database_path(None, &ServiceConfig::default());
    assert_eq!(path.file_name().unwrap(), "siteiq.db");
}
