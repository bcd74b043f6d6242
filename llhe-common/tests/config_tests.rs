//! Configuration loading from TOML files and the process environment
//!
//! Uses serial_test: these tests mutate LLHE_* environment variables.

use llhe_common::config::{Config, ProviderKind};
use serial_test::serial;
use std::env;
use std::io::Write;

fn clear_env() {
    for key in [
        "LLHE_CONFIG",
        "LLHE_DATABASE_URL",
        "LLHE_SITE_URL",
        "LLHE_AI_PROVIDER",
        "LLHE_AI_API_KEY",
        "OPENAI_API_KEY",
    ] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_load_explicit_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [server]
        port = 6001
        site_url = "https://stories.example"

        [auth]
        admin_emails = ["mod@example.com"]

        [ai]
        provider = "rules"
        "#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.server.port, 6001);
    assert_eq!(config.server.site_url, "https://stories.example");
    assert!(config.auth.is_admin("mod@example.com"));
    assert_eq!(config.ai.provider, ProviderKind::Rules);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[ai]\nprovider = \"rules\"").unwrap();

    env::set_var("LLHE_AI_PROVIDER", "local");
    env::set_var("LLHE_DATABASE_URL", "sqlite::memory:");
    let config = Config::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.ai.provider, ProviderKind::Local);
    assert_eq!(config.database.url, "sqlite::memory:");
}

#[test]
#[serial]
fn test_config_env_var_selects_file() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nport = 7007").unwrap();

    env::set_var("LLHE_CONFIG", file.path());
    let config = Config::load(None).unwrap();
    clear_env();

    assert_eq!(config.server.port, 7007);
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server\nport = ").unwrap();

    let err = Config::load(Some(file.path())).unwrap_err();

    assert_eq!(err.kind(), llhe_common::ErrorKind::Config);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    clear_env();
    let err = Config::load(Some(std::path::Path::new("/nonexistent/llhe.toml"))).unwrap_err();
    assert_eq!(err.kind(), llhe_common::ErrorKind::Config);
}
