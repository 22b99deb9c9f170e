//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use otls::config::{LoginConfig, World};
use otls::crypto::PasswordHash;
use otls::utils::RateLimitTier;
use std::time::Duration;
use tracing::Level;

fn world(id: u8, host: &str) -> World {
    World {
        id,
        name: format!("World{id}"),
        host: host.to_string(),
        port: 7172,
        preview: false,
    }
}

fn assert_error(config: &LoginConfig, needle: &str) {
    let errors = config.validate();
    assert!(
        errors.iter().any(|e| e.contains(needle)),
        "expected an error containing {needle:?}, got {errors:?}"
    );
}

#[test]
fn test_default_config_validates() {
    let config = LoginConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_example_config_parses_and_validates() {
    let config = LoginConfig::from_toml(&LoginConfig::example_config()).unwrap();
    assert!(config.validate().is_empty());
    assert_eq!(config.worlds.len(), 1);
    assert_eq!(config.worlds[0].name, "Antica");
}

#[test]
fn test_invalid_server_address() {
    let mut config = LoginConfig::default();
    config.server.address = "invalid_address".to_string();
    assert_error(&config, "Invalid server address");
}

#[test]
fn test_empty_server_address() {
    let mut config = LoginConfig::default();
    config.server.address = String::new();
    assert_error(&config, "cannot be empty");
}

#[test]
fn test_idle_timeout_bounds() {
    let mut config = LoginConfig::default();
    config.server.idle_timeout = Duration::from_millis(50);
    assert_error(&config, "Idle timeout too short");

    config.server.idle_timeout = Duration::from_secs(400);
    assert_error(&config, "Idle timeout too long");
}

#[test]
fn test_short_shutdown_timeout() {
    let mut config = LoginConfig::default();
    config.server.shutdown_timeout = Duration::from_millis(10);
    assert_error(&config, "Shutdown timeout too short");
}

#[test]
fn test_zero_max_connections() {
    let mut config = LoginConfig::default();
    config.server.max_connections = 0;
    assert_error(&config, "Max connections must be greater than 0");
}

#[test]
fn test_inverted_version_range() {
    let mut config = LoginConfig::default();
    config.version.min = 1099;
    config.version.max = 760;
    assert_error(&config, "Version range is empty");
}

#[test]
fn test_degenerate_rate_limit_tiers() {
    let mut config = LoginConfig::default();
    config.limits.connections = vec![RateLimitTier::new(0, 10)];
    config.limits.authorizations = vec![RateLimitTier::new(60, 5), RateLimitTier::new(3600, 0)];

    let errors = config.validate();
    assert!(errors.contains(&"limits.connections[0]: interval must be greater than 0".to_string()));
    assert!(errors.contains(&"limits.authorizations[1]: max must be greater than 0".to_string()));
}

#[test]
fn test_empty_private_key_path() {
    let mut config = LoginConfig::default();
    config.crypto.private_key = "".into();
    assert_error(&config, "Private key path cannot be empty");
}

#[test]
fn test_plain_passwords_are_allowed() {
    let mut config = LoginConfig::default();
    config.crypto.password_hash = PasswordHash::Plain;
    assert!(config.validate().is_empty());
}

#[test]
fn test_plain_passwords_are_reported_as_warnings() {
    let mut config = LoginConfig::default();
    config.store.accounts_file = Some("accounts.toml".into());
    config.crypto.password_hash = PasswordHash::Sha1;
    assert!(config.warnings().is_empty());

    config.crypto.password_hash = PasswordHash::Plain;
    assert_eq!(config.warnings(), vec!["Plain password storage is configured".to_string()]);

    config.store.accounts_file = None;
    assert_eq!(config.warnings().len(), 2);
}

#[test]
fn test_world_checks() {
    let mut config = LoginConfig::default();
    config.worlds = vec![world(0, "127.0.0.1"), world(0, "127.0.0.2")];
    assert_error(&config, "Duplicate world id: 0");

    config.worlds = vec![World {
        name: String::new(),
        ..world(1, "127.0.0.1")
    }];
    assert_error(&config, "World 1 has an empty name");

    config.worlds = vec![World {
        port: 0,
        ..world(2, "127.0.0.1")
    }];
    assert_error(&config, "World 2 has port 0");
}

#[test]
fn test_hostnames_need_modern_clients() {
    let mut config = LoginConfig::default();
    config.worlds = vec![world(0, "game.example.org")];
    assert_error(&config, "must be an IPv4 address");

    config.version.min = 1010;
    assert!(config.validate().is_empty());
}

#[test]
fn test_too_many_worlds() {
    let mut config = LoginConfig::default();
    config.worlds = (0..=255u16)
        .map(|id| world((id % 256) as u8, "127.0.0.1"))
        .collect();
    assert_error(&config, "Too many worlds");
}

#[test]
fn test_logging_checks() {
    let mut config = LoginConfig::default();
    config.logging.log_to_file = true;
    config.logging.log_file_path = None;
    assert_error(&config, "log_file_path must be specified");

    let mut config = LoginConfig::default();
    config.logging.log_to_console = false;
    config.logging.log_to_file = false;
    assert_error(&config, "At least one logging output");
}

#[test]
fn test_validate_strict_joins_errors() {
    let mut config = LoginConfig::default();
    config.server.address = String::new();
    config.server.max_connections = 0;

    let err = config.validate_strict().unwrap_err().to_string();
    assert!(err.contains("Server address cannot be empty"));
    assert!(err.contains("Max connections must be greater than 0"));
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = LoginConfig::from_toml(
        r#"
        [server]
        address = "127.0.0.1:7171"
        idle_timeout = 2500

        [version]
        max = 1098

        [logging]
        log_level = "debug"

        [[worlds]]
        id = 3
        name = "Secura"
        host = "192.168.0.10"
        port = 7173
        "#,
    )
    .unwrap();

    assert_eq!(config.server.address, "127.0.0.1:7171");
    assert_eq!(config.server.idle_timeout, Duration::from_millis(2500));
    assert_eq!(config.server.max_connections, 1000);
    assert_eq!((config.version.min, config.version.max), (760, 1098));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert_eq!(config.limits.authorizations, vec![
        RateLimitTier::new(60, 5),
        RateLimitTier::new(3600, 30)
    ]);
    assert!(!config.worlds[0].preview);
    assert!(config.world(3).is_some());
    assert!(config.world(0).is_none());
}

#[test]
fn test_invalid_log_level_rejected() {
    let result = LoginConfig::from_toml("[logging]\nlog_level = \"loud\"\n");
    assert!(result.is_err());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let config = LoginConfig::default_with_overrides(|c| {
        c.motd.text = "Server save at 10:00".to_string();
        c.worlds.push(world(7, "10.0.0.7"));
    });
    config.save_to_file(&path).unwrap();

    let loaded = LoginConfig::from_file(&path).unwrap();
    assert_eq!(loaded.motd.text, "Server save at 10:00");
    assert_eq!(loaded.worlds[0].host, "10.0.0.7");
    assert_eq!(loaded.server.idle_timeout, config.server.idle_timeout);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = LoginConfig::from_file("/nonexistent/otls.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_env_overrides() {
    std::env::set_var("OTLS_ADDRESS", "127.0.0.1:17171");
    std::env::set_var("OTLS_VERSION_MAX", "1098");
    std::env::set_var("OTLS_PASSWORD_HASH", "sha256");
    let config = LoginConfig::from_env();
    std::env::remove_var("OTLS_ADDRESS");
    std::env::remove_var("OTLS_VERSION_MAX");
    std::env::remove_var("OTLS_PASSWORD_HASH");

    let config = config.unwrap();
    assert_eq!(config.server.address, "127.0.0.1:17171");
    assert_eq!(config.version.max, 1098);
    assert_eq!(config.crypto.password_hash, PasswordHash::Sha256);

    std::env::set_var("OTLS_VERSION_MIN", "seven");
    let result = LoginConfig::from_env();
    std::env::remove_var("OTLS_VERSION_MIN");
    assert!(result.unwrap_err().to_string().contains("OTLS_VERSION_MIN"));
}
