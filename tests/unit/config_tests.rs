//! Unit tests for the configuration module
use backend_lib::config::{Settings, MIN_SIGNING_KEY_BYTES};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.auth.issuer, "bookstore-api");
    assert_eq!(settings.auth.audience, "bookstore-admin");
    assert!(settings.auth.single_session);
    assert!(settings.auth.invalidate_prior_reset_tokens);
    assert_eq!(settings.rate_limit.max_failed_attempts, 5);
    assert_eq!(settings.rate_limit.lockout_secs, 300);
    assert_eq!(settings.log_level, "info");
}

#[test]
fn test_load_config_from_file() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let config_content = r#"
        log_format = "json"

        [server]
        host = "0.0.0.0"
        port = 8888
        cors_origins = ["https://admin.bookstore.test"]

        [auth]
        signing_key = "an-adequately-long-signing-key-for-tests"
        refresh_token_ttl_secs = 86400
        single_session = false

        [rate_limit]
        max_failed_attempts = 10
    "#;
    fs::write(&config_path, config_content).unwrap();

    let settings = Settings::load_from(&config_path).unwrap();

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8888);
    assert_eq!(settings.server.cors_origins, vec!["https://admin.bookstore.test"]);
    assert_eq!(settings.log_format, "json");
    assert_eq!(settings.auth.refresh_token_ttl_secs, 86400);
    assert!(!settings.auth.single_session);
    // untouched keys keep their defaults
    assert_eq!(settings.auth.access_token_ttl_secs, 7200);
    assert_eq!(settings.rate_limit.max_failed_attempts, 10);
    assert_eq!(settings.rate_limit.lockout_secs, 300);
    assert_eq!(settings.bind_addr(), "0.0.0.0:8888");
}

#[test]
fn test_signing_key_length_enforced() {
    let mut settings = Settings::default();
    settings.auth.signing_key = "x".repeat(MIN_SIGNING_KEY_BYTES - 1);
    assert!(settings.validate().is_err());

    settings.auth.signing_key.push('x');
    assert!(settings.validate().is_ok());
    assert_eq!(settings.signing_key().len(), MIN_SIGNING_KEY_BYTES);
}

#[test]
fn test_signing_key_never_printed() {
    let settings = crate::test_utils::test_settings();
    let printed = format!("{settings:?}");

    assert!(!printed.contains(crate::test_utils::SIGNING_KEY));
    assert!(printed.contains("[redacted]"));
}

#[tokio::test]
async fn test_app_state_drops_signing_key() {
    use crate::test_utils::*;

    let env = setup_test_env();
    assert!(env.state.settings.auth.signing_key.is_empty());

    // The signer kept its own copy
    env.sessions().sign_up(alice()).await.unwrap();
    let tokens = env.sessions().sign_in(sign_in_as(ALICE_EMAIL, ALICE_PASSWORD)).await.unwrap();
    assert!(env.sessions().verify_access_token(&tokens.access_token).is_ok());
}
