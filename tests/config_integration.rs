use policypal::config::AppConfig;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;

const ARGS: [&str; 1] = ["policypal"];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for var in [
            "CONFIG_FILE",
            "PORT",
            "BACKEND_URL",
            "IDENTITY_PATH",
            "LOG_JSON",
            "POLICYPAL_SERVER__PORT",
            "POLICYPAL_BACKEND__BASE_URL",
            "POLICYPAL_BACKEND__REQUEST_TIMEOUT_SECS",
        ] {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.backend.base_url, "http://localhost:5000");
    assert!(config.backend.request_timeout().is_none());
    assert_eq!(config.identity.path, PathBuf::from("policypal-identity.json"));
    assert!(!config.logging.json);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("POLICYPAL_SERVER__PORT", "9090");
        env::set_var("POLICYPAL_BACKEND__REQUEST_TIMEOUT_SECS", "45");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.backend.request_timeout_secs, Some(45));

    clear_env_vars();
}

#[test]
#[serial]
fn test_plain_env_aliases() {
    clear_env_vars();
    unsafe {
        env::set_var("PORT", "4040");
        env::set_var("BACKEND_URL", "http://backend.internal:5000");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 4040);
    assert_eq!(config.backend.base_url, "http://backend.internal:5000");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() -> anyhow::Result<()> {
    clear_env_vars();

    let dir = tempfile::tempdir()?;
    let file_path = dir.path().join("policypal.yaml");
    fs::write(
        &file_path,
        r#"
server:
  port: 7070
backend:
  base_url: "http://file-backend:5000"
"#,
    )?;

    unsafe {
        env::set_var("CONFIG_FILE", &file_path);
    }

    let config = AppConfig::load_from_args(ARGS)?;
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.backend.base_url, "http://file-backend:5000");
    // Keys the file leaves out keep their defaults.
    assert_eq!(config.server.host, "127.0.0.1");

    clear_env_vars();
    Ok(())
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["policypal", "--config", "/nonexistent/policypal.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cli_beats_env_and_file() {
    clear_env_vars();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = dir.path().join("policypal.yaml");
    fs::write(&file_path, "server:\n  port: 7070\n").expect("Failed to write temp config");
    unsafe {
        env::set_var("POLICYPAL_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args([
        "policypal",
        "--config",
        file_path.to_str().expect("utf-8 temp path"),
        "--port",
        "8181",
        "--log-json",
        "true",
    ])
    .expect("Failed to load config");
    assert_eq!(config.server.port, 8181);
    assert!(config.logging.json);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "config.yaml";
    fs::write(cwd_path, "server:\n  port: 6060\n").expect("Failed to write ./config.yaml");

    let config = AppConfig::load_from_args(ARGS);

    fs::remove_file(cwd_path).expect("Failed to remove ./config.yaml");

    assert_eq!(config.expect("Failed to load config").server.port, 6060);
}
