use super::*;
use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn test_defaults_are_served_without_files() {
    assert_eq!(get("STORE_DIALECT").unwrap(), "sql");
    assert_eq!(get_parsed::<i64>("DURATION_MIN_MINUTES").unwrap(), 10);
    assert_eq!(get_parsed::<i64>("DURATION_MAX_MINUTES").unwrap(), 1440);
    assert_eq!(get_parsed::<i64>("DURATION_DEFAULT_MINUTES").unwrap(), 360);
    assert_eq!(
        get_duration("CACHE_TTL").unwrap(),
        Duration::from_secs(5 * 60)
    );
}

#[test]
#[serial]
fn test_override_store_wins_and_guard_restores() {
    let before = get("STORE_URL").unwrap();
    {
        let _guard = ConfigGuard::new("STORE_URL", "http://sensors.local:8181");
        assert_eq!(get("STORE_URL").unwrap(), "http://sensors.local:8181");
    }
    assert_eq!(get("STORE_URL").unwrap(), before);
}

#[test]
#[serial]
fn test_empty_override_is_an_error() {
    let _guard = ConfigGuard::new("STORE_ORG", "");
    assert!(matches!(get("STORE_ORG"), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_unknown_key_is_config_error() {
    let err = get("NO_SUCH_KEY").unwrap_err();
    assert!(err.to_string().contains("NO_SUCH_KEY"));
}

#[test]
#[serial]
fn test_invalid_number_reports_key() {
    let _guard = ConfigGuard::new("CACHE_MAX_ENTRIES", "many");
    let err = get_parsed::<usize>("CACHE_MAX_ENTRIES").unwrap_err();
    assert!(err.to_string().contains("CACHE_MAX_ENTRIES"));
}

#[test]
#[serial]
fn test_credential_missing_is_fatal_config_error() {
    let _env = ConfigGuard::new("STORE_TOKEN_ENV", "SENSORVIEW_TEST_TOKEN_UNSET");
    let err = credential().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("SENSORVIEW_TEST_TOKEN_UNSET"));
}

#[test]
#[serial]
fn test_credential_read_through_named_variable() {
    let _env = ConfigGuard::new("STORE_TOKEN_ENV", "SENSORVIEW_TEST_TOKEN");
    let _token = ConfigGuard::new("SENSORVIEW_TEST_TOKEN", "s3cr3t");
    assert_eq!(credential().unwrap(), "s3cr3t");
}

#[test]
fn test_local_file_overrides_base_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"
[store]
url = "http://192.168.77.44:8181"
dialect = "sql"

[[catalog.sources]]
name = "temperature"
tables = ["ambient_data"]

[[fields]]
name = "co2"
display = "CO2 (ppm)"
decimals = 0
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("config.local.toml"),
        r#"
[store]
dialect = "flux"
auth_scheme = "Token"
"#,
    )
    .unwrap();

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.store.url, "http://192.168.77.44:8181");
    assert_eq!(config.store.dialect, "flux");
    assert_eq!(config.store.auth_scheme, "Token");
    assert_eq!(config.store.token_env, "INFLUXDB3_AUTH_TOKEN");
    assert_eq!(config.catalog.sources.len(), 1);
    assert_eq!(config.catalog.sources[0].tables, vec!["ambient_data"]);
    assert_eq!(
        config.fields,
        vec![FieldConfig {
            name: "co2".to_string(),
            display: "CO2 (ppm)".to_string(),
            scale: 1.0,
            decimals: 0,
        }]
    );
}

#[test]
fn test_missing_directory_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = load_config(&dir.path().join("absent")).unwrap();
    assert_eq!(config.store.url, "http://localhost:8181");
    assert_eq!(config.session.duration_step_minutes, 10);
    assert!(config.fields.is_empty());
}

#[test]
fn test_excessive_field_decimals_is_config_error() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("config.toml"),
        r#"
[[fields]]
name = "co2"
display = "CO2 (ppm)"
decimals = 400
"#,
    )
    .unwrap();
    let err = load_config(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("co2"));
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "[store\nurl = ").unwrap();
    assert!(matches!(load_config(dir.path()), Err(Error::Config(_))));
}
