use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::constants::PollerType;

fn cleanup_all_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("MONITOR_CACHE__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = Settings::default();

    assert_eq!(config.cache.unreachable_delay, 15);
    assert_eq!(config.cache.unreachable_period, 45);
    assert_eq!(config.cache.unavailable_delay, 60);
    assert_eq!(config.pollers.pollers, 5);
    assert_eq!(config.pollers.java_pollers, 0);
    assert_eq!(config.preprocessing.workers, 3);
    assert!(!config.monitoring.prometheus_enabled);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_env_vars();
    with_vars(
        vec![
            ("MONITOR_CACHE__CACHE__UNREACHABLE_DELAY", Some("30")),
            ("MONITOR_CACHE__PREPROCESSING__WORKERS", Some("8")),
        ],
        || {
            let config = Settings::new().unwrap();

            assert_eq!(config.cache.unreachable_delay, 30);
            assert_eq!(config.preprocessing.workers, 8);
            assert_eq!(config.cache.unavailable_delay, 60);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");

    std::fs::write(
        &config_path,
        r#"
        [pollers]
        pingers = 0
        java_pollers = 2

        [sync]
        source_path = "/tmp/rows/current.json"
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = Settings::new().expect("success");
        let config = base_config.with_override_config(config_path.to_str().unwrap()).unwrap();

        assert_eq!(config.pollers.pingers, 0);
        assert_eq!(config.pollers.java_pollers, 2);
        assert_eq!(config.pollers.pollers, 5);
        assert_eq!(
            config.sync.source_path.as_os_str().to_str(),
            Some("/tmp/rows/current.json")
        );
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
        [cache]
        unreachable_delay = 20
        unreachable_period = 100
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("MONITOR_CACHE__CACHE__UNREACHABLE_DELAY", Some("25")),
        ],
        || {
            let config = Settings::new().unwrap();

            assert_eq!(config.cache.unreachable_delay, 25);
            assert_eq!(config.cache.unreachable_period, 100);
        },
    );
}

#[test]
fn validation_should_reject_period_shorter_than_delay() {
    let mut config = Settings::default();
    config.cache.unreachable_delay = 60;
    config.cache.unreachable_period = 30;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_workers_and_zero_tick() {
    let mut config = Settings::default();
    config.preprocessing.workers = 0;
    assert!(config.validate().is_err());

    let mut config = Settings::default();
    config.preprocessing.tick_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_privileged_prometheus_port() {
    let mut config = Settings::default();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 80;

    assert!(config.validate().is_err());
}

#[test]
fn poller_forks_should_map_each_class() {
    let config = PollerConfig {
        pollers: 4,
        unreachable_pollers: 1,
        ipmi_pollers: 2,
        pingers: 3,
        java_pollers: 5,
    };

    assert_eq!(config.forks(PollerType::Normal), 4);
    assert_eq!(config.forks(PollerType::Unreachable), 1);
    assert_eq!(config.forks(PollerType::Ipmi), 2);
    assert_eq!(config.forks(PollerType::Pinger), 3);
    assert_eq!(config.forks(PollerType::Java), 5);
}
