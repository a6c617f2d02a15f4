//! Integration test: Configuration utilities
//!
//! Tests config path resolution and the shipped dashboard configuration.

use medsupply_live::bin_common::{load_config_from_env, ConfigType};
use medsupply_live::medsupply::{DashboardConfig, Role};
use std::io::Write;
use std::path::Path;

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_names() {
    assert_eq!(ConfigType::Dashboard.env_var_name(), "CONFIG_PATH");
    assert_eq!(ConfigType::Custom("x.yaml".into()).env_var_name(), "CONFIG_PATH");
}

#[test]
fn test_shipped_dashboard_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(ConfigType::Dashboard.default_path());

    let config = DashboardConfig::load(&path).unwrap();

    assert_eq!(config.realtime.reconnect_attempts, 5);
    assert_eq!(config.realtime.reconnect_delay_ms, 1000);
    assert_eq!(config.viewer.role, Role::Admin);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"
realtime:
  url: http://not-a-socket
viewer:
  id: "1"
  role: admin
"#,
    )
    .unwrap();

    assert!(DashboardConfig::load(file.path()).is_err());
}
