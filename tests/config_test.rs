use std::fs;
use tempfile::TempDir;
use tfsview::config::{AppConfig, ConfigManager};
use tfsview::profile::SAMPLING_THRESHOLD;

fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    assert!(!config.display.show_headers);
    assert!(config.display.show_table);
    assert_eq!(config.display.table_colormap, "none");

    assert_eq!(config.charts.default_bins, 100);
    assert_eq!(config.charts.default_height, 700);

    assert_eq!(config.performance.sampling_threshold, SAMPLING_THRESHOLD);
    assert_eq!(config.performance.event_poll_interval_ms, 25);

    assert_eq!(config.query.history_limit, 1000);
    assert!(config.query.enable_history);

    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());

    assert!(config.validate().is_ok());
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    for section in [
        "[display]",
        "[charts]",
        "[performance]",
        "[theme.colors]",
        "[query]",
        "[logging]",
    ] {
        assert!(template.contains(section), "missing {}", section);
    }

    let parsed: AppConfig = toml::from_str(&template).expect("template parses");
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    let err = config_manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("already exists"));

    fs::write(&path, "# edited\n").unwrap();
    config_manager.write_default_config(true).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[display]"));
}

#[test]
fn test_missing_user_config_is_default() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = config_manager.load_user_config().unwrap();
    assert_eq!(config.version, "0.1");
    assert_eq!(config.charts.row_limit, 10_000);
}

#[test]
fn test_partial_user_config_merges_over_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    fs::write(
        config_manager.config_path("config.toml"),
        r##"
[display]
show_headers = true
table_colormap = "viridis"

[charts]
default_bins = 40

[theme.colors]
primary = "#ff8800"
"##,
    )
    .unwrap();

    let user = config_manager.load_user_config().unwrap();
    let mut config = AppConfig::default();
    config.merge(user);

    assert!(config.display.show_headers);
    assert_eq!(config.display.table_colormap, "viridis");
    assert_eq!(config.charts.default_bins, 40);
    assert_eq!(config.charts.density_grid, 30);
    assert_eq!(config.theme.colors.primary, "#ff8800");
    assert_eq!(config.theme.colors.error, "red");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_toml_is_reported() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    fs::write(config_manager.config_path("config.toml"), "[display\n").unwrap();
    let err = config_manager.load_user_config().unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.version = "2.0".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.charts.default_bins = 2;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.display.table_colormap = "rainbow".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.logging.level = "loud".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.theme.color_mode = "sepia".to_string();
    assert!(config.validate().is_err());

    // NO_COLOR turns every color into Reset, so names are not checked then
    if std::env::var("NO_COLOR").is_err() {
        let mut config = AppConfig::default();
        config.theme.colors.primary = "not-a-color".to_string();
        assert!(config.validate().is_err());
    }
}
