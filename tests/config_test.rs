use attrition_dash::config::{AppConfig, ConfigManager};
use attrition_dash::{
    Args, CompressionFormat, DashboardTab, ExportFormat, ExportOptions, LoadOptions,
};
use clap::Parser;
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert_eq!(config.version, "0.1");
    assert_eq!(
        config.filters.columns,
        ["Department", "JobRole", "Gender", "MaritalStatus", "OverTime"]
    );
    assert_eq!(config.display.default_tab, DashboardTab::Overview);
    assert_eq!(config.display.event_poll_interval_ms, 25);
    assert_eq!(config.export.format, "png");
    assert_eq!((config.export.width, config.export.height), (1024, 640));
    assert!(!config.debug.enabled);
    config.validate().unwrap();
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let template = config_manager.generate_default_config();
    for section in [
        "[dataset]",
        "[filters]",
        "[charts]",
        "[display]",
        "[export]",
        "[theme]",
        "[theme.colors]",
        "[debug]",
    ] {
        assert!(template.contains(section), "missing {section}");
    }

    // The commented template must parse to the defaults.
    let parsed: AppConfig = toml::from_str(&template).unwrap();
    assert_eq!(parsed, AppConfig::default());
}

#[test]
fn test_write_default_config_respects_force() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    fs::write(&path, "version = \"0.1\"\n").unwrap();
    assert!(config_manager.write_default_config(false).is_err());
    config_manager.write_default_config(true).unwrap();
    assert_ne!(fs::read_to_string(&path).unwrap(), "version = \"0.1\"\n");
}

#[test]
fn test_user_config_overrides_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    fs::write(
        config_manager.config_path("config.toml"),
        r##"
version = "0.1"

[dataset]
path = "/data/hr.csv.gz"
delimiter = ";"

[filters]
columns = ["Department", "Attrition"]

[display]
default_tab = "3d"

[export]
format = "svg"

[theme.colors]
primary = "#ff8800"
"##,
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.dataset.path.as_deref(), Some("/data/hr.csv.gz"));
    assert_eq!(config.dataset.delimiter, Some(';'));
    assert_eq!(config.filters.columns, ["Department", "Attrition"]);
    assert_eq!(config.display.default_tab, DashboardTab::ThreeD);
    assert_eq!(config.export_format(), Some(ExportFormat::Svg));
    assert_eq!(config.theme.colors.primary, "#ff8800");
    // untouched values keep their defaults
    assert_eq!(config.theme.colors.error, AppConfig::default().theme.colors.error);
    assert_eq!(config.display.sidebar_width, AppConfig::default().display.sidebar_width);
}

#[test]
fn test_missing_user_config_is_default() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    assert!(config_manager.read_user_config().unwrap().is_none());
    assert_eq!(AppConfig::load_from(&config_manager).unwrap(), AppConfig::default());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager.ensure_config_dir().unwrap();
    let path = config_manager.config_path("config.toml");

    fs::write(&path, "version = \"9.0\"\n").unwrap();
    assert!(AppConfig::load_from(&config_manager).is_err());

    fs::write(&path, "[theme.colors]\nprimary = \"not-a-color\"\n").unwrap();
    assert!(AppConfig::load_from(&config_manager).is_err());

    fs::write(&path, "this is not toml = = \n").unwrap();
    assert!(config_manager.read_user_config().is_err());
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = AppConfig::default();
    config.export.format = "gif".into();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.filters.columns.clear();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.export.width = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.dataset.compression = Some("rar".into());
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.theme.color_mode = "sepia".into();
    assert!(config.validate().is_err());
}

#[test]
fn test_cli_args_override_config() {
    let mut config = AppConfig::default();
    config.dataset.delimiter = Some(';');
    config.dataset.compression = Some("zstd".into());
    config.export.format = "svg".into();
    config.export.width = 800;

    let args = Args::parse_from(["attrition-dash", "EA.csv"]);
    let opts = LoadOptions::from_args_and_config(&args, &config).unwrap();
    assert_eq!(opts.delimiter, b';');
    assert!(opts.has_header);
    assert_eq!(opts.compression, Some(CompressionFormat::Zstd));
    let export = ExportOptions::from_args_and_config(&args, &config);
    assert_eq!(export.format, ExportFormat::Svg);
    assert_eq!(export.width, 800);

    let args = Args::parse_from([
        "attrition-dash",
        "EA.csv",
        "--delimiter",
        "|",
        "--no-header",
        "--compression",
        "gzip",
        "--format",
        "png",
    ]);
    let opts = LoadOptions::from_args_and_config(&args, &config).unwrap();
    assert_eq!(opts.delimiter, b'|');
    assert!(!opts.has_header);
    assert_eq!(opts.compression, Some(CompressionFormat::Gzip));
    let export = ExportOptions::from_args_and_config(&args, &config);
    assert_eq!(export.format, ExportFormat::Png);
}

#[test]
fn test_dataset_path_precedence() {
    let mut config = AppConfig::default();
    let args = Args::parse_from(["attrition-dash"]);
    assert_eq!(
        attrition_dash::dataset_path(&args, &config),
        std::path::PathBuf::from("EA.csv")
    );

    config.dataset.path = Some("/data/hr.csv".into());
    assert_eq!(
        attrition_dash::dataset_path(&args, &config),
        std::path::PathBuf::from("/data/hr.csv")
    );

    let args = Args::parse_from(["attrition-dash", "local.csv"]);
    assert_eq!(
        attrition_dash::dataset_path(&args, &config),
        std::path::PathBuf::from("local.csv")
    );
}
