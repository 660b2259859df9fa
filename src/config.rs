use color_eyre::eyre::eyre;
use color_eyre::Result;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use supports_color::Stream;

use crate::chart_spec::DashboardTab;
use crate::filter::DEFAULT_FILTER_COLUMNS;
use crate::ExportFormat;

pub const CONFIG_VERSION: &str = "0.1";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write the commented default template to `config.toml`
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read `config.toml` if present. A missing file is an empty layer.
    pub fn read_user_config(&self) -> Result<Option<AppConfig>> {
        let config_path = self.config_path("config.toml");
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map(Some).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub version: String,
    pub dataset: DatasetConfig,
    pub filters: FiltersConfig,
    pub charts: ChartsConfig,
    pub display: DisplayConfig,
    pub export: ExportConfig,
    pub theme: ThemeConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: Option<String>,
    pub delimiter: Option<char>,
    pub has_header: Option<bool>,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FiltersConfig {
    /// Columns offered as multi-select filters, in sidebar order
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ChartsConfig {
    /// TOML chart catalog replacing the built-in charts
    pub catalog: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub default_tab: DashboardTab,
    pub event_poll_interval_ms: u64,
    pub sidebar_width: u16,
    /// Degrees the 3-D view turns per key press
    pub rotation_step_degrees: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThemeConfig {
    pub color_mode: String,
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorConfig {
    pub primary: String,
    pub secondary: String,
    pub error: String,
    pub dimmed: String,
    pub controls_bg: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub text_inverse: String,
    pub sidebar_border: String,
    pub sidebar_selected: String,
    pub chart_border: String,
    pub keybind_hints: String,
    /// Colors assigned to chart groups in order
    pub series: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    /// `tracing` filter directive used when RUST_LOG is unset
    pub log_filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            dataset: DatasetConfig::default(),
            filters: FiltersConfig::default(),
            charts: ChartsConfig::default(),
            display: DisplayConfig::default(),
            export: ExportConfig::default(),
            theme: ThemeConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_FILTER_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_tab: DashboardTab::Overview,
            event_poll_interval_ms: 25,
            sidebar_width: 32,
            rotation_step_degrees: 15.0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            width: 1024,
            height: 640,
            directory: None,
        }
    }
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            color_mode: "auto".to_string(),
            colors: ColorConfig::default(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            primary: "cyan".to_string(),
            secondary: "yellow".to_string(),
            error: "red".to_string(),
            dimmed: "dark_gray".to_string(),
            controls_bg: "indexed(236)".to_string(),
            text_primary: "white".to_string(),
            text_secondary: "dark_gray".to_string(),
            text_inverse: "black".to_string(),
            sidebar_border: "cyan".to_string(),
            sidebar_selected: "yellow".to_string(),
            chart_border: "white".to_string(),
            keybind_hints: "cyan".to_string(),
            series: ["cyan", "red", "green", "yellow", "magenta", "blue"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        Self::load_from(&ConfigManager::new(app_name)?)
    }

    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        if let Some(user_config) = manager.read_user_config()? {
            config.merge(user_config);
        }
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.dataset.merge(other.dataset);
        self.filters.merge(other.filters);
        self.charts.merge(other.charts);
        self.display.merge(other.display);
        self.export.merge(other.export);
        self.theme.merge(other.theme);
        self.debug.merge(other.debug);
    }

    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with(CONFIG_VERSION) {
            return Err(eyre!(
                "Unsupported config version: {}. Expected {}.x",
                self.version,
                CONFIG_VERSION
            ));
        }

        if let Some(name) = &self.dataset.compression {
            if crate::CompressionFormat::from_name(name).is_none() {
                return Err(eyre!(
                    "Invalid compression: {}. Must be one of gzip, zstd, bzip2, xz",
                    name
                ));
            }
        }
        if let Some(delimiter) = self.dataset.delimiter {
            if !delimiter.is_ascii() {
                return Err(eyre!("delimiter must be a single ASCII character"));
            }
        }

        if self.filters.columns.is_empty() {
            return Err(eyre!("filters.columns must name at least one column"));
        }

        if self.display.event_poll_interval_ms == 0 {
            return Err(eyre!("event_poll_interval_ms must be greater than 0"));
        }
        if self.display.sidebar_width < 12 {
            return Err(eyre!("sidebar_width must be at least 12"));
        }

        if self.export_format().is_none() {
            return Err(eyre!(
                "Invalid export format: {}. Must be 'png' or 'svg'",
                self.export.format
            ));
        }
        if self.export.width == 0 || self.export.height == 0 {
            return Err(eyre!("export width and height must be greater than 0"));
        }

        match self.theme.color_mode.as_str() {
            "light" | "dark" | "auto" => {}
            _ => {
                return Err(eyre!(
                    "Invalid color_mode: {}. Must be 'light', 'dark', or 'auto'",
                    self.theme.color_mode
                ))
            }
        }

        let parser = ColorParser::new();
        self.theme.colors.validate(&parser)?;

        Ok(())
    }

    pub fn export_format(&self) -> Option<ExportFormat> {
        ExportFormat::from_name(&self.export.format)
    }
}

impl DatasetConfig {
    pub fn merge(&mut self, other: Self) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
    }
}

impl FiltersConfig {
    pub fn merge(&mut self, other: Self) {
        if other != FiltersConfig::default() {
            self.columns = other.columns;
        }
    }
}

impl ChartsConfig {
    pub fn merge(&mut self, other: Self) {
        if other.catalog.is_some() {
            self.catalog = other.catalog;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DisplayConfig::default();
        if other.default_tab != default.default_tab {
            self.default_tab = other.default_tab;
        }
        if other.event_poll_interval_ms != default.event_poll_interval_ms {
            self.event_poll_interval_ms = other.event_poll_interval_ms;
        }
        if other.sidebar_width != default.sidebar_width {
            self.sidebar_width = other.sidebar_width;
        }
        if other.rotation_step_degrees != default.rotation_step_degrees {
            self.rotation_step_degrees = other.rotation_step_degrees;
        }
    }
}

impl ExportConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ExportConfig::default();
        if other.format != default.format {
            self.format = other.format;
        }
        if other.width != default.width {
            self.width = other.width;
        }
        if other.height != default.height {
            self.height = other.height;
        }
        if other.directory.is_some() {
            self.directory = other.directory;
        }
    }
}

impl ThemeConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ThemeConfig::default();
        if other.color_mode != default.color_mode {
            self.color_mode = other.color_mode;
        }
        self.colors.merge(other.colors);
    }
}

impl ColorConfig {
    /// Every single-color setting paired with its config key.
    fn named(&self) -> [(&'static str, &String); 12] {
        [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("error", &self.error),
            ("dimmed", &self.dimmed),
            ("controls_bg", &self.controls_bg),
            ("text_primary", &self.text_primary),
            ("text_secondary", &self.text_secondary),
            ("text_inverse", &self.text_inverse),
            ("sidebar_border", &self.sidebar_border),
            ("sidebar_selected", &self.sidebar_selected),
            ("chart_border", &self.chart_border),
            ("keybind_hints", &self.keybind_hints),
        ]
    }

    fn named_mut(&mut self) -> [(&'static str, &mut String); 12] {
        [
            ("primary", &mut self.primary),
            ("secondary", &mut self.secondary),
            ("error", &mut self.error),
            ("dimmed", &mut self.dimmed),
            ("controls_bg", &mut self.controls_bg),
            ("text_primary", &mut self.text_primary),
            ("text_secondary", &mut self.text_secondary),
            ("text_inverse", &mut self.text_inverse),
            ("sidebar_border", &mut self.sidebar_border),
            ("sidebar_selected", &mut self.sidebar_selected),
            ("chart_border", &mut self.chart_border),
            ("keybind_hints", &mut self.keybind_hints),
        ]
    }

    fn validate(&self, parser: &ColorParser) -> Result<()> {
        for (name, value) in self.named() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for '{}': {}", name, e))?;
        }
        if self.series.is_empty() {
            return Err(eyre!("theme.colors.series must list at least one color"));
        }
        for (idx, value) in self.series.iter().enumerate() {
            parser
                .parse(value)
                .map_err(|e| eyre!("Invalid color value for 'series[{}]': {}", idx, e))?;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: Self) {
        let default = ColorConfig::default();
        let incoming: HashMap<&str, &String> = other.named().into_iter().collect();
        let slots = self.named_mut().into_iter().zip(default.named());
        for ((name, slot), (_, default_value)) in slots {
            if let Some(value) = incoming.get(name) {
                if *value != default_value {
                    *slot = (*value).clone();
                }
            }
        }
        if other.series != default.series {
            self.series = other.series;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
        if other.log_filter.is_some() {
            self.log_filter = other.log_filter;
        }
    }
}

/// Color parser with terminal capability detection
pub struct ColorParser {
    supports_true_color: bool,
    supports_256: bool,
    no_color: bool,
}

impl ColorParser {
    pub fn new() -> Self {
        let support = supports_color::on(Stream::Stdout);
        Self {
            supports_true_color: support.as_ref().map(|s| s.has_16m).unwrap_or(false),
            supports_256: support.as_ref().map(|s| s.has_256).unwrap_or(false),
            no_color: std::env::var("NO_COLOR").is_ok(),
        }
    }

    /// Parser with fixed capabilities, independent of the current terminal
    pub fn with_capabilities(supports_true_color: bool, supports_256: bool) -> Self {
        Self {
            supports_true_color,
            supports_256,
            no_color: false,
        }
    }

    /// Parse `#rrggbb`, `indexed(N)` or a color name
    pub fn parse(&self, s: &str) -> Result<Color> {
        if self.no_color {
            return Ok(Color::Reset);
        }

        let trimmed = s.trim();
        if trimmed.starts_with('#') {
            let (r, g, b) = parse_hex(trimmed)?;
            return Ok(self.fit_rgb(r, g, b));
        }

        let lower = trimmed.to_lowercase();
        if let Some(inner) = lower
            .strip_prefix("indexed(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return inner.trim().parse::<u8>().map(Color::Indexed).map_err(|_| {
                eyre!(
                    "Invalid indexed color: '{}'. Expected format: indexed(0-255)",
                    trimmed
                )
            });
        }

        named_color(&lower.replace(' ', "_")).ok_or_else(|| {
            eyre!(
                "Unknown color name: '{}'. Use an ANSI name (red, bright_blue, dark_gray), \
                 indexed(N) or #rrggbb",
                trimmed
            )
        })
    }

    fn fit_rgb(&self, r: u8, g: u8, b: u8) -> Color {
        if self.supports_true_color {
            Color::Rgb(r, g, b)
        } else if self.supports_256 {
            Color::Indexed(rgb_to_256_color(r, g, b))
        } else {
            rgb_to_basic_ansi(r, g, b)
        }
    }
}

impl Default for ColorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn named_color(name: &str) -> Option<Color> {
    let color = match name {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" | "dark_gray" | "dark_grey" | "bright_black" => Color::Indexed(8),
        "light_gray" | "light_grey" => Color::Indexed(7),
        "bright_red" => Color::Indexed(9),
        "bright_green" => Color::Indexed(10),
        "bright_yellow" => Color::Indexed(11),
        "bright_blue" => Color::Indexed(12),
        "bright_magenta" => Color::Indexed(13),
        "bright_cyan" => Color::Indexed(14),
        "bright_white" => Color::Indexed(15),
        "reset" | "reversed" => Color::Reset,
        _ => return None,
    };
    Some(color)
}

fn parse_hex(s: &str) -> Result<(u8, u8, u8)> {
    let digits = s
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.is_ascii())
        .ok_or_else(|| eyre!("Invalid hex color format: '{}'. Expected format: #rrggbb", s))?;
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| eyre!("Invalid hex color: {}", s))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Nearest entry in the xterm 256-color palette
pub fn rgb_to_256_color(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as u16, g as u16, b as u16);
    let spread = r.max(g).max(b) - r.min(g).min(b);
    if spread < 10 {
        let gray = (r + g + b) / 3;
        return match gray {
            0..=7 => 16,
            248.. => 231,
            _ => 232 + ((gray - 8) * 24 / 240) as u8,
        };
    }
    let level = |c: u16| (c * 5 / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

/// Nearest of the eight basic ANSI colors
pub fn rgb_to_basic_ansi(r: u8, g: u8, b: u8) -> Color {
    let spread = r.max(g).max(b) - r.min(g).min(b);
    if spread < 30 {
        let avg = (r as u16 + g as u16 + b as u16) / 3;
        return if avg < 64 { Color::Black } else { Color::White };
    }
    match (r > 128, g > 128, b > 128) {
        (false, false, false) => Color::Black,
        (true, false, false) => Color::Red,
        (false, true, false) => Color::Green,
        (true, true, false) => Color::Yellow,
        (false, false, true) => Color::Blue,
        (true, false, true) => Color::Magenta,
        (false, true, true) => Color::Cyan,
        (true, true, true) => Color::White,
    }
}

/// Theme containing parsed colors ready for use
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: HashMap<String, Color>,
    pub series: Vec<Color>,
}

impl Theme {
    pub fn from_config(config: &ThemeConfig) -> Result<Self> {
        Self::from_config_with(config, &ColorParser::new())
    }

    pub fn from_config_with(config: &ThemeConfig, parser: &ColorParser) -> Result<Self> {
        let mut colors = HashMap::new();
        for (name, value) in config.colors.named() {
            colors.insert(name.to_string(), parser.parse(value)?);
        }
        let series = config
            .colors
            .series
            .iter()
            .map(|value| parser.parse(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { colors, series })
    }

    /// Get a color by name, returns Reset if not found
    pub fn get(&self, name: &str) -> Color {
        self.colors.get(name).copied().unwrap_or(Color::Reset)
    }

    /// Color for the `idx`-th group of a chart
    pub fn series_color(&self, idx: usize) -> Color {
        if self.series.is_empty() {
            return Color::Reset;
        }
        self.series[idx % self.series.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        let parser = ColorParser::with_capabilities(true, true);
        Self::from_config_with(&ThemeConfig::default(), &parser).unwrap_or_else(|_| Self {
            colors: HashMap::new(),
            series: vec![Color::Cyan, Color::Red],
        })
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
