//! Shared CLI definitions for attrition-dash.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Compression format for data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// Zstandard compression (.zst)
    Zstd,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ compression (.xz)
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Parse the name used in config files ("gzip", "zstd", "bzip2", "xz").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gzip" | "gz" => Some(Self::Gzip),
            "zstd" | "zst" => Some(Self::Zstd),
            "bzip2" | "bz2" => Some(Self::Bzip2),
            "xz" => Some(Self::Xz),
            _ => None,
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Image format used when exporting charts
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Portable Network Graphics bitmap
    #[default]
    Png,
    /// Scalable Vector Graphics
    Svg,
}

impl ExportFormat {
    pub const ALL: [Self; 2] = [Self::Png, Self::Svg];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Svg => "SVG",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// Dashboard tab to open first
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TabName {
    /// Attrition counts overall, by department and by job role
    Overview,
    /// Age, income, tenure, satisfaction and overtime against attrition
    Drivers,
    /// Gender, marital status, education, travel and performance
    Demographics,
    /// Three-dimensional exploratory scatter plots
    #[value(name = "3d")]
    ThreeD,
}

/// Command-line arguments for attrition-dash
#[derive(Clone, Parser, Debug)]
#[command(
    name = "attrition-dash",
    version,
    about = "HR attrition dashboard in the terminal",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path to the attrition data file (defaults to [dataset] path in the config, then EA.csv)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Specify the delimiter to use when reading the file (default: ,)
    #[arg(long = "delimiter")]
    pub delimiter: Option<char>,

    /// Specify that the file has no header row
    #[arg(long = "no-header", action)]
    pub no_header: bool,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz)
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Load the chart catalog from this TOML file instead of the built-in one
    #[arg(long = "charts", value_name = "FILE")]
    pub charts: Option<PathBuf>,

    /// Initial selection for a filter column, e.g. --filter Department=Sales,"Human Resources".
    /// Repeat once per column; columns not named start with every value selected.
    #[arg(long = "filter", value_name = "COL=V1,V2")]
    pub filter: Vec<String>,

    /// Tab to show when the dashboard opens
    #[arg(long = "tab", value_enum)]
    pub tab: Option<TabName>,

    /// Render every chart into this directory and exit without starting the interface
    #[arg(long = "export", value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Image format for exported charts (default: png)
    #[arg(long = "format", value_enum)]
    pub format: Option<ExportFormat>,

    /// Print the chart catalog and exit
    #[arg(long = "list-charts", action)]
    pub list_charts: bool,

    /// Enable debug logging and the debug status line
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data (log files) and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/attrition-dash/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_detection() {
        assert_eq!(
            CompressionFormat::from_extension(Path::new("EA.csv.gz")),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("EA.csv.zst")),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("EA.csv.bz2")),
            Some(CompressionFormat::Bzip2)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("EA.csv.xz")),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(CompressionFormat::from_extension(Path::new("EA.csv")), None);
        assert_eq!(CompressionFormat::from_extension(Path::new("EA")), None);
    }

    #[test]
    fn test_compression_from_name() {
        assert_eq!(
            CompressionFormat::from_name("GZIP"),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(CompressionFormat::from_name("lz4"), None);
    }

    #[test]
    fn test_export_format() {
        assert_eq!(ExportFormat::default(), ExportFormat::Png);
        assert_eq!(ExportFormat::Svg.extension(), "svg");
        assert_eq!(ExportFormat::from_name("SVG"), Some(ExportFormat::Svg));
        assert_eq!(ExportFormat::from_name("eps"), None);
    }

    #[test]
    fn test_parse_filters_and_export() {
        let args = Args::try_parse_from([
            "attrition-dash",
            "EA.csv",
            "--filter",
            "Department=Sales",
            "--filter",
            "OverTime=Yes",
            "--tab",
            "3d",
            "--export",
            "out",
            "--format",
            "svg",
        ])
        .unwrap();
        assert_eq!(args.path, Some(PathBuf::from("EA.csv")));
        assert_eq!(args.filter.len(), 2);
        assert_eq!(args.tab, Some(TabName::ThreeD));
        assert_eq!(args.format, Some(ExportFormat::Svg));
        assert_eq!(args.export, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_force_requires_generate_config() {
        assert!(Args::try_parse_from(["attrition-dash", "--force"]).is_err());
        assert!(Args::try_parse_from(["attrition-dash", "--generate-config", "--force"]).is_ok());
    }

    #[test]
    fn test_options_markdown_lists_flags() {
        let md = render_options_markdown();
        assert!(md.contains("--export"));
        assert!(md.contains("--filter"));
        assert!(!md.contains("--help"));
    }
}
