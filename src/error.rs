//! Error taxonomy for the dashboard pipeline.
//!
//! Loader and registry errors are fatal for a session; renderer errors are
//! isolated to the chart that produced them.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// The dataset file is missing, unreadable or malformed.
    #[error("failed to load {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    /// A filter or chart spec names a column that is not in the loaded schema.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// A chart spec cannot be rendered against the filtered view.
    #[error("chart '{chart}': {reason}")]
    SpecMismatch { chart: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("export failed for {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}

impl DashboardError {
    pub fn data_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn spec_mismatch(chart: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpecMismatch {
            chart: chart.into(),
            reason: reason.into(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Loader and registry failures halt the session; everything else is per chart.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DataLoad { .. } | Self::UnknownColumn(_) | Self::Config(_)
        )
    }
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
