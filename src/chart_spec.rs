//! Declarative chart catalog: one table of (tab, kind, column roles).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::dataset::Table;
use crate::error::{DashboardError, Result};
use crate::TabName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardTab {
    Overview,
    Drivers,
    Demographics,
    #[serde(rename = "3d")]
    ThreeD,
}

impl DashboardTab {
    pub const ALL: [Self; 4] = [Self::Overview, Self::Drivers, Self::Demographics, Self::ThreeD];

    pub fn title(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Drivers => "Attrition Drivers",
            Self::Demographics => "Demographics",
            Self::ThreeD => "3D Analysis",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl From<TabName> for DashboardTab {
    fn from(tab: TabName) -> Self {
        match tab {
            TabName::Overview => Self::Overview,
            TabName::Drivers => Self::Drivers,
            TabName::Demographics => Self::Demographics,
            TabName::ThreeD => Self::ThreeD,
        }
    }
}

/// How bars of different color groups share a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarMode {
    #[default]
    Stacked,
    Grouped,
}

/// Chart kind and the columns bound to each encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartKind {
    /// Row counts per x value (or per numeric bin when `bins` is set), split by `color`.
    Histogram {
        x: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bins: Option<usize>,
        #[serde(default)]
        bar_mode: BarMode,
    },
    Box {
        x: String,
        y: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Violin {
        x: String,
        y: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Scatter3d {
        x: String,
        y: String,
        z: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
}

impl ChartKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Histogram { .. } => "histogram",
            Self::Box { .. } => "box",
            Self::Violin { .. } => "violin",
            Self::Scatter3d { .. } => "scatter3d",
        }
    }

    /// Every column the chart reads, in encoding order, without duplicates.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match self {
            Self::Histogram { x, color, .. } => {
                push_unique(&mut out, Some(x));
                push_unique(&mut out, color.as_ref());
            }
            Self::Box { x, y, color } | Self::Violin { x, y, color } => {
                push_unique(&mut out, Some(x));
                push_unique(&mut out, Some(y));
                push_unique(&mut out, color.as_ref());
            }
            Self::Scatter3d {
                x,
                y,
                z,
                color,
                symbol,
            } => {
                push_unique(&mut out, Some(x));
                push_unique(&mut out, Some(y));
                push_unique(&mut out, Some(z));
                push_unique(&mut out, color.as_ref());
                push_unique(&mut out, symbol.as_ref());
            }
        }
        out
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: Option<&'a String>) {
    if let Some(name) = name {
        if !out.contains(&name.as_str()) {
            out.push(name.as_str());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub tab: DashboardTab,
    #[serde(flatten)]
    pub kind: ChartKind,
}

/// The ordered set of charts shown by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChartCatalog {
    pub charts: Vec<ChartSpec>,
}

fn spec(id: &str, tab: DashboardTab, title: &str, description: &str, kind: ChartKind) -> ChartSpec {
    ChartSpec {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        tab,
        kind,
    }
}

fn counts(x: &str, bar_mode: BarMode) -> ChartKind {
    ChartKind::Histogram {
        x: x.to_string(),
        color: Some("Attrition".to_string()),
        bins: None,
        bar_mode,
    }
}

fn by_attrition_box(y: &str) -> ChartKind {
    ChartKind::Box {
        x: "Attrition".to_string(),
        y: y.to_string(),
        color: Some("Attrition".to_string()),
    }
}

fn by_attrition_violin(y: &str) -> ChartKind {
    ChartKind::Violin {
        x: "Attrition".to_string(),
        y: y.to_string(),
        color: Some("Attrition".to_string()),
    }
}

fn cloud(x: &str, y: &str, z: &str) -> ChartKind {
    ChartKind::Scatter3d {
        x: x.to_string(),
        y: y.to_string(),
        z: z.to_string(),
        color: Some("Attrition".to_string()),
        symbol: Some("Attrition".to_string()),
    }
}

impl ChartCatalog {
    pub fn new(charts: Vec<ChartSpec>) -> Self {
        Self { charts }
    }

    /// The dashboard's own chart sequence.
    pub fn builtin() -> Self {
        use BarMode::{Grouped, Stacked};
        use DashboardTab::*;

        Self::new(vec![
            spec(
                "attrition-count",
                Overview,
                "Attrition Count",
                "How many employees are leaving vs. staying.",
                counts("Attrition", Stacked),
            ),
            spec(
                "attrition-by-department",
                Overview,
                "Attrition by Department",
                "Which departments are most affected by attrition.",
                counts("Department", Grouped),
            ),
            spec(
                "attrition-by-job-role",
                Overview,
                "Attrition by Job Role",
                "Which job roles have the highest exit rates.",
                counts("JobRole", Grouped),
            ),
            spec(
                "age-vs-attrition",
                Drivers,
                "Age vs Attrition",
                "Are younger or older employees more likely to leave?",
                by_attrition_box("Age"),
            ),
            spec(
                "income-vs-attrition",
                Drivers,
                "Monthly Income vs Attrition",
                "Whether compensation has an effect on attrition.",
                by_attrition_box("MonthlyIncome"),
            ),
            spec(
                "tenure-vs-attrition",
                Drivers,
                "Years at Company vs Attrition",
                "How tenure relates to attrition risk.",
                ChartKind::Histogram {
                    x: "YearsAtCompany".to_string(),
                    color: Some("Attrition".to_string()),
                    bins: Some(30),
                    bar_mode: Stacked,
                },
            ),
            spec(
                "environment-satisfaction",
                Drivers,
                "Environment Satisfaction",
                "Low satisfaction scores may indicate poor working conditions.",
                counts("EnvironmentSatisfaction", Stacked),
            ),
            spec(
                "work-life-balance",
                Drivers,
                "Work-Life Balance",
                "Whether employees are able to maintain personal balance.",
                counts("WorkLifeBalance", Stacked),
            ),
            spec(
                "overtime-status",
                Drivers,
                "Overtime Status",
                "Overworked employees may be more likely to quit.",
                counts("OverTime", Grouped),
            ),
            spec(
                "job-satisfaction",
                Drivers,
                "Job Satisfaction",
                "Low job satisfaction is often a precursor to attrition.",
                counts("JobSatisfaction", Stacked),
            ),
            spec(
                "relationship-satisfaction",
                Drivers,
                "Relationship Satisfaction",
                "Workplace relationships and the decision to stay.",
                counts("RelationshipSatisfaction", Stacked),
            ),
            spec(
                "stock-option-level",
                Drivers,
                "Stock Option Level",
                "Equity participation among leavers and stayers.",
                counts("StockOptionLevel", Grouped),
            ),
            spec(
                "years-since-promotion",
                Drivers,
                "Years Since Last Promotion",
                "Stalled careers and attrition.",
                counts("YearsSinceLastPromotion", Stacked),
            ),
            spec(
                "training-times",
                Drivers,
                "Training Times Last Year",
                "Investment in training for leavers and stayers.",
                counts("TrainingTimesLastYear", Grouped),
            ),
            spec(
                "distance-violin",
                Drivers,
                "Distance From Home vs Attrition",
                "Commute length distribution for leavers and stayers.",
                by_attrition_violin("DistanceFromHome"),
            ),
            spec(
                "experience-violin",
                Drivers,
                "Total Working Years vs Attrition",
                "Career length distribution for leavers and stayers.",
                by_attrition_violin("TotalWorkingYears"),
            ),
            spec(
                "gender-distribution",
                Demographics,
                "Gender Distribution",
                "Whether one gender is more prone to leave.",
                counts("Gender", Grouped),
            ),
            spec(
                "marital-status",
                Demographics,
                "Marital Status",
                "Marital status can correlate with job switching behavior.",
                counts("MaritalStatus", Grouped),
            ),
            spec(
                "education-field",
                Demographics,
                "Education Field",
                "Some academic backgrounds may experience higher turnover.",
                counts("EducationField", Grouped),
            ),
            spec(
                "business-travel",
                Demographics,
                "Business Travel Frequency",
                "Excessive travel demands may increase attrition risk.",
                counts("BusinessTravel", Grouped),
            ),
            spec(
                "performance-rating",
                Demographics,
                "Performance Rating",
                "Do low or high performers tend to leave?",
                counts("PerformanceRating", Stacked),
            ),
            spec(
                "age-income-experience",
                ThreeD,
                "Age vs Income vs Working Years",
                "How age, pay and experience affect attrition.",
                cloud("Age", "MonthlyIncome", "TotalWorkingYears"),
            ),
            spec(
                "tenure-satisfaction-distance",
                ThreeD,
                "Years at Company vs Job Satisfaction vs Commute Distance",
                "Loyalty, job contentment and distance.",
                cloud("YearsAtCompany", "JobSatisfaction", "DistanceFromHome"),
            ),
        ])
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(text)
            .map_err(|e| DashboardError::Config(format!("invalid chart catalog: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read chart catalog {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DashboardError::Config(format!("cannot serialize chart catalog: {e}")))
    }

    /// Structural checks that do not need the data: unique ids, sane bin counts.
    pub fn validate(&self) -> Result<()> {
        if self.charts.is_empty() {
            return Err(DashboardError::Config("chart catalog is empty".into()));
        }
        let mut seen = HashSet::new();
        for chart in &self.charts {
            if !seen.insert(chart.id.as_str()) {
                return Err(DashboardError::Config(format!(
                    "duplicate chart id '{}'",
                    chart.id
                )));
            }
            if let ChartKind::Histogram { bins: Some(0), .. } = chart.kind {
                return Err(DashboardError::Config(format!(
                    "chart '{}': bins must be greater than 0",
                    chart.id
                )));
            }
        }
        Ok(())
    }

    /// (chart id, column) pairs naming columns the table does not have.
    pub fn unknown_columns(&self, table: &Table) -> Vec<(String, String)> {
        self.charts
            .iter()
            .flat_map(|chart| {
                chart
                    .kind
                    .columns()
                    .into_iter()
                    .filter(|column| !table.has_column(column))
                    .map(|column| (chart.id.clone(), column.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ChartSpec> {
        self.charts.iter().find(|c| c.id == id)
    }

    /// Catalog positions of the charts on `tab`, in catalog order.
    pub fn positions_for_tab(&self, tab: DashboardTab) -> Vec<usize> {
        self.charts
            .iter()
            .enumerate()
            .filter(|(_, c)| c.tab == tab)
            .map(|(idx, _)| idx)
            .collect()
    }
}
