//! Filter registry: column domains and the per-session filter selection.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::dataset::Table;
use crate::error::{DashboardError, Result};

/// Columns exposed as multi-select filters when the config does not override them.
pub const DEFAULT_FILTER_COLUMNS: [&str; 5] =
    ["Department", "JobRole", "Gender", "MaritalStatus", "OverTime"];

/// The display key of one cell. `None` is a null cell.
///
/// Numeric keys sort numerically ("2" before "10"), then text keys
/// lexicographically; nulls sort first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterValue(Option<String>);

impl FilterValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    fn numeric(&self) -> Option<f64> {
        self.0
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Option<&str>> for FilterValue {
    fn from(value: Option<&str>) -> Self {
        Self(value.map(str::to_string))
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(s) => f.write_str(s),
            None => f.write_str("(null)"),
        }
    }
}

impl Ord for FilterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => match (self.numeric(), other.numeric()) {
                (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }
}

impl PartialOrd for FilterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Render a column as comparable string keys, one per row.
pub(crate) fn string_keys(column: &Column) -> PolarsResult<StringChunked> {
    let as_text = column.cast(&DataType::String)?;
    Ok(as_text.str()?.clone())
}

fn key_error(column: &str, e: PolarsError) -> DashboardError {
    DashboardError::spec_mismatch(
        format!("filter {column}"),
        format!("values cannot be compared as text: {e}"),
    )
}

/// Distinct values of `column`, independent of row order.
pub fn domain(table: &Table, column: &str) -> Result<BTreeSet<FilterValue>> {
    let values = table.require_column(column)?;
    let keys = string_keys(values).map_err(|e| key_error(column, e))?;
    let distinct: BTreeSet<Option<&str>> = keys.iter().collect();
    Ok(distinct.into_iter().map(FilterValue::from).collect())
}

/// Per-session selection: for each constrained column, the checked values.
///
/// A column absent from the map is unconstrained; a column mapped to an
/// empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    selected: BTreeMap<String, BTreeSet<FilterValue>>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.set(column, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn set(&mut self, column: &str, values: BTreeSet<FilterValue>) {
        self.selected.insert(column.to_string(), values);
    }

    pub fn get(&self, column: &str) -> Option<&BTreeSet<FilterValue>> {
        self.selected.get(column)
    }

    /// Stop constraining `column`.
    pub fn remove(&mut self, column: &str) -> Option<BTreeSet<FilterValue>> {
        self.selected.remove(column)
    }

    pub fn is_selected(&self, column: &str, value: &FilterValue) -> bool {
        self.selected
            .get(column)
            .map(|values| values.contains(value))
            .unwrap_or(true)
    }

    /// Flip one value; returns whether it is selected afterwards.
    pub fn toggle(&mut self, column: &str, value: &FilterValue) -> bool {
        let values = self.selected.entry(column.to_string()).or_default();
        if values.remove(value) {
            false
        } else {
            values.insert(value.clone());
            true
        }
    }

    pub fn select_all(&mut self, column: &str, domain: &BTreeSet<FilterValue>) {
        self.set(column, domain.clone());
    }

    pub fn clear(&mut self, column: &str) {
        self.set(column, BTreeSet::new());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.selected.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<FilterValue>)> {
        self.selected.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// True when some constrained column has nothing selected.
    pub fn excludes_everything(&self) -> bool {
        self.selected.values().any(BTreeSet::is_empty)
    }

    /// Componentwise subset: every constraint in `other` is at least as loose
    /// as the matching constraint here. A column missing from `self` is
    /// unconstrained and therefore only a subset of another missing column.
    pub fn is_subset_of(&self, other: &FilterSelection) -> bool {
        other.selected.iter().all(|(column, wider)| {
            self.selected
                .get(column)
                .map(|narrower| narrower.is_subset(wider))
                .unwrap_or(false)
        })
    }

    /// Parse a `COL=V1,V2` assignment as given on the command line.
    /// `COL=` selects nothing.
    pub fn parse_assignment(text: &str) -> Result<(String, BTreeSet<FilterValue>)> {
        let (column, values) = text.split_once('=').ok_or_else(|| {
            DashboardError::Config(format!("filter '{text}' must look like COLUMN=VALUE[,VALUE]"))
        })?;
        let column = column.trim();
        if column.is_empty() {
            return Err(DashboardError::Config(format!(
                "filter '{text}' has an empty column name"
            )));
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(FilterValue::from)
            .collect();
        Ok((column.to_string(), values))
    }
}

/// Filterable columns and their domains for one table.
#[derive(Debug, Clone)]
pub struct FilterRegistry {
    columns: Vec<String>,
    domains: BTreeMap<String, BTreeSet<FilterValue>>,
}

impl FilterRegistry {
    /// Compute every domain once. Any column missing from the table is fatal.
    pub fn new<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Self> {
        let mut names = Vec::with_capacity(columns.len());
        let mut domains = BTreeMap::new();
        for column in columns {
            let column = column.as_ref();
            if domains.contains_key(column) {
                continue;
            }
            domains.insert(column.to_string(), domain(table, column)?);
            names.push(column.to_string());
        }
        Ok(Self {
            columns: names,
            domains,
        })
    }

    pub fn with_default_columns(table: &Table) -> Result<Self> {
        Self::new(table, &DEFAULT_FILTER_COLUMNS)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn domain(&self, column: &str) -> Option<&BTreeSet<FilterValue>> {
        self.domains.get(column)
    }

    /// Every filterable column with its whole domain selected.
    pub fn default_selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::new();
        for column in &self.columns {
            if let Some(domain) = self.domains.get(column) {
                selection.select_all(column, domain);
            }
        }
        selection
    }

    /// Check that a selection only names registered columns and known values.
    pub fn validate(&self, selection: &FilterSelection) -> Result<()> {
        for (column, values) in selection.iter() {
            let domain = self
                .domains
                .get(column)
                .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;
            if let Some(unknown) = values.iter().find(|v| !domain.contains(v)) {
                return Err(DashboardError::Config(format!(
                    "value '{unknown}' does not occur in column '{column}'"
                )));
            }
        }
        Ok(())
    }

    /// Default selection with the given `COL=V1,V2` assignments applied on top.
    pub fn selection_from_assignments<S: AsRef<str>>(
        &self,
        assignments: &[S],
    ) -> Result<FilterSelection> {
        let mut selection = self.default_selection();
        let mut overrides = FilterSelection::new();
        for assignment in assignments {
            let (column, values) = FilterSelection::parse_assignment(assignment.as_ref())?;
            overrides.set(&column, values);
        }
        self.validate(&overrides)?;
        for (column, values) in overrides.iter() {
            selection.set(column, values.clone());
        }
        Ok(selection)
    }
}
