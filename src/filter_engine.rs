//! Filter engine: AND of per-column membership masks over the table.

use polars::prelude::*;
use std::collections::HashSet;
use tracing::trace;

use crate::dataset::Table;
use crate::error::{DashboardError, Result};
use crate::filter::{string_keys, FilterSelection};

/// Rows of the table that satisfy every constraint, in original order.
#[derive(Debug, Clone)]
pub struct FilteredView {
    frame: DataFrame,
    rows: Vec<usize>,
}

impl FilteredView {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Original table index of each kept row.
    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.frame.column(name).ok()
    }
}

/// Keep the rows whose value in every selected column is in that column's set.
///
/// Columns not named by `selection` are unconstrained. An empty set for any
/// column yields an empty view. Naming a column the table lacks is
/// `UnknownColumn`.
pub fn apply(table: &Table, selection: &FilterSelection) -> Result<FilteredView> {
    let height = table.height();
    let mut mask = vec![true; height];

    for (column, values) in selection.iter() {
        let cells = table.require_column(column)?;
        if values.is_empty() {
            mask.fill(false);
            continue;
        }
        let keys = string_keys(cells)
            .map_err(|e| DashboardError::spec_mismatch(format!("filter {column}"), e.to_string()))?;
        let wanted: HashSet<Option<&str>> = values.iter().map(|v| v.as_str()).collect();
        for (keep, key) in mask.iter_mut().zip(keys.iter()) {
            if *keep {
                *keep = wanted.contains(&key);
            }
        }
    }

    let rows: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter_map(|(idx, keep)| keep.then_some(idx))
        .collect();
    trace!(kept = rows.len(), of = height, "filter applied");

    let frame = if rows.len() == height {
        table.frame().clone()
    } else {
        let mask = BooleanChunked::from_slice("mask".into(), &mask);
        table
            .frame()
            .filter(&mask)
            .map_err(|e| DashboardError::spec_mismatch("filter", e.to_string()))?
    };

    Ok(FilteredView { frame, rows })
}
