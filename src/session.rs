//! Per-session pipeline: selection state plus an explicit recompute step.

use std::sync::Arc;
use tracing::{info, warn};

use crate::chart_data::{render, Chart};
use crate::chart_spec::{ChartCatalog, ChartSpec, DashboardTab};
use crate::dataset::Table;
use crate::error::{DashboardError, Result};
use crate::filter::{FilterRegistry, FilterSelection, FilterValue};
use crate::filter_engine::apply;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Showing the last render pass, waiting for a selection change.
    #[default]
    Idle,
    Recomputing,
}

/// Result of rendering one catalog entry. Failures stay with their chart.
#[derive(Debug, Clone)]
pub struct ChartOutcome {
    pub position: usize,
    pub id: String,
    pub result: Result<Chart>,
}

impl ChartOutcome {
    pub fn chart(&self) -> Option<&Chart> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DashboardError> {
        self.result.as_ref().err()
    }
}

/// Every chart rendered against one filtered view.
#[derive(Debug, Clone)]
pub struct RenderPass {
    pub generation: u64,
    /// Rows in the filtered view.
    pub rows: usize,
    pub outcomes: Vec<ChartOutcome>,
}

impl RenderPass {
    pub fn get(&self, position: usize) -> Option<&ChartOutcome> {
        self.outcomes.get(position)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChartOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Filter the table and render every chart in the catalog.
///
/// Only the filter step can fail the pass; a chart that cannot be rendered
/// is recorded as a failed outcome and the remaining charts still render.
pub fn render_pass(
    table: &Table,
    catalog: &ChartCatalog,
    selection: &FilterSelection,
    generation: u64,
) -> Result<RenderPass> {
    let view = apply(table, selection)?;
    let outcomes = catalog
        .charts
        .iter()
        .enumerate()
        .map(|(position, spec)| ChartOutcome {
            position,
            id: spec.id.clone(),
            result: render(&view, spec),
        })
        .collect();
    Ok(RenderPass {
        generation,
        rows: view.height(),
        outcomes,
    })
}

/// One user's view of the dashboard. The table, registry and catalog are
/// shared read-only; the selection and the last render pass are private.
#[derive(Debug)]
pub struct Session {
    table: Arc<Table>,
    registry: Arc<FilterRegistry>,
    catalog: Arc<ChartCatalog>,
    selection: FilterSelection,
    state: PipelineState,
    generation: u64,
    last: Option<RenderPass>,
}

impl Session {
    /// Start with every filter value selected and render once.
    pub fn new(
        table: Arc<Table>,
        registry: Arc<FilterRegistry>,
        catalog: Arc<ChartCatalog>,
    ) -> Result<Self> {
        let selection = registry.default_selection();
        Self::with_selection(table, registry, catalog, selection)
    }

    pub fn with_selection(
        table: Arc<Table>,
        registry: Arc<FilterRegistry>,
        catalog: Arc<ChartCatalog>,
        selection: FilterSelection,
    ) -> Result<Self> {
        registry.validate(&selection)?;
        let mut session = Self {
            table,
            registry,
            catalog,
            selection,
            state: PipelineState::Idle,
            generation: 0,
            last: None,
        };
        session.recompute()?;
        Ok(session)
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ChartCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Generation of the most recently started recompute.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_pass(&self) -> Option<&RenderPass> {
        self.last.as_ref()
    }

    pub fn outcome(&self, position: usize) -> Option<&ChartOutcome> {
        self.last.as_ref().and_then(|pass| pass.get(position))
    }

    /// Catalog positions and specs shown on `tab`.
    pub fn charts_on(&self, tab: DashboardTab) -> Vec<(usize, &ChartSpec)> {
        self.catalog
            .positions_for_tab(tab)
            .into_iter()
            .map(|position| (position, &self.catalog.charts[position]))
            .collect()
    }

    /// Rerun filter and render for the current selection.
    pub fn recompute(&mut self) -> Result<&RenderPass> {
        self.state = PipelineState::Recomputing;
        self.generation += 1;
        let result = render_pass(&self.table, &self.catalog, &self.selection, self.generation);
        self.state = PipelineState::Idle;

        let pass = result?;
        for failed in pass.failures() {
            if let Some(err) = failed.error() {
                warn!(chart = %failed.id, error = %err, "chart render failed");
            }
        }
        info!(
            generation = pass.generation,
            rows = pass.rows,
            charts = pass.outcomes.len(),
            failed = pass.failures().count(),
            "render pass complete"
        );
        self.accept(pass);
        self.last
            .as_ref()
            .ok_or_else(|| DashboardError::Config("render pass was discarded".into()))
    }

    /// Install a render pass unless a newer generation has been started.
    /// Returns whether the pass was kept.
    pub fn accept(&mut self, pass: RenderPass) -> bool {
        if pass.generation < self.generation {
            warn!(
                stale = pass.generation,
                current = self.generation,
                "discarding stale render pass"
            );
            return false;
        }
        self.last = Some(pass);
        true
    }

    fn require_filter(&self, column: &str) -> Result<()> {
        if self.registry.domain(column).is_none() {
            return Err(DashboardError::UnknownColumn(column.to_string()));
        }
        Ok(())
    }

    /// Flip one value and recompute. Returns whether it is now selected.
    /// Values outside the column's domain are rejected.
    pub fn toggle(&mut self, column: &str, value: &FilterValue) -> Result<bool> {
        let domain = self
            .registry
            .domain(column)
            .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;
        if !domain.contains(value) {
            return Err(DashboardError::Config(format!(
                "value '{value}' does not occur in column '{column}'"
            )));
        }
        let selected = self.selection.toggle(column, value);
        self.recompute()?;
        Ok(selected)
    }

    pub fn select_all(&mut self, column: &str) -> Result<&RenderPass> {
        let domain = self
            .registry
            .domain(column)
            .ok_or_else(|| DashboardError::UnknownColumn(column.to_string()))?;
        self.selection.select_all(column, domain);
        self.recompute()
    }

    pub fn clear(&mut self, column: &str) -> Result<&RenderPass> {
        self.require_filter(column)?;
        self.selection.clear(column);
        self.recompute()
    }

    /// Replace the whole selection. Rejected selections leave the session unchanged.
    pub fn set_selection(&mut self, selection: FilterSelection) -> Result<&RenderPass> {
        self.registry.validate(&selection)?;
        self.selection = selection;
        self.recompute()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_spec::{BarMode, ChartKind};
    use polars::prelude::*;

    fn table() -> Arc<Table> {
        Arc::new(
            df!(
                "Department" => &["Sales", "Sales", "R&D"],
                "Attrition" => &["Yes", "No", "Yes"],
                "Age" => &[41i64, 49, 37]
            )
            .unwrap()
            .into(),
        )
    }

    fn chart(id: &str, x: &str) -> ChartSpec {
        ChartSpec {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            tab: DashboardTab::Overview,
            kind: ChartKind::Histogram {
                x: x.into(),
                color: None,
                bins: None,
                bar_mode: BarMode::Stacked,
            },
        }
    }

    fn session() -> Session {
        let table = table();
        let registry = Arc::new(FilterRegistry::new(&table, &["Department", "Attrition"]).unwrap());
        let catalog = Arc::new(ChartCatalog::new(vec![
            chart("attrition", "Attrition"),
            chart("missing", "Salary"),
            chart("age", "Age"),
        ]));
        Session::new(table, registry, catalog).unwrap()
    }

    #[test]
    fn starts_idle_with_a_full_pass() {
        let session = session();
        assert_eq!(session.state(), PipelineState::Idle);
        assert_eq!(session.generation(), 1);
        let pass = session.last_pass().unwrap();
        assert_eq!(pass.rows, 3);
        assert_eq!(pass.outcomes.len(), 3);
    }

    #[test]
    fn failing_chart_does_not_block_the_others() {
        let session = session();
        let pass = session.last_pass().unwrap();
        assert!(pass.get(0).unwrap().chart().is_some());
        assert!(matches!(
            pass.get(1).unwrap().error(),
            Some(DashboardError::SpecMismatch { .. })
        ));
        assert!(pass.get(2).unwrap().chart().is_some());
        assert_eq!(pass.failures().count(), 1);
    }

    #[test]
    fn toggling_recomputes_with_a_new_generation() {
        let mut session = session();
        let selected = session
            .toggle("Department", &FilterValue::from("R&D"))
            .unwrap();
        assert!(!selected);
        assert_eq!(session.generation(), 2);
        assert_eq!(session.state(), PipelineState::Idle);
        assert_eq!(session.last_pass().unwrap().rows, 2);

        session.clear("Attrition").unwrap();
        assert_eq!(session.last_pass().unwrap().rows, 0);
        session.select_all("Attrition").unwrap();
        assert_eq!(session.last_pass().unwrap().rows, 2);
        assert_eq!(session.last_pass().unwrap().generation, 4);
    }

    #[test]
    fn stale_passes_are_discarded() {
        let mut session = session();
        session.recompute().unwrap();
        let stale = render_pass(
            session.table(),
            session.catalog(),
            &FilterSelection::new(),
            1,
        )
        .unwrap();
        assert!(!session.accept(stale));
        assert_eq!(session.last_pass().unwrap().generation, 2);
    }

    #[test]
    fn unknown_filter_column_is_rejected() {
        let mut session = session();
        let err = session
            .toggle("Gender", &FilterValue::from("Male"))
            .unwrap_err();
        assert_eq!(err, DashboardError::UnknownColumn("Gender".into()));
        assert_eq!(session.generation(), 1);

        let bad = FilterSelection::new().with("Department", ["Marketing"]);
        assert!(session.set_selection(bad).is_err());
        assert_eq!(session.selection(), &session.registry().default_selection());
    }

    #[test]
    fn toggling_a_value_outside_the_domain_is_rejected() {
        let mut session = session();
        let err = session
            .toggle("Department", &FilterValue::from("Marketing"))
            .unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
        assert_eq!(session.generation(), 1);
        assert_eq!(session.selection(), &session.registry().default_selection());
        let departments = session.selection().get("Department").unwrap();
        assert!(departments.is_subset(session.registry().domain("Department").unwrap()));
    }

    #[test]
    fn sessions_do_not_share_selections() {
        let mut first = session();
        let second = Session::new(
            Arc::clone(first.table()),
            Arc::new(first.registry().clone()),
            Arc::new(first.catalog().clone()),
        )
        .unwrap();
        first.clear("Department").unwrap();
        assert_eq!(first.last_pass().unwrap().rows, 0);
        assert_eq!(second.last_pass().unwrap().rows, 3);
    }
}
