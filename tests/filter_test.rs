mod common;

use attrition_dash::filter::domain;
use attrition_dash::{apply, DashboardError, FilterRegistry, FilterSelection, FilterValue};
use std::collections::BTreeSet;

fn departments(view: &attrition_dash::FilteredView) -> Vec<String> {
    view.column("Department")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

#[test]
fn full_selection_is_the_identity() {
    let (_dir, table) = common::load_fixture();
    let registry = FilterRegistry::with_default_columns(&table).unwrap();
    let view = apply(&table, &registry.default_selection()).unwrap();
    assert_eq!(view.height(), table.height());
    assert_eq!(view.row_indices(), (0..table.height()).collect::<Vec<_>>());
    assert!(view.frame().equals_missing(table.frame()));
}

#[test]
fn any_empty_column_selects_nothing() {
    let (_dir, table) = common::load_fixture();
    let registry = FilterRegistry::with_default_columns(&table).unwrap();
    for column in registry.columns() {
        let mut selection = registry.default_selection();
        selection.clear(column);
        let view = apply(&table, &selection).unwrap();
        assert!(view.is_empty(), "clearing {column} should empty the view");
    }
}

#[test]
fn narrowing_a_selection_never_adds_rows() {
    let (_dir, table) = common::load_fixture();
    let registry = FilterRegistry::with_default_columns(&table).unwrap();
    let wide = registry.default_selection();
    let wide_rows: BTreeSet<usize> = apply(&table, &wide)
        .unwrap()
        .row_indices()
        .iter()
        .copied()
        .collect();

    let mut narrow = wide.clone();
    narrow.toggle("Department", &FilterValue::from("Sales"));
    narrow.toggle("OverTime", &FilterValue::from("Yes"));
    assert!(narrow.is_subset_of(&wide));

    let narrow_rows: BTreeSet<usize> = apply(&table, &narrow)
        .unwrap()
        .row_indices()
        .iter()
        .copied()
        .collect();
    assert!(narrow_rows.is_subset(&wide_rows));
    assert!(narrow_rows.len() < wide_rows.len());

    let mut narrower = narrow.clone();
    narrower.toggle("Gender", &FilterValue::from("Male"));
    let narrower_rows: BTreeSet<usize> = apply(&table, &narrower)
        .unwrap()
        .row_indices()
        .iter()
        .copied()
        .collect();
    assert!(narrower_rows.is_subset(&narrow_rows));
}

#[test]
fn applying_twice_gives_identical_views() {
    let (_dir, table) = common::load_fixture();
    let selection = FilterSelection::new()
        .with("JobRole", ["Manager", "Sales Executive"])
        .with("MaritalStatus", ["Single"]);
    let first = apply(&table, &selection).unwrap();
    let second = apply(&table, &selection).unwrap();
    assert_eq!(first.row_indices(), second.row_indices());
    assert!(first.frame().equals_missing(second.frame()));
}

#[test]
fn three_row_example_keeps_sales_rows_in_order() {
    let table = common::three_row_table();
    let selection = FilterSelection::new().with("Department", ["Sales"]);
    let view = apply(&table, &selection).unwrap();
    assert_eq!(view.row_indices(), &[0, 1]);
    assert_eq!(departments(&view), ["Sales", "Sales"]);
    let attrition: Vec<&str> = view
        .column("Attrition")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect();
    assert_eq!(attrition, ["Yes", "No"]);
}

#[test]
fn department_domain_ignores_row_order() {
    let table = common::three_row_table();
    let expected: BTreeSet<FilterValue> = ["Sales", "R&D"]
        .into_iter()
        .map(FilterValue::from)
        .collect();
    assert_eq!(domain(&table, "Department").unwrap(), expected);

    let reversed: attrition_dash::Table = table.frame().reverse().into();
    assert_eq!(domain(&reversed, "Department").unwrap(), expected);
}

#[test]
fn unknown_filter_column_is_reported() {
    let table = common::three_row_table();
    let selection = FilterSelection::new().with("Gender", ["Male"]);
    let err = apply(&table, &selection).unwrap_err();
    assert_eq!(err, DashboardError::UnknownColumn("Gender".into()));

    let err = FilterRegistry::new(&table, &["Department", "Gender"]).unwrap_err();
    assert_eq!(err, DashboardError::UnknownColumn("Gender".into()));
}

#[test]
fn command_line_assignments_override_defaults() {
    let (_dir, table) = common::load_fixture();
    let registry = FilterRegistry::with_default_columns(&table).unwrap();
    let selection = registry
        .selection_from_assignments(&["Department=Sales, Human Resources", "OverTime="])
        .unwrap();
    assert_eq!(selection.get("Department").unwrap().len(), 2);
    assert!(selection.get("OverTime").unwrap().is_empty());
    assert_eq!(
        selection.get("JobRole"),
        registry.domain("JobRole"),
        "untouched columns stay fully selected"
    );
    assert!(apply(&table, &selection).unwrap().is_empty());

    assert!(registry
        .selection_from_assignments(&["Department=Marketing"])
        .is_err());
    assert!(registry.selection_from_assignments(&["Department"]).is_err());
}
