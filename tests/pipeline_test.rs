mod common;

use attrition_dash::{
    open_session, AppConfig, Args, BarMode, Chart, ChartCatalog, ChartKind, ChartSpec,
    DashboardError, DashboardTab, DatasetLoader, FilterRegistry, FilterValue, LoadOptions,
    PipelineState, Session,
};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;

fn fixture_session() -> (tempfile::TempDir, Session) {
    let (dir, table) = common::load_fixture();
    let registry = Arc::new(FilterRegistry::with_default_columns(&table).unwrap());
    let catalog = Arc::new(ChartCatalog::builtin());
    (dir, Session::new(table, registry, catalog).unwrap())
}

#[test]
fn builtin_catalog_renders_over_the_fixture() {
    let (_dir, session) = fixture_session();
    let pass = session.last_pass().unwrap();
    assert_eq!(pass.rows, common::FIXTURE_ROWS);
    assert_eq!(pass.outcomes.len(), session.catalog().len());
    for outcome in &pass.outcomes {
        let chart = outcome
            .chart()
            .unwrap_or_else(|| panic!("{} failed: {:?}", outcome.id, outcome.error()));
        assert!(!chart.is_empty(), "{} is empty", outcome.id);
    }

    let count = session.catalog().get("attrition-count").unwrap();
    let position = session
        .catalog()
        .charts
        .iter()
        .position(|c| c.id == count.id)
        .unwrap();
    match pass.get(position).unwrap().chart().unwrap() {
        Chart::Bars(bars) => {
            assert_eq!(bars.categories, ["No", "Yes"]);
            assert_eq!(bars.total(), common::FIXTURE_ROWS as u64);
        }
        other => panic!("unexpected chart {other:?}"),
    }
}

#[test]
fn missing_column_fails_only_its_chart() {
    let (_dir, table) = common::load_fixture();
    let registry = Arc::new(FilterRegistry::with_default_columns(&table).unwrap());
    let mut charts = ChartCatalog::builtin().charts;
    charts.insert(
        1,
        ChartSpec {
            id: "salary-hike".into(),
            title: "Salary Hike".into(),
            description: String::new(),
            tab: DashboardTab::Overview,
            kind: ChartKind::Histogram {
                x: "PercentSalaryHike".into(),
                color: Some("Attrition".into()),
                bins: None,
                bar_mode: BarMode::Stacked,
            },
        },
    );
    let session = Session::new(table, registry, Arc::new(ChartCatalog::new(charts))).unwrap();

    let pass = session.last_pass().unwrap();
    let failures: Vec<_> = pass.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, "salary-hike");
    assert!(matches!(
        failures[0].error(),
        Some(DashboardError::SpecMismatch { .. })
    ));
    assert_eq!(
        pass.outcomes.iter().filter(|o| o.chart().is_some()).count(),
        pass.outcomes.len() - 1
    );
}

#[test]
fn selection_changes_bump_the_generation() {
    let (_dir, mut session) = fixture_session();
    assert_eq!(session.generation(), 1);

    session.toggle("OverTime", &FilterValue::from("Yes")).unwrap();
    assert_eq!(session.state(), PipelineState::Idle);
    assert_eq!(session.generation(), 2);
    let rows = session.last_pass().unwrap().rows;
    assert_eq!(rows, common::FIXTURE_ROWS - common::FIXTURE_ROWS / 3);

    session.clear("Gender").unwrap();
    let pass = session.last_pass().unwrap();
    assert_eq!(pass.generation, 3);
    assert_eq!(pass.rows, 0);
    assert!(pass
        .outcomes
        .iter()
        .all(|o| o.chart().map_or(false, Chart::is_empty)));
}

#[test]
fn malformed_file_is_a_load_error_without_a_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EA.csv");
    std::fs::write(&path, "Age,Attrition,Department\n41,Yes,Sales\n49,No\n").unwrap();

    let loader = DatasetLoader::new(&path, LoadOptions::default());
    let err = loader.load().unwrap_err();
    assert!(matches!(err, DashboardError::DataLoad { .. }));
    assert!(err.is_fatal());
    assert!(!loader.is_loaded());
}

#[test]
fn loader_returns_the_same_table_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_attrition_csv(dir.path());
    let loader = DatasetLoader::new(&path, LoadOptions::default());
    let first = loader.load().unwrap();
    std::fs::remove_file(&path).unwrap();
    let second = loader.load().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn gzip_dataset_loads() {
    let dir = tempfile::tempdir().unwrap();
    let plain = common::write_attrition_csv(dir.path());
    let gz = dir.path().join("EA.csv.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&gz).unwrap(), Compression::default());
    encoder.write_all(&std::fs::read(&plain).unwrap()).unwrap();
    encoder.finish().unwrap();

    let table = DatasetLoader::new(&gz, LoadOptions::default()).load().unwrap();
    assert_eq!(table.height(), common::FIXTURE_ROWS);
    assert!(table.has_column("MonthlyIncome"));
}

#[test]
fn open_session_applies_command_line_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_attrition_csv(dir.path());
    let args = Args::parse_from([
        "attrition-dash",
        path.to_str().unwrap(),
        "--filter",
        "Department=Sales",
        "--filter",
        "OverTime=No",
    ]);
    let session = open_session(&args, &AppConfig::default()).unwrap();
    let pass = session.last_pass().unwrap();
    assert!(pass.rows > 0);
    assert!(pass.rows < common::FIXTURE_ROWS);
    assert_eq!(session.selection().get("Department").unwrap().len(), 1);
}

#[test]
fn open_session_rejects_a_missing_file() {
    let args = Args::parse_from(["attrition-dash", "/nonexistent/EA.csv"]);
    let err = open_session(&args, &AppConfig::default()).unwrap_err();
    let load = err.downcast_ref::<DashboardError>().unwrap();
    assert!(matches!(load, DashboardError::DataLoad { .. }));
}

#[test]
fn header_only_dataset_renders_empty_charts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EA.csv");
    std::fs::write(&path, "Age,Attrition,MonthlyIncome,DistanceFromHome\n").unwrap();
    let table = DatasetLoader::new(&path, LoadOptions::default()).load().unwrap();
    assert_eq!(table.height(), 0);

    let spec = |id: &str, kind: ChartKind| ChartSpec {
        id: id.into(),
        title: id.into(),
        description: String::new(),
        tab: DashboardTab::Overview,
        kind,
    };
    let charts = vec![
        spec(
            "count",
            ChartKind::Histogram {
                x: "Attrition".into(),
                color: None,
                bins: None,
                bar_mode: BarMode::Grouped,
            },
        ),
        spec(
            "age",
            ChartKind::Histogram {
                x: "Age".into(),
                color: Some("Attrition".into()),
                bins: Some(10),
                bar_mode: BarMode::Stacked,
            },
        ),
        spec(
            "income",
            ChartKind::Box {
                x: "Attrition".into(),
                y: "MonthlyIncome".into(),
                color: None,
            },
        ),
        spec(
            "distance",
            ChartKind::Violin {
                x: "Attrition".into(),
                y: "DistanceFromHome".into(),
                color: Some("Attrition".into()),
            },
        ),
        spec(
            "cloud",
            ChartKind::Scatter3d {
                x: "Age".into(),
                y: "MonthlyIncome".into(),
                z: "DistanceFromHome".into(),
                color: Some("Attrition".into()),
                symbol: None,
            },
        ),
    ];
    let registry = Arc::new(FilterRegistry::new(&table, &["Attrition"]).unwrap());
    let session = Session::new(table, registry, Arc::new(ChartCatalog::new(charts))).unwrap();

    let pass = session.last_pass().unwrap();
    assert_eq!(pass.rows, 0);
    assert_eq!(pass.failures().count(), 0);
    for outcome in &pass.outcomes {
        assert!(outcome.chart().unwrap().is_empty(), "{} drew something", outcome.id);
    }
}
