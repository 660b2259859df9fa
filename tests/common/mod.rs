#![allow(dead_code)]

use attrition_dash::{DatasetLoader, LoadOptions, Table};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const FIXTURE_ROWS: usize = 60;

const DEPARTMENTS: [&str; 3] = ["Sales", "Research & Development", "Human Resources"];
const ROLES: [&str; 5] = [
    "Sales Executive",
    "Research Scientist",
    "Laboratory Technician",
    "Manager",
    "Human Resources",
];
const FIELDS: [&str; 5] = ["Life Sciences", "Medical", "Marketing", "Technical Degree", "Other"];
const TRAVEL: [&str; 3] = ["Travel_Rarely", "Travel_Frequently", "Non-Travel"];
const MARITAL: [&str; 3] = ["Single", "Married", "Divorced"];

fn pick<const N: usize>(values: [&'static str; N], idx: usize) -> String {
    values[idx % N].to_string()
}

fn ints(rows: usize, f: impl Fn(usize) -> i64) -> Vec<i64> {
    (0..rows).map(f).collect()
}

fn texts(rows: usize, f: impl Fn(usize) -> String) -> Vec<String> {
    (0..rows).map(f).collect()
}

fn yes_no(yes: bool) -> String {
    if yes { "Yes" } else { "No" }.to_string()
}

/// Deterministic attrition-shaped frame with every column the built-in
/// catalog and the default filters use.
pub fn attrition_frame(rows: usize) -> DataFrame {
    df!(
        "Age" => ints(rows, |i| 20 + ((i * 7) % 40) as i64),
        "Attrition" => texts(rows, |i| yes_no(i % 4 == 0)),
        "BusinessTravel" => texts(rows, |i| pick(TRAVEL, i)),
        "Department" => texts(rows, |i| pick(DEPARTMENTS, [0, 1, 1, 0, 2][i % 5])),
        "DistanceFromHome" => ints(rows, |i| 1 + ((i * 3) % 29) as i64),
        "EducationField" => texts(rows, |i| pick(FIELDS, i / 2)),
        "EnvironmentSatisfaction" => ints(rows, |i| 1 + (i % 4) as i64),
        "Gender" => texts(rows, |i| if i % 5 < 3 { "Male" } else { "Female" }.to_string()),
        "JobRole" => texts(rows, |i| pick(ROLES, i)),
        "JobSatisfaction" => ints(rows, |i| 1 + ((i / 2) % 4) as i64),
        "MaritalStatus" => texts(rows, |i| pick(MARITAL, i / 3)),
        "MonthlyIncome" => ints(rows, |i| 2000 + ((i * 397) % 15000) as i64),
        "OverTime" => texts(rows, |i| yes_no(i % 3 == 0)),
        "PerformanceRating" => ints(rows, |i| 3 + (i % 2) as i64),
        "RelationshipSatisfaction" => ints(rows, |i| 1 + ((i + 1) % 4) as i64),
        "StockOptionLevel" => ints(rows, |i| (i % 4) as i64),
        "TotalWorkingYears" => ints(rows, |i| ((i * 5) % 35) as i64),
        "TrainingTimesLastYear" => ints(rows, |i| (i % 7) as i64),
        "WorkLifeBalance" => ints(rows, |i| 1 + ((i + 2) % 4) as i64),
        "YearsAtCompany" => ints(rows, |i| ((i * 3) % 25) as i64),
        "YearsSinceLastPromotion" => ints(rows, |i| (i % 8) as i64)
    )
    .unwrap()
}

/// Write the fixture as `EA.csv` inside `dir`.
pub fn write_attrition_csv(dir: &Path) -> PathBuf {
    let path = dir.join("EA.csv");
    let mut df = attrition_frame(FIXTURE_ROWS);
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

/// Load the fixture through the real loader. Keep the directory alive for
/// as long as the table's file is needed.
pub fn load_fixture() -> (tempfile::TempDir, Arc<Table>) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_attrition_csv(dir.path());
    let table = DatasetLoader::new(path, LoadOptions::default())
        .load()
        .unwrap();
    (dir, table)
}

/// The three-row table used by the filter examples.
pub fn three_row_table() -> Table {
    df!(
        "Department" => &["Sales", "Sales", "R&D"],
        "Attrition" => &["Yes", "No", "Yes"]
    )
    .unwrap()
    .into()
}
