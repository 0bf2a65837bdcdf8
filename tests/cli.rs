mod common;

use assert_cmd::Command;
use common::{STRUCTURE, SURVEY_A, SURVEY_B, TestWorkspace, VALUES};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn steward() -> Command {
    Command::cargo_bin("csv-steward").expect("binary exists")
}

fn two_files(workspace: &TestWorkspace) -> String {
    workspace
        .folder(
            "data",
            &[
                ("a.csv", "id,age\n1,30\n2,40\n"),
                ("b.csv", "id,city\n3,Rome\n"),
            ],
        )
        .to_str()
        .expect("utf-8 path")
        .to_string()
}

#[test]
fn columns_lists_counts_and_locations() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);

    steward()
        .args(["columns", "-f", &folder])
        .assert()
        .success()
        .stdout(contains("column  files").and(contains("id          2")));

    steward()
        .args(["columns", "-f", &folder, "--repeated"])
        .assert()
        .success()
        .stdout(contains("Column 'id' appears in 2 files:\n  - a.csv\n  - b.csv\n"));

    steward()
        .args(["columns", "-f", &folder, "--locate", "zip"])
        .assert()
        .success()
        .stdout(contains("Column 'zip' not found in any file."));
}

#[test]
fn files_detail_shows_shared_and_unique_columns() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);

    steward()
        .args(["files", "-f", &folder, "--detail"])
        .assert()
        .success()
        .stdout(
            contains("Total files loaded: 2")
                .and(contains("    - id (appears in 2 files)"))
                .and(contains("  Unique columns:\n    - age\n")),
        );
}

#[test]
fn rename_dry_run_leaves_files_untouched() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);

    steward()
        .args(["rename", "-f", &folder, "id", "key", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("Would rename 'id' to 'key' in 2 file(s): a.csv, b.csv"));
    assert_eq!(workspace.read("data/a.csv"), "id,age\n1,30\n2,40\n");

    steward()
        .args(["rename", "-f", &folder, "id", "key"])
        .assert()
        .success()
        .stdout(contains("Renamed 'id' to 'key' in 2 file(s)"));
    assert_eq!(workspace.read("data/a.csv"), "key,age\n1,30\n2,40\n");
    assert_eq!(workspace.read("data/b.csv"), "key,city\n3,Rome\n");
}

#[test]
fn rename_conflict_fails_without_writing() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);

    steward()
        .args(["rename", "-f", &folder, "age", "city"])
        .assert()
        .failure()
        .stderr(contains("column 'city' already exists in b.csv"));
    assert_eq!(workspace.read("data/a.csv"), "id,age\n1,30\n2,40\n");
}

#[test]
fn delete_requires_confirmation() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);

    steward()
        .args(["delete", "-f", &folder, "age"])
        .assert()
        .success()
        .stdout(
            contains("Would delete 'age' from 1 file(s): a.csv")
                .and(contains("pass --yes"))
                .and(contains("Deleted").not()),
        );
    assert_eq!(workspace.read("data/a.csv"), "id,age\n1,30\n2,40\n");

    steward()
        .args(["delete", "-f", &folder, "age", "--yes"])
        .assert()
        .success()
        .stdout(contains("Deleted 'age' from 1 file(s): a.csv"));
    assert_eq!(workspace.read("data/a.csv"), "id\n1\n2\n");
}

#[test]
fn compare_prints_and_saves_the_report() {
    let workspace = TestWorkspace::new();
    workspace.folder("left", &[("a.csv", "id\n1\n"), ("b.csv", "id\n1\n")]);
    workspace.folder("right", &[("a.csv", "id\n1\n1\n")]);
    let reports = workspace.folder("reports", &[]);

    steward()
        .current_dir(workspace.path())
        .args([
            "compare",
            "left",
            "right",
            "--report-dir",
            reports.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success()
        .stdout(
            contains("CSV FOLDER COMPARISON REPORT")
                .and(contains("Only in folder1 (M=1): [\"b.csv\"]"))
                .and(contains("[ROWS]")),
        );

    let saved = std::fs::read_dir(&reports)
        .expect("read reports")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("compare_result_") && saved[0].ends_with(".txt"));
}

#[test]
fn compare_json_is_machine_readable() {
    let workspace = TestWorkspace::new();
    workspace.folder("left", &[("a.csv", "id\n1\n")]);
    workspace.folder("right", &[("a.csv", "id\n1\n2\n")]);

    let output = steward()
        .current_dir(workspace.path())
        .args(["compare", "left", "right", "--json", "--jobs", "2"])
        .output()
        .expect("run compare");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(value["shared"], serde_json::json!(["a.csv"]));
    assert_eq!(value["files"][0]["status"], "compared");
    assert_eq!(value["files"][0]["differences"][0]["kind"], "row_count_mismatch");
}

#[test]
fn remap_writes_transformed_folder() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder(
        "data",
        &[
            ("survey_a.csv", SURVEY_A),
            ("survey_b.csv", SURVEY_B),
            ("dbstructure.csv", STRUCTURE),
            ("dvg.csv", VALUES),
        ],
    );

    steward()
        .args(["remap", "-f", folder.to_str().expect("utf-8 path")])
        .assert()
        .success()
        .stdout(contains(
            "  - Column 'Q1' (set S1): resolved=2, unresolved=1, missing=1",
        ));
    assert_eq!(
        workspace.read("data/transformed_data/survey_b.csv"),
        "id,Q1,Q2\n5,Yes,Ex\n6,No,\n"
    );
}

#[test]
fn summary_exports_profile_csv() {
    let workspace = TestWorkspace::new();
    let folder = two_files(&workspace);
    let output = workspace.path().join("profile.csv");

    steward()
        .args([
            "summary",
            "-f",
            &folder,
            "-o",
            output.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success()
        .stdout(contains("Exported 3 column(s)"));

    let contents = workspace.read("profile.csv");
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("Name,N_Files,Files,Dtype,Mean,CountUnique,Values"));
    assert_eq!(lines.next(), Some("age,1,a.csv,integer,35.000,2,\"30,40\""));
}

#[test]
fn unknown_folder_reports_error() {
    steward()
        .args(["columns", "-f", "definitely/not/here"])
        .assert()
        .failure()
        .stderr(contains("error: Opening folder"));
}
