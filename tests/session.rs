mod common;

use std::fs;

use common::TestWorkspace;
use csv_steward::{
    dataset::{Dataset, LoadOptions},
    error::StewardError,
    registry::ColumnRegistry,
    session::Session,
};

#[test]
fn open_records_unreadable_files_and_keeps_going() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder(
        "data",
        &[
            ("a.csv", "id,name\n1,x\n2,y\n"),
            ("broken.csv", "id,name\n1,x,extra\n"),
            ("empty.csv", ""),
            ("b.CSV", "id\n7\n"),
            ("readme.md", "not data"),
        ],
    );

    let session = Session::open(&folder, LoadOptions::default()).expect("open");
    let loaded = session.datasets().keys().cloned().collect::<Vec<_>>();
    assert_eq!(loaded, vec!["a.csv", "b.CSV"]);
    let failed = session
        .load_failures()
        .iter()
        .map(|f| f.file.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed, vec!["broken.csv", "empty.csv"]);
    assert_eq!(session.registry().locations("id").len(), 2);
    assert_eq!(session.total_rows(), 3);
    assert!(!session.is_modified());
}

#[test]
fn missing_folder_is_not_found() {
    let workspace = TestWorkspace::new();
    let err = Session::open(&workspace.path().join("nowhere"), LoadOptions::default())
        .expect_err("missing folder");
    assert!(matches!(err, StewardError::FolderNotFound { .. }));
}

#[test]
fn rename_then_save_rewrites_only_touched_files() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder(
        "data",
        &[
            ("a.csv", "id,score\n1,2.5\n2,\n"),
            ("b.csv", "id,city\n3,Rome\n"),
            ("c.csv", "key\nz\n"),
        ],
    );
    let mut session = Session::open(&folder, LoadOptions::default()).expect("open");

    let touched = session.rename("id", "record_id").expect("rename");
    assert_eq!(touched, vec!["a.csv", "b.csv"]);
    assert_eq!(
        session.modified_datasets().collect::<Vec<_>>(),
        vec!["a.csv", "b.csv"]
    );

    let outcome = session.save();
    assert!(outcome.is_clean());
    assert_eq!(outcome.saved, vec!["a.csv", "b.csv"]);
    assert!(!session.is_modified());
    assert_eq!(workspace.read("data/a.csv"), "record_id,score\n1,2.5\n2,\n");
    assert_eq!(workspace.read("data/b.csv"), "record_id,city\n3,Rome\n");
    assert_eq!(workspace.read("data/c.csv"), "key\nz\n");

    let reopened = Session::open(&folder, LoadOptions::default()).expect("reopen");
    assert_eq!(reopened.registry(), session.registry());
}

#[test]
fn delete_updates_registry_and_files() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder(
        "data",
        &[("a.csv", "id,tmp\n1,x\n"), ("b.csv", "id,tmp\n2,y\n")],
    );
    let mut session = Session::open(&folder, LoadOptions::default()).expect("open");

    session.delete("tmp").expect("delete");
    assert!(!session.registry().contains("tmp"));
    assert!(session.save().is_clean());
    assert_eq!(workspace.read("data/a.csv"), "id\n1\n");
    assert_eq!(workspace.read("data/b.csv"), "id\n2\n");
}

#[test]
fn inserted_and_dropped_datasets_keep_registry_in_step() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder("data", &[("a.csv", "id\n1\n")]);
    let mut session = Session::open(&folder, LoadOptions::default()).expect("open");

    let extra = Dataset::from_str_columns("extra.csv", &[("id", &["9"]), ("note", &["n"])])
        .expect("dataset");
    assert!(session.insert_dataset(extra).is_none());
    assert!(session.registry().is_repeated("id"));
    assert_eq!(
        session.registry(),
        &ColumnRegistry::build(session.datasets().values())
    );

    session.drop_dataset("extra.csv").expect("drop");
    assert!(!session.registry().contains("note"));
    assert!(!session.registry().is_repeated("id"));
    assert!(!session.is_modified());

    let err = session.drop_dataset("extra.csv").expect_err("already gone");
    assert!(err.is_not_found());
}

#[test]
fn failed_save_keeps_the_dataset_pending() {
    let workspace = TestWorkspace::new();
    let folder = workspace.folder(
        "data",
        &[("a.csv", "id,tmp\n1,x\n"), ("b.csv", "id,tmp\n2,y\n")],
    );
    let mut session = Session::open(&folder, LoadOptions::default()).expect("open");
    session.rename("tmp", "note").expect("rename");

    fs::remove_file(folder.join("b.csv")).expect("remove b.csv");
    fs::create_dir(folder.join("b.csv")).expect("directory in its place");

    let outcome = session.save();
    assert!(!outcome.is_clean());
    assert_eq!(outcome.saved, vec!["a.csv"]);
    let failed = outcome
        .failures
        .iter()
        .map(|f| f.dataset.as_str())
        .collect::<Vec<_>>();
    assert_eq!(failed, vec!["b.csv"]);
    assert!(matches!(outcome.failures[0].error, StewardError::IoFailure { .. }));
    assert_eq!(session.modified_datasets().collect::<Vec<_>>(), vec!["b.csv"]);
    assert_eq!(workspace.read("data/a.csv"), "id,note\n1,x\n");

    fs::remove_dir(folder.join("b.csv")).expect("clear directory");
    assert!(session.save().is_clean());
    assert!(!session.is_modified());
    assert_eq!(workspace.read("data/b.csv"), "id,note\n2,y\n");
}
