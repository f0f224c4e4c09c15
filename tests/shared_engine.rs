mod common;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use tfscope::TfscopeError;
use tfscope::catalog::Catalog;
use tfscope::engine::{QueryEngine, SqliteEngine};
use tfscope::guard::SharedEngine;
use tfscope::hub::HubMetadata;
use tfscope::server::{AppState, reload_active_set};
use tfscope::settings::Settings;

fn database_with(path: &std::path::Path, ddl: &str) {
    let engine = SqliteEngine::open(path).expect("database opens");
    engine.execute_batch(ddl).expect("ddl runs");
}

#[test]
fn runs_operations_against_the_handle() {
    let shared = SharedEngine::new(common::engine());
    let tables = shared.run(|engine| engine.tables()).expect("tables");
    assert_eq!(tables.len(), 9);
    let total = shared
        .run(|engine| Ok(engine.query("select count(*) as n from harbison")?.count("n")))
        .expect("count");
    assert_eq!(total, 9);
}

#[test]
fn errors_inside_an_operation_propagate() {
    let shared = SharedEngine::new(common::engine());
    let err = shared
        .run(|engine| engine.query("select * from nowhere"))
        .unwrap_err();
    assert!(matches!(err, TfscopeError::UpstreamQuery(_)));
    // the handle stays usable
    assert!(shared.run(|engine| engine.tables()).is_ok());
}

#[test]
fn a_panicked_operation_does_not_wedge_the_handle() {
    let shared = SharedEngine::new(common::engine());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        shared.run(|_| -> tfscope::Result<()> { panic!("operation blew up") })
    }));
    assert!(outcome.is_err());

    let tables = shared.run(|engine| engine.tables()).expect("lock recovered");
    assert_eq!(tables.len(), 9);
    let previous = shared
        .replace(Box::new(SqliteEngine::open_in_memory().expect("engine")))
        .expect("replace after recovery");
    assert_eq!(previous.tables().unwrap().len(), 9);
}

#[test]
fn concurrent_operations_are_serialized() {
    let shared = Arc::new(SharedEngine::new(common::engine()));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared
                    .run(|engine| {
                        let before = engine.query("select count(*) as n from harbison")?.count("n");
                        let after = engine.query("select count(*) as n from harbison")?.count("n");
                        Ok((before, after))
                    })
                    .expect("operation")
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().expect("worker finishes"), (9, 9));
    }
}

#[test]
fn replace_swaps_the_whole_handle() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("swap.db");
    database_with(&path, "create table only_here (x integer);");

    let shared = SharedEngine::new(common::engine());
    let previous = shared
        .replace(Box::new(SqliteEngine::open(&path).expect("opens")))
        .expect("replace");
    assert_eq!(previous.tables().unwrap().len(), 9, "old handle is handed back intact");
    assert_eq!(
        shared.run(|engine| engine.tables()).unwrap(),
        vec!["only_here".to_string()]
    );
}

fn state_for(path: &std::path::Path) -> AppState {
    AppState::new(
        SharedEngine::new(SqliteEngine::open_in_memory().expect("engine")),
        Catalog::builtin(),
        HubMetadata::offline(),
        Settings::new(path.to_str().expect("utf-8 path")),
    )
}

#[test]
fn reload_reopens_the_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("datasets.db");
    database_with(
        &path,
        "create table harbison (regulator text); create table harbison_meta (regulator text);
         create table hackett (regulator text);",
    );
    let state = state_for(&path);
    assert_eq!(state.engine.run(|engine| engine.tables()).unwrap().len(), 0);

    let ids = vec!["harbison".to_string(), "hackett".to_string(), "harbison".to_string()];
    let reloaded = reload_active_set(&state, &ids).expect("reload");
    assert_eq!(reloaded.tables_registered, 3);
    assert_eq!(reloaded.active_dataset_ids, vec!["hackett".to_string(), "harbison".to_string()]);
    assert_eq!(reloaded.database_path, path.to_str().unwrap());
    assert_eq!(state.engine.run(|engine| engine.tables()).unwrap().len(), 3);
}

#[test]
fn reload_rejects_bad_selections_without_swapping() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("datasets.db");
    database_with(&path, "create table harbison (regulator text);");
    let state = state_for(&path);

    let err = reload_active_set(&state, &["nope".to_string()]).unwrap_err();
    assert!(matches!(err, TfscopeError::UnknownDataset(ref id) if id == "nope"));

    let err = reload_active_set(&state, &["harbison".to_string(), "hu_reimand".to_string()]).unwrap_err();
    assert!(matches!(err, TfscopeError::DatasetNotSelectable { ref id, .. } if id == "hu_reimand"));
    assert!(err.is_client_error());

    assert!(
        state.engine.run(|engine| engine.tables()).unwrap().is_empty(),
        "a rejected reload leaves the old handle in place"
    );
}

#[test]
fn reload_checks_the_selection_but_reopens_the_whole_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("datasets.db");
    database_with(
        &path,
        "create table harbison (regulator text); create table hackett (regulator text);",
    );
    let state = state_for(&path);

    let reloaded = reload_active_set(&state, &["hackett".to_string()]).expect("reload");
    // harbison was not selected but its view is in the database
    assert_eq!(reloaded.tables_registered, 2);
    assert_eq!(reloaded.active_dataset_ids, vec!["hackett".to_string(), "harbison".to_string()]);
    let tables = state.engine.run(|engine| engine.tables()).unwrap();
    assert!(tables.contains(&"harbison".to_string()), "got {tables:?}");
}
