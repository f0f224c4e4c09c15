mod common;

use std::collections::HashSet;

use tfscope::TfscopeError;
use tfscope::correlation::{Grouping, correlation_matrix, group_predicate};
use tfscope::engine::{Datum, QueryEngine};
use tfscope::model::CorrelationRequest;

fn request(db_name: &str, value_column: &str, group_by: &str) -> CorrelationRequest {
    serde_json::from_value(serde_json::json!({
        "db_name": db_name,
        "value_column": value_column,
        "group_by": group_by,
    }))
    .expect("request parses")
}

#[test]
fn request_defaults() {
    let request: CorrelationRequest =
        serde_json::from_str(r#"{"db_name": "harbison", "value_column": "effect"}"#).unwrap();
    assert_eq!(request.method, "pearson");
    assert_eq!(request.group_by, "regulator");
    assert_eq!(request.max_items, 20);
}

#[test]
fn groups_by_regulator() {
    let engine = common::engine();
    let matrix = correlation_matrix(&engine, &request("harbison", "effect", "regulator")).expect("matrix");
    assert_eq!(matrix.db_name, "harbison");
    assert_eq!(matrix.method, "pearson");

    // CBF1 has no non-null effect, so it is not a group
    let labels: HashSet<&str> = matrix.labels.iter().map(String::as_str).collect();
    assert_eq!(labels, HashSet::from(["GAL4", "MSN2", "HSF1"]));

    assert_eq!(matrix.cells.len(), 6);
    for cell in &matrix.cells {
        if cell.row == cell.col {
            assert_eq!(cell.value, 1.0, "self pair {} must be 1.0", cell.row);
        } else {
            assert!((-1.0..=1.0).contains(&cell.value), "{cell:?} out of range");
        }
    }
    // a single HSF1 observation has no variance, the coefficient is undefined
    for cell in matrix.cells.iter().filter(|c| c.row != c.col) {
        if cell.row == "HSF1" || cell.col == "HSF1" {
            assert_eq!(cell.value, 0.0);
        }
    }
}

#[test]
fn max_items_bounds_the_groups() {
    let engine = common::engine();
    let mut req = request("harbison", "effect", "regulator");
    req.max_items = 1;
    let matrix = correlation_matrix(&engine, &req).expect("matrix");
    assert_eq!(matrix.labels, vec!["GAL4".to_string()], "GAL4 is strictly the most frequent");
    assert_eq!(matrix.cells.len(), 1);
    assert_eq!(matrix.cells[0].value, 1.0);

    req.max_items = 0;
    let matrix = correlation_matrix(&engine, &req).expect("matrix");
    assert!(matrix.labels.is_empty());
    assert!(matrix.cells.is_empty());
}

#[test]
fn regulator_resolved_from_metadata_table() {
    let engine = common::engine();
    let matrix = correlation_matrix(&engine, &request("kemmeren", "log_fold", "regulator")).expect("matrix");
    let labels: HashSet<&str> = matrix.labels.iter().map(String::as_str).collect();
    assert_eq!(labels, HashSet::from(["GAL4", "MSN2", "SKN7"]));
    // one observation per regulator
    assert!(matrix.cells.iter().filter(|c| c.row != c.col).all(|c| c.value == 0.0));
}

#[test]
fn groups_by_sample() {
    let engine = common::engine();
    let matrix = correlation_matrix(&engine, &request("harbison", "effect", "sample")).expect("matrix");
    let labels: HashSet<&str> = matrix.labels.iter().map(String::as_str).collect();
    assert_eq!(labels, HashSet::from(["1", "2", "3", "4"]));
    assert_eq!(matrix.cells.len(), 10);
}

#[test]
fn rejects_bad_requests() {
    let engine = common::engine();
    assert!(matches!(
        correlation_matrix(&engine, &request("missing", "effect", "regulator")),
        Err(TfscopeError::DatasetNotRegistered(_))
    ));
    assert!(matches!(
        correlation_matrix(&engine, &request("harbison", "nope", "regulator")),
        Err(TfscopeError::UnknownColumn { .. })
    ));
    assert!(matches!(
        correlation_matrix(&engine, &request("harbison", "effect", "tissue")),
        Err(TfscopeError::InvalidGrouping(_))
    ));
    // degron has no sample_id column
    assert!(matches!(
        correlation_matrix(&engine, &request("degron", "counts", "sample")),
        Err(TfscopeError::UnknownColumn { .. })
    ));
    // degron_meta carries no regulator column
    assert!(matches!(
        correlation_matrix(&engine, &request("degron", "counts", "regulator")),
        Err(TfscopeError::UnresolvedRegulatorField { .. })
    ));
    assert!(matches!(
        correlation_matrix(&engine, &request("harbison", "effect; --", "regulator")),
        Err(TfscopeError::InvalidIdentifier(_))
    ));
}

#[test]
fn grouping_parses() {
    assert_eq!("regulator".parse::<Grouping>().unwrap(), Grouping::Regulator);
    assert_eq!("sample".parse::<Grouping>().unwrap(), Grouping::Sample);
    assert!("Sample".parse::<Grouping>().is_err());
}

#[test]
fn corr_aggregate() {
    let engine = common::engine();
    let r = engine
        .query("select CORR(x, y) as r from (select 1 as x, 2 as y union all select 2, 4 union all select 3, 6)")
        .unwrap();
    let value = r.scalar("r").and_then(Datum::as_f64).expect("defined");
    assert!((value - 1.0).abs() < 1e-12);

    let r = engine
        .query("select CORR(x, y) as r from (select 1 as x, 3 as y union all select 2, 2 union all select 3, 1)")
        .unwrap();
    let value = r.scalar("r").and_then(Datum::as_f64).expect("defined");
    assert!((value + 1.0).abs() < 1e-12);

    // fewer than two pairs
    let r = engine.query("select CORR(x, y) as r from (select 1 as x, 2 as y)").unwrap();
    assert_eq!(r.scalar("r"), Some(&Datum::Null));
}

#[test]
fn real_group_keys_select_their_rows() {
    let engine = common::engine();
    engine
        .execute_batch(
            "create table floaty (sample_id real, score real);
             insert into floaty values (1e20, 1.0), (1e20, 2.0), (2.5, 3.0), (0.1, 4.0);",
        )
        .unwrap();
    for (key, expected) in [(Datum::Real(1e20), 2), (Datum::Real(2.5), 1), (Datum::Real(0.1), 1)] {
        let sql = format!(
            "select count(*) as n from floaty where {}",
            group_predicate("sample_id", &key)
        );
        assert_eq!(engine.query(&sql).unwrap().count("n"), expected, "rows for {key:?}");
    }
    let sql = format!(
        "select count(*) as n from harbison where {}",
        group_predicate("regulator", &Datum::Text("GAL4".into()))
    );
    assert_eq!(engine.query(&sql).unwrap().count("n"), 4);
    let sql = format!(
        "select count(*) as n from harbison where {}",
        group_predicate("sample_id", &Datum::Integer(1))
    );
    assert_eq!(engine.query(&sql).unwrap().count("n"), 3);

    let matrix = correlation_matrix(&engine, &request("floaty", "score", "sample")).expect("matrix");
    assert_eq!(matrix.labels[0], "1e20", "the most frequent key keeps its label");
    assert_eq!(matrix.labels.len(), 3);
    assert_eq!(matrix.cells.len(), 6);
}
