mod common;

use tfscope::TfscopeError;
use tfscope::engine::{Datum, QueryEngine};
use tfscope::model::{FilterKind, FilterOption};
use tfscope::schema::{
    MAX_CATEGORICAL_VALUES, column_type_map, filter_options, is_numeric_type, normalize_numeric_stat,
};

fn option<'a>(options: &'a [FilterOption], field: &str) -> Option<&'a FilterOption> {
    options.iter().find(|o| o.field == field)
}

#[test]
fn numeric_type_tokens() {
    for t in ["INTEGER", "bigint", "DOUBLE", "REAL", "DECIMAL(10,2)", "numeric", "UBIGINT", "float"] {
        assert!(is_numeric_type(t), "{t} should be numeric");
    }
    for t in ["TEXT", "VARCHAR", "", "BLOB", "BOOLEAN", "DATE"] {
        assert!(!is_numeric_type(t), "{t} should not be numeric");
    }
}

#[test]
fn numeric_stats_drop_nan_and_text() {
    assert_eq!(normalize_numeric_stat(None), None);
    assert_eq!(normalize_numeric_stat(Some(&Datum::Null)), None);
    assert_eq!(normalize_numeric_stat(Some(&Datum::Real(f64::NAN))), None);
    assert_eq!(normalize_numeric_stat(Some(&Datum::Text("abc".into()))), None);
    assert_eq!(normalize_numeric_stat(Some(&Datum::Integer(3))), Some(3.0));
    assert_eq!(normalize_numeric_stat(Some(&Datum::Text("2.5".into()))), Some(2.5));
}

#[test]
fn column_types_from_describe() {
    let engine = common::engine();
    let types = column_type_map(&engine, "harbison_meta").expect("describe");
    // declared types come back as written in the DDL
    assert_eq!(types.get("temperature").map(|t| t.to_uppercase()), Some("REAL".to_string()));
    assert_eq!(types.get("regulator").map(|t| t.to_uppercase()), Some("TEXT".to_string()));
    assert!(column_type_map(&engine, "missing").expect("describe").is_empty());
}

#[test]
fn options_for_metadata_table() {
    let engine = common::engine();
    let options = filter_options(&engine, "harbison_meta").expect("options");

    assert!(option(&options, "sample_id").is_none(), "identity columns are skipped");

    let regulator = option(&options, "regulator").expect("regulator option");
    assert_eq!(regulator.kind, FilterKind::Categorical);
    assert_eq!(regulator.values, vec!["CBF1", "GAL4", "HSF1", "MSN2"]);

    let condition = option(&options, "condition").expect("condition option");
    assert_eq!(condition.values, vec!["SM", "YPD"]);

    let temperature = option(&options, "temperature").expect("temperature option");
    assert_eq!(temperature.kind, FilterKind::Numeric);
    assert_eq!(temperature.min_value, Some(25.0));
    assert_eq!(temperature.max_value, Some(37.0));
    assert!(temperature.values.is_empty());
}

#[test]
fn high_cardinality_and_empty_numeric_fields_are_omitted() {
    let engine = common::engine();
    let options = filter_options(&engine, "wide_meta").expect("options");
    assert!(option(&options, "label").is_none(), "150 distinct labels exceed the cap");
    assert!(option(&options, "score").is_none(), "all-null numeric column has no range");
    assert!(option(&options, "id").is_none());
    let flag = option(&options, "flag").expect("flag option");
    assert_eq!(flag.values, vec!["even", "odd"]);
    for o in &options {
        assert!(o.values.len() as u64 <= MAX_CATEGORICAL_VALUES);
    }
}

#[test]
fn unregistered_table_has_no_options() {
    let engine = common::engine();
    // configured in the catalog, never loaded
    assert!(filter_options(&engine, "ghost_meta").expect("options").is_empty());
    assert!(matches!(
        filter_options(&engine, "ghost meta"),
        Err(TfscopeError::InvalidIdentifier(_))
    ));
}

#[test]
fn filter_option_serializes_kind_lowercase() {
    let json = serde_json::to_value(FilterOption::numeric("x", Some(1.0), None)).unwrap();
    assert_eq!(json["kind"], "numeric");
    assert_eq!(json["max_value"], serde_json::Value::Null);
    let engine = common::engine();
    assert!(engine.tables().unwrap().contains(&"wide_meta".to_string()));
}
