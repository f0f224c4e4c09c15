//! Schema introspection and filter-option derivation.

use std::collections::HashMap;

use crate::engine::{Datum, QueryEngine};
use crate::error::Result;
use crate::identifier::validate_identifier;
use crate::model::FilterOption;

/// Substrings of a declared type that mark a column as numeric.
pub const NUMERIC_TYPE_TOKENS: [&str; 15] = [
    "TINYINT",
    "SMALLINT",
    "INTEGER",
    "BIGINT",
    "HUGEINT",
    "UTINYINT",
    "USMALLINT",
    "UINTEGER",
    "UBIGINT",
    "UHUGEINT",
    "REAL",
    "FLOAT",
    "DOUBLE",
    "DECIMAL",
    "NUMERIC",
];

/// Columns that identify rows and are never offered as filters.
pub const IDENTITY_COLUMNS: [&str; 3] = ["sample_id", "sra_accession", "id"];

/// Categorical fields with more distinct values than this are not enumerated.
pub const MAX_CATEGORICAL_VALUES: u64 = 100;

pub fn column_type_map(engine: &dyn QueryEngine, table: &str) -> Result<HashMap<String, String>> {
    Ok(engine
        .describe(table)?
        .into_iter()
        .map(|column| (column.column_name, column.column_type))
        .collect())
}

pub fn is_numeric_type(column_type: &str) -> bool {
    let upper = column_type.to_uppercase();
    NUMERIC_TYPE_TOKENS.iter().any(|token| upper.contains(token))
}

/// Reads a MIN/MAX result as a float. Nulls, unparsable text and NaN are absent.
pub fn normalize_numeric_stat(value: Option<&Datum>) -> Option<f64> {
    value
        .and_then(Datum::as_f64)
        .filter(|number| !number.is_nan())
}

/// Filter options for every non-identity column of `table`.
///
/// A table that is not registered yields no options rather than an error.
pub fn filter_options(engine: &dyn QueryEngine, table: &str) -> Result<Vec<FilterOption>> {
    filter_options_excluding(engine, table, &IDENTITY_COLUMNS)
}

pub(crate) fn filter_options_excluding(
    engine: &dyn QueryEngine,
    table: &str,
    excluded: &[&str],
) -> Result<Vec<FilterOption>> {
    let table = validate_identifier(table)?;
    if !engine.tables()?.iter().any(|t| t == table) {
        return Ok(Vec::new());
    }
    let types = column_type_map(engine, table)?;
    let mut options = Vec::new();
    for field in engine.fields(table)? {
        if excluded.contains(&field.as_str()) {
            continue;
        }
        // a column name from the engine may still not be a plain identifier
        let Ok(field) = validate_identifier(&field) else {
            continue;
        };
        let numeric = types.get(field).is_some_and(|t| is_numeric_type(t));
        if numeric {
            let range = engine.query(&format!(
                "SELECT MIN({field}) AS min_value, MAX({field}) AS max_value \
                 FROM {table} WHERE {field} IS NOT NULL"
            ))?;
            let min_value = normalize_numeric_stat(range.scalar("min_value"));
            let max_value = normalize_numeric_stat(range.scalar("max_value"));
            if min_value.is_none() && max_value.is_none() {
                continue;
            }
            options.push(FilterOption::numeric(field, min_value, max_value));
        } else {
            let distinct = engine
                .query(&format!(
                    "SELECT COUNT(DISTINCT {field}) AS cnt FROM {table} WHERE {field} IS NOT NULL"
                ))?
                .count("cnt");
            if distinct == 0 || distinct > MAX_CATEGORICAL_VALUES {
                continue;
            }
            let values = engine
                .query(&format!(
                    "SELECT DISTINCT {field} FROM {table} WHERE {field} IS NOT NULL ORDER BY {field}"
                ))?
                .values(field)
                .into_iter()
                .filter_map(Datum::to_label)
                .collect();
            options.push(FilterOption::categorical(field, values));
        }
    }
    Ok(options)
}
