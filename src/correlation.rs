//! Pairwise correlation of a value column across the most frequent groups.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::engine::{Datum, QueryEngine};
use crate::error::{Result, TfscopeError};
use crate::filter::quote_literal;
use crate::identifier::{resolve_regulator_identifier, validate_identifier};
use crate::model::{CorrelationCell, CorrelationMatrix, CorrelationRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Regulator,
    Sample,
}

impl FromStr for Grouping {
    type Err = TfscopeError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "regulator" => Ok(Grouping::Regulator),
            "sample" => Ok(Grouping::Sample),
            other => Err(TfscopeError::InvalidGrouping(other.to_string())),
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grouping::Regulator => write!(f, "regulator"),
            Grouping::Sample => write!(f, "sample"),
        }
    }
}

/// The column rows are grouped by.
fn group_column(
    engine: &dyn QueryEngine,
    db_name: &str,
    fields: &[String],
    grouping: Grouping,
) -> Result<String> {
    match grouping {
        Grouping::Regulator => {
            let meta_table = format!("{db_name}_meta");
            let meta_fields = engine.fields(&meta_table)?;
            Ok(resolve_regulator_identifier(&meta_fields, &meta_table)?.to_string())
        }
        Grouping::Sample => {
            if fields.iter().any(|f| f == "sample_id") {
                Ok("sample_id".to_string())
            } else {
                Err(TfscopeError::UnknownColumn {
                    column: "sample_id".to_string(),
                    table: db_name.to_string(),
                })
            }
        }
    }
}

/// SQL predicate selecting the rows whose `group` column holds `key`.
///
/// Real keys are compared as numbers, since the text SQLite renders for a
/// real need not match the label. Everything else is compared as text.
pub fn group_predicate(group: &str, key: &Datum) -> String {
    match key {
        // no stored value compares equal to NaN
        Datum::Real(f) if f.is_nan() => "0".to_string(),
        Datum::Real(f) if f.is_infinite() => {
            format!("{group} = {}", if *f > 0.0 { "9e999" } else { "-9e999" })
        }
        Datum::Real(f) => format!("{group} = {f:?}"),
        other => format!(
            "CAST({group} AS TEXT) = {}",
            quote_literal(&other.to_label().unwrap_or_default())
        ),
    }
}

struct PairQuery<'q> {
    db_name: &'q str,
    group: &'q str,
    value: &'q str,
}

impl PairQuery<'_> {
    fn observations(&self, a: &Datum, b: &Datum) -> String {
        let (db, value) = (self.db_name, self.value);
        format!(
            "SELECT COUNT(*) AS cnt FROM {db} \
             WHERE ({} OR {}) AND {value} IS NOT NULL",
            group_predicate(self.group, a),
            group_predicate(self.group, b)
        )
    }
    fn side(&self, key: &Datum) -> String {
        let (db, value) = (self.db_name, self.value);
        format!(
            "SELECT {value} AS v FROM {db} WHERE {} AND {value} IS NOT NULL",
            group_predicate(self.group, key)
        )
    }
    fn correlation(&self, a: &Datum, b: &Datum) -> String {
        format!(
            "SELECT CORR(a.v, b.v) AS correlation FROM ({}) AS a CROSS JOIN ({}) AS b",
            self.side(a),
            self.side(b)
        )
    }
}

/// Computes the upper-triangular correlation matrix of the `max_items` most
/// frequent groups of `request.db_name`.
pub fn correlation_matrix(
    engine: &dyn QueryEngine,
    request: &CorrelationRequest,
) -> Result<CorrelationMatrix> {
    let db_name = validate_identifier(&request.db_name)?;
    let value = validate_identifier(&request.value_column)?;
    let grouping: Grouping = request.group_by.parse()?;

    if !engine.tables()?.iter().any(|t| t == db_name) {
        return Err(TfscopeError::DatasetNotRegistered(db_name.to_string()));
    }
    let fields = engine.fields(db_name)?;
    if !fields.iter().any(|f| f == value) {
        return Err(TfscopeError::UnknownColumn {
            column: value.to_string(),
            table: db_name.to_string(),
        });
    }
    let group = group_column(engine, db_name, &fields, grouping)?;
    if !fields.iter().any(|f| *f == group) {
        return Err(TfscopeError::UnknownColumn {
            column: group,
            table: db_name.to_string(),
        });
    }

    let top = engine.query(&format!(
        "SELECT {group} AS item, COUNT(*) AS cnt FROM {db_name} \
         WHERE {group} IS NOT NULL AND {value} IS NOT NULL \
         GROUP BY {group} ORDER BY cnt DESC LIMIT {}",
        request.max_items
    ))?;
    let keys: Vec<&Datum> = top
        .values("item")
        .into_iter()
        .filter(|key| !key.is_null())
        .collect();
    let labels: Vec<String> = keys.iter().filter_map(|key| key.to_label()).collect();
    debug!(db_name, %grouping, groups = labels.len(), "correlation groups selected");

    let pairs = PairQuery {
        db_name,
        group: &group,
        value,
    };
    let mut cells = Vec::new();
    for (i, (row, row_key)) in labels.iter().zip(&keys).enumerate() {
        for (j, (col, col_key)) in labels.iter().zip(&keys).enumerate().skip(i) {
            let coefficient = if i == j {
                1.0
            } else if engine.query(&pairs.observations(row_key, col_key))?.count("cnt") < 2 {
                0.0
            } else {
                engine
                    .query(&pairs.correlation(row_key, col_key))?
                    .scalar("correlation")
                    .and_then(Datum::as_f64)
                    .filter(|r| !r.is_nan())
                    .unwrap_or(0.0)
            };
            cells.push(CorrelationCell {
                row: row.clone(),
                col: col.clone(),
                value: coefficient,
            });
        }
    }

    Ok(CorrelationMatrix {
        db_name: db_name.to_string(),
        labels,
        cells,
        method: request.method.clone(),
    })
}
