//! Filter clause construction.
//!
//! A [`FilterSpec`] carries, per dataset, categorical filters (field → allowed
//! values) and inclusive numeric ranges. [`build_where`] turns the filters of
//! one dataset into a WHERE clause that can be appended to a `FROM <table>`.
//! Field names are validated identifiers and values are quoted literals, so
//! nothing from the request reaches the SQL text unescaped.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Result, TfscopeError};
use crate::identifier::validate_identifier;

/// Inclusive numeric range, either bound optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default, alias = "min")]
    pub min_value: Option<f64>,
    #[serde(default, alias = "max")]
    pub max_value: Option<f64>,
}

impl NumericRange {
    pub fn new(min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            min_value,
            max_value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// dataset → field → allowed values
    #[serde(default)]
    pub filters: HashMap<String, BTreeMap<String, Vec<String>>>,
    /// dataset → field → range
    #[serde(default)]
    pub numeric_filters: HashMap<String, BTreeMap<String, NumericRange>>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_values<I, S>(mut self, dataset: &str, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .entry(dataset.to_string())
            .or_default()
            .insert(field.to_string(), values.into_iter().map(Into::into).collect());
        self
    }
    pub fn with_range(mut self, dataset: &str, field: &str, range: NumericRange) -> Self {
        self.numeric_filters
            .entry(dataset.to_string())
            .or_default()
            .insert(field.to_string(), range);
        self
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn format_bound(dataset: &str, field: &str, bound: f64) -> Result<String> {
    if !bound.is_finite() {
        return Err(TfscopeError::InvalidRange {
            dataset: dataset.to_string(),
            field: field.to_string(),
            reason: format!("bound {bound} is not a finite number"),
        });
    }
    // Debug keeps the decimal point, so 5.0 is spliced as "5.0" rather than "5"
    Ok(format!("{bound:?}"))
}

/// WHERE clause for the filters of `dataset`, with a leading space, or an
/// empty string when no filter applies.
pub fn build_where(spec: &FilterSpec, dataset: &str) -> Result<String> {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(categorical) = spec.filters.get(dataset) {
        for (field, values) in categorical {
            let field = validate_identifier(field)?;
            let literals: Vec<String> = values
                .iter()
                .filter(|value| !value.is_empty())
                .map(|value| quote_literal(value))
                .collect();
            if literals.is_empty() {
                continue;
            }
            clauses.push(format!("{field} IN ({})", literals.join(", ")));
        }
    }

    if let Some(numeric) = spec.numeric_filters.get(dataset) {
        for (field, range) in numeric {
            let field = validate_identifier(field)?;
            if let (Some(min), Some(max)) = (range.min_value, range.max_value) {
                if min > max {
                    return Err(TfscopeError::InvalidRange {
                        dataset: dataset.to_string(),
                        field: field.to_string(),
                        reason: format!(
                            "min_value {min} is greater than max_value {max}"
                        ),
                    });
                }
            }
            if let Some(min) = range.min_value {
                clauses.push(format!("{field} >= {}", format_bound(dataset, field, min)?));
            }
            if let Some(max) = range.max_value {
                clauses.push(format!("{field} <= {}", format_bound(dataset, field, max)?));
            }
        }
    }

    if clauses.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }
}

/// Metadata tables that may hold the regulator column of `dataset`, in the
/// order they should be tried.
pub fn candidate_regulator_tables(catalog: &Catalog, dataset: &str) -> Vec<String> {
    let mut candidates = vec![format!("{dataset}_meta")];
    if let Some(item) = catalog.by_db_name(dataset) {
        for supplemental in &item.supplemental_configs {
            candidates.push(format!("{}_meta", supplemental.db_name));
            candidates.push(supplemental.db_name.clone());
        }
    }
    candidates
}
