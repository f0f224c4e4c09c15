//! Pairwise regulator overlap between datasets.
//!
//! Each dataset contributes the set of regulators found in its metadata. The
//! regulator column may live in the dataset's own `<dataset>_meta` table or
//! in one of the supplemental tables the catalog declares for it. Candidates
//! are tried in order and the first one that exposes a regulator column wins.

use std::collections::HashSet;

use tracing::debug;

use crate::OtherHasher;
use crate::catalog::Catalog;
use crate::engine::{Datum, QueryEngine};
use crate::error::{Result, TfscopeError};
use crate::filter::{FilterSpec, build_where, candidate_regulator_tables};
use crate::identifier::{
    resolve_join_sample_identifier, resolve_regulator_identifier, resolve_sample_identifier,
    validate_identifier,
};
use crate::model::IntersectionCell;

pub type RegulatorSet = HashSet<String, OtherHasher>;

/// Where the regulators of one dataset are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegulatorSource {
    /// The dataset's own metadata table, with its filters applied.
    BaseTable {
        table: String,
        regulator: String,
        where_sql: String,
    },
    /// A supplemental table read as is.
    Direct { table: String, regulator: String },
    /// A supplemental table restricted to the samples that survive the
    /// filters of the base metadata table.
    FilteredJoin {
        table: String,
        regulator: String,
        join_field: String,
        base_table: String,
        base_field: String,
        where_sql: String,
    },
}

impl RegulatorSource {
    pub fn table(&self) -> &str {
        match self {
            Self::BaseTable { table, .. }
            | Self::Direct { table, .. }
            | Self::FilteredJoin { table, .. } => table,
        }
    }
    pub fn sql(&self) -> String {
        match self {
            Self::BaseTable {
                table,
                regulator,
                where_sql,
            } => format!("SELECT DISTINCT {regulator} AS regulator FROM {table}{where_sql}"),
            Self::Direct { table, regulator } => {
                format!("SELECT DISTINCT {regulator} AS regulator FROM {table}")
            }
            Self::FilteredJoin {
                table,
                regulator,
                join_field,
                base_table,
                base_field,
                where_sql,
            } => format!(
                "SELECT DISTINCT src.{regulator} AS regulator FROM {table} AS src \
                 JOIN (SELECT DISTINCT {base_field} AS __sample_id FROM {base_table}{where_sql}) AS f \
                 ON CAST(src.{join_field} AS VARCHAR) = CAST(f.__sample_id AS VARCHAR)"
            ),
        }
    }
}

pub struct IntersectionEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> IntersectionEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Picks the table and query the regulators of `dataset` come from.
    pub fn regulator_source(
        &self,
        engine: &dyn QueryEngine,
        tables: &[String],
        dataset: &str,
        filters: &FilterSpec,
    ) -> Result<RegulatorSource> {
        let dataset = validate_identifier(dataset)?;
        let base_table = format!("{dataset}_meta");
        let registered = |table: &str| tables.iter().any(|t| t == table);
        let base_present = registered(&base_table);
        let where_sql = if base_present {
            build_where(filters, dataset)?
        } else {
            String::new()
        };
        let mut checked: Vec<String> = Vec::new();
        let mut present = 0usize;

        for table in candidate_regulator_tables(self.catalog, dataset) {
            let table = validate_identifier(&table)?.to_string();
            checked.push(table.clone());
            if !registered(&table) {
                continue;
            }
            present += 1;
            let fields = engine.fields(&table)?;
            let Ok(regulator) = resolve_regulator_identifier(&fields, &table) else {
                continue;
            };
            let regulator = regulator.to_string();
            if table == base_table {
                return Ok(RegulatorSource::BaseTable {
                    table,
                    regulator,
                    where_sql,
                });
            }
            if where_sql.is_empty() || !base_present {
                return Ok(RegulatorSource::Direct { table, regulator });
            }
            // the base sample column is only needed once a join is certain
            let base_fields = engine.fields(&base_table)?;
            let base = resolve_sample_identifier(&base_fields, &base_table)?;
            let join_field = resolve_join_sample_identifier(&fields, &table, Some(base))?;
            return Ok(RegulatorSource::FilteredJoin {
                table,
                regulator,
                join_field: join_field.to_string(),
                base_table,
                base_field: base.to_string(),
                where_sql,
            });
        }

        let checked = checked.join(", ");
        if present == 0 && self.catalog.by_db_name(dataset).is_some() {
            return Err(TfscopeError::DatasetConfiguredButUnavailable {
                dataset: dataset.to_string(),
                checked,
            });
        }
        Err(TfscopeError::UnresolvedRegulatorField {
            scope: format!("metadata for dataset '{dataset}'"),
            detail: format!("Checked tables: {checked}"),
        })
    }

    pub fn regulator_set(
        &self,
        engine: &dyn QueryEngine,
        tables: &[String],
        dataset: &str,
        filters: &FilterSpec,
    ) -> Result<RegulatorSet> {
        let source = self.regulator_source(engine, tables, dataset, filters)?;
        debug!(dataset, table = source.table(), "regulator source resolved");
        Ok(engine
            .query(&source.sql())?
            .values("regulator")
            .into_iter()
            .filter_map(Datum::to_label)
            .collect())
    }

    /// Upper-triangular overlap matrix of `datasets` in request order. Fails on
    /// the first dataset whose regulators cannot be resolved.
    pub fn compute(
        &self,
        engine: &dyn QueryEngine,
        datasets: &[String],
        filters: &FilterSpec,
    ) -> Result<Vec<IntersectionCell>> {
        for dataset in datasets {
            validate_identifier(dataset)?;
        }
        let tables = engine.tables()?;
        let mut sets = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            sets.push(self.regulator_set(engine, &tables, dataset, filters)?);
        }
        Ok(intersection_matrix(datasets, &sets))
    }
}

/// Diagonal cells carry set sizes, the others pairwise overlap sizes.
pub fn intersection_matrix(datasets: &[String], sets: &[RegulatorSet]) -> Vec<IntersectionCell> {
    let mut cells = Vec::new();
    for (i, (row, set_i)) in datasets.iter().zip(sets).enumerate() {
        for (j, (col, set_j)) in datasets.iter().zip(sets).enumerate().skip(i) {
            let count = if i == j {
                set_i.len()
            } else {
                set_i.intersection(set_j).count()
            };
            cells.push(IntersectionCell {
                row: row.clone(),
                col: col.clone(),
                count,
            });
        }
    }
    cells
}
