//! Dataset listings and summaries.
//!
//! Each function here is one logical operation and expects to be called
//! inside a single [`SharedEngine::run`](crate::guard::SharedEngine::run).

use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::engine::{Datum, QueryEngine, QueryParams};
use crate::error::{Result, TfscopeError};
use crate::filter::{FilterSpec, build_where};
use crate::identifier::{
    STRICT_SAMPLE_IDENTIFIER_CANDIDATES, resolve_regulator_identifier,
    resolve_sample_identifier_in, validate_identifier,
};
use crate::model::{
    DatasetInfo, DatasetPage, DatasetType, FilterValuesResponse, HealthResponse,
    PaginatedResponse, Pagination, Record, SourceSummary,
};
use crate::schema::filter_options_excluding;

/// Target columns in order of preference.
pub const TARGET_IDENTIFIER_CANDIDATES: [&str; 3] = ["target_locus_tag", "target", "gene_locus_tag"];

const BINDING_KEYWORDS: [&str; 6] = [
    "binding",
    "chip",
    "calling_cards",
    "occupancy",
    "chec",
    "chip-exo",
];
const PERTURBATION_KEYWORDS: [&str; 8] = [
    "perturb",
    "expression",
    "rna",
    "knockout",
    "deletion",
    "overexpression",
    "comparative",
    "degron",
];

/// Guesses the kind of experiment from the dataset name.
pub fn infer_dataset_type(db_name: &str) -> DatasetType {
    let lower = db_name.to_lowercase();
    if BINDING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DatasetType::Binding
    } else if PERTURBATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
        DatasetType::Perturbation
    } else {
        DatasetType::Expression
    }
}

fn is_registered(tables: &[String], table: &str) -> bool {
    tables.iter().any(|t| t == table)
}

fn count_distinct(engine: &dyn QueryEngine, table: &str, field: &str) -> Result<u64> {
    Ok(engine
        .query(&format!("SELECT COUNT(DISTINCT {field}) AS cnt FROM {table}"))?
        .count("cnt"))
}

pub fn health(engine: &dyn QueryEngine) -> Result<HealthResponse> {
    Ok(HealthResponse {
        status: "ok".to_string(),
        tables_registered: engine.tables()?.len(),
    })
}

/// Row counts and metadata filter options of one dataset.
pub fn source_summary(
    engine: &dyn QueryEngine,
    catalog: &Catalog,
    db_name: &str,
) -> Result<SourceSummary> {
    let db_name = validate_identifier(db_name)?;
    let meta_table = format!("{db_name}_meta");
    let tables = engine.tables()?;
    if !is_registered(&tables, db_name) {
        return Err(TfscopeError::DatasetNotRegistered(db_name.to_string()));
    }
    if !is_registered(&tables, &meta_table) {
        return Err(TfscopeError::MetadataTableMissing(meta_table));
    }

    let total_rows = engine
        .query(&format!("SELECT COUNT(*) AS cnt FROM {db_name}"))?
        .count("cnt");
    let fields = engine.fields(db_name)?;
    let meta_fields = engine.fields(&meta_table)?;

    let regulator_count = match resolve_regulator_identifier(&meta_fields, &meta_table) {
        Ok(field) => count_distinct(engine, &meta_table, field)?,
        Err(_) => 0,
    };
    let target_count = match TARGET_IDENTIFIER_CANDIDATES
        .iter()
        .find(|candidate| fields.iter().any(|f| f == *candidate))
    {
        Some(field) => count_distinct(engine, db_name, field)?,
        None => 0,
    };
    let sample_count = match resolve_sample_identifier_in(
        &meta_fields,
        &meta_table,
        &STRICT_SAMPLE_IDENTIFIER_CANDIDATES,
    ) {
        Ok(field) => count_distinct(engine, &meta_table, field)?,
        Err(_) => 0,
    };
    let metadata_fields =
        filter_options_excluding(engine, &meta_table, &STRICT_SAMPLE_IDENTIFIER_CANDIDATES)?;

    let (repo_id, config_name) = match catalog.by_db_name(db_name) {
        Some(item) => (item.repo_id.clone(), item.config_name.clone()),
        None => ("unknown".to_string(), "unknown".to_string()),
    };

    Ok(SourceSummary {
        db_name: db_name.to_string(),
        repo_id,
        config_name,
        dataset_type: infer_dataset_type(db_name),
        total_rows,
        regulator_count,
        target_count,
        sample_count,
        column_count: fields.len(),
        metadata_fields,
    })
}

/// One filtered page per dataset. Fails on the first dataset that is not registered.
pub fn dataset_pages(
    engine: &dyn QueryEngine,
    datasets: &[String],
    filters: &FilterSpec,
    pagination: Pagination,
) -> Result<Vec<DatasetPage>> {
    for dataset in datasets {
        validate_identifier(dataset)?;
    }
    let tables = engine.tables()?;
    let mut pages = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        if !is_registered(&tables, dataset) {
            return Err(TfscopeError::DatasetNotRegistered(dataset.clone()));
        }
        let where_sql = build_where(filters, dataset)?;
        let total = engine
            .query(&format!("SELECT COUNT(*) AS total FROM {dataset}{where_sql}"))?
            .count("total");
        if total == 0 {
            pages.push(DatasetPage {
                db_name: dataset.clone(),
                data: Vec::new(),
                total: 0,
                page: pagination.page,
                page_size: pagination.page_size,
                has_next: false,
                columns: Vec::new(),
            });
            continue;
        }
        let columns = engine.fields(dataset)?;
        let data = engine
            .query(&format!(
                "SELECT * FROM {dataset}{where_sql} LIMIT {} OFFSET {}",
                pagination.page_size,
                pagination.offset()
            ))?
            .records();
        pages.push(DatasetPage {
            db_name: dataset.clone(),
            data,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
            has_next: pagination.has_next(total),
            columns,
        });
    }
    Ok(pages)
}

/// Sorted union of the distinct values of `column` across `datasets`.
/// Datasets that are not registered or lack the column are skipped.
pub fn distinct_across(
    engine: &dyn QueryEngine,
    datasets: &[String],
    column: &str,
) -> Result<FilterValuesResponse> {
    for dataset in datasets {
        validate_identifier(dataset)?;
    }
    let column = validate_identifier(column)?;
    let mut values = BTreeSet::new();
    if !datasets.is_empty() {
        let tables = engine.tables()?;
        for dataset in datasets {
            if !is_registered(&tables, dataset) {
                continue;
            }
            if !engine.fields(dataset)?.iter().any(|f| f == column) {
                continue;
            }
            let frame = engine.query(&format!(
                "SELECT DISTINCT {column} FROM {dataset} WHERE {column} IS NOT NULL ORDER BY {column}"
            ))?;
            values.extend(frame.values(column).into_iter().filter_map(Datum::to_label));
        }
    }
    Ok(FilterValuesResponse {
        column: column.to_string(),
        values: values.into_iter().collect(),
    })
}

/// Runs caller SQL as a subquery, returning its total row count and one page.
pub fn paginated_query(
    engine: &dyn QueryEngine,
    sql: &str,
    params: &QueryParams,
    pagination: Pagination,
) -> Result<PaginatedResponse> {
    let total = engine
        .query_with(&format!("SELECT COUNT(*) AS total FROM ({sql}) AS _q"), params)?
        .count("total");
    let data = engine
        .query_with(
            &format!(
                "SELECT * FROM ({sql}) AS _q LIMIT {} OFFSET {}",
                pagination.page_size,
                pagination.offset()
            ),
            params,
        )?
        .records();
    Ok(PaginatedResponse {
        data,
        total,
        page: pagination.page,
        page_size: pagination.page_size,
        has_next: pagination.has_next(total),
    })
}

pub const MAX_SAMPLE_ROWS: u32 = 1000;

pub fn sample_rows(engine: &dyn QueryEngine, table: &str, n: u32) -> Result<Vec<Record>> {
    let table = validate_identifier(table)?;
    if n < 1 || n > MAX_SAMPLE_ROWS {
        return Err(TfscopeError::InvalidPagination(format!(
            "n must be between 1 and {MAX_SAMPLE_ROWS}, got {n}"
        )));
    }
    Ok(engine
        .query(&format!("SELECT * FROM {table} LIMIT {n}"))?
        .records())
}

pub fn distinct_values(engine: &dyn QueryEngine, table: &str, field: &str) -> Result<Vec<Datum>> {
    let table = validate_identifier(table)?;
    let field = validate_identifier(field)?;
    let frame = engine.query(&format!(
        "SELECT DISTINCT {field} FROM {table} WHERE {field} IS NOT NULL ORDER BY {field}"
    ))?;
    Ok(frame.values(field).into_iter().cloned().collect())
}

pub fn row_count(engine: &dyn QueryEngine, table: &str) -> Result<u64> {
    let table = validate_identifier(table)?;
    Ok(engine
        .query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))?
        .count("cnt"))
}

/// Catalog items whose view is registered, in catalog order.
pub fn registered_datasets(engine: &dyn QueryEngine, catalog: &Catalog) -> Result<Vec<DatasetInfo>> {
    let tables = engine.tables()?;
    Ok(catalog
        .items()
        .iter()
        .filter(|item| is_registered(&tables, &item.db_name))
        .map(|item| DatasetInfo {
            db_name: item.db_name.clone(),
            repo_id: item.repo_id.clone(),
            config_name: item.config_name.clone(),
            is_comparative: item.db_name.to_lowercase().contains("comparative"),
        })
        .collect())
}

/// Fields present in every registered `<db_name>_meta` table of the catalog,
/// in the order of the first such table. Empty when none is registered.
pub fn common_fields(engine: &dyn QueryEngine, catalog: &Catalog) -> Result<Vec<String>> {
    let tables = engine.tables()?;
    let mut common: Option<Vec<String>> = None;
    for item in catalog.items() {
        let meta = format!("{}_meta", item.db_name);
        if !is_registered(&tables, &meta) {
            continue;
        }
        let fields = engine.fields(&meta)?;
        common = Some(match common {
            None => fields,
            Some(kept) => kept.into_iter().filter(|f| fields.contains(f)).collect(),
        });
    }
    Ok(common.unwrap_or_default())
}
