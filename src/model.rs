//! Request and response shapes exchanged with the transport layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::Datum;
use crate::error::{Result, TfscopeError};
use crate::filter::FilterSpec;

pub type Record = serde_json::Map<String, serde_json::Value>;

// ------------- Filter options -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Categorical,
    Numeric,
}

/// One filterable field: either its enumerated values or its numeric range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOption {
    pub field: String,
    pub kind: FilterKind,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl FilterOption {
    pub fn categorical(field: &str, values: Vec<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: FilterKind::Categorical,
            values,
            min_value: None,
            max_value: None,
        }
    }
    pub fn numeric(field: &str, min_value: Option<f64>, max_value: Option<f64>) -> Self {
        Self {
            field: field.to_string(),
            kind: FilterKind::Numeric,
            values: Vec::new(),
            min_value,
            max_value,
        }
    }
}

// ------------- Intersection -------------
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntersectionRequest {
    pub datasets: Vec<String>,
    #[serde(flatten)]
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionCell {
    pub row: String,
    pub col: String,
    pub count: usize,
}

// ------------- Correlation -------------
fn default_method() -> String {
    "pearson".to_string()
}
fn default_group_by() -> String {
    "regulator".to_string()
}
fn default_max_items() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationRequest {
    pub db_name: String,
    pub value_column: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_group_by")]
    pub group_by: String,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationCell {
    pub row: String,
    pub col: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub db_name: String,
    pub labels: Vec<String>,
    pub cells: Vec<CorrelationCell>,
    pub method: String,
}

// ------------- Listings -------------
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Paging as sent by the client; unset values are filled in by [`PageParams::resolve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl PageParams {
    pub fn resolve(&self, default_page_size: u32) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.page_size.unwrap_or(default_page_size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }
    /// Checks `page >= 1` and `1 <= page_size <= max_page_size`.
    pub fn validate(&self, max_page_size: u32) -> Result<()> {
        if self.page < 1 {
            return Err(TfscopeError::InvalidPagination(format!(
                "page must be at least 1, got {}",
                self.page
            )));
        }
        if self.page_size < 1 || self.page_size > max_page_size {
            return Err(TfscopeError::InvalidPagination(format!(
                "page_size must be between 1 and {max_page_size}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
    pub fn has_next(&self, total: u64) -> bool {
        self.offset() + u64::from(self.page_size) < total
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(flatten)]
    pub filters: FilterSpec,
    #[serde(flatten)]
    pub paging: PageParams,
}

/// One page of rows from one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPage {
    pub db_name: String,
    pub data: Vec<Record>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&ParamValue> for Datum {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Bool(b) => Datum::Integer(i64::from(*b)),
            ParamValue::Integer(i) => Datum::Integer(*i),
            ParamValue::Real(f) => Datum::Real(*f),
            ParamValue::Text(t) => Datum::Text(t.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(flatten)]
    pub paging: PageParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse {
    pub data: Vec<Record>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_next: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterValuesRequest {
    #[serde(default)]
    pub datasets: Vec<String>,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterValuesResponse {
    pub column: String,
    pub values: Vec<String>,
}

// ------------- Summaries -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatasetType {
    Binding,
    Perturbation,
    Expression,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub db_name: String,
    pub repo_id: String,
    pub config_name: String,
    pub dataset_type: DatasetType,
    pub total_rows: u64,
    pub regulator_count: u64,
    pub target_count: u64,
    pub sample_count: u64,
    pub column_count: usize,
    pub metadata_fields: Vec<FilterOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub db_name: String,
    pub repo_id: String,
    pub config_name: String,
    /// Comparative datasets relate two other datasets rather than holding samples.
    pub is_comparative: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetCatalogEntry {
    pub id: String,
    pub name: String,
    pub repo_id: String,
    pub config_name: String,
    pub db_name: String,
    pub sample_id_field: String,
    pub estimated_rows: Option<u64>,
    pub num_columns: Option<u64>,
    pub column_names: Vec<String>,
    pub selectable: bool,
    pub is_active: bool,
    pub unsupported_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub tables_registered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResponse {
    pub database_path: String,
    pub tables_registered: usize,
    pub active_dataset_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReloadRequest {
    #[serde(default)]
    pub dataset_ids: Vec<String>,
}
