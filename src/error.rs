use thiserror::Error;

#[derive(Error, Debug)]
pub enum TfscopeError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Invalid numeric filter for '{dataset}.{field}': {reason}")]
    InvalidRange {
        dataset: String,
        field: String,
        reason: String,
    },
    #[error("No regulator identifier field found in {scope}. {detail}")]
    UnresolvedRegulatorField { scope: String, detail: String },
    #[error("No sample identifier field found in '{table}'. Available fields: {available}")]
    UnresolvedSampleField { table: String, available: String },
    #[error("Dataset '{0}' not found")]
    DatasetNotRegistered(String),
    #[error(
        "Dataset '{dataset}' is configured but none of its tables are registered \
         (checked: {checked}); its data may have failed to load"
    )]
    DatasetConfiguredButUnavailable { dataset: String, checked: String },
    #[error("Metadata table '{0}' not found")]
    MetadataTableMissing(String),
    #[error("Column '{column}' not found in '{table}'")]
    UnknownColumn { column: String, table: String },
    #[error("Invalid group_by value: '{0}'. Must be 'regulator' or 'sample'.")]
    InvalidGrouping(String),
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("Unknown dataset id: {0}")]
    UnknownDataset(String),
    #[error("Dataset '{id}' is not selectable: {reason}")]
    DatasetNotSelectable { id: String, reason: String },
    #[error("SQL error: {0}")]
    UpstreamQuery(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl TfscopeError {
    /// Errors caused by the request itself rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::Execution(_) | Self::Lock(_))
    }
}

pub type Result<T> = std::result::Result<T, TfscopeError>;

// Helper conversions
impl From<rusqlite::Error> for TfscopeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::UpstreamQuery(e.to_string())
    }
}

impl From<config::ConfigError> for TfscopeError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
