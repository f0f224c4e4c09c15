//! Service settings.
//!
//! Read from an optional settings file (`tfscope.toml` by default, or the
//! file named by `TFBP_SETTINGS`) and then from `TFBP_*` environment
//! variables, which take precedence.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::model::DEFAULT_PAGE_SIZE;

pub const SETTINGS_PATH_VAR: &str = "TFBP_SETTINGS";
pub const DEFAULT_SETTINGS_PATH: &str = "tfscope";
pub const ENV_PREFIX: &str = "TFBP";

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}
fn default_page_size_default() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_page_size_max() -> u32 {
    10000
}
fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// SQLite database holding the dataset views.
    pub database_path: String,
    /// Credential passed to the metadata source.
    #[serde(default)]
    pub hf_token: Option<String>,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_page_size_default")]
    pub page_size_default: u32,
    #[serde(default = "default_page_size_max")]
    pub page_size_max: u32,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Settings {
    pub fn new(database_path: &str) -> Self {
        Self {
            database_path: database_path.to_string(),
            hf_token: None,
            cors_origins: default_cors_origins(),
            page_size_default: default_page_size_default(),
            page_size_max: default_page_size_max(),
            bind: default_bind(),
        }
    }
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(SETTINGS_PATH_VAR).unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
        Self::from_file(&path)
    }
    /// Settings from `path` (extension optional, the file may be absent)
    /// overlaid with the environment.
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
