//! Cached repository metadata from the dataset hub.
//!
//! Datacards and size reports are fetched through a [`MetadataSource`] and
//! memoized per (repository, credential) in two bounded LRU caches. A failed
//! fetch is logged and remembered as an empty document, so a missing
//! repository is not fetched again on every catalog listing.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

// used for the bounded metadata caches
use lru::LruCache;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::error::{Result, TfscopeError};
use crate::model::DatasetCatalogEntry;

/// Entries kept per cache.
pub const DEFAULT_CACHE_SIZE: usize = 64;

/// Supplier of raw datacard and size documents.
pub trait MetadataSource: Send + Sync {
    fn fetch_datacard(&self, repo_id: &str, token: Option<&str>) -> Result<Value>;
    fn fetch_size_info(&self, repo_id: &str, token: Option<&str>) -> Result<Value>;
}

/// Source used when no hub is reachable; every fetch fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteMetadata;

impl MetadataSource for NoRemoteMetadata {
    fn fetch_datacard(&self, repo_id: &str, _token: Option<&str>) -> Result<Value> {
        Err(TfscopeError::Execution(format!(
            "no metadata source configured for '{repo_id}'"
        )))
    }
    fn fetch_size_info(&self, repo_id: &str, _token: Option<&str>) -> Result<Value> {
        Err(TfscopeError::Execution(format!(
            "no metadata source configured for '{repo_id}'"
        )))
    }
}

type CacheKey = (String, Option<String>);
type DocumentCache = Mutex<LruCache<CacheKey, Arc<Value>>>;

/// Row and column counts of one config; either may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfigSize {
    pub rows: Option<u64>,
    pub columns: Option<u64>,
}

pub struct HubMetadata {
    source: Box<dyn MetadataSource>,
    datacards: DocumentCache,
    sizes: DocumentCache,
}

#[derive(Clone, Copy)]
enum Document {
    Datacard,
    Size,
}

impl HubMetadata {
    pub fn new<S: MetadataSource + 'static>(source: S) -> Self {
        Self::with_cache_size(source, DEFAULT_CACHE_SIZE)
    }
    pub fn with_cache_size<S: MetadataSource + 'static>(source: S, size: usize) -> Self {
        let size = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
        Self {
            source: Box::new(source),
            datacards: Mutex::new(LruCache::new(size)),
            sizes: Mutex::new(LruCache::new(size)),
        }
    }
    /// Hub metadata without a remote source.
    pub fn offline() -> Self {
        Self::new(NoRemoteMetadata)
    }

    fn document(&self, kind: Document, repo_id: &str, token: Option<&str>) -> Result<Arc<Value>> {
        let cache = match kind {
            Document::Datacard => &self.datacards,
            Document::Size => &self.sizes,
        };
        let key: CacheKey = (repo_id.to_string(), token.map(str::to_string));
        {
            let mut cache = cache.lock().map_err(|e| TfscopeError::Lock(e.to_string()))?;
            if let Some(cached) = cache.get(&key) {
                return Ok(Arc::clone(cached));
            }
        }
        // fetched outside the lock, a concurrent miss may fetch the same key twice
        let fetched = match kind {
            Document::Datacard => self.source.fetch_datacard(repo_id, token),
            Document::Size => self.source.fetch_size_info(repo_id, token),
        };
        let document = Arc::new(fetched.unwrap_or_else(|e| {
            warn!(error = %e, repo_id, "metadata fetch failed");
            Value::Object(serde_json::Map::new())
        }));
        debug!(repo_id, "metadata document cached");
        cache
            .lock()
            .map_err(|e| TfscopeError::Lock(e.to_string()))?
            .put(key, Arc::clone(&document));
        Ok(document)
    }

    /// config name → column names, from `configs[].dataset_info.features[].name`.
    pub fn config_columns(
        &self,
        repo_id: &str,
        token: Option<&str>,
    ) -> Result<HashMap<String, Vec<String>>> {
        let raw = self.document(Document::Datacard, repo_id, token)?;
        Ok(parse_config_columns(&raw))
    }

    /// config name → sizes, from `size.configs[]` or a top-level `configs[]`.
    pub fn config_sizes(&self, repo_id: &str, token: Option<&str>) -> Result<HashMap<String, ConfigSize>> {
        let raw = self.document(Document::Size, repo_id, token)?;
        Ok(parse_config_sizes(&raw))
    }

    /// One entry per catalog item, enriched with hub metadata.
    pub fn catalog_entries(
        &self,
        catalog: &Catalog,
        active_ids: &HashSet<String>,
        token: Option<&str>,
    ) -> Result<Vec<DatasetCatalogEntry>> {
        let mut entries = Vec::with_capacity(catalog.items().len());
        for item in catalog.items() {
            let column_names = self
                .config_columns(&item.repo_id, token)?
                .remove(&item.config_name)
                .unwrap_or_default();
            let size = self
                .config_sizes(&item.repo_id, token)?
                .get(&item.config_name)
                .copied()
                .unwrap_or_default();
            let num_columns = size.columns.or_else(|| {
                (!column_names.is_empty()).then_some(column_names.len() as u64)
            });
            entries.push(DatasetCatalogEntry {
                id: item.id.clone(),
                name: item.name.clone(),
                repo_id: item.repo_id.clone(),
                config_name: item.config_name.clone(),
                db_name: item.db_name.clone(),
                sample_id_field: item.sample_id_field.clone(),
                estimated_rows: size.rows,
                num_columns,
                column_names,
                selectable: item.selectable,
                is_active: active_ids.contains(&item.id),
                unsupported_reason: item.unsupported_reason.clone(),
            });
        }
        Ok(entries)
    }
}

fn array<'v>(value: Option<&'v Value>) -> &'v [Value] {
    value.and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

pub fn parse_config_columns(raw: &Value) -> HashMap<String, Vec<String>> {
    let mut by_config = HashMap::new();
    for config in array(raw.get("configs")) {
        let Some(config_name) = config.get("config_name").and_then(Value::as_str) else {
            continue;
        };
        let features = array(config.get("dataset_info").and_then(|info| info.get("features")));
        let columns = features
            .iter()
            .filter_map(|feature| feature.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        by_config.insert(config_name.to_string(), columns);
    }
    by_config
}

pub fn parse_config_sizes(raw: &Value) -> HashMap<String, ConfigSize> {
    let node = raw.get("size").unwrap_or(raw);
    let mut by_config = HashMap::new();
    for config in array(node.get("configs")) {
        let Some(config_name) = config.get("config").and_then(Value::as_str) else {
            continue;
        };
        let rows = config
            .get("num_rows")
            .and_then(Value::as_u64)
            .or_else(|| config.get("estimated_num_rows").and_then(Value::as_u64));
        let columns = config.get("num_columns").and_then(Value::as_u64);
        by_config.insert(config_name.to_string(), ConfigSize { rows, columns });
    }
    by_config
}
