use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::analysis;
use crate::catalog::Catalog;
use crate::correlation::correlation_matrix;
use crate::engine::{ColumnInfo, Datum, QueryEngine, QueryParams, SqliteEngine};
use crate::error::{Result, TfscopeError};
use crate::guard::SharedEngine;
use crate::hub::HubMetadata;
use crate::identifier::validate_identifier;
use crate::intersection::IntersectionEngine;
use crate::model::{
    AnalysisRequest, CorrelationMatrix, CorrelationRequest, DatasetCatalogEntry, DatasetInfo, DatasetPage,
    FilterOption, FilterValuesRequest, FilterValuesResponse, HealthResponse, IntersectionCell,
    IntersectionRequest, PaginatedResponse, QueryRequest, Record, ReloadRequest, ReloadResponse,
    SourceSummary,
};
use crate::schema::filter_options;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SharedEngine>,
    pub catalog: Arc<Catalog>,
    pub hub: Arc<HubMetadata>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(engine: SharedEngine, catalog: Catalog, hub: HubMetadata, settings: Settings) -> Self {
        Self {
            engine: Arc::new(engine),
            catalog: Arc::new(catalog),
            hub: Arc::new(hub),
            settings: Arc::new(settings),
        }
    }
}

// ------------- Errors -------------
/// Client errors are 400, failures of the service itself are 500.
pub fn status_for(error: &TfscopeError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug)]
pub struct ApiError(pub TfscopeError);

impl From<TfscopeError> for ApiError {
    fn from(e: TfscopeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let msg = format!("{}", self.0);
        warn!(%msg, code=%status.as_u16(), "request error");
        (status, Json(json!({ "detail": msg }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// Engine calls are synchronous, so each request runs its whole operation on a
// blocking thread while holding the engine lock.
async fn run_blocking<T, F>(state: &AppState, operation: &'static str, work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn QueryEngine) -> Result<T> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || engine.run(work))
        .await
        .map_err(|e| {
            warn!(error=%e, "Join error");
            ApiError(TfscopeError::Execution(e.to_string()))
        })?;
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    let value = result?;
    info!(ms, operation, "request complete");
    Ok(Json(value))
}

// ------------- Handlers -------------
async fn health(State(state): State<AppState>) -> ApiResult<HealthResponse> {
    run_blocking(&state, "health", analysis::health).await
}

async fn tables(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    run_blocking(&state, "tables", |engine| engine.tables()).await
}

async fn describe(State(state): State<AppState>, Path(table): Path<String>) -> ApiResult<Vec<ColumnInfo>> {
    validate_identifier(&table)?;
    run_blocking(&state, "describe", move |engine| engine.describe(&table)).await
}

async fn fields(State(state): State<AppState>, Path(table): Path<String>) -> ApiResult<Vec<String>> {
    validate_identifier(&table)?;
    run_blocking(&state, "fields", move |engine| engine.fields(&table)).await
}

async fn query(State(state): State<AppState>, Json(request): Json<QueryRequest>) -> ApiResult<PaginatedResponse> {
    let pagination = request.paging.resolve(state.settings.page_size_default);
    pagination.validate(state.settings.page_size_max)?;
    let params: QueryParams = request
        .params
        .iter()
        .map(|(name, value)| (name.clone(), Datum::from(value)))
        .collect();
    run_blocking(&state, "query", move |engine| {
        analysis::paginated_query(engine, &request.sql, &params, pagination)
    })
    .await
}

#[derive(Debug, Deserialize)]
struct SampleParams {
    #[serde(default = "default_sample_size")]
    n: u32,
}

fn default_sample_size() -> u32 {
    10
}

async fn sample(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<SampleParams>,
) -> ApiResult<Vec<Record>> {
    run_blocking(&state, "sample", move |engine| {
        analysis::sample_rows(engine, &table, params.n)
    })
    .await
}

async fn distinct(
    State(state): State<AppState>,
    Path((table, field)): Path<(String, String)>,
) -> ApiResult<Vec<Datum>> {
    run_blocking(&state, "distinct", move |engine| {
        analysis::distinct_values(engine, &table, &field)
    })
    .await
}

async fn count(State(state): State<AppState>, Path(table): Path<String>) -> ApiResult<u64> {
    run_blocking(&state, "count", move |engine| analysis::row_count(engine, &table)).await
}

async fn table_filter_options(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> ApiResult<Vec<FilterOption>> {
    run_blocking(&state, "filter_options", move |engine| filter_options(engine, &table)).await
}

async fn intersection(
    State(state): State<AppState>,
    Json(request): Json<IntersectionRequest>,
) -> ApiResult<Vec<IntersectionCell>> {
    let catalog = Arc::clone(&state.catalog);
    run_blocking(&state, "intersection", move |engine| {
        IntersectionEngine::new(&catalog).compute(engine, &request.datasets, &request.filters)
    })
    .await
}

async fn source_summary(
    State(state): State<AppState>,
    Path(db_name): Path<String>,
) -> ApiResult<SourceSummary> {
    let catalog = Arc::clone(&state.catalog);
    run_blocking(&state, "source_summary", move |engine| {
        analysis::source_summary(engine, &catalog, &db_name)
    })
    .await
}

// binding and perturbation listings only differ in which datasets the caller sends
async fn dataset_pages(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> ApiResult<Vec<DatasetPage>> {
    let pagination = request.paging.resolve(state.settings.page_size_default);
    pagination.validate(state.settings.page_size_max)?;
    if request.datasets.is_empty() {
        return Ok(Json(Vec::new()));
    }
    run_blocking(&state, "dataset_pages", move |engine| {
        analysis::dataset_pages(engine, &request.datasets, &request.filters, pagination)
    })
    .await
}

async fn correlation(
    State(state): State<AppState>,
    Json(request): Json<CorrelationRequest>,
) -> ApiResult<CorrelationMatrix> {
    run_blocking(&state, "correlation", move |engine| correlation_matrix(engine, &request)).await
}

async fn filter_values(
    State(state): State<AppState>,
    Json(request): Json<FilterValuesRequest>,
) -> ApiResult<FilterValuesResponse> {
    run_blocking(&state, "filter_values", move |engine| {
        analysis::distinct_across(engine, &request.datasets, &request.column)
    })
    .await
}

async fn datasets(State(state): State<AppState>) -> ApiResult<Vec<DatasetInfo>> {
    let catalog = Arc::clone(&state.catalog);
    run_blocking(&state, "datasets", move |engine| analysis::registered_datasets(engine, &catalog)).await
}

async fn common_fields(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let catalog = Arc::clone(&state.catalog);
    run_blocking(&state, "common_fields", move |engine| analysis::common_fields(engine, &catalog)).await
}

async fn dataset_catalog(State(state): State<AppState>) -> ApiResult<Vec<DatasetCatalogEntry>> {
    let catalog = Arc::clone(&state.catalog);
    let active_ids = run_blocking(&state, "active_ids", move |engine| {
        Ok(catalog.active_ids(&engine.tables()?))
    })
    .await?
    .0;
    // hub lookups do not touch the engine, so they run without its lock
    let hub = Arc::clone(&state.hub);
    let catalog = Arc::clone(&state.catalog);
    let token = state.settings.hf_token.clone();
    let entries = tokio::task::spawn_blocking(move || {
        hub.catalog_entries(&catalog, &active_ids, token.as_deref())
    })
    .await
    .map_err(|e| {
        warn!(error=%e, "Join error");
        ApiError(TfscopeError::Execution(e.to_string()))
    })??;
    Ok(Json(entries))
}

async fn reload(
    State(state): State<AppState>,
    request: Option<Json<ReloadRequest>>,
) -> ApiResult<ReloadResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let started = Instant::now();
    let reloaded = tokio::task::spawn_blocking(move || reload_active_set(&state, &request.dataset_ids))
        .await
        .map_err(|e| {
            warn!(error=%e, "Join error");
            ApiError(TfscopeError::Execution(e.to_string()))
        })??;
    info!(ms = started.elapsed().as_secs_f64() * 1000.0, tables = reloaded.tables_registered, "engine reloaded");
    Ok(Json(reloaded))
}

/// Validates `dataset_ids` against the catalog, reopens the database and
/// swaps the new handle in. The database is opened before the lock is taken,
/// so requests keep running against the old handle until the swap.
///
/// The selection is only checked, never applied: every view in the database
/// is registered again, and `active_dataset_ids` reports the catalog items
/// whose view exists, whether or not they were selected.
pub fn reload_active_set(state: &AppState, dataset_ids: &[String]) -> Result<ReloadResponse> {
    state.catalog.select(dataset_ids)?;
    let fresh = SqliteEngine::open(&state.settings.database_path)?;
    let tables = fresh.tables()?;
    state.engine.replace(Box::new(fresh))?;
    let mut active_dataset_ids: Vec<String> = state.catalog.active_ids(&tables).into_iter().collect();
    active_dataset_ids.sort();
    Ok(ReloadResponse {
        database_path: state.settings.database_path.clone(),
        tables_registered: tables.len(),
        active_dataset_ids,
    })
}

// ------------- Router -------------
fn cors(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error=%e, %origin, "ignoring CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

pub fn router(state: AppState) -> Router {
    let cors = cors(&state.settings);
    let api = Router::new()
        .route("/health", get(health))
        .route("/tables", get(tables))
        .route("/schema/:table", get(describe))
        .route("/fields/:table", get(fields))
        .route("/datasets", get(datasets))
        .route("/common-fields", get(common_fields))
        .route("/query", post(query))
        .route("/tables/:table/sample", get(sample))
        .route("/tables/:table/distinct/:field", get(distinct))
        .route("/tables/:table/count", get(count))
        .route("/active-set/filter-options/:table", get(table_filter_options))
        .route("/active-set/intersection", post(intersection))
        .route("/active-set/reload", post(reload))
        .route("/analysis/source-summary/:db_name", get(source_summary))
        .route("/analysis/binding", post(dataset_pages))
        .route("/analysis/perturbation", post(dataset_pages))
        .route("/analysis/correlation", post(correlation))
        .route("/analysis/filter-options", post(filter_values))
        .route("/dataset-catalog", get(dataset_catalog));
    Router::new()
        .nest("/api/v1", api)
        .layer(cors)
        .with_state(state)
}
