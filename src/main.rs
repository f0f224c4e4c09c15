use tracing::{error, info};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use tfscope::catalog::Catalog;
use tfscope::engine::{QueryEngine, SqliteEngine};
use tfscope::guard::SharedEngine;
use tfscope::hub::HubMetadata;
use tfscope::server::{AppState, router};
use tfscope::settings::Settings;

fn register_logger() {
    let log_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(log_filter).init();
}

#[tokio::main]
async fn main() {
    register_logger();
    if let Err(e) = serve().await {
        error!(error=%e, "tfscope stopped");
        std::process::exit(1);
    }
}

async fn serve() -> tfscope::Result<()> {
    let settings = Settings::load()?;
    let engine = SqliteEngine::open(&settings.database_path)?;
    let tables = engine.tables()?.len();
    info!(database = %settings.database_path, tables, "engine opened");

    let bind = settings.bind.clone();
    let state = AppState::new(
        SharedEngine::new(engine),
        Catalog::builtin(),
        HubMetadata::offline(),
        settings,
    );
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| tfscope::TfscopeError::Execution(e.to_string()))?;
    info!(%bind, "listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| tfscope::TfscopeError::Execution(e.to_string()))
}
