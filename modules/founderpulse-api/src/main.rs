use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use browserless_client::BrowserlessClient;
use founderpulse_common::Config;
use founderpulse_ingest::{Embedder, Ingestor, SessionFactory, TextEmbedder};
use founderpulse_store::{PostStore, SummaryStore};

mod rest;

pub struct AppState {
    pub config: Config,
    pub store: PostStore,
    pub summaries: SummaryStore,
    pub ingestor: Ingestor,
    pub embedder: Arc<dyn TextEmbedder>,
    pub scrape_cancel: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("founderpulse=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let store = PostStore::new(pool.clone());
    let summaries = SummaryStore::new(pool);

    let browserless = Arc::new(BrowserlessClient::new(
        &config.browserless_url,
        config.browserless_token.as_deref(),
    ));
    let sessions: Arc<dyn SessionFactory> = Arc::new(browserless);
    let ingestor = Ingestor::new(store.clone(), sessions);

    let embedder: Arc<dyn TextEmbedder> = Arc::new(Embedder::new(
        &config.openai_api_key,
        &config.embedding_model,
        config.embedding_dimensions,
    ));

    let addr = format!("{}:{}", config.web_host, config.web_port);

    let state = Arc::new(AppState {
        config,
        store,
        summaries,
        ingestor,
        embedder,
        scrape_cancel: Arc::new(AtomicBool::new(false)),
    });

    let app = Router::new()
        // Liveness probe for the ingestion-health collaborator
        .route("/", get(|| async { "ok" }))
        .route("/scrape", post(rest::scrape))
        .route("/backfill", post(rest::backfill))
        .route("/summarize", post(rest::summarize))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "founderpulse api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
