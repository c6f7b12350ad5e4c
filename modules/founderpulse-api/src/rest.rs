use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use founderpulse_brief::{ModelOutcome, RetrievalEngine, Summarizer};
use founderpulse_common::{Owner, TimeWindow};
use founderpulse_ingest::{EmbeddingBackfill, IngestError, ScrapeTarget};
use founderpulse_store::StoreError;

use crate::AppState;

// --- Request types ---

#[derive(Deserialize)]
pub struct ScrapeRequest {
    pub owner: Owner,
    pub profile_url: String,
    /// Keep posts dated on or after this date; stop scrolling past it.
    pub cutoff_date: NaiveDate,
    pub max_pages: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct BackfillRequest {
    pub batch_size: Option<i64>,
    pub max_batches: Option<u32>,
}

#[derive(Deserialize)]
pub struct SummarizeRequest {
    pub owner: Owner,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

// --- Helpers ---

fn ingest_error_response(e: &IngestError) -> axum::response::Response {
    let (status, kind) = match e {
        IngestError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        IngestError::Navigation(_) => (StatusCode::BAD_GATEWAY, "navigation-failure"),
        IngestError::IterationLimit { .. } => (StatusCode::BAD_GATEWAY, "iteration-limit"),
        IngestError::Store(StoreError::UnknownOwner(_)) => {
            (StatusCode::NOT_FOUND, "unknown-owner")
        }
        IngestError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
    };

    (
        status,
        Json(serde_json::json!({
            "error": e.to_string(),
            "kind": kind,
            "retryable": e.is_transient(),
        })),
    )
        .into_response()
}

// --- Handlers ---

pub async fn scrape(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeRequest>,
) -> impl IntoResponse {
    let cutoff = req
        .cutoff_date
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc();
    let target = ScrapeTarget {
        owner: req.owner,
        profile_url: req.profile_url,
    };

    match state
        .ingestor
        .scrape_profile(&target, cutoff, req.max_pages, &state.scrape_cancel)
        .await
    {
        Ok(report) => Json(serde_json::json!({
            "inserted": report.inserted,
            "skipped": report.skipped,
            "pages_loaded": report.pages_loaded,
        }))
        .into_response(),
        Err(e) => {
            warn!(owner = %target.owner, error = %e, "Scrape failed");
            ingest_error_response(&e)
        }
    }
}

pub async fn backfill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BackfillRequest>,
) -> impl IntoResponse {
    let mut job = EmbeddingBackfill::new(state.store.clone(), state.embedder.clone());
    if let Some(batch_size) = req.batch_size {
        job = job.with_batch_size(batch_size);
    }
    if let Some(max_batches) = req.max_batches {
        job = job.with_max_batches(max_batches);
    }

    match job.run().await {
        Ok(report) => Json(serde_json::json!({
            "processed": report.processed,
            "remaining_estimate": report.remaining_estimate,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Embedding backfill failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

pub async fn summarize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> impl IntoResponse {
    let window = TimeWindow::from_dates(req.start_date, req.end_date);

    let engine = RetrievalEngine::new(state.store.clone());
    let chunks = match engine.retrieve(&req.owner, &window).await {
        Ok(chunks) => chunks,
        Err(e) => {
            warn!(owner = %req.owner, error = %e, "Retrieval failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    let summarizer = Summarizer::from_config(&state.config);
    let results = summarizer.summarize(&chunks).await;

    // Persist the usable summaries for the downstream digest consumer.
    // A failed write degrades to a warning; the caller still gets the map.
    for (model, outcome) in &results {
        if let ModelOutcome::Ok { summary } = outcome {
            if let Err(e) = state
                .summaries
                .upsert(&req.owner, model, req.start_date, req.end_date, summary)
                .await
            {
                warn!(owner = %req.owner, model, error = %e, "Failed to store summary");
            }
        }
    }

    Json(serde_json::json!({ "summaries": results })).into_response()
}
