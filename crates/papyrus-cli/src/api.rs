//! HTTP API over the paper tools

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use papyrus_arxiv::{DownloadRequest, Paper, PaperTools, PapersQuery, SearchRequest};
use serde::Deserialize;

pub type SharedTools = Arc<PaperTools>;

#[derive(Debug, Default, Deserialize)]
pub struct PapersParams {
    /// Fuzzy file-name filter; absent or blank lists everything
    pub query: Option<String>,
    pub papers_dir: Option<String>,
}

pub fn build_router(tools: SharedTools) -> Router {
    Router::new()
        .route("/arxiv/search", get(search))
        .route("/arxiv/download", post(download))
        .route("/arxiv/papers", get(papers))
        .with_state(tools)
}

fn to_strings(paths: Vec<PathBuf>) -> Vec<String> {
    paths.into_iter().map(|p| p.display().to_string()).collect()
}

async fn search(
    State(tools): State<SharedTools>,
    Json(request): Json<SearchRequest>,
) -> Json<Vec<Paper>> {
    Json(tools.search_papers(&request).await)
}

async fn download(
    State(tools): State<SharedTools>,
    Json(request): Json<DownloadRequest>,
) -> Json<Vec<String>> {
    Json(to_strings(tools.download_papers(&request).await))
}

async fn papers(
    State(tools): State<SharedTools>,
    Query(params): Query<PapersParams>,
) -> Json<Vec<String>> {
    let paths = match params.query.filter(|q| !q.trim().is_empty()) {
        Some(query) => tools.find_papers(&PapersQuery {
            query,
            papers_dir: params.papers_dir,
        }),
        None => tools.list_papers(params.papers_dir.as_deref()),
    };
    Json(to_strings(paths))
}

/// Serve the API on `addr` until Ctrl-C
pub async fn serve(addr: &str, tools: SharedTools) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP API listening");
    eprintln!("papyrus API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, build_router(tools))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server failed")?;
    tracing::info!("HTTP API stopped");
    Ok(())
}
