//! arXiv search client

use std::time::Duration;

use tracing::Instrument;

use crate::atom::{self, AtomEntry};
use crate::dates::DateWindow;
use crate::error::{Error, Result};
use crate::paper::Paper;
use crate::query::SearchQuery;
use crate::request::SearchRequest;

pub const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";

/// arXiv returns at most this many entries per page
pub const MAX_PAGE_SIZE: usize = 50;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ArxivClient {
    http: reqwest::Client,
    endpoint: url::Url,
    span: tracing::Span,
}

impl ArxivClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint.trim())
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("papyrus/", env!("CARGO_PKG_VERSION")))
            .timeout(SEARCH_TIMEOUT)
            .build()?;
        let span = tracing::info_span!("arxiv", endpoint = %endpoint);
        Ok(Self {
            http,
            endpoint,
            span,
        })
    }

    /// Run a search, keep papers inside the date window and stop at
    /// `min(batch_size, 50)` results
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
        self.search_inner(request).instrument(self.span.clone()).await
    }

    async fn search_inner(&self, request: &SearchRequest) -> Result<Vec<Paper>> {
        let categories = request.categories.to_vec();
        let query = SearchQuery::build(&request.query, &categories)?;
        let cap = request.batch_size.min(MAX_PAGE_SIZE);
        if cap == 0 {
            return Ok(Vec::new());
        }
        let expression = query.expression();
        tracing::debug!(%expression, sort_by = request.sort_by.as_param(), cap, "searching");

        let window = DateWindow::parse(request.date_from.as_deref(), request.date_to.as_deref());

        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("search_query", expression.as_str()),
                ("sortBy", request.sort_by.as_param()),
                ("sortOrder", "descending"),
            ])
            .query(&[("start", 0), ("max_results", cap)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: body.trim().chars().take(200).collect(),
            });
        }
        let body = response.text().await?;
        let entries = atom::parse_feed(&body)?;
        let total = entries.len();

        let papers = select(entries, &window, cap);
        tracing::debug!(total, kept = papers.len(), "search finished");
        Ok(papers)
    }
}

/// Apply the date window in feed order, stopping at `cap`
fn select(entries: Vec<AtomEntry>, window: &DateWindow, cap: usize) -> Vec<Paper> {
    let mut papers = Vec::new();
    for entry in entries {
        if papers.len() >= cap {
            break;
        }
        if !window.is_open() {
            match entry.published_at() {
                Some(ts) if window.contains(ts) => {}
                Some(_) => continue,
                None => {
                    tracing::warn!(id = %entry.id_url, "entry without a usable published date");
                    continue;
                }
            }
        }
        papers.push(entry.into_paper());
    }
    papers
}
