//! Tool-facing operations. Every failure here is logged and reduced to an
//! empty (or partial) result so a model never sees a raw error.

use std::path::{Path, PathBuf};

use crate::client::ArxivClient;
use crate::download::Downloader;
use crate::error::Result;
use crate::library;
use crate::paper::Paper;
use crate::request::{DownloadRequest, PapersQuery, SearchRequest};

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[derive(Clone)]
pub struct PaperTools {
    client: ArxivClient,
    downloader: Downloader,
    papers_dir: PathBuf,
}

impl PaperTools {
    pub fn new(endpoint: &str, papers_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            client: ArxivClient::new(endpoint)?,
            downloader: Downloader::new()?,
            papers_dir: papers_dir.into(),
        })
    }

    pub fn papers_dir(&self) -> &Path {
        &self.papers_dir
    }

    fn dir_or_default(&self, dir: Option<&str>) -> PathBuf {
        match dir.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => expand_home(d),
            None => self.papers_dir.clone(),
        }
    }

    pub async fn search_papers(&self, request: &SearchRequest) -> Vec<Paper> {
        tracing::info!(query = %request.query, "search_papers_from_arxiv");
        match self.client.search(request).await {
            Ok(papers) => {
                tracing::info!(found = papers.len(), "search_papers_from_arxiv completed");
                papers
            }
            Err(e) => {
                tracing::error!(error = %e, "search failed");
                Vec::new()
            }
        }
    }

    /// Search, then fetch every hit into the output directory
    pub async fn download_papers(&self, request: &DownloadRequest) -> Vec<PathBuf> {
        tracing::info!(query = %request.search.query, "download_papers");
        let output_dir = self.dir_or_default(request.output_dir.as_deref());
        let papers = match self.client.search(&request.search).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::error!(error = %e, "search before download failed");
                return Vec::new();
            }
        };
        let paths = self.downloader.download_all(&papers, &output_dir).await;
        tracing::info!(files = paths.len(), "download_papers completed");
        paths
    }

    pub fn list_papers(&self, papers_dir: Option<&str>) -> Vec<PathBuf> {
        library::list_papers(&self.dir_or_default(papers_dir))
    }

    pub fn find_papers(&self, query: &PapersQuery) -> Vec<PathBuf> {
        library::fuzzy_find(&query.query, &self.dir_or_default(query.papers_dir.as_deref()))
    }

    pub fn delete_papers(&self, query: &PapersQuery) -> Vec<PathBuf> {
        tracing::info!(query = %query.query, "delete_papers");
        library::delete_papers(&query.query, &self.dir_or_default(query.papers_dir.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home("~/papers"), home.join("papers"));
        assert_eq!(expand_home("/srv/papers"), PathBuf::from("/srv/papers"));
        assert_eq!(expand_home("rel/~/x"), PathBuf::from("rel/~/x"));
    }

    #[tokio::test]
    async fn test_errors_become_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let tools = PaperTools::new("http://127.0.0.1:9/api/query", dir.path()).unwrap();

        let mut bad = SearchRequest::new("llm");
        bad.categories = crate::request::Categories::One("zoology".into());
        assert!(tools.search_papers(&bad).await.is_empty());

        let download = DownloadRequest {
            search: SearchRequest::new(""),
            output_dir: None,
        };
        assert!(tools.download_papers(&download).await.is_empty());
    }

    #[test]
    fn test_blank_dir_falls_back_to_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Paper One.pdf"), b"%PDF").unwrap();
        let tools = PaperTools::new(crate::DEFAULT_ENDPOINT, dir.path()).unwrap();

        assert_eq!(tools.list_papers(Some("  ")).len(), 1);
        let q = PapersQuery {
            query: "one".into(),
            papers_dir: None,
        };
        assert_eq!(tools.find_papers(&q).len(), 1);
        assert_eq!(tools.delete_papers(&q).len(), 1);
        assert!(tools.list_papers(None).is_empty());
    }
}
