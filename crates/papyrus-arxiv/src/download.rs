//! Concurrent PDF downloads into `<output_dir>/<category>/<title>.pdf`

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::paper::Paper;

/// Number of papers fetched at once, independent of batch size
pub const WORKERS: usize = 16;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Keep alphanumerics, space, `-`, `_` and `.`; everything else becomes `_`
pub fn sanitize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Directory name for a category: `cs.LG` -> `cs_LG`
pub fn category_dir(category: &str) -> String {
    category.replace(['.', '/', '\\'], "_")
}

/// Destination path for a paper under `output_dir`
pub fn paper_path(output_dir: &Path, paper: &Paper) -> PathBuf {
    let mut stem = sanitize_title(&paper.title);
    if stem.trim_matches(['.', ' ']).is_empty() {
        stem = sanitize_title(&paper.id);
    }
    output_dir
        .join(category_dir(&paper.primary_category))
        .join(format!("{}.pdf", stem))
}

enum Fetched {
    Written,
    AlreadyPresent,
}

#[derive(Clone)]
pub struct Downloader {
    http: reqwest::Client,
    workers: usize,
    span: tracing::Span,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("papyrus/", env!("CARGO_PKG_VERSION")))
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            workers: WORKERS,
            span: tracing::info_span!("download"),
        })
    }

    /// Download every paper, returning absolute paths of files that are now
    /// present (written or already there). Failures are logged and left
    /// out; the order of the result is unspecified.
    pub async fn download_all(&self, papers: &[Paper], output_dir: &Path) -> Vec<PathBuf> {
        let span = self.span.clone();
        async {
            // Each unit owns its inputs so the returned future stays `Send`.
            let results: Vec<Option<PathBuf>> = futures::stream::iter(papers.to_vec())
                .map(|paper| {
                    let this = self.clone();
                    let dir = output_dir.to_path_buf();
                    async move { this.download_logged(&paper, &dir).await }
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;
            let paths: Vec<PathBuf> = results.into_iter().flatten().collect();
            tracing::info!(requested = papers.len(), present = paths.len(), "downloads finished");
            paths
        }
        .instrument(span)
        .await
    }

    async fn download_logged(&self, paper: &Paper, output_dir: &Path) -> Option<PathBuf> {
        match self.download_one(paper, output_dir).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(url = %paper.pdf_url, error = %e, "download failed");
                None
            }
        }
    }

    /// Fetch one paper; an existing destination is left untouched
    pub async fn download_one(&self, paper: &Paper, output_dir: &Path) -> Result<PathBuf> {
        let url = url::Url::parse(&paper.pdf_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", paper.pdf_url, e)))?;
        if url.scheme().is_empty() || url.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidUrl(paper.pdf_url.clone()));
        }

        let dest = std::path::absolute(paper_path(output_dir, paper))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if tokio::fs::try_exists(&dest).await? {
            tracing::info!(path = %dest.display(), "already present, skipping");
            return Ok(dest);
        }

        match self.fetch_to(url, &dest).await? {
            Fetched::Written => {
                tracing::info!(url = %paper.pdf_url, path = %dest.display(), "downloaded")
            }
            Fetched::AlreadyPresent => {
                tracing::info!(path = %dest.display(), "written concurrently, skipping")
            }
        }
        Ok(dest)
    }

    async fn fetch_to(&self, url: url::Url, dest: &Path) -> Result<Fetched> {
        let response = self.http.get(url).send().await?.error_for_status()?;

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(Fetched::AlreadyPresent),
            Err(e) => return Err(e.into()),
        };

        let written = async {
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(dest).await {
                tracing::warn!(path = %dest.display(), error = %rm, "could not remove partial file");
            }
            return Err(e);
        }
        Ok(Fetched::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(title: &str, category: &str) -> Paper {
        Paper {
            id: "2401.00001v1".into(),
            title: title.into(),
            authors: vec![],
            summary: String::new(),
            published: String::new(),
            pdf_url: "https://arxiv.org/pdf/2401.00001v1".into(),
            primary_category: category.into(),
        }
    }

    #[test]
    fn test_sanitize_charset() {
        let s = sanitize_title("  Attention: Is All/You Need? (v2)  ");
        assert_eq!(s, "Attention_ Is All_You Need_ _v2_");
        assert!(
            s.chars()
                .all(|c| c.is_alphanumeric() || " -_.".contains(c))
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for title in ["a/b\\c", "Ünïcödé: title", "x.y-z_w", "\"quoted\" <tag>"] {
            let once = sanitize_title(title);
            assert_eq!(sanitize_title(&once), once);
        }
    }

    #[tokio::test]
    async fn test_download_all_runs_on_a_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_path_buf();
        let downloader = Downloader::new().unwrap();
        let handle = tokio::spawn(async move {
            let mut bad = paper("No Link", "cs.LG");
            bad.pdf_url = "not a url".into();
            downloader.download_all(&[bad], &out).await
        });
        assert!(handle.await.unwrap().is_empty());
    }

    #[test]
    fn test_category_dir() {
        assert_eq!(category_dir("cs.LG"), "cs_LG");
        assert_eq!(category_dir("hep-th"), "hep-th");
        assert_eq!(category_dir("../x"), "___x");
    }

    #[test]
    fn test_paper_path_layout() {
        let path = paper_path(Path::new("/data"), &paper("Deep Nets", "cs.LG"));
        assert_eq!(path, Path::new("/data/cs_LG/Deep Nets.pdf"));
    }

    #[test]
    fn test_empty_title_uses_id() {
        let path = paper_path(Path::new("/data"), &paper("   ", "math.AG"));
        assert_eq!(path, Path::new("/data/math_AG/2401.00001v1.pdf"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = paper("No Host", "cs.AI");
        p.pdf_url = "not-a-url".into();
        let downloader = Downloader::new().unwrap();
        assert!(matches!(
            downloader.download_one(&p, dir.path()).await,
            Err(Error::InvalidUrl(_))
        ));
        assert!(downloader.download_all(&[p], dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_fetched() {
        let dir = tempfile::tempdir().unwrap();
        // Unroutable URL: if a request were made it would fail.
        let mut p = paper("Cached", "cs.AI");
        p.pdf_url = "http://127.0.0.1:9/cached.pdf".into();
        let dest = paper_path(dir.path(), &p);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"%PDF-old").unwrap();

        let downloader = Downloader::new().unwrap();
        let got = downloader.download_one(&p, dir.path()).await.unwrap();
        assert_eq!(got, std::path::absolute(&dest).unwrap());
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-old");
    }
}
