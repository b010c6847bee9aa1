//! End-to-end search and download against a local fake arXiv

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use papyrus_arxiv::{Categories, DownloadRequest, PaperTools, SearchRequest, SortBy};

#[derive(Clone, Default)]
struct Seen {
    queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pdf_hits: Arc<Mutex<usize>>,
}

fn feed(base: &str) -> String {
    let entry = |id: &str, title: &str, published: &str, cat: &str, pdf: &str| {
        format!(
            r#"<entry>
    <id>http://arxiv.org/abs/{id}</id>
    <published>{published}</published>
    <title>{title}</title>
    <summary>About {title}.</summary>
    <author><name>A. Author</name></author>
    <link title="pdf" href="{pdf}" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="{cat}"/>
  </entry>"#
        )
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  {}
  {}
  {}
</feed>"#,
        entry("2402.00002v1", "Policy Gradients: Revisited", "2024-02-10T12:00:00Z", "cs.LG", &format!("{base}/pdf/2402.00002v1")),
        entry("2401.00001v1", "Reward Models", "2024-01-05T08:00:00Z", "cs.AI", &format!("{base}/pdf/2401.00001v1")),
        entry("2312.00003v1", "Broken Mirror", "2023-12-24T00:00:00Z", "stat.ML", &format!("{base}/pdf/broken")),
    )
}

async fn serve() -> (String, Seen) {
    let seen = Seen::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");

    let feed_body = feed(&base);
    let app = Router::new()
        .route(
            "/api/query",
            get(
                move |State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>| {
                    let body = feed_body.clone();
                    async move {
                        seen.queries.lock().unwrap().push(q);
                        body
                    }
                },
            ),
        )
        .route(
            "/pdf/:id",
            get(|State(seen): State<Seen>, Path(id): Path<String>| async move {
                if id == "broken" {
                    return Err(StatusCode::INTERNAL_SERVER_ERROR);
                }
                *seen.pdf_hits.lock().unwrap() += 1;
                Ok(format!("%PDF-1.4 {id}").into_bytes())
            }),
        )
        .with_state(seen.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, seen)
}

#[tokio::test]
async fn search_sends_combined_query_and_filters_dates() {
    let (base, seen) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let tools = PaperTools::new(&format!("{base}/api/query"), dir.path()).unwrap();

    let mut req = SearchRequest::new("reinforcement learning");
    req.batch_size = 80;
    req.sort_by = SortBy::LastUpdatedDate;
    req.categories = Categories::Many(vec!["cs.LG".into(), "cs.AI".into()]);
    req.date_from = Some("2024-01-01".into());
    req.date_to = Some("2024-02-10T12:00:00".into());

    let papers = tools.search_papers(&req).await;
    let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["2402.00002v1", "2401.00001v1"]);
    assert_eq!(papers[0].published, "2024-02-10T12:00:00+00:00");

    let queries = seen.queries.lock().unwrap();
    let q = &queries[0];
    assert_eq!(q["search_query"], "(reinforcement learning) (cat:cs.LG OR cat:cs.AI)");
    assert_eq!(q["max_results"], "50");
    assert_eq!(q["start"], "0");
    assert_eq!(q["sortBy"], "lastUpdatedDate");
    assert_eq!(q["sortOrder"], "descending");
}

#[tokio::test]
async fn download_skips_failures_and_existing_files() {
    let (base, seen) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let tools = PaperTools::new(&format!("{base}/api/query"), dir.path()).unwrap();

    let mut search = SearchRequest::new("rl");
    search.categories = Categories::Many(vec!["cs".into(), "stat".into()]);
    let req = DownloadRequest {
        search,
        output_dir: None,
    };

    let mut first = tools.download_papers(&req).await;
    first.sort();
    assert_eq!(first.len(), 2, "broken PDF is left out");
    assert!(first[0].ends_with("cs_AI/Reward Models.pdf"));
    assert!(first[1].ends_with("cs_LG/Policy Gradients_ Revisited.pdf"));
    assert!(first.iter().all(|p| p.is_absolute()));
    assert!(!dir.path().join("stat_ML/Broken Mirror.pdf").exists());
    assert_eq!(
        std::fs::read(&first[0]).unwrap(),
        b"%PDF-1.4 2401.00001v1"
    );
    assert_eq!(*seen.pdf_hits.lock().unwrap(), 2);

    let mut second = tools.download_papers(&req).await;
    second.sort();
    assert_eq!(second, first);
    assert_eq!(*seen.pdf_hits.lock().unwrap(), 2, "existing files are not fetched again");
}

#[tokio::test]
async fn download_honours_output_dir() {
    let (base, _seen) = serve().await;
    let library = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let tools = PaperTools::new(&format!("{base}/api/query"), library.path()).unwrap();

    let mut search = SearchRequest::new("reward");
    search.batch_size = 1;
    let req = DownloadRequest {
        search,
        output_dir: Some(elsewhere.path().to_string_lossy().into_owned()),
    };
    let paths = tools.download_papers(&req).await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with(elsewhere.path()));
    assert!(tools.list_papers(None).is_empty());
}
