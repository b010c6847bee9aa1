//! Local stand-in for the arXiv API and PDF host, for tests

use axum::Router;
use axum::extract::Path;
use axum::routing::get;

fn feed(base: &str) -> String {
    let entry = |id: &str, title: &str, cat: &str| {
        format!(
            r#"<entry>
    <id>http://arxiv.org/abs/{id}</id>
    <published>2024-03-01T09:00:00Z</published>
    <title>{title}</title>
    <summary>About {title}.</summary>
    <author><name>A. Author</name></author>
    <link title="pdf" href="{base}/pdf/{id}" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="{cat}"/>
  </entry>"#
        )
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  {}
  {}
</feed>"#,
        entry("2403.00001v1", "Sparse Attention", "cs.LG"),
        entry("2403.00002v1", "Spectral Graphs", "math.CO"),
    )
}

/// Start the fake and return its API endpoint (`http://addr/api/query`)
pub async fn serve() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let body = feed(&base);
    let app = Router::new()
        .route("/api/query", get(move || async move { body }))
        .route(
            "/pdf/:id",
            get(|Path(id): Path<String>| async move { format!("%PDF-1.4 {id}").into_bytes() }),
        );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("{base}/api/query")
}
