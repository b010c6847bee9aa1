//! MCP stdio server exposing the paper tools

use std::sync::Arc;

use papyrus_arxiv::{DownloadRequest, PaperTools, PapersQuery, SearchRequest};
use rmcp::{
    ErrorData as McpError, ServiceExt,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListPapersArgs {
    /// Directory to list instead of the configured papers directory
    #[serde(default)]
    pub papers_dir: Option<String>,
}

/// Structured payload plus a text copy for clients that only read `content`
fn tool_result(payload: serde_json::Value) -> CallToolResult {
    let mut result = CallToolResult::structured(payload.clone());
    result.content = vec![Content::text(payload.to_string())];
    result
}

fn paths_payload(paths: &[PathBuf]) -> serde_json::Value {
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    serde_json::json!({ "count": paths.len(), "paths": paths })
}

#[derive(Clone)]
pub struct PaperServer {
    tool_router: ToolRouter<Self>,
    tools: Arc<PaperTools>,
}

#[tool_router]
impl PaperServer {
    pub fn new(tools: Arc<PaperTools>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            tools,
        }
    }

    #[tool(
        name = "search_papers_from_arxiv",
        description = "Search arXiv for papers. Returns id, title, authors, summary, publication date, PDF link and primary category for each hit."
    )]
    async fn search_papers_from_arxiv(
        &self,
        params: Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let papers = self.tools.search_papers(&params.0).await;
        let payload = serde_json::json!({ "count": papers.len(), "papers": papers });
        Ok(tool_result(payload))
    }

    #[tool(
        name = "download_papers",
        description = "Search arXiv and download every hit as a PDF into <output_dir>/<category>/. Returns the saved file paths; files already present are not fetched again."
    )]
    async fn download_papers(
        &self,
        params: Parameters<DownloadRequest>,
    ) -> Result<CallToolResult, McpError> {
        let paths = self.tools.download_papers(&params.0).await;
        Ok(tool_result(paths_payload(&paths)))
    }

    #[tool(
        name = "delete_papers",
        description = "Delete local papers whose file names fuzzily match the query. Returns the matched paths."
    )]
    async fn delete_papers(
        &self,
        params: Parameters<PapersQuery>,
    ) -> Result<CallToolResult, McpError> {
        let paths = self.tools.delete_papers(&params.0);
        Ok(tool_result(paths_payload(&paths)))
    }

    #[tool(
        name = "list_papers",
        description = "List the PDF files stored in the papers directory."
    )]
    async fn list_papers(
        &self,
        params: Parameters<Option<ListPapersArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        let paths = self.tools.list_papers(args.papers_dir.as_deref());
        Ok(tool_result(paths_payload(&paths)))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for PaperServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "arXiv paper tools: search, download, list and delete local PDFs.".to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve the paper tools over stdin/stdout until the client hangs up
pub async fn serve_stdio(tools: Arc<PaperTools>) -> anyhow::Result<()> {
    tracing::info!(papers_dir = %tools.papers_dir().display(), "starting MCP stdio server");
    let running = PaperServer::new(tools).serve(stdio()).await?;
    let reason = running.waiting().await?;
    tracing::info!(?reason, "MCP stdio server stopped");
    Ok(())
}
