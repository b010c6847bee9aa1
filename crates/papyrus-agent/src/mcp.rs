//! Tools served by an MCP stdio server running as a child process

use std::path::Path;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, CallToolResult};
use rmcp::service::{Peer, RoleClient, RunningService, ServiceExt};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::tool::{BoxedTool, Tool, ToolResult};

/// A running MCP server and the tools it advertised
pub struct McpToolbox {
    service: RunningService<RoleClient, ()>,
    tools: Vec<BoxedTool>,
}

impl McpToolbox {
    /// Start `program args...` and list its tools. `envs` are added to the
    /// child's environment.
    pub async fn spawn(program: &Path, args: &[&str], envs: &[(String, String)]) -> Result<Self> {
        let child = TokioChildProcess::new(Command::new(program).configure(|cmd| {
            cmd.args(args);
            for (key, value) in envs {
                cmd.env(key, value);
            }
        }))
        .map_err(|e| Error::Mcp(format!("spawn {}: {}", program.display(), e)))?;

        let service = ()
            .serve(child)
            .await
            .map_err(|e| Error::Mcp(format!("handshake: {}", e)))?;

        let listed = service
            .list_tools(Default::default())
            .await
            .map_err(|e| Error::Mcp(format!("list_tools: {}", e)))?;

        let peer = service.peer().clone();
        let tools: Vec<BoxedTool> = listed
            .tools
            .into_iter()
            .map(|t| {
                Arc::new(McpTool {
                    peer: peer.clone(),
                    name: t.name.to_string(),
                    description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                    schema: serde_json::Value::Object((*t.input_schema).clone()),
                }) as BoxedTool
            })
            .collect();
        tracing::info!(count = tools.len(), "MCP tools loaded");

        Ok(Self { service, tools })
    }

    pub fn tools(&self) -> Vec<BoxedTool> {
        self.tools.clone()
    }

    /// Stop the child process
    pub async fn shutdown(self) {
        if let Err(e) = self.service.cancel().await {
            tracing::warn!(error = %e, "MCP server did not shut down cleanly");
        }
    }
}

struct McpTool {
    peer: Peer<RoleClient>,
    name: String,
    description: String,
    schema: serde_json::Value,
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let request = CallToolRequestParam {
            name: self.name.clone().into(),
            arguments: arguments.as_object().cloned(),
        };
        let result = tokio::select! {
            r = self.peer.call_tool(request) => r,
            _ = cancel.cancelled() => return ToolResult::error("Cancelled"),
        };
        match result {
            Ok(result) => to_tool_result(result),
            Err(e) => {
                tracing::error!(tool = %self.name, error = %e, "MCP call failed");
                ToolResult::error(format!("MCP call failed: {}", e))
            }
        }
    }
}

/// Prefer the structured payload; fall back to the text parts
fn to_tool_result(result: CallToolResult) -> ToolResult {
    let is_error = result.is_error.unwrap_or(false);
    if !is_error {
        if let Some(value) = result.structured_content {
            return ToolResult::json(value);
        }
    }
    let text = result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.clone()))
        .collect::<Vec<_>>()
        .join("\n");
    if is_error {
        ToolResult::error(text)
    } else {
        ToolResult::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::Content;

    #[test]
    fn test_structured_content_wins() {
        let result = CallToolResult::structured(serde_json::json!({"papers": []}));
        let converted = to_tool_result(result);
        assert!(!converted.is_error);
        assert_eq!(converted.details.unwrap()["papers"], serde_json::json!([]));
    }

    #[test]
    fn test_text_fallback() {
        let result = CallToolResult::success(vec![Content::text("a"), Content::text("b")]);
        let converted = to_tool_result(result);
        assert_eq!(converted.text_content(), "a\nb");
        assert!(converted.details.is_none());
    }

    #[test]
    fn test_error_result() {
        let result = CallToolResult::error(vec![Content::text("boom")]);
        let converted = to_tool_result(result);
        assert!(converted.is_error);
        assert_eq!(converted.text_content(), "boom");
    }
}
