//! Interactive chat with the paper agent

use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use papyrus_agent::{
    AgentEvent, FileCheckpointStore, Graph, GraphConfig, McpToolbox, PendingApproval,
    ProviderTransport, RunOutcome,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::prompt;
use crate::utils::truncate_chars;

const EXIT_COMMANDS: &[&str] = &["/bye", "/exit"];

/// Build the agent graph, with the paper tools served by a child
/// `papyrus mcp-stdio` process
async fn build_graph(
    config: &Config,
    config_path: Option<&Path>,
) -> anyhow::Result<(Graph, McpToolbox)> {
    let model = config.chat_model();
    let transport = ProviderTransport::for_model(&model, config.api_key.as_deref())
        .context("failed to set up the chat model")?;

    let mut graph_config = GraphConfig::new(model);
    graph_config.system_prompt = Some(prompt::system_prompt(config)?);
    graph_config.temperature = Some(config.temperature);
    graph_config.recursion_limit = config.recursion_limit;

    let store = FileCheckpointStore::new(&config.checkpoints_dir);
    let mut graph = Graph::new(graph_config, Arc::new(transport), Arc::new(store));

    let exe = std::env::current_exe().context("cannot locate the papyrus executable")?;
    let config_arg = config_path.map(|p| p.display().to_string());
    let mut args = vec!["mcp-stdio"];
    if let Some(path) = config_arg.as_deref() {
        args.extend(["--config", path]);
    }
    let envs = vec![
        ("PAPERS_DIR".to_string(), config.papers_dir.display().to_string()),
        ("ARXIV_API_ENDPOINT".to_string(), config.arxiv_endpoint.clone()),
        ("PAPYRUS_LOG_DIR".to_string(), config.log_dir.display().to_string()),
    ];
    let toolbox = McpToolbox::spawn(&exe, &args, &envs)
        .await
        .context("failed to start the paper tool server")?;
    graph.set_tools(toolbox.tools());
    tracing::info!(tools = ?graph.tool_names(), "agent ready");

    Ok((graph, toolbox))
}

pub async fn run(
    config: &Config,
    config_path: Option<&Path>,
    thread: Option<String>,
) -> anyhow::Result<()> {
    let (graph, toolbox) = build_graph(config, config_path).await?;
    let thread = thread.unwrap_or_else(|| Uuid::new_v4().to_string());

    if std::io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!("papyrus ({}) thread: {}", graph.config().model.id, thread);
        eprintln!("Type /bye or /exit to quit.");
        eprintln!();
    }

    let result = run_interactive(&graph, &thread).await;
    toolbox.shutdown().await;
    result
}

async fn run_interactive(graph: &Graph, thread: &str) -> anyhow::Result<()> {
    // A thread resumed from an earlier session may still be waiting on us.
    if let Some(pending) = graph.pending(thread)? {
        handle_approvals(graph, thread, pending).await?;
    }

    loop {
        let Some(input) = read_line("> ")? else {
            break;
        };
        if input.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&input.as_str()) {
            break;
        }
        if input == "/thread" {
            println!("{}", thread);
            continue;
        }

        println!();
        if let Some(RunOutcome::Interrupted(pending)) =
            drive(graph, graph.invoke(thread, &input)).await
        {
            handle_approvals(graph, thread, pending).await?;
        }
        println!();
    }

    Ok(())
}

/// Ask about each pending tool call until the run completes
async fn handle_approvals(
    graph: &Graph,
    thread: &str,
    mut pending: PendingApproval,
) -> anyhow::Result<()> {
    loop {
        println!("\n[system] {}", pending.prompt);
        let reply = read_line("(yes/no) > ")?.unwrap_or_default();
        match drive(graph, graph.resume(thread, pending.token, &reply)).await {
            Some(RunOutcome::Interrupted(next)) => pending = next,
            _ => return Ok(()),
        }
    }
}

/// Run one graph call while printing its events
async fn drive<F>(graph: &Graph, run: F) -> Option<RunOutcome>
where
    F: Future<Output = papyrus_agent::Result<RunOutcome>>,
{
    let receiver = graph.subscribe();
    let mut printer = tokio::spawn(print_events(receiver));
    let outcome = run.await;

    // Let the printer drain what the run already sent.
    if tokio::time::timeout(Duration::from_millis(200), &mut printer)
        .await
        .is_err()
    {
        printer.abort();
    }

    match outcome {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "agent run failed");
            eprintln!("\nError: {}", e);
            None
        }
    }
}

async fn print_events(mut receiver: broadcast::Receiver<AgentEvent>) {
    let is_tty = std::io::IsTerminal::is_terminal(&io::stdout());
    let mut last_text_len = 0;
    loop {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            AgentEvent::MessageUpdate { message } => {
                let text = message.text();
                let text_chars: Vec<char> = text.chars().collect();
                if text_chars.len() > last_text_len {
                    let new_text: String = text_chars[last_text_len..].iter().collect();
                    print!("{}", new_text);
                    io::stdout().flush().ok();
                    last_text_len = text_chars.len();
                }
            }
            AgentEvent::MessageEnd { .. } => {
                if last_text_len > 0 {
                    println!();
                }
                last_text_len = 0;
            }
            AgentEvent::ToolExecutionStart {
                tool_name,
                arguments,
                ..
            } => {
                let args = truncate_chars(&arguments.to_string(), 80);
                print!("[{} {}...", tool_name, args);
                io::stdout().flush().ok();
            }
            AgentEvent::ToolExecutionEnd {
                result, is_error, ..
            } => {
                let preview = truncate_chars(&result.replace('\n', " "), 60);
                if is_error {
                    println!(" error]");
                    println!("  {}", preview);
                } else {
                    println!(" {}]", preview);
                }
            }
            AgentEvent::RunEnd { usage, .. } => {
                if is_tty {
                    println!("[{} in, {} out]", usage.input, usage.output);
                }
                break;
            }
            // The failed run reports its own error.
            AgentEvent::Interrupt { .. } | AgentEvent::Error { .. } => break,
            _ => {}
        }
    }
}

/// Prompt and read one trimmed line; `None` on EOF
fn read_line(prompt: &str) -> anyhow::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}
