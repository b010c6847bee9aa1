//! papyrus - arXiv paper assistant

mod api;
mod chat;
mod config;
#[cfg(test)]
mod fake_arxiv;
mod logging;
mod mcp_server;
mod prompt;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use papyrus_agent::{CheckpointStore, FileCheckpointStore};
use papyrus_arxiv::PaperTools;

/// papyrus - find, download and manage arXiv papers
#[derive(Parser, Debug)]
#[command(name = "papyrus")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $PAPYRUS_CONFIG_PATH or ~/.config/papyrus/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat with the paper agent (default)
    Chat {
        /// Continue an existing conversation thread
        #[arg(long)]
        thread: Option<String>,
    },
    /// Serve the paper tools over MCP on stdin/stdout
    McpStdio,
    /// Serve the HTTP API
    Serve {
        /// Listen address (default: http_addr from config)
        #[arg(long)]
        addr: Option<String>,
    },
    /// List saved conversation threads
    Threads,
    /// Write an example config file
    InitConfig,
}

fn paper_tools(cfg: &config::Config) -> anyhow::Result<Arc<PaperTools>> {
    let tools = PaperTools::new(&cfg.arxiv_endpoint, &cfg.papers_dir)
        .with_context(|| format!("invalid arXiv endpoint {}", cfg.arxiv_endpoint))?;
    Ok(Arc::new(tools))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if let Some(Command::InitConfig) = args.command {
        let path = config::Config::init(args.config.as_deref())?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let cfg = config::Config::load(args.config.as_deref());
    let _log_guard = logging::init(&cfg.log_dir, args.verbose);

    match args.command.unwrap_or(Command::Chat { thread: None }) {
        Command::Chat { thread } => chat::run(&cfg, args.config.as_deref(), thread).await,
        Command::McpStdio => mcp_server::serve_stdio(paper_tools(&cfg)?).await,
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| cfg.http_addr.clone());
            api::serve(&addr, paper_tools(&cfg)?).await
        }
        Command::Threads => list_threads(&cfg.checkpoints_dir),
        Command::InitConfig => Ok(()),
    }
}

fn list_threads(dir: &Path) -> anyhow::Result<()> {
    let store = FileCheckpointStore::new(dir);
    let threads = store.threads()?;
    if threads.is_empty() {
        println!("No saved threads found.");
        println!("Threads are stored in: {}", dir.display());
        return Ok(());
    }

    println!("Saved threads:\n");
    for thread in threads {
        let Some(cp) = store.latest(&thread)? else {
            continue;
        };
        let when = chrono::DateTime::from_timestamp_millis(cp.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let status = match &cp.pending {
            Some(p) => format!("awaiting approval for {}", p.tool_name),
            None => format!("{} messages", cp.state.messages.len()),
        };
        println!("  {}  {}  {}", thread, when, status);
    }
    println!("\nResume with: papyrus chat --thread <ID>");
    Ok(())
}
