//! papyrus-agent: the tool-calling agent graph
//!
//! A [`Graph`] drives one conversation thread through its nodes
//! (assistant, tools, human approval), checkpointing after every transition
//! so a thread can pause for approval and resume later, even in another
//! process.

pub mod checkpoint;
pub mod error;
pub mod events;
pub mod graph;
pub mod mcp;
pub mod state;
pub mod tool;
pub mod transport;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use error::{Error, Result};
pub use events::AgentEvent;
pub use graph::{Graph, GraphConfig, PendingApproval, RunOutcome};
pub use mcp::McpToolbox;
pub use state::{ConversationState, Decision, Node};
pub use tool::{BoxedTool, Tool, ToolResult};
pub use transport::{ProviderTransport, RunConfig, Transport};
