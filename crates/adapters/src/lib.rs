//! Protocol adapters: each converts its own wire shape into the common
//! `run_steps` call and surfaces the step error taxonomy verbatim.

mod command;
mod deps;
mod mcp;
pub mod script;

pub use command::{CommandAdapter, CommandEnvelope, CommandReply};
pub use deps::{AgentDeps, ScopeContext};
pub use mcp::{McpAdapter, MCP_PROTOCOL_VERSION};
