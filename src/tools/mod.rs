//! Tools module - Tool contract and implementations for the agent
//!
//! Contains the tool registry (dispatcher) and the command-line tool adapter.

pub mod command;
pub mod registry;

use std::sync::Arc;

use crate::core::config::CommandToolConfig;

pub use command::CommandTool;
pub use registry::{Tool, ToolArgs, ToolRegistry};

/// Build a registry from configured command tools
pub fn from_config(tools: &[CommandToolConfig]) -> ToolRegistry {
    tools
        .iter()
        .map(|t| Arc::new(CommandTool::from_config(t)) as Arc<dyn Tool>)
        .collect()
}
