//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing `call_tool` actions to them.
//! Lookup is case sensitive and first match wins, so a tool registered twice
//! under one name only ever sees calls through its first registration.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{ReagentError, Result};

/// Arguments of a `call_tool` action
pub type ToolArgs = Map<String, Value>;

/// An external capability the model can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `call_tool` actions
    fn name(&self) -> &str;

    /// Description injected verbatim into the system prompt
    fn description(&self) -> &str;

    /// Run the tool and return its raw output
    async fn call(&self, args: &ToolArgs) -> Result<String>;
}

/// Registry of available tools, in registration order
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if self.find(tool.name()).is_some() {
            warn!(tool = tool.name(), "Tool already registered; keeping the first one");
        }
        self.tools.push(tool);
    }

    /// Find a tool by exact name
    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Invoke a resolved tool, mapping foreign failures to a tool error
    pub async fn invoke(&self, tool: &dyn Tool, args: &ToolArgs) -> Result<String> {
        let payload = Value::Object(args.clone());
        debug!(tool = tool.name(), args = %payload, "Invoking tool");

        tool.call(args).await.map_err(|e| {
            if e.is_tool_error() {
                e
            } else {
                ReagentError::tool(tool.name(), e.to_string())
            }
        })
    }

    /// Resolve `name` and invoke it
    pub async fn dispatch(&self, name: &str, args: &ToolArgs) -> Result<String> {
        if name.is_empty() {
            return Err(ReagentError::MissingToolName);
        }
        let tool = self
            .find(name)
            .ok_or_else(|| ReagentError::ToolNotFound(name.to_string()))?;
        self.invoke(tool.as_ref(), args).await
    }

    /// One `- name: description` line per tool, for the system prompt
    pub fn catalog(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Registered tool names, in order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}
