//! Custom error types for reagent
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for reagent operations
#[derive(Error, Debug)]
pub enum ReagentError {
    /// Model provider call failed or returned nothing usable
    #[error("Provider error: {0}")]
    Provider(String),

    /// Model not available on the provider
    #[error("Model '{0}' not available. For Ollama run: ollama pull {0}")]
    ModelNotFound(String),

    /// Provider cannot deliver tokens incrementally
    #[error("Provider '{0}' does not support streaming")]
    StreamingUnsupported(String),

    /// Capability the provider does not implement (embeddings, ...)
    #[error("Provider '{provider}' does not support {capability}")]
    Unsupported {
        provider: String,
        capability: &'static str,
    },

    /// The model asked for a tool that is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A call_tool action without a tool name
    #[error("Tool name is required for call_tool action")]
    MissingToolName,

    /// Tool execution errors
    #[error("Tool call failed for {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    /// The loop ran out of iterations without a final answer
    #[error("Max iterations ({0}) exceeded")]
    IterationsExceeded(usize),

    /// Memory store errors (always recovered by the session)
    #[error("Memory error: {0}")]
    Memory(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled by the caller
    #[error("Run cancelled")]
    Cancelled,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for reagent operations
pub type Result<T> = std::result::Result<T, ReagentError>;

impl ReagentError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a memory error
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came out of tool dispatch
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_) | Self::MissingToolName | Self::ToolExecution { .. }
        )
    }

    /// Whether this error came from the model provider
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::Provider(_)
                | Self::ModelNotFound(_)
                | Self::StreamingUnsupported(_)
                | Self::Unsupported { .. }
                | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ReagentError::ToolNotFound("x".into()).is_tool_error());
        assert!(ReagentError::MissingToolName.is_tool_error());
        assert!(ReagentError::tool("x", "boom").is_tool_error());
        assert!(!ReagentError::IterationsExceeded(3).is_tool_error());
        assert!(ReagentError::provider("down").is_provider_error());
        assert!(!ReagentError::Cancelled.is_provider_error());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ReagentError::IterationsExceeded(10).to_string(),
            "Max iterations (10) exceeded"
        );
        assert_eq!(
            ReagentError::tool("search", "timeout").to_string(),
            "Tool call failed for search: timeout"
        );
    }
}
