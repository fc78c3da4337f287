//! Command tool - exposes an external program to the model
//!
//! The configured fixed arguments come first; the call arguments are passed
//! as one JSON object in the final argument. Stdout is the tool result.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::core::config::CommandToolConfig;
use crate::core::{ReagentError, Result};
use crate::tools::registry::{Tool, ToolArgs};

/// Runs a program per call
#[derive(Debug, Clone)]
pub struct CommandTool {
    name: String,
    description: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &CommandToolConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Fixed arguments placed before the JSON call arguments
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, args: &ToolArgs) -> Result<String> {
        let payload = Value::Object(args.clone()).to_string();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(tool = %self.name, program = %self.program, "Running command tool");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                ReagentError::tool(
                    &self.name,
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ReagentError::tool(&self.name, format!("program not found: {}", self.program))
                } else {
                    ReagentError::tool(&self.name, format!("failed to run: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ReagentError::tool(
                &self.name,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_args_are_last_argument() {
        let tool = CommandTool::new("echo", "Echo arguments", "echo").with_args(vec!["-n".into()]);
        let mut args = ToolArgs::new();
        args.insert("city".into(), Value::String("Paris".into()));

        let out = tool.call(&args).await.unwrap();
        assert_eq!(out, r#"{"city":"Paris"}"#);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_tool_error() {
        let tool = CommandTool::new("fail", "Always fails", "false");
        let err = tool.call(&ToolArgs::new()).await.unwrap_err();
        assert!(err.is_tool_error());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let tool = CommandTool::new("ghost", "Missing", "reagent-no-such-program");
        let err = tool.call(&ToolArgs::new()).await.unwrap_err();
        assert!(err.to_string().contains("program not found"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let tool = CommandTool::new("sleepy", "Sleeps", "sh")
            .with_args(vec!["-c".into(), "sleep 5".into()])
            .with_timeout(Duration::from_millis(100));
        let err = tool.call(&ToolArgs::new()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
