//! Action codec - pulls the structured action out of a model response
//!
//! Models narrate freely and embed one JSON object such as
//! `{"action":"call_tool","tool":"search","args":{...}}`. Anything that
//! does not decode cleanly is treated as a plain answer.

use serde::Deserialize;
use tracing::debug;

use crate::core::{ReagentError, Result};
use crate::tools::ToolArgs;

/// Literal prefix that opens an embedded action object
pub const MARKER: &str = "{\"action\"";

/// A decoded directive from one model response
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Deliver this text to the caller and stop
    FinalAnswer(String),
    /// Run a tool and feed its output back to the model
    CallTool { tool: String, args: ToolArgs },
    /// Select a skill; no skill runtime exists, so the caller gets the raw text
    UseSkill { skill: String, args: ToolArgs },
    /// An action value nobody handles
    Unrecognized(String),
}

impl Action {
    /// Text delivered to the caller when this action ends the run
    ///
    /// Returns `None` for tool calls, which continue the loop.
    pub fn answer_text(&self, raw: &str) -> Option<String> {
        match self {
            Action::FinalAnswer(text) => Some(text.clone()),
            Action::UseSkill { .. } | Action::Unrecognized(_) => Some(raw.to_string()),
            Action::CallTool { .. } => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action: String,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    args: Option<ToolArgs>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    skill: Option<String>,
}

/// Strip a BOM and surrounding whitespace, then drop everything after the
/// last closing brace or bracket
pub fn repair_json(payload: &str) -> &str {
    let trimmed = payload.trim_start_matches('\u{feff}').trim();
    match trimmed.rfind(['}', ']']) {
        Some(end) => trimmed[..=end].trim(),
        None => trimmed,
    }
}

/// Decode one complete model response
///
/// Only a `call_tool` action without a tool name is an error; every decode
/// failure resolves to a final answer carrying the unmodified response.
pub fn decode(response: &str) -> Result<Action> {
    let Some(start) = response.find(MARKER) else {
        return Ok(Action::FinalAnswer(response.to_string()));
    };

    let payload = repair_json(&response[start..]);
    let raw: RawAction = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(e) => {
            debug!(error = %e, "Action payload did not decode, treating as answer");
            return Ok(Action::FinalAnswer(response.to_string()));
        }
    };

    let args = raw.args.unwrap_or_default();
    match raw.action.as_str() {
        "call_tool" => match raw.tool {
            Some(tool) if !tool.is_empty() => Ok(Action::CallTool { tool, args }),
            _ => Err(ReagentError::MissingToolName),
        },
        "final_answer" => Ok(Action::FinalAnswer(
            raw.answer.unwrap_or_else(|| response.to_string()),
        )),
        "use_skill" => Ok(Action::UseSkill {
            skill: raw.skill.or(raw.tool).unwrap_or_default(),
            args,
        }),
        _ => Ok(Action::Unrecognized(raw.action)),
    }
}
