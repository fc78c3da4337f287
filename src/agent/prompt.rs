//! System prompt construction

use crate::tools::ToolRegistry;

const ACTION_RULES: &str = r#"You are a helpful assistant that can use tools.

When a tool is needed, reply with exactly one JSON object and nothing else:
{"action":"call_tool","tool":"<tool_name>","args":{...}}

Rules:
- Do not wrap the JSON in markdown code fences.
- Call at most one tool per reply, then wait for its result.
- Tool results arrive as a message starting with "Tool <name> returned:".
- When you can answer, reply in plain text, or with
  {"action":"final_answer","answer":"<your answer>"}"#;

/// Build the system prompt from the registered tools
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = String::from(ACTION_RULES);

    if tools.is_empty() {
        prompt.push_str("\n\nNo tools are available. Answer directly.");
    } else {
        prompt.push_str("\n\nAvailable tools:\n");
        prompt.push_str(&tools.catalog());
    }

    prompt
}
