//! End-to-end runs of the blocking ReAct loop against a scripted model

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{reply, EchoTool, ExplodingTool, FailingMemory, ScriptedProvider, Step};
use reagent::core::{Config, Message, ReagentError, Role, TokenUsage};
use reagent::memory::{BufferMemory, Memory};
use reagent::Agent;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

async fn agent_with(provider: Arc<ScriptedProvider>) -> Agent {
    Agent::builder(provider)
        .tool(Arc::new(EchoTool::default()))
        .tool(Arc::new(ExplodingTool))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_plain_response_is_the_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply("Paris is the capital.")]));
    let agent = agent_with(provider.clone()).await;

    let answer = assert_ok!(agent.run("Capital of France?").await);
    assert_eq!(answer, "Paris is the capital.");
    assert_eq!(provider.calls(), 1);

    let messages = agent.messages().await;
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(messages[1].content, "Capital of France?");
    assert_eq!(messages[2].content, "Paris is the capital.");
}

#[tokio::test]
async fn test_system_prompt_lists_tools() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply("ok")]));
    let agent = agent_with(provider.clone()).await;
    agent.run("hi").await.unwrap();

    let first_request = &provider.requests()[0];
    assert!(first_request[0].is_system());
    assert!(first_request[0].content.contains("- echo: Returns the arguments it was given"));
    assert!(first_request[0].content.contains("- explode: Fails every time"));
}

#[tokio::test]
async fn test_tool_call_then_answer() {
    let echo = Arc::new(EchoTool::default());
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"Let me check. {"action":"call_tool","tool":"echo","args":{"city":"Oslo"}}"#),
        reply("It is cold in Oslo."),
    ]));
    let agent = Agent::builder(provider.clone())
        .tool(echo.clone())
        .build()
        .await
        .unwrap();

    let answer = agent.run("Weather in Oslo?").await.unwrap();
    assert_eq!(answer, "It is cold in Oslo.");
    assert_eq!(provider.calls(), 2);

    let calls = echo.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["city"], "Oslo");

    // the second request carries the observation as a user message
    let second = &provider.requests()[1];
    let observation = second.last().unwrap();
    assert_eq!(observation.role, Role::User);
    assert_eq!(observation.content, r#"Tool echo returned: echo {"city":"Oslo"}"#);

    let messages = agent.messages().await;
    assert_eq!(messages.len(), 5);
    assert_eq!(messages.last().unwrap(), &Message::assistant("It is cold in Oslo."));
}

#[tokio::test]
async fn test_trailing_narration_after_action_is_ignored() {
    let echo = Arc::new(EchoTool::default());
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply("{\"action\":\"call_tool\",\"tool\":\"echo\",\"args\":{\"n\":1}}\nI will wait for the result."),
        reply("done"),
    ]));
    let agent = Agent::builder(provider)
        .tool(echo.clone())
        .build()
        .await
        .unwrap();

    assert_eq!(agent.run("go").await.unwrap(), "done");
    assert_eq!(echo.calls().len(), 1);
}

#[tokio::test]
async fn test_final_answer_action_returns_its_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply(
        r#"Thinking done. {"action":"final_answer","answer":"42"}"#,
    )]));
    let agent = agent_with(provider).await;

    assert_eq!(agent.run("meaning of life?").await.unwrap(), "42");
}

#[tokio::test]
async fn test_malformed_action_answers_with_whole_response() {
    let text = r#"Here you go {"action":"call_tool","tool":"echo","args":{"#;
    let provider = Arc::new(ScriptedProvider::new(vec![reply(text)]));
    let agent = agent_with(provider.clone()).await;

    assert_eq!(agent.run("hi").await.unwrap(), text);
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_use_skill_answers_with_raw_response() {
    let text = r#"{"action":"use_skill","skill":"summarize","args":{}}"#;
    let provider = Arc::new(ScriptedProvider::new(vec![reply(text)]));
    let agent = agent_with(provider).await;

    assert_eq!(agent.run("summarize this").await.unwrap(), text);
}

#[tokio::test]
async fn test_iteration_bound_stops_after_one_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"{"action":"call_tool","tool":"echo","args":{}}"#),
        reply("never reached"),
    ]));
    let agent = Agent::builder(provider.clone())
        .tool(Arc::new(EchoTool::default()))
        .max_iterations(1)
        .build()
        .await
        .unwrap();

    let err = assert_err!(agent.run("loop").await);
    assert!(matches!(err, ReagentError::IterationsExceeded(1)));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_zero_iterations_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let result = Agent::builder(provider).max_iterations(0).build().await;
    assert!(matches!(result, Err(ReagentError::Config(_))));
}

#[tokio::test]
async fn test_tool_failure_ends_run_without_observation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        reply(r#"{"action":"call_tool","tool":"explode","args":{}}"#),
        reply("never reached"),
    ]));
    let agent = agent_with(provider.clone()).await;

    let err = assert_err!(agent.run("boom").await);
    assert!(err.is_tool_error());
    assert_eq!(err.to_string(), "Tool call failed for explode: kaboom");
    assert_eq!(provider.calls(), 1);

    // user and assistant messages stay, no tool result is appended
    let messages = agent.messages().await;
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_unknown_and_missing_tool_names() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply(
        r#"{"action":"call_tool","tool":"teleport","args":{}}"#,
    )]));
    let agent = agent_with(provider).await;
    let err = agent.run("go").await.unwrap_err();
    assert!(matches!(err, ReagentError::ToolNotFound(ref name) if name == "teleport"));

    let provider = Arc::new(ScriptedProvider::new(vec![reply(
        r#"{"action":"call_tool","args":{}}"#,
    )]));
    let agent = agent_with(provider).await;
    let err = agent.run("go").await.unwrap_err();
    assert!(matches!(err, ReagentError::MissingToolName));
}

#[tokio::test]
async fn test_provider_errors() {
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail("503".into())]));
    let agent = agent_with(provider).await;
    let err = agent.run("hi").await.unwrap_err();
    assert!(err.is_provider_error());

    let provider = Arc::new(ScriptedProvider::new(vec![Step::Empty]));
    let agent = agent_with(provider).await;
    let err = agent.run("hi").await.unwrap_err();
    assert!(matches!(err, ReagentError::Provider(ref m) if m.contains("no choices")));
}

#[tokio::test]
async fn test_failing_memory_does_not_fail_the_run() {
    let provider = Arc::new(ScriptedProvider::new(vec![reply("still here")]));
    let agent = Agent::builder(provider)
        .memory(Arc::new(FailingMemory))
        .conversation_id("c1")
        .build()
        .await
        .unwrap();

    assert_eq!(agent.run("hello").await.unwrap(), "still here");
    assert_eq!(agent.messages().await.len(), 3);
}

#[tokio::test]
async fn test_history_is_restored_for_the_same_conversation() {
    let memory = Arc::new(BufferMemory::new());

    let provider = Arc::new(ScriptedProvider::new(vec![reply("Nice to meet you, Ada.")]));
    let first = Agent::builder(provider)
        .memory(memory.clone())
        .conversation_id("ada")
        .build()
        .await
        .unwrap();
    first.run("My name is Ada.").await.unwrap();

    let stored = memory.load_messages("ada").await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|m| !m.is_system()));

    let provider = Arc::new(ScriptedProvider::new(vec![reply("Your name is Ada.")]));
    let second = Agent::builder(provider.clone())
        .memory(memory.clone())
        .conversation_id("ada")
        .build()
        .await
        .unwrap();
    second.run("What is my name?").await.unwrap();

    let request = &provider.requests()[0];
    assert_eq!(request.len(), 4);
    assert!(request[0].is_system());
    assert_eq!(request[1].content, "My name is Ada.");
    assert_eq!(request[3].content, "What is my name?");
}

#[tokio::test]
async fn test_switching_conversation_keeps_system_prefix() {
    let memory = Arc::new(BufferMemory::new());
    memory
        .save_messages("other", &[Message::user("earlier"), Message::assistant("reply")])
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![reply("first")]));
    let agent = Agent::builder(provider)
        .memory(memory.clone())
        .conversation_id("main")
        .system_prompt("Answer briefly.")
        .build()
        .await
        .unwrap();
    agent.run("hello").await.unwrap();
    let system: Vec<Message> = agent
        .messages()
        .await
        .into_iter()
        .filter(Message::is_system)
        .collect();
    assert_eq!(system.len(), 2);

    agent.set_conversation_id("other").await;
    assert_eq!(agent.conversation_id().await.as_deref(), Some("other"));

    let messages = agent.messages().await;
    assert_eq!(&messages[..2], &system[..]);
    assert_eq!(messages[2], Message::user("earlier"));
    assert_eq!(messages[3], Message::assistant("reply"));
    assert_eq!(messages.len(), 4);

    // an empty id stops persistence
    agent.set_conversation_id("").await;
    assert_eq!(agent.conversation_id().await, None);
    assert_eq!(agent.messages().await.len(), 2);
}

#[tokio::test]
async fn test_clear_history_forgets_stored_messages() {
    let memory = Arc::new(BufferMemory::new());
    let provider = Arc::new(ScriptedProvider::new(vec![reply("noted")]));
    let agent = Agent::builder(provider)
        .memory(memory.clone())
        .conversation_id("c")
        .build()
        .await
        .unwrap();
    agent.run("remember this").await.unwrap();

    agent.clear_history().await;
    assert!(memory.load_messages("c").await.unwrap().is_empty());
    let messages = agent.messages().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_system());
}

#[tokio::test]
async fn test_metadata_sums_usage_over_iterations() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Step::ReplyWithUsage(
            r#"{"action":"call_tool","tool":"echo","args":{}}"#.into(),
            TokenUsage::new(10, 5),
        ),
        Step::ReplyWithUsage("done".into(), TokenUsage::new(20, 3)),
    ]));
    let agent = Agent::builder(provider)
        .tool(Arc::new(EchoTool::default()))
        .conversation_id("meta")
        .build()
        .await
        .unwrap();
    agent.run("count").await.unwrap();

    let metadata = agent.metadata().await;
    assert_eq!(metadata.iterations, 2);
    assert_eq!(metadata.usage, TokenUsage::new(30, 8));
    assert_eq!(metadata.conversation_id.as_deref(), Some("meta"));
    assert!(metadata.duration().is_some());
}

#[tokio::test]
async fn test_run_with_cancel_abandons_a_hung_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![Step::Hang, reply("after")]));
    let agent = agent_with(provider).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = agent.run_with_cancel("hello?", cancel).await.unwrap_err();
    assert!(matches!(err, ReagentError::Cancelled));

    // the abandoned run still has its end recorded
    let metadata = agent.metadata().await;
    assert_eq!(metadata.iterations, 1);
    assert!(metadata.ended_at.is_some());
    assert!(metadata.duration().is_some());

    // the session lock was released with the abandoned run
    assert_eq!(agent.run("again").await.unwrap(), "after");
}

#[tokio::test]
async fn test_agent_from_config() {
    let config = Config::from_toml(
        r#"
[provider]
kind = "ollama"
model = "qwen3:8b"

[agent]
max_iterations = 4

[memory]
backend = "buffer"

[[tools]]
name = "date"
description = "Print the current date"
command = "date"
"#,
    )
    .unwrap();

    let agent = Agent::from_config(&config).await.unwrap();
    assert_eq!(agent.max_iterations(), 4);
    assert_eq!(agent.tools().names(), vec!["date"]);
    assert_eq!(agent.provider().name(), "ollama");
}
