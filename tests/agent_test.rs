//! Agent driving tools on a running server through a mocked chat API

mod common;

use futures::StreamExt;
use polymcp::llm::{
    create_provider, Agent, AgentError, AgentEvent, GenerationConfig, MessageRole,
    ProviderConfig, ProviderKind, StdioServerConfig,
};
use polymcp::{demo, ServerInfo};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn tool_call_turn(id: &str, name: &str, arguments: serde_json::Value) -> String {
    sse(&[
        json!({"id": "turn-1", "choices": [{"index": 0, "delta": {"role": "assistant", "tool_calls": [
            {"index": 0, "id": id, "type": "function", "function": {"name": name, "arguments": arguments.to_string()}}
        ]}, "finish_reason": null}]}),
        json!({"id": "turn-1", "choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
    ])
}

fn text_turn(text: &str) -> String {
    sse(&[
        json!({"id": "turn-2", "choices": [{"index": 0, "delta": {"role": "assistant", "content": text}, "finish_reason": null}]}),
        json!({"id": "turn-2", "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ])
}

/// Chat API that answers with `first` once, then with `rest` forever
async fn scripted_llm(first: String, rest: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rest))
        .with_priority(2)
        .mount(&server)
        .await;
    server
}

async fn agent(llm: &MockServer, tool_server: &str) -> Agent {
    let config = ProviderConfig::new(ProviderKind::OpenAi)
        .with_api_key("sk-test")
        .with_base_url(llm.uri());
    let provider = assert_ok!(create_provider(config));

    assert_ok!(Agent::from_servers(provider, [tool_server], GenerationConfig::new(256)).await)
}

async fn request_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_agent_calls_remote_tool_and_answers() {
    let tools = common::spawn_server(demo::registry().unwrap(), ServerInfo::default()).await;
    let llm = scripted_llm(
        tool_call_turn("call_1", "multiply", json!({"a": 6, "b": 7})),
        text_turn("6 times 7 is 42."),
    )
    .await;

    let mut agent = agent(&llm, &tools).await;
    assert_eq!(agent.tool_declarations().len(), 5);

    let mut events = Vec::new();
    {
        let mut stream = agent.run("What is 6 times 7?").await.unwrap();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
    }

    let completed: Vec<&AgentEvent> = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                AgentEvent::ToolExecutionCompleted { .. } | AgentEvent::Completed { .. }
            )
        })
        .collect();
    match completed.as_slice() {
        [AgentEvent::ToolExecutionCompleted { name, result, .. }, AgentEvent::Completed { text }] => {
            assert_eq!(name, "multiply");
            assert_eq!(result, &json!(42.0));
            assert_eq!(text, "6 times 7 is 42.");
        }
        other => panic!("unexpected events: {:?}", other),
    }

    // user, assistant tool call, tool result, final answer
    let roles: Vec<MessageRole> = agent.messages().iter().map(|message| message.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant
        ]
    );

    let bodies = request_bodies(&llm).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["tools"].as_array().unwrap().len(), 5);
    let tool_message = bodies[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|message| message["role"] == "tool")
        .unwrap();
    assert_eq!(tool_message["tool_call_id"], "call_1");
    assert_eq!(tool_message["content"], "42.0");
}

#[tokio::test]
async fn test_tool_error_is_sent_back_to_model() {
    let tools = common::spawn_server(demo::registry().unwrap(), ServerInfo::default()).await;
    let llm = scripted_llm(
        tool_call_turn("call_9", "divide", json!({"dividend": 1, "divisor": 0})),
        text_turn("You cannot divide by zero."),
    )
    .await;

    let mut agent = agent(&llm, &tools).await;
    let answer = agent.ask("What is 1 / 0?").await.unwrap();
    assert_eq!(answer, "You cannot divide by zero.");

    let bodies = request_bodies(&llm).await;
    let tool_message = bodies[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|message| message["role"] == "tool")
        .unwrap()
        .clone();
    assert_eq!(tool_message["content"], "Tool execution failed: Division by zero");
}

#[tokio::test]
async fn test_iteration_cap() {
    let tools = common::spawn_server(demo::registry().unwrap(), ServerInfo::default()).await;
    let looping = tool_call_turn("call_x", "add", json!({"a": 1, "b": 1}));
    let llm = scripted_llm(looping.clone(), looping).await;

    let mut agent = agent(&llm, &tools).await.with_max_iterations(3);
    let err = agent.ask("Keep adding").await.unwrap_err();
    assert!(matches!(err, AgentError::MaxIterationsReached(3)));
    assert_eq!(request_bodies(&llm).await.len(), 3);
}

#[tokio::test]
async fn test_agent_over_stdio_server() {
    let llm = scripted_llm(
        tool_call_turn("call_7", "greet", json!({"name": "Ada", "greeting": "Hi"})),
        text_turn("I said hi to Ada."),
    )
    .await;
    let config = ProviderConfig::new(ProviderKind::OpenAi)
        .with_api_key("sk-test")
        .with_base_url(llm.uri());
    let provider = assert_ok!(create_provider(config));

    let server = StdioServerConfig::new(env!("CARGO_BIN_EXE_polymcp")).with_args(["serve", "--stdio"]);
    let mut agent = assert_ok!(Agent::from_stdio(provider, [server], GenerationConfig::new(256)).await);
    assert_eq!(agent.tool_declarations().len(), 5);

    let answer = agent.ask("Greet Ada").await.unwrap();
    assert_eq!(answer, "I said hi to Ada.");

    let bodies = request_bodies(&llm).await;
    let tool_message = bodies[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|message| message["role"] == "tool")
        .unwrap()
        .clone();
    assert_eq!(tool_message["content"], "Hi, Ada!");
}

#[tokio::test]
async fn test_unreachable_tool_server() {
    let config = ProviderConfig::new(ProviderKind::Ollama);
    let provider = create_provider(config).unwrap();

    // Nothing listens on the discard port
    let result = Agent::from_servers(provider, ["http://127.0.0.1:9"], GenerationConfig::default()).await;
    assert!(matches!(result, Err(AgentError::Discovery(_))));

    let provider = create_provider(ProviderConfig::new(ProviderKind::Ollama)).unwrap();
    let missing = StdioServerConfig::new("polymcp-definitely-missing");
    let result = Agent::from_stdio(provider, [missing], GenerationConfig::default()).await;
    assert!(matches!(result, Err(AgentError::Stdio(_))));
}
