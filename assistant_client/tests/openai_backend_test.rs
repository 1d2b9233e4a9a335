use std::sync::Arc;

use assistant_client::{
    AgentSpec, AssistantBackend, AssistantError, BackendError, RunStatus, SessionRunner,
    models::{ConversationId, RunId},
    openai::OpenAiAssistants,
};
use httpmock::prelude::*;
use secrecy::SecretString;
use serde_json::json;

fn backend(server: &MockServer) -> OpenAiAssistants {
    OpenAiAssistants::new(SecretString::new("test-key".into()), &server.base_url()).unwrap()
}

fn analyst() -> AgentSpec {
    AgentSpec {
        name: "Data Analyst".into(),
        instructions: "Answer in Markdown.".into(),
        model: "gpt-4o-mini".into(),
    }
}

#[tokio::test]
async fn full_round_trip_over_http() {
    let server = MockServer::start_async().await;

    let create_agent = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/assistants")
                .header("authorization", "Bearer test-key")
                .header("openai-beta", "assistants=v2")
                .json_body(json!({
                    "name": "Data Analyst",
                    "instructions": "Answer in Markdown.",
                    "model": "gpt-4o-mini"
                }));
            then.status(200).json_body(json!({ "id": "asst_1", "object": "assistant" }));
        })
        .await;
    let create_thread = server
        .mock_async(|when, then| {
            when.method(POST).path("/threads");
            then.status(200).json_body(json!({ "id": "thread_1", "object": "thread" }));
        })
        .await;
    let post_message = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/threads/thread_1/messages")
                .json_body(json!({ "role": "user", "content": "make a table" }));
            then.status(200).json_body(json!({ "id": "msg_1", "object": "thread.message" }));
        })
        .await;
    let start_run = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/threads/thread_1/runs")
                .json_body(json!({ "assistant_id": "asst_1" }));
            then.status(200)
                .json_body(json!({ "id": "run_1", "object": "thread.run", "status": "completed" }));
        })
        .await;
    let list_messages = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/threads/thread_1/messages")
                .query_param("order", "desc");
            then.status(200).json_body(json!({
                "object": "list",
                "data": [
                    { "id": "msg_2", "role": "assistant",
                      "content": [{ "type": "text", "text": { "value": "| a | b |\n", "annotations": [] } }] },
                    { "id": "msg_1", "role": "user",
                      "content": [{ "type": "text", "text": { "value": "make a table", "annotations": [] } }] }
                ]
            }));
        })
        .await;

    let runner = SessionRunner::new(Arc::new(backend(&server)), analyst());
    let reply = runner.run("make a table").await.unwrap();

    assert_eq!(reply, "| a | b |");
    create_agent.assert_async().await;
    create_thread.assert_async().await;
    post_message.assert_async().await;
    start_run.assert_async().await;
    list_messages.assert_async().await;
}

#[tokio::test]
async fn retrieve_run_reads_status_with_the_bearer_key() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/threads/thread_9/runs/run_9")
                .header("authorization", "Bearer test-key");
            then.status(200)
                .json_body(json!({ "id": "run_9", "status": "in_progress", "model": "gpt-4o-mini" }));
        })
        .await;

    let run = backend(&server)
        .retrieve_run(&ConversationId::from("thread_9"), &RunId::from("run_9"))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::InProgress);
    assert_eq!(run.id, RunId::from("run_9"));
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/assistants");
            then.status(401).json_body(json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            }));
        })
        .await;

    let runner = SessionRunner::new(Arc::new(backend(&server)), analyst());
    match runner.run("p").await.unwrap_err() {
        AssistantError::Backend(BackendError::Api { status, message, .. }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
