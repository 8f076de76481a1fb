mod common;

use common::{answer_directly, grounded, web_search, TestApp, FEES_PAGE, FEES_URL};
use kb_service::services::fetcher::{FetchError, MockContentFetcher};
use kb_service::services::providers::mock::MockTextProvider;
use kb_service::services::providers::ProviderError;
use kb_service::services::session_store::InMemorySessionStore;
use kb_service::workflow::prompts::{
    FETCH_FAILED_ANSWER, RETRIEVAL_UNREADABLE_ANSWER, ROUTER_FALLBACK_ANSWER,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn fees_question_is_answered_from_the_fees_page() {
    let app = TestApp::spawn().await;
    let answer = "A taxa no débito é de 1,37% e no crédito à vista é de 3,15%.";
    app.provider.push_response(web_search(FEES_URL));
    app.provider.push_response(grounded(FEES_URL, answer));

    let (status, body) = app
        .chat("user-1", "conv-1", "Quais são as taxas da maquininha?")
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], answer);
    assert_eq!(body["source_agent_response"], answer);
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "WebSearch" },
            { "agent": "KnowledgeAgent" }
        ])
    );
    assert_eq!(body["sourceDocuments"][0]["metadata"], FEES_URL);
    assert_eq!(body["sourceDocuments"][0]["pageContent"], FEES_PAGE);
    assert_eq!(app.fetcher.calls(), vec![FEES_URL.to_string()]);

    // The grounded prompt carries the page content
    let requests = app.provider.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].params.json_mode);
    assert!(requests[1]
        .messages
        .iter()
        .any(|t| t.content.contains("Crédito à vista: 3,15%")));
}

#[tokio::test]
async fn general_question_is_answered_directly() {
    let app = TestApp::spawn().await;
    app.provider.push_response(answer_directly("4"));
    app.provider.push_response("2 + 2 = 4");

    let (status, body) = app.chat("user-1", "conv-1", "What is 2+2?").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], "2 + 2 = 4");
    assert_eq!(body["sourceDocuments"], json!([]));
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "AnswerDirectly" },
            { "agent": "InternalProcessingAgent" }
        ])
    );
    assert!(app.fetcher.calls().is_empty());
}

#[tokio::test]
async fn fetch_failure_returns_canned_answer_without_sources() {
    let app = TestApp::spawn_with(
        MockTextProvider::with_responses([web_search(FEES_URL)]),
        MockContentFetcher::new().with_error(FEES_URL, FetchError::Status(503)),
        Arc::new(InMemorySessionStore::new()),
    )
    .await;

    let (status, body) = app.chat("user-1", "conv-1", "Quais são as taxas?").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], FETCH_FAILED_ANSWER);
    assert_eq!(body["sourceDocuments"], json!([]));
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "WebSearch" },
            { "agent": "InternalProcessingAgent", "decision": "Fallback" }
        ])
    );
    // Only the router spoke to the model
    assert_eq!(app.provider.requests().len(), 1);
}

#[tokio::test]
async fn fetch_timeout_is_served_as_fetch_fallback() {
    let app = TestApp::spawn_with(
        MockTextProvider::with_responses([web_search(FEES_URL)]),
        MockContentFetcher::new().with_error(FEES_URL, FetchError::Timeout(30)),
        Arc::new(InMemorySessionStore::new()),
    )
    .await;

    let (status, body) = app.chat("user-1", "conv-1", "Quais são as taxas?").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], FETCH_FAILED_ANSWER);
    assert_eq!(body["agent_workflow"][1]["agent"], "InternalProcessingAgent");
    assert_eq!(body["agent_workflow"][1]["decision"], "Fallback");
}

#[tokio::test]
async fn unreadable_grounded_answer_returns_canned_error() {
    let app = TestApp::spawn().await;
    app.provider.push_response(web_search(FEES_URL));
    app.provider.push_response("{\"routerDecision\": \"WEB_SEARCH\", \"message\": ");

    let (status, body) = app.chat("user-1", "conv-1", "Quais são as taxas?").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], RETRIEVAL_UNREADABLE_ANSWER);
    assert_eq!(body["sourceDocuments"], json!([]));
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "WebSearch" },
            { "agent": "System", "decision": "Error" }
        ])
    );
}

#[tokio::test]
async fn unparseable_router_output_falls_back_to_direct_answer() {
    let app = TestApp::spawn().await;
    app.provider.push_response("I think you should search the web.");
    app.provider.push_response("Here is what I know.");

    let (status, body) = app.chat("user-1", "conv-1", "Tell me something").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], "Here is what I know.");
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "Fallback" },
            { "agent": "InternalProcessingAgent" }
        ])
    );
}

#[tokio::test]
async fn router_fallback_apology_survives_direct_failure() {
    let app = TestApp::spawn().await;
    app.provider.push_response("not json at all");
    app.provider
        .push_error(ProviderError::ApiError("model overloaded".to_string()));

    let (status, body) = app.chat("user-1", "conv-1", "Tell me something").await;

    assert_eq!(status, 200);
    assert_eq!(body["response"], ROUTER_FALLBACK_ANSWER);
    assert_eq!(
        body["agent_workflow"],
        json!([
            { "agent": "RouterAgent", "decision": "Fallback" },
            { "agent": "System", "decision": "Error" }
        ])
    );
}

#[tokio::test]
async fn llm_failure_returns_500_and_leaves_transcript_untouched() {
    let app = TestApp::spawn().await;
    app.provider
        .push_error(ProviderError::ApiError("invalid api key".to_string()));

    let (status, body) = app.chat("user-1", "conv-1", "What is 2+2?").await;

    assert_eq!(status, 500);
    let error = body["error"].as_str().unwrap();
    assert!(!error.contains("api key"));

    let history = app.history("user-1", "conv-1").await;
    assert_eq!(history["turns"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_fields_return_400() {
    let app = TestApp::spawn().await;

    let cases = vec![
        (json!({ "user_id": "u", "conversation_id": "c" }), "missing message"),
        (json!({ "message": "hi", "conversation_id": "c" }), "missing user_id"),
        (json!({ "message": "hi", "user_id": "u" }), "missing conversation_id"),
        (
            json!({ "message": "", "user_id": "u", "conversation_id": "c" }),
            "empty message",
        ),
    ];

    for (body, description) in cases {
        let response = app.post_chat(&body).await;
        assert_eq!(
            response.status().as_u16(),
            400,
            "Expected 400 for {}",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(
            body["error"],
            "Missing required fields: message, user_id, or conversation_id"
        );
    }
    assert!(app.provider.requests().is_empty());
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/api/kb/chat", app.address))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn exchanges_accumulate_in_the_transcript() {
    let app = TestApp::spawn().await;
    app.provider.push_response(answer_directly("hi"));
    app.provider.push_response("Hello!");
    app.provider.push_response(answer_directly("4"));
    app.provider.push_response("4");

    app.chat("user-1", "conv-1", "Hi").await;
    app.chat("user-1", "conv-1", "What is 2+2?").await;

    let history = app.history("user-1", "conv-1").await;
    assert_eq!(history["session_id"], "user-1-conv-1");
    let turns = history["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0]["role"], "system");
    assert_eq!(turns[1], json!({ "role": "user", "content": "Hi" }));
    assert_eq!(turns[2], json!({ "role": "assistant", "content": "Hello!" }));
    assert_eq!(turns[4], json!({ "role": "assistant", "content": "4" }));

    // The second router call sees the first exchange as history
    let requests = app.provider.requests();
    assert_eq!(requests[2].messages.len(), 3);
}

#[tokio::test]
async fn conversations_do_not_share_history() {
    let app = TestApp::spawn().await;

    app.chat("user-1", "conv-1", "first").await;
    app.chat("user-1", "conv-2", "second").await;
    app.chat("user-2", "conv-1", "third").await;

    for (user, conv, message) in [
        ("user-1", "conv-1", "first"),
        ("user-1", "conv-2", "second"),
        ("user-2", "conv-1", "third"),
    ] {
        let history = app.history(user, conv).await;
        let turns = history["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 3, "{}-{}", user, conv);
        assert_eq!(turns[1]["content"], message);
    }
}

#[tokio::test]
async fn concurrent_messages_on_one_session_lose_no_turns() {
    let app = Arc::new(TestApp::spawn().await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.chat("user-1", "busy", &format!("question {}", i)).await
        }));
    }
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, 200);
    }

    let history = app.history("user-1", "busy").await;
    let turns = history["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 1 + 2 * 10);

    // Exchanges never interleave: each user turn is followed by its own answer
    for pair in turns[1..].chunks(2) {
        assert_eq!(pair[0]["role"], "user");
        assert_eq!(pair[1]["role"], "assistant");
        let question = pair[0]["content"].as_str().unwrap();
        assert_eq!(
            pair[1]["content"],
            format!("Mock response for: {}", question)
        );
    }
}
