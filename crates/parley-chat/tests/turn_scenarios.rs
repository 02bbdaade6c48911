//! End-to-end turn scenarios through the public API.
//!
//! The upstream service is replaced by a scripted transport that records
//! every candidate it receives, so each test can assert on the exact call
//! sequence as well as the resulting session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_chat::disclaimer::DISCLAIMER;
use parley_chat::{
    ChatOrchestrator, DispatchState, EndpointKind, FailureKind, RawResponse, RequestCandidate,
    TransportFailure, TurnOutcome, UpstreamTransport,
};
use parley_core::{ParleyConfig, Role, Session, SessionExport};

// =============================================================================
// Helpers
// =============================================================================

struct ScriptedUpstream {
    replies: Mutex<VecDeque<Result<RawResponse, TransportFailure>>>,
    calls: Mutex<Vec<RequestCandidate>>,
}

impl ScriptedUpstream {
    fn new(replies: Vec<Result<RawResponse, TransportFailure>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<RequestCandidate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedUpstream {
    async fn send(&self, candidate: &RequestCandidate) -> Result<RawResponse, TransportFailure> {
        self.calls.lock().unwrap().push(candidate.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::Connection("no scripted reply".into())))
    }
}

/// Upstream that never answers inside the configured timeout.
struct SlowUpstream;

#[async_trait]
impl UpstreamTransport for SlowUpstream {
    async fn send(&self, _candidate: &RequestCandidate) -> Result<RawResponse, TransportFailure> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(RawResponse::new(200, r#"{"answer":"too late"}"#))
    }
}

fn config() -> ParleyConfig {
    let mut config = ParleyConfig::default();
    config.upstream.api_key = Some("app-test-key".to_string());
    config
}

fn ok(body: &str) -> Result<RawResponse, TransportFailure> {
    Ok(RawResponse::new(200, body))
}

fn bad_request() -> Result<RawResponse, TransportFailure> {
    Ok(RawResponse::new(400, r#"{"code":"invalid_param","message":"query is required"}"#))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_headache_first_turn() {
    let upstream = ScriptedUpstream::new(vec![ok(
        r#"{"answer": "Try resting.", "conversation_id": "conv-123"}"#,
    )]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream.clone()).unwrap();
    let mut session = Session::new();

    let reply = orch
        .handle_message(&mut session, "I have a headache", "tester")
        .await
        .unwrap();

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].kind, EndpointKind::Chat);
    assert_eq!(calls[0].body["question"], "I have a headache");
    assert!(calls[0].body.get("conversation_id").is_none());
    assert_eq!(calls[0].header("Authorization"), Some("Bearer app-test-key"));

    assert_eq!(reply.outcome, TurnOutcome::Answered);
    assert_eq!(reply.display_text, format!("Try resting.\n\n{}", DISCLAIMER));
    assert_eq!(session.conversation_id(), "conv-123");
    assert_eq!(session.history().last().unwrap().content, reply.display_text);
}

#[tokio::test]
async fn test_two_rejections_then_completion_endpoint() {
    let upstream = ScriptedUpstream::new(vec![bad_request(), bad_request(), ok(r#"{"answer": "ok"}"#)]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream.clone()).unwrap();
    let mut session = Session::new();

    let reply = orch
        .handle_message(&mut session, "What's the weather like?", "tester")
        .await
        .unwrap();

    let calls = upstream.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].message_field, "question");
    assert_eq!(calls[1].message_field, "query");
    assert_eq!(calls[1].kind, EndpointKind::Chat);
    assert_eq!(calls[2].kind, EndpointKind::Completion);
    assert_eq!(calls[2].body["query"], "What's the weather like?");

    assert_eq!(reply.outcome, TurnOutcome::Answered);
    assert_eq!(reply.attempts.len(), 3);
    assert_eq!(reply.display_text, "ok");
}

#[tokio::test]
async fn test_three_rejections_exhaust_chain() {
    let upstream = ScriptedUpstream::new(vec![bad_request(), bad_request(), bad_request(), ok("{}")]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream.clone()).unwrap();
    let mut session = Session::new();

    let reply = orch.handle_message(&mut session, "hello", "tester").await.unwrap();

    assert_eq!(upstream.calls().len(), 3);
    assert_eq!(
        reply.outcome,
        TurnOutcome::Failed(FailureKind::BadRequestExhausted)
    );
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history()[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_timeout_records_synthetic_message() {
    let mut cfg = config();
    cfg.upstream.timeout_secs = 1;
    let orch = ChatOrchestrator::with_transport(&cfg, Arc::new(SlowUpstream)).unwrap();
    let mut session = Session::new();
    session.adopt_conversation_id("conv-keep");

    let reply = orch.handle_message(&mut session, "hello", "tester").await.unwrap();

    assert_eq!(reply.outcome, TurnOutcome::Failed(FailureKind::Timeout));
    assert_eq!(reply.attempts.len(), 1);
    assert_eq!(session.conversation_id(), "conv-keep");

    let assistant: Vec<_> = session
        .history()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant.len(), 1);
    assert!(assistant[0].content.contains("timed out"));
}

#[tokio::test]
async fn test_usage_and_conversation_across_turns() {
    let upstream = ScriptedUpstream::new(vec![
        ok(r#"{"answer":"a","conversation_id":"A","metadata":{"usage":{"total_tokens":15}}}"#),
        ok(r#"{"answer":"b","conversation_id":"B","metadata":{"usage":{"total_tokens":20}}}"#),
    ]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream.clone()).unwrap();
    let mut session = Session::new();

    orch.handle_message(&mut session, "one", "tester").await.unwrap();
    orch.handle_message(&mut session, "two", "tester").await.unwrap();

    assert_eq!(session.usage().total_tokens, 35);
    assert_eq!(session.conversation_id(), "B");
    assert_eq!(upstream.calls()[1].body["conversation_id"], "A");
    assert_eq!(session.status().message_count, 4);
}

#[tokio::test]
async fn test_reset_then_new_conversation() {
    let upstream = ScriptedUpstream::new(vec![
        ok(r#"{"answer":"a","conversation_id":"first"}"#),
        ok(r#"{"answer":"b","conversation_id":"second"}"#),
    ]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream.clone()).unwrap();
    let mut session = Session::new();

    orch.handle_message(&mut session, "one", "tester").await.unwrap();
    session.reset();
    orch.handle_message(&mut session, "two", "tester").await.unwrap();

    assert!(upstream.calls()[1].body.get("conversation_id").is_none());
    assert_eq!(session.conversation_id(), "second");
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_stale_turn_cannot_resurrect_cleared_session() {
    let upstream = ScriptedUpstream::new(vec![ok(r#"{"answer":"late","conversation_id":"ghost"}"#)]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream).unwrap();
    let mut session = Session::new();

    let ticket = orch.begin_turn(&mut session, "hello", "tester").unwrap();
    let report = orch.dispatch(&ticket).await;
    assert_eq!(report.final_state(), DispatchState::Succeeded);

    session.reset();
    let reply = orch.complete_turn(&mut session, ticket, report);

    assert_eq!(reply.outcome, TurnOutcome::Discarded);
    assert_eq!(session.conversation_id(), "");
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_export_after_turn() {
    let upstream = ScriptedUpstream::new(vec![ok(r#"{"answer":"hi","conversation_id":"conv-x"}"#)]);
    let orch = ChatOrchestrator::with_transport(&config(), upstream).unwrap();
    let mut session = Session::new();
    session.context.age_range = Some("20-30".to_string());

    orch.handle_message(&mut session, "hello", "tester").await.unwrap();

    let json = SessionExport::new(&session, chrono::Local::now()).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["conversation_id"], "conv-x");
    assert_eq!(value["context"]["age_range"], "20-30");
    assert_eq!(value["messages"][0]["content"], "hello");
    assert_eq!(value["messages"][1]["content"], "hi");
}
