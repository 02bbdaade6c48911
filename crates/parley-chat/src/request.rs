//! Request candidates for the upstream service.
//!
//! The upstream contract is not stable across versions, so a turn carries an
//! ordered list of request shapes. The list is fully determined by its
//! inputs and bounded at [`MAX_CANDIDATES`].

use std::fmt;

use parley_core::config::UpstreamConfig;
use parley_core::Session;
use serde_json::{json, Map, Value};

/// Upper bound on candidates per turn.
pub const MAX_CANDIDATES: usize = 3;

/// Only blocking replies are supported; a streamed body cannot be parsed.
pub const RESPONSE_MODE: &str = "blocking";

/// Which upstream endpoint a candidate targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Conversational endpoint; accepts `conversation_id`.
    Chat,
    /// Single-turn completion endpoint; stateless.
    Completion,
}

/// One concrete encoding of a message for the upstream service.
#[derive(Clone, PartialEq)]
pub struct RequestCandidate {
    pub endpoint: String,
    pub kind: EndpointKind,
    /// Body field carrying the message text.
    pub message_field: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl RequestCandidate {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The message text carried by this candidate.
    pub fn message(&self) -> Option<&str> {
        self.body.get(&self.message_field).and_then(Value::as_str)
    }
}

impl fmt::Debug for RequestCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("authorization") {
                    (*key, "Bearer [REDACTED]")
                } else {
                    (*key, value.as_str())
                }
            })
            .collect();
        f.debug_struct("RequestCandidate")
            .field("endpoint", &self.endpoint)
            .field("kind", &self.kind)
            .field("message_field", &self.message_field)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Builds the candidate list from upstream configuration.
#[derive(Clone)]
pub struct RequestBuilder {
    chat_endpoint: String,
    completion_endpoint: String,
    api_key: String,
    primary_field: String,
    alternate_field: String,
}

impl RequestBuilder {
    /// Create a builder. `api_key` must already be resolved and validated.
    pub fn new(config: &UpstreamConfig, api_key: impl Into<String>) -> Self {
        Self {
            chat_endpoint: config.chat_endpoint.trim().to_string(),
            completion_endpoint: config.completion_endpoint.trim().to_string(),
            api_key: api_key.into(),
            primary_field: config.primary_message_field.trim().to_string(),
            alternate_field: config.alternate_message_field.trim().to_string(),
        }
    }

    /// Build candidates in priority order:
    ///
    /// 1. chat endpoint, message under the primary field
    /// 2. chat endpoint, message under the alternate field
    /// 3. completion endpoint, alternate field, no conversation id
    pub fn build_candidates(
        &self,
        enriched_message: &str,
        session: &Session,
        user_id: &str,
    ) -> Vec<RequestCandidate> {
        let conversation_id = session.conversation_id();
        vec![
            self.candidate(
                EndpointKind::Chat,
                &self.primary_field,
                enriched_message,
                conversation_id,
                user_id,
            ),
            self.candidate(
                EndpointKind::Chat,
                &self.alternate_field,
                enriched_message,
                conversation_id,
                user_id,
            ),
            self.candidate(
                EndpointKind::Completion,
                &self.alternate_field,
                enriched_message,
                "",
                user_id,
            ),
        ]
    }

    fn candidate(
        &self,
        kind: EndpointKind,
        message_field: &str,
        message: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> RequestCandidate {
        let endpoint = match kind {
            EndpointKind::Chat => &self.chat_endpoint,
            EndpointKind::Completion => &self.completion_endpoint,
        };

        let mut body = Map::new();
        body.insert("inputs".to_string(), json!({}));
        body.insert(message_field.to_string(), Value::from(message));
        body.insert("response_mode".to_string(), Value::from(RESPONSE_MODE));
        if kind == EndpointKind::Chat && !conversation_id.is_empty() {
            body.insert("conversation_id".to_string(), Value::from(conversation_id));
        }
        body.insert("user".to_string(), Value::from(user_id));

        RequestCandidate {
            endpoint: endpoint.clone(),
            kind,
            message_field: message_field.to_string(),
            headers: vec![
                ("Authorization", format!("Bearer {}", self.api_key)),
                ("Content-Type", "application/json".to_string()),
            ],
            body: Value::Object(body),
        }
    }
}
