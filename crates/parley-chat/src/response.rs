//! Response post-processing.
//!
//! Extracts the answer from a successful upstream body, carries the
//! conversation id and token usage into the session, applies the disclaimer
//! policy and appends the assistant message to history.

use parley_core::{Message, Session};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::NO_RESPONSE_FALLBACK;
use crate::disclaimer;

/// Fields extracted from a successful upstream body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamReply {
    pub answer: Option<String>,
    pub conversation_id: Option<String>,
    pub total_tokens: Option<u64>,
}

impl UpstreamReply {
    /// Parse a success body. Each field is read independently, so a
    /// mistyped side field never hides the answer or the conversation id.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
        Ok(Self {
            answer: text("answer"),
            conversation_id: text("conversation_id"),
            total_tokens: value
                .pointer("/metadata/usage/total_tokens")
                .and_then(Value::as_u64),
        })
    }

    /// Parse leniently: an unparsable body yields an empty reply.
    ///
    /// The second value is `false` when the body was unusable (not JSON of
    /// the expected shape, or no answer).
    pub fn parse_lenient(body: &[u8]) -> (Self, bool) {
        match Self::parse(body) {
            Ok(reply) => {
                let usable = reply.answer.is_some();
                (reply, usable)
            }
            Err(e) => {
                warn!(error = %e, "Upstream returned an unparsable success body");
                (Self::default(), false)
            }
        }
    }
}

/// Applies a successful upstream reply to a session.
#[derive(Debug, Clone)]
pub struct ResponseProcessor {
    medical_disclaimer: bool,
}

impl ResponseProcessor {
    pub fn new(medical_disclaimer: bool) -> Self {
        Self { medical_disclaimer }
    }

    /// Apply `reply` to `session` and return the text to display.
    ///
    /// `user_message` is the raw text the user typed, before enrichment; it
    /// drives the disclaimer heuristic. The fallback text never receives a
    /// disclaimer.
    pub fn process(&self, reply: &UpstreamReply, user_message: &str, session: &mut Session) -> String {
        if let Some(id) = reply.conversation_id.as_deref() {
            if session.adopt_conversation_id(id) {
                debug!(conversation_id = %id, "Conversation id updated");
            }
        }

        if let Some(tokens) = reply.total_tokens {
            session.record_tokens(tokens);
        }

        let display = match reply.answer.as_deref() {
            Some(answer) if self.medical_disclaimer => disclaimer::apply(user_message, answer),
            Some(answer) => answer.to_string(),
            None => NO_RESPONSE_FALLBACK.to_string(),
        };

        session.push(Message::assistant(display.clone()));
        display
    }
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new(true)
    }
}
