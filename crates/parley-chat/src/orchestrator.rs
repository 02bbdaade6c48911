//! Chat orchestrator: runs one conversation turn end to end.
//!
//! A turn has three steps:
//! 1. [`ChatOrchestrator::begin_turn`] validates input, records the user
//!    message, enriches it and builds request candidates (synchronous).
//! 2. [`ChatOrchestrator::dispatch`] runs the escalation chain without
//!    touching the session.
//! 3. [`ChatOrchestrator::complete_turn`] applies the result, but only if the
//!    session has not been reset since step 1.

use std::sync::{Arc, Mutex};

use parley_core::{Message, ParleyConfig, Session};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::FailureKind;
use crate::context::enrich;
use crate::dispatcher::{AttemptRecord, DispatchOutcome, DispatchReport, Dispatcher};
use crate::error::ChatError;
use crate::request::{RequestBuilder, RequestCandidate};
use crate::response::{ResponseProcessor, UpstreamReply};
use crate::transport::{HttpTransport, UpstreamTransport};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The upstream service answered.
    Answered,
    /// 2xx without a usable body; fallback text was shown.
    Fallback,
    /// The chain failed; a synthetic assistant message was recorded.
    Failed(FailureKind),
    /// The session was reset while the call was in flight. Nothing applied.
    Discarded,
}

/// Result of a turn, for the host to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub display_text: String,
    pub outcome: TurnOutcome,
    pub attempts: Vec<AttemptRecord>,
}

/// A turn that has been recorded in the session but not yet completed.
#[derive(Debug, Clone)]
pub struct TurnTicket {
    /// Local correlation id, used only for logs.
    pub turn_id: Uuid,
    generation: u64,
    user_message: String,
    candidates: Vec<RequestCandidate>,
}

impl TurnTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn candidates(&self) -> &[RequestCandidate] {
        &self.candidates
    }
}

/// Central coordinator wiring enrichment, request building, dispatch and
/// post-processing.
pub struct ChatOrchestrator {
    builder: RequestBuilder,
    dispatcher: Dispatcher,
    processor: ResponseProcessor,
    max_message_length: usize,
}

impl ChatOrchestrator {
    /// Create an orchestrator backed by the HTTP transport.
    pub fn new(config: &ParleyConfig) -> Result<Self, ChatError> {
        let transport = HttpTransport::new(config.upstream.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create an orchestrator with a custom transport.
    pub fn with_transport(
        config: &ParleyConfig,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Result<Self, ChatError> {
        config.validate()?;
        let api_key = config
            .upstream
            .api_key()
            .ok_or_else(|| ChatError::InvalidConfig("no API key configured".to_string()))?;

        Ok(Self {
            builder: RequestBuilder::new(&config.upstream, api_key),
            dispatcher: Dispatcher::new(transport, config.upstream.timeout()),
            processor: ResponseProcessor::new(config.chat.medical_disclaimer),
            max_message_length: config.chat.max_message_length,
        })
    }

    /// Record the user message and prepare the request candidates.
    pub fn begin_turn(
        &self,
        session: &mut Session,
        message: &str,
        user_id: &str,
    ) -> Result<TurnTicket, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }

        session.push(Message::user(message));

        let enriched = enrich(message, &session.context);
        let candidates = self.builder.build_candidates(&enriched, session, user_id);
        let ticket = TurnTicket {
            turn_id: Uuid::new_v4(),
            generation: session.generation(),
            user_message: message.to_string(),
            candidates,
        };

        info!(
            turn_id = %ticket.turn_id,
            enriched = enriched.len() != message.len(),
            has_conversation = !session.conversation_id().is_empty(),
            "Turn started"
        );
        Ok(ticket)
    }

    /// Run the escalation chain for a ticket.
    pub async fn dispatch(&self, ticket: &TurnTicket) -> DispatchReport {
        self.dispatcher.dispatch(&ticket.candidates).await
    }

    /// Apply a dispatch report to the session.
    ///
    /// If the session was reset after `begin_turn`, nothing is applied and
    /// the reply is [`TurnOutcome::Discarded`].
    pub fn complete_turn(
        &self,
        session: &mut Session,
        ticket: TurnTicket,
        report: DispatchReport,
    ) -> TurnReply {
        if session.generation() != ticket.generation {
            warn!(
                turn_id = %ticket.turn_id,
                started = ticket.generation,
                current = session.generation(),
                "Session was reset during the turn; discarding result"
            );
            return TurnReply {
                display_text: String::new(),
                outcome: TurnOutcome::Discarded,
                attempts: report.attempts,
            };
        }

        let (display_text, outcome) = match &report.outcome {
            DispatchOutcome::Succeeded { response, .. } => {
                let (reply, usable) = UpstreamReply::parse_lenient(&response.body);
                let text = self.processor.process(&reply, &ticket.user_message, session);
                let outcome = if usable {
                    TurnOutcome::Answered
                } else {
                    TurnOutcome::Fallback
                };
                (text, outcome)
            }
            DispatchOutcome::Failed(failure) => {
                let text = failure.user_message().to_string();
                session.push(Message::assistant(text.clone()));
                (text, TurnOutcome::Failed(failure.kind))
            }
        };

        info!(
            turn_id = %ticket.turn_id,
            outcome = ?outcome,
            attempts = report.attempts.len(),
            total_tokens = session.usage().total_tokens,
            "Turn completed"
        );

        TurnReply {
            display_text,
            outcome,
            attempts: report.attempts,
        }
    }

    /// Run a full turn against a session owned by the caller.
    pub async fn handle_message(
        &self,
        session: &mut Session,
        message: &str,
        user_id: &str,
    ) -> Result<TurnReply, ChatError> {
        let ticket = self.begin_turn(session, message, user_id)?;
        let report = self.dispatch(&ticket).await;
        Ok(self.complete_turn(session, ticket, report))
    }

    /// Run a full turn against a session shared with the host.
    ///
    /// The lock is held only for the synchronous steps, never across the
    /// network call, so the host may reset the session meanwhile.
    pub async fn handle_shared(
        &self,
        session: &Mutex<Session>,
        message: &str,
        user_id: &str,
    ) -> Result<TurnReply, ChatError> {
        let ticket = {
            let mut guard = session
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.begin_turn(&mut guard, message, user_id)?
        };

        let report = self.dispatch(&ticket).await;

        let mut guard = session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.complete_turn(&mut guard, ticket, report))
    }
}

// =============================================================================
// Tests
// =============================================================================
