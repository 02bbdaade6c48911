//! Dispatcher: the escalation state machine.
//!
//! Tries request candidates strictly in order, one in flight at a time:
//!
//! ```text
//! Idle -> Sending(0)
//! Sending(i) -> Succeeded          on 2xx
//! Sending(i) -> Escalating(i + 1)  on 400 when candidate i + 1 exists
//! Sending(i) -> Failed             on 400 at the last candidate,
//!                                  any other status, timeout, transport error
//! Escalating(i) -> Sending(i)
//! ```
//!
//! `Succeeded` means a 2xx status, even when the body carries no answer;
//! the orchestrator reports that case as `TurnOutcome::Fallback`.
//!
//! There is no backoff and no retry beyond the candidate list. Each attempt
//! is bounded by the per-attempt timeout; the chain has no aggregate bound.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classifier::{classify, ClassifiedFailure, FailureKind};
use crate::request::RequestCandidate;
use crate::transport::{RawResponse, TransportFailure, UpstreamTransport};

/// Dispatcher state for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Sending(usize),
    Escalating(usize),
    Succeeded,
    Failed,
}

/// Next state after attempt `index` of `total` produced `outcome`.
pub fn next_state(
    index: usize,
    total: usize,
    outcome: &Result<RawResponse, TransportFailure>,
) -> DispatchState {
    match outcome {
        Ok(raw) if raw.is_success() => DispatchState::Succeeded,
        Ok(raw) if raw.status == 400 && index + 1 < total => DispatchState::Escalating(index + 1),
        _ => DispatchState::Failed,
    }
}

/// What one attempt produced, for bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Status(u16),
    TimedOut,
    ConnectionFailed,
}

/// One network attempt within a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub index: usize,
    pub endpoint: String,
    pub message_field: String,
    pub result: AttemptResult,
}

/// Terminal outcome of the escalation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Succeeded {
        candidate_index: usize,
        response: RawResponse,
    },
    Failed(ClassifiedFailure),
}

/// Everything the dispatcher did for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempts: Vec<AttemptRecord>,
    pub outcome: DispatchOutcome,
}

impl DispatchReport {
    pub fn final_state(&self) -> DispatchState {
        match self.outcome {
            DispatchOutcome::Succeeded { .. } => DispatchState::Succeeded,
            DispatchOutcome::Failed(_) => DispatchState::Failed,
        }
    }
}

/// Runs the escalation chain against an [`UpstreamTransport`].
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn UpstreamTransport>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn UpstreamTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Dispatch candidates in order until one succeeds or the chain fails.
    pub async fn dispatch(&self, candidates: &[RequestCandidate]) -> DispatchReport {
        let mut attempts = Vec::with_capacity(candidates.len());
        let mut last: Option<Result<RawResponse, TransportFailure>> = None;
        let mut state = DispatchState::Idle;

        loop {
            match state {
                DispatchState::Idle => {
                    state = if candidates.is_empty() {
                        DispatchState::Failed
                    } else {
                        DispatchState::Sending(0)
                    };
                }
                DispatchState::Sending(index) => {
                    let candidate = &candidates[index];
                    debug!(
                        index,
                        endpoint = %candidate.endpoint,
                        field = %candidate.message_field,
                        "Sending upstream request"
                    );

                    let outcome = self.attempt(candidate).await;
                    attempts.push(AttemptRecord {
                        index,
                        endpoint: candidate.endpoint.clone(),
                        message_field: candidate.message_field.clone(),
                        result: match &outcome {
                            Ok(raw) => AttemptResult::Status(raw.status),
                            Err(TransportFailure::Timeout) => AttemptResult::TimedOut,
                            Err(TransportFailure::Connection(_)) => AttemptResult::ConnectionFailed,
                        },
                    });

                    state = next_state(index, candidates.len(), &outcome);
                    if let (DispatchState::Escalating(next), Ok(raw)) = (state, &outcome) {
                        warn!(
                            rejected = index,
                            next,
                            body = %raw.body_snippet(),
                            "Upstream rejected request shape, escalating"
                        );
                    }
                    last = Some(outcome);
                }
                DispatchState::Escalating(index) => {
                    state = DispatchState::Sending(index);
                }
                DispatchState::Succeeded => {
                    if let Some(Ok(response)) = last.take() {
                        let candidate_index = attempts.len().saturating_sub(1);
                        info!(
                            candidate_index,
                            attempts = attempts.len(),
                            status = response.status,
                            "Upstream request succeeded"
                        );
                        return DispatchReport {
                            attempts,
                            outcome: DispatchOutcome::Succeeded {
                                candidate_index,
                                response,
                            },
                        };
                    }
                    state = DispatchState::Failed;
                }
                DispatchState::Failed => {
                    let failure = last.as_ref().map(classify).unwrap_or_else(|| {
                        ClassifiedFailure {
                            kind: FailureKind::BadRequestExhausted,
                            status: None,
                            detail: "no request candidates".to_string(),
                        }
                    });
                    warn!(
                        kind = ?failure.kind,
                        status = ?failure.status,
                        attempts = attempts.len(),
                        detail = %failure.detail,
                        "Upstream dispatch failed"
                    );
                    return DispatchReport {
                        attempts,
                        outcome: DispatchOutcome::Failed(failure),
                    };
                }
            }
        }
    }

    async fn attempt(&self, candidate: &RequestCandidate) -> Result<RawResponse, TransportFailure> {
        match tokio::time::timeout(self.timeout, self.transport.send(candidate)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportFailure::Timeout),
        }
    }
}
