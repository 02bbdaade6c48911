//! Failure classification.
//!
//! Maps the outcome of the last upstream attempt onto a bounded set of kinds
//! with user-facing messages. Classification never fails.

use std::fmt;

use crate::transport::{RawResponse, TransportFailure};

/// Kinds of failure surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every candidate was rejected with 400.
    BadRequestExhausted,
    /// 401 from upstream.
    Unauthorized,
    /// Any other non-2xx status.
    UpstreamError,
    /// The attempt exceeded its timeout.
    Timeout,
    /// DNS, refused, reset and other connection-level failures.
    Transport,
    /// 2xx with an unusable body. The turn still succeeds with fallback text.
    MalformedResponse,
}

impl FailureKind {
    /// Message shown to the user in place of an answer.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::BadRequestExhausted => {
                "The assistant service could not accept this request in any supported format. \
                 Please try again, or contact support if the problem persists."
            }
            FailureKind::Unauthorized => {
                "The assistant service rejected our credentials. \
                 Please check the API key configuration."
            }
            FailureKind::UpstreamError => "The assistant service returned an error. Please try again.",
            FailureKind::Timeout => "The request timed out. Please try again.",
            FailureKind::Transport => {
                "Could not reach the assistant service. Please check your network connection."
            }
            FailureKind::MalformedResponse => NO_RESPONSE_FALLBACK,
        }
    }

    /// Whether the turn ended without an upstream answer.
    pub fn is_hard_failure(self) -> bool {
        !matches!(self, FailureKind::MalformedResponse)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_message())
    }
}

/// Text shown when a 2xx body has no usable answer.
pub const NO_RESPONSE_FALLBACK: &str = "No response received.";

/// A failure with the detail needed for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    pub kind: FailureKind,
    /// HTTP status of the last attempt, if it produced one.
    pub status: Option<u16>,
    /// Internal detail for logs. Never shown to the user.
    pub detail: String,
}

impl ClassifiedFailure {
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// Classify a non-success attempt that ends the dispatch chain.
///
/// A 400 here means no further candidate remained.
pub fn classify(outcome: &Result<RawResponse, TransportFailure>) -> ClassifiedFailure {
    match outcome {
        Ok(raw) => {
            let kind = match raw.status {
                400 => FailureKind::BadRequestExhausted,
                401 => FailureKind::Unauthorized,
                s if (200..300).contains(&s) => FailureKind::MalformedResponse,
                _ => FailureKind::UpstreamError,
            };
            ClassifiedFailure {
                kind,
                status: Some(raw.status),
                detail: format!("HTTP {}: {}", raw.status, raw.body_snippet()),
            }
        }
        Err(TransportFailure::Timeout) => ClassifiedFailure {
            kind: FailureKind::Timeout,
            status: None,
            detail: "request timed out".to_string(),
        },
        Err(TransportFailure::Connection(msg)) => ClassifiedFailure {
            kind: FailureKind::Transport,
            status: None,
            detail: msg.clone(),
        },
    }
}
