//! Message-dispatch core for Parley.
//!
//! Turns a user utterance plus session state into upstream requests, walks a
//! bounded escalation chain of request shapes, keeps the conversation id
//! coherent across turns and decides what to show when a step fails.

pub mod classifier;
pub mod context;
pub mod disclaimer;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod transport;

pub use classifier::{classify, ClassifiedFailure, FailureKind, NO_RESPONSE_FALLBACK};
pub use context::enrich;
pub use dispatcher::{
    next_state, AttemptRecord, AttemptResult, DispatchOutcome, DispatchReport, DispatchState,
    Dispatcher,
};
pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, TurnOutcome, TurnReply, TurnTicket};
pub use request::{EndpointKind, RequestBuilder, RequestCandidate, MAX_CANDIDATES, RESPONSE_MODE};
pub use response::{ResponseProcessor, UpstreamReply};
pub use transport::{HttpTransport, RawResponse, TransportFailure, UpstreamTransport};
