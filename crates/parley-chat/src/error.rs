//! Error types for the dispatch core.
//!
//! These cover input validation and construction only. Once a turn is
//! dispatched its outcome is always a [`crate::TurnReply`].

use parley_core::error::ParleyError;

/// Errors raised before a turn reaches the upstream service.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("HTTP client initialisation failed: {0}")]
    ClientInit(String),
    #[error("export error: {0}")]
    Export(String),
    #[error(transparent)]
    Core(ParleyError),
}

impl From<ParleyError> for ChatError {
    fn from(err: ParleyError) -> Self {
        match err {
            ParleyError::Config(msg) => ChatError::InvalidConfig(msg),
            other => ChatError::Core(other),
        }
    }
}
