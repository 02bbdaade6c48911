//! Transcript export.
//!
//! A pure read of the session: the record holds borrowed data and the
//! caller decides where the JSON goes.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::Result;
use crate::types::{Message, PatientContext, Session, Usage};

/// Serializable snapshot of a session.
#[derive(Debug, Serialize)]
pub struct SessionExport<'a> {
    pub conversation_id: &'a str,
    pub context: &'a PatientContext,
    pub messages: &'a [Message],
    pub usage: Usage,
    pub exported_at: DateTime<Local>,
}

impl<'a> SessionExport<'a> {
    pub fn new(session: &'a Session, exported_at: DateTime<Local>) -> Self {
        Self {
            conversation_id: session.conversation_id(),
            context: &session.context,
            messages: session.history(),
            usage: session.usage(),
            exported_at,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Default file name, e.g. `parley_chat_20240131_142501.json`.
    pub fn file_name(&self) -> String {
        format!(
            "parley_chat_{}.json",
            self.exported_at.format("%Y%m%d_%H%M%S")
        )
    }
}
