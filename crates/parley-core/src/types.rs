//! Session data shared between the dispatch core and the host.
//!
//! A [`Session`] is passed explicitly into every core call. Nothing in the
//! core reads ambient state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParleyError;

// =============================================================================
// Message
// =============================================================================

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// Patient context
// =============================================================================

/// Named fields of the optional structured context.
///
/// Declaration order is the enrichment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    AgeRange,
    Symptoms,
    MedicalHistory,
    Medications,
    Urgency,
}

impl ContextField {
    /// Every field, in declaration order.
    pub const ALL: [ContextField; 5] = [
        ContextField::AgeRange,
        ContextField::Symptoms,
        ContextField::MedicalHistory,
        ContextField::Medications,
        ContextField::Urgency,
    ];

    /// Human-readable label used in the enrichment block.
    pub fn label(self) -> &'static str {
        match self {
            ContextField::AgeRange => "Age Range",
            ContextField::Symptoms => "Symptoms",
            ContextField::MedicalHistory => "Medical History",
            ContextField::Medications => "Current Medications",
            ContextField::Urgency => "Urgency",
        }
    }

    /// Short key accepted by [`FromStr`].
    pub fn key(self) -> &'static str {
        match self {
            ContextField::AgeRange => "age",
            ContextField::Symptoms => "symptoms",
            ContextField::MedicalHistory => "history",
            ContextField::Medications => "medications",
            ContextField::Urgency => "urgency",
        }
    }
}

impl FromStr for ContextField {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "age" | "age_range" => Ok(ContextField::AgeRange),
            "symptoms" => Ok(ContextField::Symptoms),
            "history" | "medical_history" => Ok(ContextField::MedicalHistory),
            "medications" | "meds" => Ok(ContextField::Medications),
            "urgency" => Ok(ContextField::Urgency),
            other => Err(ParleyError::Config(format!("unknown context field: {}", other))),
        }
    }
}

/// Optional structured context supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientContext {
    pub age_range: Option<String>,
    pub symptoms: Option<String>,
    pub medical_history: Option<String>,
    pub medications: Option<String>,
    pub urgency: Option<String>,
}

impl PatientContext {
    /// Value of a field, trimmed. Blank values read as absent.
    pub fn get(&self, field: ContextField) -> Option<&str> {
        let value = match field {
            ContextField::AgeRange => &self.age_range,
            ContextField::Symptoms => &self.symptoms,
            ContextField::MedicalHistory => &self.medical_history,
            ContextField::Medications => &self.medications,
            ContextField::Urgency => &self.urgency,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: ContextField, value: Option<String>) {
        let slot = match field {
            ContextField::AgeRange => &mut self.age_range,
            ContextField::Symptoms => &mut self.symptoms,
            ContextField::MedicalHistory => &mut self.medical_history,
            ContextField::Medications => &mut self.medications,
            ContextField::Urgency => &mut self.urgency,
        };
        *slot = value;
    }

    /// Non-empty fields in declaration order.
    pub fn entries(&self) -> Vec<(ContextField, &str)> {
        ContextField::ALL
            .iter()
            .filter_map(|&field| self.get(field).map(|value| (field, value)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        ContextField::ALL.iter().all(|&field| self.get(field).is_none())
    }
}

// =============================================================================
// Usage
// =============================================================================

/// Usage counters reported by the upstream service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u64,
}

// =============================================================================
// Session
// =============================================================================

/// Conversation state for one interactive session.
///
/// `generation` changes on every reset. A turn records the generation it
/// started under, and its result is only applied if the generation still
/// matches, so a late response cannot resurrect a cleared conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    conversation_id: String,
    history: Vec<Message>,
    pub context: PatientContext,
    usage: Usage,
    #[serde(skip)]
    generation: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upstream conversation id, empty when no conversation has started.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append a message. History is never reordered or deduplicated.
    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Adopt a conversation id issued by the upstream service.
    ///
    /// Blank ids are ignored; any other id replaces the held one verbatim.
    /// Returns `true` if the stored id changed.
    pub fn adopt_conversation_id(&mut self, id: &str) -> bool {
        if id.trim().is_empty() || id == self.conversation_id {
            return false;
        }
        self.conversation_id = id.to_string();
        true
    }

    /// Add reported tokens to the running total.
    pub fn record_tokens(&mut self, tokens: u64) {
        self.usage.total_tokens = self.usage.total_tokens.saturating_add(tokens);
    }

    /// Clear history, conversation id and usage, and start a new generation.
    ///
    /// Patient context is kept; see [`Session::clear_context`].
    pub fn reset(&mut self) {
        self.conversation_id.clear();
        self.history.clear();
        self.usage = Usage::default();
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn clear_context(&mut self) {
        self.context = PatientContext::default();
    }

    /// Snapshot for status displays.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            conversation_badge: conversation_badge(&self.conversation_id),
            message_count: self.history.len(),
            total_tokens: self.usage.total_tokens,
        }
    }
}

/// Summary the host renders next to the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Shortened conversation id, `None` for a new conversation.
    pub conversation_badge: Option<String>,
    pub message_count: usize,
    pub total_tokens: u64,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.conversation_badge {
            Some(badge) => write!(f, "conversation {}", badge)?,
            None => write!(f, "new conversation")?,
        }
        write!(f, " | messages: {}", self.message_count)?;
        if self.total_tokens > 0 {
            write!(f, " | tokens used: {}", self.total_tokens)?;
        }
        Ok(())
    }
}

fn conversation_badge(id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    let short: String = id.chars().take(8).collect();
    Some(format!("{}...", short))
}
