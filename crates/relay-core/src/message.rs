use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One line of a contact's conversation log. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Contact address (WhatsApp `wa_id`).
    pub contact: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A text message extracted from an inbound webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Provider message id, used for deduplication.
    pub id: String,
    /// Sender contact address.
    pub sender_id: String,
    /// Message text (body, selected reply title, or placeholder).
    pub text: String,
}

/// A completion produced by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    pub metadata: MessageMetadata,
}

/// Metadata about how a message was generated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

/// A pre-approved provider template, addressed by name and language code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    pub language: String,
}

/// Result of a single outbound send.
///
/// Sends are never retried; callers decide what to do with a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The provider accepted the message.
    Delivered { message_id: Option<String> },
    /// The provider answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The request never got an answer (DNS, TLS, timeout, ...).
    Transport(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Whether the provider answered at all, successfully or not.
    pub fn reached_provider(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered {
                message_id: Some(id),
            } => write!(f, "delivered ({id})"),
            Self::Delivered { message_id: None } => f.write_str("delivered"),
            Self::Rejected { status, body } => write!(f, "rejected {status}: {body}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}
