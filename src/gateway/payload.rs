//! WhatsApp Cloud API webhook payloads.
//!
//! Only `entry[0].changes[0].value` is inspected. Parsing is lenient: a body
//! that is not JSON, or does not have the expected shape, is treated as an
//! empty object.

use relay_core::message::IncomingMessage;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    /// Delivery/read receipts. Contents are irrelevant, only presence matters.
    statuses: Option<serde_json::Value>,
    messages: Option<Vec<RawMessage>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<TextPart>,
    #[serde(default)]
    interactive: Option<InteractivePart>,
}

#[derive(Debug, Default, Deserialize)]
struct TextPart {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Default, Deserialize)]
struct InteractivePart {
    button_reply: Option<ReplyTitle>,
    list_reply: Option<ReplyTitle>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyTitle {
    #[serde(default)]
    title: String,
}

/// What a webhook delivery carries, as far as the relay cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Status receipts only.
    Statuses,
    Message(IncomingMessage),
    /// Nothing actionable: no messages, or a message without a sender.
    Empty,
}

/// Classify a raw webhook body.
pub fn extract(body: &[u8], non_text_placeholder: &str) -> Inbound {
    let envelope: Envelope = serde_json::from_slice(body).unwrap_or_default();

    let Some(value) = envelope
        .entry
        .into_iter()
        .next()
        .and_then(|e| e.changes.into_iter().next())
        .map(|c| c.value)
    else {
        return Inbound::Empty;
    };

    if value.statuses.is_some() {
        return Inbound::Statuses;
    }

    let Some(msg) = value.messages.and_then(|m| m.into_iter().next()) else {
        return Inbound::Empty;
    };

    let sender_id = match msg.from.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return Inbound::Empty,
    };

    let text = match msg.kind.as_deref() {
        Some("text") => msg.text.map(|t| t.body).unwrap_or_default(),
        Some("interactive") => msg
            .interactive
            .and_then(|i| {
                let button = i.button_reply.map(|r| r.title).filter(|t| !t.is_empty());
                button.or_else(|| i.list_reply.map(|r| r.title))
            })
            .unwrap_or_default(),
        _ => non_text_placeholder.to_string(),
    };

    Inbound::Message(IncomingMessage {
        id: msg.id.unwrap_or_default(),
        sender_id,
        text,
    })
}
