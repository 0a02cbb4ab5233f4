use crate::message::{HistoryEntry, Role};
use serde::{Deserialize, Serialize};

/// A single entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

impl From<&HistoryEntry> for ContextEntry {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            role: entry.role.as_str().to_string(),
            content: entry.content.clone(),
        }
    }
}

/// Conversation context passed to a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt prepended to every request.
    pub system_prompt: String,
    /// Conversation history (oldest first), excluding the current message.
    pub history: Vec<ContextEntry>,
    /// The current user message.
    pub current_message: String,
}

/// A structured message for API-based providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

impl Context {
    /// Create a new context with just a current message and the given system prompt.
    pub fn new(system_prompt: &str, message: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            current_message: message.to_string(),
        }
    }

    /// Build a context from a contact's recent history window.
    ///
    /// The window is oldest first. When its last entry is a user turn it
    /// becomes the current message; otherwise `fallback_current` is used and
    /// the whole window is history.
    pub fn from_window(system_prompt: &str, window: &[HistoryEntry], fallback_current: &str) -> Self {
        let mut ctx = Self::new(system_prompt, fallback_current);
        match window.split_last() {
            Some((last, rest)) if last.role == Role::User => {
                ctx.history = rest.iter().map(ContextEntry::from).collect();
                ctx.current_message = last.content.clone();
            }
            _ => {
                ctx.history = window.iter().map(ContextEntry::from).collect();
            }
        }
        ctx
    }

    /// Convert context to structured API messages.
    ///
    /// Returns `(system_prompt, messages)`. The system prompt is kept apart so
    /// each provider can place it where its API expects.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        let mut messages = Vec::with_capacity(self.history.len() + 1);

        for entry in &self.history {
            messages.push(ApiMessage {
                role: entry.role.clone(),
                content: entry.content.clone(),
            });
        }

        messages.push(ApiMessage {
            role: "user".to_string(),
            content: self.current_message.clone(),
        });

        (self.system_prompt.clone(), messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(role: Role, content: &str) -> HistoryEntry {
        HistoryEntry {
            contact: "33600000000".into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_context_deserialize() {
        let json = r#"{"system_prompt":"test","history":[{"role":"assistant","content":"Hello!"}],"current_message":"hi"}"#;
        let ctx: Context = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.history[0].role, "assistant");
        assert_eq!(ctx.current_message, "hi");
    }

    #[test]
    fn test_to_api_messages_basic() {
        let ctx = Context::new("Be helpful.", "hello");
        let (system, messages) = ctx.to_api_messages();
        assert_eq!(system, "Be helpful.");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hello");
    }

    #[test]
    fn test_from_window_splits_current_user_turn() {
        let window = vec![
            entry(Role::User, "Hi"),
            entry(Role::Assistant, "Hello!"),
            entry(Role::User, "How much for 50m2?"),
        ];
        let ctx = Context::from_window("sys", &window, "Hello");
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.current_message, "How much for 50m2?");

        let (_, messages) = ctx.to_api_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].content, "How much for 50m2?");
    }

    #[test]
    fn test_from_window_uses_fallback_after_assistant_turn() {
        let window = vec![entry(Role::User, "Hi"), entry(Role::Assistant, "Hello!")];
        let ctx = Context::from_window("sys", &window, "Hello");
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.current_message, "Hello");
    }

    #[test]
    fn test_from_window_empty() {
        let ctx = Context::from_window("sys", &[], "Hello");
        assert!(ctx.history.is_empty());
        assert_eq!(ctx.current_message, "Hello");
    }
}
