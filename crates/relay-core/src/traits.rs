use crate::{
    context::Context,
    error::RelayError,
    message::{OutgoingMessage, SendOutcome, TemplateRef},
};
use async_trait::async_trait;

/// Completion provider trait: the brain.
///
/// Any chat-completion backend implements this to turn a conversation
/// context into a reply.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a response.
    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool;
}

/// Outbound messaging channel.
///
/// Inbound traffic arrives through the webhook, so a channel only sends.
/// Both operations report a typed outcome instead of failing.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Send free-form text to a contact.
    async fn send_text(&self, to: &str, body: &str) -> SendOutcome;

    /// Send a pre-approved template to a contact.
    async fn send_template(&self, to: &str, template: &TemplateRef) -> SendOutcome;
}
