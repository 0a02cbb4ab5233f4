//! Inbound delivery handling and the reply pipeline.

use super::payload::{self, Inbound};
use super::{closing, DeliveryStatus, Gateway};
use chrono::Utc;
use relay_core::{
    context::{Context, ContextEntry},
    error::RelayError,
    message::{IncomingMessage, MessageMetadata, Role},
};
use relay_memory::audit::{AuditEntry, AuditStatus};
use std::time::Instant;
use tracing::{info, warn};

impl Gateway {
    /// Process one `POST /webhook` body.
    ///
    /// Only registry failures escape as errors. Side effects already applied
    /// (the dedup ledger entry in particular) are not rolled back.
    pub async fn handle_delivery(&self, body: &[u8]) -> Result<DeliveryStatus, RelayError> {
        let message = match payload::extract(body, &self.prompts.non_text_placeholder) {
            Inbound::Statuses => return Ok(DeliveryStatus::IgnoredStatus),
            Inbound::Empty => return Ok(DeliveryStatus::NoMessage),
            Inbound::Message(m) => m,
        };

        if !self.state.mark_processed(&message.id) {
            info!("webhook: duplicate {} from {} ignored", message.id, message.sender_id);
            return Ok(DeliveryStatus::Duplicate);
        }

        if self.memory.register_customer(&message.sender_id).await? {
            info!("webhook: new customer {}", message.sender_id);
        }

        self.reply(&message).await;
        Ok(DeliveryStatus::Ok)
    }

    /// Answer one inbound message. Returns the audited status.
    pub(super) async fn reply(&self, message: &IncomingMessage) -> AuditStatus {
        let started = Instant::now();
        let contact = message.sender_id.as_str();

        let preview = if message.text.chars().count() > 60 {
            let cut: String = message.text.chars().take(60).collect();
            format!("{cut}...")
        } else {
            message.text.clone()
        };
        info!("[{contact}] {preview}");

        // --- 1. OPEN A NEW SILENCE EPISODE ---
        self.state.record_user_message(contact, Utc::now());

        // --- 2. GENERATE, OR FALL BACK ---
        let (reply_text, mut status, mut detail, metadata) = match self.generate(message).await {
            Ok((text, metadata)) => (text, AuditStatus::Ok, None, Some(metadata)),
            Err(e) => {
                warn!("[{contact}] completion failed, sending fallback: {e}");
                (
                    self.prompts.fallback_reply.clone(),
                    AuditStatus::Fallback,
                    Some(e.to_string()),
                    None,
                )
            }
        };

        // --- 3. SEND ---
        let outcome = self.channel.send_text(contact, &reply_text).await;
        if outcome.reached_provider() {
            self.state.record_bot_reply(contact, Utc::now());
        }
        if !outcome.is_delivered() {
            warn!("[{contact}] reply not delivered: {outcome}");
            status = AuditStatus::SendFailed;
            detail = Some(outcome.to_string());
        }

        // --- 4. AUDIT ---
        let entry = AuditEntry {
            contact: contact.to_string(),
            message_id: message.id.clone(),
            input_text: message.text.clone(),
            output_text: Some(reply_text),
            provider_used: metadata.as_ref().map(|m| m.provider_used.clone()),
            model: metadata.as_ref().and_then(|m| m.model.clone()),
            processing_ms: Some(started.elapsed().as_millis() as i64),
            status,
            detail,
        };
        if let Err(e) = self.audit.log(&entry).await {
            warn!("audit log failed: {e}");
        }

        status
    }

    /// Store the user turn, ask the provider, and store the answer.
    ///
    /// Any failure here, including an empty completion, means the fallback
    /// reply goes out instead. The fallback is never stored.
    async fn generate(
        &self,
        message: &IncomingMessage,
    ) -> Result<(String, MessageMetadata), RelayError> {
        let contact = message.sender_id.as_str();

        if !message.text.is_empty() {
            self.memory
                .append_history(contact, Role::User, &message.text)
                .await?;
        }

        let window = self.memory.context_window(contact).await?;
        let context = if message.text.is_empty() {
            Context {
                history: window.iter().map(ContextEntry::from).collect(),
                ..Context::new(&self.prompts.system, &self.prompts.greeting)
            }
        } else {
            Context::from_window(&self.prompts.system, &window, &message.text)
        };

        let response = self.provider.complete(&context).await?;
        if response.text.trim().is_empty() {
            return Err(RelayError::Provider("empty completion".into()));
        }

        let text = {
            let mut rng = rand::thread_rng();
            closing::augment(response.text, &self.closing, &mut rng)
        };

        self.memory
            .append_history(contact, Role::Assistant, &text)
            .await?;

        Ok((text, response.metadata))
    }
}
