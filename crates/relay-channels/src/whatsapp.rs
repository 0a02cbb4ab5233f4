//! WhatsApp Cloud API channel (outbound only).
//!
//! Sends go to `POST /{version}/{phone_number_id}/messages` on the Graph API.
//! Docs: <https://developers.facebook.com/docs/whatsapp/cloud-api/reference/messages>

use async_trait::async_trait;
use relay_core::{
    config::WhatsAppConfig,
    error::RelayError,
    message::{SendOutcome, TemplateRef},
    traits::Channel,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// WhatsApp channel backed by the Cloud API.
pub struct WhatsAppCloudChannel {
    client: reqwest::Client,
    messages_url: String,
    access_token: String,
}

// --- Graph API types ---

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(flatten)]
    payload: Payload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Payload<'a> {
    Text { text: TextBody<'a> },
    Template { template: TemplateBody<'a> },
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct TemplateBody<'a> {
    name: &'a str,
    language: LanguageCode<'a>,
}

#[derive(Debug, Serialize)]
struct LanguageCode<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppCloudChannel {
    /// Create a new channel from config.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Channel(format!("whatsapp: failed to build client: {e}")))?;

        let messages_url = format!(
            "{}/{}/{}/messages",
            config.base_url.trim_end_matches('/'),
            config.api_version,
            config.phone_number_id
        );

        Ok(Self {
            client,
            messages_url,
            access_token: config.access_token.clone(),
        })
    }

    async fn post(&self, to: &str, payload: Payload<'_>) -> SendOutcome {
        let body = SendRequest {
            messaging_product: "whatsapp",
            to,
            payload,
        };

        let resp = match self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return SendOutcome::Transport(e.to_string()),
        };

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return SendOutcome::Rejected {
                status: status.as_u16(),
                body: text,
            };
        }

        let message_id = serde_json::from_str::<SendResponse>(&text)
            .ok()
            .and_then(|r| r.messages.into_iter().next())
            .map(|m| m.id);

        SendOutcome::Delivered { message_id }
    }
}

fn log_outcome(kind: &str, to: &str, outcome: &SendOutcome) {
    if outcome.is_delivered() {
        info!("whatsapp: {kind} to {to}: {outcome}");
    } else {
        warn!("whatsapp: {kind} to {to}: {outcome}");
    }
}

#[async_trait]
impl Channel for WhatsAppCloudChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, body: &str) -> SendOutcome {
        let outcome = self
            .post(
                to,
                Payload::Text {
                    text: TextBody { body },
                },
            )
            .await;
        log_outcome("text", to, &outcome);
        outcome
    }

    async fn send_template(&self, to: &str, template: &TemplateRef) -> SendOutcome {
        let outcome = self
            .post(
                to,
                Payload::Template {
                    template: TemplateBody {
                        name: &template.name,
                        language: LanguageCode {
                            code: &template.language,
                        },
                    },
                },
            )
            .await;
        log_outcome("template", to, &outcome);
        outcome
    }
}
