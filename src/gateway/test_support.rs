//! Mocks and fixtures shared by the gateway tests.

use super::Gateway;
use async_trait::async_trait;
use relay_core::{
    config::Config,
    context::Context,
    error::RelayError,
    message::{MessageMetadata, OutgoingMessage, SendOutcome, TemplateRef},
    traits::{Channel, Provider},
};
use relay_memory::Store;
use std::sync::{Arc, Mutex};

/// A provider that answers with a fixed text, or always fails.
pub struct MockProvider {
    reply: Option<String>,
    contexts: Mutex<Vec<Context>>,
}

impl MockProvider {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Every context passed to `complete`, in call order.
    pub fn contexts(&self) -> Vec<Context> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, context: &Context) -> Result<OutgoingMessage, RelayError> {
        self.contexts.lock().unwrap().push(context.clone());
        match &self.reply {
            Some(text) => Ok(OutgoingMessage {
                text: text.clone(),
                metadata: MessageMetadata {
                    provider_used: "mock".into(),
                    model: Some("mock-1".into()),
                    ..Default::default()
                },
            }),
            None => Err(RelayError::Provider("mock provider is down".into())),
        }
    }

    async fn is_available(&self) -> bool {
        self.reply.is_some()
    }
}

/// A channel that records every send and answers with a fixed outcome.
pub struct MockChannel {
    outcome: SendOutcome,
    texts: Mutex<Vec<(String, String)>>,
    templates: Mutex<Vec<(String, TemplateRef)>>,
    /// Recipients whose sends are rejected regardless of `outcome`.
    rejected: Vec<String>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::with_outcome(SendOutcome::Delivered {
            message_id: Some("wamid.out".into()),
        })
    }

    pub fn with_outcome(outcome: SendOutcome) -> Self {
        Self {
            outcome,
            texts: Mutex::new(Vec::new()),
            templates: Mutex::new(Vec::new()),
            rejected: Vec::new(),
        }
    }

    pub fn rejecting(mut self, contact: &str) -> Self {
        self.rejected.push(contact.to_string());
        self
    }

    pub fn texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn templates(&self) -> Vec<(String, TemplateRef)> {
        self.templates.lock().unwrap().clone()
    }

    fn outcome_for(&self, to: &str) -> SendOutcome {
        if self.rejected.iter().any(|c| c == to) {
            SendOutcome::Rejected {
                status: 400,
                body: "recipient not allowed".into(),
            }
        } else {
            self.outcome.clone()
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_text(&self, to: &str, body: &str) -> SendOutcome {
        self.texts
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        self.outcome_for(to)
    }

    async fn send_template(&self, to: &str, template: &TemplateRef) -> SendOutcome {
        self.templates
            .lock()
            .unwrap()
            .push((to.to_string(), template.clone()));
        self.outcome_for(to)
    }
}

/// A gateway over an in-memory store, with handles on its mocks.
pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub provider: Arc<MockProvider>,
    pub channel: Arc<MockChannel>,
}

impl Harness {
    /// Closing questions are off so replies are deterministic.
    pub async fn new(provider: MockProvider, channel: MockChannel) -> Self {
        let mut config = Config::default();
        config.closing.enabled = false;
        Self::with_config(provider, channel, config).await
    }

    pub async fn with_config(provider: MockProvider, channel: MockChannel, config: Config) -> Self {
        let provider = Arc::new(provider);
        let channel = Arc::new(channel);
        let store = Store::in_memory(config.memory.max_context_messages)
            .await
            .unwrap();
        let gateway = Arc::new(Gateway::new(
            provider.clone(),
            channel.clone(),
            store,
            &config,
        ));
        Self {
            gateway,
            provider,
            channel,
        }
    }
}

/// A webhook body carrying a single message object.
pub fn delivery(message: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA-1",
            "changes": [{
                "field": "messages",
                "value": {"messaging_product": "whatsapp", "messages": [message]}
            }]
        }]
    }))
    .unwrap()
}

pub fn text_delivery(id: &str, from: &str, text: &str) -> Vec<u8> {
    delivery(serde_json::json!({
        "from": from,
        "id": id,
        "type": "text",
        "text": {"body": text}
    }))
}
