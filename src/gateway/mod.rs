//! Gateway: connects the webhook, the completion provider, the outbound
//! channel, and memory.
//!
//! Includes: webhook handling, the reply pipeline, silence follow-ups, the
//! weekly promotion broadcast, audit logging, and graceful shutdown.

mod closing;
mod dedup;
mod followup;
mod payload;
mod pipeline;
mod promotion;
mod state;
mod webhook;

#[cfg(test)]
mod test_support;

use relay_core::{
    config::{ClosingConfig, Config, FollowupConfig, PromotionConfig, PromptsConfig, ServerConfig},
    traits::{Channel, Provider},
};
use relay_memory::{AuditLogger, Store};
use state::RelayState;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// The central gateway shared by the webhook handlers and background loops.
pub struct Gateway {
    pub(super) provider: Arc<dyn Provider>,
    pub(super) channel: Arc<dyn Channel>,
    pub(super) memory: Store,
    pub(super) audit: AuditLogger,
    pub(super) state: Arc<RelayState>,
    pub(super) prompts: PromptsConfig,
    pub(super) closing: ClosingConfig,
    pub(super) followup: FollowupConfig,
    pub(super) promotion: PromotionConfig,
    pub(super) uptime: Instant,
}

/// Outcome of one `POST /webhook` delivery, echoed back as `{"status": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    IgnoredStatus,
    Duplicate,
    Ok,
    NoMessage,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IgnoredStatus => "ignored_status",
            Self::Duplicate => "duplicate_ignored",
            Self::Ok => "ok",
            Self::NoMessage => "no_message",
        }
    }
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<dyn Channel>,
        memory: Store,
        config: &Config,
    ) -> Self {
        let audit = AuditLogger::new(memory.pool().clone());
        Self {
            provider,
            channel,
            memory,
            audit,
            state: Arc::new(RelayState::new()),
            prompts: config.prompts.clone(),
            closing: config.closing.clone(),
            followup: config.followup.clone(),
            promotion: config.promotion.clone(),
            uptime: Instant::now(),
        }
    }

    /// Run the webhook server and background loops until Ctrl-C.
    pub async fn run(self: Arc<Self>, server: ServerConfig) -> anyhow::Result<()> {
        info!(
            "Relay gateway running | provider: {} | channel: {} | followups: {} | promotion: {}",
            self.provider.name(),
            self.channel.name(),
            if self.followup.enabled { "on" } else { "off" },
            if self.promotion.enabled { "on" } else { "off" },
        );

        // Spawn follow-up loop.
        let followup_handle = if self.followup.enabled {
            let gw = Arc::clone(&self);
            Some(tokio::spawn(async move {
                gw.followup_loop().await;
            }))
        } else {
            None
        };

        // Spawn promotion loop.
        let promotion_handle = if self.promotion.enabled {
            match self.promotion.schedule() {
                Ok((weekday, time)) => {
                    let gw = Arc::clone(&self);
                    Some(tokio::spawn(async move {
                        gw.promotion_loop(weekday, time).await;
                    }))
                }
                Err(e) => {
                    error!("promotion disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        let result = webhook::serve(Arc::clone(&self), &server).await;

        // Background loops are abandoned on shutdown.
        for handle in [followup_handle, promotion_handle].into_iter().flatten() {
            handle.abort();
        }

        info!("Relay gateway stopped.");
        result
    }
}
