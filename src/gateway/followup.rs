//! Silence follow-ups: one nudge per episode once a contact goes quiet.

use super::Gateway;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use relay_core::message::Role;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Gateway {
    /// Background task: poll for silent contacts and nudge them.
    pub(super) async fn followup_loop(self: Arc<Self>) {
        info!(
            "followup: loop started (every {}s, window {}s..{}s)",
            self.followup.poll_interval_secs,
            self.followup.min_silence_secs,
            self.followup.max_window_secs
        );

        loop {
            let jitter_ms = rand::thread_rng().gen_range(0..2000);
            tokio::time::sleep(
                Duration::from_secs(self.followup.poll_interval_secs)
                    + Duration::from_millis(jitter_ms),
            )
            .await;

            let sent = self.followup_tick(Utc::now()).await;
            if sent > 0 {
                info!("followup: sent {sent} nudge(s)");
            }
        }
    }

    /// Run one follow-up pass as of `now`. Returns how many nudges went out.
    ///
    /// A transport failure leaves the episode armed for the next pass. A
    /// rejection by the provider closes it.
    pub(super) async fn followup_tick(&self, now: DateTime<Utc>) -> usize {
        let due = self.state.due_followups(
            now,
            self.followup.min_silence(),
            self.followup.max_window(),
        );
        if due.is_empty() {
            return 0;
        }

        let mut sent = 0;
        for (contact, episode) in due {
            let nudge = {
                let mut rng = rand::thread_rng();
                self.followup.nudges.choose(&mut rng).cloned()
            };
            let Some(nudge) = nudge else {
                warn!("followup: no nudges configured, skipping pass");
                return 0;
            };

            let outcome = self.channel.send_text(&contact, &nudge).await;

            if outcome.is_delivered() {
                if !self.state.complete_followup(&contact, episode, now) {
                    debug!("followup: {contact} wrote again while the nudge was in flight");
                }
                if let Err(e) = self
                    .memory
                    .append_history(&contact, Role::Assistant, &nudge)
                    .await
                {
                    warn!("followup: failed to store nudge for {contact}: {e}");
                }
                info!("followup: nudged {contact}");
                sent += 1;
            } else if outcome.reached_provider() {
                warn!("followup: nudge to {contact} rejected, closing episode: {outcome}");
                self.state.complete_followup(&contact, episode, now);
            } else {
                warn!("followup: nudge to {contact} failed, will retry: {outcome}");
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use chrono::Duration;
    use relay_core::config::Config;
    use relay_core::message::{Role, SendOutcome};

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    async fn harness(channel: MockChannel) -> Harness {
        let mut config = Config::default();
        config.closing.enabled = false;
        config.followup.nudges = vec!["Still there? Happy to help.".into()];
        Harness::with_config(MockProvider::replying("Sure."), channel, config).await
    }

    #[tokio::test]
    async fn test_nudge_only_inside_window() {
        let h = harness(MockChannel::new()).await;
        h.gateway
            .handle_delivery(&text_delivery("wamid.1", "alice", "Hello"))
            .await
            .unwrap();
        let start = h.gateway.state.activity("alice").unwrap().last_user_at.unwrap();

        assert_eq!(h.gateway.followup_tick(start + minutes(5)).await, 0);
        assert_eq!(h.gateway.followup_tick(start + minutes(25 * 60)).await, 0);

        assert_eq!(h.gateway.followup_tick(start + minutes(11)).await, 1);
        assert_eq!(h.gateway.followup_tick(start + minutes(12)).await, 0);
        assert_eq!(h.gateway.followup_tick(start + minutes(60)).await, 0);

        let texts = h.channel.texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], ("alice".to_string(), "Still there? Happy to help.".to_string()));

        let history = h.gateway.memory.recent_history("alice", 20).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Still there? Happy to help.");
    }

    #[tokio::test]
    async fn test_new_message_rearms() {
        let h = harness(MockChannel::new()).await;
        h.gateway
            .handle_delivery(&text_delivery("wamid.1", "alice", "Hello"))
            .await
            .unwrap();
        let start = h.gateway.state.activity("alice").unwrap().last_user_at.unwrap();
        assert_eq!(h.gateway.followup_tick(start + minutes(11)).await, 1);

        h.gateway
            .handle_delivery(&text_delivery("wamid.2", "alice", "Back again"))
            .await
            .unwrap();
        let second = h.gateway.state.activity("alice").unwrap().last_user_at.unwrap();
        assert!(!h.gateway.state.activity("alice").unwrap().followup_sent);

        assert_eq!(h.gateway.followup_tick(second + minutes(11)).await, 1);
        assert_eq!(h.channel.texts().len(), 4);
    }

    #[tokio::test]
    async fn test_no_nudge_without_bot_reply() {
        let h = harness(MockChannel::new()).await;
        let t0 = chrono::Utc::now();
        h.gateway.state.record_user_message("bob", t0);

        assert_eq!(h.gateway.followup_tick(t0 + minutes(30)).await, 0);
        assert!(h.channel.texts().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_stays_armed() {
        let h = harness(MockChannel::with_outcome(SendOutcome::Transport("timed out".into()))).await;
        let t0 = chrono::Utc::now();
        h.gateway.state.record_user_message("carol", t0);
        h.gateway.state.record_bot_reply("carol", t0 + Duration::seconds(2));

        assert_eq!(h.gateway.followup_tick(t0 + minutes(11)).await, 0);
        assert_eq!(h.gateway.followup_tick(t0 + minutes(12)).await, 0);

        // Both passes tried again.
        assert_eq!(h.channel.texts().len(), 2);
        assert!(!h.gateway.state.activity("carol").unwrap().followup_sent);
        assert_eq!(h.gateway.memory.history_len("carol").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejection_closes_episode() {
        let h = harness(MockChannel::new().rejecting("dave")).await;
        let t0 = chrono::Utc::now();
        h.gateway.state.record_user_message("dave", t0);
        h.gateway.state.record_bot_reply("dave", t0 + Duration::seconds(2));

        assert_eq!(h.gateway.followup_tick(t0 + minutes(11)).await, 0);
        assert_eq!(h.gateway.followup_tick(t0 + minutes(12)).await, 0);

        assert_eq!(h.channel.texts().len(), 1);
        assert!(h.gateway.state.activity("dave").unwrap().followup_sent);
    }

    #[tokio::test]
    async fn test_empty_nudge_pool_sends_nothing() {
        let mut config = Config::default();
        config.followup.nudges.clear();
        let h = Harness::with_config(MockProvider::replying("Sure."), MockChannel::new(), config).await;
        let t0 = chrono::Utc::now();
        h.gateway.state.record_user_message("erin", t0);
        h.gateway.state.record_bot_reply("erin", t0 + Duration::seconds(2));

        assert_eq!(h.gateway.followup_tick(t0 + minutes(11)).await, 0);
        assert!(h.channel.texts().is_empty());
    }
}
